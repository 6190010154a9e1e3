//! PE Description Compiler
//!
//! This library compiles descriptions of a reconfigurable processing
//! element (PE) written in a small, deliberately non-Turing-complete
//! language. A description declares a typed interface of inputs, outputs,
//! and intermediates, then gives combinational behavior as assignments and
//! switch-like if/elif chains.
//!
//! Three consumers sit behind the shared frontend and type checker: a
//! functional-model backend that executes the description one clock cycle
//! per call, a decode-specification verifier that checks a proposed binary
//! encoding of the configuration state, and a JSON interface summary for
//! downstream tooling.
//!
//! # Example
//!
//! ```rust
//! use pe_dsl::compile;
//!
//! let source = "
//!     a = Input(BitVector(16));
//!     b = Input(BitVector(16));
//!     sum = Output(BitVector(16));
//!     sum.assign(a + b);
//! ";
//! let (ir, _types) = compile("adder", source).unwrap();
//! assert_eq!(ir.inputs.len(), 2);
//! assert_eq!(ir.outputs.len(), 1);
//! ```

pub mod ast;
pub mod checker;
pub mod decode;
pub mod error;
pub mod frontend;
pub mod ir;
pub mod lexer;
pub mod matcher;
pub mod model;
pub mod parser;
pub mod types;
pub mod value;

pub use checker::{TypeChecker, TypeTable};
pub use decode::{DecodeSpec, EncodedLayout, EnumEncoding};
pub use error::{CompileError, CompileResult, DecodeError, ErrorKind, ModelError};
pub use frontend::Frontend;
pub use ir::Ir;
pub use model::{FunctionalModel, FunctionalModelBackend, ModelOptions};
pub use parser::Parser;
pub use types::{BaseType, QualifiedType, TopLevelType, UnqualifiedType};
pub use value::{Bits, Value};

/// Compile a description through the full pipeline: parse, lower to the
/// IR, and type-check. `src_id` names the source in error messages.
pub fn compile(src_id: &str, source: &str) -> CompileResult<(Ir, TypeTable)> {
    // Parse into the surface syntax tree
    let mut parser = Parser::new(src_id, source)?;
    let program = parser.parse_program()?;

    // Extract declarations and rewrite the body
    let ir = Frontend::new(src_id).lower(&program)?;

    // Check the typing rules
    let types = TypeChecker::check(&ir)?;

    Ok((ir, types))
}

/// Compile a description and wrap it in the functional-model backend
pub fn compile_to_model(
    src_id: &str,
    source: &str,
    options: ModelOptions,
) -> CompileResult<FunctionalModelBackend> {
    let (ir, _types) = compile(src_id, source)?;
    Ok(FunctionalModelBackend::new(&ir, options))
}
