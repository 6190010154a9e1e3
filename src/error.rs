//! Error types for the PE-DSL compiler
//!
//! Compile-time errors carry the source identifier plus the line/column of
//! the offending construct. The pipeline is fail-fast: the first error
//! encountered in source order aborts the phase that found it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for compilation operations
pub type CompileResult<T> = Result<T, CompileError>;

/// A line/column position in a description source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loc {
    /// 1-based line number
    pub line: u32,
    /// 1-based column number
    pub col: u32,
}

impl Loc {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl std::fmt::Display for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A located, fatal compilation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{src_id}:{loc}: {kind}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub src_id: String,
    pub loc: Loc,
}

impl CompileError {
    pub fn new(kind: ErrorKind, src_id: impl Into<String>, loc: Loc) -> Self {
        Self {
            kind,
            src_id: src_id.into(),
            loc,
        }
    }
}

/// What went wrong, independent of where
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("unrecognized token")]
    Lex,

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("keyword '{0}' is not allowed")]
    DisallowedKeyword(String),

    #[error("statement not allowed: {0}")]
    DisallowedStatement(String),

    #[error("malformed declaration: {0}")]
    MalformedDeclaration(String),

    #[error("redeclaration of name '{0}'")]
    Redeclaration(String),

    #[error("name '{0}' used before declaration")]
    UndeclaredName(String),

    #[error("assign() expects exactly 1 argument, got {0}")]
    AssignArity(usize),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("enum '{enum_id}' has no member '{member}'")]
    UnknownEnumMember { enum_id: String, member: String },

    #[error("enum type '{0}' cannot be used as a value")]
    EnumTypeAsValue(String),

    #[error("literal {value} does not fit in {width} bits")]
    LiteralTooWide { value: u64, width: u32 },

    #[error("if conditions in a chain must compare one common subject against a label")]
    MalformedSwitch,

    #[error("width mismatch: expected {expected} bits, got {got}")]
    WidthMismatch { expected: u32, got: u32 },

    #[error("value-set mismatch: {left} vs {right}")]
    ValueSetMismatch { left: String, right: String },

    #[error("cannot assign {rhs} to {lhs}")]
    NotAssignable { lhs: String, rhs: String },

    #[error("cannot assign to immutable name '{0}'")]
    AssignToImmutable(String),

    #[error("{op} expects {expected} arguments, got {got}")]
    ArgumentCount {
        op: String,
        expected: usize,
        got: usize,
    },

    #[error("index {index} out of range for base of extent {bound}")]
    IndexOutOfRange { index: u64, bound: u64 },

    #[error("an index of width {index} bits cannot address a base of extent {bound} exactly")]
    SliceIndexWidth { index: u32, bound: u64 },

    #[error("case label must be a literal")]
    NonLiteralCaseLabel,

    #[error("operator {op} not supported on {left} and {right}")]
    IncompatibleOperands {
        op: String,
        left: String,
        right: String,
    },

    #[error("operator {op} not supported on {operand}")]
    IncompatibleOperand { op: String, operand: String },

    #[error("type {0} cannot be sliced")]
    NotSliceable(String),

    #[error("type {0} has no fields")]
    NotAFieldBase(String),

    #[error("no field '{field}' on type {ty}")]
    UnknownField { field: String, ty: String },

    #[error("ternary condition must be a 1-bit vector, got {0}")]
    BadCondition(String),
}

/// Errors from verifying a decode specification against an IR
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("decode specification is missing enum '{0}'")]
    MissingEnum(String),

    #[error("decode specification for enum '{name}' does not match its member set")]
    MemberSetMismatch { name: String },

    #[error("duplicate code {code} in decode specification for enum '{name}'")]
    DuplicateCode { name: String, code: u64 },

    #[error("code {code} for enum '{name}' does not fit in {bit_width} bits")]
    CodeTooWide {
        name: String,
        code: u64,
        bit_width: u32,
    },

    #[error("decode specification is missing encoded type '{0}'")]
    MissingEncoded(String),

    #[error("decode specification for '{name}' is missing field '{field}'")]
    MissingField { name: String, field: String },

    #[error("invalid bit range {start}..={end} for field '{field}' of '{name}'")]
    InvalidRange {
        name: String,
        field: String,
        start: u32,
        end: u32,
    },

    #[error("field '{field}' of '{name}' needs {required} bits but its range holds {actual}")]
    FieldTooNarrow {
        name: String,
        field: String,
        required: u32,
        actual: u32,
    },

    #[error("encoded word '{name}' of {bit_width} bits cannot hold a range ending at bit {max_bit}")]
    WordTooNarrow {
        name: String,
        bit_width: u32,
        max_bit: u32,
    },
}

/// Runtime errors raised by a generated functional model
///
/// A call that fails validation is refused before any register commit, so
/// persisted state is never corrupted by a rejected call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("missing configuration value '{0}'")]
    MissingConfiguration(String),

    #[error("unknown configuration value '{0}'")]
    UnknownConfiguration(String),

    #[error("missing input '{0}'")]
    MissingInput(String),

    #[error("unknown input '{0}'")]
    UnknownInput(String),

    #[error("argument '{name}': expected {expected}, got {got}")]
    ArgumentTypeMismatch {
        name: String,
        expected: String,
        got: String,
    },

    #[error("output '{0}' was not assigned during the call")]
    OutputNotAssigned(String),

    #[error("register '{0}' read before its first write")]
    RegisterUnset(String),

    #[error("value '{0}' read before assignment")]
    NameUnset(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_location() {
        let err = CompileError::new(
            ErrorKind::UndeclaredName("res".to_string()),
            "pe.dsl",
            Loc::new(12, 5),
        );
        assert_eq!(
            err.to_string(),
            "pe.dsl:12:5: name 'res' used before declaration"
        );
    }

    #[test]
    fn test_width_mismatch_message() {
        let kind = ErrorKind::WidthMismatch {
            expected: 16,
            got: 8,
        };
        assert_eq!(kind.to_string(), "width mismatch: expected 16 bits, got 8");
    }
}
