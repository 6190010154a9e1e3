//! Intermediate representation
//!
//! The frontend produces one `Ir` per description. Expressions live in an
//! arena and are addressed by `ExprId`; passes that need per-node side
//! information (the type checker's `TypeTable`) key it by arena index, so
//! two structurally identical nodes at different source positions carry
//! independent entries.
//!
//! The IR is immutable after the frontend returns it. Backends that need
//! private state take their own clone.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Loc;
use crate::types::QualifiedType;
use crate::value::Bits;

/// Index of an expression node in the IR arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExprId(pub u32);

/// Expression operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    And,
    Or,
    Shl,
    Shr,
    Not,
    Eq,
    Ne,
    Concat,
    Slice,
    Ternary,
}

impl Op {
    /// Required argument count
    pub fn arity(&self) -> usize {
        match self {
            Op::Not => 1,
            Op::Ternary => 3,
            _ => 2,
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::And => "&",
            Op::Or => "|",
            Op::Shl => "<<",
            Op::Shr => ">>",
            Op::Not => "~",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Concat => "concat",
            Op::Slice => "slice",
            Op::Ternary => "ternary",
        };
        write!(f, "{}", name)
    }
}

/// A literal with its value embedded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Compile-time integer (slice indices)
    Int(u64),
    /// Sized bit-vector constant
    Bits(Bits),
    /// Enum member reference, e.g. `Op.ADD`
    Enum { enum_id: String, member: String },
}

/// One arena node
#[derive(Debug, Clone, PartialEq)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Reference to a declared name
    Name(String),
    Literal(Literal),
    /// Field access on an encoded value
    Field { base: ExprId, field: String },
    Op { op: Op, args: Vec<ExprId> },
}

/// An executable statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `lhs` is a name or a slice of a name
    Assign { lhs: ExprId, rhs: ExprId, loc: Loc },
    /// Ordered equality dispatch; first matching label wins, the default
    /// arm runs only when no label matches
    Switch {
        subject: ExprId,
        arms: Vec<SwitchArm>,
        default: Option<Vec<Statement>>,
        loc: Loc,
    },
    Nop { loc: Loc },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchArm {
    pub label: ExprId,
    pub body: Vec<Statement>,
}

/// The compiled form of one PE description
#[derive(Debug, Clone, PartialEq)]
pub struct Ir {
    pub src_id: String,
    /// User-defined enum types: name -> ordered member set
    pub enums: IndexMap<String, Vec<String>>,
    pub inputs: IndexMap<String, QualifiedType>,
    pub outputs: IndexMap<String, QualifiedType>,
    pub intermediates: IndexMap<String, QualifiedType>,
    pub body: Vec<Statement>,
    exprs: Vec<ExprNode>,
}

impl Ir {
    pub fn new(src_id: impl Into<String>) -> Self {
        Self {
            src_id: src_id.into(),
            enums: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            intermediates: IndexMap::new(),
            body: Vec::new(),
            exprs: Vec::new(),
        }
    }

    /// Allocate an expression node
    pub fn alloc(&mut self, kind: ExprKind, loc: Loc) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(ExprNode { kind, loc });
        id
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.0 as usize]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    /// The declared type of a name, wherever it lives
    pub fn lookup(&self, name: &str) -> Option<&QualifiedType> {
        self.inputs
            .get(name)
            .or_else(|| self.outputs.get(name))
            .or_else(|| self.intermediates.get(name))
    }

    /// Whether a name is taken by a declaration or an enum type
    pub fn name_declared(&self, name: &str) -> bool {
        self.lookup(name).is_some() || self.enums.contains_key(name)
    }

    /// Serializable interface summary for diagnostics
    pub fn interface(&self) -> InterfaceSummary<'_> {
        InterfaceSummary {
            src_id: &self.src_id,
            enums: &self.enums,
            inputs: &self.inputs,
            outputs: &self.outputs,
            intermediates: &self.intermediates,
        }
    }
}

/// Borrowed view of the IR's interface, for JSON output
#[derive(Debug, Serialize)]
pub struct InterfaceSummary<'a> {
    pub src_id: &'a str,
    pub enums: &'a IndexMap<String, Vec<String>>,
    pub inputs: &'a IndexMap<String, QualifiedType>,
    pub outputs: &'a IndexMap<String, QualifiedType>,
    pub intermediates: &'a IndexMap<String, QualifiedType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_identity() {
        let mut ir = Ir::new("test");
        // Two structurally identical literals get distinct ids.
        let a = ir.alloc(
            ExprKind::Literal(Literal::Int(3)),
            Loc::new(1, 1),
        );
        let b = ir.alloc(
            ExprKind::Literal(Literal::Int(3)),
            Loc::new(2, 1),
        );
        assert_ne!(a, b);
        assert_eq!(ir.expr(a).kind, ir.expr(b).kind);
    }

    #[test]
    fn test_op_arity() {
        assert_eq!(Op::Not.arity(), 1);
        assert_eq!(Op::Add.arity(), 2);
        assert_eq!(Op::Ternary.arity(), 3);
    }
}
