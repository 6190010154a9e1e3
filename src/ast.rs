//! Surface syntax tree for PE descriptions
//!
//! The parser produces these nodes; the frontend lowers them into the IR
//! after classifying declarations and enforcing the statement whitelist.

use crate::error::Loc;

/// A complete parsed description
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A surface statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `enum Op { ADD, SUB }`
    EnumDef {
        name: String,
        members: Vec<String>,
        loc: Loc,
    },
    /// `name = <type expression>;` — a variable declaration
    Decl { name: String, ty: Expr, loc: Loc },
    /// A call statement, e.g. `res.assign(data0 + data1);`
    Call { call: Expr, loc: Loc },
    /// An if/elif/else chain, lowered to a switch by the frontend
    If {
        arms: Vec<IfArm>,
        default: Option<Vec<Stmt>>,
        loc: Loc,
    },
    /// `pass;`
    Pass { loc: Loc },
}

impl Stmt {
    pub fn loc(&self) -> Loc {
        match self {
            Stmt::EnumDef { loc, .. }
            | Stmt::Decl { loc, .. }
            | Stmt::Call { loc, .. }
            | Stmt::If { loc, .. }
            | Stmt::Pass { loc } => *loc,
        }
    }
}

/// One `if`/`elif` arm: condition plus body
#[derive(Debug, Clone, PartialEq)]
pub struct IfArm {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

/// A surface expression with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Loc,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: Loc) -> Self {
        Self { kind, loc }
    }

    /// Structural equality, ignoring locations. Used to require that every
    /// arm of an if/elif chain tests the same subject.
    pub fn same_shape(&self, other: &Expr) -> bool {
        match (&self.kind, &other.kind) {
            (ExprKind::Name(a), ExprKind::Name(b)) => a == b,
            (ExprKind::Int(a), ExprKind::Int(b)) => a == b,
            (
                ExprKind::Bits { width: wa, value: va },
                ExprKind::Bits { width: wb, value: vb },
            ) => wa == wb && va == vb,
            (
                ExprKind::Field { base: ba, field: fa },
                ExprKind::Field { base: bb, field: fb },
            ) => fa == fb && ba.same_shape(bb),
            (
                ExprKind::Index { base: ba, index: ia },
                ExprKind::Index { base: bb, index: ib },
            ) => ba.same_shape(bb) && ia.same_shape(ib),
            (
                ExprKind::Call { func: fa, args: aa },
                ExprKind::Call { func: fb, args: ab },
            ) => {
                fa.same_shape(fb)
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab).all(|(x, y)| x.same_shape(y))
            }
            (
                ExprKind::Unary { op: oa, operand: ea },
                ExprKind::Unary { op: ob, operand: eb },
            ) => oa == ob && ea.same_shape(eb),
            (
                ExprKind::Binary { op: oa, left: la, right: ra },
                ExprKind::Binary { op: ob, left: lb, right: rb },
            ) => oa == ob && la.same_shape(lb) && ra.same_shape(rb),
            (
                ExprKind::Ternary { cond: ca, then: ta, otherwise: fa },
                ExprKind::Ternary { cond: cb, then: tb, otherwise: fb },
            ) => ca.same_shape(cb) && ta.same_shape(tb) && fa.same_shape(fb),
            _ => false,
        }
    }
}

/// Surface expression kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    /// Compile-time integer, e.g. a slice index or a type-expression width
    Int(u64),
    /// Sized bit-vector literal, e.g. `16'd5`
    Bits { width: u32, value: u64 },
    /// `base.field` — encoded field access or enum literal (`Op.ADD`)
    Field { base: Box<Expr>, field: String },
    /// `base[index]`
    Index { base: Box<Expr>, index: Box<Expr> },
    /// `func(args...)` — type expressions, `concat()`, `.assign()` calls
    Call { func: Box<Expr>, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    And,
    Or,
    Shl,
    Shr,
    Eq,
    Ne,
}
