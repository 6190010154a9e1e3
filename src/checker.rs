//! Type-check pass
//!
//! Walks the IR body once, assigning every expression node a type and a
//! mutability flag. Results are keyed by arena id in a `TypeTable`, so
//! structurally identical nodes at different positions carry independent
//! entries. The pass is fail-fast: the first violation in source order is
//! reported and checking stops.
//!
//! Compile-time integers (bare `3` as opposed to `2'd3`) are typed
//! separately from bit-vector values; they are legal only as static slice
//! indices and shift amounts, never as assignment sources.

use std::collections::HashMap;

use crate::error::{CompileError, CompileResult, ErrorKind, Loc};
use crate::ir::{ExprId, ExprKind, Ir, Literal, Op, Statement};
use crate::types::{TypeKind, UnqualifiedType};

/// The type assigned to one expression node
#[derive(Debug, Clone, PartialEq)]
pub enum ExprType {
    /// A compile-time integer with a known value
    Int(u64),
    /// A hardware value
    Value(UnqualifiedType),
}

impl ExprType {
    /// Width of a quantitative value type
    fn width(&self) -> Option<u32> {
        match self {
            ExprType::Value(t) => t.width(),
            ExprType::Int(_) => None,
        }
    }

    fn kind(&self) -> Option<TypeKind> {
        match self {
            ExprType::Value(t) => t.kind(),
            ExprType::Int(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ExprType::Int(n) => format!("integer {}", n),
            ExprType::Value(t) => t.to_string(),
        }
    }
}

/// Type and mutability of one expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub ty: ExprType,
    /// Whether the node may appear as an assignment target. Slices and
    /// field accesses inherit this from their base.
    pub mutable: bool,
}

/// Per-node results of the type-check pass
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    entries: HashMap<ExprId, Entry>,
}

impl TypeTable {
    pub fn get(&self, id: ExprId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Checks an IR body against the typing rules
pub struct TypeChecker<'a> {
    ir: &'a Ir,
    table: TypeTable,
}

impl<'a> TypeChecker<'a> {
    /// Check every statement, producing the table on success
    pub fn check(ir: &'a Ir) -> CompileResult<TypeTable> {
        let mut checker = Self {
            ir,
            table: TypeTable::default(),
        };
        for stmt in &ir.body {
            checker.check_stmt(stmt)?;
        }
        Ok(checker.table)
    }

    fn err(&self, kind: ErrorKind, loc: Loc) -> CompileError {
        CompileError::new(kind, &self.ir.src_id, loc)
    }

    fn check_stmt(&mut self, stmt: &Statement) -> CompileResult<()> {
        match stmt {
            Statement::Assign { lhs, rhs, loc } => {
                let lhs_entry = self.check_expr(*lhs)?;
                if !lhs_entry.mutable {
                    return Err(self.err(
                        ErrorKind::AssignToImmutable(self.root_name(*lhs)),
                        *loc,
                    ));
                }
                let rhs_ty = self.check_expr(*rhs)?.ty;
                self.require_assignable(&lhs_entry.ty, &rhs_ty, *loc)
            }
            Statement::Switch {
                subject,
                arms,
                default,
                loc,
            } => {
                let subject_ty = self.check_expr(*subject)?.ty;
                for arm in arms {
                    if !matches!(self.ir.expr(arm.label).kind, ExprKind::Literal(_)) {
                        return Err(
                            self.err(ErrorKind::NonLiteralCaseLabel, self.ir.expr(arm.label).loc)
                        );
                    }
                    let label_ty = self.check_expr(arm.label)?.ty;
                    self.require_assignable(&subject_ty, &label_ty, *loc)?;
                    for s in &arm.body {
                        self.check_stmt(s)?;
                    }
                }
                if let Some(body) = default {
                    for s in body {
                        self.check_stmt(s)?;
                    }
                }
                Ok(())
            }
            Statement::Nop { .. } => Ok(()),
        }
    }

    /// The declared name at the root of an lvalue
    fn root_name(&self, id: ExprId) -> String {
        match &self.ir.expr(id).kind {
            ExprKind::Name(name) => name.clone(),
            ExprKind::Field { base, .. } => self.root_name(*base),
            ExprKind::Op { op: Op::Slice, args } => self.root_name(args[0]),
            _ => "<expression>".to_string(),
        }
    }

    fn check_expr(&mut self, id: ExprId) -> CompileResult<Entry> {
        if let Some(entry) = self.table.get(id) {
            return Ok(entry.clone());
        }
        let node = self.ir.expr(id);
        let entry = match &node.kind {
            ExprKind::Name(name) => {
                let ty = self
                    .ir
                    .lookup(name)
                    .expect("frontend rejects undeclared names")
                    .unqualified()
                    .clone();
                Entry {
                    ty: ExprType::Value(ty),
                    mutable: !self.ir.inputs.contains_key(name),
                }
            }
            ExprKind::Literal(Literal::Int(n)) => Entry {
                ty: ExprType::Int(*n),
                mutable: false,
            },
            ExprKind::Literal(Literal::Bits(b)) => Entry {
                ty: ExprType::Value(UnqualifiedType::bit_vector(b.width())),
                mutable: false,
            },
            ExprKind::Literal(Literal::Enum { enum_id, .. }) => Entry {
                ty: ExprType::Value(UnqualifiedType::enumeration(enum_id.clone())),
                mutable: false,
            },
            ExprKind::Field { base, field } => {
                let base_entry = self.check_expr(*base)?;
                match &base_entry.ty {
                    ExprType::Value(UnqualifiedType::Encoded(fields)) => match fields.get(field) {
                        Some(base_ty) => Entry {
                            ty: ExprType::Value(UnqualifiedType::Base(base_ty.clone())),
                            mutable: base_entry.mutable,
                        },
                        None => {
                            return Err(self.err(
                                ErrorKind::UnknownField {
                                    field: field.clone(),
                                    ty: base_entry.ty.describe(),
                                },
                                node.loc,
                            ))
                        }
                    },
                    other => {
                        return Err(
                            self.err(ErrorKind::NotAFieldBase(other.describe()), node.loc)
                        )
                    }
                }
            }
            ExprKind::Op { op, args } => self.check_op(*op, args, node.loc)?,
        };
        self.table.entries.insert(id, entry.clone());
        Ok(entry)
    }

    fn check_op(&mut self, op: Op, args: &[ExprId], loc: Loc) -> CompileResult<Entry> {
        debug_assert_eq!(args.len(), op.arity());
        match op {
            Op::Add | Op::Sub | Op::And | Op::Or => {
                let left = self.check_expr(args[0])?.ty;
                let right = self.check_expr(args[1])?.ty;
                let (lw, rw) = match (left.width(), right.width()) {
                    (Some(lw), Some(rw)) => (lw, rw),
                    _ => return Err(self.incompatible(op, &left, &right, loc)),
                };
                if lw != rw {
                    return Err(self.err(
                        ErrorKind::WidthMismatch {
                            expected: lw,
                            got: rw,
                        },
                        loc,
                    ));
                }
                Ok(Entry {
                    ty: ExprType::Value(UnqualifiedType::bit_vector(lw)),
                    mutable: false,
                })
            }
            Op::Shl | Op::Shr => {
                // Shift amounts may be static integers or any bit vector;
                // the result keeps the left operand's width.
                let left = self.check_expr(args[0])?.ty;
                let right = self.check_expr(args[1])?.ty;
                let lw = match left.width() {
                    Some(lw) => lw,
                    None => {
                        return Err(self.err(
                            ErrorKind::IncompatibleOperand {
                                op: op.to_string(),
                                operand: left.describe(),
                            },
                            loc,
                        ))
                    }
                };
                let amount_ok =
                    matches!(right, ExprType::Int(_)) || right.width().is_some();
                if !amount_ok {
                    return Err(self.incompatible(op, &left, &right, loc));
                }
                Ok(Entry {
                    ty: ExprType::Value(UnqualifiedType::bit_vector(lw)),
                    mutable: false,
                })
            }
            Op::Not => {
                let operand = self.check_expr(args[0])?.ty;
                match operand.width() {
                    Some(w) => Ok(Entry {
                        ty: ExprType::Value(UnqualifiedType::bit_vector(w)),
                        mutable: false,
                    }),
                    None => Err(self.err(
                        ErrorKind::IncompatibleOperand {
                            op: op.to_string(),
                            operand: operand.describe(),
                        },
                        loc,
                    )),
                }
            }
            Op::Eq | Op::Ne => {
                let left = self.check_expr(args[0])?.ty;
                let right = self.check_expr(args[1])?.ty;
                match (left.kind(), right.kind()) {
                    (Some(TypeKind::Quantitative), Some(TypeKind::Quantitative)) => {
                        let (lw, rw) = (left.width().unwrap(), right.width().unwrap());
                        if lw != rw {
                            return Err(self.err(
                                ErrorKind::WidthMismatch {
                                    expected: lw,
                                    got: rw,
                                },
                                loc,
                            ));
                        }
                    }
                    (Some(TypeKind::Nominal), Some(TypeKind::Nominal)) => {
                        if left != right {
                            return Err(self.err(
                                ErrorKind::ValueSetMismatch {
                                    left: left.describe(),
                                    right: right.describe(),
                                },
                                loc,
                            ));
                        }
                    }
                    _ => return Err(self.incompatible(op, &left, &right, loc)),
                }
                Ok(Entry {
                    ty: ExprType::Value(UnqualifiedType::bit_vector(1)),
                    mutable: false,
                })
            }
            Op::Concat => {
                let left = self.check_expr(args[0])?.ty;
                let right = self.check_expr(args[1])?.ty;
                let (lw, rw) = match (left.width(), right.width()) {
                    (Some(lw), Some(rw)) => (lw, rw),
                    _ => return Err(self.incompatible(op, &left, &right, loc)),
                };
                if lw + rw > 64 {
                    return Err(self.incompatible(op, &left, &right, loc));
                }
                Ok(Entry {
                    ty: ExprType::Value(UnqualifiedType::bit_vector(lw + rw)),
                    mutable: false,
                })
            }
            Op::Slice => self.check_slice(args, loc),
            Op::Ternary => {
                let cond = self.check_expr(args[0])?.ty;
                if cond.width() != Some(1) {
                    return Err(self.err(ErrorKind::BadCondition(cond.describe()), loc));
                }
                let then = self.check_expr(args[1])?.ty;
                let otherwise = self.check_expr(args[2])?.ty;
                self.require_assignable(&then, &otherwise, loc)?;
                Ok(Entry {
                    ty: then,
                    mutable: false,
                })
            }
        }
    }

    /// `base[index]`. A static integer index must lie within the base's
    /// extent; a bit-vector index must address the extent exactly, i.e.
    /// `2^indexWidth == extent`. Bit-vector bases yield 1-bit results,
    /// array bases yield the element type. Mutability is inherited so
    /// sliced names remain legal assignment targets.
    fn check_slice(&mut self, args: &[ExprId], loc: Loc) -> CompileResult<Entry> {
        let base = self.check_expr(args[0])?;
        let index = self.check_expr(args[1])?.ty;
        let (extent, elem) = match &base.ty {
            ExprType::Value(UnqualifiedType::Base(crate::types::BaseType::BitVector(w))) => {
                (*w as u64, UnqualifiedType::bit_vector(1))
            }
            ExprType::Value(UnqualifiedType::Array(elem, size)) => {
                (*size as u64, elem.as_ref().clone())
            }
            other => return Err(self.err(ErrorKind::NotSliceable(other.describe()), loc)),
        };
        match &index {
            ExprType::Int(i) => {
                if *i >= extent {
                    return Err(self.err(
                        ErrorKind::IndexOutOfRange {
                            index: *i,
                            bound: extent,
                        },
                        loc,
                    ));
                }
            }
            ExprType::Value(t) if t.width().is_some() => {
                let iw = t.width().unwrap();
                let addressable = if iw >= 64 { u64::MAX } else { 1u64 << iw };
                if addressable != extent {
                    return Err(self.err(
                        ErrorKind::SliceIndexWidth {
                            index: iw,
                            bound: extent,
                        },
                        loc,
                    ));
                }
            }
            other => {
                return Err(self.err(
                    ErrorKind::IncompatibleOperand {
                        op: "slice".to_string(),
                        operand: other.describe(),
                    },
                    loc,
                ))
            }
        }
        Ok(Entry {
            ty: ExprType::Value(elem),
            mutable: base.mutable,
        })
    }

    fn incompatible(&self, op: Op, left: &ExprType, right: &ExprType, loc: Loc) -> CompileError {
        self.err(
            ErrorKind::IncompatibleOperands {
                op: op.to_string(),
                left: left.describe(),
                right: right.describe(),
            },
            loc,
        )
    }

    /// Assignment compatibility with specific diagnostics: width mismatch
    /// for quantitative pairs, value-set mismatch for nominal pairs, a
    /// generic rejection otherwise. Also used for ternary branches and
    /// switch labels.
    fn require_assignable(
        &self,
        lhs: &ExprType,
        rhs: &ExprType,
        loc: Loc,
    ) -> CompileResult<()> {
        if let (ExprType::Value(l), ExprType::Value(r)) = (lhs, rhs) {
            if l.assignable_from(r) {
                return Ok(());
            }
            match (l.kind(), r.kind()) {
                (Some(TypeKind::Quantitative), Some(TypeKind::Quantitative)) => {
                    return Err(self.err(
                        ErrorKind::WidthMismatch {
                            expected: l.width().unwrap(),
                            got: r.width().unwrap(),
                        },
                        loc,
                    ))
                }
                (Some(TypeKind::Nominal), Some(TypeKind::Nominal)) => {
                    return Err(self.err(
                        ErrorKind::ValueSetMismatch {
                            left: l.to_string(),
                            right: r.to_string(),
                        },
                        loc,
                    ))
                }
                _ => {}
            }
        }
        Err(self.err(
            ErrorKind::NotAssignable {
                lhs: lhs.describe(),
                rhs: rhs.describe(),
            },
            loc,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::compile_to_ir;

    fn check(source: &str) -> CompileResult<TypeTable> {
        let ir = compile_to_ir("test", source)?;
        TypeChecker::check(&ir)
    }

    #[test]
    fn test_well_typed_alu() {
        check(
            "enum Op { ADD, SUB } \
             op = Input(Configuration(Op)); \
             a = Input(BitVector(16)); \
             b = Input(BitVector(16)); \
             res = Output(BitVector(16)); \
             if op == Op.ADD { res.assign(a + b); } \
             elif op == Op.SUB { res.assign(a - b); }",
        )
        .unwrap();
    }

    #[test]
    fn test_add_width_mismatch() {
        let err = check(
            "a = Input(BitVector(16)); \
             b = Input(BitVector(8)); \
             res = Output(BitVector(16)); \
             res.assign(a + b);",
        )
        .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::WidthMismatch {
                expected: 16,
                got: 8
            }
        );
    }

    #[test]
    fn test_assign_to_input_rejected() {
        let err = check(
            "a = Input(BitVector(16)); \
             b = Input(BitVector(16)); \
             a.assign(b);",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AssignToImmutable("a".to_string()));
    }

    #[test]
    fn test_assign_width_mismatch() {
        let err = check(
            "a = Input(BitVector(8)); \
             res = Output(BitVector(16)); \
             res.assign(a);",
        )
        .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::WidthMismatch {
                expected: 16,
                got: 8
            }
        );
    }

    #[test]
    fn test_enum_value_set_mismatch() {
        let err = check(
            "enum Op { ADD, SUB } \
             enum FlagSel { Z, N } \
             op = Input(Op); \
             sel = Output(FlagSel); \
             sel.assign(op);",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ValueSetMismatch { .. }));
    }

    #[test]
    fn test_integer_literal_not_assignable() {
        let err = check(
            "res = Output(BitVector(16)); \
             res.assign(5);",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NotAssignable { .. }));
    }

    #[test]
    fn test_static_slice_bounds() {
        check(
            "a = Input(BitVector(16)); \
             n = Output(BitVector(1)); \
             n.assign(a[15]);",
        )
        .unwrap();
        let err = check(
            "a = Input(BitVector(16)); \
             n = Output(BitVector(1)); \
             n.assign(a[16]);",
        )
        .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::IndexOutOfRange {
                index: 16,
                bound: 16
            }
        );
    }

    #[test]
    fn test_dynamic_slice_width_rule() {
        // A 3-bit index addresses an 8-bit base exactly.
        check(
            "lut = Input(Configuration(BitVector(8))); \
             idx = Input(BitVector(3)); \
             out = Output(BitVector(1)); \
             out.assign((lut >> idx)[0]);",
        )
        .unwrap();
        let err = check(
            "lut = Input(Configuration(BitVector(8))); \
             idx = Input(BitVector(4)); \
             out = Output(BitVector(1)); \
             out.assign(lut[idx]);",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SliceIndexWidth { index: 4, bound: 8 });
    }

    #[test]
    fn test_array_slice_yields_element_type() {
        check(
            "r = Intermediate(Register(Array(BitVector(16), 4))); \
             idx = Input(BitVector(2)); \
             v = Input(BitVector(16)); \
             out = Output(BitVector(16)); \
             r[idx].assign(v); \
             out.assign(r[0]);",
        )
        .unwrap();
    }

    #[test]
    fn test_enum_not_sliceable() {
        let err = check(
            "enum Op { ADD, SUB } \
             op = Input(Op); \
             out = Output(BitVector(1)); \
             out.assign(op[0]);",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NotSliceable(_)));
    }

    #[test]
    fn test_ternary_condition_must_be_one_bit() {
        let err = check(
            "c = Input(BitVector(2)); \
             a = Input(BitVector(8)); \
             b = Input(BitVector(8)); \
             out = Output(BitVector(8)); \
             out.assign(c ? a : b);",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadCondition(_)));
    }

    #[test]
    fn test_ternary_branch_types_must_agree() {
        let err = check(
            "c = Input(BitVector(1)); \
             a = Input(BitVector(8)); \
             b = Input(BitVector(16)); \
             out = Output(BitVector(8)); \
             out.assign(c ? a : b);",
        )
        .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::WidthMismatch {
                expected: 8,
                got: 16
            }
        );
    }

    #[test]
    fn test_encoded_field_access() {
        check(
            "enum Op { ADD, SUB } \
             cfg = Input(Configuration(Encoded(Op, operation, BitVector(1), signed))); \
             s = Output(BitVector(1)); \
             s.assign(cfg.signed);",
        )
        .unwrap();
        let err = check(
            "enum Op { ADD, SUB } \
             cfg = Input(Configuration(Encoded(Op, operation, BitVector(1), signed))); \
             s = Output(BitVector(1)); \
             s.assign(cfg.carry);",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownField { .. }));
    }

    #[test]
    fn test_field_base_must_be_encoded() {
        let err = check(
            "a = Input(BitVector(8)); \
             s = Output(BitVector(1)); \
             s.assign(a.signed);",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NotAFieldBase(_)));
    }

    #[test]
    fn test_concat_width_sums() {
        check(
            "a = Input(BitVector(1)); \
             b = Input(BitVector(2)); \
             out = Output(BitVector(3)); \
             out.assign(concat(a, b));",
        )
        .unwrap();
        let err = check(
            "a = Input(BitVector(1)); \
             b = Input(BitVector(2)); \
             out = Output(BitVector(4)); \
             out.assign(concat(a, b));",
        )
        .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::WidthMismatch {
                expected: 4,
                got: 3
            }
        );
    }

    #[test]
    fn test_case_label_must_be_literal() {
        let err = check(
            "a = Input(BitVector(4)); \
             b = Input(BitVector(4)); \
             out = Output(BitVector(4)); \
             if a == b { out.assign(a); }",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NonLiteralCaseLabel);
    }

    #[test]
    fn test_case_label_width_checked() {
        let err = check(
            "a = Input(BitVector(4)); \
             out = Output(BitVector(4)); \
             if a == 8'd0 { out.assign(a); }",
        )
        .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::WidthMismatch {
                expected: 4,
                got: 8
            }
        );
    }

    #[test]
    fn test_comparison_yields_one_bit() {
        check(
            "a = Input(BitVector(16)); \
             z = Output(BitVector(1)); \
             z.assign(a == 16'd0);",
        )
        .unwrap();
    }

    #[test]
    fn test_enum_arithmetic_rejected() {
        let err = check(
            "enum Op { ADD, SUB } \
             a = Input(Op); \
             b = Input(Op); \
             out = Output(Op); \
             out.assign(a + b);",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IncompatibleOperands { .. }));
    }
}
