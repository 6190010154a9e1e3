//! Frontend: constrained-grammar extraction into the IR
//!
//! A single left-to-right pass over the parsed description:
//! - `enum` definitions register user-defined types (top level only)
//! - `name = <type expr>` declarations are matched against the type
//!   grammar and consumed; declarations are not executable
//! - `x.assign(v)` call statements are rewritten into assignments
//! - if/elif chains are reinterpreted as switch statements over one
//!   common subject
//!
//! Strict declare-before-use: any name referenced by an executable
//! statement must have been declared earlier in the description. There is
//! no hoisting.

use crate::ast::{BinaryOp, Expr, ExprKind as SurfaceKind, Program, Stmt, UnaryOp};
use crate::error::{CompileError, CompileResult, ErrorKind, Loc};
use crate::ir::{ExprId, ExprKind, Ir, Literal, Op, Statement, SwitchArm};
use crate::matcher::{most_specific, TypeMatcher};
use crate::types::TopLevelType;
use crate::value::Bits;

/// Lowers a parsed description into the IR
pub struct Frontend {
    src_id: String,
}

impl Frontend {
    pub fn new(src_id: impl Into<String>) -> Self {
        Self {
            src_id: src_id.into(),
        }
    }

    fn err(&self, kind: ErrorKind, loc: Loc) -> CompileError {
        CompileError::new(kind, &self.src_id, loc)
    }

    /// Run the extraction pass
    pub fn lower(&self, program: &Program) -> CompileResult<Ir> {
        let mut ir = Ir::new(&self.src_id);
        let mut body = Vec::new();
        for stmt in &program.statements {
            match stmt {
                Stmt::EnumDef { name, members, loc } => {
                    self.lower_enum_def(&mut ir, name, members, *loc)?;
                }
                Stmt::Decl { name, ty, loc } => {
                    self.lower_decl(&mut ir, name, ty, *loc)?;
                }
                other => body.push(self.lower_exec(&mut ir, other)?),
            }
        }
        ir.body = body;
        Ok(ir)
    }

    fn lower_enum_def(
        &self,
        ir: &mut Ir,
        name: &str,
        members: &[String],
        loc: Loc,
    ) -> CompileResult<()> {
        if ir.name_declared(name) {
            return Err(self.err(ErrorKind::Redeclaration(name.to_string()), loc));
        }
        ir.enums.insert(name.to_string(), members.to_vec());
        Ok(())
    }

    fn lower_decl(&self, ir: &mut Ir, name: &str, ty: &Expr, loc: Loc) -> CompileResult<()> {
        let matched = {
            let matcher = TypeMatcher::new(&ir.enums);
            matcher.match_top_level(ty)
        };
        let matched = match matched {
            Ok(t) => t,
            Err(failures) => {
                let best = most_specific(&failures);
                return Err(self.err(
                    ErrorKind::MalformedDeclaration(best.message.clone()),
                    best.loc,
                ));
            }
        };
        if ir.name_declared(name) {
            return Err(self.err(ErrorKind::Redeclaration(name.to_string()), loc));
        }
        match matched {
            TopLevelType::Input(q) => ir.inputs.insert(name.to_string(), q),
            TopLevelType::Output(q) => ir.outputs.insert(name.to_string(), q),
            TopLevelType::Intermediate(q) => ir.intermediates.insert(name.to_string(), q),
        };
        Ok(())
    }

    /// Lower an executable statement. Declarations are only legal at the
    /// top level, so inside switch bodies they are rejected here.
    fn lower_exec(&self, ir: &mut Ir, stmt: &Stmt) -> CompileResult<Statement> {
        match stmt {
            Stmt::EnumDef { loc, .. } | Stmt::Decl { loc, .. } => Err(self.err(
                ErrorKind::DisallowedStatement(
                    "declarations must appear at the top level".to_string(),
                ),
                *loc,
            )),
            Stmt::Pass { loc } => Ok(Statement::Nop { loc: *loc }),
            Stmt::Call { call, loc } => self.lower_assign_call(ir, call, *loc),
            Stmt::If { arms, default, loc } => self.lower_switch(ir, arms, default, *loc),
        }
    }

    /// Rewrite `target.assign(value)` into a canonical assignment
    fn lower_assign_call(&self, ir: &mut Ir, call: &Expr, loc: Loc) -> CompileResult<Statement> {
        let (func, args) = match &call.kind {
            SurfaceKind::Call { func, args } => (func, args),
            _ => {
                return Err(self.err(
                    ErrorKind::DisallowedStatement(
                        "only assign() calls may appear as statements".to_string(),
                    ),
                    call.loc,
                ))
            }
        };
        let target = match &func.kind {
            SurfaceKind::Field { base, field } if field == "assign" => base,
            _ => {
                return Err(self.err(
                    ErrorKind::DisallowedStatement(
                        "only assign() calls may appear as statements".to_string(),
                    ),
                    call.loc,
                ))
            }
        };
        if args.len() != 1 {
            return Err(self.err(ErrorKind::AssignArity(args.len()), call.loc));
        }
        let lhs = self.lower_expr(ir, target)?;
        self.check_lvalue(ir, lhs, target.loc)?;
        let rhs = self.lower_expr(ir, &args[0])?;
        Ok(Statement::Assign { lhs, rhs, loc })
    }

    /// An lvalue is a name or a slice of a name
    fn check_lvalue(&self, ir: &Ir, lhs: ExprId, loc: Loc) -> CompileResult<()> {
        let ok = match &ir.expr(lhs).kind {
            ExprKind::Name(_) => true,
            ExprKind::Op { op: Op::Slice, args } => {
                matches!(ir.expr(args[0]).kind, ExprKind::Name(_))
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(self.err(
                ErrorKind::Syntax(
                    "left-hand side of assign() must be a name or an indexed name".to_string(),
                ),
                loc,
            ))
        }
    }

    /// Reinterpret an if/elif/else chain as a switch over one subject
    fn lower_switch(
        &self,
        ir: &mut Ir,
        arms: &[crate::ast::IfArm],
        default: &Option<Vec<Stmt>>,
        loc: Loc,
    ) -> CompileResult<Statement> {
        let mut subject_surface: Option<&Expr> = None;
        let mut subject = None;
        let mut lowered_arms = Vec::new();
        for arm in arms {
            let (left, right) = match &arm.cond.kind {
                SurfaceKind::Binary {
                    op: BinaryOp::Eq,
                    left,
                    right,
                } => (left.as_ref(), right.as_ref()),
                _ => return Err(self.err(ErrorKind::MalformedSwitch, arm.cond.loc)),
            };
            match subject_surface {
                None => {
                    subject_surface = Some(left);
                    subject = Some(self.lower_expr(ir, left)?);
                }
                Some(expected) => {
                    if !expected.same_shape(left) {
                        return Err(self.err(ErrorKind::MalformedSwitch, left.loc));
                    }
                }
            }
            let label = self.lower_expr(ir, right)?;
            let body = arm
                .body
                .iter()
                .map(|s| self.lower_exec(ir, s))
                .collect::<CompileResult<Vec<_>>>()?;
            lowered_arms.push(SwitchArm { label, body });
        }
        let default = match default {
            Some(stmts) => Some(
                stmts
                    .iter()
                    .map(|s| self.lower_exec(ir, s))
                    .collect::<CompileResult<Vec<_>>>()?,
            ),
            None => None,
        };
        Ok(Statement::Switch {
            subject: subject.expect("if chains have at least one arm"),
            arms: lowered_arms,
            default,
            loc,
        })
    }

    fn lower_expr(&self, ir: &mut Ir, expr: &Expr) -> CompileResult<ExprId> {
        let loc = expr.loc;
        match &expr.kind {
            SurfaceKind::Name(name) => {
                if ir.enums.contains_key(name) {
                    return Err(self.err(ErrorKind::EnumTypeAsValue(name.clone()), loc));
                }
                if ir.lookup(name).is_none() {
                    return Err(self.err(ErrorKind::UndeclaredName(name.clone()), loc));
                }
                Ok(ir.alloc(ExprKind::Name(name.clone()), loc))
            }
            SurfaceKind::Int(n) => Ok(ir.alloc(ExprKind::Literal(Literal::Int(*n)), loc)),
            SurfaceKind::Bits { width, value } => Ok(ir.alloc(
                ExprKind::Literal(Literal::Bits(Bits::new(*width, *value))),
                loc,
            )),
            SurfaceKind::Field { base, field } => {
                // `Op.ADD` resolves to an enum literal; anything else is a
                // field access on an encoded value.
                if let SurfaceKind::Name(type_name) = &base.kind {
                    if let Some(members) = ir.enums.get(type_name) {
                        if !members.contains(field) {
                            return Err(self.err(
                                ErrorKind::UnknownEnumMember {
                                    enum_id: type_name.clone(),
                                    member: field.clone(),
                                },
                                loc,
                            ));
                        }
                        return Ok(ir.alloc(
                            ExprKind::Literal(Literal::Enum {
                                enum_id: type_name.clone(),
                                member: field.clone(),
                            }),
                            loc,
                        ));
                    }
                }
                let base = self.lower_expr(ir, base)?;
                Ok(ir.alloc(
                    ExprKind::Field {
                        base,
                        field: field.clone(),
                    },
                    loc,
                ))
            }
            SurfaceKind::Index { base, index } => {
                let base = self.lower_expr(ir, base)?;
                let index = self.lower_expr(ir, index)?;
                Ok(ir.alloc(
                    ExprKind::Op {
                        op: Op::Slice,
                        args: vec![base, index],
                    },
                    loc,
                ))
            }
            SurfaceKind::Call { func, args } => {
                let name = match &func.kind {
                    SurfaceKind::Name(name) => name.clone(),
                    _ => {
                        return Err(self.err(
                            ErrorKind::Syntax(
                                "only concat() may be called inside expressions".to_string(),
                            ),
                            loc,
                        ))
                    }
                };
                if name != "concat" {
                    return Err(self.err(ErrorKind::UnknownFunction(name), loc));
                }
                if args.len() != 2 {
                    return Err(self.err(
                        ErrorKind::ArgumentCount {
                            op: "concat".to_string(),
                            expected: 2,
                            got: args.len(),
                        },
                        loc,
                    ));
                }
                let high = self.lower_expr(ir, &args[0])?;
                let low = self.lower_expr(ir, &args[1])?;
                Ok(ir.alloc(
                    ExprKind::Op {
                        op: Op::Concat,
                        args: vec![high, low],
                    },
                    loc,
                ))
            }
            SurfaceKind::Unary { op, operand } => {
                let operand = self.lower_expr(ir, operand)?;
                let op = match op {
                    UnaryOp::Not => Op::Not,
                };
                Ok(ir.alloc(
                    ExprKind::Op {
                        op,
                        args: vec![operand],
                    },
                    loc,
                ))
            }
            SurfaceKind::Binary { op, left, right } => {
                let left = self.lower_expr(ir, left)?;
                let right = self.lower_expr(ir, right)?;
                let op = match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::And => Op::And,
                    BinaryOp::Or => Op::Or,
                    BinaryOp::Shl => Op::Shl,
                    BinaryOp::Shr => Op::Shr,
                    BinaryOp::Eq => Op::Eq,
                    BinaryOp::Ne => Op::Ne,
                };
                Ok(ir.alloc(
                    ExprKind::Op {
                        op,
                        args: vec![left, right],
                    },
                    loc,
                ))
            }
            SurfaceKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.lower_expr(ir, cond)?;
                let then = self.lower_expr(ir, then)?;
                let otherwise = self.lower_expr(ir, otherwise)?;
                Ok(ir.alloc(
                    ExprKind::Op {
                        op: Op::Ternary,
                        args: vec![cond, then, otherwise],
                    },
                    loc,
                ))
            }
        }
    }
}

/// Parse and lower a description in one step
pub fn compile_to_ir(src_id: &str, source: &str) -> CompileResult<Ir> {
    let mut parser = crate::parser::Parser::new(src_id, source)?;
    let program = parser.parse_program()?;
    Frontend::new(src_id).lower(&program)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source: &str) -> CompileResult<Ir> {
        compile_to_ir("test", source)
    }

    #[test]
    fn test_declarations_are_consumed() {
        let ir = lower(
            "data0 = Input(BitVector(16)); \
             res = Output(BitVector(16)); \
             tmp = Intermediate(BitVector(16)); \
             res.assign(data0);",
        )
        .unwrap();
        assert_eq!(ir.inputs.len(), 1);
        assert_eq!(ir.outputs.len(), 1);
        assert_eq!(ir.intermediates.len(), 1);
        // Only the assignment is executable.
        assert_eq!(ir.body.len(), 1);
        assert!(matches!(ir.body[0], Statement::Assign { .. }));
    }

    #[test]
    fn test_redeclaration_fails() {
        let err = lower(
            "data0 = Input(BitVector(16)); \
             data0 = Input(BitVector(8));",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Redeclaration("data0".to_string()));
    }

    #[test]
    fn test_enum_name_collision_fails() {
        let err = lower(
            "enum Op { ADD, SUB } \
             Op = Input(BitVector(1));",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Redeclaration("Op".to_string()));
    }

    #[test]
    fn test_use_before_declaration_fails() {
        let err = lower(
            "res = Output(BitVector(16)); \
             res.assign(data0); \
             data0 = Input(BitVector(16));",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndeclaredName("data0".to_string()));
    }

    #[test]
    fn test_assign_arity_checked() {
        let err = lower(
            "a = Input(BitVector(4)); \
             b = Output(BitVector(4)); \
             b.assign(a, a);",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AssignArity(2));
    }

    #[test]
    fn test_if_chain_becomes_switch() {
        let ir = lower(
            "enum Op { ADD, SUB } \
             op = Input(Op); \
             a = Input(BitVector(8)); \
             b = Input(BitVector(8)); \
             res = Output(BitVector(8)); \
             if op == Op.ADD { res.assign(a + b); } \
             elif op == Op.SUB { res.assign(a - b); } \
             else { res.assign(a); }",
        )
        .unwrap();
        assert_eq!(ir.body.len(), 1);
        match &ir.body[0] {
            Statement::Switch { arms, default, .. } => {
                assert_eq!(arms.len(), 2);
                assert!(default.is_some());
            }
            other => panic!("Expected Switch, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_switch_subject_fails() {
        let err = lower(
            "enum Op { ADD, SUB } \
             op = Input(Op); \
             other = Input(Op); \
             x = Output(BitVector(1)); \
             one = Input(BitVector(1)); \
             if op == Op.ADD { x.assign(one); } \
             elif other == Op.SUB { x.assign(one); }",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedSwitch);
    }

    #[test]
    fn test_declaration_inside_block_rejected() {
        let err = lower(
            "enum Op { ADD, SUB } \
             op = Input(Op); \
             x = Output(BitVector(1)); \
             one = Input(BitVector(1)); \
             if op == Op.ADD { y = Input(BitVector(1)); }",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DisallowedStatement(_)));
    }

    #[test]
    fn test_unknown_enum_member_fails() {
        let err = lower(
            "enum Op { ADD, SUB } \
             op = Input(Op); \
             x = Output(BitVector(1)); \
             one = Input(BitVector(1)); \
             if op == Op.MUL { x.assign(one); }",
        )
        .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UnknownEnumMember {
                enum_id: "Op".to_string(),
                member: "MUL".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_function_rejected() {
        let err = lower(
            "a = Input(BitVector(4)); \
             b = Output(BitVector(4)); \
             b.assign(rotate(a));",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownFunction("rotate".to_string()));
    }

    #[test]
    fn test_malformed_declaration_reports_deepest_failure() {
        let err = lower("a = Input(Register(BitVector(x)));").unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::MalformedDeclaration("Expected integer".to_string())
        );
    }

    #[test]
    fn test_concat_lowered() {
        let ir = lower(
            "a = Input(BitVector(1)); \
             b = Input(BitVector(2)); \
             out = Output(BitVector(3)); \
             out.assign(concat(a, b));",
        )
        .unwrap();
        match &ir.body[0] {
            Statement::Assign { rhs, .. } => match &ir.expr(*rhs).kind {
                ExprKind::Op { op: Op::Concat, args } => assert_eq!(args.len(), 2),
                other => panic!("Expected concat, got {:?}", other),
            },
            other => panic!("Expected Assign, got {:?}", other),
        }
    }

    #[test]
    fn test_slice_assignment_lvalue() {
        let ir = lower(
            "r = Intermediate(Register(Array(BitVector(16), 4))); \
             idx = Input(BitVector(2)); \
             v = Input(BitVector(16)); \
             r[idx].assign(v);",
        )
        .unwrap();
        match &ir.body[0] {
            Statement::Assign { lhs, .. } => match &ir.expr(*lhs).kind {
                ExprKind::Op { op: Op::Slice, .. } => {}
                other => panic!("Expected slice lvalue, got {:?}", other),
            },
            other => panic!("Expected Assign, got {:?}", other),
        }
    }
}
