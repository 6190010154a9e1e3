//! Parser for PE descriptions
//!
//! Parses statements like:
//! - `data0 = Input(BitVector(16));`
//! - `res.assign(data0 + data1);`
//! - `if op_code.operation == Op.ADD { ... } elif ... else { ... }`
//!
//! The parser knows nothing about declarations versus assignments beyond
//! their surface shape; the frontend classifies and validates them.

use crate::ast::{BinaryOp, Expr, ExprKind, IfArm, Program, Stmt, UnaryOp};
use crate::error::{CompileError, CompileResult, ErrorKind, Loc};
use crate::lexer::{Lexer, Token};

/// Recursive-descent parser over the token stream
pub struct Parser {
    src_id: String,
    tokens: Vec<(Token, Loc)>,
    pos: usize,
    eof_loc: Loc,
}

impl Parser {
    pub fn new(src_id: impl Into<String>, source: &str) -> CompileResult<Self> {
        let src_id = src_id.into();
        let lexer = Lexer::new(src_id.clone(), source);
        let tokens = lexer.tokenize()?;
        let eof_loc = tokens
            .last()
            .map(|(_, loc)| *loc)
            .unwrap_or_else(|| Loc::new(1, 1));
        Ok(Self {
            src_id,
            tokens,
            pos: 0,
            eof_loc,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek2(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(t, _)| t)
    }

    /// Location of the current token (or of the end of input)
    fn loc(&self) -> Loc {
        self.tokens
            .get(self.pos)
            .map(|(_, loc)| *loc)
            .unwrap_or(self.eof_loc)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches expected (by variant)
    fn check(&self, expected: &Token) -> bool {
        match self.peek() {
            Some(tok) => std::mem::discriminant(tok) == std::mem::discriminant(expected),
            None => false,
        }
    }

    fn err(&self, kind: ErrorKind) -> CompileError {
        CompileError::new(kind, &self.src_id, self.loc())
    }

    fn err_at(&self, kind: ErrorKind, loc: Loc) -> CompileError {
        CompileError::new(kind, &self.src_id, loc)
    }

    /// Consume the current token if it matches, otherwise error
    fn expect(&mut self, expected: Token) -> CompileResult<Token> {
        if self.check(&expected) {
            Ok(self.advance().unwrap())
        } else {
            Err(self.err(ErrorKind::Syntax(format!(
                "expected '{}', got {}",
                expected,
                self.describe_current()
            ))))
        }
    }

    fn expect_ident(&mut self) -> CompileResult<(String, Loc)> {
        let loc = self.loc();
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok((name, loc))
            }
            _ => Err(self.err(ErrorKind::Syntax(format!(
                "expected identifier, got {}",
                self.describe_current()
            )))),
        }
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(tok) => format!("'{}'", tok),
            None => "end of input".to_string(),
        }
    }

    /// Parse a complete description
    pub fn parse_program(&mut self) -> CompileResult<Program> {
        let mut statements = Vec::new();
        while self.peek().is_some() {
            statements.push(self.parse_stmt()?);
        }
        Ok(Program { statements })
    }

    fn parse_stmt(&mut self) -> CompileResult<Stmt> {
        let loc = self.loc();
        match self.peek() {
            Some(Token::Enum) => self.parse_enum_def(),
            Some(Token::If) => self.parse_if(),
            Some(Token::Pass) => {
                self.advance();
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Pass { loc })
            }
            Some(tok) => {
                if let Some(kw) = tok.forbidden_keyword() {
                    return Err(
                        self.err_at(ErrorKind::DisallowedKeyword(kw.to_string()), loc)
                    );
                }
                // `name = ...` is a declaration; everything else must be a
                // call statement such as `res.assign(...)`.
                if matches!(self.peek(), Some(Token::Ident(_)))
                    && matches!(self.peek2(), Some(Token::Equals))
                {
                    let (name, loc) = self.expect_ident()?;
                    self.expect(Token::Equals)?;
                    let ty = self.parse_expr()?;
                    self.expect(Token::Semicolon)?;
                    return Ok(Stmt::Decl { name, ty, loc });
                }
                let call = self.parse_expr()?;
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Call { call, loc })
            }
            None => Err(self.err(ErrorKind::Syntax("unexpected end of input".to_string()))),
        }
    }

    /// Parse `enum Name { A, B, C }`
    fn parse_enum_def(&mut self) -> CompileResult<Stmt> {
        let loc = self.loc();
        self.expect(Token::Enum)?;
        let (name, _) = self.expect_ident()?;
        self.expect(Token::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&Token::RBrace) {
            let (member, member_loc) = self.expect_ident()?;
            if members.contains(&member) {
                return Err(self.err_at(ErrorKind::Redeclaration(member), member_loc));
            }
            members.push(member);
            if self.check(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RBrace)?;
        if members.is_empty() {
            return Err(self.err_at(
                ErrorKind::MalformedDeclaration(format!("enum '{}' has no members", name)),
                loc,
            ));
        }
        Ok(Stmt::EnumDef { name, members, loc })
    }

    fn parse_if(&mut self) -> CompileResult<Stmt> {
        let loc = self.loc();
        self.expect(Token::If)?;
        let mut arms = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        arms.push(IfArm { cond, body });
        let mut default = None;
        loop {
            if self.check(&Token::Elif) {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                arms.push(IfArm { cond, body });
            } else if self.check(&Token::Else) {
                self.advance();
                default = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If { arms, default, loc })
    }

    fn parse_block(&mut self) -> CompileResult<Vec<Stmt>> {
        self.expect(Token::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(self.err(ErrorKind::Syntax(
                    "unexpected end of input inside block".to_string(),
                )));
            }
            statements.push(self.parse_stmt()?);
        }
        self.expect(Token::RBrace)?;
        Ok(statements)
    }

    /// Parse an expression (lowest precedence: ternary)
    pub fn parse_expr(&mut self) -> CompileResult<Expr> {
        let loc = self.loc();
        let cond = self.parse_or()?;
        if self.check(&Token::Question) {
            self.advance();
            let then = self.parse_expr()?;
            self.expect(Token::Colon)?;
            let otherwise = self.parse_expr()?;
            return Ok(Expr::new(
                ExprKind::Ternary {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
                loc,
            ));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check(&Token::Pipe) {
            let loc = left.loc;
            self.advance();
            let right = self.parse_and()?;
            left = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                loc,
            );
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.check(&Token::Amp) {
            let loc = left.loc;
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                loc,
            );
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_shift()?;
        loop {
            let op = if self.check(&Token::EqEq) {
                BinaryOp::Eq
            } else if self.check(&Token::NotEq) {
                BinaryOp::Ne
            } else {
                break;
            };
            let loc = left.loc;
            self.advance();
            let right = self.parse_shift()?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                loc,
            );
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.check(&Token::Shl) {
                BinaryOp::Shl
            } else if self.check(&Token::Shr) {
                BinaryOp::Shr
            } else {
                break;
            };
            let loc = left.loc;
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                loc,
            );
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.check(&Token::Plus) {
                BinaryOp::Add
            } else if self.check(&Token::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let loc = left.loc;
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                loc,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> CompileResult<Expr> {
        if self.check(&Token::Tilde) {
            let loc = self.loc();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                loc,
            ));
        }
        self.parse_postfix()
    }

    /// Parse postfix expressions: `x.f`, `x[i]`, `f(args)`
    fn parse_postfix(&mut self) -> CompileResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&Token::Dot) {
                self.advance();
                let (field, _) = self.expect_ident()?;
                let loc = expr.loc;
                expr = Expr::new(
                    ExprKind::Field {
                        base: Box::new(expr),
                        field,
                    },
                    loc,
                );
            } else if self.check(&Token::LBracket) {
                self.advance();
                let index = self.parse_expr()?;
                self.expect(Token::RBracket)?;
                let loc = expr.loc;
                expr = Expr::new(
                    ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                    loc,
                );
            } else if self.check(&Token::LParen) {
                let args = self.parse_args()?;
                let loc = expr.loc;
                expr = Expr::new(
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                    },
                    loc,
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parse call arguments: `(arg1, arg2, ...)`
    fn parse_args(&mut self) -> CompileResult<Vec<Expr>> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            args.push(self.parse_expr()?);
            while self.check(&Token::Comma) {
                self.advance();
                if self.check(&Token::RParen) {
                    break; // Trailing comma
                }
                args.push(self.parse_expr()?);
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> CompileResult<Expr> {
        let loc = self.loc();
        match self.peek() {
            Some(Token::Int(n)) => {
                let n = *n;
                self.advance();
                Ok(Expr::new(ExprKind::Int(n), loc))
            }
            Some(Token::Bits((width, value))) => {
                let (width, value) = (*width, *value);
                self.advance();
                if width < 64 && value >> width != 0 {
                    return Err(self.err_at(ErrorKind::LiteralTooWide { value, width }, loc));
                }
                Ok(Expr::new(ExprKind::Bits { width, value }, loc))
            }
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok(Expr::new(ExprKind::Name(name), loc))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(tok) => {
                if let Some(kw) = tok.forbidden_keyword() {
                    return Err(
                        self.err_at(ErrorKind::DisallowedKeyword(kw.to_string()), loc)
                    );
                }
                Err(self.err(ErrorKind::Syntax(format!(
                    "unexpected token {}",
                    self.describe_current()
                ))))
            }
            None => Err(self.err(ErrorKind::Syntax("unexpected end of input".to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new("test", source).unwrap().parse_program().unwrap()
    }

    #[test]
    fn test_parse_declaration() {
        let program = parse("data0 = Input(BitVector(16));");
        assert_eq!(program.statements.len(), 1);
        if let Stmt::Decl { name, ty, .. } = &program.statements[0] {
            assert_eq!(name, "data0");
            assert!(matches!(ty.kind, ExprKind::Call { .. }));
        } else {
            panic!("Expected Decl");
        }
    }

    #[test]
    fn test_parse_assign_call() {
        let program = parse("res.assign(data0 + data1);");
        if let Stmt::Call { call, .. } = &program.statements[0] {
            if let ExprKind::Call { func, args } = &call.kind {
                assert!(matches!(&func.kind, ExprKind::Field { field, .. } if field == "assign"));
                assert_eq!(args.len(), 1);
                assert!(matches!(
                    &args[0].kind,
                    ExprKind::Binary { op: BinaryOp::Add, .. }
                ));
            } else {
                panic!("Expected Call expression");
            }
        } else {
            panic!("Expected Call statement");
        }
    }

    #[test]
    fn test_parse_enum_def() {
        let program = parse("enum Op { ADD, SUB }");
        if let Stmt::EnumDef { name, members, .. } = &program.statements[0] {
            assert_eq!(name, "Op");
            assert_eq!(members, &vec!["ADD".to_string(), "SUB".to_string()]);
        } else {
            panic!("Expected EnumDef");
        }
    }

    #[test]
    fn test_parse_if_chain() {
        let program = parse(
            "if op.sel == Op.ADD { res.assign(a + b); } \
             elif op.sel == Op.SUB { res.assign(a - b); } \
             else { pass; }",
        );
        if let Stmt::If { arms, default, .. } = &program.statements[0] {
            assert_eq!(arms.len(), 2);
            assert!(default.is_some());
        } else {
            panic!("Expected If");
        }
    }

    #[test]
    fn test_parse_ternary_and_slice() {
        let program = parse("out.assign(sel ? a[3] : b >> 1);");
        if let Stmt::Call { call, .. } = &program.statements[0] {
            if let ExprKind::Call { args, .. } = &call.kind {
                assert!(matches!(&args[0].kind, ExprKind::Ternary { .. }));
            } else {
                panic!("Expected Call expression");
            }
        } else {
            panic!("Expected Call statement");
        }
    }

    #[test]
    fn test_reject_while_keyword() {
        let err = Parser::new("test", "while { pass; }")
            .unwrap()
            .parse_program()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DisallowedKeyword("while".to_string()));
    }

    #[test]
    fn test_reject_oversized_literal_value() {
        let err = Parser::new("test", "x.assign(4'd16);")
            .unwrap()
            .parse_program()
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::LiteralTooWide {
                value: 16,
                width: 4
            }
        );
    }

    #[test]
    fn test_subject_shape_equality() {
        let a = parse("x.assign(op.sel);");
        let b = parse("x.assign(op.sel);");
        let (ea, eb) = match (&a.statements[0], &b.statements[0]) {
            (Stmt::Call { call: ca, .. }, Stmt::Call { call: cb, .. }) => (ca, cb),
            _ => panic!("Expected Call statements"),
        };
        assert!(ea.same_shape(eb));
    }
}
