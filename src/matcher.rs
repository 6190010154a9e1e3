//! Structural matcher for type expressions
//!
//! Recognizes the type grammar on declaration right-hand sides, e.g.
//! `Input(Configuration(Encoded(Op, operation, BitVector(1), signed)))`.
//! Alternatives are tried in a fixed left-to-right order and the first
//! success wins; when every alternative fails, all collected failures are
//! returned so the frontend can report the most specific one (the deepest).
//!
//! Enum base types resolve only against identifiers already registered as
//! user-defined enum types; the set is closed at matcher construction.

use indexmap::IndexMap;

use crate::ast::{Expr, ExprKind};
use crate::error::Loc;
use crate::types::{BaseType, QualifiedType, TopLevelType, UnqualifiedType};

/// One failed alternative, with how deep into the grammar it got
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFailure {
    pub message: String,
    pub loc: Loc,
    pub depth: u32,
}

pub type MatchResult<T> = Result<T, Vec<MatchFailure>>;

/// Pick the most specific failure: deepest first, earliest on ties
pub fn most_specific(failures: &[MatchFailure]) -> &MatchFailure {
    failures
        .iter()
        .max_by_key(|f| f.depth)
        .expect("failed match carries at least one failure")
}

/// Matcher for the constrained type-expression sub-grammar
pub struct TypeMatcher<'a> {
    user_defined_types: &'a IndexMap<String, Vec<String>>,
}

impl<'a> TypeMatcher<'a> {
    pub fn new(user_defined_types: &'a IndexMap<String, Vec<String>>) -> Self {
        Self { user_defined_types }
    }

    fn fail<T>(message: impl Into<String>, node: &Expr, depth: u32) -> MatchResult<T> {
        Err(vec![MatchFailure {
            message: message.into(),
            loc: node.loc,
            depth,
        }])
    }

    /// `Input(q)` | `Output(q)` | `Intermediate(q)`
    pub fn match_top_level(&self, node: &Expr) -> MatchResult<TopLevelType> {
        let mut failures = Vec::new();
        match self.match_wrapped(node, "Input", 0) {
            Ok(t) => return Ok(TopLevelType::Input(t)),
            Err(f) => failures.extend(f),
        }
        match self.match_wrapped(node, "Output", 0) {
            Ok(t) => return Ok(TopLevelType::Output(t)),
            Err(f) => failures.extend(f),
        }
        match self.match_wrapped(node, "Intermediate", 0) {
            Ok(t) => return Ok(TopLevelType::Intermediate(t)),
            Err(f) => failures.extend(f),
        }
        Err(failures)
    }

    /// A single-argument wrapper call around a qualified type
    fn match_wrapped(&self, node: &Expr, name: &str, depth: u32) -> MatchResult<QualifiedType> {
        let args = match Self::call_args(node, name) {
            Some(args) => args,
            None => return Self::fail(format!("Expected {}", name), node, depth),
        };
        if args.len() != 1 {
            return Self::fail(format!("{} expects 1 argument", name), node, depth);
        }
        self.match_qualified(&args[0], depth + 1)
    }

    /// `UnqualifiedType` | `Register(q)` | `Configuration(q)`
    fn match_qualified(&self, node: &Expr, depth: u32) -> MatchResult<QualifiedType> {
        let mut failures = Vec::new();
        match self.match_unqualified(node, depth) {
            Ok(t) => return Ok(QualifiedType::Unqualified(t)),
            Err(f) => failures.extend(f),
        }
        match self.match_wrapped(node, "Register", depth) {
            Ok(t) => return Ok(QualifiedType::Register(Box::new(t))),
            Err(f) => failures.extend(f),
        }
        match self.match_wrapped(node, "Configuration", depth) {
            Ok(t) => return Ok(QualifiedType::Configuration(Box::new(t))),
            Err(f) => failures.extend(f),
        }
        Err(failures)
    }

    /// `BaseType` | `Array(t, size)` | `Encoded(...)`
    fn match_unqualified(&self, node: &Expr, depth: u32) -> MatchResult<UnqualifiedType> {
        let mut failures = Vec::new();
        match self.match_base(node, depth) {
            Ok(t) => return Ok(UnqualifiedType::Base(t)),
            Err(f) => failures.extend(f),
        }
        match self.match_array(node, depth) {
            Ok(t) => return Ok(t),
            Err(f) => failures.extend(f),
        }
        match self.match_encoded(node, depth) {
            Ok(t) => return Ok(t),
            Err(f) => failures.extend(f),
        }
        Err(failures)
    }

    /// `BitVector(width)` | enum name
    fn match_base(&self, node: &Expr, depth: u32) -> MatchResult<BaseType> {
        let mut failures = Vec::new();
        match self.match_bit_vector(node, depth) {
            Ok(t) => return Ok(t),
            Err(f) => failures.extend(f),
        }
        match self.match_enum(node, depth) {
            Ok(t) => return Ok(t),
            Err(f) => failures.extend(f),
        }
        Err(failures)
    }

    fn match_bit_vector(&self, node: &Expr, depth: u32) -> MatchResult<BaseType> {
        let args = match Self::call_args(node, "BitVector") {
            Some(args) => args,
            None => return Self::fail("Expected BitVector", node, depth),
        };
        if args.len() != 1 {
            return Self::fail("BitVector expects 1 argument", node, depth);
        }
        let width = Self::match_int(&args[0], depth + 1)?;
        if width == 0 || width > 64 {
            return Self::fail(
                format!("BitVector width must be in 1..=64, got {}", width),
                &args[0],
                depth + 1,
            );
        }
        Ok(BaseType::BitVector(width as u32))
    }

    fn match_enum(&self, node: &Expr, depth: u32) -> MatchResult<BaseType> {
        if let ExprKind::Name(id) = &node.kind {
            if self.user_defined_types.contains_key(id) {
                return Ok(BaseType::Enum(id.clone()));
            }
        }
        Self::fail("Expected enum", node, depth)
    }

    fn match_array(&self, node: &Expr, depth: u32) -> MatchResult<UnqualifiedType> {
        let args = match Self::call_args(node, "Array") {
            Some(args) => args,
            None => return Self::fail("Expected Array", node, depth),
        };
        if args.len() != 2 {
            return Self::fail("Array expects 2 arguments", node, depth);
        }
        let elem = self.match_unqualified(&args[0], depth + 1)?;
        let size = Self::match_int(&args[1], depth + 1)?;
        if size == 0 {
            return Self::fail("Array size must be positive", &args[1], depth + 1);
        }
        Ok(UnqualifiedType::Array(Box::new(elem), size as usize))
    }

    /// `Encoded(Type, name, Type, name, ...)`: even, non-zero argument
    /// count, alternating base types and unique field names
    fn match_encoded(&self, node: &Expr, depth: u32) -> MatchResult<UnqualifiedType> {
        let args = match Self::call_args(node, "Encoded") {
            Some(args) => args,
            None => return Self::fail("Expected Encoded", node, depth),
        };
        if args.is_empty() || args.len() % 2 != 0 {
            return Self::fail("Expected even number of arguments >= 2", node, depth);
        }
        let mut fields = IndexMap::new();
        for pair in args.chunks(2) {
            let base = self.match_base(&pair[0], depth + 1)?;
            let name = match &pair[1].kind {
                ExprKind::Name(name) if !fields.contains_key(name) => name.clone(),
                _ => return Self::fail("Expected unique field name", &pair[1], depth + 1),
            };
            fields.insert(name, base);
        }
        Ok(UnqualifiedType::Encoded(fields))
    }

    fn match_int(node: &Expr, depth: u32) -> MatchResult<u64> {
        match &node.kind {
            ExprKind::Int(n) => Ok(*n),
            _ => Self::fail("Expected integer", node, depth),
        }
    }

    fn call_args<'n>(node: &'n Expr, name: &str) -> Option<&'n [Expr]> {
        match &node.kind {
            ExprKind::Call { func, args } => match &func.kind {
                ExprKind::Name(id) if id == name => Some(args),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn type_expr(source: &str) -> Expr {
        Parser::new("test", source).unwrap().parse_expr().unwrap()
    }

    fn enums() -> IndexMap<String, Vec<String>> {
        let mut map = IndexMap::new();
        map.insert(
            "Op".to_string(),
            vec!["ADD".to_string(), "SUB".to_string()],
        );
        map
    }

    #[test]
    fn test_match_plain_input() {
        let enums = enums();
        let matcher = TypeMatcher::new(&enums);
        let node = type_expr("Input(BitVector(16))");
        let matched = matcher.match_top_level(&node).unwrap();
        assert_eq!(
            matched,
            TopLevelType::Input(QualifiedType::Unqualified(UnqualifiedType::bit_vector(16)))
        );
    }

    #[test]
    fn test_match_nested_qualifiers() {
        let enums = enums();
        let matcher = TypeMatcher::new(&enums);
        let node = type_expr("Input(Configuration(Register(BitVector(8))))");
        let matched = matcher.match_top_level(&node).unwrap();
        let q = match matched {
            TopLevelType::Input(q) => q,
            other => panic!("Expected Input, got {:?}", other),
        };
        assert!(q.qualifiers().configuration);
        assert!(q.qualifiers().register);
    }

    #[test]
    fn test_match_enum_base() {
        let enums = enums();
        let matcher = TypeMatcher::new(&enums);
        let node = type_expr("Intermediate(Op)");
        let matched = matcher.match_top_level(&node).unwrap();
        assert_eq!(
            matched,
            TopLevelType::Intermediate(QualifiedType::Unqualified(
                UnqualifiedType::enumeration("Op")
            ))
        );
    }

    #[test]
    fn test_unknown_enum_rejected() {
        let enums = enums();
        let matcher = TypeMatcher::new(&enums);
        let node = type_expr("Input(FlagSel)");
        assert!(matcher.match_top_level(&node).is_err());
    }

    #[test]
    fn test_match_encoded() {
        let enums = enums();
        let matcher = TypeMatcher::new(&enums);
        let node = type_expr("Input(Configuration(Encoded(Op, operation, BitVector(1), signed)))");
        let matched = matcher.match_top_level(&node).unwrap();
        let fields = match matched.qualified().unqualified() {
            UnqualifiedType::Encoded(fields) => fields,
            other => panic!("Expected Encoded, got {:?}", other),
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["operation"], BaseType::Enum("Op".to_string()));
        assert_eq!(fields["signed"], BaseType::BitVector(1));
    }

    #[test]
    fn test_encoded_odd_args_rejected() {
        let enums = enums();
        let matcher = TypeMatcher::new(&enums);
        let node = type_expr("Input(Encoded(Op, operation, Op))");
        let failures = matcher.match_top_level(&node).unwrap_err();
        assert!(failures
            .iter()
            .any(|f| f.message.contains("even number of arguments")));
    }

    #[test]
    fn test_encoded_duplicate_field_rejected() {
        let enums = enums();
        let matcher = TypeMatcher::new(&enums);
        let node = type_expr("Input(Encoded(Op, operation, Op, operation))");
        let failures = matcher.match_top_level(&node).unwrap_err();
        assert!(failures
            .iter()
            .any(|f| f.message.contains("unique field name")));
    }

    #[test]
    fn test_match_register_file() {
        let enums = enums();
        let matcher = TypeMatcher::new(&enums);
        let node = type_expr("Intermediate(Register(Array(BitVector(16), 32)))");
        let matched = matcher.match_top_level(&node).unwrap();
        let q = matched.qualified();
        assert!(q.qualifiers().register);
        assert_eq!(
            q.unqualified(),
            &UnqualifiedType::Array(Box::new(UnqualifiedType::bit_vector(16)), 32)
        );
    }

    #[test]
    fn test_most_specific_failure_is_deepest() {
        let enums = enums();
        let matcher = TypeMatcher::new(&enums);
        // The BitVector argument is malformed two levels down.
        let node = type_expr("Input(Register(BitVector(x)))");
        let failures = matcher.match_top_level(&node).unwrap_err();
        let best = most_specific(&failures);
        assert_eq!(best.message, "Expected integer");
    }
}
