//! Lexer for PE descriptions using logos
//!
//! Supports tokens like:
//! - Identifiers: data0, FlagSel, lut_code
//! - Integers: 0, 15 (compile-time indices)
//! - Sized bit-vector literals: 16'd5, 8'b00000110, 8'hff
//! - Operators: + - ~ & | << >> == != ? :
//! - Punctuation: ( ) { } [ ] , ; . =
//! - Keywords: enum, if, elif, else, pass
//!
//! Loop and control-transfer keywords are lexed but rejected by the parser
//! with a located error; the language admits no unbounded control flow.

use logos::Logos;

use crate::error::{CompileError, CompileResult, ErrorKind, Loc};

fn parse_sized_literal(slice: &str) -> Option<(u32, u64)> {
    let (width, rest) = slice.split_once('\'')?;
    let width: u32 = width.parse().ok()?;
    if width == 0 || width > 64 {
        return None;
    }
    let radix = match rest.as_bytes().first()? {
        b'b' => 2,
        b'd' => 10,
        b'h' => 16,
        _ => return None,
    };
    let digits = rest[1..].replace('_', "");
    let value = u64::from_str_radix(&digits, radix).ok()?;
    Some((width, value))
}

/// Token types for the PE description language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // Literals
    #[regex(r"[0-9]+'[bdh][0-9a-fA-F_]+", |lex| parse_sized_literal(lex.slice()))]
    Bits((u32, u64)),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u64>().ok())]
    Int(u64),

    // Keywords
    #[token("enum")]
    Enum,

    #[token("if")]
    If,

    #[token("elif")]
    Elif,

    #[token("else")]
    Else,

    #[token("pass")]
    Pass,

    // Recognized but rejected keywords (statement whitelist)
    #[token("for")]
    For,

    #[token("while")]
    While,

    #[token("loop")]
    Loop,

    #[token("return")]
    Return,

    #[token("break")]
    Break,

    #[token("continue")]
    Continue,

    #[token("import")]
    Import,

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Operators
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("~")]
    Tilde,

    #[token("&")]
    Amp,

    #[token("|")]
    Pipe,

    #[token("<<")]
    Shl,

    #[token(">>")]
    Shr,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("=")]
    Equals,

    #[token("?")]
    Question,

    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

    // Punctuation
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,
}

impl Token {
    /// The surface keyword for a rejected control-flow token, if any
    pub fn forbidden_keyword(&self) -> Option<&'static str> {
        match self {
            Token::For => Some("for"),
            Token::While => Some("while"),
            Token::Loop => Some("loop"),
            Token::Return => Some("return"),
            Token::Break => Some("break"),
            Token::Continue => Some("continue"),
            Token::Import => Some("import"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Bits((w, v)) => write!(f, "{}'d{}", w, v),
            Token::Int(n) => write!(f, "{}", n),
            Token::Enum => write!(f, "enum"),
            Token::If => write!(f, "if"),
            Token::Elif => write!(f, "elif"),
            Token::Else => write!(f, "else"),
            Token::Pass => write!(f, "pass"),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Tilde => write!(f, "~"),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Shl => write!(f, "<<"),
            Token::Shr => write!(f, ">>"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Equals => write!(f, "="),
            Token::Question => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            other => write!(f, "{}", other.forbidden_keyword().unwrap_or("?")),
        }
    }
}

/// Lexer that turns a description source into located tokens
pub struct Lexer<'source> {
    src_id: String,
    source: &'source str,
    line_starts: Vec<usize>,
}

impl<'source> Lexer<'source> {
    pub fn new(src_id: impl Into<String>, source: &'source str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            src_id: src_id.into(),
            source,
            line_starts,
        }
    }

    /// Convert a byte offset to a 1-based line/column position
    pub fn loc(&self, offset: usize) -> Loc {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Loc::new((line + 1) as u32, (offset - self.line_starts[line] + 1) as u32)
    }

    /// Lex the whole source, failing on the first unrecognized token
    pub fn tokenize(&self) -> CompileResult<Vec<(Token, Loc)>> {
        let mut tokens = Vec::new();
        let mut lexer = Token::lexer(self.source);
        while let Some(result) = lexer.next() {
            let loc = self.loc(lexer.span().start);
            match result {
                Ok(token) => tokens.push((token, loc)),
                Err(()) => {
                    return Err(CompileError::new(ErrorKind::Lex, &self.src_id, loc));
                }
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new("test", source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            tokens("data0 + data1"),
            vec![
                Token::Ident("data0".to_string()),
                Token::Plus,
                Token::Ident("data1".to_string()),
            ]
        );
    }

    #[test]
    fn test_sized_literals() {
        assert_eq!(tokens("16'd5"), vec![Token::Bits((16, 5))]);
        assert_eq!(tokens("8'b00000110"), vec![Token::Bits((8, 6))]);
        assert_eq!(tokens("8'hff"), vec![Token::Bits((8, 255))]);
    }

    #[test]
    fn test_declaration() {
        assert_eq!(
            tokens("res = Output(BitVector(16));"),
            vec![
                Token::Ident("res".to_string()),
                Token::Equals,
                Token::Ident("Output".to_string()),
                Token::LParen,
                Token::Ident("BitVector".to_string()),
                Token::LParen,
                Token::Int(16),
                Token::RParen,
                Token::RParen,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_shift_and_compare() {
        assert_eq!(
            tokens("a >> b == 1'd0"),
            vec![
                Token::Ident("a".to_string()),
                Token::Shr,
                Token::Ident("b".to_string()),
                Token::EqEq,
                Token::Bits((1, 0)),
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            tokens("pass; // trailing comment\n// whole line\npass;"),
            vec![Token::Pass, Token::Semicolon, Token::Pass, Token::Semicolon]
        );
    }

    #[test]
    fn test_locations() {
        let lexer = Lexer::new("test", "a\n  b");
        let toks = lexer.tokenize().unwrap();
        assert_eq!(toks[0].1, Loc::new(1, 1));
        assert_eq!(toks[1].1, Loc::new(2, 3));
    }

    #[test]
    fn test_forbidden_keywords_lex() {
        assert_eq!(tokens("while"), vec![Token::While]);
        assert_eq!(Token::While.forbidden_keyword(), Some("while"));
    }

    #[test]
    fn test_oversized_literal_is_lex_error() {
        // 65-bit literals are not representable.
        let result = Lexer::new("test", "65'd0").tokenize();
        assert!(result.is_err());
    }
}
