//! Token types for the Kiln lexer.
//!
//! Defines [`TokenKind`] covering every lexeme in Kiln and [`Token`],
//! which pairs a kind with a source [`Span`].

use kiln_types::Span;
use std::fmt;

/// All reserved identifiers in Kiln.
///
/// Type names (`number`, `string`, `list`, ...) are deliberately absent:
/// `string` and `list` are also library names, so the parser reads type
/// annotations from plain identifiers.
pub const ALL_KEYWORDS: &[&str] = &[
    // Declarations & statements
    "fn", "let", "set", "if", "else", "while", "for", "in", "return", "break", "continue",
    // Literals
    "true", "false", "nil",
    // Operators
    "not", "and", "or",
];

// ─────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────

/// A single token produced by the Kiln lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns `true` if this token is a reserved keyword.
    pub fn is_keyword(&self) -> bool {
        self.kind.is_keyword()
    }
}

// ─────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────

/// Every token kind in the Kiln language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals ──────────────────────────────────────────────

    /// Numeric literal (integer or decimal): `42`, `3.14`
    NumberLit(f64),
    /// Complete string literal with no interpolation: `"hello"`
    StringLiteral(String),
    True,
    False,
    Nil,

    // ── String Interpolation ─────────────────────────────────

    /// Start of an interpolated string: text before the first `${`.
    /// For `"hello ${name}"`, carries `"hello "`.
    StringStart(String),
    /// Text between a `}` and the next `${` inside an interpolated string.
    StringPart(String),
    /// Text after the last `}` up to the closing `"`.
    StringEnd(String),
    /// The `${` that opens an interpolation expression.
    InterpolationStart,
    /// The `}` that closes an interpolation expression.
    InterpolationEnd,

    // ── Identifiers ──────────────────────────────────────────

    Identifier(String),

    // ── Keywords ─────────────────────────────────────────────

    Fn,
    Let,
    Set,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Break,
    Continue,
    Not,
    And,
    Or,

    // ── Operators ────────────────────────────────────────────

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    BangEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,

    // ── Punctuation ──────────────────────────────────────────

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Eq,
    Arrow,

    // ── Special ──────────────────────────────────────────────

    /// Newline (statement separator)
    Newline,
    Eof,
}

impl TokenKind {
    /// Look up a reserved identifier. Returns `None` for user identifiers.
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        Some(match s {
            "fn" => TokenKind::Fn,
            "let" => TokenKind::Let,
            "set" => TokenKind::Set,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            "not" => TokenKind::Not,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            _ => return None,
        })
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Fn
                | TokenKind::Let
                | TokenKind::Set
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::In
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
                | TokenKind::Not
                | TokenKind::And
                | TokenKind::Or
        )
    }

    /// Tokens that can begin a statement; used as parser resync points.
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            TokenKind::Fn
                | TokenKind::Let
                | TokenKind::Set
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Literals
            TokenKind::NumberLit(n) => write!(f, "{n}"),
            TokenKind::StringLiteral(s) => write!(f, "\"{s}\""),
            TokenKind::True => f.write_str("true"),
            TokenKind::False => f.write_str("false"),
            TokenKind::Nil => f.write_str("nil"),
            // String interpolation
            TokenKind::StringStart(_) => f.write_str("string start"),
            TokenKind::StringPart(_) => f.write_str("string part"),
            TokenKind::StringEnd(_) => f.write_str("string end"),
            TokenKind::InterpolationStart => f.write_str("${"),
            TokenKind::InterpolationEnd => f.write_str("interpolation end"),
            TokenKind::Identifier(s) => f.write_str(s),
            // Keywords
            TokenKind::Fn => f.write_str("fn"),
            TokenKind::Let => f.write_str("let"),
            TokenKind::Set => f.write_str("set"),
            TokenKind::If => f.write_str("if"),
            TokenKind::Else => f.write_str("else"),
            TokenKind::While => f.write_str("while"),
            TokenKind::For => f.write_str("for"),
            TokenKind::In => f.write_str("in"),
            TokenKind::Return => f.write_str("return"),
            TokenKind::Break => f.write_str("break"),
            TokenKind::Continue => f.write_str("continue"),
            TokenKind::Not => f.write_str("not"),
            TokenKind::And => f.write_str("and"),
            TokenKind::Or => f.write_str("or"),
            // Operators
            TokenKind::Plus => f.write_str("+"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Slash => f.write_str("/"),
            TokenKind::Percent => f.write_str("%"),
            TokenKind::EqEq => f.write_str("=="),
            TokenKind::BangEq => f.write_str("!="),
            TokenKind::Less => f.write_str("<"),
            TokenKind::Greater => f.write_str(">"),
            TokenKind::LessEq => f.write_str("<="),
            TokenKind::GreaterEq => f.write_str(">="),
            // Punctuation
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::LBrace => f.write_str("{"),
            TokenKind::RBrace => f.write_str("}"),
            TokenKind::LBracket => f.write_str("["),
            TokenKind::RBracket => f.write_str("]"),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Colon => f.write_str(":"),
            TokenKind::Dot => f.write_str("."),
            TokenKind::Eq => f.write_str("="),
            TokenKind::Arrow => f.write_str("->"),
            TokenKind::Newline => f.write_str("newline"),
            TokenKind::Eof => f.write_str("end of file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_keyword_recognises_all() {
        for &kw in ALL_KEYWORDS {
            let kind = TokenKind::from_keyword(kw)
                .unwrap_or_else(|| panic!("from_keyword should recognise '{kw}'"));
            assert!(kind.is_keyword(), "is_keyword should hold for '{kw}'");
        }
    }

    #[test]
    fn test_type_and_library_names_are_identifiers() {
        for name in ["number", "string", "list", "bool", "task", "any", "math", "core"] {
            assert!(
                TokenKind::from_keyword(name).is_none(),
                "'{name}' must stay an identifier"
            );
        }
    }

    #[test]
    fn test_keyword_case_sensitivity() {
        assert!(TokenKind::from_keyword("while").is_some());
        assert!(TokenKind::from_keyword("While").is_none());
        assert!(TokenKind::from_keyword("FN").is_none());
    }

    #[test]
    fn test_is_keyword_false_for_non_keywords() {
        let kinds = [
            TokenKind::NumberLit(42.0),
            TokenKind::StringLiteral("hi".into()),
            TokenKind::Identifier("foo".into()),
            TokenKind::Plus,
            TokenKind::LParen,
            TokenKind::Newline,
            TokenKind::Eof,
            TokenKind::InterpolationStart,
        ];
        for kind in &kinds {
            assert!(!kind.is_keyword(), "is_keyword should be false for {kind:?}");
        }
    }

    #[test]
    fn test_display_roundtrip_keywords() {
        for &kw in ALL_KEYWORDS {
            let kind = TokenKind::from_keyword(kw).unwrap();
            assert_eq!(kind.to_string(), kw);
        }
    }

    #[test]
    fn test_display_operators_and_literals() {
        assert_eq!(TokenKind::BangEq.to_string(), "!=");
        assert_eq!(TokenKind::Arrow.to_string(), "->");
        assert_eq!(TokenKind::NumberLit(3.5).to_string(), "3.5");
        assert_eq!(TokenKind::StringLiteral("hi".into()).to_string(), "\"hi\"");
        assert_eq!(TokenKind::Eof.to_string(), "end of file");
    }

    #[test]
    fn test_statement_starters() {
        assert!(TokenKind::Let.starts_statement());
        assert!(TokenKind::Break.starts_statement());
        assert!(!TokenKind::Else.starts_statement());
        assert!(!TokenKind::Identifier("x".into()).starts_statement());
    }
}
