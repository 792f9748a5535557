//! Kiln lexer: converts source text into a token stream.
//!
//! Lexing never fails outright. Malformed input is reported through the
//! returned diagnostics and the token stream always ends with `Eof`.

pub mod lexer;
pub mod token;

pub use lexer::{LexResult, Lexer};
pub use token::{Token, TokenKind, ALL_KEYWORDS};
