//! Kiln parser: converts a token stream into an AST.
//!
//! The parser is error-tolerant. [`parse`] always returns a program,
//! partial when the source is malformed, alongside every lexer and parser
//! diagnostic.

mod parse_decl;
mod parse_expr;
mod parse_stmt;
mod parse_type;
mod parser;

pub use parser::{ParseResult, Parser, MAX_NESTING_DEPTH};

use kiln_lexer::Lexer;
use kiln_types::SourceFile;

/// Lex and parse a source file in one step.
pub fn parse(source: &SourceFile) -> ParseResult {
    let lexed = Lexer::new(source).lex();
    let mut result = Parser::new(lexed.tokens, source).parse();
    let mut diagnostics = lexed.diagnostics;
    diagnostics.merge(result.diagnostics);
    result.diagnostics = diagnostics;
    result
}
