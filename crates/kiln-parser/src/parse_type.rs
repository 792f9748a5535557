//! Type annotation parsing.

use kiln_lexer::token::TokenKind;
use kiln_types::ast::*;
use kiln_types::DiagnosticCode;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// Parse a type annotation.
    ///
    /// ```ebnf
    /// Type = "number" | "string" | "bool" | "list" | "task" | "any" | "nil" ;
    /// ```
    ///
    /// Type names are plain identifiers to the lexer; an unknown name is
    /// reported and consumed so parsing can continue.
    pub(crate) fn parse_type_annotation(&mut self) -> Option<TypeAnnotation> {
        let span = self.current_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::Nil => TypeKind::Nil,
            TokenKind::Identifier(name) => match TypeKind::from_keyword(&name) {
                Some(kind) => kind,
                None => {
                    self.error_at_current(
                        DiagnosticCode::UNEXPECTED_TOKEN,
                        format!(
                            "unknown type '{name}'; expected one of number, string, bool, list, task, any, nil"
                        ),
                    );
                    self.advance();
                    return None;
                }
            },
            other => {
                self.error_at_current(
                    DiagnosticCode::UNEXPECTED_TOKEN,
                    format!("expected type, got '{other}'"),
                );
                return None;
            }
        };
        self.advance();
        Some(TypeAnnotation::new(kind, span))
    }
}
