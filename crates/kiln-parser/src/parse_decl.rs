//! Top-level and function declaration parsing.

use kiln_lexer::token::TokenKind;
use kiln_types::ast::*;
use kiln_types::{DiagnosticCode, Span};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Program
    // ══════════════════════════════════════════════════════════════════════════

    /// Parse a complete program: `{ FnDecl }`.
    ///
    /// Statements outside a function are reported and skipped.
    pub(crate) fn parse_program(&mut self) -> Program {
        let start = self.current_span();
        let mut functions = Vec::new();
        self.skip_newlines();

        while !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            let before = self.position();
            match self.peek_kind() {
                TokenKind::Fn => {
                    if let Some(f) = self.parse_fn_decl() {
                        functions.push(f);
                    } else {
                        self.synchronize_to_fn();
                    }
                }
                TokenKind::RBrace => {
                    self.error_at_current(DiagnosticCode::UNEXPECTED_TOKEN, "unexpected '}'");
                    self.advance();
                }
                _ => {
                    let stmt_start = self.current_span();
                    match self.parse_statement() {
                        Some(stmt) => self.error_at(
                            DiagnosticCode::TOP_LEVEL_STATEMENT,
                            "statements must appear inside a function",
                            stmt.span(),
                        ),
                        None => {
                            if !self.too_many_errors() && self.position() == before {
                                self.error_at(
                                    DiagnosticCode::TOP_LEVEL_STATEMENT,
                                    "statements must appear inside a function",
                                    stmt_start,
                                );
                            }
                            self.synchronize();
                        }
                    }
                }
            }
            if self.position() == before {
                self.advance();
            }
            self.skip_newlines();
        }

        let span = start.merge(self.previous_span());
        Program { functions, span }
    }

    /// Skip to the next `fn` at the start of a line.
    fn synchronize_to_fn(&mut self) {
        while !self.at_end() {
            if self.check_exact(&TokenKind::Newline) {
                self.skip_newlines();
                if self.check_exact(&TokenKind::Fn) {
                    return;
                }
                continue;
            }
            self.advance();
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Functions
    // ══════════════════════════════════════════════════════════════════════════

    /// Parse `fn name(params) [-> Type] { body }`
    pub(crate) fn parse_fn_decl(&mut self) -> Option<FnDecl> {
        let start = self.current_span();
        self.advance(); // eat `fn`
        let id = self.fresh_id();
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen)?;
        let params = self.parse_param_list();
        self.expect(&TokenKind::RParen)?;

        let ret = if self.eat(&TokenKind::Arrow) {
            self.parse_type_annotation()
        } else {
            None
        };

        let body = match self.parse_block() {
            Some(b) => b,
            None => Block {
                stmts: Vec::new(),
                span: self.current_span(),
            },
        };
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        Some(FnDecl {
            id,
            name,
            params,
            ret,
            body,
            span,
        })
    }

    /// Parse a comma-separated parameter list: `name [: type], ...`
    ///
    /// Stops before `)`. Malformed parameters are reported and dropped.
    pub(crate) fn parse_param_list(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        self.skip_newlines();
        if self.check_exact(&TokenKind::RParen) {
            return params;
        }
        loop {
            self.skip_newlines();
            let param_start = self.current_span();
            let Some(name) = self.expect_identifier() else {
                self.skip_to_close_paren();
                break;
            };
            let type_ann = if self.eat(&TokenKind::Colon) {
                self.parse_type_annotation()
            } else {
                None
            };
            let span: Span = param_start.merge(self.previous_span());
            let id = self.fresh_id();
            params.push(Param {
                id,
                name,
                type_ann,
                span,
            });
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
            if self.check_exact(&TokenKind::RParen) {
                break;
            }
        }
        params
    }

    fn skip_to_close_paren(&mut self) {
        while !self.at_end()
            && !self.check_exact(&TokenKind::RParen)
            && !self.check_exact(&TokenKind::LBrace)
        {
            self.advance();
        }
    }
}
