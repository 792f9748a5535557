//! Statement parsing.

use crate::parser::Parser;
use kiln_lexer::token::TokenKind;
use kiln_types::ast::*;
use kiln_types::DiagnosticCode;

impl<'src> Parser<'src> {
    /// Parse a block of statements: `{ stmts... }`
    ///
    /// Returns `None` only when the opening `{` is missing. A missing
    /// closing `}` is reported and the statements read so far are kept.
    pub(crate) fn parse_block(&mut self) -> Option<Block> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;
        if !self.enter_nesting() {
            self.skip_balanced_block();
            return Some(Block {
                stmts: Vec::new(),
                span: start.merge(self.previous_span()),
            });
        }
        self.skip_newlines();
        let mut stmts = Vec::new();
        while !self.check_exact(&TokenKind::RBrace) && !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            let before = self.position();
            if let Some(stmt) = self.parse_statement() {
                stmts.push(stmt);
            } else {
                self.synchronize();
            }
            if self.position() == before {
                self.advance();
            }
            self.skip_newlines();
        }
        self.exit_nesting();
        if !self.eat(&TokenKind::RBrace) && !self.too_many_errors() {
            self.error_at(
                DiagnosticCode::UNCLOSED_DELIMITER,
                "expected '}' to close block",
                start,
            );
        }
        let span = start.merge(self.previous_span());
        Some(Block { stmts, span })
    }

    /// Skip to the `}` matching an already consumed `{`.
    fn skip_balanced_block(&mut self) {
        let mut depth = 1u32;
        while !self.at_end() {
            match self.advance().kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Parse a single statement.
    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        self.skip_newlines();
        if self.at_end() || self.check_exact(&TokenKind::RBrace) {
            return None;
        }
        match self.peek_kind() {
            TokenKind::Let => self.parse_let_stmt().map(Stmt::Let),
            TokenKind::Set => self.parse_set_stmt().map(Stmt::Set),
            TokenKind::If => {
                let stmt = self.parse_if_stmt().map(Stmt::If);
                self.expect_newline_or_eof();
                stmt
            }
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::For => self.parse_for_stmt().map(Stmt::For),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Break => {
                let span = self.advance().span;
                self.expect_newline_or_eof();
                Some(Stmt::Break(span))
            }
            TokenKind::Continue => {
                let span = self.advance().span;
                self.expect_newline_or_eof();
                Some(Stmt::Continue(span))
            }
            TokenKind::Fn => {
                self.error_at_current(
                    DiagnosticCode::UNEXPECTED_TOKEN,
                    "functions can only be declared at the top level",
                );
                None
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect_newline_or_eof();
                Some(Stmt::Expr(expr))
            }
        }
    }

    /// `let name [: Type] = expr`
    fn parse_let_stmt(&mut self) -> Option<LetStmt> {
        let start = self.current_span();
        self.advance(); // eat `let`
        let name = self.expect_identifier()?;
        let type_ann = if self.eat(&TokenKind::Colon) {
            self.parse_type_annotation()
        } else {
            None
        };
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expression()?;
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        let id = self.fresh_id();
        Some(LetStmt {
            id,
            name,
            type_ann,
            value,
            span,
        })
    }

    /// `set name = expr`
    fn parse_set_stmt(&mut self) -> Option<SetStmt> {
        let start = self.current_span();
        self.advance(); // eat `set`
        let target = self.expect_identifier()?;
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expression()?;
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        let id = self.fresh_id();
        Some(SetStmt {
            id,
            target,
            value,
            span,
        })
    }

    /// `if cond { ... } [else { ... } | else if ...]`
    ///
    /// `else` may start on the line after the closing `}`.
    fn parse_if_stmt(&mut self) -> Option<IfStmt> {
        let start = self.current_span();
        self.advance(); // eat `if`
        let condition = self.parse_expression()?;
        let then_block = self.parse_block()?;
        let else_branch = if *self.peek_past_newlines() == TokenKind::Else {
            self.skip_newlines();
            self.advance(); // eat `else`
            if self.check_exact(&TokenKind::If) {
                Some(ElseBranch::ElseIf(Box::new(self.parse_if_stmt()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        let span = start.merge(self.previous_span());
        Some(IfStmt {
            condition,
            then_block,
            else_branch,
            span,
        })
    }

    /// `while cond { ... }`
    fn parse_while_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // eat `while`
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        Some(Stmt::While(WhileStmt {
            condition,
            body,
            span,
        }))
    }

    /// `for item in expr { ... }`
    fn parse_for_stmt(&mut self) -> Option<ForStmt> {
        let start = self.current_span();
        self.advance(); // eat `for`
        let item = self.expect_identifier()?;
        self.expect(&TokenKind::In)?;
        let iterable = self.parse_expression()?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        let id = self.fresh_id();
        Some(ForStmt {
            id,
            item,
            iterable,
            body,
            span,
        })
    }

    /// `return [expr]`
    fn parse_return_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `return`
        let value = if matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof
        ) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        Some(Stmt::Return(ReturnStmt { value, span }))
    }
}
