//! Core parser infrastructure: token cursor, error reporting, helpers.

use kiln_lexer::token::{Token, TokenKind};
use kiln_types::ast::{Expr, ExprKind, Ident, NodeId, Program};
use kiln_types::{Diagnostic, DiagnosticCode, Diagnostics, SourceFile, Span, MAX_ERRORS};

/// Maximum nesting of expressions and blocks.
pub const MAX_NESTING_DEPTH: u32 = 64;

/// The Kiln parser.
///
/// Consumes a token stream produced by the lexer and builds an AST.
/// Parsing never fails outright: errors are collected and the parser
/// resynchronizes at the next statement, keeping whatever it could build.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source_file: &'src SourceFile,
    diagnostics: Diagnostics,
    /// Current expression/block nesting depth.
    pub(crate) depth: u32,
    next_id: u32,
}

/// Result of parsing.
pub struct ParseResult {
    /// The program, possibly partial when errors were reported.
    pub program: Program,
    pub diagnostics: Diagnostics,
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        let tokens = if tokens.last().is_some_and(|t| t.kind == TokenKind::Eof) {
            tokens
        } else {
            let mut tokens = tokens;
            let span = tokens.last().map(|t| t.span).unwrap_or(Span::point(1, 1));
            tokens.push(Token::new(TokenKind::Eof, span));
            tokens
        };
        Self {
            tokens,
            pos: 0,
            source_file,
            diagnostics: Diagnostics::new(),
            depth: 0,
            next_id: 0,
        }
    }

    // ── Node Ids ──────────────────────────────────────────────────────────────

    pub(crate) fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn mk_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        let id = self.fresh_id();
        Expr::new(id, kind, span)
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    /// Returns the current token without advancing.
    pub(crate) fn peek(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Span of the previously consumed token.
    pub(crate) fn previous_span(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(t) => t.span,
            None => Span::point(1, 1),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check_exact(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check_exact(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// The first token kind at or after the cursor that is not a newline.
    pub(crate) fn peek_past_newlines(&self) -> &TokenKind {
        self.tokens[self.pos.min(self.tokens.len() - 1)..]
            .iter()
            .map(|t| &t.kind)
            .find(|k| **k != TokenKind::Newline)
            .unwrap_or(&TokenKind::Eof)
    }

    // ── Newline Handling ──────────────────────────────────────────────────────

    pub(crate) fn skip_newlines(&mut self) {
        while self.check_exact(&TokenKind::Newline) {
            self.advance();
        }
    }

    /// Expect the end of a statement: a newline, `}` or end of file.
    pub(crate) fn expect_newline_or_eof(&mut self) {
        if self.at_end() || self.check_exact(&TokenKind::RBrace) {
            return;
        }
        if self.check_exact(&TokenKind::Newline) {
            self.advance();
            self.skip_newlines();
        } else {
            self.error_at_current(
                DiagnosticCode::UNEXPECTED_TOKEN,
                format!("expected newline, got '{}'", self.peek_kind()),
            );
            self.synchronize();
        }
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    /// Expect a specific token kind. Returns the token if matched, or
    /// reports an error.
    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check_exact(expected) {
            Some(self.advance())
        } else {
            let code = if self.at_end() {
                DiagnosticCode::UNCLOSED_DELIMITER
            } else {
                DiagnosticCode::UNEXPECTED_TOKEN
            };
            self.error_at_current(
                code,
                format!("expected '{}', got '{}'", expected, self.peek_kind()),
            );
            None
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Option<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            other => {
                let message = if other.is_keyword() {
                    format!("'{other}' is a reserved word and cannot be used as a name")
                } else {
                    format!("expected identifier, got '{other}'")
                };
                self.error_at_current(DiagnosticCode::UNEXPECTED_TOKEN, message);
                None
            }
        }
    }

    /// A member name after `.`: any identifier, or a keyword spelled as
    /// one (`list.set(...)`).
    pub(crate) fn expect_member_name(&mut self) -> Option<Ident> {
        let kind = self.peek_kind().clone();
        match &kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            _ if kind.is_keyword() => {
                let span = self.advance().span;
                Some(Ident::new(kind.to_string(), span))
            }
            _ => {
                self.error_at_current(
                    DiagnosticCode::UNEXPECTED_TOKEN,
                    format!("expected member name, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    // ── Nesting ───────────────────────────────────────────────────────────────

    /// Enter one nesting level. Returns `false` (after reporting) when
    /// the limit is exceeded.
    pub(crate) fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_at_current(
                DiagnosticCode::NESTING_TOO_DEEP,
                format!("maximum nesting depth is {MAX_NESTING_DEPTH}"),
            );
            self.depth -= 1;
            return false;
        }
        true
    }

    pub(crate) fn exit_nesting(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, code: DiagnosticCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    pub(crate) fn error_at(&mut self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let diag = Diagnostic::error(&self.source_file.name, code, message, span, source_line);
        self.diagnostics.push(diag);
    }

    /// Returns `true` if we've hit the error limit and should stop.
    pub(crate) fn too_many_errors(&self) -> bool {
        self.diagnostics.total_errors >= MAX_ERRORS
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip tokens until a synchronization point: after a newline, or at
    /// a statement keyword or `}`.
    pub(crate) fn synchronize(&mut self) {
        while !self.at_end() {
            if self.check_exact(&TokenKind::Newline) {
                self.advance();
                self.skip_newlines();
                return;
            }
            if self.peek_kind().starts_statement() || self.check_exact(&TokenKind::RBrace) {
                return;
            }
            self.advance();
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    /// Parse the token stream into a `Program` AST.
    pub fn parse(mut self) -> ParseResult {
        let program = self.parse_program();
        ParseResult {
            program,
            diagnostics: self.diagnostics,
        }
    }
}
