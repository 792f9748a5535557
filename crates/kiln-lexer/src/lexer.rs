//! Core Kiln lexer: converts source text to a token stream.
//!
//! - String interpolation with `${expr}` via a mode stack
//! - Single-line comments stripped (`//`)
//! - Block comments rejected (`/* */`) with K104
//! - Error recovery: every malformed lexeme becomes a diagnostic, and
//!   scanning continues with the next character
//! - Newline-separated statements (no semicolons)

use kiln_types::{Diagnostic, DiagnosticCode, Diagnostics, SourceFile, Span, MAX_ERRORS};

use crate::token::{Token, TokenKind};

/// Lexer mode: scanning code, string text, or an interpolated expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// Inside a string literal, scanning text until `"` or `${`.
    String,
    /// Inside `${...}`. `brace_depth` counts nested `{` so the closing
    /// `}` of the interpolation can be told apart.
    Interpolation { brace_depth: u32 },
}

/// The Kiln lexer.
pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    pos: usize,
    /// 1-based.
    line: u32,
    /// 1-based, counted in characters.
    col: u32,
    diagnostics: Diagnostics,
    mode_stack: Vec<Mode>,
    /// Tokens to emit before the next scan (used for interpolation).
    pending: Vec<Token>,
}

/// Result of lexing: tokens + any diagnostics collected.
pub struct LexResult {
    /// The token stream (always ends with [`TokenKind::Eof`]).
    pub tokens: Vec<Token>,
    pub diagnostics: Diagnostics,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            diagnostics: Diagnostics::new(),
            mode_stack: vec![Mode::Normal],
            pending: Vec::new(),
        }
    }

    /// Lex the entire source file into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();

        loop {
            if self.diagnostics.total_errors >= MAX_ERRORS {
                break;
            }

            if let Some(pending) = self.pending.pop() {
                tokens.push(pending);
                continue;
            }

            let token = match self.current_mode() {
                Mode::String => self.scan_string_continuation(),
                Mode::Normal | Mode::Interpolation { .. } => self.scan_normal(),
            };

            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);

            if is_eof {
                break;
            }
        }

        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }

        LexResult {
            tokens,
            diagnostics: self.diagnostics,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Mode stack helpers
    // ─────────────────────────────────────────────────────────────

    fn current_mode(&self) -> Mode {
        self.mode_stack.last().copied().unwrap_or(Mode::Normal)
    }

    fn push_mode(&mut self, mode: Mode) {
        self.mode_stack.push(mode);
    }

    fn pop_mode(&mut self) {
        if self.mode_stack.len() > 1 {
            self.mode_stack.pop();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // UTF-8 continuation bytes do not start a new column.
            self.col += 1;
        }
        Some(ch)
    }

    /// Consume the remaining bytes of a UTF-8 sequence.
    fn advance_utf8_tail(&mut self) {
        while matches!(self.peek(), Some(b) if b & 0xC0 == 0x80) {
            self.advance();
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn single(&self, start_line: u32, start_col: u32, kind: TokenKind) -> Option<Token> {
        Some(Token::new(kind, self.span_from(start_line, start_col)))
    }

    fn lexeme(&self, start: usize) -> &'src str {
        std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("")
    }

    fn emit_error(&mut self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let diag = Diagnostic::error(&self.source_file.name, code, message, span, source_line);
        self.diagnostics.push(diag);
    }

    fn emit_error_with_suggestion(
        &mut self,
        code: DiagnosticCode,
        message: impl Into<String>,
        span: Span,
        suggestion: impl Into<String>,
    ) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let diag = Diagnostic::error(&self.source_file.name, code, message, span, source_line)
            .with_suggestion(suggestion);
        self.diagnostics.push(diag);
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    /// Skip spaces and tabs (NOT newlines, those are tokens).
    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\r') = self.peek() {
            self.advance();
        }
    }

    /// Skip a single-line comment (`// ...`), leaving the newline.
    fn skip_comment(&mut self) -> bool {
        if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'/') {
            while let Some(ch) = self.peek() {
                if ch == b'\n' {
                    break;
                }
                self.advance();
            }
            true
        } else {
            false
        }
    }

    /// Consume a block comment (`/* ... */`) and report it.
    fn check_block_comment(&mut self) -> bool {
        if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'*') {
            let start_line = self.line;
            let start_col = self.col;
            self.advance();
            self.advance();
            loop {
                match self.peek() {
                    None => break,
                    Some(b'*') if self.peek_at(1) == Some(b'/') => {
                        self.advance();
                        self.advance();
                        break;
                    }
                    _ => {
                        self.advance();
                    }
                }
            }
            let span = self.span_from(start_line, start_col);
            self.emit_error_with_suggestion(
                DiagnosticCode::BLOCK_COMMENT_USED,
                "Only single-line comments (//) are supported",
                span,
                "Replace /* ... */ with // on each line",
            );
            true
        } else {
            false
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Normal-mode scanning
    // ─────────────────────────────────────────────────────────────

    /// Scan one token in normal (non-string) mode.
    fn scan_normal(&mut self) -> Token {
        loop {
            self.skip_whitespace();

            if self.diagnostics.total_errors >= MAX_ERRORS {
                return Token::new(TokenKind::Eof, self.current_span());
            }

            if self.at_end() {
                if self
                    .mode_stack
                    .iter()
                    .any(|m| matches!(m, Mode::String | Mode::Interpolation { .. }))
                {
                    self.emit_error(
                        DiagnosticCode::UNTERMINATED_STRING,
                        "Unterminated string literal",
                        self.current_span(),
                    );
                }
                return Token::new(TokenKind::Eof, self.current_span());
            }

            if self.check_block_comment() || self.skip_comment() {
                continue;
            }

            if let Some(token) = self.scan_token() {
                return token;
            }
        }
    }

    /// Scan one lexeme. `None` means the character was reported and
    /// skipped.
    fn scan_token(&mut self) -> Option<Token> {
        let start = self.pos;
        let start_line = self.line;
        let start_col = self.col;
        let ch = self.advance()?;

        match ch {
            b'\n' => self.single(start_line, start_col, TokenKind::Newline),

            b'"' => Some(self.scan_string(start_line, start_col)),

            b'0'..=b'9' => Some(self.scan_number(start, start_line, start_col)),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                Some(self.scan_identifier(start, start_line, start_col))
            }

            b'+' => self.single(start_line, start_col, TokenKind::Plus),
            b'*' => self.single(start_line, start_col, TokenKind::Star),
            b'%' => self.single(start_line, start_col, TokenKind::Percent),
            b'/' => self.single(start_line, start_col, TokenKind::Slash),
            b'(' => self.single(start_line, start_col, TokenKind::LParen),
            b')' => self.single(start_line, start_col, TokenKind::RParen),
            b'[' => self.single(start_line, start_col, TokenKind::LBracket),
            b']' => self.single(start_line, start_col, TokenKind::RBracket),
            b',' => self.single(start_line, start_col, TokenKind::Comma),
            b':' => self.single(start_line, start_col, TokenKind::Colon),
            b'.' => self.single(start_line, start_col, TokenKind::Dot),

            b'-' => {
                let kind = if self.peek() == Some(b'>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                };
                self.single(start_line, start_col, kind)
            }

            b'=' => {
                let kind = if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                };
                self.single(start_line, start_col, kind)
            }

            b'<' => {
                let kind = if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                };
                self.single(start_line, start_col, kind)
            }

            b'>' => {
                let kind = if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                };
                self.single(start_line, start_col, kind)
            }

            b'!' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    return self.single(start_line, start_col, TokenKind::BangEq);
                }
                let span = self.span_from(start_line, start_col);
                self.emit_error_with_suggestion(
                    DiagnosticCode::UNEXPECTED_CHARACTER,
                    "Unexpected character '!'",
                    span,
                    "Use 'not' for boolean negation, or '!=' for inequality",
                );
                None
            }

            b'{' => {
                if let Some(Mode::Interpolation { brace_depth }) = self.mode_stack.last_mut() {
                    *brace_depth += 1;
                }
                self.single(start_line, start_col, TokenKind::LBrace)
            }

            b'}' => {
                if let Some(Mode::Interpolation { brace_depth }) = self.mode_stack.last_mut() {
                    if *brace_depth == 0 {
                        self.pop_mode();
                        self.push_mode(Mode::String);
                        return self.single(start_line, start_col, TokenKind::InterpolationEnd);
                    }
                    *brace_depth -= 1;
                }
                self.single(start_line, start_col, TokenKind::RBrace)
            }

            _ => {
                self.advance_utf8_tail();
                let span = self.span_from(start_line, start_col);
                let text = self.lexeme(start).to_string();
                self.emit_error(
                    DiagnosticCode::UNEXPECTED_CHARACTER,
                    format!("Unexpected character '{text}'"),
                    span,
                );
                None
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Number literals
    // ─────────────────────────────────────────────────────────────

    fn scan_number(&mut self, start: usize, start_line: u32, start_col: u32) -> Token {
        while let Some(b'0'..=b'9') = self.peek() {
            self.advance();
        }

        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            self.advance();
            while let Some(b'0'..=b'9') = self.peek() {
                self.advance();
            }
        }

        // `12abc` is one malformed lexeme, not a number then a name.
        if matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z' | b'_')) {
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
                self.advance();
            }
            let span = self.span_from(start_line, start_col);
            let text = self.lexeme(start).to_string();
            self.emit_error(
                DiagnosticCode::INVALID_NUMBER,
                format!("Invalid number literal '{text}'"),
                span,
            );
            return Token::new(TokenKind::NumberLit(0.0), span);
        }

        let span = self.span_from(start_line, start_col);
        let value: f64 = self.lexeme(start).parse().unwrap_or(0.0);
        Token::new(TokenKind::NumberLit(value), span)
    }

    // ─────────────────────────────────────────────────────────────
    // Identifiers & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_identifier(&mut self, start: usize, start_line: u32, start_col: u32) -> Token {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' {
                self.advance();
            } else {
                break;
            }
        }

        let span = self.span_from(start_line, start_col);
        let text = self.lexeme(start);
        let kind = TokenKind::from_keyword(text)
            .unwrap_or_else(|| TokenKind::Identifier(text.to_string()));

        Token::new(kind, span)
    }

    // ─────────────────────────────────────────────────────────────
    // String literals & interpolation
    // ─────────────────────────────────────────────────────────────

    /// Scan a string literal starting after the opening `"`.
    ///
    /// Produces a `StringLiteral`, or a `StringStart` followed by a queued
    /// `InterpolationStart` when the text contains `${`.
    fn scan_string(&mut self, start_line: u32, start_col: u32) -> Token {
        match self.scan_string_text(start_line, start_col) {
            StringStop::Closed(text) => {
                Token::new(TokenKind::StringLiteral(text), self.span_from(start_line, start_col))
            }
            StringStop::Interpolation(text) => {
                self.push_mode(Mode::Interpolation { brace_depth: 0 });
                Token::new(TokenKind::StringStart(text), self.span_from(start_line, start_col))
            }
        }
    }

    /// Continue string content after an interpolation ends.
    fn scan_string_continuation(&mut self) -> Token {
        let start_line = self.line;
        let start_col = self.col;
        match self.scan_string_text(start_line, start_col) {
            StringStop::Closed(text) => {
                self.pop_mode();
                Token::new(TokenKind::StringEnd(text), self.span_from(start_line, start_col))
            }
            StringStop::Interpolation(text) => {
                self.pop_mode();
                self.push_mode(Mode::Interpolation { brace_depth: 0 });
                Token::new(TokenKind::StringPart(text), self.span_from(start_line, start_col))
            }
        }
    }

    /// Read string text up to the closing `"` or the next `${`.
    fn scan_string_text(&mut self, start_line: u32, start_col: u32) -> StringStop {
        let mut buf = Vec::new();

        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        DiagnosticCode::UNTERMINATED_STRING,
                        "Unterminated string literal",
                        span,
                    );
                    return StringStop::Closed(String::from_utf8_lossy(&buf).into_owned());
                }
                Some(b'"') => {
                    self.advance();
                    return StringStop::Closed(String::from_utf8_lossy(&buf).into_owned());
                }
                Some(b'\\') => {
                    if let Some(escaped) = self.scan_escape_sequence() {
                        let mut tmp = [0u8; 4];
                        buf.extend_from_slice(escaped.encode_utf8(&mut tmp).as_bytes());
                    }
                }
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    let line = self.line;
                    let col = self.col;
                    self.advance();
                    self.advance();
                    self.pending
                        .push(Token::new(TokenKind::InterpolationStart, self.span_from(line, col)));
                    return StringStop::Interpolation(String::from_utf8_lossy(&buf).into_owned());
                }
                Some(ch) => {
                    self.advance();
                    buf.push(ch);
                }
            }
        }
    }

    /// Scan an escape sequence starting at the `\`.
    fn scan_escape_sequence(&mut self) -> Option<char> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance();

        match self.advance() {
            Some(b'"') => Some('"'),
            Some(b'\\') => Some('\\'),
            Some(b'n') => Some('\n'),
            Some(b't') => Some('\t'),
            Some(b'r') => Some('\r'),
            Some(b'$') => Some('$'),
            Some(b'\n') | None => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    DiagnosticCode::UNTERMINATED_STRING,
                    "Unterminated string literal",
                    span,
                );
                None
            }
            Some(ch) => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    DiagnosticCode::INVALID_ESCAPE,
                    format!("Invalid escape sequence '\\{}'", ch as char),
                    span,
                );
                Some(ch as char)
            }
        }
    }
}

enum StringStop {
    Closed(String),
    Interpolation(String),
}
