use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The lexer and parser give up after this many errors.
pub const MAX_ERRORS: usize = 20;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Diagnostic category, determined by code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Syntax,
    Binding,
    Reference,
    EntryPoint,
}

/// Numeric diagnostic code (K100–K499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiagnosticCode(pub u16);

impl DiagnosticCode {
    // ── Syntax (K100–K199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNCLOSED_DELIMITER: Self = Self(101);
    pub const UNTERMINATED_STRING: Self = Self(102);
    pub const INVALID_NUMBER: Self = Self(103);
    pub const BLOCK_COMMENT_USED: Self = Self(104);
    pub const UNEXPECTED_CHARACTER: Self = Self(105);
    pub const TOP_LEVEL_STATEMENT: Self = Self(106);
    pub const NESTING_TOO_DEEP: Self = Self(107);
    pub const INVALID_ESCAPE: Self = Self(108);

    // ── Binding (K200–K299) ──
    pub const UNKNOWN_NAME: Self = Self(200);
    pub const WRONG_ARG_COUNT: Self = Self(201);
    pub const DUPLICATE_DECLARATION: Self = Self(202);
    pub const INVALID_ASSIGNMENT: Self = Self(203);
    pub const LOOP_CONTROL_OUTSIDE_LOOP: Self = Self(204);
    pub const UNKNOWN_MEMBER: Self = Self(205);
    pub const NOT_CALLABLE: Self = Self(206);
    pub const FUNCTION_AS_VALUE: Self = Self(207);
    pub const NAMESPACE_AS_VALUE: Self = Self(208);

    // ── References (K300–K399) ──
    pub const MISSING_REFERENCE: Self = Self(301);
    pub const MISSING_DEPENDENCY: Self = Self(302);
    pub const INACCESSIBLE_SYMBOL: Self = Self(303);

    // ── Entry point (K400–K499) ──
    pub const MISSING_ENTRY_POINT: Self = Self(400);
    pub const INVALID_ENTRY_POINT: Self = Self(401);

    /// Get the category for this code.
    pub fn category(self) -> DiagnosticCategory {
        match self.0 {
            200..=299 => DiagnosticCategory::Binding,
            300..=399 => DiagnosticCategory::Reference,
            400..=499 => DiagnosticCategory::EntryPoint,
            _ => DiagnosticCategory::Syntax,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "K{}", self.0)
    }
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Binding => write!(f, "binding"),
            Self::Reference => write!(f, "reference"),
            Self::EntryPoint => write!(f, "entry-point"),
        }
    }
}

/// A compiler message tied to a source location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Source file name; empty for anonymous source.
    pub file: String,
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Derived from `code`.
    pub category: DiagnosticCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The source line the span starts on.
    pub source_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Create an error-severity diagnostic.
    pub fn error(
        file: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            suggestion: None,
        }
    }

    /// Create a warning-severity diagnostic.
    pub fn warning(
        file: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(file, code, message, span, source_line)
        }
    }

    /// Attach a fix suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// `<file>(<line>,<column>): <message>`, 1-based.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}: {}", self.file, self.span, self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// All diagnostics reported for one compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub infos: Vec<Diagnostic>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Record a diagnostic in the bucket matching its severity.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => {
                self.errors.push(diagnostic);
                self.total_errors += 1;
            }
            Severity::Warning => {
                self.warnings.push(diagnostic);
                self.total_warnings += 1;
            }
            Severity::Info => self.infos.push(diagnostic),
        }
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.push(d);
        }
    }

    /// Merge another collection.
    pub fn merge(&mut self, other: Diagnostics) {
        self.extend(other.errors);
        self.extend(other.warnings);
        self.extend(other.infos);
    }

    /// One `<file>(<line>,<column>): <message>` line per error,
    /// in report order.
    pub fn error_lines(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Every stored diagnostic, errors first.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.infos.iter())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        let mut all = self.errors;
        all.extend(self.warnings);
        all.extend(self.infos);
        all.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(code: DiagnosticCode) -> Diagnostic {
        Diagnostic::error(
            "main.kn",
            code,
            "The name 'foo' does not exist",
            Span::new(3, 5, 3, 8),
            "    foo()",
        )
    }

    #[test]
    fn test_code_category() {
        assert_eq!(
            DiagnosticCode::UNEXPECTED_TOKEN.category(),
            DiagnosticCategory::Syntax
        );
        assert_eq!(
            DiagnosticCode::UNKNOWN_NAME.category(),
            DiagnosticCategory::Binding
        );
        assert_eq!(
            DiagnosticCode::MISSING_REFERENCE.category(),
            DiagnosticCategory::Reference
        );
        assert_eq!(
            DiagnosticCode::MISSING_ENTRY_POINT.category(),
            DiagnosticCategory::EntryPoint
        );
    }

    #[test]
    fn test_code_display() {
        assert_eq!(DiagnosticCode::WRONG_ARG_COUNT.to_string(), "K201");
        assert_eq!(DiagnosticCode::MISSING_DEPENDENCY.to_string(), "K302");
    }

    #[test]
    fn test_display_matches_compiler_line_format() {
        let d = sample(DiagnosticCode::UNKNOWN_NAME);
        assert_eq!(d.to_string(), "main.kn(3,5): The name 'foo' does not exist");
    }

    #[test]
    fn test_display_without_file_name() {
        let d = Diagnostic::error(
            "",
            DiagnosticCode::UNEXPECTED_TOKEN,
            "expected '}'",
            Span::point(1, 12),
            "",
        );
        assert_eq!(d.to_string(), "(1,12): expected '}'");
    }

    #[test]
    fn test_warning_constructor() {
        let d = Diagnostic::warning(
            "main.kn",
            DiagnosticCode::MISSING_ENTRY_POINT,
            "no 'main' function",
            Span::point(1, 1),
            "",
        );
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.category, DiagnosticCategory::EntryPoint);
        assert!(!d.is_error());
    }

    #[test]
    fn test_json_field_names() {
        let d = sample(DiagnosticCode::UNKNOWN_NAME).with_suggestion("declare it with 'let'");
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"line\":3"));
        assert!(json.contains("\"column\":5"));
        assert!(json.contains("\"severity\":\"error\""));
        assert!(json.contains("\"category\":\"binding\""));
        assert!(json.contains("\"suggestion\""));
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_every_error_is_stored() {
        let mut diags = Diagnostics::new();
        for i in 0..25 {
            diags.push(Diagnostic::error(
                "main.kn",
                DiagnosticCode::UNEXPECTED_TOKEN,
                format!("error {i}"),
                Span::point(i + 1, 1),
                "",
            ));
        }
        assert_eq!(diags.errors.len(), 25);
        assert_eq!(diags.total_errors, 25);
        assert_eq!(diags.error_lines().len(), 25);
        assert_eq!(diags.error_lines()[24], "main.kn(25,1): error 24");
        assert!(diags.has_errors());
    }

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(
            "main.kn",
            DiagnosticCode::MISSING_ENTRY_POINT,
            "no main",
            Span::point(1, 1),
            "",
        ));
        assert!(!diags.has_errors());
        assert_eq!(diags.total_warnings, 1);
        assert!(diags.error_lines().is_empty());
    }

    #[test]
    fn test_merge_keeps_every_error() {
        let mut a = Diagnostics::new();
        let mut b = Diagnostics::new();
        for _ in 0..22 {
            b.push(sample(DiagnosticCode::UNKNOWN_NAME));
        }
        a.merge(b);
        assert_eq!(a.total_errors, 22);
        assert_eq!(a.errors.len(), 22);
    }

    #[test]
    fn test_error_lines_in_report_order() {
        let mut diags = Diagnostics::new();
        diags.push(sample(DiagnosticCode::UNKNOWN_NAME));
        diags.push(Diagnostic::error(
            "main.kn",
            DiagnosticCode::WRONG_ARG_COUNT,
            "wrong arity",
            Span::point(7, 2),
            "",
        ));
        assert_eq!(
            diags.error_lines(),
            vec![
                "main.kn(3,5): The name 'foo' does not exist".to_string(),
                "main.kn(7,2): wrong arity".to_string(),
            ]
        );
    }

    #[test]
    fn test_diagnostic_determinism_100_iterations() {
        let first = serde_json::to_string(&sample(DiagnosticCode::UNKNOWN_NAME)).unwrap();
        for i in 0..100 {
            let json = serde_json::to_string(&sample(DiagnosticCode::UNKNOWN_NAME)).unwrap();
            assert_eq!(first, json, "determinism failure at iteration {i}");
        }
    }
}
