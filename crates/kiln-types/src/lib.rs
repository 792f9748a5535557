//! Shared types for the Kiln compile-and-run pipeline.
//!
//! This crate defines the AST node types, source spans, diagnostics,
//! library references and the node traversal used by every later stage.

mod diagnostic;
mod reference;
mod span;
pub mod ast;
pub mod visit;

pub use diagnostic::{
    Diagnostic, DiagnosticCategory, DiagnosticCode, Diagnostics, Severity, MAX_ERRORS,
};
pub use reference::{LibraryReference, ReferenceSet};
pub use span::{SourceFile, Span};

/// Platform line terminator appended by `println`.
#[cfg(windows)]
pub const LINE_TERMINATOR: &str = "\r\n";
/// Platform line terminator appended by `println`.
#[cfg(not(windows))]
pub const LINE_TERMINATOR: &str = "\n";
