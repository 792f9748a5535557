//! Codegen error types.

use thiserror::Error;

/// Errors that can occur during WASM code generation.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// An internal consistency check failed.
    #[error("internal codegen error: {0}")]
    Internal(String),

    /// The generated WASM module failed validation.
    #[error("WASM validation failed: {0}")]
    ValidationFailed(String),

    /// A name the binder should have resolved has no symbol.
    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),

    /// The program does not fit the module's limits.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Bytes handed back for inspection are not a readable Kiln module.
    #[error("invalid module: {0}")]
    InvalidModule(String),
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
