//! Execution error types.

use thiserror::Error;

/// Why an artifact could not be run to completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("The compiled artifact is empty.")]
    EmptyArtifact,

    /// The bytes are not a loadable module, or its imports cannot be linked.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// No `kiln.entry` section, or the export it names is missing or has
    /// the wrong arity.
    #[error("No entry point found.")]
    EntryPointMissing,

    /// `panic(msg)` or a runtime trap raised by the guest.
    #[error("unhandled panic: {0}")]
    Panicked(String),

    /// The wall-clock deadline passed.
    #[error("execution timed out after {0} ms")]
    Timeout(u64),

    /// Gas or interpreter fuel ran out.
    #[error("execution budget exhausted")]
    BudgetExhausted,

    /// Any other WebAssembly trap.
    #[error("trap: {0}")]
    Trap(String),
}
