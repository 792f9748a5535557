//! Compiler and pipeline error types.

use std::path::PathBuf;

use kiln_codegen::CodegenError;
use kiln_runner::ExecutionError;
use thiserror::Error;

/// Why a source unit produced no artifact.
#[derive(Debug, Error)]
pub enum CompileError {
    /// One `<file>(<line>,<column>): <message>` line per error diagnostic.
    #[error("{0}")]
    Compilation(String),

    /// The emitter failed on a program that bound cleanly.
    #[error("code generation failed: {0}")]
    Emit(#[from] CodegenError),
}

/// Any failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Why an artifact could not be persisted.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("The compiled artifact is empty.")]
    Empty,

    #[error("invalid artifact name '{0}'")]
    InvalidName(String),

    #[error("failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
