//! Kiln compiler: orchestrates the full compilation pipeline.
//!
//! ```text
//! Kiln Source → Resolver → Lexer → Parser → Binder → WASM Codegen → Executor
//! ```
//!
//! [`compile`] turns one source unit and its reference set into a
//! validated [`CompiledArtifact`](kiln_codegen::CompiledArtifact) without
//! touching the filesystem. [`run`] is the whole request: it resolves
//! references, compiles, executes and folds any failure into an
//! [`ExecutionResult`](kiln_runner::ExecutionResult).

mod compile;
mod config;
mod error;
mod memory;
mod persist;
mod pipeline;

pub use compile::{compile, compile_to_result, diagnose, CompileResult};
pub use config::{CompileOptions, RunConfig, DEFAULT_FILE_NAME};
pub use error::{ArtifactError, CompileError, PipelineError};
pub use persist::save_artifact;
pub use pipeline::{run, run_with_artifact, try_run, RunOutput};

pub use kiln_binder::OutputKind;
pub use kiln_codegen::{CompiledArtifact, Optimization};
pub use kiln_runner::{ExecutionError, ExecutionResult, ExecutorConfig};
