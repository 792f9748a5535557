//! Kiln sandboxed executor.
//!
//! [`Executor::execute`] loads a [`CompiledArtifact`](kiln_codegen::CompiledArtifact)
//! into a `wasmi` store, links the `rt` imports and the host libraries,
//! locates the entry point from the artifact's `kiln.entry` section and
//! runs it with the process console captured.
//!
//! Limits come from [`ExecutorConfig`]: a wall-clock deadline enforced by
//! the guest's periodic `rt.deadline` call, the module's gas budget,
//! optional interpreter fuel and a linear-memory cap.

pub mod config;
pub mod console;
pub mod error;
pub mod executor;
pub mod guest;
pub mod host;
pub mod libraries;
pub mod result;
pub mod tasks;
pub mod value;

pub use config::{ExecutorConfig, DEFAULT_DEADLINE};
pub use error::ExecutionError;
pub use executor::Executor;
pub use result::ExecutionResult;
pub use value::Value;
