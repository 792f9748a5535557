//! Compilation and run options.

use kiln_binder::OutputKind;
use kiln_codegen::Optimization;
use kiln_runner::ExecutorConfig;
use serde::{Deserialize, Serialize};

/// File name diagnostics use when the caller does not supply one.
pub const DEFAULT_FILE_NAME: &str = "main.kn";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub output: OutputKind,
    pub optimization: Optimization,
}

/// Everything one pipeline request needs besides the source and arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub executor: ExecutorConfig,
    pub optimization: Optimization,
    /// Name reported in diagnostics.
    pub file_name: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            optimization: Optimization::Release,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}
