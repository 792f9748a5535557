//! The compile-and-run pipeline.
//!
//! One request: discover references, compile, execute. The console and
//! the resident-set counter are process-wide, so requests hold the run
//! lock from the first memory sample until execution ends.

use std::sync::{Mutex, PoisonError};

use kiln_binder::OutputKind;
use kiln_codegen::CompiledArtifact;
use kiln_resolver::discover_standard;
use kiln_runner::{ExecutionResult, Executor};
use kiln_types::SourceFile;
use tracing::{debug, warn};

use crate::compile::compile;
use crate::config::{CompileOptions, RunConfig};
use crate::error::PipelineError;
use crate::memory;

static RUN_LOCK: Mutex<()> = Mutex::new(());

/// What one request produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub result: ExecutionResult,
    /// The module that was executed; `None` when compilation failed.
    pub artifact: Option<CompiledArtifact>,
}

/// Compile and run `source` with `args`, never failing: every error
/// becomes a failure record.
pub fn run(source: &str, args: &[String], config: &RunConfig) -> ExecutionResult {
    run_with_artifact(source, args, config).result
}

/// [`run`], also handing back the artifact it executed.
pub fn run_with_artifact(source: &str, args: &[String], config: &RunConfig) -> RunOutput {
    let _lock = RUN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

    let before = memory::resident_kib();
    let (artifact, outcome) = match compile_source(source, config) {
        Ok(artifact) => {
            let outcome = execute(&artifact, args, config);
            (Some(artifact), outcome)
        }
        Err(error) => (None, Err(error)),
    };
    let result = match outcome {
        Ok(result) => {
            let after = memory::resident_kib();
            result.with_memory(memory::delta_mib(before, after))
        }
        Err(error) => {
            warn!(%error, "run failed");
            ExecutionResult::failure(error.to_string())
        }
    };
    RunOutput { result, artifact }
}

/// [`run`] without the lock and without converting errors.
pub fn try_run(
    source: &str,
    args: &[String],
    config: &RunConfig,
) -> Result<ExecutionResult, PipelineError> {
    let artifact = compile_source(source, config)?;
    execute(&artifact, args, config)
}

fn compile_source(source: &str, config: &RunConfig) -> Result<CompiledArtifact, PipelineError> {
    let source = SourceFile::new(config.file_name.clone(), source);
    let refs = discover_standard(&source);
    debug!(references = ?refs.names(), "references resolved");

    let options = CompileOptions {
        output: OutputKind::Executable,
        optimization: config.optimization,
    };
    Ok(compile(&source, &refs, options)?)
}

fn execute(
    artifact: &CompiledArtifact,
    args: &[String],
    config: &RunConfig,
) -> Result<ExecutionResult, PipelineError> {
    let result = Executor::new(config.executor.clone()).execute(artifact, args)?;
    debug!(
        time_taken = result.time_taken,
        output_bytes = result.output.len(),
        "run finished"
    );
    Ok(result)
}
