//! `kiln`: compile and run one source file, print the result record.
//!
//! stdout carries only the JSON record; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use kiln_compiler::{
    save_artifact, CompiledArtifact, ExecutionResult, ExecutorConfig, Optimization, RunConfig,
    DEFAULT_FILE_NAME,
};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const MISSING_INPUT: &str = "Please provide a source code file as an argument.";

#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(about = "Compile and run a Kiln program, printing a JSON result record")]
struct Cli {
    /// Source file to run
    file: Option<PathBuf>,

    /// Run this source text instead of a file
    #[arg(long, conflicts_with = "file")]
    eval: Option<String>,

    /// Also write the compiled module to DIR/<name>.wasm
    #[arg(long, value_name = "DIR", env = "KILN_SAVE_ARTIFACT")]
    save_artifact: Option<PathBuf>,

    /// Artifact name (defaults to the file stem)
    #[arg(long)]
    name: Option<String>,

    /// Wall-clock budget in milliseconds
    #[arg(long, env = "KILN_TIMEOUT_MS", default_value_t = 5_000)]
    timeout_ms: u64,

    /// Gas ticks allowed (function entries and loop iterations)
    #[arg(long, env = "KILN_GAS_LIMIT")]
    gas_limit: Option<u32>,

    /// Interpreter fuel; unlimited when absent
    #[arg(long, env = "KILN_FUEL")]
    fuel: Option<u64>,

    /// Build with debug names and without constant folding
    #[arg(long, env = "KILN_DEBUG_BUILD")]
    debug_build: bool,

    /// Log filter for stderr (e.g. `debug`, `kiln_runner=trace`)
    #[arg(long, env = "KILN_LOG", default_value = "warn")]
    log_level: String,

    /// Arguments passed to `main`
    #[arg(last = true)]
    args: Vec<String>,
}

impl Cli {
    fn run_config(&self, file_name: String) -> RunConfig {
        let defaults = ExecutorConfig::default();
        RunConfig {
            executor: ExecutorConfig {
                deadline: Duration::from_millis(self.timeout_ms),
                fuel: self.fuel,
                gas_limit: self.gas_limit.unwrap_or(defaults.gas_limit),
                ..defaults
            },
            optimization: if self.debug_build {
                Optimization::Debug
            } else {
                Optimization::Release
            },
            file_name,
        }
    }

    fn artifact_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| {
                self.file
                    .as_ref()
                    .and_then(|f| f.file_stem())
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "main".to_string())
    }
}

fn init_logging(filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Source text and the name diagnostics report it under.
fn read_input(cli: &Cli) -> Result<(String, String), String> {
    if let Some(code) = &cli.eval {
        return Ok((code.clone(), DEFAULT_FILE_NAME.to_string()));
    }
    let Some(path) = &cli.file else {
        return Err(MISSING_INPUT.to_string());
    };
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
    Ok((source, name))
}

/// Persist the executed module; failures are only logged.
fn persist(cli: &Cli, dir: &Path, artifact: Option<&CompiledArtifact>) {
    let Some(artifact) = artifact else {
        debug!("compilation failed, no artifact to save");
        return;
    };
    match save_artifact(artifact.bytes(), dir, &cli.artifact_name()) {
        Ok(path) => info!(path = %path.display(), "artifact saved"),
        Err(e) => error!(error = %e, "failed to save artifact"),
    }
}

fn print_record(result: &ExecutionResult) -> ExitCode {
    match serde_json::to_string(result) {
        Ok(json) => {
            println!("{json}");
            if result.is_success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!(error = %e, "failed to serialize result");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let (source, file_name) = match read_input(&cli) {
        Ok(input) => input,
        Err(message) => return print_record(&ExecutionResult::failure(message)),
    };
    let config = cli.run_config(file_name);
    debug!(file = %config.file_name, args = cli.args.len(), "running");

    let run = kiln_compiler::run_with_artifact(&source, &cli.args, &config);
    if let Some(dir) = &cli.save_artifact {
        persist(&cli, dir, run.artifact.as_ref());
    }
    print_record(&run.result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_map_to_run_config() {
        let cli = Cli::parse_from([
            "kiln",
            "prog.kn",
            "--timeout-ms",
            "250",
            "--gas-limit",
            "99",
            "--debug-build",
            "--",
            "x",
            "y",
        ]);
        let config = cli.run_config("prog.kn".to_string());
        assert_eq!(config.executor.deadline_ms(), 250);
        assert_eq!(config.executor.gas_limit, 99);
        assert_eq!(config.optimization, Optimization::Debug);
        assert_eq!(cli.args, vec!["x", "y"]);
        assert_eq!(cli.artifact_name(), "prog");
    }

    #[test]
    fn test_missing_input_message() {
        let cli = Cli::parse_from(["kiln"]);
        assert_eq!(read_input(&cli), Err(MISSING_INPUT.to_string()));
    }

    #[test]
    fn test_eval_uses_default_file_name() {
        let cli = Cli::parse_from(["kiln", "--eval", "fn main() {\n}"]);
        let (source, name) = read_input(&cli).unwrap();
        assert_eq!(source, "fn main() {\n}");
        assert_eq!(name, DEFAULT_FILE_NAME);
    }

    #[test]
    fn test_saves_the_executed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from(["kiln", "prog.kn"]);
        let config = cli.run_config("prog.kn".to_string());
        let run = kiln_compiler::run_with_artifact("fn main() {\n  print(1)\n}", &[], &config);
        let artifact = run.artifact.expect("compiled artifact");
        persist(&cli, dir.path(), Some(&artifact));
        let saved = std::fs::read(dir.path().join("prog.wasm")).unwrap();
        assert_eq!(saved, artifact.bytes());
    }
}
