//! End-to-end pipeline tests: source → references → artifact → execution
//! result.

use std::time::Duration;

use kiln_compiler::{
    compile, run, run_with_artifact, try_run, CompileOptions, ExecutionError, ExecutorConfig,
    PipelineError, RunConfig,
};
use kiln_resolver::discover_standard;
use kiln_runner::console;
use kiln_types::{SourceFile, LINE_TERMINATOR};

fn run_source(source: &str) -> kiln_compiler::ExecutionResult {
    run(source, &[], &RunConfig::default())
}

#[test]
fn test_hello_world() {
    let result = run_source("fn main() {\n  println(\"hello\")\n}");
    assert!(result.is_success, "{}", result.output);
    assert_eq!(result.output, format!("hello{LINE_TERMINATOR}"));
    assert!(result.time_taken >= 0);
}

#[test]
fn test_memory_is_sampled_on_linux() {
    let result = run_source("fn main() {\n  println(1)\n}");
    assert!(result.is_success);
    if cfg!(target_os = "linux") {
        assert!(result.memory.is_some());
    }
}

#[test]
fn test_arguments_reach_main() {
    let args = vec!["a".to_string(), "b".to_string()];
    let result = run(
        "fn main(args) {\n  println(list.join(args, \"+\"))\n}",
        &args,
        &RunConfig::default(),
    );
    assert_eq!(result.output, format!("a+b{LINE_TERMINATOR}"));
}

#[test]
fn test_non_platform_libraries_are_resolved() {
    let result = run_source("fn main() {\n  println(fmt.fixed(math.sqrt(2), 3))\n}");
    assert!(result.is_success, "{}", result.output);
    assert_eq!(result.output, format!("1.414{LINE_TERMINATOR}"));
}

#[test]
fn test_missing_entry_point_fails() {
    let result = run_source("fn helper() {\n}");
    assert!(!result.is_success);
    assert_eq!(result.time_taken, -1);
    assert_eq!(result.memory, Some(-1.0));
    assert!(result.output.contains("entry point"), "{}", result.output);
}

#[test]
fn test_compile_errors_become_the_output() {
    let result = run_source("fn main() {\n  nope()\n}");
    assert!(!result.is_success);
    assert!(result.output.starts_with("main.kn(2,"), "{}", result.output);
    assert!(result.output.contains("nope"));
}

#[test]
fn test_every_compile_error_is_reported() {
    let calls: String = (0..25).map(|i| format!("  missing_{i}()\n")).collect();
    let result = run_source(&format!("fn main() {{\n{calls}}}"));
    assert!(!result.is_success);
    let lines: Vec<&str> = result.output.lines().collect();
    assert_eq!(lines.len(), 25, "{}", result.output);
    assert!(lines[24].starts_with("main.kn(26,"), "{}", lines[24]);
    assert!(lines[24].contains("missing_24"));
}

#[test]
fn test_custom_file_name_in_diagnostics() {
    let config = RunConfig {
        file_name: "prog.kn".to_string(),
        ..RunConfig::default()
    };
    let result = run("fn main() {\n  nope()\n}", &[], &config);
    assert!(result.output.starts_with("prog.kn(2,"), "{}", result.output);
}

#[test]
fn test_panic_fails_with_message() {
    let result = run_source("fn main() {\n  panic(\"boom\")\n}");
    assert!(!result.is_success);
    assert!(result.output.contains("boom"));
    assert!(!console::is_captured());
}

#[test]
fn test_unloaded_library_fails_compilation() {
    let result = run_source("fn main() {\n  net.fetch(\"x\")\n}");
    assert!(!result.is_success);
    assert!(result.output.contains("net"), "{}", result.output);
}

#[test]
fn test_infinite_loop_does_not_hang() {
    let config = RunConfig {
        executor: ExecutorConfig {
            deadline: Duration::from_millis(200),
            ..ExecutorConfig::default()
        },
        ..RunConfig::default()
    };
    let result = run("fn main() {\n  while true {\n  }\n}", &[], &config);
    assert!(!result.is_success);
    assert!(
        result.output.contains("timed out") || result.output.contains("budget"),
        "{}",
        result.output
    );
}

#[test]
fn test_run_hands_back_the_executed_artifact() {
    let source = "fn main() {\n  println(\"kept\")\n}";
    let output = run_with_artifact(source, &[], &RunConfig::default());
    assert!(output.result.is_success);
    let artifact = output.artifact.expect("compiled artifact");

    let sf = SourceFile::new("main.kn", source);
    let expected = compile(&sf, &discover_standard(&sf), CompileOptions::default()).unwrap();
    assert_eq!(artifact.bytes(), expected.bytes());
}

#[test]
fn test_failed_execution_still_hands_back_the_artifact() {
    let output = run_with_artifact("fn main() {\n  panic(\"x\")\n}", &[], &RunConfig::default());
    assert!(!output.result.is_success);
    assert!(output.artifact.is_some());
}

#[test]
fn test_compile_failure_has_no_artifact() {
    let output = run_with_artifact("fn main() {\n  nope()\n}", &[], &RunConfig::default());
    assert!(!output.result.is_success);
    assert!(output.artifact.is_none());
}

#[test]
fn test_try_run_keeps_error_kinds() {
    let err = try_run("fn helper() {\n}", &[], &RunConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Execution(ExecutionError::EntryPointMissing)
    ));
}

#[test]
fn test_runs_are_repeatable() {
    let source = "fn fib(n) {\n  if n < 2 {\n    return n\n  }\n  return fib(n - 1) + fib(n - 2)\n}\nfn main() {\n  println(fib(20))\n}";
    let first = run_source(source);
    assert!(first.is_success);
    assert_eq!(first.output, format!("6765{LINE_TERMINATOR}"));
    for _ in 0..100 {
        let again = run_source(source);
        assert_eq!(again.output, first.output);
        assert_eq!(again.is_success, first.is_success);
    }
}

#[test]
fn test_result_record_json() {
    let result = run_source("fn main() {\n  print(\"x\")\n}");
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["output"], "x");
    assert_eq!(json["isSuccess"], true);
    assert!(json["timeTaken"].as_i64().unwrap() >= 0);
}
