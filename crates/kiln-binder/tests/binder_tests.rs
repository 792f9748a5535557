//! Binder tests: name resolution, call checks, reference checks, entry
//! point validation and determinism.

use kiln_binder::{bind, BindOptions, BindResult, Catalog, OutputKind, Symbol, Visibility};
use kiln_types::ast::*;
use kiln_types::{DiagnosticCode, LibraryReference, ReferenceSet, Severity, SourceFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

const PLATFORM: &[&str] = &["core", "string", "list", "convert"];

fn refs(names: &[&str]) -> ReferenceSet {
    names
        .iter()
        .map(|n| LibraryReference::new(*n, format!("kiln:/lib/{n}.kl")))
        .collect()
}

fn parse_program(source: &str) -> (Program, SourceFile) {
    let file = SourceFile::new("test.kn", source);
    let parsed = kiln_parser::parse(&file);
    assert!(
        !parsed.diagnostics.has_errors(),
        "unexpected parse errors: {:?}",
        parsed.diagnostics.error_lines()
    );
    (parsed.program, file)
}

fn bind_with(source: &str, libraries: &[&str], options: BindOptions) -> (Program, BindResult) {
    let (program, file) = parse_program(source);
    let result = bind(
        &program,
        &file,
        &Catalog::standard(),
        &refs(libraries),
        options,
    );
    (program, result)
}

fn bind_src(source: &str, libraries: &[&str]) -> BindResult {
    bind_with(source, libraries, BindOptions::default()).1
}

fn error_codes(source: &str, libraries: &[&str]) -> Vec<DiagnosticCode> {
    bind_src(source, libraries)
        .diagnostics
        .errors
        .iter()
        .map(|d| d.code)
        .collect()
}

fn bind_ok(source: &str, libraries: &[&str]) -> BindResult {
    let result = bind_src(source, libraries);
    assert!(
        !result.diagnostics.has_errors(),
        "unexpected bind errors: {:?}",
        result.diagnostics.error_lines()
    );
    result
}

fn main_stmt(program: &Program, index: usize) -> &Stmt {
    &program.function("main").expect("main").body.stmts[index]
}

// ─────────────────────────────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_hello_world_binds() {
    let result = bind_ok("fn main() {\n  println(\"hello\")\n}", PLATFORM);
    let used: Vec<_> = result.model.used_functions().collect();
    assert_eq!(used, vec![("core", "println", 1)]);
    let entry = result.model.entry_point().expect("entry point");
    assert_eq!(entry.export, "main");
    assert_eq!(entry.params, 0);
    assert!(!entry.returns_task);
}

#[test]
fn test_unknown_name() {
    assert_eq!(
        error_codes("fn main() {\n  println(missing)\n}", PLATFORM),
        vec![DiagnosticCode::UNKNOWN_NAME]
    );
}

#[test]
fn test_diagnostic_line_format() {
    let result = bind_src("fn main() {\n  println(missing)\n}", PLATFORM);
    assert_eq!(
        result.diagnostics.error_lines(),
        vec!["test.kn(2,11): the name 'missing' does not exist in the current context"]
    );
}

#[test]
fn test_user_function_call_and_forward_reference() {
    bind_ok(
        "fn main() {\n  println(twice(2))\n}\nfn twice(n) {\n  return n * 2\n}",
        PLATFORM,
    );
}

#[test]
fn test_wrong_arg_count() {
    assert_eq!(
        error_codes("fn main() {\n  println(1, 2)\n}", PLATFORM),
        vec![DiagnosticCode::WRONG_ARG_COUNT]
    );
    assert_eq!(
        error_codes("fn f(a) {\n}\nfn main() {\n  f()\n}", PLATFORM),
        vec![DiagnosticCode::WRONG_ARG_COUNT]
    );
}

#[test]
fn test_duplicate_declarations() {
    assert_eq!(
        error_codes("fn f() {\n}\nfn f() {\n}\nfn main() {\n}", PLATFORM),
        vec![DiagnosticCode::DUPLICATE_DECLARATION]
    );
    assert_eq!(
        error_codes("fn main() {\n  let x = 1\n  let x = 2\n}", PLATFORM),
        vec![DiagnosticCode::DUPLICATE_DECLARATION]
    );
    assert_eq!(
        error_codes("fn f(a, a) {\n}\nfn main() {\n}", PLATFORM),
        vec![DiagnosticCode::DUPLICATE_DECLARATION]
    );
}

#[test]
fn test_shadowing_in_nested_block() {
    bind_ok(
        "fn main() {\n  let x = 1\n  if true {\n    let x = 2\n    println(x)\n  }\n  println(x)\n}",
        PLATFORM,
    );
}

#[test]
fn test_let_initializer_cannot_see_itself() {
    assert_eq!(
        error_codes("fn main() {\n  let x = x\n}", PLATFORM),
        vec![DiagnosticCode::UNKNOWN_NAME]
    );
}

#[test]
fn test_block_locals_do_not_leak() {
    assert_eq!(
        error_codes(
            "fn main() {\n  if true {\n    let y = 1\n  }\n  println(y)\n}",
            PLATFORM
        ),
        vec![DiagnosticCode::UNKNOWN_NAME]
    );
}

#[test]
fn test_set_targets() {
    bind_ok("fn main() {\n  let x = 1\n  set x = x + 1\n}", PLATFORM);
    bind_ok("fn f(n) {\n  set n = 0\n}\nfn main() {\n}", PLATFORM);
    assert_eq!(
        error_codes("fn main() {\n  set main = 1\n}", PLATFORM),
        vec![DiagnosticCode::INVALID_ASSIGNMENT]
    );
    assert_eq!(
        error_codes("fn main() {\n  set nope = 1\n}", PLATFORM),
        vec![DiagnosticCode::UNKNOWN_NAME]
    );
}

#[test]
fn test_loop_control() {
    bind_ok(
        "fn main() {\n  while true {\n    if true {\n      break\n    }\n    continue\n  }\n}",
        PLATFORM,
    );
    bind_ok("fn main() {\n  for x in [1] {\n    break\n  }\n}", PLATFORM);
    assert_eq!(
        error_codes("fn main() {\n  break\n}", PLATFORM),
        vec![DiagnosticCode::LOOP_CONTROL_OUTSIDE_LOOP]
    );
}

#[test]
fn test_for_item_scope() {
    bind_ok(
        "fn main() {\n  for item in [1, 2] {\n    println(item)\n  }\n}",
        PLATFORM,
    );
    assert_eq!(
        error_codes(
            "fn main() {\n  for item in [1] {\n  }\n  println(item)\n}",
            PLATFORM
        ),
        vec![DiagnosticCode::UNKNOWN_NAME]
    );
}

#[test]
fn test_unknown_member() {
    assert_eq!(
        error_codes("fn main() {\n  math.nope(1)\n}", &["core", "math"]),
        vec![DiagnosticCode::UNKNOWN_MEMBER]
    );
    assert_eq!(
        error_codes("fn main() {\n  let x = 1\n  x.y\n}", PLATFORM),
        vec![DiagnosticCode::UNKNOWN_MEMBER]
    );
}

#[test]
fn test_not_callable() {
    assert_eq!(
        error_codes("fn main() {\n  let x = 1\n  x()\n}", PLATFORM),
        vec![DiagnosticCode::NOT_CALLABLE]
    );
    assert_eq!(
        error_codes("fn main() {\n  math.PI()\n}", &["math"]),
        vec![DiagnosticCode::NOT_CALLABLE]
    );
}

#[test]
fn test_function_and_library_as_value() {
    assert_eq!(
        error_codes("fn main() {\n  let f = main\n}", PLATFORM),
        vec![DiagnosticCode::FUNCTION_AS_VALUE]
    );
    assert_eq!(
        error_codes("fn main() {\n  let f = math.sqrt\n}", &["math"]),
        vec![DiagnosticCode::FUNCTION_AS_VALUE]
    );
    assert_eq!(
        error_codes("fn main() {\n  let m = math\n}", &["math"]),
        vec![DiagnosticCode::NAMESPACE_AS_VALUE]
    );
}

#[test]
fn test_constant_binds_as_value() {
    let result = bind_ok("fn main() {\n  println(math.PI)\n}", &["core", "math"]);
    let libs: Vec<_> = result.model.used_libraries().collect();
    assert_eq!(libs, vec!["core", "math"]);
}

// ─────────────────────────────────────────────────────────────────────
// Symbols
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_index_binds_to_list_get() {
    let (program, result) = bind_with(
        "fn main() {\n  let xs = [1, 2]\n  xs[0]\n}",
        PLATFORM,
        BindOptions::default(),
    );
    let Stmt::Expr(index) = main_stmt(&program, 1) else {
        panic!("expected expression statement");
    };
    match result.model.symbol_info(index.id) {
        Some(Symbol::LibraryFunction { library, name, .. }) => {
            assert_eq!(library, "list");
            assert_eq!(name, "get");
        }
        other => panic!("expected list.get, got {other:?}"),
    }
}

#[test]
fn test_qualified_call_symbols() {
    let (program, result) = bind_with(
        "fn main() {\n  math.sqrt(4)\n}",
        &["math"],
        BindOptions::default(),
    );
    let Stmt::Expr(call) = main_stmt(&program, 0) else {
        panic!("expected expression statement");
    };
    let ExprKind::Call { callee, .. } = &call.kind else {
        panic!("expected call");
    };
    let ExprKind::Member { object, .. } = &callee.kind else {
        panic!("expected member callee");
    };
    assert_eq!(
        result.model.symbol_info(object.id),
        Some(&Symbol::Namespace {
            library: "math".into()
        })
    );
    assert_eq!(
        result.model.symbol_info(callee.id).map(ToString::to_string),
        Some("math.sqrt".to_string())
    );
    assert_eq!(
        result.model.symbol_info(call.id).map(ToString::to_string),
        Some("math.sqrt".to_string())
    );
}

#[test]
fn test_declared_symbols_and_slots() {
    let (program, result) = bind_with(
        "fn main(args) {\n  let a = 1\n  for x in args {\n    let b = x\n  }\n}",
        PLATFORM,
        BindOptions::default(),
    );
    let main = program.function("main").unwrap();
    assert_eq!(
        result.model.declared_symbol(main.id),
        Some(&Symbol::Function {
            name: "main".into(),
            arity: 1
        })
    );
    assert_eq!(
        result
            .model
            .declared_symbol(main.params[0].id)
            .and_then(Symbol::slot),
        Some(0)
    );
    let Stmt::Let(let_a) = main_stmt(&program, 0) else {
        panic!("expected let");
    };
    assert_eq!(
        result.model.declared_symbol(let_a.id).and_then(Symbol::slot),
        Some(1)
    );
    assert_eq!(result.model.local_count("main"), 4);
}

// ─────────────────────────────────────────────────────────────────────
// Reference checks
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_missing_reference() {
    assert_eq!(
        error_codes("fn main() {\n  println(math.sqrt(4))\n}", PLATFORM),
        vec![DiagnosticCode::MISSING_REFERENCE]
    );
    bind_ok("fn main() {\n  println(math.sqrt(4))\n}", &["core", "math"]);
}

#[test]
fn test_missing_reference_for_globals() {
    assert_eq!(
        error_codes("fn main() {\n  println(1)\n}", &[]),
        vec![DiagnosticCode::MISSING_REFERENCE]
    );
}

#[test]
fn test_missing_dependency_reported_once() {
    let source = "fn main() {\n  println(fmt.fixed(1, 2))\n  println(fmt.fixed(3, 4))\n}";
    assert_eq!(
        error_codes(source, &["core", "fmt"]),
        vec![DiagnosticCode::MISSING_DEPENDENCY]
    );
    bind_ok(source, &["core", "fmt", "math"]);
}

#[test]
fn test_net_is_rejected_without_reference() {
    assert_eq!(
        error_codes("fn main() {\n  net.fetch(\"x\")\n}", PLATFORM),
        vec![DiagnosticCode::MISSING_REFERENCE]
    );
}

#[test]
fn test_internal_symbol_accessibility() {
    let source = "fn main() {\n  string.byte_at(\"a\", 0)\n}";
    assert_eq!(
        error_codes(source, PLATFORM),
        vec![DiagnosticCode::INACCESSIBLE_SYMBOL]
    );
    let (_, relaxed) = bind_with(
        source,
        PLATFORM,
        BindOptions {
            ignore_accessibility: true,
            output: OutputKind::Executable,
        },
    );
    assert!(!relaxed.diagnostics.has_errors());
    let visibility = Catalog::standard()
        .library("string")
        .and_then(|l| l.get_function("byte_at"))
        .map(|f| f.visibility);
    assert_eq!(visibility, Some(Visibility::Internal));
}

#[test]
fn test_symbols_recorded_despite_reference_errors() {
    let result = bind_src("fn main() {\n  math.sqrt(4)\n}", PLATFORM);
    assert!(result.diagnostics.has_errors());
    let libs: Vec<_> = result.model.used_libraries().collect();
    assert_eq!(libs, vec!["math"]);
}

// ─────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_missing_main_is_warning() {
    let result = bind_src("fn helper() {\n}", PLATFORM);
    assert!(!result.diagnostics.has_errors());
    assert_eq!(result.diagnostics.warnings.len(), 1);
    let warning = &result.diagnostics.warnings[0];
    assert_eq!(warning.code, DiagnosticCode::MISSING_ENTRY_POINT);
    assert_eq!(warning.severity, Severity::Warning);
    assert!(result.model.entry_point().is_none());
}

#[test]
fn test_library_output_needs_no_main() {
    let (_, result) = bind_with(
        "fn helper() {\n}",
        PLATFORM,
        BindOptions {
            ignore_accessibility: false,
            output: OutputKind::Library,
        },
    );
    assert!(result.diagnostics.warnings.is_empty());
    assert!(result.model.entry_point().is_none());
}

#[test]
fn test_main_with_arguments() {
    let result = bind_ok("fn main(args: list) {\n  println(len(args))\n}", PLATFORM);
    assert_eq!(result.model.entry_point().map(|e| e.params), Some(1));
}

#[test]
fn test_invalid_main_signatures() {
    assert_eq!(
        error_codes("fn main(a, b) {\n}", PLATFORM),
        vec![DiagnosticCode::INVALID_ENTRY_POINT]
    );
    assert_eq!(
        error_codes("fn main(n: number) {\n}", PLATFORM),
        vec![DiagnosticCode::INVALID_ENTRY_POINT]
    );
    assert!(bind_src("fn main(a, b) {\n}", PLATFORM)
        .model
        .entry_point()
        .is_none());
}

#[test]
fn test_async_main() {
    let result = bind_ok(
        "fn main() -> task {\n  return task.spawn(\"work\")\n}\nfn work() {\n}",
        &["core", "task", "time"],
    );
    assert!(result.model.entry_point().is_some_and(|e| e.returns_task));
}

// ─────────────────────────────────────────────────────────────────────
// Determinism
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_binder_determinism_100_iterations() {
    let source = "fn main(args) {\n  let total = 0\n  for a in args {\n    set total = total + convert.to_number(a)\n  }\n  println(fmt.fixed(math.sqrt(total), 2))\n  println(nope)\n}";
    let first = bind_src(source, &["core", "convert", "fmt"]);
    let first_lines = first.diagnostics.error_lines();
    let first_used: Vec<(String, String, usize)> = first
        .model
        .used_functions()
        .map(|(l, n, a)| (l.to_string(), n.to_string(), a))
        .collect();
    for i in 0..100 {
        let again = bind_src(source, &["core", "convert", "fmt"]);
        assert_eq!(again.diagnostics.error_lines(), first_lines, "iteration {i}");
        let used: Vec<(String, String, usize)> = again
            .model
            .used_functions()
            .map(|(l, n, a)| (l.to_string(), n.to_string(), a))
            .collect();
        assert_eq!(used, first_used, "iteration {i}");
    }
}
