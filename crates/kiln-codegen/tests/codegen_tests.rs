//! Integration tests for the Kiln WASM code generator.
//!
//! Tests validate:
//! - Programs compile to valid WASM
//! - Module structure (imports, exports, custom sections, names)
//! - Expression and statement semantics, executed through `wasmi`
//! - Gas metering and runtime traps
//! - Deterministic output (same input → same bytes)

use kiln_binder::{bind, BindOptions, Catalog, OutputKind};
use kiln_codegen::{emit, read_manifest, CodegenError, EmitOptions, Optimization};
use kiln_types::{LibraryReference, ReferenceSet, SourceFile};
use wasmparser::{ExternalKind, Parser as WasmParser, Payload, TypeRef};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers: compilation
// ══════════════════════════════════════════════════════════════════════════════

const TAG_NIL: i32 = 0;
const TAG_NUMBER: i32 = 1;
const TAG_BOOL: i32 = 2;
const TAG_STRING: i32 = 3;
const TAG_LIST: i32 = 4;

fn refs(names: &[&str]) -> ReferenceSet {
    names
        .iter()
        .map(|n| LibraryReference::new(*n, format!("kiln:/lib/{n}.kl")))
        .collect()
}

fn platform() -> ReferenceSet {
    refs(&["convert", "core", "list", "string"])
}

fn try_compile_with(
    source: &str,
    output: OutputKind,
    optimization: Optimization,
) -> Result<Vec<u8>, CodegenError> {
    let sf = SourceFile::new("test.kn", source);
    let parsed = kiln_parser::parse(&sf);
    assert!(
        !parsed.diagnostics.has_errors(),
        "parse errors: {:?}",
        parsed.diagnostics.error_lines()
    );
    let refs = platform();
    let options = BindOptions {
        ignore_accessibility: false,
        output,
    };
    let bound = bind(&parsed.program, &sf, &Catalog::standard(), &refs, options);
    assert!(
        !bound.diagnostics.has_errors(),
        "bind errors: {:?}",
        bound.diagnostics.error_lines()
    );
    emit(&parsed.program, &bound.model, &refs, EmitOptions { optimization })
}

fn compile_source(source: &str) -> Vec<u8> {
    try_compile_with(source, OutputKind::Executable, Optimization::Release)
        .unwrap_or_else(|e| panic!("codegen failed: {e}"))
}

fn compile_debug(source: &str) -> Vec<u8> {
    try_compile_with(source, OutputKind::Executable, Optimization::Debug)
        .unwrap_or_else(|e| panic!("codegen failed: {e}"))
}

fn get_exports(wasm: &[u8]) -> Vec<(String, ExternalKind)> {
    let mut exports = Vec::new();
    for payload in WasmParser::new(0).parse_all(wasm) {
        if let Payload::ExportSection(reader) = payload.unwrap() {
            for export in reader {
                let export = export.unwrap();
                exports.push((export.name.to_string(), export.kind));
            }
        }
    }
    exports
}

fn get_function_imports(wasm: &[u8]) -> Vec<String> {
    let mut imports = Vec::new();
    for payload in WasmParser::new(0).parse_all(wasm) {
        if let Payload::ImportSection(reader) = payload.unwrap() {
            for import in reader {
                let import = import.unwrap();
                if matches!(import.ty, TypeRef::Func(_)) {
                    imports.push(format!("{}.{}", import.module, import.name));
                }
            }
        }
    }
    imports
}

fn custom_section_names(wasm: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    for payload in WasmParser::new(0).parse_all(wasm) {
        if let Payload::CustomSection(reader) = payload.unwrap() {
            names.push(reader.name().to_string());
        }
    }
    names
}

// ══════════════════════════════════════════════════════════════════════════════
// WasmRunner: instantiate a compiled module via wasmi with stub `rt` imports
// ══════════════════════════════════════════════════════════════════════════════

/// Host state held by the wasmi Store.
#[derive(Default)]
struct HostState {
    /// Trap message if `rt.trap` was called.
    trap_message: Option<String>,
    /// Number of `rt.deadline` calls.
    deadline_checks: u32,
}

fn read_bytes(data: &[u8], ptr: i32, len: i32) -> String {
    let start = ptr as usize;
    let end = start + len as usize;
    String::from_utf8_lossy(&data[start..end]).to_string()
}

struct WasmRunner {
    store: wasmi::Store<HostState>,
    instance: wasmi::Instance,
    memory: wasmi::Memory,
}

impl WasmRunner {
    /// Instantiate a module that calls no library functions.
    fn new(wasm_bytes: &[u8]) -> Self {
        let engine = wasmi::Engine::default();
        let module =
            wasmi::Module::new(&engine, wasm_bytes).expect("failed to parse WASM module");

        let mut store = wasmi::Store::new(&engine, HostState::default());
        let mut linker = <wasmi::Linker<HostState>>::new(&engine);

        // rt.trap(ptr: i32, len: i32)
        linker
            .func_wrap(
                "rt",
                "trap",
                |mut caller: wasmi::Caller<'_, HostState>,
                 ptr: i32,
                 len: i32|
                 -> Result<(), wasmi::Error> {
                    let mem = caller
                        .get_export("memory")
                        .and_then(|e| e.into_memory())
                        .expect("memory export");
                    let msg = read_bytes(mem.data(&caller), ptr, len);
                    caller.data_mut().trap_message = Some(msg.clone());
                    Err(wasmi::Error::new(msg))
                },
            )
            .expect("link trap");

        // rt.deadline()
        linker
            .func_wrap("rt", "deadline", |mut caller: wasmi::Caller<'_, HostState>| {
                caller.data_mut().deadline_checks += 1;
            })
            .expect("link deadline");

        // rt.to_string / rt.concat: identity stubs, string tests avoid them.
        linker
            .func_wrap("rt", "to_string", |_: wasmi::Caller<'_, HostState>, v: i32| -> i32 { v })
            .expect("link to_string");
        linker
            .func_wrap(
                "rt",
                "concat",
                |_: wasmi::Caller<'_, HostState>, a: i32, _b: i32| -> i32 { a },
            )
            .expect("link concat");

        // rt.equals: byte-identical cells.
        linker
            .func_wrap(
                "rt",
                "equals",
                |caller: wasmi::Caller<'_, HostState>, a: i32, b: i32| -> i32 {
                    let mem = caller
                        .get_export("memory")
                        .and_then(|e| e.into_memory())
                        .expect("memory export");
                    let data = mem.data(&caller);
                    let cell = |p: i32| data[p as usize..p as usize + 12].to_vec();
                    i32::from(cell(a) == cell(b))
                },
            )
            .expect("link equals");

        let instance = linker
            .instantiate(&mut store, &module)
            .expect("instantiation failed")
            .start(&mut store)
            .expect("start failed");

        let memory = instance
            .get_memory(&store, "memory")
            .expect("no memory export");

        Self {
            store,
            instance,
            memory,
        }
    }

    /// Call a zero-argument export and return the value pointer.
    fn call(&mut self, name: &str) -> Result<i32, wasmi::Error> {
        let func = self
            .instance
            .get_typed_func::<(), i32>(&self.store, name)
            .expect("no such export");
        func.call(&mut self.store, ())
    }

    fn set_gas_limit(&mut self, limit: i32) {
        let global = self
            .instance
            .get_global(&self.store, "gas_limit")
            .expect("no gas_limit export");
        global
            .set(&mut self.store, wasmi::Val::I32(limit))
            .expect("set gas_limit");
    }

    fn read_i32(&self, offset: usize) -> i32 {
        let data = self.memory.data(&self.store);
        i32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    fn read_f64(&self, offset: usize) -> f64 {
        let data = self.memory.data(&self.store);
        f64::from_le_bytes(data[offset..offset + 8].try_into().unwrap())
    }

    fn number(&self, ptr: i32) -> f64 {
        assert_eq!(self.read_i32(ptr as usize), TAG_NUMBER, "not a number");
        self.read_f64(ptr as usize + 4)
    }

    fn boolean(&self, ptr: i32) -> bool {
        assert_eq!(self.read_i32(ptr as usize), TAG_BOOL, "not a bool");
        self.read_i32(ptr as usize + 4) != 0
    }

    fn string(&self, ptr: i32) -> String {
        assert_eq!(self.read_i32(ptr as usize), TAG_STRING, "not a string");
        let data_ptr = self.read_i32(ptr as usize + 4);
        let len = self.read_i32(ptr as usize + 8);
        read_bytes(self.memory.data(&self.store), data_ptr, len)
    }

    fn numbers(&self, ptr: i32) -> Vec<f64> {
        assert_eq!(self.read_i32(ptr as usize), TAG_LIST, "not a list");
        let arr = self.read_i32(ptr as usize + 4) as usize;
        let count = self.read_i32(ptr as usize + 8) as usize;
        (0..count)
            .map(|i| self.number(self.read_i32(arr + i * 4)))
            .collect()
    }
}

/// Compile `source`, run export `f` and return the runner plus result.
fn run(source: &str, f: &str) -> (WasmRunner, i32) {
    let mut runner = WasmRunner::new(&compile_source(source));
    let ptr = runner.call(f).unwrap_or_else(|e| panic!("{f}() trapped: {e}"));
    (runner, ptr)
}

fn eval_number(body: &str) -> f64 {
    let (runner, ptr) = run(&format!("fn f() {{\n{body}\n}}"), "f");
    runner.number(ptr)
}

// ══════════════════════════════════════════════════════════════════════════════
// Module structure
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_minimal_program_is_valid_wasm() {
    let wasm = compile_source("fn main() {\n}");
    assert_eq!(&wasm[0..4], b"\0asm");
    assert!(wasmparser::validate(&wasm).is_ok());
}

#[test]
fn test_required_exports() {
    let exports = get_exports(&compile_source("fn main() {\n}\nfn helper(x) {\n  return x\n}"));
    let find = |name: &str| exports.iter().find(|(n, _)| n == name).map(|(_, k)| *k);
    assert_eq!(find("memory"), Some(ExternalKind::Memory));
    assert_eq!(find("alloc"), Some(ExternalKind::Func));
    assert_eq!(find("heap_ptr"), Some(ExternalKind::Global));
    assert_eq!(find("gas_limit"), Some(ExternalKind::Global));
    assert_eq!(find("main"), Some(ExternalKind::Func));
    assert_eq!(find("helper"), Some(ExternalKind::Func));
}

#[test]
fn test_runtime_imports_come_first() {
    let imports = get_function_imports(&compile_source("fn main() {\n}"));
    assert_eq!(
        imports,
        vec!["rt.trap", "rt.deadline", "rt.to_string", "rt.concat", "rt.equals"]
    );
}

#[test]
fn test_library_imports_follow_in_sorted_order() {
    let wasm = compile_source(
        "fn main() {\n  println(string.upper(\"a\"))\n  print(\"b\")\n  let xs = [1]\n  println(xs[0])\n}",
    );
    let imports = get_function_imports(&wasm);
    assert_eq!(
        &imports[5..],
        &["core.print", "core.println", "list.get", "string.upper"]
    );
}

#[test]
fn test_manifest_sections() {
    let wasm = compile_source("fn main(args) {\n}");
    let manifest = read_manifest(&wasm).unwrap();
    let entry = manifest.entry.expect("entry section");
    assert_eq!(entry.export, "main");
    assert_eq!(entry.params, 1);
    assert!(!entry.returns_task);
    assert_eq!(manifest.references, vec!["convert", "core", "list", "string"]);
    assert_eq!(manifest.version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_library_output_has_no_entry_section() {
    let wasm = try_compile_with("fn helper() {\n}", OutputKind::Library, Optimization::Release)
        .unwrap();
    assert!(read_manifest(&wasm).unwrap().entry.is_none());
    assert!(custom_section_names(&wasm).contains(&"kiln.references".to_string()));
}

#[test]
fn test_debug_build_has_name_section() {
    let source = "fn main() {\n}";
    assert!(custom_section_names(&compile_debug(source)).contains(&"name".to_string()));
    assert!(!custom_section_names(&compile_source(source)).contains(&"name".to_string()));
}

#[test]
fn test_reserved_export_names_are_not_exported_twice() {
    let wasm = compile_source("fn main() {\n  memory()\n}\nfn memory() {\n}");
    let exports = get_exports(&wasm);
    let memories: Vec<_> = exports.iter().filter(|(n, _)| n == "memory").collect();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].1, ExternalKind::Memory);
}

#[test]
fn test_wide_functions_get_their_own_type() {
    let source = "fn main() {\n  sum5(1, 2, 3, 4, 5)\n}\nfn sum5(a, b, c, d, e) {\n  return a + b + c + d + e\n}";
    let wasm = compile_source(source);
    assert!(wasmparser::validate(&wasm).is_ok());
}

#[test]
fn test_deterministic_output_100_iterations() {
    let source = "fn main(args) {\n  let total = 0\n  for a in args {\n    set total = total + 1\n  }\n  println(\"n=${total}\")\n}";
    let first = compile_source(source);
    for i in 0..100 {
        assert_eq!(compile_source(source), first, "iteration {i} differs");
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_arithmetic() {
    assert_eq!(eval_number("  return 6 * 7"), 42.0);
    assert_eq!(eval_number("  let a = 10\n  let b = 4\n  return a - b / 2"), 8.0);
    assert_eq!(eval_number("  let a = -7\n  return a % 3"), -1.0);
}

#[test]
fn test_release_folds_constants_debug_does_not() {
    let source = "fn f() {\n  return 1 + 2 * 3\n}";
    let release = compile_source(source);
    let debug = compile_debug(source);
    assert_ne!(release, debug);

    for wasm in [release, debug] {
        let mut runner = WasmRunner::new(&wasm);
        let ptr = runner.call("f").unwrap();
        assert_eq!(runner.number(ptr), 7.0);
    }
}

#[test]
fn test_comparisons_and_equality() {
    let (runner, ptr) = run("fn f() {\n  let a = 3\n  return a <= 3\n}", "f");
    assert!(runner.boolean(ptr));
    let (runner, ptr) = run("fn f() {\n  let a = 3\n  return a != 3\n}", "f");
    assert!(!runner.boolean(ptr));
}

#[test]
fn test_logic_short_circuits() {
    let source = "fn boom() {\n  let z = 0\n  return 1 / z\n}\nfn f() {\n  let no = false\n  return no and boom()\n}\nfn g() {\n  let yes = 1\n  return yes or boom()\n}";
    let (mut runner, ptr) = run(source, "f");
    assert!(!runner.boolean(ptr));
    let ptr = runner.call("g").unwrap();
    assert!(runner.boolean(ptr));
}

#[test]
fn test_nil_and_not() {
    let (runner, ptr) = run("fn f() {\n}", "f");
    assert_eq!(runner.read_i32(ptr as usize), TAG_NIL);
    let (runner, ptr) = run("fn f() {\n  let x = nil\n  return not x\n}", "f");
    assert!(runner.boolean(ptr));
}

#[test]
fn test_string_literal_lives_in_data() {
    let (runner, ptr) = run("fn f() {\n  return \"hello\"\n}", "f");
    assert_eq!(runner.string(ptr), "hello");
}

#[test]
fn test_list_literal() {
    let (runner, ptr) = run("fn f() {\n  let x = 2\n  return [1, x, x + 1]\n}", "f");
    assert_eq!(runner.numbers(ptr), vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_user_function_calls() {
    let source = "fn square(x) {\n  return x * x\n}\nfn f() {\n  return square(square(3))\n}";
    let (runner, ptr) = run(source, "f");
    assert_eq!(runner.number(ptr), 81.0);
}

#[test]
fn test_recursion() {
    let source = "fn fib(n) {\n  if n < 2 {\n    return n\n  }\n  return fib(n - 1) + fib(n - 2)\n}\nfn f() {\n  return fib(15)\n}";
    let (runner, ptr) = run(source, "f");
    assert_eq!(runner.number(ptr), 610.0);
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_while_loop() {
    assert_eq!(
        eval_number("  let i = 0\n  let sum = 0\n  while i < 10 {\n    set i = i + 1\n    set sum = sum + i\n  }\n  return sum"),
        55.0
    );
}

#[test]
fn test_for_loop_with_break_and_continue() {
    let body = "  let sum = 0\n  for x in [1, 2, 3, 4, 5, 6] {\n    if x == 2 {\n      continue\n    }\n    if x > 4 {\n      break\n    }\n    set sum = sum + x\n  }\n  return sum";
    assert_eq!(eval_number(body), 8.0);
}

#[test]
fn test_else_if_chain() {
    let source = "fn pick(n) {\n  if n < 0 {\n    return \"neg\"\n  } else if n == 0 {\n    return \"zero\"\n  } else {\n    return \"pos\"\n  }\n}\nfn f() {\n  return pick(0)\n}";
    let (runner, ptr) = run(source, "f");
    assert_eq!(runner.string(ptr), "zero");
}

#[test]
fn test_nested_loops_break_inner_only() {
    let body = "  let count = 0\n  for a in [1, 2, 3] {\n    for b in [1, 2, 3] {\n      if b == 2 {\n        break\n      }\n      set count = count + 1\n    }\n  }\n  return count";
    assert_eq!(eval_number(body), 3.0);
}

// ══════════════════════════════════════════════════════════════════════════════
// Traps and metering
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_division_by_zero_traps_with_message() {
    let mut runner = WasmRunner::new(&compile_source("fn f() {\n  let z = 0\n  return 1 / z\n}"));
    assert!(runner.call("f").is_err());
    assert_eq!(runner.store.data().trap_message.as_deref(), Some("division by zero"));
}

#[test]
fn test_invalid_add_traps() {
    let mut runner =
        WasmRunner::new(&compile_source("fn f() {\n  let t = true\n  return t + 1\n}"));
    assert!(runner.call("f").is_err());
    assert_eq!(
        runner.store.data().trap_message.as_deref(),
        Some("invalid operands for '+'")
    );
}

#[test]
fn test_for_over_non_list_traps() {
    let mut runner = WasmRunner::new(&compile_source("fn f() {\n  for x in 5 {\n  }\n}"));
    assert!(runner.call("f").is_err());
    assert_eq!(
        runner.store.data().trap_message.as_deref(),
        Some("can only iterate over a list")
    );
}

#[test]
fn test_infinite_loop_exhausts_budget() {
    let mut runner = WasmRunner::new(&compile_source("fn f() {\n  while true {\n  }\n}"));
    runner.set_gas_limit(5_000);
    assert!(runner.call("f").is_err());
    assert_eq!(
        runner.store.data().trap_message.as_deref(),
        Some("execution budget exhausted")
    );
    assert!(runner.store.data().deadline_checks >= 4);
}

#[test]
fn test_heap_grows_past_initial_memory() {
    let body = "  let i = 0\n  while i < 20000 {\n    set i = i + 1\n  }\n  return i";
    let (runner, ptr) = run(&format!("fn f() {{\n{body}\n}}"), "f");
    assert_eq!(runner.number(ptr), 20000.0);
    assert!(runner.memory.data(&runner.store).len() > 65_536);
}

#[test]
fn test_artifact_round_trips_entry_through_bytes() {
    let wasm = compile_source("fn main() -> task {\n  return nil\n}");
    let artifact = kiln_codegen::CompiledArtifact::from_bytes(wasm).unwrap();
    let entry = artifact.entry().expect("entry");
    assert!(entry.returns_task);
    assert_eq!(entry.params, 0);
}
