//! Main WASM module assembler.
//!
//! Orchestrates the code generation pipeline:
//! 1. Lay out the function index space (runtime imports, library imports,
//!    runtime helpers, user functions)
//! 2. Emit runtime helper functions
//! 3. Emit user functions, interning string literals as they are met
//! 4. Assemble all WASM sections into a valid module
//! 5. Validate with `wasmparser`

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use kiln_binder::SemanticModel;
use kiln_types::ast::*;
use kiln_types::ReferenceSet;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wasm_encoder::{
    CodeSection, ConstExpr, CustomSection, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, GlobalSection, GlobalType, ImportSection, Instruction,
    MemorySection, MemoryType, Module, NameMap, NameSection, TypeSection, ValType,
};

use crate::error::{CodegenError, CodegenResult};
use crate::gas;
use crate::runtime::{self, DataSegment, FuncIndices, RT_ALLOC, RT_VAL_NIL};
use crate::stmt;
use crate::types::*;

// ══════════════════════════════════════════════════════════════════════════════
// Options
// ══════════════════════════════════════════════════════════════════════════════

/// How much the emitter optimises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimization {
    /// No folding; adds a `name` section.
    Debug,
    /// Constant folding, no names.
    #[default]
    Release,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmitOptions {
    pub optimization: Optimization,
}

/// Export names the module reserves. User functions with these names are
/// still callable from inside the module but are not exported.
pub const RESERVED_EXPORTS: [&str; 4] = [
    EXPORT_MEMORY,
    EXPORT_ALLOC,
    EXPORT_HEAP_PTR,
    EXPORT_GAS_LIMIT,
];

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Emit a bound Kiln [`Program`] as a `.wasm` binary.
///
/// `model` must come from binding `program` without errors; `refs` is
/// recorded in the `kiln.references` section.
pub fn emit(
    program: &Program,
    model: &SemanticModel,
    refs: &ReferenceSet,
    options: EmitOptions,
) -> CodegenResult<Vec<u8>> {
    let wasm = Emitter::new(program, model, refs, options).emit()?;
    debug!(
        functions = program.functions.len(),
        bytes = wasm.len(),
        optimization = ?options.optimization,
        "module emitted"
    );
    Ok(wasm)
}

// ══════════════════════════════════════════════════════════════════════════════
// Function table
// ══════════════════════════════════════════════════════════════════════════════

/// Absolute indices of every callable the program can name.
#[derive(Debug, Default)]
pub struct FunctionTable {
    user: HashMap<String, u32>,
    library: BTreeMap<(String, String), u32>,
}

impl FunctionTable {
    pub fn user(&self, name: &str) -> Option<u32> {
        self.user.get(name).copied()
    }

    pub fn library(&self, library: &str, name: &str) -> Option<u32> {
        self.library
            .get(&(library.to_string(), name.to_string()))
            .copied()
    }
}

/// Function type indices, with extra types for arities past the fixed ones.
#[derive(Debug, Default)]
struct TypeTable {
    extra: BTreeMap<usize, u32>,
}

impl TypeTable {
    fn new(arities: impl IntoIterator<Item = usize>) -> Self {
        let wide: BTreeSet<usize> = arities
            .into_iter()
            .filter(|a| fixed_value_fn_type(*a).is_none())
            .collect();
        let extra = wide
            .into_iter()
            .enumerate()
            .map(|(i, arity)| (arity, TYPE_COUNT + i as u32))
            .collect();
        Self { extra }
    }

    fn value_fn(&self, arity: usize) -> CodegenResult<u32> {
        fixed_value_fn_type(arity)
            .or_else(|| self.extra.get(&arity).copied())
            .ok_or_else(|| CodegenError::Internal(format!("no function type for arity {arity}")))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Emitter
// ══════════════════════════════════════════════════════════════════════════════

struct Emitter<'a> {
    program: &'a Program,
    model: &'a SemanticModel,
    refs: &'a ReferenceSet,
    options: EmitOptions,
    /// Library imports in import order: (library, name, arity).
    imports: Vec<(&'a str, &'a str, usize)>,
    ix: FuncIndices,
    types: TypeTable,
    functions: FunctionTable,
    data: DataSegment,
}

impl<'a> Emitter<'a> {
    fn new(
        program: &'a Program,
        model: &'a SemanticModel,
        refs: &'a ReferenceSet,
        options: EmitOptions,
    ) -> Self {
        let imports: Vec<_> = model.used_functions().collect();
        let ix = FuncIndices::new(imports.len() as u32);
        let types = TypeTable::new(
            imports
                .iter()
                .map(|(_, _, arity)| *arity)
                .chain(program.functions.iter().map(|f| f.params.len())),
        );

        let mut functions = FunctionTable::default();
        for (i, (library, name, _)) in imports.iter().enumerate() {
            functions
                .library
                .insert((library.to_string(), name.to_string()), RT_IMPORT_COUNT + i as u32);
        }
        for (position, f) in program.functions.iter().enumerate() {
            functions
                .user
                .entry(f.name.name.clone())
                .or_insert(ix.user(position as u32));
        }

        Self {
            program,
            model,
            refs,
            options,
            imports,
            ix,
            types,
            functions,
            data: DataSegment::new(),
        }
    }

    fn emit(mut self) -> CodegenResult<Vec<u8>> {
        // Bodies first: they fill the data segment.
        let helpers = runtime::runtime_functions(self.ix, &self.data.traps);
        let program = self.program;
        let mut bodies = Vec::with_capacity(program.functions.len());
        for f in &program.functions {
            bodies.push(self.emit_function(f)?);
        }

        let heap_start = self.data.heap_start();
        let max_bytes = MAX_MEMORY_PAGES * PAGE_SIZE as u64;
        if u64::from(heap_start) > max_bytes {
            return Err(CodegenError::LimitExceeded(format!(
                "static data needs {heap_start} bytes, memory holds {max_bytes}"
            )));
        }

        let mut module = Module::new();

        // 1. Type section
        module.section(&self.emit_types());

        // 2. Import section
        module.section(&self.emit_imports()?);

        // 3. Function section
        let mut func_section = FunctionSection::new();
        for helper in &helpers {
            func_section.function(helper.type_index);
        }
        for f in &self.program.functions {
            func_section.function(self.types.value_fn(f.params.len())?);
        }
        module.section(&func_section);

        // 4. Memory section
        let mut memory = MemorySection::new();
        memory.memory(MemoryType {
            minimum: u64::from(heap_start.div_ceil(PAGE_SIZE)).max(1),
            maximum: Some(MAX_MEMORY_PAGES),
            memory64: false,
            shared: false,
            page_size_log2: None,
        });
        module.section(&memory);

        // 5. Global section
        module.section(&self.emit_globals(heap_start));

        // 6. Export section
        module.section(&self.emit_exports());

        // 7. Code section
        let mut code_section = CodeSection::new();
        for helper in &helpers {
            code_section.function(&helper.body);
        }
        for body in &bodies {
            code_section.function(body);
        }
        module.section(&code_section);

        // 8. Data section
        let mut data_sec = DataSection::new();
        data_sec.active(
            0,
            &ConstExpr::i32_const(DATA_START as i32),
            self.data.bytes().iter().copied(),
        );
        module.section(&data_sec);

        // 9. Custom sections
        for section in self.emit_custom()? {
            module.section(&section);
        }
        if self.options.optimization == Optimization::Debug {
            module.section(&self.emit_names(&helpers));
        }

        let wasm_bytes = module.finish();

        // 10. Validate
        wasmparser::validate(&wasm_bytes)
            .map_err(|e| CodegenError::ValidationFailed(format!("{e}")))?;

        Ok(wasm_bytes)
    }

    // ── Type section ─────────────────────────────────────────────────────

    fn emit_types(&self) -> TypeSection {
        let mut types = TypeSection::new();

        // TYPE_VOID_VOID: () -> ()
        types.ty().function(vec![], vec![]);
        // TYPE_VOID_I32: () -> i32
        types.ty().function(vec![], vec![ValType::I32]);
        // TYPE_I32_I32: (i32) -> i32
        types.ty().function(vec![ValType::I32], vec![ValType::I32]);
        // TYPE_I32X2_VOID: (i32, i32) -> ()
        types.ty().function(vec![ValType::I32, ValType::I32], vec![]);
        // TYPE_I32X2_I32: (i32, i32) -> i32
        types
            .ty()
            .function(vec![ValType::I32, ValType::I32], vec![ValType::I32]);
        // TYPE_I32X3_I32: (i32, i32, i32) -> i32
        types.ty().function(
            vec![ValType::I32, ValType::I32, ValType::I32],
            vec![ValType::I32],
        );
        // TYPE_F64_I32: (f64) -> i32
        types.ty().function(vec![ValType::F64], vec![ValType::I32]);
        // TYPE_I32_F64: (i32) -> f64
        types.ty().function(vec![ValType::I32], vec![ValType::F64]);

        // (i32 × n) -> i32 for wider functions, in index order
        for arity in self.types.extra.keys() {
            types
                .ty()
                .function(vec![ValType::I32; *arity], vec![ValType::I32]);
        }

        types
    }

    // ── Import section ───────────────────────────────────────────────────

    fn emit_imports(&self) -> CodegenResult<ImportSection> {
        let mut imports = ImportSection::new();

        // IMPORT_TRAP: rt.trap(ptr, len)
        imports.import(RT_MODULE, "trap", EntityType::Function(TYPE_I32X2_VOID));
        // IMPORT_DEADLINE: rt.deadline()
        imports.import(RT_MODULE, "deadline", EntityType::Function(TYPE_VOID_VOID));
        // IMPORT_TO_STRING: rt.to_string(v) -> v
        imports.import(RT_MODULE, "to_string", EntityType::Function(TYPE_I32_I32));
        // IMPORT_CONCAT: rt.concat(a, b) -> v
        imports.import(RT_MODULE, "concat", EntityType::Function(TYPE_I32X2_I32));
        // IMPORT_EQUALS: rt.equals(a, b) -> i32
        imports.import(RT_MODULE, "equals", EntityType::Function(TYPE_I32X2_I32));

        for (library, name, arity) in &self.imports {
            let ty = self.types.value_fn(*arity)?;
            imports.import(library, name, EntityType::Function(ty));
        }

        Ok(imports)
    }

    // ── Global section ───────────────────────────────────────────────────

    fn emit_globals(&self, heap_start: u32) -> GlobalSection {
        let mut globals = GlobalSection::new();
        let mutable_i32 = GlobalType {
            val_type: ValType::I32,
            mutable: true,
            shared: false,
        };

        // GLOBAL_HEAP_PTR: starts after the data segment
        globals.global(mutable_i32, &ConstExpr::i32_const(heap_start as i32));
        // GLOBAL_GAS
        globals.global(mutable_i32, &ConstExpr::i32_const(0));
        // GLOBAL_GAS_LIMIT
        globals.global(mutable_i32, &ConstExpr::i32_const(DEFAULT_GAS_LIMIT as i32));

        globals
    }

    // ── Export section ───────────────────────────────────────────────────

    fn emit_exports(&self) -> ExportSection {
        let mut exports = ExportSection::new();
        exports.export(EXPORT_MEMORY, ExportKind::Memory, 0);
        exports.export(EXPORT_ALLOC, ExportKind::Func, self.ix.rt(RT_ALLOC));
        exports.export(EXPORT_HEAP_PTR, ExportKind::Global, GLOBAL_HEAP_PTR);
        exports.export(EXPORT_GAS_LIMIT, ExportKind::Global, GLOBAL_GAS_LIMIT);

        let mut exported = BTreeSet::new();
        for (position, f) in self.program.functions.iter().enumerate() {
            let name = f.name.name.as_str();
            if RESERVED_EXPORTS.contains(&name) || !exported.insert(name) {
                continue;
            }
            exports.export(name, ExportKind::Func, self.ix.user(position as u32));
        }
        exports
    }

    // ── Custom sections ──────────────────────────────────────────────────

    fn emit_custom(&self) -> CodegenResult<Vec<CustomSection<'static>>> {
        let mut sections = Vec::new();

        if let Some(entry) = self.model.entry_point() {
            let json = serde_json::to_vec(entry)
                .map_err(|e| CodegenError::Internal(format!("entry descriptor: {e}")))?;
            sections.push(CustomSection {
                name: Cow::Borrowed(ENTRY_SECTION),
                data: Cow::Owned(json),
            });
        }

        let json = serde_json::to_vec(&self.refs.names())
            .map_err(|e| CodegenError::Internal(format!("reference manifest: {e}")))?;
        sections.push(CustomSection {
            name: Cow::Borrowed(REFERENCES_SECTION),
            data: Cow::Owned(json),
        });

        sections.push(CustomSection {
            name: Cow::Borrowed(VERSION_SECTION),
            data: Cow::Borrowed(COMPILER_VERSION.as_bytes()),
        });

        Ok(sections)
    }

    fn emit_names(&self, helpers: &[runtime::RuntimeFunction]) -> NameSection {
        let mut map = NameMap::new();
        for (i, name) in ["trap", "deadline", "to_string", "concat", "equals"]
            .iter()
            .enumerate()
        {
            map.append(i as u32, &format!("{RT_MODULE}.{name}"));
        }
        for (i, (library, name, _)) in self.imports.iter().enumerate() {
            map.append(RT_IMPORT_COUNT + i as u32, &format!("{library}.{name}"));
        }
        for (i, helper) in helpers.iter().enumerate() {
            map.append(self.ix.rt(i as u32), &format!("{RT_MODULE}.{}", helper.name));
        }
        for (position, f) in self.program.functions.iter().enumerate() {
            map.append(self.ix.user(position as u32), &f.name.name);
        }

        let mut names = NameSection::new();
        names.functions(&map);
        names
    }

    // ── Functions ────────────────────────────────────────────────────────

    fn emit_function(&mut self, decl: &FnDecl) -> CodegenResult<Function> {
        let params = decl.params.len() as u32;
        let slots = self.model.local_count(&decl.name.name).max(params);
        let mut ctx = FuncContext {
            model: self.model,
            ix: self.ix,
            functions: &self.functions,
            data: &mut self.data,
            optimization: self.options.optimization,
            locals: Vec::new(),
            next_local: slots,
            labels: Vec::new(),
        };
        if slots > params {
            ctx.locals.push((slots - params, ValType::I32));
        }

        let mut f = Function::new(vec![]);
        gas::emit_gas_tick(&mut f, self.ix);
        stmt::emit_block(&decl.body, &mut ctx, &mut f)?;
        // Falling off the end returns nil.
        f.instruction(&Instruction::Call(self.ix.rt(RT_VAL_NIL)));
        f.instruction(&Instruction::End);

        Ok(finalize_function(f, &ctx))
    }
}

/// Finalize a scratch function: rebuild with correct local declarations.
///
/// `Function::new(vec![])` declares 0 locals, so its raw body starts with
/// a single 0x00 byte (LEB128 zero).  We strip that byte and prepend the
/// actual locals from `ctx`.
fn finalize_function(scratch: Function, ctx: &FuncContext) -> Function {
    let raw = scratch.into_raw_body();
    let mut f = Function::new(ctx.locals.clone());
    f.raw(raw.into_iter().skip(1));
    f
}

// ══════════════════════════════════════════════════════════════════════════════
// FuncContext: per-function codegen state
// ══════════════════════════════════════════════════════════════════════════════

/// Enclosing WASM control construct, innermost last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// `if` or any block `break`/`continue` must branch past.
    Block,
    /// Branching here leaves the loop.
    Break,
    /// Branching here starts the next iteration.
    Continue,
}

/// State maintained while generating code for a single function body.
pub struct FuncContext<'a> {
    pub model: &'a SemanticModel,
    pub ix: FuncIndices,
    pub functions: &'a FunctionTable,
    pub data: &'a mut DataSegment,
    pub optimization: Optimization,
    /// Locals past the parameters: (count, type).
    locals: Vec<(u32, ValType)>,
    next_local: u32,
    labels: Vec<Label>,
}

impl FuncContext<'_> {
    /// Allocate a scratch local.
    pub fn alloc_local(&mut self, ty: ValType) -> u32 {
        let idx = self.next_local;
        self.next_local += 1;
        self.locals.push((1, ty));
        idx
    }

    pub fn push_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn pop_label(&mut self) {
        self.labels.pop();
    }

    /// `br` depth of the innermost `label`.
    pub fn depth_of(&self, label: Label) -> CodegenResult<u32> {
        self.labels
            .iter()
            .rev()
            .position(|l| *l == label)
            .map(|d| d as u32)
            .ok_or_else(|| CodegenError::Internal(format!("no enclosing {label:?} label")))
    }

    /// Intern a string literal in the data segment.
    pub fn intern_string(&mut self, s: &str) -> (u32, u32) {
        self.data.intern(s)
    }
}
