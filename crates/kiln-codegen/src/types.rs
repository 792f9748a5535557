//! WASM value-representation constants and memory layout.
//!
//! Every Kiln value is stored on the linear-memory heap as a 12-byte cell:
//!
//! ```text
//! offset+0 : i32   tag   (see TAG_* constants)
//! offset+4 : 8 bytes  payload (interpretation depends on tag)
//! ```
//!
//! # Payload layouts
//!
//! | Tag        | Bytes 4..8 (word-1)        | Bytes 8..12 (word-2)       |
//! |------------|----------------------------|----------------------------|
//! | NIL        | 0                          | 0                          |
//! | NUMBER     | f64 occupies all 8 bytes (little-endian)                |
//! | BOOL       | i32 (0 = false, 1 = true)  | 0 (padding)                |
//! | STRING     | i32 data-offset            | i32 byte-length            |
//! | LIST       | i32 array-offset           | i32 element-count          |
//! | TASK       | i32 task-id                | 0 (padding)                |
//!
//! A list's array holds one i32 value pointer per element.

/// Size of a single Kiln value cell on the heap (bytes).
pub const VALUE_SIZE: u32 = 12;

// ── Value tags ───────────────────────────────────────────────────────────────

pub const TAG_NIL: i32 = 0;
pub const TAG_NUMBER: i32 = 1;
pub const TAG_BOOL: i32 = 2;
pub const TAG_STRING: i32 = 3;
pub const TAG_LIST: i32 = 4;
pub const TAG_TASK: i32 = 5;

// ── Global variable indices ──────────────────────────────────────────────────
// (order must match the global section emission in compiler.rs)

/// Heap allocation pointer: next free byte in linear memory.
pub const GLOBAL_HEAP_PTR: u32 = 0;
/// Gas counter: incremented on each tick.
pub const GLOBAL_GAS: u32 = 1;
/// Gas limit: the host may overwrite it before calling the entry point.
pub const GLOBAL_GAS_LIMIT: u32 = 2;

/// Gas limit baked into the module when the host does not set one.
pub const DEFAULT_GAS_LIMIT: u32 = 50_000_000;

/// The deadline is checked once every `DEADLINE_INTERVAL` gas ticks.
/// Must be a power of two.
pub const DEADLINE_INTERVAL: u32 = 1024;

// ── Imported function indices ────────────────────────────────────────────────
// Runtime imports come first; library imports follow in (library, name) order.

pub const RT_MODULE: &str = "rt";

/// `rt.trap(ptr: i32, len: i32)`: aborts execution with a message.
pub const IMPORT_TRAP: u32 = 0;
/// `rt.deadline()`: fails once the wall-clock deadline has passed.
pub const IMPORT_DEADLINE: u32 = 1;
/// `rt.to_string(v) -> v`
pub const IMPORT_TO_STRING: u32 = 2;
/// `rt.concat(a, b) -> v`: string concatenation of any two values.
pub const IMPORT_CONCAT: u32 = 3;
/// `rt.equals(a, b) -> i32`: structural equality.
pub const IMPORT_EQUALS: u32 = 4;

/// Number of runtime imports (library imports start here).
pub const RT_IMPORT_COUNT: u32 = 5;

// ── WASM type indices ────────────────────────────────────────────────────────
// Fixed type indices in the type section (see compiler.rs emit_types).
// Value functions with more than three parameters get extra types after
// TYPE_COUNT.

/// `() -> ()`
pub const TYPE_VOID_VOID: u32 = 0;
/// `() -> i32`
pub const TYPE_VOID_I32: u32 = 1;
/// `(i32) -> i32`
pub const TYPE_I32_I32: u32 = 2;
/// `(i32, i32) -> ()`
pub const TYPE_I32X2_VOID: u32 = 3;
/// `(i32, i32) -> i32`
pub const TYPE_I32X2_I32: u32 = 4;
/// `(i32, i32, i32) -> i32`
pub const TYPE_I32X3_I32: u32 = 5;
/// `(f64) -> i32`
pub const TYPE_F64_I32: u32 = 6;
/// `(i32) -> f64`
pub const TYPE_I32_F64: u32 = 7;

/// Total number of fixed type signatures.
pub const TYPE_COUNT: u32 = 8;

/// Fixed type of a function taking `arity` values and returning a value,
/// if one exists.
pub fn fixed_value_fn_type(arity: usize) -> Option<u32> {
    match arity {
        0 => Some(TYPE_VOID_I32),
        1 => Some(TYPE_I32_I32),
        2 => Some(TYPE_I32X2_I32),
        3 => Some(TYPE_I32X3_I32),
        _ => None,
    }
}

// ── Memory ───────────────────────────────────────────────────────────────────

/// WASM page size in bytes.
pub const PAGE_SIZE: u32 = 65_536;
/// Declared maximum linear memory (256 MiB). Hosts may cap it lower.
pub const MAX_MEMORY_PAGES: u64 = 4096;
/// Static data starts here; address 0 is never a valid value pointer.
pub const DATA_START: u32 = 8;
/// Heap cells are aligned to this many bytes.
pub const HEAP_ALIGN: u32 = 8;

// ── Trap messages ────────────────────────────────────────────────────────────

pub const MSG_OUT_OF_MEMORY: &str = "out of memory";
pub const MSG_BUDGET_EXHAUSTED: &str = "execution budget exhausted";
pub const MSG_DIVISION_BY_ZERO: &str = "division by zero";
pub const MSG_EXPECTED_NUMBER: &str = "expected a number";
pub const MSG_INVALID_ADD: &str = "invalid operands for '+'";
pub const MSG_NOT_A_LIST: &str = "can only iterate over a list";

// ── Custom sections ──────────────────────────────────────────────────────────

/// JSON entry-point descriptor (executables with a valid `main`).
pub const ENTRY_SECTION: &str = "kiln.entry";
/// JSON list of referenced library names.
pub const REFERENCES_SECTION: &str = "kiln.references";
/// Compiler version string.
pub const VERSION_SECTION: &str = "kiln.version";
/// Compiler version embedded in the version section.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Exports ──────────────────────────────────────────────────────────────────

pub const EXPORT_MEMORY: &str = "memory";
pub const EXPORT_ALLOC: &str = "alloc";
pub const EXPORT_HEAP_PTR: &str = "heap_ptr";
pub const EXPORT_GAS_LIMIT: &str = "gas_limit";

/// Round `n` up to the heap alignment.
pub const fn align_up(n: u32) -> u32 {
    (n + HEAP_ALIGN - 1) & !(HEAP_ALIGN - 1)
}
