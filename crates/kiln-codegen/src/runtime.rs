//! Runtime helper functions emitted into the WASM module.
//!
//! These provide the value-manipulation primitives that expression and
//! statement codegen builds upon. Every helper is registered during module
//! assembly (in `compiler.rs`) right after the imports, in `RT_*` order.

use std::collections::HashMap;

use wasm_encoder::{BlockType, Function, Instruction, ValType};

use crate::gas;
use crate::types::*;

// ══════════════════════════════════════════════════════════════════════════════
// Runtime function index offsets (relative to the import count)
// ══════════════════════════════════════════════════════════════════════════════

/// Bump-allocate `size` bytes, growing memory on demand.
///
/// `alloc(size: i32) -> i32`
pub const RT_ALLOC: u32 = 0;
/// `val_nil() -> i32`
pub const RT_VAL_NIL: u32 = 1;
/// `val_number(n: f64) -> i32`
pub const RT_VAL_NUMBER: u32 = 2;
/// `val_bool(b: i32) -> i32`
pub const RT_VAL_BOOL: u32 = 3;
/// `val_string(data_ptr: i32, len: i32) -> i32`
pub const RT_VAL_STRING: u32 = 4;
/// `val_list(arr_ptr: i32, count: i32) -> i32`
pub const RT_VAL_LIST: u32 = 5;
/// Read a NUMBER payload, trapping on any other tag.
///
/// `as_number(v: i32) -> f64`
pub const RT_AS_NUMBER: u32 = 6;
/// `truthy(v: i32) -> i32`: only `nil` and `false` are falsy.
pub const RT_TRUTHY: u32 = 7;
/// Numeric addition, or string concatenation when either side is a string.
pub const RT_ADD: u32 = 8;
pub const RT_SUB: u32 = 9;
pub const RT_MUL: u32 = 10;
/// Traps on a zero divisor.
pub const RT_DIV: u32 = 11;
/// Truncated remainder; traps on a zero divisor.
pub const RT_MOD: u32 = 12;
pub const RT_NEG: u32 = 13;
pub const RT_NOT: u32 = 14;
/// Numeric comparisons returning a BOOL value.
pub const RT_LT: u32 = 15;
pub const RT_LE: u32 = 16;
pub const RT_GT: u32 = 17;
pub const RT_GE: u32 = 18;
/// `list_len(v: i32) -> i32`: element count, trapping on non-lists.
pub const RT_LIST_LEN: u32 = 19;
/// `gas_tick()`: see [`gas`].
pub const RT_GAS_TICK: u32 = 20;

/// Total number of runtime helper functions.
pub const RT_FUNC_COUNT: u32 = 21;

// ══════════════════════════════════════════════════════════════════════════════
// Function index space
// ══════════════════════════════════════════════════════════════════════════════

/// Absolute function indices for one module.
///
/// Library imports vary per program, so everything after them shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncIndices {
    /// Runtime imports plus library imports.
    pub import_count: u32,
}

impl FuncIndices {
    pub fn new(library_imports: u32) -> Self {
        Self {
            import_count: RT_IMPORT_COUNT + library_imports,
        }
    }

    /// Absolute index of a runtime helper.
    #[inline]
    pub const fn rt(&self, helper: u32) -> u32 {
        self.import_count + helper
    }

    /// Absolute index of the user function at `position` in the program.
    #[inline]
    pub const fn user(&self, position: u32) -> u32 {
        self.import_count + RT_FUNC_COUNT + position
    }
}

/// A helper ready to be added to the module.
pub struct RuntimeFunction {
    pub name: &'static str,
    pub type_index: u32,
    pub body: Function,
}

/// Every runtime helper, in `RT_*` order.
pub fn runtime_functions(ix: FuncIndices, traps: &TrapMessages) -> Vec<RuntimeFunction> {
    let helper = |name, type_index, body| RuntimeFunction {
        name,
        type_index,
        body,
    };
    vec![
        helper("alloc", TYPE_I32_I32, emit_alloc(traps)),
        helper("val_nil", TYPE_VOID_I32, emit_val_nil(ix)),
        helper("val_number", TYPE_F64_I32, emit_val_number(ix)),
        helper("val_bool", TYPE_I32_I32, emit_val_bool(ix)),
        helper("val_string", TYPE_I32X2_I32, emit_cell_ctor(ix, TAG_STRING)),
        helper("val_list", TYPE_I32X2_I32, emit_cell_ctor(ix, TAG_LIST)),
        helper("as_number", TYPE_I32_F64, emit_as_number(traps)),
        helper("truthy", TYPE_I32_I32, emit_truthy()),
        helper("add", TYPE_I32X2_I32, emit_add(ix, traps)),
        helper("sub", TYPE_I32X2_I32, emit_arith(ix, Instruction::F64Sub)),
        helper("mul", TYPE_I32X2_I32, emit_arith(ix, Instruction::F64Mul)),
        helper("div", TYPE_I32X2_I32, emit_div(ix, traps)),
        helper("mod", TYPE_I32X2_I32, emit_mod(ix, traps)),
        helper("neg", TYPE_I32_I32, emit_neg(ix)),
        helper("not", TYPE_I32_I32, emit_not(ix)),
        helper("lt", TYPE_I32X2_I32, emit_compare(ix, Instruction::F64Lt)),
        helper("le", TYPE_I32X2_I32, emit_compare(ix, Instruction::F64Le)),
        helper("gt", TYPE_I32X2_I32, emit_compare(ix, Instruction::F64Gt)),
        helper("ge", TYPE_I32X2_I32, emit_compare(ix, Instruction::F64Ge)),
        helper("list_len", TYPE_I32_I32, emit_list_len(traps)),
        helper("gas_tick", TYPE_VOID_VOID, gas::emit_gas_tick_helper(traps)),
    ]
}

// ══════════════════════════════════════════════════════════════════════════════
// Emit helpers: each builds a `wasm_encoder::Function`
// ══════════════════════════════════════════════════════════════════════════════

/// Emit the `alloc(size: i32) -> i32` function.
///
/// Bump allocator: rounds `size` up to [`HEAP_ALIGN`], returns the current
/// `heap_ptr` and advances it. Grows memory when the new end is past the
/// current size and traps with "out of memory" when growth fails.
pub fn emit_alloc(traps: &TrapMessages) -> Function {
    // local 1: old_ptr, local 2: new_end
    let mut f = Function::new(vec![(2, ValType::I32)]);
    // size = (size + 7) & ~7
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Const((HEAP_ALIGN - 1) as i32));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Const(!((HEAP_ALIGN - 1) as i32)));
    f.instruction(&Instruction::I32And);
    f.instruction(&Instruction::LocalSet(0));
    // old_ptr = heap_ptr; new_end = old_ptr + size
    f.instruction(&Instruction::GlobalGet(GLOBAL_HEAP_PTR));
    f.instruction(&Instruction::LocalTee(1));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(2));
    // if new_end > memory bytes → grow
    f.instruction(&Instruction::LocalGet(2));
    emit_memory_bytes(&mut f);
    f.instruction(&Instruction::I32GtU);
    f.instruction(&Instruction::If(BlockType::Empty));
    // pages = (new_end - memory bytes + PAGE_SIZE - 1) >> 16
    f.instruction(&Instruction::LocalGet(2));
    emit_memory_bytes(&mut f);
    f.instruction(&Instruction::I32Sub);
    f.instruction(&Instruction::I32Const((PAGE_SIZE - 1) as i32));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Const(16));
    f.instruction(&Instruction::I32ShrU);
    f.instruction(&Instruction::MemoryGrow(0));
    f.instruction(&Instruction::I32Const(-1));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_trap(&mut f, traps.out_of_memory);
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    // heap_ptr = new_end
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::GlobalSet(GLOBAL_HEAP_PTR));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::End);
    f
}

/// Current memory size in bytes.
fn emit_memory_bytes(f: &mut Function) {
    f.instruction(&Instruction::MemorySize(0));
    f.instruction(&Instruction::I32Const(16));
    f.instruction(&Instruction::I32Shl);
}

/// Allocate a cell into local `ptr` and store `tag`.
fn emit_new_cell(f: &mut Function, ix: FuncIndices, ptr: u32, tag: i32) {
    f.instruction(&Instruction::I32Const(VALUE_SIZE as i32));
    f.instruction(&Instruction::Call(ix.rt(RT_ALLOC)));
    f.instruction(&Instruction::LocalTee(ptr));
    f.instruction(&Instruction::I32Const(tag));
    f.instruction(&Instruction::I32Store(memarg(0, 2)));
}

/// Emit `val_nil() -> i32`.
pub fn emit_val_nil(ix: FuncIndices) -> Function {
    let mut f = Function::new(vec![(1, ValType::I32)]); // local 0: ptr
    emit_new_cell(&mut f, ix, 0, TAG_NIL);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::End);
    f
}

/// Emit `val_number(n: f64) -> i32`.
pub fn emit_val_number(ix: FuncIndices) -> Function {
    let mut f = Function::new(vec![(1, ValType::I32)]); // local 1: ptr
    emit_new_cell(&mut f, ix, 1, TAG_NUMBER);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::F64Store(memarg(4, 2)));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::End);
    f
}

/// Emit `val_bool(b: i32) -> i32`. Any non-zero `b` is stored as 1.
pub fn emit_val_bool(ix: FuncIndices) -> Function {
    let mut f = Function::new(vec![(1, ValType::I32)]); // local 1: ptr
    emit_new_cell(&mut f, ix, 1, TAG_BOOL);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Eqz);
    f.instruction(&Instruction::I32Eqz);
    f.instruction(&Instruction::I32Store(memarg(4, 2)));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::End);
    f
}

/// Emit a `(w1: i32, w2: i32) -> i32` constructor for STRING or LIST cells.
pub fn emit_cell_ctor(ix: FuncIndices, tag: i32) -> Function {
    let mut f = Function::new(vec![(1, ValType::I32)]); // local 2: ptr
    emit_new_cell(&mut f, ix, 2, tag);
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Store(memarg(4, 2)));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Store(memarg(8, 2)));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::End);
    f
}

/// Emit `as_number(v: i32) -> f64`.
pub fn emit_as_number(traps: &TrapMessages) -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Load(memarg(0, 2)));
    f.instruction(&Instruction::I32Const(TAG_NUMBER));
    f.instruction(&Instruction::I32Ne);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_trap(&mut f, traps.expected_number);
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::F64Load(memarg(4, 2)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `truthy(v: i32) -> i32`.
pub fn emit_truthy() -> Function {
    let mut f = Function::new(vec![(1, ValType::I32)]); // local 1: tag
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Load(memarg(0, 2)));
    f.instruction(&Instruction::LocalTee(1));
    f.instruction(&Instruction::I32Const(TAG_NIL));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::If(BlockType::Result(ValType::I32)));
    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::Else);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(TAG_BOOL));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::If(BlockType::Result(ValType::I32)));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Load(memarg(4, 2)));
    f.instruction(&Instruction::Else);
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f
}

/// Emit `add(a: i32, b: i32) -> i32`.
pub fn emit_add(ix: FuncIndices, traps: &TrapMessages) -> Function {
    // local 2: tag_a, local 3: tag_b
    let mut f = Function::new(vec![(2, ValType::I32)]);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Load(memarg(0, 2)));
    f.instruction(&Instruction::LocalSet(2));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Load(memarg(0, 2)));
    f.instruction(&Instruction::LocalSet(3));

    // number + number
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Const(TAG_NUMBER));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Const(TAG_NUMBER));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::I32And);
    f.instruction(&Instruction::If(BlockType::Result(ValType::I32)));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::F64Load(memarg(4, 2)));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::F64Load(memarg(4, 2)));
    f.instruction(&Instruction::F64Add);
    f.instruction(&Instruction::Call(ix.rt(RT_VAL_NUMBER)));
    f.instruction(&Instruction::Else);

    // either side a string → host concatenation
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Const(TAG_STRING));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Const(TAG_STRING));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::I32Or);
    f.instruction(&Instruction::If(BlockType::Result(ValType::I32)));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::Call(IMPORT_CONCAT));
    f.instruction(&Instruction::Else);
    emit_trap(&mut f, traps.invalid_add);
    f.instruction(&Instruction::End);

    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f
}

/// Emit a numeric `(a, b) -> number` helper applying `op` to both payloads.
pub fn emit_arith(ix: FuncIndices, op: Instruction<'static>) -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::Call(ix.rt(RT_AS_NUMBER)));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::Call(ix.rt(RT_AS_NUMBER)));
    f.instruction(&op);
    f.instruction(&Instruction::Call(ix.rt(RT_VAL_NUMBER)));
    f.instruction(&Instruction::End);
    f
}

/// Emit a numeric `(a, b) -> bool` comparison helper.
pub fn emit_compare(ix: FuncIndices, op: Instruction<'static>) -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::Call(ix.rt(RT_AS_NUMBER)));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::Call(ix.rt(RT_AS_NUMBER)));
    f.instruction(&op);
    f.instruction(&Instruction::Call(ix.rt(RT_VAL_BOOL)));
    f.instruction(&Instruction::End);
    f
}

/// Load the divisor into local 2 and trap if it is zero.
fn emit_checked_divisor(f: &mut Function, ix: FuncIndices, traps: &TrapMessages) {
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::Call(ix.rt(RT_AS_NUMBER)));
    f.instruction(&Instruction::LocalTee(2));
    f.instruction(&Instruction::F64Const(0.0));
    f.instruction(&Instruction::F64Eq);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_trap(f, traps.division_by_zero);
    f.instruction(&Instruction::End);
}

/// Emit `div(a, b) -> number`.
pub fn emit_div(ix: FuncIndices, traps: &TrapMessages) -> Function {
    let mut f = Function::new(vec![(1, ValType::F64)]); // local 2: divisor
    emit_checked_divisor(&mut f, ix, traps);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::Call(ix.rt(RT_AS_NUMBER)));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::F64Div);
    f.instruction(&Instruction::Call(ix.rt(RT_VAL_NUMBER)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `mod(a, b) -> number` as `a - b * trunc(a / b)`.
pub fn emit_mod(ix: FuncIndices, traps: &TrapMessages) -> Function {
    // local 2: divisor, local 3: dividend
    let mut f = Function::new(vec![(2, ValType::F64)]);
    emit_checked_divisor(&mut f, ix, traps);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::Call(ix.rt(RT_AS_NUMBER)));
    f.instruction(&Instruction::LocalSet(3));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::F64Div);
    f.instruction(&Instruction::F64Trunc);
    f.instruction(&Instruction::F64Mul);
    f.instruction(&Instruction::F64Sub);
    f.instruction(&Instruction::Call(ix.rt(RT_VAL_NUMBER)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `neg(a) -> number`.
pub fn emit_neg(ix: FuncIndices) -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::Call(ix.rt(RT_AS_NUMBER)));
    f.instruction(&Instruction::F64Neg);
    f.instruction(&Instruction::Call(ix.rt(RT_VAL_NUMBER)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `not(a) -> bool`.
pub fn emit_not(ix: FuncIndices) -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::Call(ix.rt(RT_TRUTHY)));
    f.instruction(&Instruction::I32Eqz);
    f.instruction(&Instruction::Call(ix.rt(RT_VAL_BOOL)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `list_len(v: i32) -> i32`.
pub fn emit_list_len(traps: &TrapMessages) -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Load(memarg(0, 2)));
    f.instruction(&Instruction::I32Const(TAG_LIST));
    f.instruction(&Instruction::I32Ne);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_trap(&mut f, traps.not_a_list);
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Load(memarg(8, 2)));
    f.instruction(&Instruction::End);
    f
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// Create a `MemArg` with the given offset and alignment power.
pub(crate) fn memarg(offset: u64, align: u32) -> wasm_encoder::MemArg {
    wasm_encoder::MemArg {
        offset,
        align,
        memory_index: 0,
    }
}

/// `rt.trap(ptr, len)` followed by `unreachable`.
pub(crate) fn emit_trap(f: &mut Function, (ptr, len): (u32, u32)) {
    f.instruction(&Instruction::I32Const(ptr as i32));
    f.instruction(&Instruction::I32Const(len as i32));
    f.instruction(&Instruction::Call(IMPORT_TRAP));
    f.instruction(&Instruction::Unreachable);
}

/// Data-segment locations of the runtime's trap messages.
#[derive(Debug, Clone, Copy)]
pub struct TrapMessages {
    pub out_of_memory: (u32, u32),
    pub budget_exhausted: (u32, u32),
    pub division_by_zero: (u32, u32),
    pub expected_number: (u32, u32),
    pub invalid_add: (u32, u32),
    pub not_a_list: (u32, u32),
}

/// The static data segment: trap messages first, then string literals in
/// the order codegen meets them. Identical strings share one copy.
#[derive(Debug)]
pub struct DataSegment {
    bytes: Vec<u8>,
    interned: HashMap<String, (u32, u32)>,
    pub traps: TrapMessages,
}

impl Default for DataSegment {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSegment {
    pub fn new() -> Self {
        let mut data = Self {
            bytes: Vec::new(),
            interned: HashMap::new(),
            traps: TrapMessages {
                out_of_memory: (0, 0),
                budget_exhausted: (0, 0),
                division_by_zero: (0, 0),
                expected_number: (0, 0),
                invalid_add: (0, 0),
                not_a_list: (0, 0),
            },
        };
        data.traps = TrapMessages {
            out_of_memory: data.intern(MSG_OUT_OF_MEMORY),
            budget_exhausted: data.intern(MSG_BUDGET_EXHAUSTED),
            division_by_zero: data.intern(MSG_DIVISION_BY_ZERO),
            expected_number: data.intern(MSG_EXPECTED_NUMBER),
            invalid_add: data.intern(MSG_INVALID_ADD),
            not_a_list: data.intern(MSG_NOT_A_LIST),
        };
        data
    }

    /// Intern a string and return its (offset, length).
    pub fn intern(&mut self, s: &str) -> (u32, u32) {
        if let Some(&loc) = self.interned.get(s) {
            return loc;
        }
        let loc = (DATA_START + self.bytes.len() as u32, s.len() as u32);
        self.bytes.extend_from_slice(s.as_bytes());
        self.interned.insert(s.to_string(), loc);
        loc
    }

    /// The raw bytes, to be placed at [`DATA_START`].
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// First byte past the data, aligned for the heap.
    pub fn heap_start(&self) -> u32 {
        align_up(DATA_START + self.bytes.len() as u32)
    }
}
