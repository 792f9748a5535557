//! Reading and writing value cells in guest memory.
//!
//! Cells follow the layout in [`kiln_codegen::types`]. New cells are
//! allocated through the module's own `alloc` export so the guest's bump
//! pointer stays authoritative.

use kiln_codegen::types::*;
use wasmi::{AsContextMut, Caller, Func, Memory, Store, Val};

use crate::error::ExecutionError;
use crate::host::HostState;
use crate::value::Value;

/// Lists nested deeper than this are rejected (they are usually cyclic).
const MAX_DEPTH: usize = 64;

/// A store or caller whose data is the [`HostState`].
pub trait HostContext: AsContextMut<Data = HostState> {
    fn host(&self) -> &HostState;
    fn host_mut(&mut self) -> &mut HostState;
}

impl HostContext for Store<HostState> {
    fn host(&self) -> &HostState {
        self.data()
    }

    fn host_mut(&mut self) -> &mut HostState {
        self.data_mut()
    }
}

impl HostContext for Caller<'_, HostState> {
    fn host(&self) -> &HostState {
        self.data()
    }

    fn host_mut(&mut self) -> &mut HostState {
        self.data_mut()
    }
}

impl<T: HostContext> HostContext for &mut T {
    fn host(&self) -> &HostState {
        (**self).host()
    }

    fn host_mut(&mut self) -> &mut HostState {
        (**self).host_mut()
    }
}

/// A handle on one guest's memory, usable from the executor (through the
/// store) and from host functions (through the caller).
pub struct Guest<C> {
    ctx: C,
    memory: Memory,
    alloc: Func,
}

impl<C: HostContext> Guest<C> {
    pub fn new(ctx: C) -> Result<Self, ExecutionError> {
        let state = ctx.host();
        let (Some(memory), Some(alloc)) = (state.memory, state.alloc) else {
            return Err(ExecutionError::InvalidArtifact(
                "module does not export 'memory' and 'alloc'".to_string(),
            ));
        };
        Ok(Self { ctx, memory, alloc })
    }

    pub fn state(&self) -> &HostState {
        self.ctx.host()
    }

    pub fn state_mut(&mut self) -> &mut HostState {
        self.ctx.host_mut()
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    // ── Raw memory ───────────────────────────────────────────────────────

    pub fn read_bytes(&self, ptr: i32, len: i32) -> Result<Vec<u8>, ExecutionError> {
        let start = ptr as u32 as usize;
        let end = start
            .checked_add(len as u32 as usize)
            .ok_or_else(out_of_bounds)?;
        self.memory
            .data(&self.ctx)
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(out_of_bounds)
    }

    pub fn read_i32(&self, ptr: i32) -> Result<i32, ExecutionError> {
        let bytes = self.read_array::<4>(ptr)?;
        Ok(i32::from_le_bytes(bytes))
    }

    pub fn read_f64(&self, ptr: i32) -> Result<f64, ExecutionError> {
        let bytes = self.read_array::<8>(ptr)?;
        Ok(f64::from_le_bytes(bytes))
    }

    fn read_array<const N: usize>(&self, ptr: i32) -> Result<[u8; N], ExecutionError> {
        let start = ptr as u32 as usize;
        self.memory
            .data(&self.ctx)
            .get(start..start + N)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(out_of_bounds)
    }

    fn write_bytes(&mut self, ptr: i32, bytes: &[u8]) -> Result<(), ExecutionError> {
        let start = ptr as u32 as usize;
        let data = self.memory.data_mut(&mut self.ctx);
        let target = data
            .get_mut(start..start + bytes.len())
            .ok_or_else(out_of_bounds)?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    fn write_i32(&mut self, ptr: i32, value: i32) -> Result<(), ExecutionError> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }

    /// Allocate `size` bytes with the guest allocator.
    pub fn alloc(&mut self, size: u32) -> Result<i32, ExecutionError> {
        let mut result = [Val::I32(0)];
        self.alloc
            .call(&mut self.ctx, &[Val::I32(size as i32)], &mut result)
            .map_err(|e| ExecutionError::Trap(e.to_string()))?;
        result[0]
            .i32()
            .ok_or_else(|| ExecutionError::Trap("alloc returned a non-i32 value".to_string()))
    }

    // ── Cells ────────────────────────────────────────────────────────────

    pub fn tag(&self, ptr: i32) -> Result<i32, ExecutionError> {
        self.read_i32(ptr)
    }

    /// Copy the value at `ptr` out of guest memory.
    ///
    /// A list may alias the same cell many times, so the copy is charged
    /// against [`HostState::max_value_bytes`] rather than trusted to fit.
    pub fn read(&self, ptr: i32) -> Result<Value, ExecutionError> {
        let mut budget = self.state().max_value_bytes;
        self.read_at_depth(ptr, 0, &mut budget)
    }

    fn read_at_depth(
        &self,
        ptr: i32,
        depth: usize,
        budget: &mut usize,
    ) -> Result<Value, ExecutionError> {
        if depth > MAX_DEPTH {
            return Err(ExecutionError::Trap("value nesting too deep".to_string()));
        }
        charge(budget, VALUE_SIZE as usize)?;
        let value = match self.tag(ptr)? {
            TAG_NIL => Value::Nil,
            TAG_NUMBER => Value::Number(self.read_f64(ptr + 4)?),
            TAG_BOOL => Value::Bool(self.read_i32(ptr + 4)? != 0),
            TAG_STRING => {
                let len = self.read_i32(ptr + 8)?;
                charge(budget, len as u32 as usize)?;
                let bytes = self.read_bytes(self.read_i32(ptr + 4)?, len)?;
                Value::Str(String::from_utf8_lossy(&bytes).into_owned())
            }
            TAG_LIST => {
                let items = self
                    .list_items(ptr)?
                    .into_iter()
                    .map(|item| self.read_at_depth(item, depth + 1, budget))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::List(items)
            }
            TAG_TASK => Value::Task(self.read_i32(ptr + 4)? as u32),
            tag => {
                return Err(ExecutionError::Trap(format!(
                    "corrupt value cell at {ptr} (tag {tag})"
                )))
            }
        };
        Ok(value)
    }

    /// Allocate a fresh copy of `value` and return its cell pointer.
    pub fn write(&mut self, value: &Value) -> Result<i32, ExecutionError> {
        match value {
            Value::Nil => self.new_cell(TAG_NIL, &[0; 8]),
            Value::Number(n) => self.new_cell(TAG_NUMBER, &n.to_le_bytes()),
            Value::Bool(b) => self.new_cell(TAG_BOOL, &payload(i32::from(*b), 0)),
            Value::Task(id) => self.new_cell(TAG_TASK, &payload(*id as i32, 0)),
            Value::Str(s) => {
                let data = self.alloc(s.len() as u32)?;
                self.write_bytes(data, s.as_bytes())?;
                self.new_cell(TAG_STRING, &payload(data, s.len() as i32))
            }
            Value::List(items) => {
                let pointers = items
                    .iter()
                    .map(|item| self.write(item))
                    .collect::<Result<Vec<_>, _>>()?;
                self.new_list(&pointers)
            }
        }
    }

    fn new_cell(&mut self, tag: i32, payload: &[u8; 8]) -> Result<i32, ExecutionError> {
        let ptr = self.alloc(VALUE_SIZE)?;
        self.write_i32(ptr, tag)?;
        self.write_bytes(ptr + 4, payload)?;
        Ok(ptr)
    }

    // ── Lists in place ───────────────────────────────────────────────────

    /// Array pointer and element count of the list at `ptr`.
    pub fn list_parts(&self, ptr: i32) -> Result<(i32, i32), ExecutionError> {
        if self.tag(ptr)? != TAG_LIST {
            return Err(ExecutionError::Trap("expected a list".to_string()));
        }
        Ok((self.read_i32(ptr + 4)?, self.read_i32(ptr + 8)?))
    }

    /// Element pointers of the list at `ptr`.
    pub fn list_items(&self, ptr: i32) -> Result<Vec<i32>, ExecutionError> {
        let (array, count) = self.list_parts(ptr)?;
        (0..count).map(|i| self.read_i32(array + i * 4)).collect()
    }

    /// Build a list cell over freshly copied element pointers.
    pub fn new_list(&mut self, items: &[i32]) -> Result<i32, ExecutionError> {
        let array = self.write_array(items)?;
        self.new_cell(TAG_LIST, &payload(array, items.len() as i32))
    }

    /// Point the existing list cell at `ptr` to a new element array.
    pub fn replace_items(&mut self, ptr: i32, items: &[i32]) -> Result<(), ExecutionError> {
        let array = self.write_array(items)?;
        self.write_bytes(ptr + 4, &payload(array, items.len() as i32))
    }

    /// Overwrite one element of the list at `ptr`.
    pub fn set_item(&mut self, ptr: i32, index: i32, item: i32) -> Result<(), ExecutionError> {
        let (array, _) = self.list_parts(ptr)?;
        self.write_i32(array + index * 4, item)
    }

    fn write_array(&mut self, items: &[i32]) -> Result<i32, ExecutionError> {
        let array = self.alloc(items.len() as u32 * 4)?;
        let bytes: Vec<u8> = items.iter().flat_map(|p| p.to_le_bytes()).collect();
        self.write_bytes(array, &bytes)?;
        Ok(array)
    }
}

fn payload(w1: i32, w2: i32) -> [u8; 8] {
    let mut bytes = [0; 8];
    bytes[..4].copy_from_slice(&w1.to_le_bytes());
    bytes[4..].copy_from_slice(&w2.to_le_bytes());
    bytes
}

fn charge(budget: &mut usize, bytes: usize) -> Result<(), ExecutionError> {
    *budget = budget
        .checked_sub(bytes)
        .ok_or_else(|| ExecutionError::Trap("value too large to copy out of the guest".to_string()))?;
    Ok(())
}

fn out_of_bounds() -> ExecutionError {
    ExecutionError::Trap("memory access out of bounds".to_string())
}
