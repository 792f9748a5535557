//! Gas-metering instrumentation.
//!
//! Injects a `gas_tick` call at:
//! - Every function entry
//! - Every `while` / `for` loop iteration header
//!
//! When the counter exceeds `gas_limit`, the module traps with
//! "execution budget exhausted". Every [`DEADLINE_INTERVAL`] ticks the
//! host's `rt.deadline` check runs, so a guest cannot outlive its
//! wall-clock deadline even when the budget is large.

use wasm_encoder::{BlockType, Function, Instruction};

use crate::runtime::{emit_trap, FuncIndices, TrapMessages, RT_GAS_TICK};
use crate::types::{DEADLINE_INTERVAL, GLOBAL_GAS, GLOBAL_GAS_LIMIT, IMPORT_DEADLINE};

/// Emit a call to the `gas_tick` helper.
pub fn emit_gas_tick(f: &mut Function, ix: FuncIndices) {
    f.instruction(&Instruction::Call(ix.rt(RT_GAS_TICK)));
}

/// Emit the body of the `gas_tick()` helper.
///
/// Equivalent pseudo-code:
/// ```text
/// gas += 1
/// if gas > gas_limit { trap("execution budget exhausted") }
/// if gas % DEADLINE_INTERVAL == 0 { rt.deadline() }
/// ```
pub fn emit_gas_tick_helper(traps: &TrapMessages) -> Function {
    let mut f = Function::new(vec![]);
    // gas += 1
    f.instruction(&Instruction::GlobalGet(GLOBAL_GAS));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::GlobalSet(GLOBAL_GAS));

    // if gas > gas_limit → trap
    f.instruction(&Instruction::GlobalGet(GLOBAL_GAS));
    f.instruction(&Instruction::GlobalGet(GLOBAL_GAS_LIMIT));
    f.instruction(&Instruction::I32GtU);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_trap(&mut f, traps.budget_exhausted);
    f.instruction(&Instruction::End);

    // periodic deadline check
    f.instruction(&Instruction::GlobalGet(GLOBAL_GAS));
    f.instruction(&Instruction::I32Const((DEADLINE_INTERVAL - 1) as i32));
    f.instruction(&Instruction::I32And);
    f.instruction(&Instruction::I32Eqz);
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::Call(IMPORT_DEADLINE));
    f.instruction(&Instruction::End);

    f.instruction(&Instruction::End);
    f
}
