//! Statement code generation.
//!
//! Statements leave nothing on the stack: expression results are dropped
//! or stored into locals.

use kiln_binder::Symbol;
use kiln_types::ast::*;
use wasm_encoder::{BlockType, Function, Instruction, ValType};

use crate::compiler::{FuncContext, Label};
use crate::error::{CodegenError, CodegenResult};
use crate::expr::emit_expr;
use crate::gas;
use crate::runtime::*;

/// Emit every statement of a block.
pub fn emit_block(block: &Block, ctx: &mut FuncContext, f: &mut Function) -> CodegenResult<()> {
    for stmt in &block.stmts {
        emit_stmt(stmt, ctx, f)?;
    }
    Ok(())
}

/// Emit a single statement.
pub fn emit_stmt(stmt: &Stmt, ctx: &mut FuncContext, f: &mut Function) -> CodegenResult<()> {
    match stmt {
        Stmt::Let(let_stmt) => {
            emit_expr(&let_stmt.value, ctx, f)?;
            let slot = slot_of(ctx.model.declared_symbol(let_stmt.id), &let_stmt.name.name)?;
            f.instruction(&Instruction::LocalSet(slot));
        }
        Stmt::Set(set) => {
            emit_expr(&set.value, ctx, f)?;
            let slot = slot_of(ctx.model.symbol_info(set.id), &set.target.name)?;
            f.instruction(&Instruction::LocalSet(slot));
        }
        Stmt::If(if_stmt) => emit_if(if_stmt, ctx, f)?,
        Stmt::While(while_stmt) => emit_while(while_stmt, ctx, f)?,
        Stmt::For(for_stmt) => emit_for(for_stmt, ctx, f)?,
        Stmt::Return(ret) => {
            match &ret.value {
                Some(value) => emit_expr(value, ctx, f)?,
                None => {
                    f.instruction(&Instruction::Call(ctx.ix.rt(RT_VAL_NIL)));
                }
            }
            f.instruction(&Instruction::Return);
        }
        Stmt::Break(_) => {
            let depth = ctx.depth_of(Label::Break)?;
            f.instruction(&Instruction::Br(depth));
        }
        Stmt::Continue(_) => {
            let depth = ctx.depth_of(Label::Continue)?;
            f.instruction(&Instruction::Br(depth));
        }
        Stmt::Expr(expr) => {
            emit_expr(expr, ctx, f)?;
            f.instruction(&Instruction::Drop);
        }
    }
    Ok(())
}

/// The local a variable symbol lives in.
fn slot_of(symbol: Option<&Symbol>, name: &str) -> CodegenResult<u32> {
    symbol
        .and_then(Symbol::slot)
        .ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))
}

/// Push the truthiness of `cond` as an i32.
fn emit_condition(cond: &Expr, ctx: &mut FuncContext, f: &mut Function) -> CodegenResult<()> {
    emit_expr(cond, ctx, f)?;
    f.instruction(&Instruction::Call(ctx.ix.rt(RT_TRUTHY)));
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Control flow
// ══════════════════════════════════════════════════════════════════════════════

fn emit_if(if_stmt: &IfStmt, ctx: &mut FuncContext, f: &mut Function) -> CodegenResult<()> {
    emit_condition(&if_stmt.condition, ctx, f)?;
    f.instruction(&Instruction::If(BlockType::Empty));
    ctx.push_label(Label::Block);
    emit_block(&if_stmt.then_block, ctx, f)?;
    match &if_stmt.else_branch {
        Some(ElseBranch::Block(block)) => {
            f.instruction(&Instruction::Else);
            emit_block(block, ctx, f)?;
        }
        Some(ElseBranch::ElseIf(nested)) => {
            f.instruction(&Instruction::Else);
            emit_if(nested, ctx, f)?;
        }
        None => {}
    }
    ctx.pop_label();
    f.instruction(&Instruction::End);
    Ok(())
}

/// ```text
/// block                     ;; break target
///   loop                    ;; continue target
///     gas_tick
///     br_if 1 (not cond)
///     body
///     br 0
///   end
/// end
/// ```
fn emit_while(while_stmt: &WhileStmt, ctx: &mut FuncContext, f: &mut Function) -> CodegenResult<()> {
    f.instruction(&Instruction::Block(BlockType::Empty));
    ctx.push_label(Label::Break);
    f.instruction(&Instruction::Loop(BlockType::Empty));
    ctx.push_label(Label::Continue);

    gas::emit_gas_tick(f, ctx.ix);
    emit_condition(&while_stmt.condition, ctx, f)?;
    f.instruction(&Instruction::I32Eqz);
    f.instruction(&Instruction::BrIf(1));

    emit_block(&while_stmt.body, ctx, f)?;
    f.instruction(&Instruction::Br(0));

    ctx.pop_label();
    f.instruction(&Instruction::End);
    ctx.pop_label();
    f.instruction(&Instruction::End);
    Ok(())
}

/// Iterates over the element count taken when the loop starts. The array
/// pointer is re-read every iteration since `list.push` may move it.
/// The index advances before the body so `continue` needs no extra code.
fn emit_for(for_stmt: &ForStmt, ctx: &mut FuncContext, f: &mut Function) -> CodegenResult<()> {
    let item = slot_of(ctx.model.declared_symbol(for_stmt.id), &for_stmt.item.name)?;
    let list = ctx.alloc_local(ValType::I32);
    let len = ctx.alloc_local(ValType::I32);
    let idx = ctx.alloc_local(ValType::I32);

    emit_expr(&for_stmt.iterable, ctx, f)?;
    f.instruction(&Instruction::LocalTee(list));
    f.instruction(&Instruction::Call(ctx.ix.rt(RT_LIST_LEN)));
    f.instruction(&Instruction::LocalSet(len));
    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::LocalSet(idx));

    f.instruction(&Instruction::Block(BlockType::Empty));
    ctx.push_label(Label::Break);
    f.instruction(&Instruction::Loop(BlockType::Empty));
    ctx.push_label(Label::Continue);

    gas::emit_gas_tick(f, ctx.ix);
    // idx >= len → exit
    f.instruction(&Instruction::LocalGet(idx));
    f.instruction(&Instruction::LocalGet(len));
    f.instruction(&Instruction::I32GeU);
    f.instruction(&Instruction::BrIf(1));

    // item = array[idx]
    f.instruction(&Instruction::LocalGet(list));
    f.instruction(&Instruction::I32Load(memarg(4, 2)));
    f.instruction(&Instruction::LocalGet(idx));
    f.instruction(&Instruction::I32Const(4));
    f.instruction(&Instruction::I32Mul);
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Load(memarg(0, 2)));
    f.instruction(&Instruction::LocalSet(item));

    // idx += 1
    f.instruction(&Instruction::LocalGet(idx));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(idx));

    emit_block(&for_stmt.body, ctx, f)?;
    f.instruction(&Instruction::Br(0));

    ctx.pop_label();
    f.instruction(&Instruction::End);
    ctx.pop_label();
    f.instruction(&Instruction::End);
    Ok(())
}
