//! Expression code generation.
//!
//! Every expression evaluates to an i32 *value pointer* left on the WASM
//! operand stack.  The caller can then store it, pass it to another function,
//! or drop it.

use kiln_binder::{Symbol, INDEXER};
use kiln_types::ast::*;
use wasm_encoder::{BlockType, Function, Instruction, ValType};

use crate::compiler::{FuncContext, Optimization};
use crate::error::{CodegenError, CodegenResult};
use crate::fold::{fold, Const};
use crate::runtime::*;
use crate::types::*;

/// Emit instructions for an expression.  Leaves one i32 (value ptr) on stack.
pub fn emit_expr(expr: &Expr, ctx: &mut FuncContext, f: &mut Function) -> CodegenResult<()> {
    if ctx.optimization == Optimization::Release && is_foldable(&expr.kind) {
        if let Some(value) = fold(expr) {
            emit_const(&value, ctx, f);
            return Ok(());
        }
    }

    match &expr.kind {
        // ── Literals ──────────────────────────────────────────────────────
        ExprKind::NumberLit(n) => emit_const(&Const::Number(*n), ctx, f),
        ExprKind::StringLit(s) => emit_const(&Const::Str(s.clone()), ctx, f),
        ExprKind::BoolLit(b) => emit_const(&Const::Bool(*b), ctx, f),
        ExprKind::NilLit => emit_const(&Const::Nil, ctx, f),
        ExprKind::ListLit(items) => emit_list_lit(items, ctx, f)?,
        ExprKind::StringInterpolation(parts) => emit_interpolation(parts, ctx, f)?,

        // ── Names ────────────────────────────────────────────────────────
        ExprKind::Identifier(name) => emit_name(expr, name, ctx, f)?,
        ExprKind::Member { name, .. } => emit_name(expr, &name.name, ctx, f)?,

        // ── Calls ────────────────────────────────────────────────────────
        ExprKind::Call { args, .. } => emit_call(expr, args, ctx, f)?,
        ExprKind::Index { object, index } => {
            emit_expr(object, ctx, f)?;
            emit_expr(index, ctx, f)?;
            let (library, name) = INDEXER;
            let idx = ctx
                .functions
                .library(library, name)
                .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("{library}.{name}")))?;
            f.instruction(&Instruction::Call(idx));
        }

        // ── Operators ────────────────────────────────────────────────────
        ExprKind::Binary { left, op, right } => emit_binary(left, *op, right, ctx, f)?,
        ExprKind::Unary { op, operand } => {
            emit_expr(operand, ctx, f)?;
            let helper = match op {
                UnaryOp::Neg => RT_NEG,
                UnaryOp::Not => RT_NOT,
            };
            f.instruction(&Instruction::Call(ctx.ix.rt(helper)));
        }

        // ── Grouping ─────────────────────────────────────────────────────
        ExprKind::Paren(inner) => emit_expr(inner, ctx, f)?,
    }
    Ok(())
}

/// Operators are the only nodes worth folding; literals emit directly.
fn is_foldable(kind: &ExprKind) -> bool {
    matches!(
        kind,
        ExprKind::Binary { .. } | ExprKind::Unary { .. } | ExprKind::Paren(_)
    )
}

// ══════════════════════════════════════════════════════════════════════════════
// Literal emission
// ══════════════════════════════════════════════════════════════════════════════

/// Emit a compile-time constant as a fresh heap cell.
pub fn emit_const(value: &Const, ctx: &mut FuncContext, f: &mut Function) {
    match value {
        Const::Nil => {
            f.instruction(&Instruction::Call(ctx.ix.rt(RT_VAL_NIL)));
        }
        Const::Number(n) => {
            f.instruction(&Instruction::F64Const(*n));
            f.instruction(&Instruction::Call(ctx.ix.rt(RT_VAL_NUMBER)));
        }
        Const::Bool(b) => {
            f.instruction(&Instruction::I32Const(i32::from(*b)));
            f.instruction(&Instruction::Call(ctx.ix.rt(RT_VAL_BOOL)));
        }
        Const::Str(s) => {
            let (ptr, len) = ctx.intern_string(s);
            f.instruction(&Instruction::I32Const(ptr as i32));
            f.instruction(&Instruction::I32Const(len as i32));
            f.instruction(&Instruction::Call(ctx.ix.rt(RT_VAL_STRING)));
        }
    }
}

/// `[a, b, c]`: an array of value pointers plus a LIST cell.
fn emit_list_lit(items: &[Expr], ctx: &mut FuncContext, f: &mut Function) -> CodegenResult<()> {
    let arr = ctx.alloc_local(ValType::I32);
    f.instruction(&Instruction::I32Const((items.len() * 4) as i32));
    f.instruction(&Instruction::Call(ctx.ix.rt(RT_ALLOC)));
    f.instruction(&Instruction::LocalSet(arr));

    for (i, item) in items.iter().enumerate() {
        f.instruction(&Instruction::LocalGet(arr));
        emit_expr(item, ctx, f)?;
        f.instruction(&Instruction::I32Store(memarg((i * 4) as u64, 2)));
    }

    f.instruction(&Instruction::LocalGet(arr));
    f.instruction(&Instruction::I32Const(items.len() as i32));
    f.instruction(&Instruction::Call(ctx.ix.rt(RT_VAL_LIST)));
    Ok(())
}

/// `"a ${b} c"`: the first part becomes a string, the rest are
/// concatenated onto it.
fn emit_interpolation(
    parts: &[StringPart],
    ctx: &mut FuncContext,
    f: &mut Function,
) -> CodegenResult<()> {
    let Some((first, rest)) = parts.split_first() else {
        emit_const(&Const::Str(String::new()), ctx, f);
        return Ok(());
    };

    match first {
        StringPart::Literal(s) => emit_const(&Const::Str(s.clone()), ctx, f),
        StringPart::Expr(e) => {
            emit_expr(e, ctx, f)?;
            f.instruction(&Instruction::Call(IMPORT_TO_STRING));
        }
    }
    for part in rest {
        match part {
            StringPart::Literal(s) => emit_const(&Const::Str(s.clone()), ctx, f),
            StringPart::Expr(e) => emit_expr(e, ctx, f)?,
        }
        f.instruction(&Instruction::Call(IMPORT_CONCAT));
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Names and calls
// ══════════════════════════════════════════════════════════════════════════════

/// A variable read or a library constant.
fn emit_name(expr: &Expr, name: &str, ctx: &mut FuncContext, f: &mut Function) -> CodegenResult<()> {
    let model = ctx.model;
    match model.symbol_info(expr.id) {
        Some(Symbol::Parameter { slot, .. } | Symbol::Local { slot, .. }) => {
            f.instruction(&Instruction::LocalGet(*slot));
        }
        Some(Symbol::LibraryConstant { value, .. }) => {
            emit_const(&Const::Number(*value), ctx, f);
        }
        Some(symbol) => {
            return Err(CodegenError::Internal(format!(
                "'{symbol}' cannot be used as a value"
            )));
        }
        None => return Err(CodegenError::UnresolvedSymbol(name.to_string())),
    }
    Ok(())
}

fn emit_call(expr: &Expr, args: &[Expr], ctx: &mut FuncContext, f: &mut Function) -> CodegenResult<()> {
    let target = match ctx.model.symbol_info(expr.id) {
        Some(Symbol::Function { name, .. }) => ctx.functions.user(name),
        Some(Symbol::LibraryFunction { library, name, .. }) => ctx.functions.library(library, name),
        _ => None,
    };
    let Some(idx) = target else {
        return Err(CodegenError::UnresolvedSymbol(describe_callee(expr)));
    };

    for arg in args {
        emit_expr(arg, ctx, f)?;
    }
    f.instruction(&Instruction::Call(idx));
    Ok(())
}

fn describe_callee(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Call { callee, .. } => describe_callee(callee),
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::Member { object, name } => format!("{}.{}", describe_callee(object), name.name),
        ExprKind::Paren(inner) => describe_callee(inner),
        _ => "<expression>".to_string(),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

fn emit_binary(
    left: &Expr,
    op: BinOp,
    right: &Expr,
    ctx: &mut FuncContext,
    f: &mut Function,
) -> CodegenResult<()> {
    match op {
        // Short-circuit: `right` only runs when it decides the result.
        BinOp::And | BinOp::Or => {
            emit_expr(left, ctx, f)?;
            f.instruction(&Instruction::Call(ctx.ix.rt(RT_TRUTHY)));
            f.instruction(&Instruction::If(BlockType::Result(ValType::I32)));
            if op == BinOp::And {
                emit_expr(right, ctx, f)?;
                f.instruction(&Instruction::Call(ctx.ix.rt(RT_TRUTHY)));
                f.instruction(&Instruction::Else);
                f.instruction(&Instruction::I32Const(0));
            } else {
                f.instruction(&Instruction::I32Const(1));
                f.instruction(&Instruction::Else);
                emit_expr(right, ctx, f)?;
                f.instruction(&Instruction::Call(ctx.ix.rt(RT_TRUTHY)));
            }
            f.instruction(&Instruction::End);
            f.instruction(&Instruction::Call(ctx.ix.rt(RT_VAL_BOOL)));
        }

        BinOp::Eq | BinOp::NotEq => {
            emit_expr(left, ctx, f)?;
            emit_expr(right, ctx, f)?;
            f.instruction(&Instruction::Call(IMPORT_EQUALS));
            if op == BinOp::NotEq {
                f.instruction(&Instruction::I32Eqz);
            }
            f.instruction(&Instruction::Call(ctx.ix.rt(RT_VAL_BOOL)));
        }

        _ => {
            let helper = match op {
                BinOp::Add => RT_ADD,
                BinOp::Sub => RT_SUB,
                BinOp::Mul => RT_MUL,
                BinOp::Div => RT_DIV,
                BinOp::Mod => RT_MOD,
                BinOp::Less => RT_LT,
                BinOp::LessEq => RT_LE,
                BinOp::Greater => RT_GT,
                BinOp::GreaterEq => RT_GE,
                BinOp::And | BinOp::Or | BinOp::Eq | BinOp::NotEq => {
                    return Err(CodegenError::Internal(format!(
                        "operator '{}' has no runtime helper",
                        op.as_str()
                    )));
                }
            };
            emit_expr(left, ctx, f)?;
            emit_expr(right, ctx, f)?;
            f.instruction(&Instruction::Call(ctx.ix.rt(helper)));
        }
    }
    Ok(())
}
