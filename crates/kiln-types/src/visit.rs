//! Preorder traversal over the bindable nodes of a program.

use crate::ast::*;

/// A borrowed reference to a node that carries a [`NodeId`].
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Function(&'a FnDecl),
    Param(&'a Param),
    Let(&'a LetStmt),
    Set(&'a SetStmt),
    For(&'a ForStmt),
    Expr(&'a Expr),
}

impl NodeRef<'_> {
    pub fn id(&self) -> NodeId {
        match self {
            NodeRef::Function(f) => f.id,
            NodeRef::Param(p) => p.id,
            NodeRef::Let(l) => l.id,
            NodeRef::Set(s) => s.id,
            NodeRef::For(f) => f.id,
            NodeRef::Expr(e) => e.id,
        }
    }
}

/// Every bindable node in source order (parents before children).
pub fn nodes(program: &Program) -> Vec<NodeRef<'_>> {
    let mut out = Vec::new();
    for f in &program.functions {
        out.push(NodeRef::Function(f));
        for p in &f.params {
            out.push(NodeRef::Param(p));
        }
        walk_block(&f.body, &mut out);
    }
    out
}

/// The ids of [`nodes`], in the same order.
pub fn node_ids(program: &Program) -> Vec<NodeId> {
    nodes(program).iter().map(NodeRef::id).collect()
}

fn walk_block<'a>(block: &'a Block, out: &mut Vec<NodeRef<'a>>) {
    for stmt in &block.stmts {
        walk_stmt(stmt, out);
    }
}

fn walk_stmt<'a>(stmt: &'a Stmt, out: &mut Vec<NodeRef<'a>>) {
    match stmt {
        Stmt::Let(l) => {
            out.push(NodeRef::Let(l));
            walk_expr(&l.value, out);
        }
        Stmt::Set(s) => {
            out.push(NodeRef::Set(s));
            walk_expr(&s.value, out);
        }
        Stmt::If(i) => walk_if(i, out),
        Stmt::While(w) => {
            walk_expr(&w.condition, out);
            walk_block(&w.body, out);
        }
        Stmt::For(f) => {
            out.push(NodeRef::For(f));
            walk_expr(&f.iterable, out);
            walk_block(&f.body, out);
        }
        Stmt::Return(r) => {
            if let Some(v) = &r.value {
                walk_expr(v, out);
            }
        }
        Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::Expr(e) => walk_expr(e, out),
    }
}

fn walk_if<'a>(stmt: &'a IfStmt, out: &mut Vec<NodeRef<'a>>) {
    walk_expr(&stmt.condition, out);
    walk_block(&stmt.then_block, out);
    match &stmt.else_branch {
        Some(ElseBranch::ElseIf(nested)) => walk_if(nested, out),
        Some(ElseBranch::Block(b)) => walk_block(b, out),
        None => {}
    }
}

fn walk_expr<'a>(expr: &'a Expr, out: &mut Vec<NodeRef<'a>>) {
    out.push(NodeRef::Expr(expr));
    match &expr.kind {
        ExprKind::NumberLit(_)
        | ExprKind::StringLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::NilLit
        | ExprKind::Identifier(_) => {}
        ExprKind::StringInterpolation(parts) => {
            for part in parts {
                if let StringPart::Expr(e) = part {
                    walk_expr(e, out);
                }
            }
        }
        ExprKind::ListLit(items) => {
            for item in items {
                walk_expr(item, out);
            }
        }
        ExprKind::Call { callee, args } => {
            walk_expr(callee, out);
            for arg in args {
                walk_expr(arg, out);
            }
        }
        ExprKind::Member { object, .. } => walk_expr(object, out),
        ExprKind::Index { object, index } => {
            walk_expr(object, out);
            walk_expr(index, out);
        }
        ExprKind::Binary { left, right, .. } => {
            walk_expr(left, out);
            walk_expr(right, out);
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, out),
        ExprKind::Paren(inner) => walk_expr(inner, out),
    }
}
