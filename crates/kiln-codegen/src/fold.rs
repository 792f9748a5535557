//! Compile-time constant folding (release builds only).
//!
//! Folds operators whose operands are all literals. Anything that could
//! trap at runtime (division or remainder by zero, `-` on a non-number) is
//! left alone so the runtime reports it.

use kiln_types::ast::*;

/// A value known at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Nil,
    Number(f64),
    Bool(bool),
    Str(String),
}

impl Const {
    fn truthy(&self) -> bool {
        !matches!(self, Const::Nil | Const::Bool(false))
    }
}

/// Fold `expr` to a constant, if every leaf is a literal.
pub fn fold(expr: &Expr) -> Option<Const> {
    match &expr.kind {
        ExprKind::NumberLit(n) => Some(Const::Number(*n)),
        ExprKind::StringLit(s) => Some(Const::Str(s.clone())),
        ExprKind::BoolLit(b) => Some(Const::Bool(*b)),
        ExprKind::NilLit => Some(Const::Nil),
        ExprKind::Paren(inner) => fold(inner),
        ExprKind::Unary { op, operand } => match (op, fold(operand)?) {
            (UnaryOp::Neg, Const::Number(n)) => Some(Const::Number(-n)),
            (UnaryOp::Not, value) => Some(Const::Bool(!value.truthy())),
            _ => None,
        },
        ExprKind::Binary { left, op, right } => fold_binary(*op, fold(left)?, fold(right)?),
        _ => None,
    }
}

fn fold_binary(op: BinOp, left: Const, right: Const) -> Option<Const> {
    use Const::*;
    let folded = match (op, left, right) {
        (BinOp::And, l, r) => Bool(l.truthy() && r.truthy()),
        (BinOp::Or, l, r) => Bool(l.truthy() || r.truthy()),
        (BinOp::Eq, l, r) => Bool(l == r),
        (BinOp::NotEq, l, r) => Bool(l != r),

        (BinOp::Add, Number(a), Number(b)) => Number(a + b),
        (BinOp::Add, Str(a), Str(b)) => Str(a + &b),
        (BinOp::Sub, Number(a), Number(b)) => Number(a - b),
        (BinOp::Mul, Number(a), Number(b)) => Number(a * b),
        (BinOp::Div, Number(a), Number(b)) if b != 0.0 => Number(a / b),
        (BinOp::Mod, Number(a), Number(b)) if b != 0.0 => Number(a - b * (a / b).trunc()),

        (BinOp::Less, Number(a), Number(b)) => Bool(a < b),
        (BinOp::LessEq, Number(a), Number(b)) => Bool(a <= b),
        (BinOp::Greater, Number(a), Number(b)) => Bool(a > b),
        (BinOp::GreaterEq, Number(a), Number(b)) => Bool(a >= b),
        _ => return None,
    };
    Some(folded)
}
