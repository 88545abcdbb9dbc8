//! Compile-time expression evaluation.
//!
//! Direct enum dispatch over the fixed scalar set, the same shape the
//! runtime semantics have, so a folded result and an executed result
//! never disagree. Used by data initialisation, span lengths and both
//! optimization stages.

use sono_ir::{BinaryOp, Expr, ExprKind, UnaryOp};
use sono_resolve::ConstValue;

use crate::unit::SymbolRef;
use crate::CompilationUnit;

/// A folded compile-time value.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Folded {
    Int(i32),
    Float(f32),
    Double(f64),
    Bool(bool),
}

impl Folded {
    pub fn as_f64(self) -> f64 {
        match self {
            Folded::Int(v) => f64::from(v),
            Folded::Float(v) => f64::from(v),
            Folded::Double(v) => v,
            Folded::Bool(v) => f64::from(u8::from(v)),
        }
    }

    pub fn from_const(value: ConstValue) -> Self {
        match value {
            ConstValue::Int(v) => Folded::Int(i32::try_from(v).unwrap_or(i32::MAX)),
            ConstValue::Float(v) => Folded::Double(v),
        }
    }
}

/// Fold an expression built purely from literals. Needs no symbol
/// knowledge, so it is safe before resolution has run.
pub fn const_eval_literal(expr: &Expr) -> Option<Folded> {
    const_eval(expr, None)
}

/// Fold with resolved-symbol knowledge: constants resolve through the
/// unit's side tables.
pub fn const_eval_resolved(expr: &Expr, unit: &CompilationUnit) -> Option<Folded> {
    const_eval(expr, Some(unit))
}

fn const_eval(expr: &Expr, unit: Option<&CompilationUnit>) -> Option<Folded> {
    match &expr.kind {
        ExprKind::IntLit(v) => Some(Folded::Int(*v)),
        ExprKind::FloatLit(v) => Some(Folded::Float(*v)),
        ExprKind::DoubleLit(v) => Some(Folded::Double(*v)),
        ExprKind::BoolLit(v) => Some(Folded::Bool(*v)),
        ExprKind::Symbol { .. } => match unit?.refs.get(&expr.id)? {
            SymbolRef::Const(value) => Some(Folded::from_const(*value)),
            _ => None,
        },
        ExprKind::Unary { op, operand } => {
            let value = const_eval(operand, unit)?;
            eval_unary(*op, value)
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs = const_eval(lhs, unit)?;
            let rhs = const_eval(rhs, unit)?;
            eval_binary(*op, lhs, rhs)
        }
        ExprKind::Ternary {
            cond,
            then_value,
            else_value,
        } => match const_eval(cond, unit)? {
            Folded::Bool(true) => const_eval(then_value, unit),
            Folded::Bool(false) => const_eval(else_value, unit),
            _ => None,
        },
        ExprKind::Cast { .. }
        | ExprKind::Assign { .. }
        | ExprKind::IncDec { .. }
        | ExprKind::Call { .. }
        | ExprKind::Member { .. }
        | ExprKind::Index { .. }
        | ExprKind::InitList(_) => None,
    }
}

fn eval_unary(op: UnaryOp, value: Folded) -> Option<Folded> {
    Some(match (op, value) {
        (UnaryOp::Neg, Folded::Int(v)) => Folded::Int(v.checked_neg()?),
        (UnaryOp::Neg, Folded::Float(v)) => Folded::Float(-v),
        (UnaryOp::Neg, Folded::Double(v)) => Folded::Double(-v),
        (UnaryOp::Not, Folded::Bool(v)) => Folded::Bool(!v),
        (UnaryOp::BitNot, Folded::Int(v)) => Folded::Int(!v),
        _ => return None,
    })
}

fn eval_binary(op: BinaryOp, lhs: Folded, rhs: Folded) -> Option<Folded> {
    use Folded::{Bool, Double, Float, Int};

    // Logical ops first; they only take booleans.
    if op.is_logical() {
        return match (lhs, rhs) {
            (Bool(a), Bool(b)) => Some(Bool(match op {
                BinaryOp::LogicalAnd => a && b,
                _ => a || b,
            })),
            _ => None,
        };
    }

    match (lhs, rhs) {
        (Int(a), Int(b)) => eval_int(op, a, b),
        (Float(a), Float(b)) => eval_f32(op, a, b),
        (Double(a), Double(b)) => eval_f64(op, a, b),
        // Mixed numeric operands widen, mirroring the type checker.
        (Int(a), Float(b)) => eval_f32(op, a as f32, b),
        (Float(a), Int(b)) => eval_f32(op, a, b as f32),
        (Int(a), Double(b)) => eval_f64(op, f64::from(a), b),
        (Double(a), Int(b)) => eval_f64(op, a, f64::from(b)),
        (Float(a), Double(b)) => eval_f64(op, f64::from(a), b),
        (Double(a), Float(b)) => eval_f64(op, a, f64::from(b)),
        (Bool(a), Bool(b)) => match op {
            BinaryOp::Eq => Some(Bool(a == b)),
            BinaryOp::Ne => Some(Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}

fn eval_int(op: BinaryOp, a: i32, b: i32) -> Option<Folded> {
    use Folded::{Bool, Int};
    Some(match op {
        BinaryOp::Add => Int(a.checked_add(b)?),
        BinaryOp::Sub => Int(a.checked_sub(b)?),
        BinaryOp::Mul => Int(a.checked_mul(b)?),
        BinaryOp::Div => Int(a.checked_div(b)?),
        BinaryOp::Mod => Int(a.checked_rem(b)?),
        BinaryOp::BitAnd => Int(a & b),
        BinaryOp::BitOr => Int(a | b),
        BinaryOp::BitXor => Int(a ^ b),
        BinaryOp::Shl => Int(a.checked_shl(u32::try_from(b).ok()?)?),
        BinaryOp::Shr => Int(a.checked_shr(u32::try_from(b).ok()?)?),
        BinaryOp::Eq => Bool(a == b),
        BinaryOp::Ne => Bool(a != b),
        BinaryOp::Lt => Bool(a < b),
        BinaryOp::Le => Bool(a <= b),
        BinaryOp::Gt => Bool(a > b),
        BinaryOp::Ge => Bool(a >= b),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => return None,
    })
}

fn eval_f32(op: BinaryOp, a: f32, b: f32) -> Option<Folded> {
    use Folded::{Bool, Float};
    Some(match op {
        BinaryOp::Add => Float(a + b),
        BinaryOp::Sub => Float(a - b),
        BinaryOp::Mul => Float(a * b),
        BinaryOp::Div => Float(a / b),
        BinaryOp::Mod => Float(a % b),
        BinaryOp::Eq => Bool(a == b),
        BinaryOp::Ne => Bool(a != b),
        BinaryOp::Lt => Bool(a < b),
        BinaryOp::Le => Bool(a <= b),
        BinaryOp::Gt => Bool(a > b),
        BinaryOp::Ge => Bool(a >= b),
        _ => return None,
    })
}

fn eval_f64(op: BinaryOp, a: f64, b: f64) -> Option<Folded> {
    use Folded::{Bool, Double};
    Some(match op {
        BinaryOp::Add => Double(a + b),
        BinaryOp::Sub => Double(a - b),
        BinaryOp::Mul => Double(a * b),
        BinaryOp::Div => Double(a / b),
        BinaryOp::Mod => Double(a % b),
        BinaryOp::Eq => Bool(a == b),
        BinaryOp::Ne => Bool(a != b),
        BinaryOp::Lt => Bool(a < b),
        BinaryOp::Le => Bool(a <= b),
        BinaryOp::Gt => Bool(a > b),
        BinaryOp::Ge => Bool(a >= b),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sono_ir::{NodeIdGen, Span};

    fn int(ids: &mut NodeIdGen, v: i32) -> Expr {
        Expr::new(ids.next(), Span::DUMMY, ExprKind::IntLit(v))
    }

    fn binary(ids: &mut NodeIdGen, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(
            ids.next(),
            Span::DUMMY,
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }

    #[test]
    fn folds_literal_arithmetic() {
        let mut ids = NodeIdGen::new();
        let lhs = int(&mut ids, 6);
        let rhs = int(&mut ids, 7);
        let expr = binary(&mut ids, BinaryOp::Mul, lhs, rhs);
        assert_eq!(const_eval_literal(&expr), Some(Folded::Int(42)));
    }

    #[test]
    fn division_by_zero_does_not_fold() {
        let mut ids = NodeIdGen::new();
        let lhs = int(&mut ids, 1);
        let rhs = int(&mut ids, 0);
        let expr = binary(&mut ids, BinaryOp::Div, lhs, rhs);
        assert_eq!(const_eval_literal(&expr), None);
    }

    #[test]
    fn overflow_does_not_fold() {
        let mut ids = NodeIdGen::new();
        let lhs = int(&mut ids, i32::MAX);
        let rhs = int(&mut ids, 1);
        let expr = binary(&mut ids, BinaryOp::Add, lhs, rhs);
        assert_eq!(const_eval_literal(&expr), None);
    }

    #[test]
    fn mixed_operands_widen() {
        let mut ids = NodeIdGen::new();
        let lhs = int(&mut ids, 1);
        let rhs = Expr::new(ids.next(), Span::DUMMY, ExprKind::FloatLit(0.5));
        let expr = binary(&mut ids, BinaryOp::Add, lhs, rhs);
        assert_eq!(const_eval_literal(&expr), Some(Folded::Float(1.5)));
    }

    #[test]
    fn calls_do_not_fold() {
        let mut ids = NodeIdGen::new();
        let callee = Expr::new(
            ids.next(),
            Span::DUMMY,
            ExprKind::Symbol {
                path: sono_ir::NamespacedIdentifier::from_segment("f"),
                explicit_scope: false,
            },
        );
        let expr = Expr::new(
            ids.next(),
            Span::DUMMY,
            ExprKind::Call {
                callee: Box::new(callee),
                template_args: Vec::new(),
                args: Vec::new(),
            },
        );
        assert_eq!(const_eval_literal(&expr), None);
    }
}
