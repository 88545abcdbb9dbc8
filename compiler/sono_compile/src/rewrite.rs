//! Subtree duplication with fresh node identities.
//!
//! Inliner expansion and user-function inlining splice cloned subtrees
//! into new positions. Every cloned node gets a fresh id, and whatever
//! the side tables already knew about the original node is copied over,
//! so resolution and type information survive duplication.

use sono_ir::{Expr, ExprKind, NodeId, NodeIdGen, Stmt, StmtKind};

use crate::CompilationUnit;

/// Give every node in a cloned template body a fresh identity.
///
/// Instantiations clone the stored blueprint; without renumbering, two
/// instantiations of the same template would share node ids and fight
/// over the side tables.
pub fn renumber_stmt_fresh(stmt: &mut Stmt, ids: &mut NodeIdGen) {
    stmt.id = ids.next();
    match &mut stmt.kind {
        StmtKind::Block(stmts) => {
            for s in stmts {
                renumber_stmt_fresh(s, ids);
            }
        }
        StmtKind::VarDecl { init, .. } => {
            if let Some(init) = init {
                renumber_expr_fresh(init, ids);
            }
        }
        StmtKind::Expr(expr) => renumber_expr_fresh(expr, ids),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            renumber_expr_fresh(cond, ids);
            renumber_stmt_fresh(then_branch, ids);
            if let Some(else_branch) = else_branch {
                renumber_stmt_fresh(else_branch, ids);
            }
        }
        StmtKind::While { cond, body } => {
            renumber_expr_fresh(cond, ids);
            renumber_stmt_fresh(body, ids);
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            if let Some(init) = init {
                renumber_stmt_fresh(init, ids);
            }
            if let Some(cond) = cond {
                renumber_expr_fresh(cond, ids);
            }
            if let Some(step) = step {
                renumber_expr_fresh(step, ids);
            }
            renumber_stmt_fresh(body, ids);
        }
        StmtKind::Return(Some(expr)) => renumber_expr_fresh(expr, ids),
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
    }
}

/// Fresh ids for a cloned expression with no side-table history.
pub fn renumber_expr_fresh(expr: &mut Expr, ids: &mut NodeIdGen) {
    renumber(expr, ids, &mut |_, _| {});
}

/// Deep-clone `expr`, renumbering every node and copying its side-table
/// entries to the new ids.
pub fn clone_renumbered(expr: &Expr, unit: &mut CompilationUnit) -> Expr {
    let mut cloned = expr.clone();
    renumber(&mut cloned, &mut unit.ids, &mut |old, new| {
        if let Some(ty) = unit.types.get(&old).copied() {
            unit.types.insert(new, ty);
        }
        if let Some(r) = unit.refs.get(&old).cloned() {
            unit.refs.insert(new, r);
        }
    });
    cloned
}

fn renumber(expr: &mut Expr, ids: &mut NodeIdGen, copy: &mut impl FnMut(NodeId, NodeId)) {
    let new_id = ids.next();
    copy(expr.id, new_id);
    expr.id = new_id;

    match &mut expr.kind {
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::DoubleLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::Symbol { .. } => {}
        ExprKind::Unary { operand, .. } => renumber(operand, ids, copy),
        ExprKind::Binary { lhs, rhs, .. } => {
            renumber(lhs, ids, copy);
            renumber(rhs, ids, copy);
        }
        ExprKind::Ternary {
            cond,
            then_value,
            else_value,
        } => {
            renumber(cond, ids, copy);
            renumber(then_value, ids, copy);
            renumber(else_value, ids, copy);
        }
        ExprKind::Assign { target, value, .. } => {
            renumber(target, ids, copy);
            renumber(value, ids, copy);
        }
        ExprKind::IncDec { target, .. } => renumber(target, ids, copy),
        ExprKind::Call { callee, args, .. } => {
            renumber(callee, ids, copy);
            for arg in args {
                renumber(arg, ids, copy);
            }
        }
        ExprKind::Member { base, .. } => renumber(base, ids, copy),
        ExprKind::Index { base, index } => {
            renumber(base, ids, copy);
            renumber(index, ids, copy);
        }
        ExprKind::Cast { expr: inner, .. } => renumber(inner, ids, copy),
        ExprKind::InitList(values) => {
            for value in values {
                renumber(value, ids, copy);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sono_ir::Span;
    use sono_types::TypeInfo;

    #[test]
    fn clone_gets_fresh_ids_and_copied_types() {
        let mut unit = CompilationUnit::new(String::new());
        let original = Expr::new(unit.ids.next(), Span::DUMMY, ExprKind::IntLit(7));
        unit.set_type(original.id, TypeInfo::INT);

        let cloned = clone_renumbered(&original, &mut unit);
        assert_ne!(cloned.id, original.id);
        assert_eq!(unit.type_of(cloned.id), Some(TypeInfo::INT));
        assert_eq!(unit.type_of(original.id), Some(TypeInfo::INT));
    }
}
