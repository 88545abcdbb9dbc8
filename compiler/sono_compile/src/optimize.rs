//! PreSymbolOptimization and PostSymbolOptimization.
//!
//! The pre-symbol stage folds literal-only arithmetic, which needs no
//! name knowledge and therefore runs before resolution. The post-symbol
//! stage folds through resolved constants, simplifies algebraic
//! identities, prunes constant branches and inlines trivial user
//! functions. Every rewrite is gated by the caller-configured
//! optimization set.

use sono_diagnostic::Result;
use sono_ir::{BinaryOp, Expr, ExprKind, Stmt, StmtKind};
use sono_types::TypeInfo;
use tracing::trace;

use crate::const_eval::{const_eval_literal, const_eval_resolved, Folded};
use crate::function_table::FunctionKind;
use crate::rewrite::clone_renumbered;
use crate::settings::OptimizationFlags;
use crate::unit::SymbolRef;
use crate::{CompilationUnit, CompilerSettings};

/// Stage 5: fold expressions built purely from literals.
pub fn pre_symbol(unit: &mut CompilationUnit, settings: &CompilerSettings) -> Result<()> {
    if !settings
        .optimizations
        .contains(OptimizationFlags::CONSTANT_FOLDING)
    {
        return Ok(());
    }
    for id in unit.functions.ids().collect::<Vec<_>>() {
        let Some(mut body) = unit.functions.take_body(id) else {
            continue;
        };
        fold_stmt(&mut body.stmt, unit, false);
        unit.functions.restore_body(id, body);
    }
    let mut ctor_inits = std::mem::take(&mut unit.data.ctor_inits);
    for (_, expr) in &mut ctor_inits {
        fold_expr(expr, unit, false);
    }
    unit.data.ctor_inits = ctor_inits;
    Ok(())
}

/// Stage 8: fold through constants, simplify, prune dead branches,
/// inline trivial functions.
pub fn post_symbol(unit: &mut CompilationUnit, settings: &CompilerSettings) -> Result<()> {
    let flags = settings.optimizations;
    for id in unit.functions.ids().collect::<Vec<_>>() {
        let Some(mut body) = unit.functions.take_body(id) else {
            continue;
        };
        optimize_stmt(&mut body.stmt, unit, settings, 0)?;
        unit.functions.restore_body(id, body);
    }
    let mut ctor_inits = std::mem::take(&mut unit.data.ctor_inits);
    for (_, expr) in &mut ctor_inits {
        if flags.contains(OptimizationFlags::CONSTANT_FOLDING) {
            fold_expr(expr, unit, true);
        }
    }
    unit.data.ctor_inits = ctor_inits;
    Ok(())
}

fn optimize_stmt(
    stmt: &mut Stmt,
    unit: &mut CompilationUnit,
    settings: &CompilerSettings,
    inline_depth: u32,
) -> Result<()> {
    let flags = settings.optimizations;
    match &mut stmt.kind {
        StmtKind::Block(stmts) => {
            for s in stmts {
                optimize_stmt(s, unit, settings, inline_depth)?;
            }
        }
        StmtKind::VarDecl { init, .. } => {
            if let Some(init) = init {
                optimize_expr(init, unit, settings, inline_depth)?;
            }
        }
        StmtKind::Expr(expr) => optimize_expr(expr, unit, settings, inline_depth)?,
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            optimize_expr(cond, unit, settings, inline_depth)?;
            optimize_stmt(then_branch, unit, settings, inline_depth)?;
            if let Some(else_branch) = else_branch {
                optimize_stmt(else_branch, unit, settings, inline_depth)?;
            }
            if flags.contains(OptimizationFlags::DEAD_CODE) {
                prune_if(stmt);
            }
        }
        StmtKind::While { cond, body } => {
            optimize_expr(cond, unit, settings, inline_depth)?;
            optimize_stmt(body, unit, settings, inline_depth)?;
            if flags.contains(OptimizationFlags::DEAD_CODE) {
                if let ExprKind::BoolLit(false) = cond.kind {
                    trace!("removing while(false) loop");
                    stmt.kind = StmtKind::Block(Vec::new());
                }
            }
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            if let Some(init) = init {
                optimize_stmt(init, unit, settings, inline_depth)?;
            }
            if let Some(cond) = cond {
                optimize_expr(cond, unit, settings, inline_depth)?;
            }
            if let Some(step) = step {
                optimize_expr(step, unit, settings, inline_depth)?;
            }
            optimize_stmt(body, unit, settings, inline_depth)?;
        }
        StmtKind::Return(Some(expr)) => optimize_expr(expr, unit, settings, inline_depth)?,
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
    }
    Ok(())
}

fn prune_if(stmt: &mut Stmt) {
    let StmtKind::If {
        cond,
        then_branch,
        else_branch,
    } = &mut stmt.kind
    else {
        return;
    };
    let keep_then = match cond.kind {
        ExprKind::BoolLit(v) => v,
        _ => return,
    };
    trace!(keep_then, "pruning constant branch");
    let replacement = if keep_then {
        std::mem::replace(&mut **then_branch, Stmt::new(stmt.id, stmt.span, StmtKind::Block(Vec::new())))
    } else {
        match else_branch.take() {
            Some(b) => *b,
            None => Stmt::new(stmt.id, stmt.span, StmtKind::Block(Vec::new())),
        }
    };
    *stmt = replacement;
}

fn optimize_expr(
    expr: &mut Expr,
    unit: &mut CompilationUnit,
    settings: &CompilerSettings,
    inline_depth: u32,
) -> Result<()> {
    // Children first, so folding sees already-folded operands.
    for child in child_exprs(expr) {
        optimize_expr(child, unit, settings, inline_depth)?;
    }

    let flags = settings.optimizations;
    if flags.contains(OptimizationFlags::INLINING) {
        try_inline_user_call(expr, unit, settings, inline_depth)?;
    }
    if flags.contains(OptimizationFlags::CONSTANT_FOLDING) {
        fold_one(expr, unit, true);
    }
    if flags.contains(OptimizationFlags::SIMPLIFICATION) {
        simplify(expr, unit);
    }
    Ok(())
}

pub(crate) fn child_exprs(expr: &mut Expr) -> Vec<&mut Expr> {
    match &mut expr.kind {
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::DoubleLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::Symbol { .. } => Vec::new(),
        ExprKind::Unary { operand, .. } => vec![operand],
        ExprKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
        ExprKind::Ternary {
            cond,
            then_value,
            else_value,
        } => vec![cond, then_value, else_value],
        ExprKind::Assign { target, value, .. } => vec![target, value],
        ExprKind::IncDec { target, .. } => vec![target],
        ExprKind::Call { callee, args, .. } => {
            let mut children: Vec<&mut Expr> = Vec::with_capacity(args.len() + 1);
            if let ExprKind::Member { base, .. } = &mut callee.kind {
                children.push(base);
            }
            children.extend(args.iter_mut());
            children
        }
        ExprKind::Member { base, .. } => vec![base],
        ExprKind::Index { base, index } => vec![base, index],
        ExprKind::Cast { expr: inner, .. } => vec![inner],
        ExprKind::InitList(values) => values.iter_mut().collect(),
    }
}

fn fold_stmt(stmt: &mut Stmt, unit: &mut CompilationUnit, resolved: bool) {
    match &mut stmt.kind {
        StmtKind::Block(stmts) => {
            for s in stmts {
                fold_stmt(s, unit, resolved);
            }
        }
        StmtKind::VarDecl { init, .. } => {
            if let Some(init) = init {
                fold_expr(init, unit, resolved);
            }
        }
        StmtKind::Expr(expr) => fold_expr(expr, unit, resolved),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            fold_expr(cond, unit, resolved);
            fold_stmt(then_branch, unit, resolved);
            if let Some(else_branch) = else_branch {
                fold_stmt(else_branch, unit, resolved);
            }
        }
        StmtKind::While { cond, body } => {
            fold_expr(cond, unit, resolved);
            fold_stmt(body, unit, resolved);
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            if let Some(init) = init {
                fold_stmt(init, unit, resolved);
            }
            if let Some(cond) = cond {
                fold_expr(cond, unit, resolved);
            }
            if let Some(step) = step {
                fold_expr(step, unit, resolved);
            }
            fold_stmt(body, unit, resolved);
        }
        StmtKind::Return(Some(expr)) => fold_expr(expr, unit, resolved),
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
    }
}

fn fold_expr(expr: &mut Expr, unit: &mut CompilationUnit, resolved: bool) {
    for child in child_exprs(expr) {
        fold_expr(child, unit, resolved);
    }
    fold_one(expr, unit, resolved);
}

/// Replace this node with a literal if it folds. Skips nodes that are
/// already literals and anything with side effects.
fn fold_one(expr: &mut Expr, unit: &mut CompilationUnit, resolved: bool) {
    if matches!(
        expr.kind,
        ExprKind::IntLit(_)
            | ExprKind::FloatLit(_)
            | ExprKind::DoubleLit(_)
            | ExprKind::BoolLit(_)
    ) {
        return;
    }
    // Only fold value-producing pure nodes.
    if !matches!(
        expr.kind,
        ExprKind::Unary { .. } | ExprKind::Binary { .. } | ExprKind::Ternary { .. } | ExprKind::Symbol { .. }
    ) {
        return;
    }
    let folded = if resolved {
        const_eval_resolved(expr, unit)
    } else {
        const_eval_literal(expr)
    };
    let Some(folded) = folded else { return };
    let (kind, ty) = match folded {
        Folded::Int(v) => (ExprKind::IntLit(v), TypeInfo::INT),
        Folded::Float(v) => (ExprKind::FloatLit(v), TypeInfo::FLOAT),
        Folded::Double(v) => (ExprKind::DoubleLit(v), TypeInfo::DOUBLE),
        Folded::Bool(v) => (ExprKind::BoolLit(v), TypeInfo::BOOL),
    };
    expr.kind = kind;
    if resolved {
        unit.set_type(expr.id, ty);
    }
}

/// Algebraic identities that keep the checked type: `x*1`, `x/1`,
/// `x+0`, `x-0`.
fn simplify(expr: &mut Expr, unit: &mut CompilationUnit) {
    let ExprKind::Binary { op, lhs, rhs } = &mut expr.kind else {
        return;
    };
    let expr_ty = unit.type_of(expr.id);

    let keep_lhs = match op {
        BinaryOp::Mul | BinaryOp::Div => is_literal_one(rhs),
        BinaryOp::Add | BinaryOp::Sub => is_literal_zero(rhs),
        _ => false,
    };
    let keep_rhs = match op {
        BinaryOp::Mul => is_literal_one(lhs),
        BinaryOp::Add => is_literal_zero(lhs),
        _ => false,
    };

    if keep_lhs && unit.type_of(lhs.id) == expr_ty {
        let kept = std::mem::replace(&mut **lhs, Expr::new(expr.id, expr.span, ExprKind::BoolLit(false)));
        *expr = kept;
    } else if keep_rhs && unit.type_of(rhs.id) == expr_ty {
        let kept = std::mem::replace(&mut **rhs, Expr::new(expr.id, expr.span, ExprKind::BoolLit(false)));
        *expr = kept;
    }
}

fn is_literal_one(expr: &Expr) -> bool {
    match expr.kind {
        ExprKind::IntLit(v) => v == 1,
        ExprKind::FloatLit(v) => v == 1.0,
        ExprKind::DoubleLit(v) => v == 1.0,
        _ => false,
    }
}

fn is_literal_zero(expr: &Expr) -> bool {
    match expr.kind {
        ExprKind::IntLit(v) => v == 0,
        ExprKind::FloatLit(v) => v == 0.0,
        ExprKind::DoubleLit(v) => v == 0.0,
        _ => false,
    }
}

/// Inline calls to trivial free functions: a body of exactly
/// `{ return expr; }` whose expression only touches parameters, globals
/// and constants.
fn try_inline_user_call(
    expr: &mut Expr,
    unit: &mut CompilationUnit,
    settings: &CompilerSettings,
    inline_depth: u32,
) -> Result<()> {
    if inline_depth >= settings.max_inline_depth {
        // User-function inlining is best-effort; depth exhaustion just
        // leaves the call in place.
        return Ok(());
    }
    let ExprKind::Call { args, .. } = &expr.kind else {
        return Ok(());
    };
    let Some(SymbolRef::Function(fid)) = unit.refs.get(&expr.id) else {
        return Ok(());
    };
    let fid = *fid;
    let spec = unit.functions.get(fid);
    if !matches!(spec.data.kind, FunctionKind::Source)
        || spec.data.owner.is_some()
        || spec.data.inliner.is_some()
    {
        return Ok(());
    }
    let Some(template) = inlinable_return(spec, unit) else {
        return Ok(());
    };
    let param_count = spec.data.params.len();
    trace!(function = %spec.data.id, "inlining trivial call");

    let args = args.clone();
    debug_assert_eq!(args.len(), param_count);
    let mut inlined = clone_renumbered(&template, unit);
    substitute_params(&mut inlined, unit, &args);
    // The call's checked type is authoritative for the surrounding
    // tree; the body's return expression was already cast to it.
    let call_ty = unit.type_of(expr.id);
    *expr = inlined;
    if let Some(ty) = call_ty {
        unit.set_type(expr.id, ty);
    }
    // Expand transitively, bounded by the inline depth.
    optimize_expr(expr, unit, settings, inline_depth + 1)
}

/// The single returned expression of a `{ return expr; }` body, if the
/// body qualifies for substitution.
fn inlinable_return(
    spec: &crate::function_table::FunctionSpec,
    unit: &CompilationUnit,
) -> Option<Expr> {
    let body = spec.body.as_ref()?;
    let StmtKind::Block(stmts) = &body.stmt.kind else {
        return None;
    };
    let [single] = stmts.as_slice() else {
        return None;
    };
    let StmtKind::Return(Some(value)) = &single.kind else {
        return None;
    };
    all_refs_substitutable(value, unit, spec.data.params.len()).then(|| value.clone())
}

fn all_refs_substitutable(expr: &Expr, unit: &CompilationUnit, param_count: usize) -> bool {
    let ok = match &expr.kind {
        ExprKind::Symbol { .. } => match unit.refs.get(&expr.id) {
            Some(SymbolRef::Local(index)) => *index < param_count,
            Some(
                SymbolRef::Global(_) | SymbolRef::Const(_) | SymbolRef::Function(_),
            ) => true,
            _ => false,
        },
        // Assignments and increments would duplicate side effects.
        ExprKind::Assign { .. } | ExprKind::IncDec { .. } => false,
        _ => true,
    };
    ok && child_exprs_ref(expr)
        .into_iter()
        .all(|child| all_refs_substitutable(child, unit, param_count))
}

fn child_exprs_ref(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::DoubleLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::Symbol { .. } => Vec::new(),
        ExprKind::Unary { operand, .. } => vec![operand],
        ExprKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
        ExprKind::Ternary {
            cond,
            then_value,
            else_value,
        } => vec![cond, then_value, else_value],
        ExprKind::Assign { target, value, .. } => vec![target, value],
        ExprKind::IncDec { target, .. } => vec![target],
        ExprKind::Call { callee, args, .. } => {
            let mut children: Vec<&Expr> = Vec::with_capacity(args.len() + 1);
            if let ExprKind::Member { base, .. } = &callee.kind {
                children.push(base);
            }
            children.extend(args.iter());
            children
        }
        ExprKind::Member { base, .. } => vec![base],
        ExprKind::Index { base, index } => vec![base, index],
        ExprKind::Cast { expr: inner, .. } => vec![inner],
        ExprKind::InitList(values) => values.iter().collect(),
    }
}

fn substitute_params(expr: &mut Expr, unit: &mut CompilationUnit, args: &[Expr]) {
    if let ExprKind::Symbol { .. } = expr.kind {
        if let Some(SymbolRef::Local(index)) = unit.refs.get(&expr.id) {
            let index = *index;
            if let Some(arg) = args.get(index) {
                *expr = clone_renumbered(arg, unit);
            }
            return;
        }
    }
    for child in child_exprs(expr) {
        substitute_params(child, unit, args);
    }
}
