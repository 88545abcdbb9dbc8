//! The pipeline driver for stages one through ten, plus the inliner
//! expansion the backend invokes at the start of FunctionCompilation.
//!
//! Stages run in their fixed order; the first error halts everything,
//! so no later stage ever sees a tree that failed an earlier one.
//! [`check_unit`] is the editor-time short circuit: it stops after
//! TypeCheck and produces no code.

use sono_diagnostic::{Error, Result};
use sono_ir::{Expr, ExprKind, ParsedType, ScalarKeyword, Stmt, StmtKind};
use sono_lexer::Definitions;
use sono_types::{implicit_convertible, ScalarType, TypeInfo};
use tracing::{debug, debug_span};

use crate::function_table::{FunctionData, FunctionKind, LocalDecl};
use crate::inliner::{InlineData, Inliner};
use crate::optimize::child_exprs;
use crate::rewrite::clone_renumbered;
use crate::settings::OptimizationFlags;
use crate::type_resolution::TemplateEnv;
use crate::unit::SymbolRef;
use crate::{
    complex_parse, data, library, optimize, resolve_pass, template_inst, typecheck,
    CompilationUnit, CompilerContext, CompilerSettings, Pass,
};

/// Run stages 1–7 (through TypeCheck). The editor-time validation path.
pub fn check_unit(
    source: &str,
    definitions: &Definitions,
    settings: &CompilerSettings,
    ctx: &mut CompilerContext,
) -> Result<CompilationUnit> {
    stages_through_typecheck(source, definitions, settings, ctx)
}

/// Run stages 1–10. The returned unit is ready for the backend.
pub fn run_frontend(
    source: &str,
    definitions: &Definitions,
    settings: &CompilerSettings,
    ctx: &mut CompilerContext,
) -> Result<CompilationUnit> {
    let mut unit = stages_through_typecheck(source, definitions, settings, ctx)?;

    {
        let _s = debug_span!("pass", name = Pass::PostSymbolOptimization.name()).entered();
        optimize::post_symbol(&mut unit, settings)?;
    }
    {
        let _s = debug_span!("pass", name = Pass::FunctionTemplateParsing.name()).entered();
        template_inst::run_stage(ctx, &mut unit, settings)?;
    }
    {
        let _s = debug_span!("pass", name = Pass::FunctionParsing.name()).entered();
        finalize_functions(&unit)?;
    }
    Ok(unit)
}

fn stages_through_typecheck(
    source: &str,
    definitions: &Definitions,
    settings: &CompilerSettings,
    ctx: &mut CompilerContext,
) -> Result<CompilationUnit> {
    let depth = settings.max_template_depth;

    let mut unit = {
        let _s = debug_span!("pass", name = Pass::Parsing.name()).entered();
        let (text, tokens) = sono_lexer::lex(source, definitions)?;
        let mut unit = CompilationUnit::new(text);
        library::register(ctx, &mut unit)?;
        unit.tree = sono_parse::parse(&tokens, &mut ctx.handler, &mut unit.ids)?;
        unit
    };

    {
        let _s = debug_span!("pass", name = Pass::ComplexTypeParsing.name()).entered();
        complex_parse::run(ctx, &mut unit, depth)?;
    }
    {
        let _s = debug_span!("pass", name = Pass::DataAllocation.name()).entered();
        data::allocate(ctx, &mut unit, depth)?;
    }
    {
        let _s = debug_span!("pass", name = Pass::DataInitialisation.name()).entered();
        data::initialise(ctx, &mut unit)?;
    }
    {
        let _s = debug_span!("pass", name = Pass::PreSymbolOptimization.name()).entered();
        optimize::pre_symbol(&mut unit, settings)?;
    }
    let mut resolved_upto = 0;
    {
        let _s = debug_span!("pass", name = Pass::ResolvingSymbols.name()).entered();
        // Index-based: resolving a body can instantiate a struct
        // template and append its methods to the table.
        while resolved_upto < unit.functions.len() {
            let id = crate::FuncId::from_index(resolved_upto);
            resolve_pass::resolve_function(ctx, &mut unit, id, depth)?;
            resolved_upto += 1;
        }
        let mut ctor_inits = std::mem::take(&mut unit.data.ctor_inits);
        for (_, expr) in &mut ctor_inits {
            resolve_pass::resolve_ctor_expr(ctx, &mut unit, expr, depth)?;
        }
        unit.data.ctor_inits = ctor_inits;
    }
    {
        let _s = debug_span!("pass", name = Pass::TypeCheck.name()).entered();
        // Checking can still add bodies (a template signature naming a
        // struct template instantiates it); late arrivals get their
        // resolution here before checking.
        let mut index = 0;
        while index < unit.functions.len() {
            let id = crate::FuncId::from_index(index);
            if index >= resolved_upto {
                resolve_pass::resolve_function(ctx, &mut unit, id, depth)?;
                resolved_upto += 1;
            }
            typecheck::typecheck_function(ctx, &mut unit, id, depth)?;
            index += 1;
        }
        let mut ctor_inits = std::mem::take(&mut unit.data.ctor_inits);
        for (index, expr) in &mut ctor_inits {
            let expected = unit.data.entries[*index].ty;
            typecheck::typecheck_ctor_expr(ctx, &mut unit, expr, expected, depth)?;
        }
        unit.data.ctor_inits = ctor_inits;
    }
    debug!(functions = unit.functions.len(), "frontend checked unit");
    Ok(unit)
}

/// Stage 10: verify every function the backend will see is complete:
/// bodies present, signatures concrete and unique names, with no
/// instantiation left pending.
fn finalize_functions(unit: &CompilationUnit) -> Result<()> {
    if !unit.pending_templates.is_empty() {
        return Err(Error::compile(
            "unresolved template instantiations after template parsing",
            sono_ir::Span::DUMMY,
        ));
    }
    let mut seen = rustc_hash::FxHashSet::default();
    for id in unit.functions.ids() {
        let spec = unit.functions.get(id);
        if !seen.insert(spec.data.mangled.clone()) {
            return Err(Error::compile(
                format!("duplicate function symbol '{}'", spec.data.mangled),
                sono_ir::Span::DUMMY,
            ));
        }
        if matches!(spec.data.kind, FunctionKind::Source) && spec.body.is_none() {
            return Err(Error::compile(
                format!("function '{}' has no body", spec.data.id),
                sono_ir::Span::DUMMY,
            ));
        }
        let dynamic_param = spec.data.params.iter().any(|(_, ty)| ty.is_dynamic());
        if matches!(spec.data.kind, FunctionKind::Source)
            && (dynamic_param || spec.data.ret.is_dynamic())
        {
            return Err(Error::compile(
                format!("function '{}' has an unresolved signature", spec.data.id),
                sono_ir::Span::DUMMY,
            ));
        }
    }
    Ok(())
}

/// Expand high-level inliners through every body. Invoked by the
/// backend at the start of FunctionCompilation; the replacements
/// re-enter symbol resolution and type checking, so an inliner's output
/// can itself be inlined, bounded by the configured depth.
pub fn expand_inliners(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    settings: &CompilerSettings,
) -> Result<()> {
    if !settings.optimizations.contains(OptimizationFlags::INLINING) {
        return Ok(());
    }
    for id in unit.functions.ids().collect::<Vec<_>>() {
        let Some(mut body) = unit.functions.take_body(id) else {
            continue;
        };
        let data = unit.functions.get(id).data.clone();
        let locals = body.locals.clone();
        let env = body.env.clone();
        let result = expand_stmt(ctx, unit, &data, &locals, &env, &mut body.stmt, settings);
        unit.functions.restore_body(id, body);
        result?;
    }

    let data = resolve_pass::ctor_function_data();
    let mut ctor_inits = std::mem::take(&mut unit.data.ctor_inits);
    let mut result = Ok(());
    for (_, expr) in &mut ctor_inits {
        result = expand_expr(ctx, unit, &data, &[], &TemplateEnv::new(), expr, settings, 0);
        if result.is_err() {
            break;
        }
    }
    unit.data.ctor_inits = ctor_inits;
    result
}

#[allow(clippy::too_many_arguments)]
fn expand_stmt(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    data: &FunctionData,
    locals: &[LocalDecl],
    env: &TemplateEnv,
    stmt: &mut Stmt,
    settings: &CompilerSettings,
) -> Result<()> {
    match &mut stmt.kind {
        StmtKind::Block(stmts) => {
            for s in stmts {
                expand_stmt(ctx, unit, data, locals, env, s, settings)?;
            }
            Ok(())
        }
        StmtKind::VarDecl { init, .. } => match init {
            Some(init) => expand_expr(ctx, unit, data, locals, env, init, settings, 0),
            None => Ok(()),
        },
        StmtKind::Expr(expr) => expand_expr(ctx, unit, data, locals, env, expr, settings, 0),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            expand_expr(ctx, unit, data, locals, env, cond, settings, 0)?;
            expand_stmt(ctx, unit, data, locals, env, then_branch, settings)?;
            match else_branch {
                Some(else_branch) => {
                    expand_stmt(ctx, unit, data, locals, env, else_branch, settings)
                }
                None => Ok(()),
            }
        }
        StmtKind::While { cond, body } => {
            expand_expr(ctx, unit, data, locals, env, cond, settings, 0)?;
            expand_stmt(ctx, unit, data, locals, env, body, settings)
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            if let Some(init) = init {
                expand_stmt(ctx, unit, data, locals, env, init, settings)?;
            }
            if let Some(cond) = cond {
                expand_expr(ctx, unit, data, locals, env, cond, settings, 0)?;
            }
            if let Some(step) = step {
                expand_expr(ctx, unit, data, locals, env, step, settings, 0)?;
            }
            expand_stmt(ctx, unit, data, locals, env, body, settings)
        }
        StmtKind::Return(Some(expr)) => {
            expand_expr(ctx, unit, data, locals, env, expr, settings, 0)
        }
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
fn expand_expr(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    data: &FunctionData,
    locals: &[LocalDecl],
    env: &TemplateEnv,
    expr: &mut Expr,
    settings: &CompilerSettings,
    depth: u32,
) -> Result<()> {
    for child in child_exprs(expr) {
        expand_expr(ctx, unit, data, locals, env, child, settings, depth)?;
    }

    if !matches!(expr.kind, ExprKind::Call { .. }) {
        return Ok(());
    }
    let Some(SymbolRef::Function(fid)) = unit.refs.get(&expr.id) else {
        return Ok(());
    };
    let fid = *fid;
    let spec = unit.functions.get(fid);
    let Some(Inliner::HighLevel(rewrite)) = &spec.data.inliner else {
        return Ok(());
    };
    let rewrite = *rewrite;
    let callee_id = spec.data.id.clone();

    if depth >= settings.max_inline_depth {
        return Err(Error::compile(
            format!(
                "inliner expansion exceeded depth {} at '{callee_id}'",
                settings.max_inline_depth
            ),
            expr.span,
        ));
    }

    let ExprKind::Call { args, .. } = &expr.kind else {
        return Ok(());
    };
    let args = args.clone();
    let cloned_args: Vec<Expr> = args.iter().map(|a| clone_renumbered(a, unit)).collect();

    let replacement = {
        let mut inline_data = InlineData {
            args: cloned_args,
            span: expr.span,
            ids: &mut unit.ids,
        };
        rewrite(&mut inline_data).map_err(|e| {
            Error::compile(format!("inliner for '{callee_id}' failed: {e}"), expr.span)
        })?
    };
    // Rewrites may use an argument more than once; renumbering here
    // gives every occurrence its own identity in the side tables.
    let mut replacement = clone_renumbered(&replacement, unit);

    resolve_pass::resolve_replacement(
        ctx,
        unit,
        data,
        locals,
        env,
        &mut replacement,
        settings.max_template_depth,
    )?;
    let replacement_ty = typecheck::typecheck_replacement(
        ctx,
        unit,
        data,
        locals,
        env,
        &mut replacement,
        settings.max_template_depth,
    )?;

    let original_ty = unit.type_of(expr.id);
    if let Some(original_ty) = original_ty {
        coerce_replacement(ctx, unit, &mut replacement, replacement_ty, original_ty)?;
    }

    *expr = replacement;
    // The expansion may contain further inlinable calls.
    expand_expr(ctx, unit, data, locals, env, expr, settings, depth + 1)
}

/// Keep the surrounding tree's typing stable: the replacement must end
/// up with the type the call had.
fn coerce_replacement(
    ctx: &CompilerContext,
    unit: &mut CompilationUnit,
    replacement: &mut Expr,
    actual: TypeInfo,
    target: TypeInfo,
) -> Result<()> {
    if actual.value_type() == target.value_type() {
        return Ok(());
    }
    if !implicit_convertible(actual, target) {
        return Err(Error::type_mismatch(
            ctx.registry.describe(&target),
            ctx.registry.describe(&actual),
            replacement.span,
        ));
    }
    let Some(scalar) = target.value_type().scalar_type() else {
        return Err(Error::type_mismatch(
            ctx.registry.describe(&target),
            ctx.registry.describe(&actual),
            replacement.span,
        ));
    };
    let keyword = match scalar {
        ScalarType::Int => ScalarKeyword::Int,
        ScalarType::Float => ScalarKeyword::Float,
        ScalarType::Double => ScalarKeyword::Double,
        ScalarType::Bool => ScalarKeyword::Bool,
        ScalarType::Void => ScalarKeyword::Void,
    };
    let span = replacement.span;
    let inner = std::mem::replace(
        replacement,
        Expr::new(unit.ids.next(), span, ExprKind::BoolLit(false)),
    );
    *replacement = Expr::new(
        unit.ids.next(),
        span,
        ExprKind::Cast {
            ty: ParsedType::scalar(keyword, span),
            expr: Box::new(inner),
        },
    );
    unit.set_type(replacement.id, target.value_type());
    Ok(())
}
