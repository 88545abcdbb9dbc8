//! Template instantiation.
//!
//! Blueprints are stored as parsed; instantiating one clones the
//! blueprint, binds its parameters and runs the cloned body through the
//! same registration, resolution and checking code every other function
//! uses. Instantiation is memoized on (template id, argument list);
//! the second request with the same arguments observes the first
//! result, never a duplicate.

use sono_diagnostic::{Error, Result};
use sono_ir::{NamespacedIdentifier, Span, TemplateParamDecl};
use sono_resolve::{Instantiation, InstantiationKey, TemplateKind};
use sono_types::{ComplexTypeId, TemplateArg};
use tracing::{debug, trace};

use crate::complex_parse::{register_function, register_struct_with};
use crate::function_table::mangle;
use crate::type_resolution::TemplateEnv;
use crate::unit::SymbolRef;
use crate::{CompilationUnit, CompilerContext, CompilerSettings, FuncId};

/// Bind declared template parameters to resolved arguments.
pub fn bind_params(
    params: &[TemplateParamDecl],
    args: &[TemplateArg],
    span: Span,
) -> Result<TemplateEnv> {
    if params.len() != args.len() {
        return Err(Error::type_mismatch(
            format!("{} template arguments", params.len()),
            format!("{}", args.len()),
            span,
        ));
    }
    let mut env = TemplateEnv::new();
    for (param, arg) in params.iter().zip(args) {
        match (param, arg) {
            (TemplateParamDecl::Type { name }, TemplateArg::Type(ty)) => {
                env.bind_type(name.clone(), *ty);
            }
            (TemplateParamDecl::Const { name }, TemplateArg::Const(value)) => {
                env.bind_const(name.clone(), *value);
            }
            (TemplateParamDecl::Type { name }, TemplateArg::Const(_)) => {
                return Err(Error::type_mismatch(
                    format!("a type for parameter '{name}'"),
                    "a constant",
                    span,
                ));
            }
            (TemplateParamDecl::Const { name }, TemplateArg::Type(_)) => {
                return Err(Error::type_mismatch(
                    format!("a constant for parameter '{name}'"),
                    "a type",
                    span,
                ));
            }
        }
    }
    Ok(env)
}

/// Instantiate a struct template (memoized).
pub fn instantiate_struct(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    template_id: &NamespacedIdentifier,
    args: Vec<TemplateArg>,
    span: Span,
    depth: u32,
) -> Result<ComplexTypeId> {
    let key = InstantiationKey {
        template: template_id.clone(),
        args: args.clone(),
    };
    if let Some(Instantiation::Struct(id)) = ctx.handler.instantiation(&key) {
        return Ok(*id);
    }
    if depth == 0 {
        return Err(Error::compile(
            format!("template instantiation depth exceeded at '{template_id}'"),
            span,
        ));
    }

    let decl = ctx
        .handler
        .template(template_id)
        .cloned()
        .ok_or_else(|| Error::unresolved(template_id.to_string(), span))?;
    let TemplateKind::Struct(mut def) = decl.kind else {
        return Err(Error::type_mismatch(
            "a struct template",
            format!("function template '{template_id}'"),
            span,
        ));
    };
    let env = bind_params(&decl.params, &args, span)?;
    debug!(template = %template_id, args = args.len(), "instantiating struct template");

    // Every instantiation clones the blueprint; nodes need fresh
    // identities so side tables never collide across instantiations.
    for method in &mut def.methods {
        crate::rewrite::renumber_stmt_fresh(&mut method.body, &mut unit.ids);
    }
    for member in &mut def.members {
        if let Some(init) = &mut member.init {
            crate::rewrite::renumber_expr_fresh(init, &mut unit.ids);
        }
    }

    let id = register_struct_with(ctx, unit, def, &decl.owner, &env, &args, depth - 1)?;
    ctx.handler
        .record_instantiation(key, Instantiation::Struct(id));
    Ok(id)
}

/// Instantiate a function template (memoized). The new function's body
/// still needs resolution and type checking; the stage driver below
/// picks it up.
pub fn instantiate_function(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    template_id: &NamespacedIdentifier,
    args: Vec<TemplateArg>,
    span: Span,
    depth: u32,
) -> Result<FuncId> {
    let key = InstantiationKey {
        template: template_id.clone(),
        args: args.clone(),
    };
    if let Some(Instantiation::Function(concrete)) = ctx.handler.instantiation(&key) {
        if let Some(existing) = unit.functions.lookup(concrete) {
            return Ok(existing);
        }
    }
    if depth == 0 {
        return Err(Error::compile(
            format!("template instantiation depth exceeded at '{template_id}'"),
            span,
        ));
    }

    let decl = ctx
        .handler
        .template(template_id)
        .cloned()
        .ok_or_else(|| Error::unresolved(template_id.to_string(), span))?;
    let TemplateKind::Function(mut def) = decl.kind else {
        return Err(Error::type_mismatch(
            "a function template",
            format!("struct template '{template_id}'"),
            span,
        ));
    };
    let env = bind_params(&decl.params, &args, span)?;
    debug!(template = %template_id, args = args.len(), "instantiating function template");

    crate::rewrite::renumber_stmt_fresh(&mut def.body, &mut unit.ids);

    // Concrete functions get the mangled name as their identity, so
    // distinct instantiations never collide in the function table.
    let mangled = mangle(template_id, &args);
    def.name = mangled
        .rsplit("::")
        .next()
        .unwrap_or(&mangled)
        .to_owned();
    def.template = None;

    let id = register_function(
        ctx,
        unit,
        def,
        &decl.owner,
        None,
        env,
        Some(mangled),
        depth - 1,
    )?;
    ctx.handler.record_instantiation(
        key,
        Instantiation::Function(unit.functions.get(id).data.id.clone()),
    );
    Ok(id)
}

/// FunctionTemplateParsing: drain the pending-instantiation queue,
/// processing each newly created body through resolution, checking and
/// optimization until the queue runs dry.
pub fn run_stage(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    settings: &CompilerSettings,
) -> Result<()> {
    let mut processed = count_processed(unit);
    let mut rounds = 0u32;

    // Instantiation can add both pending call sites and fresh bodies
    // (struct-template methods); loop until neither remains.
    while !unit.pending_templates.is_empty() || processed < unit.functions.len() {
        rounds += 1;
        if rounds > settings.max_template_depth {
            return Err(Error::compile(
                "template instantiation did not converge",
                Span::DUMMY,
            ));
        }

        let pending = std::mem::take(&mut unit.pending_templates);
        for (call_node, call_span, template_id, args) in pending {
            let id = instantiate_function(
                ctx,
                unit,
                &template_id,
                args,
                call_span,
                settings.max_template_depth,
            )?;
            unit.refs.insert(call_node, SymbolRef::Function(id));
        }

        // New bodies go through the same stages the rest of the unit
        // already passed. They may enqueue further instantiations.
        let total = unit.functions.len();
        for index in processed..total {
            let id = FuncId::from_index(index);
            crate::resolve_pass::resolve_function(ctx, unit, id, settings.max_template_depth)?;
            crate::typecheck::typecheck_function(ctx, unit, id, settings.max_template_depth)?;
        }
        crate::optimize::post_symbol(unit, settings)?;
        processed = total;
    }
    trace!(functions = unit.functions.len(), "template queue drained");
    Ok(())
}

fn count_processed(unit: &CompilationUnit) -> usize {
    unit.functions.len()
}
