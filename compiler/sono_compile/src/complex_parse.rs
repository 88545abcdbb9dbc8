//! ComplexTypeParsing: register struct layouts and function signatures.
//!
//! Walks the parsed items, registers every non-template struct with the
//! type registry, resolves every non-template function signature, and
//! moves function bodies (free functions and methods alike) into the
//! function table. Template blueprints stay with the namespace handler
//! untouched; they only materialize at instantiation.

use sono_diagnostic::{Error, Result};
use sono_ir::{FunctionDef, Item, NamespacedIdentifier, StructDef};
use sono_types::{ComplexTypeId, TypeInfo};
use tracing::trace;

use crate::function_table::{mangle, FunctionBody, FunctionData, FunctionKind, FunctionSpec, LocalDecl};
use crate::type_resolution::{resolve_type, TemplateEnv};
use crate::{CompilationUnit, CompilerContext};

pub fn run(ctx: &mut CompilerContext, unit: &mut CompilationUnit, depth: u32) -> Result<()> {
    let items = std::mem::take(&mut unit.tree.items);
    let root = NamespacedIdentifier::root();
    unit.tree.items = collect(ctx, unit, items, &root, depth)?;
    Ok(())
}

fn collect(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    items: Vec<Item>,
    ns: &NamespacedIdentifier,
    depth: u32,
) -> Result<Vec<Item>> {
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Item::Function(def) => {
                if def.template.is_none() {
                    register_function(ctx, unit, def, ns, None, TemplateEnv::new(), None, depth)?;
                }
                // Template blueprints already live with the handler.
            }
            Item::Struct(def) => {
                if def.template.is_none() {
                    register_struct(ctx, unit, def, ns, depth)?;
                }
            }
            Item::Namespace { name, items, span } => {
                let inner = ns.child(&name);
                let remaining = collect(ctx, unit, items, &inner, depth)?;
                kept.push(Item::Namespace {
                    name,
                    items: remaining,
                    span,
                });
            }
            other @ (Item::GlobalVar { .. } | Item::UsingNamespace { .. }) => kept.push(other),
        }
    }
    Ok(kept)
}

/// Register a struct's layout and move its methods into the function
/// table. Also used for template instantiations, which pass the
/// parameter bindings and a mangled name suffix.
pub fn register_struct_with(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    def: StructDef,
    ns: &NamespacedIdentifier,
    env: &TemplateEnv,
    args: &[sono_types::TemplateArg],
    depth: u32,
) -> Result<ComplexTypeId> {
    let struct_path = ns.child(&def.name);
    let mut members = Vec::with_capacity(def.members.len());
    for member in &def.members {
        let ty = resolve_type(ctx, unit, &member.ty, env, &struct_path, depth)?;
        if ty.is_void() || ty.is_ref() {
            return Err(Error::compile(
                format!("member '{}' must have a sized value type", member.name),
                member.span,
            ));
        }
        members.push((member.name.clone(), ty, member.visibility));
    }

    let key = crate::type_resolution::struct_key(&struct_path, args);
    let id = ctx.registry.register_struct(key, members, def.span)?;
    trace!(name = %struct_path, "registered struct");

    // Member default initializers must fold at compile time; they seed
    // the data image for globals of this type.
    let mut defaults = Vec::new();
    for member in &def.members {
        let Some(init) = &member.init else { continue };
        let Some(folded) = crate::const_eval::const_eval_literal(init) else {
            return Err(Error::compile(
                format!(
                    "default value of member '{}' must be a compile-time constant",
                    member.name
                ),
                init.span,
            ));
        };
        if let Some(info) = ctx.registry.get(id).member(&member.name) {
            defaults.push((info.offset, folded));
        }
    }
    if !defaults.is_empty() {
        unit.member_defaults.insert(id, defaults);
    }

    // Patch the symbol and member types registered during parsing.
    // Instantiated templates keep their blueprint symbol untouched; the
    // memo table is their identity.
    if args.is_empty() {
        ctx.handler
            .set_symbol_type(&struct_path, TypeInfo::complex(id));
        let member_types: Vec<(NamespacedIdentifier, TypeInfo)> = ctx
            .registry
            .get(id)
            .members()
            .iter()
            .map(|m| (struct_path.child(&m.name), m.ty))
            .collect();
        for (member_id, ty) in member_types {
            ctx.handler.set_symbol_type(&member_id, ty);
        }
    }

    for method in def.methods {
        let mangled = if args.is_empty() {
            None
        } else {
            Some(format!("{}::{}", mangle(&struct_path, args), method.name))
        };
        register_function(
            ctx,
            unit,
            method,
            &struct_path,
            Some(id),
            env.clone(),
            mangled,
            depth,
        )?;
    }

    Ok(id)
}

fn register_struct(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    def: StructDef,
    ns: &NamespacedIdentifier,
    depth: u32,
) -> Result<ComplexTypeId> {
    register_struct_with(ctx, unit, def, ns, &TemplateEnv::new(), &[], depth)
}

/// Resolve a function's signature and add it (body included) to the
/// function table.
#[allow(clippy::too_many_arguments)]
pub fn register_function(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    def: FunctionDef,
    ns: &NamespacedIdentifier,
    owner: Option<ComplexTypeId>,
    env: TemplateEnv,
    mangled: Option<String>,
    depth: u32,
) -> Result<crate::FuncId> {
    let path = ns.child(&def.name);
    let ret = resolve_type(ctx, unit, &def.ret, &env, ns, depth)?;
    if ret.complex_id().is_some() || ret.is_ref() {
        return Err(Error::compile(
            "functions return scalar values only",
            def.span,
        ));
    }

    let mut params = Vec::with_capacity(def.params.len());
    let mut locals = Vec::with_capacity(def.params.len());
    for param in &def.params {
        let ty = resolve_type(ctx, unit, &param.ty, &env, ns, depth)?;
        if ty.is_void() {
            return Err(Error::compile(
                format!("parameter '{}' cannot be 'void'", param.name),
                param.span,
            ));
        }
        if ty.complex_id().is_some() && !ty.is_ref() {
            return Err(Error::type_mismatch(
                format!("{}&", ctx.registry.describe(&ty)),
                ctx.registry.describe(&ty),
                param.span,
            ));
        }
        if ty.is_ref() && ty.complex_id().is_none() {
            // Scalars travel in registers; only aggregates bind by
            // reference.
            return Err(Error::compile(
                format!("scalar parameter '{}' is passed by value", param.name),
                param.span,
            ));
        }
        params.push((param.name.clone(), ty));
        locals.push(LocalDecl {
            name: param.name.clone(),
            ty,
        });
    }

    let mangled = mangled.unwrap_or_else(|| path.to_string());
    let spec = FunctionSpec {
        data: FunctionData {
            id: path.clone(),
            mangled,
            params,
            ret,
            owner,
            scope: path.parent(),
            visibility: def.visibility,
            kind: FunctionKind::Source,
            inliner: None,
        },
        body: Some(FunctionBody {
            stmt: def.body,
            locals,
            env,
        }),
    };
    trace!(name = %path, "registered function");
    Ok(unit.functions.insert(spec))
}
