//! Resolving syntactic types into `TypeInfo`.
//!
//! Shared by complex-type parsing, data allocation, template
//! instantiation and the type checker. A [`TemplateEnv`] carries the
//! parameter bindings of the body being processed, so the same code path
//! resolves both plain and instantiated types.

use rustc_hash::FxHashMap;
use sono_diagnostic::{Error, Result};
use sono_ir::{
    NamespacedIdentifier, ParsedConst, ParsedTemplateArg, ParsedType, ParsedTypeKind,
    ScalarKeyword, Span,
};
use sono_resolve::{ConstValue, Policy, SymbolKind};
use sono_types::{Modifiers, ScalarType, TemplateArg, TypeInfo, TypeKey};

use crate::{CompilationUnit, CompilerContext};

/// One template parameter binding.
#[derive(Clone, Debug)]
pub enum TemplateBinding {
    Type(TypeInfo),
    Const(i64),
}

/// Bindings for the template parameters in scope, empty outside
/// instantiated bodies.
#[derive(Clone, Debug, Default)]
pub struct TemplateEnv {
    map: FxHashMap<String, TemplateBinding>,
}

impl TemplateEnv {
    pub fn new() -> Self {
        TemplateEnv::default()
    }

    pub fn bind_type(&mut self, name: impl Into<String>, ty: TypeInfo) {
        self.map.insert(name.into(), TemplateBinding::Type(ty));
    }

    pub fn bind_const(&mut self, name: impl Into<String>, value: i64) {
        self.map.insert(name.into(), TemplateBinding::Const(value));
    }

    pub fn get(&self, name: &str) -> Option<&TemplateBinding> {
        self.map.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn scalar_type(keyword: ScalarKeyword) -> ScalarType {
    match keyword {
        ScalarKeyword::Int => ScalarType::Int,
        ScalarKeyword::Float => ScalarType::Float,
        ScalarKeyword::Double => ScalarType::Double,
        ScalarKeyword::Bool => ScalarType::Bool,
        ScalarKeyword::Void => ScalarType::Void,
    }
}

/// Resolve a constant position (span length, template argument).
pub fn resolve_const(
    ctx: &CompilerContext,
    parsed: &ParsedConst,
    env: &TemplateEnv,
    from: &NamespacedIdentifier,
    span: Span,
) -> Result<i64> {
    match parsed {
        ParsedConst::Lit(v) => Ok(*v),
        ParsedConst::Param(name) => {
            if let Some(TemplateBinding::Const(v)) = env.get(name) {
                return Ok(*v);
            }
            let path = NamespacedIdentifier::from_segment(name.clone());
            let symbol = ctx
                .handler
                .resolve(&path, false, from, Policy::MustExist, span)?;
            match symbol.and_then(|s| s.const_value) {
                Some(ConstValue::Int(v)) => Ok(v),
                _ => Err(Error::compile(
                    format!("'{name}' is not an integer constant"),
                    span,
                )),
            }
        }
    }
}

/// Resolve the written template arguments of a type or call.
///
/// A bare identifier argument may name a type or a constant; the symbol
/// decides.
pub fn resolve_template_args(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    args: &[ParsedTemplateArg],
    env: &TemplateEnv,
    from: &NamespacedIdentifier,
    span: Span,
    depth: u32,
) -> Result<Vec<TemplateArg>> {
    args.iter()
        .map(|arg| match arg {
            ParsedTemplateArg::Const(c) => {
                Ok(TemplateArg::Const(resolve_const(ctx, c, env, from, span)?))
            }
            ParsedTemplateArg::Type(t) => {
                // A bare name may bind to a template constant or a
                // const global instead of a type.
                if let ParsedTypeKind::Named { path, template_args } = &t.kind {
                    if template_args.is_empty() && !t.is_ref && !t.is_const {
                        if let Some(name) = path.last() {
                            if !path.is_qualified() {
                                if let Some(TemplateBinding::Const(v)) = env.get(name) {
                                    return Ok(TemplateArg::Const(*v));
                                }
                            }
                            let symbol = ctx.handler.resolve(
                                path,
                                false,
                                from,
                                Policy::CanExist,
                                t.span,
                            )?;
                            if let Some(symbol) = symbol {
                                if symbol.kind == SymbolKind::Constant {
                                    if let Some(ConstValue::Int(v)) = symbol.const_value {
                                        return Ok(TemplateArg::Const(v));
                                    }
                                }
                            }
                        }
                    }
                }
                Ok(TemplateArg::Type(resolve_type(ctx, unit, t, env, from, depth)?))
            }
        })
        .collect()
}

/// Resolve one syntactic type.
///
/// `depth` bounds transitive template instantiation; the frontend
/// threads the configured limit through.
pub fn resolve_type(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    parsed: &ParsedType,
    env: &TemplateEnv,
    from: &NamespacedIdentifier,
    depth: u32,
) -> Result<TypeInfo> {
    let mut ty = match &parsed.kind {
        ParsedTypeKind::Scalar(keyword) => TypeInfo::scalar(scalar_type(*keyword)),
        ParsedTypeKind::Span { elem, len } => {
            let elem_ty = resolve_type(ctx, unit, elem, env, from, depth)?;
            if elem_ty.is_void() {
                return Err(Error::compile("span elements cannot be 'void'", parsed.span));
            }
            let len = resolve_const(ctx, len, env, from, parsed.span)?;
            let len = u32::try_from(len).map_err(|_| {
                Error::compile(format!("span length {len} is not a positive integer"), parsed.span)
            })?;
            if len == 0 {
                return Err(Error::compile("span length must be non-zero", parsed.span));
            }
            TypeInfo::complex(ctx.registry.span_type(elem_ty, len))
        }
        ParsedTypeKind::Named {
            path,
            template_args,
        } => resolve_named(ctx, unit, parsed, path, template_args, env, from, depth)?,
    };

    if parsed.is_const {
        ty = ty.with(Modifiers::CONST);
    }
    if parsed.is_ref {
        ty = ty.with(Modifiers::REF);
    }
    Ok(ty)
}

fn resolve_named(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    parsed: &ParsedType,
    path: &NamespacedIdentifier,
    template_args: &[ParsedTemplateArg],
    env: &TemplateEnv,
    from: &NamespacedIdentifier,
    depth: u32,
) -> Result<TypeInfo> {
    // Template parameter names shadow everything else.
    if template_args.is_empty() && !path.is_qualified() {
        if let Some(name) = path.last() {
            match env.get(name) {
                Some(TemplateBinding::Type(ty)) => return Ok(*ty),
                Some(TemplateBinding::Const(_)) => {
                    return Err(Error::compile(
                        format!("constant parameter '{name}' used as a type"),
                        parsed.span,
                    ));
                }
                None => {}
            }
        }
    }

    let explicit = path.is_qualified();
    let symbol = ctx
        .handler
        .resolve(path, explicit, from, Policy::MustExist, parsed.span)?
        .cloned();
    let Some(symbol) = symbol else {
        return Err(Error::unresolved(path.to_string(), parsed.span));
    };

    match symbol.kind {
        SymbolKind::Struct => {
            if !template_args.is_empty() {
                return Err(Error::compile(
                    format!("'{}' is not a template", symbol.id),
                    parsed.span,
                ));
            }
            symbol.ty.complex_id().map(TypeInfo::complex).ok_or_else(|| {
                Error::compile(
                    format!("struct '{}' has no registered layout yet", symbol.id),
                    parsed.span,
                )
            })
        }
        SymbolKind::TemplateStruct => {
            let args =
                resolve_template_args(ctx, unit, template_args, env, from, parsed.span, depth)?;
            let id = crate::template_inst::instantiate_struct(
                ctx,
                unit,
                &symbol.id,
                args,
                parsed.span,
                depth,
            )?;
            Ok(TypeInfo::complex(id))
        }
        other => Err(Error::type_mismatch(
            "a type name",
            format!("{other:?} '{}'", symbol.id),
            parsed.span,
        )),
    }
}

/// Key under which a struct's layout is registered.
pub fn struct_key(id: &NamespacedIdentifier, args: &[TemplateArg]) -> TypeKey {
    if args.is_empty() {
        TypeKey::plain(id.clone())
    } else {
        TypeKey::with_args(id.clone(), args.to_vec())
    }
}
