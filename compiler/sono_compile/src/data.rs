//! DataAllocation and DataInitialisation: root-level storage.
//!
//! Allocation assigns every root variable an offset in the data block
//! (natural alignment, same rules as struct layout). Initialisation
//! folds constant initializers straight into the initial byte image;
//! whatever cannot fold is queued for the root constructor, which the
//! backend compiles and the pipeline runs once as its final stage.

use sono_diagnostic::{Error, Result};
use sono_ir::{Expr, ExprKind, Item, NamespacedIdentifier, Span};
use sono_resolve::{ConstValue, SymbolKind};
use sono_types::{ComplexTypeKind, ScalarType};
use tracing::trace;

use crate::const_eval::{const_eval_literal, Folded};
use crate::type_resolution::{resolve_type, TemplateEnv};
use crate::unit::GlobalEntry;
use crate::{CompilationUnit, CompilerContext};

fn round_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

/// Stage 3: compute the root data layout.
pub fn allocate(ctx: &mut CompilerContext, unit: &mut CompilationUnit, depth: u32) -> Result<()> {
    let mut cursor = 0u32;
    let mut max_align = 1u32;

    let items = std::mem::take(&mut unit.tree.items);
    let root = NamespacedIdentifier::root();
    allocate_items(ctx, unit, &items, &root, depth, &mut cursor, &mut max_align)?;
    unit.tree.items = items;

    let size = round_up(cursor, max_align);
    unit.data.image = vec![0u8; size as usize];
    unit.data.align = max_align;
    trace!(size, align = max_align, globals = unit.data.entries.len(), "root data laid out");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn allocate_items(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    items: &[Item],
    ns: &NamespacedIdentifier,
    depth: u32,
    cursor: &mut u32,
    max_align: &mut u32,
) -> Result<()> {
    for item in items {
        match item {
            Item::GlobalVar {
                name, ty, init, span, ..
            } => {
                let resolved = resolve_type(ctx, unit, ty, &TemplateEnv::new(), ns, depth)?;
                if resolved.is_void() || resolved.is_ref() {
                    return Err(Error::compile(
                        format!("'{name}' must have a sized value type"),
                        *span,
                    ));
                }
                let align = ctx.registry.align_of(&resolved);
                let size = ctx.registry.size_of(&resolved);
                *cursor = round_up(*cursor, align);
                *max_align = (*max_align).max(align);
                let offset = *cursor;
                *cursor += size;

                let id = ns.child(name);
                ctx.handler.set_symbol_type(&id, resolved);

                let is_const = ctx
                    .handler
                    .symbol(&id)
                    .is_some_and(|s| s.kind == SymbolKind::Constant);
                if is_const {
                    let value = init
                        .as_ref()
                        .and_then(const_eval_literal)
                        .ok_or_else(|| {
                            Error::compile(
                                format!("const '{name}' needs a compile-time constant initializer"),
                                *span,
                            )
                        })?;
                    let value = match value {
                        Folded::Int(v) => ConstValue::Int(i64::from(v)),
                        Folded::Float(v) => ConstValue::Float(f64::from(v)),
                        Folded::Double(v) => ConstValue::Float(v),
                        Folded::Bool(v) => ConstValue::Int(i64::from(v)),
                    };
                    ctx.handler.set_const_value(&id, value);
                }

                unit.data.entries.push(GlobalEntry {
                    id,
                    ty: resolved,
                    offset,
                    is_const,
                });
            }
            Item::Namespace { name, items, .. } => {
                let inner = ns.child(name);
                allocate_items(ctx, unit, items, &inner, depth, cursor, max_align)?;
            }
            Item::Function(_) | Item::Struct(_) | Item::UsingNamespace { .. } => {}
        }
    }
    Ok(())
}

/// Stage 4: fold constant initializers into the image; queue the rest
/// for the root constructor.
pub fn initialise(ctx: &mut CompilerContext, unit: &mut CompilationUnit) -> Result<()> {
    // Seed struct-typed globals with their member defaults first, so an
    // explicit initializer list can override them.
    for index in 0..unit.data.entries.len() {
        let entry = &unit.data.entries[index];
        let Some(complex) = entry.ty.complex_id() else { continue };
        let Some(defaults) = unit.member_defaults.get(&complex) else {
            continue;
        };
        let base = entry.offset;
        let writes: Vec<(u32, ScalarType, Folded)> = defaults
            .iter()
            .filter_map(|(offset, folded)| {
                let member_ty = ctx
                    .registry
                    .get(complex)
                    .members()
                    .iter()
                    .find(|m| m.offset == *offset)
                    .map(|m| m.ty)?;
                member_ty.scalar_type().map(|s| (base + *offset, s, *folded))
            })
            .collect();
        for (at, scalar, folded) in writes {
            write_scalar(&mut unit.data.image, at, scalar, folded, Span::DUMMY)?;
        }
    }

    let mut items = std::mem::take(&mut unit.tree.items);
    let mut global_index = 0usize;
    let result = initialise_items(ctx, unit, &mut items, &mut global_index);
    unit.tree.items = items;
    result
}

fn initialise_items(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    items: &mut [Item],
    global_index: &mut usize,
) -> Result<()> {
    for item in items {
        match item {
            Item::GlobalVar { init, span, .. } => {
                let index = *global_index;
                *global_index += 1;
                let Some(init_expr) = init.take() else { continue };
                let entry = unit.data.entries[index].clone();
                if try_fold_into_image(ctx, unit, &entry, &init_expr)? {
                    continue;
                }
                if entry.ty.complex_id().is_some() {
                    return Err(Error::compile(
                        "aggregate initializers must be compile-time constants",
                        *span,
                    ));
                }
                unit.data.ctor_inits.push((index, init_expr));
            }
            Item::Namespace { items, .. } => {
                initialise_items(ctx, unit, items, global_index)?;
            }
            Item::Function(_) | Item::Struct(_) | Item::UsingNamespace { .. } => {}
        }
    }
    Ok(())
}

/// Write a folded constant initializer into the image. Returns false if
/// the expression is not a compile-time constant.
fn try_fold_into_image(
    ctx: &CompilerContext,
    unit: &mut CompilationUnit,
    entry: &GlobalEntry,
    init: &Expr,
) -> Result<bool> {
    if let Some(scalar) = entry.ty.scalar_type() {
        let Some(folded) = const_eval_literal(init) else {
            return Ok(false);
        };
        write_scalar(&mut unit.data.image, entry.offset, scalar, folded, init.span)?;
        return Ok(true);
    }

    let Some(complex) = entry.ty.complex_id() else {
        return Ok(false);
    };
    let ExprKind::InitList(values) = &init.kind else {
        return Ok(false);
    };

    match ctx.registry.get(complex).kind.clone() {
        ComplexTypeKind::Span { elem, len } => {
            if values.len() as u64 != u64::from(len) {
                return Err(Error::type_mismatch(
                    format!("{len} initializer values"),
                    format!("{}", values.len()),
                    init.span,
                ));
            }
            let Some(scalar) = elem.scalar_type() else {
                return Err(Error::compile(
                    "span-of-aggregate initializers are not supported",
                    init.span,
                ));
            };
            let elem_size = ctx.registry.size_of(&elem);
            for (i, value) in values.iter().enumerate() {
                let folded = const_eval_literal(value).ok_or_else(|| {
                    Error::compile(
                        "aggregate initializers must be compile-time constants",
                        value.span,
                    )
                })?;
                let at = entry.offset + elem_size * u32::try_from(i).unwrap_or(u32::MAX);
                write_scalar(&mut unit.data.image, at, scalar, folded, value.span)?;
            }
            Ok(true)
        }
        ComplexTypeKind::Struct { members } => {
            if values.len() > members.len() {
                return Err(Error::type_mismatch(
                    format!("at most {} initializer values", members.len()),
                    format!("{}", values.len()),
                    init.span,
                ));
            }
            for (member, value) in members.iter().zip(values) {
                let Some(scalar) = member.ty.scalar_type() else {
                    return Err(Error::compile(
                        "nested aggregate initializers are not supported",
                        value.span,
                    ));
                };
                let folded = const_eval_literal(value).ok_or_else(|| {
                    Error::compile(
                        "aggregate initializers must be compile-time constants",
                        value.span,
                    )
                })?;
                write_scalar(
                    &mut unit.data.image,
                    entry.offset + member.offset,
                    scalar,
                    folded,
                    value.span,
                )?;
            }
            Ok(true)
        }
    }
}

/// Convert a folded value to the target scalar and write it little-endian.
///
/// Widening follows the implicit-conversion rules; narrowing is a type
/// mismatch here just as it would be in checked code.
fn write_scalar(
    image: &mut [u8],
    offset: u32,
    scalar: ScalarType,
    folded: Folded,
    span: Span,
) -> Result<()> {
    let at = offset as usize;
    match (scalar, folded) {
        (ScalarType::Int, Folded::Int(v)) => {
            image[at..at + 4].copy_from_slice(&v.to_le_bytes());
        }
        (ScalarType::Float, Folded::Int(v)) => {
            let v = v as f32;
            image[at..at + 4].copy_from_slice(&v.to_le_bytes());
        }
        (ScalarType::Float, Folded::Float(v)) => {
            image[at..at + 4].copy_from_slice(&v.to_le_bytes());
        }
        (ScalarType::Double, Folded::Int(v)) => {
            let v = f64::from(v);
            image[at..at + 8].copy_from_slice(&v.to_le_bytes());
        }
        (ScalarType::Double, Folded::Float(v)) => {
            let v = f64::from(v);
            image[at..at + 8].copy_from_slice(&v.to_le_bytes());
        }
        (ScalarType::Double, Folded::Double(v)) => {
            image[at..at + 8].copy_from_slice(&v.to_le_bytes());
        }
        (ScalarType::Bool, Folded::Bool(v)) => {
            image[at] = u8::from(v);
        }
        (expected, found) => {
            return Err(Error::type_mismatch(
                expected.name(),
                format!("{found:?}"),
                span,
            ));
        }
    }
    Ok(())
}
