//! The built-in function library.
//!
//! Registered through the same symbol and function tables user code
//! flows through. Performance-critical built-ins carry an inliner: a
//! low-level intrinsic the backend lowers to instructions, or a
//! high-level rewrite that expands at the call site into further
//! library calls (and is therefore itself subject to type checking and
//! further inlining). Every entry also names per-type native symbols,
//! the fallback used when inlining is disabled. Both paths compute the
//! same result.

use sono_diagnostic::Result;
use sono_ir::{BinaryOp, Expr, NamespacedIdentifier, Span, Visibility};
use sono_resolve::SymbolKind;
use sono_types::{Modifiers, TypeInfo, TypeKey};

use crate::function_table::{
    FunctionData, FunctionKind, FunctionSpec, FunctionTable, NativeNames,
};
use crate::inliner::{InlineData, Inliner, Intrinsic};
use crate::{CompilationUnit, CompilerContext};

fn math(name: &str) -> NamespacedIdentifier {
    NamespacedIdentifier::from_segment("Math").child(name)
}

/// Register the library into a fresh context and unit.
pub fn register(ctx: &mut CompilerContext, unit: &mut CompilationUnit) -> Result<()> {
    ctx.handler.add_symbol(
        "Math",
        TypeInfo::VOID,
        SymbolKind::Namespace,
        Visibility::Public,
        Span::DUMMY,
    )?;
    ctx.handler.enter("Math");

    let entries: Vec<(&str, usize, Option<Inliner>, NativeNames)> = vec![
        (
            "min",
            2,
            Some(Inliner::LowLevel(Intrinsic::Min)),
            names("sono_minf", "sono_min"),
        ),
        (
            "max",
            2,
            Some(Inliner::LowLevel(Intrinsic::Max)),
            names("sono_maxf", "sono_max"),
        ),
        (
            "abs",
            1,
            Some(Inliner::LowLevel(Intrinsic::Abs)),
            names("sono_absf", "sono_abs"),
        ),
        (
            "sqrt",
            1,
            Some(Inliner::LowLevel(Intrinsic::Sqrt)),
            names("sono_sqrtf", "sono_sqrt"),
        ),
        // No single-instruction lowering exists for these; the
        // intrinsic tag routes them to the registered native symbols.
        (
            "sin",
            1,
            Some(Inliner::LowLevel(Intrinsic::Sin)),
            names("sono_sinf", "sono_sin"),
        ),
        (
            "cos",
            1,
            Some(Inliner::LowLevel(Intrinsic::Cos)),
            names("sono_cosf", "sono_cos"),
        ),
        (
            "pow",
            2,
            Some(Inliner::LowLevel(Intrinsic::Pow)),
            names("sono_powf", "sono_pow"),
        ),
        (
            "fmod",
            2,
            Some(Inliner::LowLevel(Intrinsic::Fmod)),
            names("sono_fmodf", "sono_fmod"),
        ),
        (
            "clamp",
            3,
            Some(Inliner::HighLevel(clamp_rewrite)),
            names("sono_clampf", "sono_clamp"),
        ),
        (
            "map",
            3,
            Some(Inliner::HighLevel(map_rewrite)),
            names("sono_mapf", "sono_map"),
        ),
        (
            "sig2mod",
            1,
            Some(Inliner::HighLevel(sig2mod_rewrite)),
            names("sono_sig2modf", "sono_sig2mod"),
        ),
        (
            "mod2sig",
            1,
            Some(Inliner::HighLevel(mod2sig_rewrite)),
            names("sono_mod2sigf", "sono_mod2sig"),
        ),
    ];

    for (name, arity, inliner, native) in entries {
        add_builtin(ctx, &mut unit.functions, name, arity, inliner, native, true)?;
    }

    // Index wrapping stays in the integer domain.
    add_builtin(
        ctx,
        &mut unit.functions,
        "wrap",
        2,
        Some(Inliner::HighLevel(wrap_rewrite)),
        NativeNames {
            f32_sym: None,
            f64_sym: None,
            i32_sym: Some("sono_wrap"),
        },
        false,
    )?;

    ctx.handler.exit();

    register_process_data(ctx)?;
    Ok(())
}

/// The audio-domain block descriptor: two channel pointers plus the
/// frame count. The host binds a pointer to a layout-compatible value
/// as the bridge from the audio callback into compiled code.
fn register_process_data(ctx: &mut CompilerContext) -> Result<()> {
    let float_ptr = TypeInfo::FLOAT.with(Modifiers::PTR);
    let members = vec![
        ("left".to_owned(), float_ptr, Visibility::Public),
        ("right".to_owned(), float_ptr, Visibility::Public),
        ("num_frames".to_owned(), TypeInfo::INT, Visibility::Public),
    ];
    let path = NamespacedIdentifier::from_segment("ProcessData");
    let id = ctx
        .registry
        .register_struct(TypeKey::plain(path.clone()), members, Span::DUMMY)?;
    ctx.handler.add_symbol(
        "ProcessData",
        TypeInfo::complex(id),
        SymbolKind::Struct,
        Visibility::Public,
        Span::DUMMY,
    )?;
    Ok(())
}

fn names(f32_sym: &'static str, f64_sym: &'static str) -> NativeNames {
    NativeNames {
        f32_sym: Some(f32_sym),
        f64_sym: Some(f64_sym),
        i32_sym: None,
    }
}

fn add_builtin(
    ctx: &mut CompilerContext,
    functions: &mut FunctionTable,
    name: &str,
    arity: usize,
    inliner: Option<Inliner>,
    native: NativeNames,
    unify_numeric: bool,
) -> Result<()> {
    let id = ctx.handler.add_symbol(
        name,
        TypeInfo::dynamic(),
        SymbolKind::Function,
        Visibility::Public,
        Span::DUMMY,
    )?;

    let (params, ret) = if unify_numeric {
        (
            (0..arity)
                .map(|i| (format!("a{i}"), TypeInfo::dynamic()))
                .collect(),
            TypeInfo::dynamic(),
        )
    } else {
        (
            (0..arity).map(|i| (format!("a{i}"), TypeInfo::INT)).collect(),
            TypeInfo::INT,
        )
    };

    functions.insert(FunctionSpec {
        data: FunctionData {
            id: id.clone(),
            mangled: id.to_string(),
            params,
            ret,
            owner: None,
            scope: id.parent(),
            visibility: Visibility::Public,
            kind: FunctionKind::Builtin {
                native,
                unify_numeric,
            },
            inliner,
        },
        body: None,
    });
    Ok(())
}

// High-level rewrites. Each produces plain library calls and
// arithmetic, which re-enter resolution and type checking; clamp's
// expansion is itself inlined one level deeper.

/// `clamp(x, lo, hi)` → `min(max(x, lo), hi)`
fn clamp_rewrite(d: &mut InlineData<'_>) -> Result<Expr> {
    let x = d.arg(0);
    let lo = d.arg(1);
    let hi = d.arg(2);
    let lower = d.call(math("max"), vec![x, lo]);
    Ok(d.call(math("min"), vec![lower, hi]))
}

/// `map(x, start, end)` → `start + x * (end - start)`
fn map_rewrite(d: &mut InlineData<'_>) -> Result<Expr> {
    let x = d.arg(0);
    let start = d.arg(1);
    let end = d.arg(2);
    let start2 = d.arg(1);
    let range = d.binary(BinaryOp::Sub, end, start2);
    let scaled = d.binary(BinaryOp::Mul, x, range);
    Ok(d.binary(BinaryOp::Add, start, scaled))
}

/// `sig2mod(x)` → `x * 0.5f + 0.5f`: bipolar signal to unipolar
/// modulation range.
fn sig2mod_rewrite(d: &mut InlineData<'_>) -> Result<Expr> {
    let x = d.arg(0);
    let half = d.float(0.5);
    let scaled = d.binary(BinaryOp::Mul, x, half);
    let half2 = d.float(0.5);
    Ok(d.binary(BinaryOp::Add, scaled, half2))
}

/// `mod2sig(x)` → `x * 2.0f - 1.0f`
fn mod2sig_rewrite(d: &mut InlineData<'_>) -> Result<Expr> {
    let x = d.arg(0);
    let two = d.float(2.0);
    let scaled = d.binary(BinaryOp::Mul, x, two);
    let one = d.float(1.0);
    Ok(d.binary(BinaryOp::Sub, scaled, one))
}

/// `wrap(i, n)` → `((i % n) + n) % n`: index wrapping that stays
/// non-negative for negative offsets.
fn wrap_rewrite(d: &mut InlineData<'_>) -> Result<Expr> {
    let i = d.arg(0);
    let n = d.arg(1);
    let rem = d.binary(BinaryOp::Mod, i, n);
    let n2 = d.arg(1);
    let shifted = d.binary(BinaryOp::Add, rem, n2);
    let n3 = d.arg(1);
    Ok(d.binary(BinaryOp::Mod, shifted, n3))
}
