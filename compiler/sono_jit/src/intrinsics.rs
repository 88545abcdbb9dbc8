//! Native library symbols registered with the JIT.
//!
//! Every built-in that has no single-instruction lowering, and every
//! built-in whose inliner the host disabled, calls one of these
//! `extern "C"` shims. Both paths compute the same value, which is what
//! makes inlining observably transparent.

use sono_types::ScalarType;

/// One registered native symbol: name, argument count, scalar domain.
pub(crate) struct NativeSymbol {
    pub name: &'static str,
    pub arity: usize,
    pub scalar: ScalarType,
    pub address: *const u8,
}

pub(crate) fn registry() -> Vec<NativeSymbol> {
    macro_rules! sym {
        ($name:literal, $arity:expr, $scalar:expr, $func:expr) => {
            NativeSymbol {
                name: $name,
                arity: $arity,
                scalar: $scalar,
                address: $func as *const u8,
            }
        };
    }
    vec![
        sym!("sono_minf", 2, ScalarType::Float, sono_minf as extern "C" fn(f32, f32) -> f32),
        sym!("sono_min", 2, ScalarType::Double, sono_min as extern "C" fn(f64, f64) -> f64),
        sym!("sono_maxf", 2, ScalarType::Float, sono_maxf as extern "C" fn(f32, f32) -> f32),
        sym!("sono_max", 2, ScalarType::Double, sono_max as extern "C" fn(f64, f64) -> f64),
        sym!("sono_absf", 1, ScalarType::Float, sono_absf as extern "C" fn(f32) -> f32),
        sym!("sono_abs", 1, ScalarType::Double, sono_abs as extern "C" fn(f64) -> f64),
        sym!("sono_sqrtf", 1, ScalarType::Float, sono_sqrtf as extern "C" fn(f32) -> f32),
        sym!("sono_sqrt", 1, ScalarType::Double, sono_sqrt as extern "C" fn(f64) -> f64),
        sym!("sono_sinf", 1, ScalarType::Float, sono_sinf as extern "C" fn(f32) -> f32),
        sym!("sono_sin", 1, ScalarType::Double, sono_sin as extern "C" fn(f64) -> f64),
        sym!("sono_cosf", 1, ScalarType::Float, sono_cosf as extern "C" fn(f32) -> f32),
        sym!("sono_cos", 1, ScalarType::Double, sono_cos as extern "C" fn(f64) -> f64),
        sym!("sono_powf", 2, ScalarType::Float, sono_powf as extern "C" fn(f32, f32) -> f32),
        sym!("sono_pow", 2, ScalarType::Double, sono_pow as extern "C" fn(f64, f64) -> f64),
        sym!("sono_fmodf", 2, ScalarType::Float, sono_fmodf as extern "C" fn(f32, f32) -> f32),
        sym!("sono_fmod", 2, ScalarType::Double, sono_fmod as extern "C" fn(f64, f64) -> f64),
        sym!("sono_clampf", 3, ScalarType::Float, sono_clampf as extern "C" fn(f32, f32, f32) -> f32),
        sym!("sono_clamp", 3, ScalarType::Double, sono_clamp as extern "C" fn(f64, f64, f64) -> f64),
        sym!("sono_mapf", 3, ScalarType::Float, sono_mapf as extern "C" fn(f32, f32, f32) -> f32),
        sym!("sono_map", 3, ScalarType::Double, sono_map as extern "C" fn(f64, f64, f64) -> f64),
        sym!("sono_sig2modf", 1, ScalarType::Float, sono_sig2modf as extern "C" fn(f32) -> f32),
        sym!("sono_sig2mod", 1, ScalarType::Double, sono_sig2mod as extern "C" fn(f64) -> f64),
        sym!("sono_mod2sigf", 1, ScalarType::Float, sono_mod2sigf as extern "C" fn(f32) -> f32),
        sym!("sono_mod2sig", 1, ScalarType::Double, sono_mod2sig as extern "C" fn(f64) -> f64),
        sym!("sono_wrap", 2, ScalarType::Int, sono_wrap as extern "C" fn(i32, i32) -> i32),
    ]
}

// The shims. `fmin`-style NaN behavior matches the instruction
// lowering: comparisons on NaN pick the other operand.

extern "C" fn sono_minf(a: f32, b: f32) -> f32 {
    a.min(b)
}
extern "C" fn sono_min(a: f64, b: f64) -> f64 {
    a.min(b)
}
extern "C" fn sono_maxf(a: f32, b: f32) -> f32 {
    a.max(b)
}
extern "C" fn sono_max(a: f64, b: f64) -> f64 {
    a.max(b)
}
extern "C" fn sono_absf(x: f32) -> f32 {
    x.abs()
}
extern "C" fn sono_abs(x: f64) -> f64 {
    x.abs()
}
extern "C" fn sono_sqrtf(x: f32) -> f32 {
    x.sqrt()
}
extern "C" fn sono_sqrt(x: f64) -> f64 {
    x.sqrt()
}
extern "C" fn sono_sinf(x: f32) -> f32 {
    x.sin()
}
extern "C" fn sono_sin(x: f64) -> f64 {
    x.sin()
}
extern "C" fn sono_cosf(x: f32) -> f32 {
    x.cos()
}
extern "C" fn sono_cos(x: f64) -> f64 {
    x.cos()
}
extern "C" fn sono_powf(x: f32, y: f32) -> f32 {
    x.powf(y)
}
extern "C" fn sono_pow(x: f64, y: f64) -> f64 {
    x.powf(y)
}
extern "C" fn sono_fmodf(x: f32, y: f32) -> f32 {
    x % y
}
extern "C" fn sono_fmod(x: f64, y: f64) -> f64 {
    x % y
}
extern "C" fn sono_clampf(x: f32, lo: f32, hi: f32) -> f32 {
    x.max(lo).min(hi)
}
extern "C" fn sono_clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}
extern "C" fn sono_mapf(x: f32, start: f32, end: f32) -> f32 {
    start + x * (end - start)
}
extern "C" fn sono_map(x: f64, start: f64, end: f64) -> f64 {
    start + x * (end - start)
}
extern "C" fn sono_sig2modf(x: f32) -> f32 {
    x * 0.5 + 0.5
}
extern "C" fn sono_sig2mod(x: f64) -> f64 {
    x * 0.5 + 0.5
}
extern "C" fn sono_mod2sigf(x: f32) -> f32 {
    x * 2.0 - 1.0
}
extern "C" fn sono_mod2sig(x: f64) -> f64 {
    x * 2.0 - 1.0
}
extern "C" fn sono_wrap(i: i32, n: i32) -> i32 {
    if n == 0 {
        return 0;
    }
    ((i % n) + n) % n
}
