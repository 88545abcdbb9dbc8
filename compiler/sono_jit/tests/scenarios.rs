//! End-to-end tests: source text through the full pipeline to native
//! code, invoked through the typed interface.

use sono_diagnostic::ErrorCode;
use sono_jit::{
    ArtifactSlot, Compiler, CompilerSettings, Definitions, OptimizationFlags, ProcessData,
};

fn compile(source: &str) -> sono_jit::CompiledProgram {
    match Compiler::new(CompilerSettings::default()).compile(source, &Definitions::new()) {
        Ok(program) => program,
        Err(e) => panic!("compile failed:\n{e}\nsource:\n{source}"),
    }
}

fn compile_with(source: &str, settings: CompilerSettings) -> sono_jit::CompiledProgram {
    match Compiler::new(settings).compile(source, &Definitions::new()) {
        Ok(program) => program,
        Err(e) => panic!("compile failed:\n{e}\nsource:\n{source}"),
    }
}

fn call_i32_i32(program: &sono_jit::CompiledProgram, name: &str, arg: i32) -> i32 {
    let Ok(handle) = program.function(name) else {
        panic!("function '{name}' missing; have {:?}", program.function_names());
    };
    let Ok(f) = handle.typed1::<i32, i32>() else {
        panic!("bind failed for '{name}'");
    };
    f.call(arg)
}

fn call_f32_f32(program: &sono_jit::CompiledProgram, name: &str, arg: f32) -> f32 {
    let Ok(handle) = program.function(name) else {
        panic!("function '{name}' missing");
    };
    let Ok(f) = handle.typed1::<f32, f32>() else {
        panic!("bind failed for '{name}'");
    };
    f.call(arg)
}

fn call_f32(program: &sono_jit::CompiledProgram, name: &str) -> f32 {
    let Ok(handle) = program.function(name) else {
        panic!("function '{name}' missing");
    };
    let Ok(f) = handle.typed0::<f32>() else {
        panic!("bind failed for '{name}'");
    };
    f.call()
}

#[test]
fn scenario_a_increment() {
    let program = compile("int main(int x) { return x + 1; }");
    assert_eq!(call_i32_i32(&program, "main", 41), 42);
}

#[test]
fn scenario_b_span_index() {
    let program = compile(
        "span<float, 4> data = { 1.0f, 2.0f, 3.0f, 4.0f };\n\
         float third() { return data[2]; }",
    );
    assert_eq!(call_f32(&program, "third"), 3.0);
}

#[test]
fn scenario_c_struct_method() {
    let program = compile(
        "struct P { float gain; float op(float x) { return x * gain; } };\n\
         P p = { 0.5f };\n\
         float apply(float x) { return p.op(x); }",
    );
    assert_eq!(call_f32_f32(&program, "apply", 2.0), 1.0);
}

#[test]
fn scenario_d_redeclaration() {
    let result = Compiler::new(CompilerSettings::default())
        .compile("int x = 1; float x = 2.0f;", &Definitions::new());
    let Err(e) = result else {
        panic!("expected redeclaration error");
    };
    assert_eq!(e.code(), ErrorCode::Redeclaration);
}

#[test]
fn scenario_e_signature_mismatch_at_bind_time() {
    let program = compile("float half(float x) { return x * 0.5f; }");
    let Ok(handle) = program.function("half") else {
        panic!("half missing");
    };
    // Wrong return type requested: double instead of float.
    let Err(e) = handle.typed1::<f32, f64>() else {
        panic!("expected bind-time mismatch");
    };
    assert_eq!(e.code(), ErrorCode::SignatureMismatch);
    // Wrong argument type too.
    assert!(handle.typed1::<i32, f32>().is_err());
    // And the correct signature binds.
    assert!(handle.typed1::<f32, f32>().is_ok());
}

#[test]
fn round_trip_determinism() {
    let source = "float mix(float x) { return (x * 0.75f + 0.125f) / 3.0f; }";
    let a = compile(source);
    let b = compile(source);
    for input in [-1.0f32, -0.33, 0.0, 0.5, 1.0, 123.456] {
        let left = call_f32_f32(&a, "mix", input);
        let right = call_f32_f32(&b, "mix", input);
        assert_eq!(left.to_bits(), right.to_bits(), "diverged at {input}");
    }
}

#[test]
fn inliner_substitution_transparency() {
    let source = "float limit(float x) { return Math::clamp(x, 0.0f, 1.0f); }";
    let inlined = compile(source);
    let mut settings = CompilerSettings::default();
    settings.optimizations.remove(OptimizationFlags::INLINING);
    let called = compile_with(source, settings);
    for input in [-2.0f32, -0.5, 0.0, 0.25, 0.999, 1.0, 7.5] {
        let a = call_f32_f32(&inlined, "limit", input);
        let b = call_f32_f32(&called, "limit", input);
        assert_eq!(a.to_bits(), b.to_bits(), "paths diverged at {input}");
    }
}

#[test]
fn control_flow_factorial() {
    let program = compile(
        "int fact(int n) {\n\
             int acc = 1;\n\
             for (int i = 2; i <= n; ++i) { acc = acc * i; }\n\
             return acc;\n\
         }",
    );
    assert_eq!(call_i32_i32(&program, "fact", 5), 120);
    assert_eq!(call_i32_i32(&program, "fact", 0), 1);
}

#[test]
fn while_loop_and_break() {
    let program = compile(
        "int count(int limit) {\n\
             int i = 0;\n\
             while (true) {\n\
                 if (i >= limit) { break; }\n\
                 ++i;\n\
             }\n\
             return i;\n\
         }",
    );
    assert_eq!(call_i32_i32(&program, "count", 9), 9);
}

#[test]
fn ternary_and_bool_isolation() {
    let program = compile(
        "int sign(float x) { return x < 0.0f ? 0 - 1 : (x > 0.0f ? 1 : 0); }",
    );
    let Ok(handle) = program.function("sign") else {
        panic!("sign missing");
    };
    let Ok(f) = handle.typed1::<f32, i32>() else {
        panic!("bind failed");
    };
    assert_eq!(f.call(-3.5), -1);
    assert_eq!(f.call(0.0), 0);
    assert_eq!(f.call(2.0), 1);
}

#[test]
fn numeric_widening_and_explicit_narrowing() {
    let program = compile(
        "double widen(int x) { return x + 0.5; }\n\
         int narrow(double x) { return (int)x; }",
    );
    let Ok(handle) = program.function("widen") else {
        panic!("widen missing");
    };
    let Ok(widen) = handle.typed1::<i32, f64>() else {
        panic!("bind failed");
    };
    assert_eq!(widen.call(2), 2.5);

    let Ok(handle) = program.function("narrow") else {
        panic!("narrow missing");
    };
    let Ok(narrow) = handle.typed1::<f64, i32>() else {
        panic!("bind failed");
    };
    assert_eq!(narrow.call(3.9), 3);
}

#[test]
fn template_function_instantiation() {
    let program = compile(
        "template <typename T, int N> T sum(span<T, N>& data) {\n\
             T acc = (T)0;\n\
             for (int i = 0; i < N; ++i) { acc += data[i]; }\n\
             return acc;\n\
         }\n\
         span<float, 4> buffer = { 1.0f, 2.0f, 3.0f, 4.0f };\n\
         float total() { return sum<float, 4>(buffer); }",
    );
    assert_eq!(call_f32(&program, "total"), 10.0);
}

#[test]
fn namespaces_and_using() {
    let program = compile(
        "namespace filters {\n\
             float one_pole(float x, float a) { return x * (1.0f - a); }\n\
         }\n\
         using namespace filters;\n\
         float tick(float x) { return one_pole(x, 0.25f); }",
    );
    assert_eq!(call_f32_f32(&program, "tick", 2.0), 1.5);
}

#[test]
fn root_constructor_runs_before_first_call() {
    let program = compile(
        "float level = Math::sqrt(16.0f);\n\
         float get_level() { return level; }",
    );
    assert_eq!(call_f32(&program, "get_level"), 4.0);
}

#[test]
fn globals_persist_across_calls() {
    let program = compile(
        "int counter = 0;\n\
         int next() { counter += 1; return counter; }",
    );
    let Ok(handle) = program.function("next") else {
        panic!("next missing");
    };
    let Ok(next) = handle.typed0::<i32>() else {
        panic!("bind failed");
    };
    assert_eq!(next.call(), 1);
    assert_eq!(next.call(), 2);
    assert_eq!(next.call(), 3);
}

#[test]
fn span_buffer_binding() {
    let program = compile(
        "void process(span<float, 4>& data) {\n\
             for (int i = 0; i < 4; ++i) { data[i] = data[i] * 0.5f; }\n\
         }",
    );
    let Ok(handle) = program.function("process") else {
        panic!("process missing");
    };
    let Ok(process) = handle.typed1::<&mut [f32; 4], ()>() else {
        panic!("bind failed");
    };
    let mut buffer = [2.0f32, 4.0, 6.0, 8.0];
    process.call(&mut buffer);
    assert_eq!(buffer, [1.0, 2.0, 3.0, 4.0]);

    // A differently sized buffer must be rejected at bind time.
    assert!(handle.typed1::<&mut [f32; 8], ()>().is_err());
}

#[test]
fn process_data_binding() {
    let program = compile(
        "void process(ProcessData& d) {\n\
             for (int i = 0; i < d.num_frames; ++i) {\n\
                 d.left[i] = d.left[i] * 0.5f;\n\
                 d.right[i] = d.right[i] * 2.0f;\n\
             }\n\
         }",
    );
    let Ok(handle) = program.function("process") else {
        panic!("process missing");
    };
    let Ok(process) = handle.typed1::<&mut ProcessData, ()>() else {
        panic!("bind failed");
    };
    let mut left = [1.0f32, 2.0, 3.0, 4.0];
    let mut right = [1.0f32, 2.0, 3.0, 4.0];
    let mut block = ProcessData {
        left: left.as_mut_ptr(),
        right: right.as_mut_ptr(),
        num_frames: 4,
    };
    process.call(&mut block);
    assert_eq!(left, [0.5, 1.0, 1.5, 2.0]);
    assert_eq!(right, [2.0, 4.0, 6.0, 8.0]);
}

#[test]
fn wrapped_index_helper() {
    let program = compile(
        "span<float, 4> data = { 1.0f, 2.0f, 3.0f, 4.0f };\n\
         float at(int i) { return data[Math::wrap(i, 4)]; }",
    );
    let Ok(handle) = program.function("at") else {
        panic!("at missing");
    };
    let Ok(at) = handle.typed1::<i32, f32>() else {
        panic!("bind failed");
    };
    assert_eq!(at.call(5), 2.0);
    assert_eq!(at.call(-1), 4.0);
}

#[test]
fn operator_overload_end_to_end() {
    let program = compile(
        "struct Gain { float value = 0.25f; float operator*(float x) { return value * x; } };\n\
         Gain g;\n\
         float apply(float x) { return g * x; }",
    );
    assert_eq!(call_f32_f32(&program, "apply", 8.0), 2.0);
}

#[test]
fn preprocessor_definitions_change_output() {
    let mut defs = Definitions::new();
    defs.define("GAIN", "0.5f");
    let compiler = Compiler::new(CompilerSettings::default());
    let Ok(program) = compiler.compile("float f(float x) { return x * GAIN; }", &defs) else {
        panic!("compile failed");
    };
    assert_eq!(call_f32_f32(&program, "f", 3.0), 1.5);
}

#[test]
fn hot_swap_switches_artifacts() {
    let slot = ArtifactSlot::new();
    assert!(slot.is_empty());

    slot.install(compile("float render() { return 1.0f; }"));
    let first = slot.with(|p| {
        let Some(p) = p else { panic!("slot empty after install") };
        call_f32(p, "render")
    });
    assert_eq!(first, 1.0);

    // Recompile "while audio is running" and swap.
    slot.install(compile("float render() { return 2.0f; }"));
    let second = slot.with(|p| {
        let Some(p) = p else { panic!("slot empty after swap") };
        call_f32(p, "render")
    });
    assert_eq!(second, 2.0);

    slot.clear();
    assert!(slot.is_empty());
}

#[test]
fn hot_swap_under_concurrent_readers() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let slot = Arc::new(ArtifactSlot::new());
    slot.install(compile("float render() { return 1.0f; }"));

    let stop = Arc::new(AtomicBool::new(false));
    let reader_slot = Arc::clone(&slot);
    let reader_stop = Arc::clone(&stop);
    let reader = std::thread::spawn(move || {
        let mut last = 0.0f32;
        while !reader_stop.load(Ordering::Relaxed) {
            reader_slot.with(|p| {
                if let Some(p) = p {
                    last = call_f32(p, "render");
                    // Every observed value is a fully functional
                    // artifact; nothing in between.
                    assert!(last == 1.0 || last == 2.0, "torn artifact: {last}");
                }
            });
        }
        last
    });

    for _ in 0..16 {
        slot.install(compile("float render() { return 2.0f; }"));
        slot.install(compile("float render() { return 1.0f; }"));
    }
    slot.install(compile("float render() { return 2.0f; }"));
    stop.store(true, Ordering::Relaxed);
    let Ok(last) = reader.join() else {
        panic!("reader thread panicked");
    };
    assert_eq!(last, 2.0);

    let final_value = slot.with(|p| {
        let Some(p) = p else { panic!("slot empty") };
        call_f32(p, "render")
    });
    assert_eq!(final_value, 2.0);
}

#[test]
fn check_mode_reports_without_building() {
    let compiler = Compiler::new(CompilerSettings::default());
    assert!(compiler
        .check("int main(int x) { return x + 1; }", &Definitions::new())
        .is_ok());
    let Err(e) = compiler.check("int main() { return missing; }", &Definitions::new()) else {
        panic!("expected unresolved symbol");
    };
    assert_eq!(e.code(), ErrorCode::UnresolvedSymbol);
}

#[test]
fn math_library_calls() {
    let program = compile(
        "float amp(float x) { return Math::pow(10.0f, x / 20.0f); }\n\
         float mag(float a, float b) { return Math::sqrt(a * a + b * b); }",
    );
    let Ok(handle) = program.function("mag") else {
        panic!("mag missing");
    };
    let Ok(mag) = handle.typed2::<f32, f32, f32>() else {
        panic!("bind failed");
    };
    assert_eq!(mag.call(3.0, 4.0), 5.0);

    let db = call_f32_f32(&program, "amp", 20.0);
    assert!((db - 10.0).abs() < 1e-4, "amp(20) = {db}");
}
