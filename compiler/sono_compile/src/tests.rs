use pretty_assertions::assert_eq;
use sono_diagnostic::{Error, ErrorCode};
use sono_ir::{ExprKind, StmtKind};
use sono_lexer::Definitions;

use crate::{
    check_unit, expand_inliners, run_frontend, CompilationUnit, CompilerContext,
    CompilerSettings, Inliner, OptimizationFlags, SymbolRef,
};

fn frontend(source: &str) -> Result<(CompilerContext, CompilationUnit), Error> {
    frontend_with(source, &CompilerSettings::default())
}

fn frontend_with(
    source: &str,
    settings: &CompilerSettings,
) -> Result<(CompilerContext, CompilationUnit), Error> {
    let mut ctx = CompilerContext::new();
    let unit = run_frontend(source, &Definitions::new(), settings, &mut ctx)?;
    Ok((ctx, unit))
}

fn frontend_ok(source: &str) -> (CompilerContext, CompilationUnit) {
    match frontend(source) {
        Ok(result) => result,
        Err(e) => panic!("frontend failed for {source:?}: {e}"),
    }
}

fn body_stmts(unit: &CompilationUnit, name: &str) -> Vec<sono_ir::Stmt> {
    let id = unit
        .functions
        .lookup(&sono_ir::NamespacedIdentifier::from_segment(name));
    let Some(id) = id else {
        panic!("function '{name}' not in table");
    };
    let Some(body) = &unit.functions.get(id).body else {
        panic!("function '{name}' has no body");
    };
    let StmtKind::Block(stmts) = &body.stmt.kind else {
        panic!("body of '{name}' is not a block");
    };
    stmts.clone()
}

#[test]
fn simple_function_signature() {
    let (_, unit) = frontend_ok("int main(int x) { return x + 1; }");
    let id = unit
        .functions
        .lookup(&sono_ir::NamespacedIdentifier::from_segment("main"));
    let Some(id) = id else {
        panic!("main missing");
    };
    let data = &unit.functions.get(id).data;
    assert_eq!(data.ret, sono_types::TypeInfo::INT);
    assert_eq!(data.params.len(), 1);
    assert_eq!(data.params[0].1, sono_types::TypeInfo::INT);
}

#[test]
fn narrowing_return_is_a_type_mismatch() {
    let Err(e) = frontend("float f() { return 1.5; }") else {
        panic!("expected type mismatch");
    };
    assert_eq!(e.code(), ErrorCode::TypeMismatch);
}

#[test]
fn widening_return_inserts_a_cast() {
    let (_, unit) = frontend_ok("double f() { return 1; }");
    let stmts = body_stmts(&unit, "f");
    let StmtKind::Return(Some(expr)) = &stmts[0].kind else {
        panic!("expected return");
    };
    // int literal folds; the checker still records the double type.
    assert_eq!(unit.type_of(expr.id), Some(sono_types::TypeInfo::DOUBLE));
}

#[test]
fn bool_does_not_convert_to_int() {
    let Err(e) = frontend("int f(bool b) { return b; }") else {
        panic!("expected type mismatch");
    };
    assert_eq!(e.code(), ErrorCode::TypeMismatch);
}

#[test]
fn numeric_condition_is_accepted() {
    let (_, unit) = frontend_ok("int f(int x) { if (x) { return 1; } return 0; }");
    let stmts = body_stmts(&unit, "f");
    let StmtKind::If { cond, .. } = &stmts[0].kind else {
        panic!("expected if");
    };
    // `if (x)` became `if (x != 0)`.
    assert!(matches!(
        cond.kind,
        ExprKind::Binary {
            op: sono_ir::BinaryOp::Ne,
            ..
        }
    ));
}

#[test]
fn literal_arithmetic_folds() {
    let (_, unit) = frontend_ok("int f() { return 2 + 3 * 4; }");
    let stmts = body_stmts(&unit, "f");
    let StmtKind::Return(Some(expr)) = &stmts[0].kind else {
        panic!("expected return");
    };
    assert!(matches!(expr.kind, ExprKind::IntLit(14)));
}

#[test]
fn folding_respects_the_optimization_set() {
    let mut settings = CompilerSettings::default();
    settings.optimizations = OptimizationFlags::empty();
    let Ok((_, unit)) = frontend_with("int f() { return 2 + 3; }", &settings) else {
        panic!("frontend failed");
    };
    let stmts = body_stmts(&unit, "f");
    let StmtKind::Return(Some(expr)) = &stmts[0].kind else {
        panic!("expected return");
    };
    assert!(matches!(expr.kind, ExprKind::Binary { .. }));
}

#[test]
fn constant_branch_is_pruned() {
    let (_, unit) = frontend_ok("int f() { if (false) { return 1; } return 2; }");
    let stmts = body_stmts(&unit, "f");
    // The if collapsed into an empty block.
    assert!(matches!(&stmts[0].kind, StmtKind::Block(b) if b.is_empty()));
}

#[test]
fn local_redeclaration_fails() {
    let Err(e) = frontend("int f() { int x = 1; int x = 2; return x; }") else {
        panic!("expected redeclaration error");
    };
    assert_eq!(e.code(), ErrorCode::Redeclaration);
}

#[test]
fn shadowing_in_inner_block_is_allowed() {
    let (_, unit) = frontend_ok("int f() { int x = 1; { int x = 2; x = 3; } return x; }");
    assert!(!unit.functions.is_empty());
}

#[test]
fn private_member_access_fails_outside() {
    let source = "struct S { private: float hidden; public: float get() { return hidden; } };\n\
                  S s;\n\
                  float f() { return s.hidden; }";
    let Err(e) = frontend(source) else {
        panic!("expected access error");
    };
    assert_eq!(e.code(), ErrorCode::Access);
}

#[test]
fn private_member_access_works_from_methods() {
    let source = "struct S { private: float hidden = 2.0f; public: float get() { return hidden; } };\n\
                  S s;\n\
                  float f() { return s.get(); }";
    let (_, unit) = frontend_ok(source);
    assert!(!unit.functions.is_empty());
}

#[test]
fn template_instantiations_are_memoized() {
    let source = "template <typename T, int N> T first(span<T, N>& data) { return data[0]; }\n\
                  span<float, 4> buffer = { 1.0f, 2.0f, 3.0f, 4.0f };\n\
                  float a() { return first<float, 4>(buffer); }\n\
                  float b() { return first<float, 4>(buffer); }\n\
                  float c() { return first<float, 8>(buffer); }";
    // The third call uses different arguments and must fail (span size
    // mismatch), proving the signature really is substituted per
    // argument list.
    let Err(e) = frontend(source) else {
        panic!("expected signature mismatch for first<float, 8>");
    };
    assert_eq!(e.code(), ErrorCode::TypeMismatch);

    let source_ok = "template <typename T, int N> T first(span<T, N>& data) { return data[0]; }\n\
                  span<float, 4> buffer = { 1.0f, 2.0f, 3.0f, 4.0f };\n\
                  float a() { return first<float, 4>(buffer); }\n\
                  float b() { return first<float, 4>(buffer); }";
    let (_, unit) = frontend_ok(source_ok);
    let instantiated: Vec<String> = unit
        .functions
        .ids()
        .map(|id| unit.functions.get(id).data.mangled.clone())
        .filter(|m| m.starts_with("first<"))
        .collect();
    assert_eq!(instantiated.len(), 1, "one cached instantiation: {instantiated:?}");
}

#[test]
fn struct_template_instantiation_registers_layout() {
    let source = "template <int N> struct Delay { span<float, N> line; int pos; };\n\
                  Delay<8> d;\n\
                  int f() { return d.pos; }";
    let (ctx, unit) = frontend_ok(source);
    let entry = &unit.data.entries[0];
    let Some(id) = entry.ty.complex_id() else {
        panic!("global is not complex");
    };
    // span<float, 8> plus the int, aligned to 4.
    assert_eq!(ctx.registry.get(id).size, 36);
}

#[test]
fn span_global_initializer_lands_in_the_image() {
    let (_, unit) = frontend_ok("span<float, 4> data = { 1.0f, 2.0f, 3.0f, 4.0f };");
    let image = &unit.data.image;
    let third = f32::from_le_bytes([image[8], image[9], image[10], image[11]]);
    assert_eq!(third, 3.0);
}

#[test]
fn struct_global_initializer_lands_in_the_image() {
    let source = "struct P { float gain; };\nP p = { 0.5f };";
    let (_, unit) = frontend_ok(source);
    let image = &unit.data.image;
    let gain = f32::from_le_bytes([image[0], image[1], image[2], image[3]]);
    assert_eq!(gain, 0.5);
}

#[test]
fn member_defaults_seed_the_image() {
    let source = "struct P { float gain = 0.25f; };\nP p;";
    let (_, unit) = frontend_ok(source);
    let image = &unit.data.image;
    let gain = f32::from_le_bytes([image[0], image[1], image[2], image[3]]);
    assert_eq!(gain, 0.25);
}

#[test]
fn non_constant_scalar_initializer_reaches_the_ctor() {
    let source = "float decay(float x) { return x * 0.5f; }\nfloat level = decay(1.0f);";
    let (_, unit) = frontend_ok(source);
    assert_eq!(unit.data.ctor_inits.len(), 1);
}

#[test]
fn clamp_expands_into_min_and_max() {
    let source = "float f(float x) { return Math::clamp(x, 0.0f, 1.0f); }";
    let (mut ctx, mut unit) = frontend_ok(source);
    let settings = CompilerSettings::default();
    if let Err(e) = expand_inliners(&mut ctx, &mut unit, &settings) {
        panic!("expansion failed: {e}");
    }
    let stmts = body_stmts(&unit, "f");
    let StmtKind::Return(Some(expr)) = &stmts[0].kind else {
        panic!("expected return");
    };
    // Outermost call must now be Math::min, with Math::max inside.
    let ExprKind::Call { args, .. } = &expr.kind else {
        panic!("expected a call after expansion, got {:?}", expr.kind);
    };
    let Some(SymbolRef::Function(fid)) = unit.refs.get(&expr.id) else {
        panic!("expanded call is unresolved");
    };
    assert_eq!(unit.functions.get(*fid).data.id.to_string(), "Math::min");
    assert!(matches!(args[0].kind, ExprKind::Call { .. }));
}

#[test]
fn high_level_inliners_survive_disabled_inlining() {
    let source = "float f(float x) { return Math::clamp(x, 0.0f, 1.0f); }";
    let mut settings = CompilerSettings::default();
    settings.optimizations.remove(OptimizationFlags::INLINING);
    let Ok((mut ctx, mut unit)) = frontend_with(source, &settings) else {
        panic!("frontend failed");
    };
    if let Err(e) = expand_inliners(&mut ctx, &mut unit, &settings) {
        panic!("expansion failed: {e}");
    }
    // Call left intact: the backend will bind the native symbol.
    let stmts = body_stmts(&unit, "f");
    let StmtKind::Return(Some(expr)) = &stmts[0].kind else {
        panic!("expected return");
    };
    let Some(SymbolRef::Function(fid)) = unit.refs.get(&expr.id) else {
        panic!("call is unresolved");
    };
    let data = &unit.functions.get(*fid).data;
    assert_eq!(data.id.to_string(), "Math::clamp");
    assert!(matches!(data.inliner, Some(Inliner::HighLevel(_))));
}

#[test]
fn trivial_user_functions_inline() {
    let source = "float twice(float x) { return x * 2.0f; }\n\
                  float f(float x) { return twice(x) + 1.0f; }";
    let (_, unit) = frontend_ok(source);
    let stmts = body_stmts(&unit, "f");
    let StmtKind::Return(Some(expr)) = &stmts[0].kind else {
        panic!("expected return");
    };
    let ExprKind::Binary { lhs, .. } = &expr.kind else {
        panic!("expected binary, got {:?}", expr.kind);
    };
    // The call to twice() was replaced by its multiply.
    assert!(
        matches!(lhs.kind, ExprKind::Binary { .. }),
        "call was not inlined: {:?}",
        lhs.kind
    );
}

#[test]
fn check_unit_validates_without_codegen_tables() {
    let mut ctx = CompilerContext::new();
    let result = check_unit(
        "int main(int x) { return x + 1; }",
        &Definitions::new(),
        &CompilerSettings::default(),
        &mut ctx,
    );
    assert!(result.is_ok());

    let mut ctx = CompilerContext::new();
    let result = check_unit(
        "int main(int x) { return y + 1; }",
        &Definitions::new(),
        &CompilerSettings::default(),
        &mut ctx,
    );
    let Err(e) = result else {
        panic!("expected unresolved symbol");
    };
    assert_eq!(e.code(), ErrorCode::UnresolvedSymbol);
}

#[test]
fn first_error_wins() {
    // Both a syntax error (later) and an unresolved symbol (earlier)
    // exist; the pipeline reports the parse failure first because
    // parsing runs before resolution.
    let Err(e) = frontend("int f() { return }") else {
        panic!("expected syntax error");
    };
    assert_eq!(e.code(), ErrorCode::Syntax);
}

#[test]
fn using_namespace_flattens_for_calls() {
    let source = "namespace dsp { float half(float x) { return x * 0.5f; } }\n\
                  using namespace dsp;\n\
                  float f() { return half(2.0f); }";
    let (_, unit) = frontend_ok(source);
    assert!(!unit.functions.is_empty());
}

#[test]
fn operator_overload_dispatches_to_method() {
    let source = "struct Gain { float value = 0.5f; float operator*(float x) { return value * x; } };\n\
                  Gain g;\n\
                  float f(float x) { return g * x; }";
    let (_, unit) = frontend_ok(source);
    let stmts = body_stmts(&unit, "f");
    let StmtKind::Return(Some(expr)) = &stmts[0].kind else {
        panic!("expected return");
    };
    let ExprKind::Call { callee, .. } = &expr.kind else {
        panic!("operator did not rewrite to a call: {:?}", expr.kind);
    };
    let ExprKind::Member { name, .. } = &callee.kind else {
        panic!("callee is not a member access");
    };
    assert_eq!(name, "operator*");
}

#[test]
fn preprocessor_definitions_reach_the_pipeline() {
    let mut defs = Definitions::new();
    defs.define("SIZE", "4");
    let mut ctx = CompilerContext::new();
    let unit = match run_frontend(
        "span<float, SIZE> data = { 1.0f, 2.0f, 3.0f, 4.0f };",
        &defs,
        &CompilerSettings::default(),
        &mut ctx,
    ) {
        Ok(unit) => unit,
        Err(e) => panic!("frontend failed: {e}"),
    };
    assert_eq!(unit.data.image.len(), 16);
}
