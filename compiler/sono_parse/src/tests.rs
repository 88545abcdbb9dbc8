use pretty_assertions::assert_eq;
use sono_diagnostic::Error;
use sono_ir::{
    BinaryOp, ExprKind, Item, NodeIdGen, StmtKind, SyntaxTree,
};
use sono_lexer::{lex, Definitions};
use sono_resolve::{NamespaceHandler, SymbolKind};

fn parse_source(source: &str) -> Result<(SyntaxTree, NamespaceHandler), Error> {
    let (_, tokens) = lex(source, &Definitions::new())?;
    let mut handler = NamespaceHandler::new();
    let mut ids = NodeIdGen::new();
    let tree = crate::parse(&tokens, &mut handler, &mut ids)?;
    Ok((tree, handler))
}

fn parse_ok(source: &str) -> (SyntaxTree, NamespaceHandler) {
    match parse_source(source) {
        Ok(result) => result,
        Err(e) => panic!("parse failed for {source:?}: {e}"),
    }
}

#[test]
fn function_with_params() {
    let (tree, handler) = parse_ok("int main(int x) { return x + 1; }");
    let [Item::Function(f)] = tree.items.as_slice() else {
        panic!("expected one function");
    };
    assert_eq!(f.name, "main");
    assert_eq!(f.params.len(), 1);
    assert_eq!(f.params[0].name, "x");
    let sym = handler.symbol(&sono_ir::NamespacedIdentifier::from_segment("main"));
    assert!(sym.is_some_and(|s| s.kind == SymbolKind::Function));
}

#[test]
fn precedence_mul_binds_tighter_than_add() {
    let (tree, _) = parse_ok("int f() { return 1 + 2 * 3; }");
    let [Item::Function(f)] = tree.items.as_slice() else {
        panic!("expected one function");
    };
    let StmtKind::Block(stmts) = &f.body.kind else {
        panic!("body is a block");
    };
    let StmtKind::Return(Some(expr)) = &stmts[0].kind else {
        panic!("expected return");
    };
    let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(
        rhs.kind,
        ExprKind::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn assignment_is_right_associative() {
    let (tree, _) = parse_ok("void f() { int a = 0; int b = 0; a = b = 1; }");
    let [Item::Function(f)] = tree.items.as_slice() else {
        panic!("expected one function");
    };
    let StmtKind::Block(stmts) = &f.body.kind else {
        panic!("body is a block");
    };
    let StmtKind::Expr(e) = &stmts[2].kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Assign { value, .. } = &e.kind else {
        panic!("expected assignment");
    };
    assert!(matches!(value.kind, ExprKind::Assign { .. }));
}

#[test]
fn span_declaration_with_init_list() {
    let (tree, _) = parse_ok("span<float, 4> data = { 1.0f, 2.0f, 3.0f, 4.0f };");
    let [Item::GlobalVar { name, init, .. }] = tree.items.as_slice() else {
        panic!("expected a global");
    };
    assert_eq!(name, "data");
    let Some(init) = init else {
        panic!("expected initializer");
    };
    let ExprKind::InitList(values) = &init.kind else {
        panic!("expected init list");
    };
    assert_eq!(values.len(), 4);
}

#[test]
fn struct_with_method_and_operator() {
    let (tree, handler) = parse_ok(
        "struct P { float gain = 0.5f; float op(float x) { return x * gain; } \
         float operator*(float x) { return op(x); } };",
    );
    let [Item::Struct(s)] = tree.items.as_slice() else {
        panic!("expected a struct");
    };
    assert_eq!(s.members.len(), 1);
    assert_eq!(s.methods.len(), 2);
    assert_eq!(s.methods[1].name, "operator*");
    let member = sono_ir::NamespacedIdentifier::from_segment("P").child("gain");
    assert!(handler
        .symbol(&member)
        .is_some_and(|m| m.kind == SymbolKind::Member));
}

#[test]
fn private_label_applies_to_following_members() {
    let (tree, _) = parse_ok("struct S { private: float hidden; public: float shown; };");
    let [Item::Struct(s)] = tree.items.as_slice() else {
        panic!("expected a struct");
    };
    assert_eq!(s.members[0].visibility, sono_ir::Visibility::Private);
    assert_eq!(s.members[1].visibility, sono_ir::Visibility::Public);
}

#[test]
fn nested_namespaces_and_using() {
    let (tree, handler) = parse_ok(
        "namespace a { namespace b { float x = 1.0f; } } using namespace a::b;",
    );
    assert_eq!(tree.items.len(), 2);
    let x = sono_ir::NamespacedIdentifier::from_segment("a")
        .child("b")
        .child("x");
    assert!(handler.symbol(&x).is_some());
}

#[test]
fn namespace_reopening_is_allowed() {
    let (_, handler) = parse_ok("namespace a { int x = 1; } namespace a { int y = 2; }");
    let ns = sono_ir::NamespacedIdentifier::from_segment("a");
    assert!(handler.symbol(&ns.child("x")).is_some());
    assert!(handler.symbol(&ns.child("y")).is_some());
}

#[test]
fn template_function_is_registered_as_blueprint() {
    let (_, handler) = parse_ok(
        "template <typename T, int N> T sum(span<T, N>& data) { T acc = (T)0; \
         for (int i = 0; i < N; ++i) { acc += data[i]; } return acc; }",
    );
    let id = sono_ir::NamespacedIdentifier::from_segment("sum");
    assert!(handler
        .symbol(&id)
        .is_some_and(|s| s.kind == SymbolKind::TemplateFunction));
    assert!(handler.template(&id).is_some());
}

#[test]
fn template_call_syntax() {
    let (tree, _) = parse_ok("float g() { return mix<float, 2>(0.5f); }");
    let [Item::Function(f)] = tree.items.as_slice() else {
        panic!("expected one function");
    };
    let StmtKind::Block(stmts) = &f.body.kind else {
        panic!("body is a block");
    };
    let StmtKind::Return(Some(e)) = &stmts[0].kind else {
        panic!("expected return");
    };
    let ExprKind::Call { template_args, .. } = &e.kind else {
        panic!("expected a call, got {:?}", e.kind);
    };
    assert_eq!(template_args.len(), 2);
}

#[test]
fn less_than_is_not_mistaken_for_template_args() {
    let (tree, _) = parse_ok("bool f(int a, int b) { return a < b; }");
    let [Item::Function(f)] = tree.items.as_slice() else {
        panic!("expected one function");
    };
    let StmtKind::Block(stmts) = &f.body.kind else {
        panic!("body is a block");
    };
    let StmtKind::Return(Some(e)) = &stmts[0].kind else {
        panic!("expected return");
    };
    assert!(matches!(
        e.kind,
        ExprKind::Binary {
            op: BinaryOp::Lt,
            ..
        }
    ));
}

#[test]
fn redeclaration_in_same_scope_fails() {
    let Err(e) = parse_source("int x = 1; float x = 2.0f;") else {
        panic!("expected redeclaration error");
    };
    assert!(e.to_string().contains("redeclaration of 'x'"));
}

#[test]
fn redeclaration_does_not_overwrite_original() {
    // The failed parse leaves the first registration intact.
    let (_, tokens) = match lex("int x = 1; float x = 2.0f;", &Definitions::new()) {
        Ok(r) => r,
        Err(e) => panic!("lex failed: {e}"),
    };
    let mut handler = NamespaceHandler::new();
    let mut ids = NodeIdGen::new();
    assert!(crate::parse(&tokens, &mut handler, &mut ids).is_err());
    let sym = handler.symbol(&sono_ir::NamespacedIdentifier::from_segment("x"));
    assert!(sym.is_some_and(|s| s.kind == SymbolKind::Variable));
}

#[test]
fn mismatched_bracket_is_a_syntax_error() {
    let Err(e) = parse_source("int f() { return (1 + 2; }") else {
        panic!("expected syntax error");
    };
    assert!(e.to_string().contains("expected ')'"), "{e}");
}

#[test]
fn unexpected_token_reports_location() {
    let Err(e) = parse_source("int f() { return + ; }") else {
        panic!("expected syntax error");
    };
    assert!(e.location().is_some());
}

#[test]
fn cast_expression() {
    let (tree, _) = parse_ok("int f(float x) { return (int)x; }");
    let [Item::Function(f)] = tree.items.as_slice() else {
        panic!("expected one function");
    };
    let StmtKind::Block(stmts) = &f.body.kind else {
        panic!("body is a block");
    };
    let StmtKind::Return(Some(e)) = &stmts[0].kind else {
        panic!("expected return");
    };
    assert!(matches!(e.kind, ExprKind::Cast { .. }));
}

#[test]
fn for_loop_with_increment() {
    let (tree, _) = parse_ok("void f() { for (int i = 0; i < 8; ++i) { continue; } }");
    let [Item::Function(f)] = tree.items.as_slice() else {
        panic!("expected one function");
    };
    let StmtKind::Block(stmts) = &f.body.kind else {
        panic!("body is a block");
    };
    assert!(matches!(stmts[0].kind, StmtKind::For { .. }));
}

#[test]
fn ternary_and_member_index_chain() {
    let (tree, _) = parse_ok(
        "float pick(bool c) { return c ? buffer.left[0] : buffer.right[0]; }",
    );
    let [Item::Function(f)] = tree.items.as_slice() else {
        panic!("expected one function");
    };
    let StmtKind::Block(stmts) = &f.body.kind else {
        panic!("body is a block");
    };
    let StmtKind::Return(Some(e)) = &stmts[0].kind else {
        panic!("expected return");
    };
    let ExprKind::Ternary { then_value, .. } = &e.kind else {
        panic!("expected ternary");
    };
    assert!(matches!(then_value.kind, ExprKind::Index { .. }));
}
