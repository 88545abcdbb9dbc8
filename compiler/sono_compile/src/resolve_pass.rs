//! ResolvingSymbols: bind every identifier use to what it means.
//!
//! Walks each function body with a block-structured scope stack
//! (parameters are the outermost scope), then falls back to enclosing
//! struct members (inside methods) and the namespace handler. Results
//! land in the unit's `refs` side table; the type checker and backend
//! never look at raw names again.

use rustc_hash::FxHashMap;
use sono_diagnostic::{Error, Result};
use sono_ir::{Expr, ExprKind, NamespacedIdentifier, Span, Stmt, StmtKind};
use sono_resolve::{ConstValue, Policy, SymbolKind};
use sono_types::TypeInfo;
use tracing::trace;

use crate::function_table::{FunctionData, LocalDecl};
use crate::type_resolution::{resolve_type, TemplateBinding, TemplateEnv};
use crate::unit::SymbolRef;
use crate::{CompilationUnit, CompilerContext, FuncId};

/// Scope stack for one body. Block scopes shadow outward; redeclaring
/// within one block is an error.
#[derive(Default)]
struct ScopeStack {
    scopes: Vec<FxHashMap<String, usize>>,
}

impl ScopeStack {
    fn push(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        self.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }

    fn declare(&mut self, name: &str, index: usize, span: Span) -> Result<()> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(Error::compile("declaration outside any scope", span));
        };
        if scope.contains_key(name) {
            return Err(Error::redeclaration(name, span));
        }
        scope.insert(name.to_owned(), index);
        Ok(())
    }
}

struct Resolver<'a> {
    ctx: &'a mut CompilerContext,
    unit: &'a mut CompilationUnit,
    data: FunctionData,
    locals: Vec<LocalDecl>,
    env: TemplateEnv,
    scopes: ScopeStack,
    depth: u32,
}

/// Resolve one function body.
pub fn resolve_function(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    id: FuncId,
    depth: u32,
) -> Result<()> {
    let Some(mut body) = unit.functions.take_body(id) else {
        return Ok(());
    };
    let data = unit.functions.get(id).data.clone();
    trace!(function = %data.id, "resolving symbols");

    let mut resolver = Resolver {
        ctx,
        unit,
        data,
        locals: std::mem::take(&mut body.locals),
        env: body.env.clone(),
        scopes: ScopeStack::default(),
        depth,
    };

    // Parameters form the outermost scope.
    resolver.scopes.push();
    for (index, local) in resolver.locals.iter().enumerate() {
        let span = body.stmt.span;
        let name = local.name.clone();
        resolver.scopes.declare(&name, index, span)?;
    }

    let result = resolver.resolve_stmt(&mut body.stmt);
    body.locals = resolver.locals;
    unit.functions.restore_body(id, body);
    result
}

/// Resolve an inliner-produced replacement subtree in the context of
/// the function it was spliced into. Argument clones keep their
/// bindings; only nodes the rewrite built get resolved. The owning body
/// is checked out by the expansion driver, so its context comes in
/// explicitly.
pub fn resolve_replacement(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    data: &FunctionData,
    locals: &[LocalDecl],
    env: &TemplateEnv,
    expr: &mut Expr,
    depth: u32,
) -> Result<()> {
    let mut resolver = Resolver {
        ctx,
        unit,
        data: data.clone(),
        locals: locals.to_vec(),
        env: env.clone(),
        scopes: ScopeStack::default(),
        depth,
    };
    resolver.scopes.push();
    resolver.resolve_expr(expr)
}

/// Resolve a root-constructor initializer (root scope, no locals).
pub fn resolve_ctor_expr(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    expr: &mut Expr,
    depth: u32,
) -> Result<()> {
    let mut resolver = Resolver {
        ctx,
        unit,
        data: ctor_function_data(),
        locals: Vec::new(),
        env: TemplateEnv::new(),
        scopes: ScopeStack::default(),
        depth,
    };
    resolver.scopes.push();
    resolver.resolve_expr(expr)
}

/// Synthetic function data for root-constructor initializers.
pub(crate) fn ctor_function_data() -> FunctionData {
    FunctionData {
        id: NamespacedIdentifier::from_segment("__ctor"),
        mangled: "__ctor".to_owned(),
        params: Vec::new(),
        ret: TypeInfo::VOID,
        owner: None,
        scope: NamespacedIdentifier::root(),
        visibility: sono_ir::Visibility::Public,
        kind: crate::function_table::FunctionKind::Source,
        inliner: None,
    }
}

impl Resolver<'_> {
    fn resolve_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match &mut stmt.kind {
            StmtKind::Block(stmts) => {
                self.scopes.push();
                for s in stmts {
                    self.resolve_stmt(s)?;
                }
                self.scopes.pop();
                Ok(())
            }
            StmtKind::VarDecl { name, ty, init } => {
                if let Some(init) = init {
                    self.resolve_expr(init)?;
                }
                let resolved = resolve_type(
                    self.ctx,
                    self.unit,
                    ty,
                    &self.env,
                    &self.data.scope,
                    self.depth,
                )?;
                if resolved.is_ref() {
                    return Err(Error::compile(
                        format!("local '{name}' cannot be a reference"),
                        stmt.span,
                    ));
                }
                if resolved.is_void() {
                    return Err(Error::compile(
                        format!("local '{name}' cannot be 'void'"),
                        stmt.span,
                    ));
                }
                let index = self.locals.len();
                self.locals.push(LocalDecl {
                    name: name.clone(),
                    ty: resolved,
                });
                self.scopes.declare(name, index, stmt.span)?;
                self.unit.refs.insert(stmt.id, SymbolRef::Local(index));
                Ok(())
            }
            StmtKind::Expr(expr) => self.resolve_expr(expr),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(cond)?;
                self.resolve_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                self.resolve_expr(cond)?;
                self.resolve_stmt(body)
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.scopes.push();
                if let Some(init) = init {
                    self.resolve_stmt(init)?;
                }
                if let Some(cond) = cond {
                    self.resolve_expr(cond)?;
                }
                if let Some(step) = step {
                    self.resolve_expr(step)?;
                }
                self.resolve_stmt(body)?;
                self.scopes.pop();
                Ok(())
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.resolve_expr(value)?;
                }
                Ok(())
            }
            StmtKind::Break | StmtKind::Continue => Ok(()),
        }
    }

    pub(crate) fn resolve_expr(&mut self, expr: &mut Expr) -> Result<()> {
        match &mut expr.kind {
            ExprKind::IntLit(_)
            | ExprKind::FloatLit(_)
            | ExprKind::DoubleLit(_)
            | ExprKind::BoolLit(_) => Ok(()),
            ExprKind::Symbol {
                path,
                explicit_scope,
            } => {
                // Spliced subtrees arrive with their argument nodes
                // already resolved; only fresh nodes need binding.
                if self.unit.refs.contains_key(&expr.id) {
                    return Ok(());
                }
                let reference =
                    self.resolve_symbol(path, *explicit_scope, expr.span)?;
                self.unit.refs.insert(expr.id, reference);
                Ok(())
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)
            }
            ExprKind::Ternary {
                cond,
                then_value,
                else_value,
            } => {
                self.resolve_expr(cond)?;
                self.resolve_expr(then_value)?;
                self.resolve_expr(else_value)
            }
            ExprKind::Assign { target, value, .. } => {
                self.resolve_expr(target)?;
                self.resolve_expr(value)
            }
            ExprKind::IncDec { target, .. } => self.resolve_expr(target),
            ExprKind::Call { callee, args, .. } => {
                // Method callees resolve through their receiver's type;
                // only the receiver expression needs names bound here.
                match &mut callee.kind {
                    ExprKind::Member { base, .. } => self.resolve_expr(base)?,
                    _ => self.resolve_expr(callee)?,
                }
                for arg in args {
                    self.resolve_expr(arg)?;
                }
                Ok(())
            }
            ExprKind::Member { base, .. } => self.resolve_expr(base),
            ExprKind::Index { base, index } => {
                self.resolve_expr(base)?;
                self.resolve_expr(index)
            }
            ExprKind::Cast { expr: inner, .. } => self.resolve_expr(inner),
            ExprKind::InitList(values) => {
                for value in values {
                    self.resolve_expr(value)?;
                }
                Ok(())
            }
        }
    }

    fn resolve_symbol(
        &mut self,
        path: &NamespacedIdentifier,
        explicit_scope: bool,
        span: Span,
    ) -> Result<SymbolRef> {
        // Locals and template constants shadow everything for bare
        // names.
        if !path.is_qualified() {
            if let Some(name) = path.last() {
                if let Some(index) = self.scopes.lookup(name) {
                    return Ok(SymbolRef::Local(index));
                }
                if let Some(TemplateBinding::Const(v)) = self.env.get(name) {
                    return Ok(SymbolRef::Const(ConstValue::Int(*v)));
                }
                // Bare member access inside a method.
                if let Some(owner) = self.data.owner {
                    if let Some(member) = self.ctx.registry.get(owner).member(name) {
                        return Ok(SymbolRef::Member {
                            offset: member.offset,
                            ty: member.ty,
                        });
                    }
                    if let Some(method) = self.unit.functions.lookup_method(owner, name) {
                        return Ok(SymbolRef::Function(method));
                    }
                }
            }
        }

        let symbol = self
            .ctx
            .handler
            .resolve(path, explicit_scope, &self.data.scope, Policy::MustExist, span)?
            .cloned();
        let Some(symbol) = symbol else {
            return Err(Error::unresolved(path.to_string(), span));
        };

        match symbol.kind {
            SymbolKind::Constant => match symbol.const_value {
                Some(value) => Ok(SymbolRef::Const(value)),
                None => Err(Error::compile(
                    format!("constant '{}' used before its value is known", symbol.id),
                    span,
                )),
            },
            SymbolKind::Variable => {
                let index = self.unit.data.lookup(&symbol.id).ok_or_else(|| {
                    Error::compile(
                        format!("'{}' has no storage allocated", symbol.id),
                        span,
                    )
                })?;
                Ok(SymbolRef::Global(index))
            }
            SymbolKind::Function => {
                let id = self.unit.functions.lookup(&symbol.id).ok_or_else(|| {
                    Error::unresolved(symbol.id.to_string(), span)
                })?;
                Ok(SymbolRef::Function(id))
            }
            SymbolKind::TemplateFunction => Ok(SymbolRef::TemplatePending),
            SymbolKind::Method => {
                // A sibling method named without a receiver.
                let owner = self.data.owner.ok_or_else(|| {
                    Error::compile(
                        format!("method '{}' needs an object", symbol.id),
                        span,
                    )
                })?;
                let name = symbol.id.last().unwrap_or_default();
                self.unit
                    .functions
                    .lookup_method(owner, name)
                    .map(SymbolRef::Function)
                    .ok_or_else(|| Error::unresolved(symbol.id.to_string(), span))
            }
            SymbolKind::Member => {
                let owner = self.data.owner.ok_or_else(|| {
                    Error::compile(
                        format!("member '{}' needs an object", symbol.id),
                        span,
                    )
                })?;
                let name = symbol.id.last().unwrap_or_default();
                let member = self.ctx.registry.get(owner).member(name).ok_or_else(|| {
                    Error::unresolved(symbol.id.to_string(), span)
                })?;
                Ok(SymbolRef::Member {
                    offset: member.offset,
                    ty: member.ty,
                })
            }
            SymbolKind::Struct | SymbolKind::TemplateStruct | SymbolKind::Namespace => {
                Err(Error::type_mismatch(
                    "a value",
                    format!("type or namespace '{}'", symbol.id),
                    span,
                ))
            }
        }
    }
}
