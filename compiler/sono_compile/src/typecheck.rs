//! TypeCheck: compute every expression's type, insert implicit casts,
//! dispatch operator overloads and method calls, enforce visibility.
//!
//! Widening `int → float → double` happens silently by inserting
//! explicit cast nodes; the backend never converts on its own, so
//! what the checker records is exactly what the generated code does.
//! `bool` stays isolated from the numeric tower except in condition
//! positions, where numeric operands are rewritten into comparisons
//! against zero.

use sono_diagnostic::{Error, Result};
use sono_ir::{
    BinaryOp, Expr, ExprKind, ParsedType, ScalarKeyword, Span, Stmt, StmtKind,
};
use sono_resolve::{ConstValue, Instantiation, InstantiationKey, TemplateKind};
use sono_types::{
    common_numeric, explicit_convertible, implicit_convertible, ComplexTypeKind, Modifiers,
    ScalarType, TypeInfo,
};
use tracing::trace;

use crate::function_table::{FunctionData, FunctionKind, LocalDecl};
use crate::type_resolution::{resolve_template_args, resolve_type, TemplateEnv};
use crate::unit::SymbolRef;
use crate::{CompilationUnit, CompilerContext, FuncId};

pub struct Checker<'a> {
    ctx: &'a mut CompilerContext,
    unit: &'a mut CompilationUnit,
    data: FunctionData,
    locals: Vec<LocalDecl>,
    env: TemplateEnv,
    loop_depth: u32,
    depth: u32,
}

/// Type-check one function body.
pub fn typecheck_function(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    id: FuncId,
    depth: u32,
) -> Result<()> {
    let Some(mut body) = unit.functions.take_body(id) else {
        return Ok(());
    };
    let data = unit.functions.get(id).data.clone();
    trace!(function = %data.id, "type checking");

    let mut checker = Checker {
        ctx,
        unit,
        data,
        locals: std::mem::take(&mut body.locals),
        env: body.env.clone(),
        loop_depth: 0,
        depth,
    };
    let result = checker.check_stmt(&mut body.stmt);
    body.locals = checker.locals;
    unit.functions.restore_body(id, body);
    result
}

/// Type-check a root-constructor initializer against its global's type.
pub fn typecheck_ctor_expr(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    expr: &mut Expr,
    expected: TypeInfo,
    depth: u32,
) -> Result<()> {
    let mut checker = Checker {
        ctx,
        unit,
        data: crate::resolve_pass::ctor_function_data(),
        locals: Vec::new(),
        env: TemplateEnv::new(),
        loop_depth: 0,
        depth,
    };
    checker.check_expr(expr)?;
    checker.convert_to(expr, expected)
}

/// Type-check an inliner-produced replacement subtree in the context of
/// the function it was spliced into. The owning body is checked out by
/// the expansion driver, so its context comes in explicitly.
pub fn typecheck_replacement(
    ctx: &mut CompilerContext,
    unit: &mut CompilationUnit,
    data: &FunctionData,
    locals: &[LocalDecl],
    env: &TemplateEnv,
    expr: &mut Expr,
    depth: u32,
) -> Result<TypeInfo> {
    let mut checker = Checker {
        ctx,
        unit,
        data: data.clone(),
        locals: locals.to_vec(),
        env: env.clone(),
        loop_depth: 0,
        depth,
    };
    checker.check_expr(expr)
}

impl Checker<'_> {
    fn check_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match &mut stmt.kind {
            StmtKind::Block(stmts) => {
                for s in stmts {
                    self.check_stmt(s)?;
                }
                Ok(())
            }
            StmtKind::VarDecl { init, .. } => {
                let Some(SymbolRef::Local(index)) = self.unit.refs.get(&stmt.id).cloned() else {
                    return Err(Error::compile(
                        "declaration was not resolved",
                        stmt.span,
                    ));
                };
                let ty = self.locals[index].ty;
                let Some(init) = init else {
                    return Ok(());
                };
                if let ExprKind::InitList(_) = init.kind {
                    return self.check_aggregate_init(init, ty);
                }
                self.check_expr(init)?;
                self.convert_to(init, ty)
            }
            StmtKind::Expr(expr) => {
                self.check_expr(expr)?;
                Ok(())
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_condition(cond)?;
                self.check_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                self.check_condition(cond)?;
                self.loop_depth += 1;
                let result = self.check_stmt(body);
                self.loop_depth -= 1;
                result
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.check_stmt(init)?;
                }
                if let Some(cond) = cond {
                    self.check_condition(cond)?;
                }
                if let Some(step) = step {
                    self.check_expr(step)?;
                }
                self.loop_depth += 1;
                let result = self.check_stmt(body);
                self.loop_depth -= 1;
                result
            }
            StmtKind::Return(value) => {
                let ret = self.data.ret;
                match value {
                    Some(value) => {
                        if ret.is_void() {
                            return Err(Error::type_mismatch(
                                "no return value",
                                "a value",
                                value.span,
                            ));
                        }
                        self.check_expr(value)?;
                        self.convert_to(value, ret)
                    }
                    None => {
                        if ret.is_void() {
                            Ok(())
                        } else {
                            Err(Error::type_mismatch(
                                self.ctx.registry.describe(&ret),
                                "no return value",
                                stmt.span,
                            ))
                        }
                    }
                }
            }
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    Err(Error::syntax(
                        "'break'/'continue' outside of a loop",
                        stmt.span,
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// `{ ... }` initializer for a local span or struct.
    fn check_aggregate_init(&mut self, init: &mut Expr, ty: TypeInfo) -> Result<()> {
        let Some(complex) = ty.complex_id() else {
            return Err(Error::type_mismatch(
                self.ctx.registry.describe(&ty),
                "an initializer list",
                init.span,
            ));
        };
        let kind = self.ctx.registry.get(complex).kind.clone();
        let ExprKind::InitList(values) = &mut init.kind else {
            return Err(Error::compile("expected an initializer list", init.span));
        };
        match kind {
            ComplexTypeKind::Span { elem, len } => {
                if values.len() != len as usize {
                    return Err(Error::type_mismatch(
                        format!("{len} initializer values"),
                        format!("{}", values.len()),
                        init.span,
                    ));
                }
                for value in values.iter_mut() {
                    self.check_expr(value)?;
                    self.convert_to(value, elem)?;
                }
            }
            ComplexTypeKind::Struct { members } => {
                if values.len() > members.len() {
                    return Err(Error::type_mismatch(
                        format!("at most {} initializer values", members.len()),
                        format!("{}", values.len()),
                        init.span,
                    ));
                }
                for (member, value) in members.iter().zip(values.iter_mut()) {
                    self.check_expr(value)?;
                    self.convert_to(value, member.ty)?;
                }
            }
        }
        self.unit.set_type(init.id, ty);
        Ok(())
    }

    pub(crate) fn check_expr(&mut self, expr: &mut Expr) -> Result<TypeInfo> {
        let ty = self.infer_expr(expr)?;
        self.unit.set_type(expr.id, ty);
        Ok(ty)
    }

    fn infer_expr(&mut self, expr: &mut Expr) -> Result<TypeInfo> {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::IntLit(_) => Ok(TypeInfo::INT),
            ExprKind::FloatLit(_) => Ok(TypeInfo::FLOAT),
            ExprKind::DoubleLit(_) => Ok(TypeInfo::DOUBLE),
            ExprKind::BoolLit(_) => Ok(TypeInfo::BOOL),
            ExprKind::Symbol { path, .. } => {
                match self.unit.refs.get(&expr.id) {
                    Some(SymbolRef::Local(index)) => Ok(self.locals[*index].ty),
                    Some(SymbolRef::Global(index)) => Ok(self.unit.data.entries[*index].ty),
                    Some(SymbolRef::Const(ConstValue::Int(_))) => Ok(TypeInfo::INT),
                    Some(SymbolRef::Const(ConstValue::Float(_))) => Ok(TypeInfo::DOUBLE),
                    Some(SymbolRef::Member { ty, .. }) => Ok(*ty),
                    Some(SymbolRef::Function(_) | SymbolRef::TemplatePending) => Err(
                        Error::type_mismatch("a value", format!("function '{path}'"), span),
                    ),
                    None => Err(Error::compile(
                        format!("'{path}' was not resolved"),
                        span,
                    )),
                }
            }
            ExprKind::Unary { op, operand } => {
                use sono_ir::UnaryOp;
                match op {
                    UnaryOp::Neg => {
                        let ty = self.check_expr(operand)?;
                        if !ty.is_numeric() {
                            return Err(Error::type_mismatch(
                                "a numeric operand",
                                self.ctx.registry.describe(&ty),
                                operand.span,
                            ));
                        }
                        Ok(ty.value_type())
                    }
                    UnaryOp::Not => {
                        self.check_condition(operand)?;
                        Ok(TypeInfo::BOOL)
                    }
                    UnaryOp::BitNot => {
                        let ty = self.check_expr(operand)?;
                        if ty.value_type() != TypeInfo::INT {
                            return Err(Error::type_mismatch(
                                "int",
                                self.ctx.registry.describe(&ty),
                                operand.span,
                            ));
                        }
                        Ok(TypeInfo::INT)
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let lhs_ty = self.check_expr(lhs)?;

                // Operator overloading: a struct on the left dispatches
                // to its `operator*` method.
                if lhs_ty.complex_id().is_some()
                    && matches!(
                        op,
                        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
                    )
                {
                    return self.rewrite_operator_overload(expr, op);
                }

                if op.is_logical() {
                    self.check_condition(lhs)?;
                    self.check_condition(rhs)?;
                    return Ok(TypeInfo::BOOL);
                }

                let rhs_ty = self.check_expr(rhs)?;

                if op.is_integer_only() {
                    for (side_span, ty) in [(lhs.span, lhs_ty), (rhs.span, rhs_ty)] {
                        if ty.value_type() != TypeInfo::INT {
                            return Err(Error::type_mismatch(
                                "int",
                                self.ctx.registry.describe(&ty),
                                side_span,
                            ));
                        }
                    }
                    return Ok(TypeInfo::INT);
                }

                if op.is_comparison() && lhs_ty.is_bool() && rhs_ty.is_bool() {
                    if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
                        return Ok(TypeInfo::BOOL);
                    }
                    return Err(Error::type_mismatch(
                        "numeric operands",
                        "bool",
                        span,
                    ));
                }

                let common = common_numeric(lhs_ty, rhs_ty).ok_or_else(|| {
                    Error::type_mismatch(
                        "numeric operands",
                        format!(
                            "{} and {}",
                            self.ctx.registry.describe(&lhs_ty),
                            self.ctx.registry.describe(&rhs_ty)
                        ),
                        span,
                    )
                })?;
                let common = TypeInfo::scalar(common);
                self.convert_to(lhs, common)?;
                self.convert_to(rhs, common)?;
                Ok(if op.is_comparison() {
                    TypeInfo::BOOL
                } else {
                    common
                })
            }
            ExprKind::Ternary {
                cond,
                then_value,
                else_value,
            } => {
                self.check_condition(cond)?;
                let then_ty = self.check_expr(then_value)?;
                let else_ty = self.check_expr(else_value)?;
                if then_ty.value_type() == else_ty.value_type() {
                    return Ok(then_ty.value_type());
                }
                let common = common_numeric(then_ty, else_ty).ok_or_else(|| {
                    Error::type_mismatch(
                        self.ctx.registry.describe(&then_ty),
                        self.ctx.registry.describe(&else_ty),
                        else_value.span,
                    )
                })?;
                let common = TypeInfo::scalar(common);
                self.convert_to(then_value, common)?;
                self.convert_to(else_value, common)?;
                Ok(common)
            }
            ExprKind::Assign { op, target, value } => {
                let target_ty = self.check_expr(target)?;
                self.check_assignable(target)?;
                if target_ty.complex_id().is_some() {
                    return Err(Error::type_mismatch(
                        "a scalar assignment target",
                        self.ctx.registry.describe(&target_ty),
                        target.span,
                    ));
                }
                let target_ty = target_ty.value_type();
                if let Some(op) = op {
                    if op.is_integer_only() && target_ty != TypeInfo::INT {
                        return Err(Error::type_mismatch(
                            "int",
                            self.ctx.registry.describe(&target_ty),
                            target.span,
                        ));
                    }
                }
                self.check_expr(value)?;
                self.convert_to(value, target_ty)?;
                Ok(target_ty)
            }
            ExprKind::IncDec { target, .. } => {
                let ty = self.check_expr(target)?;
                self.check_assignable(target)?;
                if !ty.is_numeric() {
                    return Err(Error::type_mismatch(
                        "a numeric operand",
                        self.ctx.registry.describe(&ty),
                        target.span,
                    ));
                }
                Ok(ty.value_type())
            }
            ExprKind::Call { .. } => self.check_call(expr),
            ExprKind::Member { base, name } => {
                let base_ty = self.check_expr(base)?;
                let name = name.clone();
                self.member_access(base_ty, &name, span)
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.check_expr(base)?;
                self.check_expr(index)?;
                self.convert_to(index, TypeInfo::INT)?;
                if base_ty.is_ptr() {
                    // Raw channel pointer from a process-data block.
                    let mut elem = base_ty.value_type();
                    elem.modifiers.remove(Modifiers::PTR);
                    return Ok(elem);
                }
                let elem = base_ty
                    .complex_id()
                    .and_then(|id| match &self.ctx.registry.get(id).kind {
                        ComplexTypeKind::Span { elem, .. } => Some(*elem),
                        ComplexTypeKind::Struct { .. } => None,
                    });
                elem.ok_or_else(|| {
                    Error::type_mismatch(
                        "an indexable span",
                        self.ctx.registry.describe(&base_ty),
                        base.span,
                    )
                })
            }
            ExprKind::Cast { ty, expr: inner } => {
                let from = self.check_expr(inner)?;
                let ty = ty.clone();
                let target = resolve_type(
                    self.ctx,
                    self.unit,
                    &ty,
                    &self.env,
                    &self.data.scope,
                    self.depth,
                )?;
                if !explicit_convertible(from, target) {
                    return Err(Error::type_mismatch(
                        self.ctx.registry.describe(&target),
                        self.ctx.registry.describe(&from),
                        span,
                    ));
                }
                Ok(target.value_type())
            }
            ExprKind::InitList(_) => Err(Error::compile(
                "initializer lists are only allowed in declarations",
                span,
            )),
        }
    }

    /// Rewrite `a op b` with struct-typed `a` into `a.operator+(b)`.
    fn rewrite_operator_overload(&mut self, expr: &mut Expr, op: BinaryOp) -> Result<TypeInfo> {
        let span = expr.span;
        let placeholder = ExprKind::BoolLit(false);
        let ExprKind::Binary { lhs, rhs, .. } = std::mem::replace(&mut expr.kind, placeholder)
        else {
            return Err(Error::compile("operator rewrite on a non-binary node", span));
        };
        let callee = Expr::new(
            self.unit.ids.next(),
            span,
            ExprKind::Member {
                base: lhs,
                name: format!("operator{}", op.symbol()),
            },
        );
        expr.kind = ExprKind::Call {
            callee: Box::new(callee),
            template_args: Vec::new(),
            args: vec![*rhs],
        };
        self.check_call(expr)
    }

    fn check_call(&mut self, expr: &mut Expr) -> Result<TypeInfo> {
        let span = expr.span;
        let call_id = expr.id;
        let ExprKind::Call {
            callee,
            template_args,
            args,
        } = &mut expr.kind
        else {
            return Err(Error::compile("not a call", span));
        };

        match &mut callee.kind {
            ExprKind::Member { base, name } => {
                if !template_args.is_empty() {
                    return Err(Error::compile(
                        "method calls cannot take template arguments",
                        span,
                    ));
                }
                let base_ty = self.check_expr(base)?;
                let Some(owner) = base_ty.complex_id() else {
                    return Err(Error::type_mismatch(
                        "a struct value",
                        self.ctx.registry.describe(&base_ty),
                        base.span,
                    ));
                };
                let name = name.clone();
                let method = self
                    .unit
                    .functions
                    .lookup_method(owner, &name)
                    .ok_or_else(|| {
                        Error::unresolved(
                            format!("{}::{name}", self.ctx.registry.describe(&base_ty)),
                            span,
                        )
                    })?;
                let data = self.unit.functions.get(method).data.clone();
                if data.visibility == sono_ir::Visibility::Private
                    && self.data.owner != Some(owner)
                {
                    return Err(Error::access(data.id.to_string(), span));
                }
                self.check_args(args, &data, span)?;
                self.unit.refs.insert(call_id, SymbolRef::Function(method));
                Ok(data.ret)
            }
            ExprKind::Symbol { path, .. } => {
                let path = path.clone();
                match self.unit.refs.get(&callee.id).cloned() {
                    Some(SymbolRef::Function(id)) => {
                        if !template_args.is_empty() {
                            return Err(Error::compile(
                                format!("'{path}' is not a template"),
                                span,
                            ));
                        }
                        let data = self.unit.functions.get(id).data.clone();
                        if let FunctionKind::Builtin { unify_numeric: true, .. } = data.kind {
                            let unified = self.unify_builtin_args(args, &data, span)?;
                            self.unit.refs.insert(call_id, SymbolRef::Function(id));
                            return Ok(unified);
                        }
                        if data.visibility == sono_ir::Visibility::Private
                            && self.data.owner != data.owner
                        {
                            return Err(Error::access(data.id.to_string(), span));
                        }
                        self.check_args(args, &data, span)?;
                        self.unit.refs.insert(call_id, SymbolRef::Function(id));
                        Ok(data.ret)
                    }
                    Some(SymbolRef::TemplatePending) => {
                        self.check_template_call(call_id, &path, template_args, args, span)
                    }
                    _ => Err(Error::type_mismatch(
                        "a callable function",
                        path.to_string(),
                        span,
                    )),
                }
            }
            _ => Err(Error::type_mismatch(
                "a function or method",
                "an expression",
                span,
            )),
        }
    }

    /// Type a call to a function template from its substituted
    /// signature, deferring body instantiation to the
    /// FunctionTemplateParsing stage.
    fn check_template_call(
        &mut self,
        call_id: sono_ir::NodeId,
        path: &sono_ir::NamespacedIdentifier,
        template_args: &[sono_ir::ParsedTemplateArg],
        args: &mut [Expr],
        span: Span,
    ) -> Result<TypeInfo> {
        let symbol = self
            .ctx
            .handler
            .resolve(
                path,
                path.is_qualified(),
                &self.data.scope,
                sono_resolve::Policy::MustExist,
                span,
            )?
            .cloned();
        let Some(symbol) = symbol else {
            return Err(Error::unresolved(path.to_string(), span));
        };
        let template_id = symbol.id;
        let resolved_args = resolve_template_args(
            self.ctx,
            self.unit,
            template_args,
            &self.env,
            &self.data.scope,
            span,
            self.depth,
        )?;

        let decl = self
            .ctx
            .handler
            .template(&template_id)
            .cloned()
            .ok_or_else(|| Error::unresolved(template_id.to_string(), span))?;
        let TemplateKind::Function(def) = &decl.kind else {
            return Err(Error::type_mismatch(
                "a function template",
                format!("struct template '{template_id}'"),
                span,
            ));
        };
        let env = crate::template_inst::bind_params(&decl.params, &resolved_args, span)?;

        // Substituted signature, no body processing yet.
        let ret = resolve_type(self.ctx, self.unit, &def.ret, &env, &decl.owner, self.depth)?;
        if args.len() != def.params.len() {
            return Err(Error::type_mismatch(
                format!("{} arguments", def.params.len()),
                format!("{}", args.len()),
                span,
            ));
        }
        for (arg, param) in args.iter_mut().zip(&def.params) {
            let param_ty =
                resolve_type(self.ctx, self.unit, &param.ty, &env, &decl.owner, self.depth)?;
            self.check_arg(arg, param_ty)?;
        }

        // Memoized instantiations may already carry the concrete id.
        let key = InstantiationKey {
            template: template_id.clone(),
            args: resolved_args.clone(),
        };
        if let Some(Instantiation::Function(concrete)) = self.ctx.handler.instantiation(&key) {
            if let Some(fid) = self.unit.functions.lookup(concrete) {
                self.unit.refs.insert(call_id, SymbolRef::Function(fid));
                return Ok(ret);
            }
        }
        self.unit
            .pending_templates
            .push((call_id, span, template_id, resolved_args));
        Ok(ret)
    }

    fn check_args(&mut self, args: &mut [Expr], data: &FunctionData, span: Span) -> Result<()> {
        if args.len() != data.params.len() {
            return Err(Error::type_mismatch(
                format!("{} arguments", data.params.len()),
                format!("{}", args.len()),
                span,
            ));
        }
        for (arg, (_, param_ty)) in args.iter_mut().zip(&data.params) {
            self.check_arg(arg, *param_ty)?;
        }
        Ok(())
    }

    fn check_arg(&mut self, arg: &mut Expr, param_ty: TypeInfo) -> Result<()> {
        let arg_ty = self.check_expr(arg)?;
        if param_ty.is_ref() {
            // Reference parameters bind lvalues of the exact type.
            if !arg.is_lvalue() {
                return Err(Error::type_mismatch(
                    "an assignable value for a reference parameter",
                    "a temporary",
                    arg.span,
                ));
            }
            if arg_ty.value_type() != param_ty.value_type() {
                return Err(Error::type_mismatch(
                    self.ctx.registry.describe(&param_ty),
                    self.ctx.registry.describe(&arg_ty),
                    arg.span,
                ));
            }
            return Ok(());
        }
        self.convert_to(arg, param_ty.value_type())
    }

    /// Numeric-unifying built-ins: every argument widens to one scalar
    /// type (at least `float`), which is also the result.
    fn unify_builtin_args(
        &mut self,
        args: &mut [Expr],
        data: &FunctionData,
        span: Span,
    ) -> Result<TypeInfo> {
        if args.len() != data.params.len() {
            return Err(Error::type_mismatch(
                format!("{} arguments", data.params.len()),
                format!("{}", args.len()),
                span,
            ));
        }
        let mut unified = TypeInfo::FLOAT;
        for arg in args.iter_mut() {
            let ty = self.check_expr(arg)?;
            if !ty.is_numeric() {
                return Err(Error::type_mismatch(
                    "a numeric argument",
                    self.ctx.registry.describe(&ty),
                    arg.span,
                ));
            }
            if let Some(common) = common_numeric(unified, ty) {
                unified = TypeInfo::scalar(common);
            }
        }
        for arg in args.iter_mut() {
            self.convert_to(arg, unified)?;
        }
        Ok(unified)
    }

    fn member_access(&mut self, base_ty: TypeInfo, name: &str, span: Span) -> Result<TypeInfo> {
        let Some(owner) = base_ty.complex_id() else {
            return Err(Error::type_mismatch(
                "a struct value",
                self.ctx.registry.describe(&base_ty),
                span,
            ));
        };
        let member = self
            .ctx
            .registry
            .get(owner)
            .member(name)
            .map(|m| (m.ty, m.visibility));
        let Some((ty, visibility)) = member else {
            return Err(Error::unresolved(
                format!("{}::{name}", self.ctx.registry.describe(&base_ty)),
                span,
            ));
        };
        if visibility == sono_ir::Visibility::Private && self.data.owner != Some(owner) {
            return Err(Error::access(
                format!("{}::{name}", self.ctx.registry.describe(&base_ty)),
                span,
            ));
        }
        Ok(ty)
    }

    /// Conditions accept `bool` directly; numeric operands compare
    /// against zero.
    fn check_condition(&mut self, expr: &mut Expr) -> Result<()> {
        let ty = self.check_expr(expr)?;
        if ty.is_bool() {
            return Ok(());
        }
        let Some(scalar) = ty.value_type().scalar_type() else {
            return Err(Error::type_mismatch(
                "a boolean condition",
                self.ctx.registry.describe(&ty),
                expr.span,
            ));
        };
        if scalar.numeric_rank().is_none() {
            return Err(Error::type_mismatch(
                "a boolean condition",
                self.ctx.registry.describe(&ty),
                expr.span,
            ));
        }

        // Rewrite `x` into `x != 0`.
        let span = expr.span;
        let zero_kind = match scalar {
            ScalarType::Int => ExprKind::IntLit(0),
            ScalarType::Float => ExprKind::FloatLit(0.0),
            _ => ExprKind::DoubleLit(0.0),
        };
        let zero = Expr::new(self.unit.ids.next(), span, zero_kind);
        self.unit.set_type(zero.id, ty.value_type());
        let operand = std::mem::replace(
            expr,
            Expr::new(self.unit.ids.next(), span, ExprKind::BoolLit(false)),
        );
        *expr = Expr::new(
            self.unit.ids.next(),
            span,
            ExprKind::Binary {
                op: BinaryOp::Ne,
                lhs: Box::new(operand),
                rhs: Box::new(zero),
            },
        );
        self.unit.set_type(expr.id, TypeInfo::BOOL);
        Ok(())
    }

    fn check_assignable(&mut self, target: &Expr) -> Result<()> {
        match &target.kind {
            ExprKind::Symbol { path, .. } => match self.unit.refs.get(&target.id) {
                Some(SymbolRef::Const(_)) => Err(Error::compile(
                    format!("cannot assign to constant '{path}'"),
                    target.span,
                )),
                Some(SymbolRef::Global(index)) => {
                    if self.unit.data.entries[*index].is_const {
                        Err(Error::compile(
                            format!("cannot assign to constant '{path}'"),
                            target.span,
                        ))
                    } else {
                        Ok(())
                    }
                }
                Some(SymbolRef::Local(index)) => {
                    if self.locals[*index].ty.is_const() {
                        Err(Error::compile(
                            format!("cannot assign to constant '{path}'"),
                            target.span,
                        ))
                    } else {
                        Ok(())
                    }
                }
                _ => Ok(()),
            },
            ExprKind::Member { .. } | ExprKind::Index { .. } => Ok(()),
            _ => Err(Error::syntax(
                "left side of assignment is not assignable",
                target.span,
            )),
        }
    }

    /// Insert an implicit widening cast if needed; reject anything the
    /// conversion rules forbid.
    pub(crate) fn convert_to(&mut self, expr: &mut Expr, target: TypeInfo) -> Result<()> {
        let Some(actual) = self.unit.type_of(expr.id) else {
            return Err(Error::compile("expression was not type-checked", expr.span));
        };
        let target = target.value_type();
        if actual.value_type() == target {
            return Ok(());
        }
        if !implicit_convertible(actual, target) {
            return Err(Error::type_mismatch(
                self.ctx.registry.describe(&target),
                self.ctx.registry.describe(&actual),
                expr.span,
            ));
        }
        let Some(scalar) = target.scalar_type() else {
            return Err(Error::type_mismatch(
                self.ctx.registry.describe(&target),
                self.ctx.registry.describe(&actual),
                expr.span,
            ));
        };

        let span = expr.span;
        let keyword = match scalar {
            ScalarType::Int => ScalarKeyword::Int,
            ScalarType::Float => ScalarKeyword::Float,
            ScalarType::Double => ScalarKeyword::Double,
            ScalarType::Bool => ScalarKeyword::Bool,
            ScalarType::Void => ScalarKeyword::Void,
        };
        let inner = std::mem::replace(
            expr,
            Expr::new(self.unit.ids.next(), span, ExprKind::BoolLit(false)),
        );
        *expr = Expr::new(
            self.unit.ids.next(),
            span,
            ExprKind::Cast {
                ty: ParsedType::scalar(keyword, span),
                expr: Box::new(inner),
            },
        );
        self.unit.set_type(expr.id, target);
        Ok(())
    }
}
