//! Lowering the checked unit to native code.
//!
//! Direct translation of the typed tree into Cranelift IR: scalars live
//! in SSA variables, aggregates in explicit stack slots or the root
//! data section, struct member access is a load/store at the offset the
//! type registry computed. The translator performs no conversions of
//! its own: every numeric conversion in the output corresponds to a
//! cast node the type checker inserted.
//!
//! Anything unexpected here is a bug in an earlier pass, and fails fast
//! with a diagnostic instead of emitting undefined code.

use cranelift_codegen::entity::EntityRef;
use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::{
    types, AbiParam, InstBuilder, MemFlags, StackSlotData, StackSlotKind, Type, Value,
};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext, Variable};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{DataDescription, DataId, FuncId as ClifFuncId, Linkage, Module};
use rustc_hash::FxHashMap;
use sono_diagnostic::{Error, Result};
use sono_ir::{BinaryOp, Expr, ExprKind, Span, Stmt, StmtKind, UnaryOp};
use sono_types::{BaseType, ComplexTypeKind, ScalarType, TypeInfo, TypeRegistry};
use tracing::{debug, trace};

use sono_compile::{
    CompilationUnit, CompilerContext, CompilerSettings, ConstValue, Folded, FuncId, FunctionKind,
    Inliner, Intrinsic, NativeNames, OptimizationFlags, SymbolRef,
};

use crate::intrinsics;
use crate::object::{CompiledProgram, FunctionEntry, ParamSig};

const ROOT_DATA: &str = "sono.root";
const CTOR_NAME: &str = "sono.ctor";

fn internal(message: impl Into<String>, span: Span) -> Error {
    Error::compile(format!("backend error: {}", message.into()), span)
}

fn scalar_clif(scalar: ScalarType) -> Type {
    match scalar {
        ScalarType::Int => types::I32,
        ScalarType::Float => types::F32,
        ScalarType::Double => types::F64,
        ScalarType::Bool => types::I8,
        ScalarType::Void => types::I32,
    }
}

fn clif_type(ty: TypeInfo) -> Type {
    if ty.is_pointer_sized() {
        return types::I64;
    }
    match ty.scalar_type() {
        Some(s) => scalar_clif(s),
        None => types::I64,
    }
}

/// Compile the whole unit into a runnable program.
pub fn compile_unit(
    ctx: &CompilerContext,
    unit: &CompilationUnit,
    settings_in: &CompilerSettings,
) -> Result<CompiledProgram> {
    let mut jit_builder = JITBuilder::with_flags(
        &[("opt_level", "speed")],
        cranelift_module::default_libcall_names(),
    )
    .map_err(|e| internal(format!("jit initialisation failed: {e}"), Span::DUMMY))?;

    // Library shims become resolvable import symbols.
    let natives = intrinsics::registry();
    for native in &natives {
        jit_builder.symbol(native.name, native.address);
    }
    let mut module = JITModule::new(jit_builder);

    // Root data section.
    let data_id = module
        .declare_data(ROOT_DATA, Linkage::Export, true, false)
        .map_err(|e| internal(format!("data declaration failed: {e}"), Span::DUMMY))?;
    let mut desc = DataDescription::new();
    let mut image = unit.data.image.clone();
    if image.is_empty() {
        image.push(0);
    }
    desc.define(image.into_boxed_slice());
    desc.set_align(u64::from(unit.data.align.max(8)));
    module
        .define_data(data_id, &desc)
        .map_err(|e| internal(format!("data definition failed: {e}"), Span::DUMMY))?;

    // Declare imports for the native library.
    let mut native_ids: FxHashMap<&'static str, ClifFuncId> = FxHashMap::default();
    for native in &natives {
        let mut sig = module.make_signature();
        let ty = scalar_clif(native.scalar);
        for _ in 0..native.arity {
            sig.params.push(AbiParam::new(ty));
        }
        sig.returns.push(AbiParam::new(ty));
        let id = module
            .declare_function(native.name, Linkage::Import, &sig)
            .map_err(|e| internal(format!("import '{}' failed: {e}", native.name), Span::DUMMY))?;
        native_ids.insert(native.name, id);
    }

    // Declare every source function first so calls in any order resolve.
    let mut clif_ids: FxHashMap<usize, ClifFuncId> = FxHashMap::default();
    for id in unit.functions.ids() {
        let spec = unit.functions.get(id);
        if !matches!(spec.data.kind, FunctionKind::Source) {
            continue;
        }
        let mut sig = module.make_signature();
        if spec.data.owner.is_some() {
            sig.params.push(AbiParam::new(types::I64));
        }
        for (_, param_ty) in &spec.data.params {
            sig.params.push(AbiParam::new(clif_type(*param_ty)));
        }
        if !spec.data.ret.is_void() {
            sig.returns.push(AbiParam::new(clif_type(spec.data.ret)));
        }
        let clif_id = module
            .declare_function(&spec.data.mangled, Linkage::Export, &sig)
            .map_err(|e| {
                internal(format!("declaring '{}' failed: {e}", spec.data.mangled), Span::DUMMY)
            })?;
        clif_ids.insert(id.index(), clif_id);
    }

    // Define bodies.
    let mut fb_ctx = FunctionBuilderContext::new();
    for id in unit.functions.ids() {
        let spec = unit.functions.get(id);
        if !matches!(spec.data.kind, FunctionKind::Source) {
            continue;
        }
        let Some(clif_id) = clif_ids.get(&id.index()).copied() else {
            continue;
        };
        define_function(
            &mut module,
            &mut fb_ctx,
            ctx,
            unit,
            settings_in,
            id,
            clif_id,
            data_id,
            &clif_ids,
            &native_ids,
        )?;
    }

    // The root constructor, if any initializer needs runtime code.
    let ctor_id = if unit.data.ctor_inits.is_empty() {
        None
    } else {
        Some(define_ctor(
            &mut module,
            &mut fb_ctx,
            ctx,
            unit,
            settings_in,
            data_id,
            &clif_ids,
            &native_ids,
        )?)
    };

    module
        .finalize_definitions()
        .map_err(|e| internal(format!("finalize failed: {e}"), Span::DUMMY))?;

    // Collect host-facing entries.
    let mut functions = FxHashMap::default();
    for id in unit.functions.ids() {
        let spec = unit.functions.get(id);
        let Some(clif_id) = clif_ids.get(&id.index()) else {
            continue;
        };
        let ptr = module.get_finalized_function(*clif_id);
        let mut params: Vec<ParamSig> = Vec::with_capacity(spec.data.params.len() + 1);
        if let Some(owner) = spec.data.owner {
            params.push(struct_sig(&ctx.registry, TypeInfo::complex(owner)));
        }
        for (_, ty) in &spec.data.params {
            params.push(param_sig(&ctx.registry, *ty));
        }
        functions.insert(
            spec.data.mangled.clone(),
            FunctionEntry {
                name: spec.data.mangled.clone(),
                params,
                ret: param_sig(&ctx.registry, spec.data.ret),
                ptr,
            },
        );
    }

    let (data_ptr, data_len) = module.get_finalized_data(data_id);
    let ctor_ptr = ctor_id.map(|id| module.get_finalized_function(id));
    debug!(functions = functions.len(), data_len, "unit compiled");

    Ok(CompiledProgram::new(
        module,
        functions,
        data_ptr.cast_mut(),
        data_len,
        ctor_ptr,
    ))
}

fn param_sig(registry: &TypeRegistry, ty: TypeInfo) -> ParamSig {
    if let BaseType::Complex(_) = ty.base {
        return struct_sig(registry, ty);
    }
    match ty.scalar_type() {
        Some(ScalarType::Int) => ParamSig::I32,
        Some(ScalarType::Float) => ParamSig::F32,
        Some(ScalarType::Double) => ParamSig::F64,
        Some(ScalarType::Bool) => ParamSig::Bool,
        Some(ScalarType::Void) | None => ParamSig::Void,
    }
}

fn struct_sig(registry: &TypeRegistry, ty: TypeInfo) -> ParamSig {
    let Some(id) = ty.complex_id() else {
        return ParamSig::Void;
    };
    match &registry.get(id).kind {
        ComplexTypeKind::Span { elem, len } if elem.scalar_type() == Some(ScalarType::Float) => {
            ParamSig::SpanF32 { len: *len }
        }
        _ => ParamSig::StructPtr {
            name: registry.describe(&ty.value_type()),
        },
    }
}

/// Storage for one local.
#[derive(Clone, Copy)]
enum LocalSlot {
    /// Scalar in an SSA variable.
    Var(Variable, Type),
    /// Pointer-typed parameter (span&, struct&) held in a variable.
    Ptr(Variable),
    /// Aggregate local in a stack slot.
    Stack(cranelift_codegen::ir::StackSlot),
}

struct FuncTranslator<'a, 'b> {
    builder: FunctionBuilder<'b>,
    module: &'a mut JITModule,
    ctx: &'a CompilerContext,
    unit: &'a CompilationUnit,
    locals: Vec<LocalSlot>,
    local_types: Vec<TypeInfo>,
    self_ptr: Option<Value>,
    data_base: Value,
    clif_ids: &'a FxHashMap<usize, ClifFuncId>,
    native_ids: &'a FxHashMap<&'static str, ClifFuncId>,
    /// (continue target, break target) per enclosing loop.
    loops: Vec<(cranelift_codegen::ir::Block, cranelift_codegen::ir::Block)>,
    var_count: usize,
    inline_intrinsics: bool,
}

#[allow(clippy::too_many_arguments)]
fn define_function(
    module: &mut JITModule,
    fb_ctx: &mut FunctionBuilderContext,
    ctx: &CompilerContext,
    unit: &CompilationUnit,
    settings_in: &CompilerSettings,
    id: FuncId,
    clif_id: ClifFuncId,
    data_id: DataId,
    clif_ids: &FxHashMap<usize, ClifFuncId>,
    native_ids: &FxHashMap<&'static str, ClifFuncId>,
) -> Result<()> {
    let spec = unit.functions.get(id);
    let Some(body) = &spec.body else {
        return Err(internal(
            format!("'{}' reached code generation without a body", spec.data.id),
            Span::DUMMY,
        ));
    };
    trace!(function = %spec.data.mangled, "lowering");

    let mut mctx = module.make_context();
    if spec.data.owner.is_some() {
        mctx.func.signature.params.push(AbiParam::new(types::I64));
    }
    for (_, param_ty) in &spec.data.params {
        mctx.func
            .signature
            .params
            .push(AbiParam::new(clif_type(*param_ty)));
    }
    if !spec.data.ret.is_void() {
        mctx.func
            .signature
            .returns
            .push(AbiParam::new(clif_type(spec.data.ret)));
    }

    {
        let mut builder = FunctionBuilder::new(&mut mctx.func, fb_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);

        let gv = module.declare_data_in_func(data_id, builder.func);
        let data_base = builder.ins().global_value(types::I64, gv);

        let block_params = builder.block_params(entry).to_vec();
        let mut param_values = block_params.into_iter();
        let self_ptr = if spec.data.owner.is_some() {
            param_values.next()
        } else {
            None
        };

        let mut translator = FuncTranslator {
            builder,
            module: &mut *module,
            ctx,
            unit,
            locals: Vec::with_capacity(body.locals.len()),
            local_types: body.locals.iter().map(|l| l.ty).collect(),
            self_ptr,
            data_base,
            clif_ids,
            native_ids,
            loops: Vec::new(),
            var_count: 0,
            inline_intrinsics: settings_in
                .optimizations
                .contains(OptimizationFlags::INLINING),
        };

        // Parameters occupy the first local slots.
        for (index, (_, param_ty)) in spec.data.params.iter().enumerate() {
            let value = param_values.next().ok_or_else(|| {
                internal("parameter count mismatch at lowering", Span::DUMMY)
            })?;
            let slot = if param_ty.is_pointer_sized() {
                let var = translator.new_var(types::I64);
                translator.builder.def_var(var, value);
                LocalSlot::Ptr(var)
            } else {
                let ty = clif_type(*param_ty);
                let var = translator.new_var(ty);
                translator.builder.def_var(var, value);
                LocalSlot::Var(var, ty)
            };
            translator.locals.push(slot);
            debug_assert_eq!(translator.locals.len(), index + 1);
        }
        // Remaining locals materialize at their declarations.
        for local in body.locals.iter().skip(spec.data.params.len()) {
            let slot = translator.alloc_local_slot(local.ty);
            translator.locals.push(slot);
        }

        let terminated = translator.translate_stmt(&body.stmt)?;
        if !terminated {
            translator.emit_default_return(spec.data.ret);
        }

        translator.builder.seal_all_blocks();
        translator.builder.finalize();
    }

    module
        .define_function(clif_id, &mut mctx)
        .map_err(|e| internal(format!("defining '{}' failed: {e}", spec.data.mangled), Span::DUMMY))?;
    module.clear_context(&mut mctx);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn define_ctor(
    module: &mut JITModule,
    fb_ctx: &mut FunctionBuilderContext,
    ctx: &CompilerContext,
    unit: &CompilationUnit,
    settings_in: &CompilerSettings,
    data_id: DataId,
    clif_ids: &FxHashMap<usize, ClifFuncId>,
    native_ids: &FxHashMap<&'static str, ClifFuncId>,
) -> Result<ClifFuncId> {
    let sig = module.make_signature();
    let clif_id = module
        .declare_function(CTOR_NAME, Linkage::Export, &sig)
        .map_err(|e| internal(format!("declaring constructor failed: {e}"), Span::DUMMY))?;

    let mut mctx = module.make_context();
    {
        let mut builder = FunctionBuilder::new(&mut mctx.func, fb_ctx);
        let entry = builder.create_block();
        builder.switch_to_block(entry);
        let gv = module.declare_data_in_func(data_id, builder.func);
        let data_base = builder.ins().global_value(types::I64, gv);

        let mut translator = FuncTranslator {
            builder,
            module: &mut *module,
            ctx,
            unit,
            locals: Vec::new(),
            local_types: Vec::new(),
            self_ptr: None,
            data_base,
            clif_ids,
            native_ids,
            loops: Vec::new(),
            var_count: 0,
            inline_intrinsics: settings_in
                .optimizations
                .contains(OptimizationFlags::INLINING),
        };

        for (index, expr) in &unit.data.ctor_inits {
            let entry = &unit.data.entries[*index];
            let value = translator.translate_expr(expr)?;
            let addr = translator.global_addr(entry.offset);
            translator
                .builder
                .ins()
                .store(MemFlags::trusted(), value, addr, 0);
        }
        translator.builder.ins().return_(&[]);
        translator.builder.seal_all_blocks();
        translator.builder.finalize();
    }

    module
        .define_function(clif_id, &mut mctx)
        .map_err(|e| internal(format!("defining constructor failed: {e}"), Span::DUMMY))?;
    module.clear_context(&mut mctx);
    Ok(clif_id)
}

impl FuncTranslator<'_, '_> {
    fn new_var(&mut self, ty: Type) -> Variable {
        let var = Variable::new(self.var_count);
        self.var_count += 1;
        self.builder.declare_var(var, ty);
        var
    }

    fn alloc_local_slot(&mut self, ty: TypeInfo) -> LocalSlot {
        if ty.is_ref() || ty.is_ptr() {
            let var = self.new_var(types::I64);
            return LocalSlot::Ptr(var);
        }
        if let Some(id) = ty.complex_id() {
            let size = self.ctx.registry.get(id).size;
            let slot = self.builder.create_sized_stack_slot(StackSlotData::new(
                StackSlotKind::ExplicitSlot,
                size,
            ));
            return LocalSlot::Stack(slot);
        }
        let clif = clif_type(ty);
        let var = self.new_var(clif);
        LocalSlot::Var(var, clif)
    }

    fn ty_of(&self, expr: &Expr) -> Result<TypeInfo> {
        self.unit
            .type_of(expr.id)
            .ok_or_else(|| internal("expression reached lowering untyped", expr.span))
    }

    fn ref_of(&self, expr: &Expr) -> Result<&SymbolRef> {
        self.unit
            .refs
            .get(&expr.id)
            .ok_or_else(|| internal("expression reached lowering unresolved", expr.span))
    }

    fn global_addr(&mut self, offset: u32) -> Value {
        if offset == 0 {
            return self.data_base;
        }
        self.builder
            .ins()
            .iadd_imm(self.data_base, i64::from(offset))
    }

    fn emit_default_return(&mut self, ret: TypeInfo) {
        if ret.is_void() {
            self.builder.ins().return_(&[]);
            return;
        }
        // Falling off the end of a value-returning function yields the
        // type's zero, deterministically.
        let zero = match ret.scalar_type() {
            Some(ScalarType::Float) => self.builder.ins().f32const(0.0),
            Some(ScalarType::Double) => self.builder.ins().f64const(0.0),
            Some(ScalarType::Bool) => self.builder.ins().iconst(types::I8, 0),
            _ => self.builder.ins().iconst(types::I32, 0),
        };
        self.builder.ins().return_(&[zero]);
    }

    /// Returns true when the statement terminated the current block.
    fn translate_stmt(&mut self, stmt: &Stmt) -> Result<bool> {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                for s in stmts {
                    if self.translate_stmt(s)? {
                        // Everything after a terminator is unreachable.
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            StmtKind::VarDecl { init, .. } => {
                let Some(SymbolRef::Local(index)) = self.unit.refs.get(&stmt.id) else {
                    return Err(internal("declaration without a local slot", stmt.span));
                };
                let index = *index;
                match self.locals[index] {
                    LocalSlot::Var(var, ty) => {
                        let value = match init {
                            Some(init) => self.translate_expr(init)?,
                            None => self.zero_of(ty),
                        };
                        self.builder.def_var(var, value);
                    }
                    LocalSlot::Stack(slot) => {
                        self.init_stack_aggregate(slot, self.local_types[index], init.as_ref())?;
                    }
                    LocalSlot::Ptr(_) => {
                        return Err(internal(
                            "reference locals cannot be declared in bodies",
                            stmt.span,
                        ));
                    }
                }
                Ok(false)
            }
            StmtKind::Expr(expr) => {
                self.translate_expr(expr)?;
                Ok(false)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_value = self.translate_expr(cond)?;
                let then_block = self.builder.create_block();
                let else_block = self.builder.create_block();
                let merge = self.builder.create_block();

                self.builder
                    .ins()
                    .brif(cond_value, then_block, &[], else_block, &[]);

                self.builder.switch_to_block(then_block);
                let then_done = self.translate_stmt(then_branch)?;
                if !then_done {
                    self.builder.ins().jump(merge, &[]);
                }

                self.builder.switch_to_block(else_block);
                let else_done = match else_branch {
                    Some(else_branch) => self.translate_stmt(else_branch)?,
                    None => false,
                };
                if !else_done {
                    self.builder.ins().jump(merge, &[]);
                }

                self.builder.switch_to_block(merge);
                if then_done && else_done {
                    // Merge is unreachable; terminate it so the
                    // function stays well-formed.
                    self.builder.ins().trap(
                        cranelift_codegen::ir::TrapCode::UnreachableCodeReached,
                    );
                    return Ok(true);
                }
                Ok(false)
            }
            StmtKind::While { cond, body } => {
                let header = self.builder.create_block();
                let body_block = self.builder.create_block();
                let exit = self.builder.create_block();

                self.builder.ins().jump(header, &[]);
                self.builder.switch_to_block(header);
                let cond_value = self.translate_expr(cond)?;
                self.builder
                    .ins()
                    .brif(cond_value, body_block, &[], exit, &[]);

                self.builder.switch_to_block(body_block);
                self.loops.push((header, exit));
                let body_done = self.translate_stmt(body)?;
                self.loops.pop();
                if !body_done {
                    self.builder.ins().jump(header, &[]);
                }

                self.builder.switch_to_block(exit);
                Ok(false)
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.translate_stmt(init)?;
                }
                let header = self.builder.create_block();
                let body_block = self.builder.create_block();
                let step_block = self.builder.create_block();
                let exit = self.builder.create_block();

                self.builder.ins().jump(header, &[]);
                self.builder.switch_to_block(header);
                match cond {
                    Some(cond) => {
                        let cond_value = self.translate_expr(cond)?;
                        self.builder
                            .ins()
                            .brif(cond_value, body_block, &[], exit, &[]);
                    }
                    None => {
                        self.builder.ins().jump(body_block, &[]);
                    }
                }

                self.builder.switch_to_block(body_block);
                self.loops.push((step_block, exit));
                let body_done = self.translate_stmt(body)?;
                self.loops.pop();
                if !body_done {
                    self.builder.ins().jump(step_block, &[]);
                }

                self.builder.switch_to_block(step_block);
                if let Some(step) = step {
                    self.translate_expr(step)?;
                }
                self.builder.ins().jump(header, &[]);

                self.builder.switch_to_block(exit);
                Ok(false)
            }
            StmtKind::Return(value) => {
                match value {
                    Some(value) => {
                        let v = self.translate_expr(value)?;
                        self.builder.ins().return_(&[v]);
                    }
                    None => {
                        self.builder.ins().return_(&[]);
                    }
                }
                Ok(true)
            }
            StmtKind::Break => {
                let Some((_, exit)) = self.loops.last().copied() else {
                    return Err(internal("break outside a loop", stmt.span));
                };
                self.builder.ins().jump(exit, &[]);
                Ok(true)
            }
            StmtKind::Continue => {
                let Some((header, _)) = self.loops.last().copied() else {
                    return Err(internal("continue outside a loop", stmt.span));
                };
                self.builder.ins().jump(header, &[]);
                Ok(true)
            }
        }
    }

    fn zero_of(&mut self, ty: Type) -> Value {
        match ty {
            types::F32 => self.builder.ins().f32const(0.0),
            types::F64 => self.builder.ins().f64const(0.0),
            other => self.builder.ins().iconst(other, 0),
        }
    }

    /// Zero a stack aggregate, apply member defaults, then any
    /// initializer list.
    fn init_stack_aggregate(
        &mut self,
        slot: cranelift_codegen::ir::StackSlot,
        ty: TypeInfo,
        init: Option<&Expr>,
    ) -> Result<()> {
        let Some(id) = ty.complex_id() else {
            return Err(internal("aggregate slot for a scalar local", Span::DUMMY));
        };
        let size = self.ctx.registry.get(id).size;
        let addr = self.builder.ins().stack_addr(types::I64, slot, 0);

        // Deterministic contents: zero-fill first.
        let zero64 = self.builder.ins().iconst(types::I64, 0);
        let mut at = 0u32;
        while at + 8 <= size {
            self.builder
                .ins()
                .store(MemFlags::trusted(), zero64, addr, i32::try_from(at).unwrap_or(0));
            at += 8;
        }
        let zero8 = self.builder.ins().iconst(types::I8, 0);
        while at < size {
            self.builder
                .ins()
                .store(MemFlags::trusted(), zero8, addr, i32::try_from(at).unwrap_or(0));
            at += 1;
        }

        if let Some(defaults) = self.unit.member_defaults.get(&id) {
            let writes: Vec<(u32, ScalarType, Folded)> = defaults
                .iter()
                .filter_map(|(offset, folded)| {
                    self.ctx
                        .registry
                        .get(id)
                        .members()
                        .iter()
                        .find(|m| m.offset == *offset)
                        .and_then(|m| m.ty.scalar_type())
                        .map(|s| (*offset, s, *folded))
                })
                .collect();
            for (offset, scalar, folded) in writes {
                let value = self.folded_const(scalar, folded);
                self.builder.ins().store(
                    MemFlags::trusted(),
                    value,
                    addr,
                    i32::try_from(offset).unwrap_or(0),
                );
            }
        }

        let Some(init) = init else { return Ok(()) };
        let ExprKind::InitList(values) = &init.kind else {
            return Err(internal("aggregate initializer is not a list", init.span));
        };
        match self.ctx.registry.get(id).kind.clone() {
            ComplexTypeKind::Span { elem, .. } => {
                let elem_size = self.ctx.registry.size_of(&elem);
                for (i, value_expr) in values.iter().enumerate() {
                    let value = self.translate_expr(value_expr)?;
                    let offset = elem_size * u32::try_from(i).unwrap_or(0);
                    self.builder.ins().store(
                        MemFlags::trusted(),
                        value,
                        addr,
                        i32::try_from(offset).unwrap_or(0),
                    );
                }
            }
            ComplexTypeKind::Struct { members } => {
                for (member, value_expr) in members.iter().zip(values) {
                    let value = self.translate_expr(value_expr)?;
                    self.builder.ins().store(
                        MemFlags::trusted(),
                        value,
                        addr,
                        i32::try_from(member.offset).unwrap_or(0),
                    );
                }
            }
        }
        Ok(())
    }

    fn folded_const(&mut self, scalar: ScalarType, folded: Folded) -> Value {
        match scalar {
            ScalarType::Float => {
                let v = match folded {
                    Folded::Float(v) => v,
                    Folded::Int(v) => v as f32,
                    Folded::Double(v) => v as f32,
                    Folded::Bool(v) => f32::from(u8::from(v)),
                };
                self.builder.ins().f32const(v)
            }
            ScalarType::Double => {
                let v = folded.as_f64();
                self.builder.ins().f64const(v)
            }
            ScalarType::Bool => {
                let v = matches!(folded, Folded::Bool(true));
                self.builder.ins().iconst(types::I8, i64::from(v))
            }
            _ => {
                let v = match folded {
                    Folded::Int(v) => i64::from(v),
                    Folded::Bool(v) => i64::from(v),
                    Folded::Float(v) => v as i64,
                    Folded::Double(v) => v as i64,
                };
                self.builder.ins().iconst(types::I32, v)
            }
        }
    }

    /// Address of an lvalue expression.
    fn addr_of(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Symbol { .. } => match self.ref_of(expr)? {
                SymbolRef::Local(index) => {
                    let index = *index;
                    match self.locals[index] {
                        LocalSlot::Stack(slot) => {
                            Ok(self.builder.ins().stack_addr(types::I64, slot, 0))
                        }
                        LocalSlot::Ptr(var) => Ok(self.builder.use_var(var)),
                        LocalSlot::Var(..) => Err(internal(
                            "scalar locals have no address",
                            expr.span,
                        )),
                    }
                }
                SymbolRef::Global(index) => {
                    let offset = self.unit.data.entries[*index].offset;
                    Ok(self.global_addr(offset))
                }
                SymbolRef::Member { offset, .. } => {
                    let offset = *offset;
                    let base = self.self_value(expr.span)?;
                    Ok(self.builder.ins().iadd_imm(base, i64::from(offset)))
                }
                _ => Err(internal("expression has no address", expr.span)),
            },
            ExprKind::Member { base, name } => {
                let base_ty = self.ty_of(base)?;
                let Some(owner) = base_ty.complex_id() else {
                    return Err(internal("member access on a non-struct", expr.span));
                };
                let member_offset = self
                    .ctx
                    .registry
                    .get(owner)
                    .member(name)
                    .map(|m| m.offset)
                    .ok_or_else(|| internal("member vanished after checking", expr.span))?;
                let base_addr = self.addr_of(base)?;
                Ok(self
                    .builder
                    .ins()
                    .iadd_imm(base_addr, i64::from(member_offset)))
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.ty_of(base)?;
                let index_value = self.translate_expr(index)?;
                let index64 = self.builder.ins().sextend(types::I64, index_value);
                if base_ty.is_ptr() {
                    let ptr = self.translate_expr(base)?;
                    let elem = base_ty.value_type().scalar_type().map_or(4, |s| s.size());
                    let scaled = self.builder.ins().imul_imm(index64, i64::from(elem));
                    return Ok(self.builder.ins().iadd(ptr, scaled));
                }
                let Some(id) = base_ty.complex_id() else {
                    return Err(internal("index into a non-span", expr.span));
                };
                let ComplexTypeKind::Span { elem, .. } = &self.ctx.registry.get(id).kind else {
                    return Err(internal("index into a non-span aggregate", expr.span));
                };
                let elem_size = self.ctx.registry.size_of(elem);
                let base_addr = self.addr_of(base)?;
                let scaled = self.builder.ins().imul_imm(index64, i64::from(elem_size));
                Ok(self.builder.ins().iadd(base_addr, scaled))
            }
            _ => Err(internal("expression has no address", expr.span)),
        }
    }

    fn self_value(&mut self, span: Span) -> Result<Value> {
        self.self_ptr
            .ok_or_else(|| internal("member access outside a method", span))
    }

    fn translate_expr(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::IntLit(v) => Ok(self.builder.ins().iconst(types::I32, i64::from(*v))),
            ExprKind::FloatLit(v) => Ok(self.builder.ins().f32const(*v)),
            ExprKind::DoubleLit(v) => Ok(self.builder.ins().f64const(*v)),
            ExprKind::BoolLit(v) => Ok(self.builder.ins().iconst(types::I8, i64::from(*v))),

            ExprKind::Symbol { .. } => match self.ref_of(expr)? {
                SymbolRef::Local(index) => {
                    let index = *index;
                    match self.locals[index] {
                        LocalSlot::Var(var, _) => Ok(self.builder.use_var(var)),
                        LocalSlot::Ptr(var) => Ok(self.builder.use_var(var)),
                        LocalSlot::Stack(slot) => {
                            Ok(self.builder.ins().stack_addr(types::I64, slot, 0))
                        }
                    }
                }
                SymbolRef::Global(index) => {
                    let entry_ty = self.unit.data.entries[*index].ty;
                    let offset = self.unit.data.entries[*index].offset;
                    let addr = self.global_addr(offset);
                    if entry_ty.complex_id().is_some() {
                        Ok(addr)
                    } else {
                        Ok(self.builder.ins().load(
                            clif_type(entry_ty),
                            MemFlags::trusted(),
                            addr,
                            0,
                        ))
                    }
                }
                SymbolRef::Const(value) => match *value {
                    ConstValue::Float(v) => Ok(self.builder.ins().f64const(v)),
                    ConstValue::Int(v) => {
                        let clamped = i64::from(i32::try_from(v).unwrap_or(i32::MAX));
                        Ok(self.builder.ins().iconst(types::I32, clamped))
                    }
                },
                SymbolRef::Member { offset, ty } => {
                    let offset = *offset;
                    let ty = *ty;
                    let base = self.self_value(expr.span)?;
                    let addr = self.builder.ins().iadd_imm(base, i64::from(offset));
                    if ty.complex_id().is_some() {
                        Ok(addr)
                    } else {
                        Ok(self
                            .builder
                            .ins()
                            .load(clif_type(ty), MemFlags::trusted(), addr, 0))
                    }
                }
                SymbolRef::Function(_) | SymbolRef::TemplatePending => {
                    Err(internal("function reference used as a value", expr.span))
                }
            },

            ExprKind::Unary { op, operand } => {
                let value = self.translate_expr(operand)?;
                let ty = self.ty_of(operand)?;
                match op {
                    UnaryOp::Neg => {
                        if ty.is_numeric() && ty.scalar_type() == Some(ScalarType::Int) {
                            Ok(self.builder.ins().ineg(value))
                        } else {
                            Ok(self.builder.ins().fneg(value))
                        }
                    }
                    UnaryOp::Not => Ok(self.builder.ins().bxor_imm(value, 1)),
                    UnaryOp::BitNot => Ok(self.builder.ins().bnot(value)),
                }
            }

            ExprKind::Binary { op, lhs, rhs } => self.translate_binary(*op, lhs, rhs, expr.span),

            ExprKind::Ternary {
                cond,
                then_value,
                else_value,
            } => {
                let result_ty = clif_type(self.ty_of(expr)?);
                let cond_value = self.translate_expr(cond)?;
                let then_block = self.builder.create_block();
                let else_block = self.builder.create_block();
                let merge = self.builder.create_block();
                self.builder.append_block_param(merge, result_ty);

                self.builder
                    .ins()
                    .brif(cond_value, then_block, &[], else_block, &[]);

                self.builder.switch_to_block(then_block);
                let t = self.translate_expr(then_value)?;
                self.builder.ins().jump(merge, &[t]);

                self.builder.switch_to_block(else_block);
                let e = self.translate_expr(else_value)?;
                self.builder.ins().jump(merge, &[e]);

                self.builder.switch_to_block(merge);
                Ok(self.builder.block_params(merge)[0])
            }

            ExprKind::Assign { op, target, value } => {
                let new_value = self.translate_expr(value)?;
                let result = match op {
                    Some(op) => {
                        let current = self.translate_expr(target)?;
                        let ty = self.ty_of(target)?;
                        self.emit_arith(*op, current, new_value, ty, expr.span)?
                    }
                    None => new_value,
                };
                self.store_to(target, result)?;
                Ok(result)
            }

            ExprKind::IncDec {
                decrement,
                postfix,
                target,
            } => {
                let old = self.translate_expr(target)?;
                let ty = self.ty_of(target)?;
                let one = match ty.scalar_type() {
                    Some(ScalarType::Float) => self.builder.ins().f32const(1.0),
                    Some(ScalarType::Double) => self.builder.ins().f64const(1.0),
                    _ => self.builder.ins().iconst(types::I32, 1),
                };
                let op = if *decrement { BinaryOp::Sub } else { BinaryOp::Add };
                let new = self.emit_arith(op, old, one, ty, expr.span)?;
                self.store_to(target, new)?;
                Ok(if *postfix { old } else { new })
            }

            ExprKind::Call { .. } => self.translate_call(expr),

            ExprKind::Member { .. } => {
                let ty = self.ty_of(expr)?;
                let addr = self.addr_of(expr)?;
                if ty.complex_id().is_some() {
                    Ok(addr)
                } else {
                    Ok(self
                        .builder
                        .ins()
                        .load(clif_type(ty), MemFlags::trusted(), addr, 0))
                }
            }

            ExprKind::Index { .. } => {
                let ty = self.ty_of(expr)?;
                let addr = self.addr_of(expr)?;
                if ty.complex_id().is_some() {
                    Ok(addr)
                } else {
                    Ok(self
                        .builder
                        .ins()
                        .load(clif_type(ty), MemFlags::trusted(), addr, 0))
                }
            }

            ExprKind::Cast { expr: inner, .. } => {
                let from = self.ty_of(inner)?;
                let to = self.ty_of(expr)?;
                let value = self.translate_expr(inner)?;
                self.emit_cast(value, from, to, expr.span)
            }

            ExprKind::InitList(_) => Err(internal(
                "initializer list reached expression lowering",
                expr.span,
            )),
        }
    }

    fn store_to(&mut self, target: &Expr, value: Value) -> Result<()> {
        if let ExprKind::Symbol { .. } = &target.kind {
            if let SymbolRef::Local(index) = self.ref_of(target)? {
                if let LocalSlot::Var(var, _) = self.locals[*index] {
                    self.builder.def_var(var, value);
                    return Ok(());
                }
            }
        }
        let addr = self.addr_of(target)?;
        self.builder
            .ins()
            .store(MemFlags::trusted(), value, addr, 0);
        Ok(())
    }

    fn translate_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<Value> {
        if op.is_logical() {
            return self.translate_short_circuit(op, lhs, rhs);
        }
        let ty = self.ty_of(lhs)?;
        let a = self.translate_expr(lhs)?;
        let b = self.translate_expr(rhs)?;
        if op.is_comparison() {
            return self.emit_compare(op, a, b, ty, span);
        }
        self.emit_arith(op, a, b, ty, span)
    }

    fn translate_short_circuit(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        let a = self.translate_expr(lhs)?;
        let rhs_block = self.builder.create_block();
        let merge = self.builder.create_block();
        self.builder.append_block_param(merge, types::I8);

        let short_value = i64::from(matches!(op, BinaryOp::LogicalOr));
        let short = self.builder.ins().iconst(types::I8, short_value);
        match op {
            BinaryOp::LogicalAnd => {
                self.builder.ins().brif(a, rhs_block, &[], merge, &[short]);
            }
            _ => {
                self.builder.ins().brif(a, merge, &[short], rhs_block, &[]);
            }
        }

        self.builder.switch_to_block(rhs_block);
        let b = self.translate_expr(rhs)?;
        self.builder.ins().jump(merge, &[b]);

        self.builder.switch_to_block(merge);
        Ok(self.builder.block_params(merge)[0])
    }

    fn emit_arith(
        &mut self,
        op: BinaryOp,
        a: Value,
        b: Value,
        ty: TypeInfo,
        span: Span,
    ) -> Result<Value> {
        let scalar = ty
            .value_type()
            .scalar_type()
            .ok_or_else(|| internal("arithmetic on a non-scalar", span))?;
        let is_int = matches!(scalar, ScalarType::Int | ScalarType::Bool);
        let ins = self.builder.ins();
        let value = match (op, is_int) {
            (BinaryOp::Add, true) => ins.iadd(a, b),
            (BinaryOp::Sub, true) => ins.isub(a, b),
            (BinaryOp::Mul, true) => ins.imul(a, b),
            (BinaryOp::Div, true) => ins.sdiv(a, b),
            (BinaryOp::Mod, true) => ins.srem(a, b),
            (BinaryOp::BitAnd, true) => ins.band(a, b),
            (BinaryOp::BitOr, true) => ins.bor(a, b),
            (BinaryOp::BitXor, true) => ins.bxor(a, b),
            (BinaryOp::Shl, true) => ins.ishl(a, b),
            (BinaryOp::Shr, true) => ins.sshr(a, b),
            (BinaryOp::Add, false) => ins.fadd(a, b),
            (BinaryOp::Sub, false) => ins.fsub(a, b),
            (BinaryOp::Mul, false) => ins.fmul(a, b),
            (BinaryOp::Div, false) => ins.fdiv(a, b),
            _ => return Err(internal(format!("operator '{op}' on {scalar}"), span)),
        };
        Ok(value)
    }

    fn emit_compare(
        &mut self,
        op: BinaryOp,
        a: Value,
        b: Value,
        operand_ty: TypeInfo,
        span: Span,
    ) -> Result<Value> {
        let scalar = operand_ty
            .value_type()
            .scalar_type()
            .ok_or_else(|| internal("comparison on a non-scalar", span))?;
        let value = match scalar {
            ScalarType::Int | ScalarType::Bool => {
                let cc = match op {
                    BinaryOp::Eq => IntCC::Equal,
                    BinaryOp::Ne => IntCC::NotEqual,
                    BinaryOp::Lt => IntCC::SignedLessThan,
                    BinaryOp::Le => IntCC::SignedLessThanOrEqual,
                    BinaryOp::Gt => IntCC::SignedGreaterThan,
                    _ => IntCC::SignedGreaterThanOrEqual,
                };
                self.builder.ins().icmp(cc, a, b)
            }
            ScalarType::Float | ScalarType::Double => {
                let cc = match op {
                    BinaryOp::Eq => FloatCC::Equal,
                    BinaryOp::Ne => FloatCC::NotEqual,
                    BinaryOp::Lt => FloatCC::LessThan,
                    BinaryOp::Le => FloatCC::LessThanOrEqual,
                    BinaryOp::Gt => FloatCC::GreaterThan,
                    _ => FloatCC::GreaterThanOrEqual,
                };
                self.builder.ins().fcmp(cc, a, b)
            }
            ScalarType::Void => return Err(internal("comparison on void", span)),
        };
        Ok(value)
    }

    fn emit_cast(&mut self, value: Value, from: TypeInfo, to: TypeInfo, span: Span) -> Result<Value> {
        let from_s = from.value_type().scalar_type();
        let to_s = to.value_type().scalar_type();
        let (Some(from_s), Some(to_s)) = (from_s, to_s) else {
            return Err(internal("cast between non-scalar types", span));
        };
        if from_s == to_s {
            return Ok(value);
        }
        use ScalarType::{Bool, Double, Float, Int};
        let ins = self.builder.ins();
        let result = match (from_s, to_s) {
            (Int, Float) => ins.fcvt_from_sint(types::F32, value),
            (Int, Double) => ins.fcvt_from_sint(types::F64, value),
            (Float, Double) => ins.fpromote(types::F64, value),
            (Double, Float) => ins.fdemote(types::F32, value),
            (Float | Double, Int) => ins.fcvt_to_sint_sat(types::I32, value),
            (Bool, Int) => ins.uextend(types::I32, value),
            (Int, Bool) => self.builder.ins().icmp_imm(IntCC::NotEqual, value, 0),
            (Float, Bool) => {
                let zero = self.builder.ins().f32const(0.0);
                self.builder.ins().fcmp(FloatCC::NotEqual, value, zero)
            }
            (Double, Bool) => {
                let zero = self.builder.ins().f64const(0.0);
                self.builder.ins().fcmp(FloatCC::NotEqual, value, zero)
            }
            (Bool, Float) => {
                let wide = self.builder.ins().uextend(types::I32, value);
                self.builder.ins().fcvt_from_uint(types::F32, wide)
            }
            (Bool, Double) => {
                let wide = self.builder.ins().uextend(types::I32, value);
                self.builder.ins().fcvt_from_uint(types::F64, wide)
            }
            _ => return Err(internal(format!("cast {from_s} to {to_s}"), span)),
        };
        Ok(result)
    }

    fn translate_call(&mut self, expr: &Expr) -> Result<Value> {
        let ExprKind::Call { callee, args, .. } = &expr.kind else {
            return Err(internal("not a call", expr.span));
        };
        let Some(SymbolRef::Function(fid)) = self.unit.refs.get(&expr.id) else {
            return Err(internal("call target was never resolved", expr.span));
        };
        let fid = *fid;
        let spec = self.unit.functions.get(fid);

        match &spec.data.kind {
            FunctionKind::Builtin { native, .. } => {
                let native = *native;
                let inliner = spec.data.inliner.clone();
                let result_ty = self.ty_of(expr)?;
                let scalar = result_ty.value_type().scalar_type().ok_or_else(|| {
                    internal("builtin call with non-scalar result", expr.span)
                })?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.translate_expr(arg)?);
                }
                if self.inline_intrinsics {
                    if let Some(Inliner::LowLevel(intr)) = inliner {
                        return self.emit_intrinsic(intr, &values, scalar, native, expr.span);
                    }
                }
                self.call_native(native, scalar, &values, expr.span)
            }
            FunctionKind::Source => {
                let owner = spec.data.owner;
                let ret_void = spec.data.ret.is_void();
                let param_tys: Vec<TypeInfo> =
                    spec.data.params.iter().map(|(_, t)| t).copied().collect();
                let Some(clif_id) = self.clif_ids.get(&fid.index()).copied() else {
                    return Err(internal("call target was never declared", expr.span));
                };

                let mut call_args: Vec<Value> = Vec::with_capacity(args.len() + 1);
                if owner.is_some() {
                    let receiver = match &callee.kind {
                        ExprKind::Member { base, .. } => self.addr_of(base)?,
                        _ => self.self_value(expr.span)?,
                    };
                    call_args.push(receiver);
                }
                for (arg, param_ty) in args.iter().zip(&param_tys) {
                    if param_ty.is_ref() {
                        call_args.push(self.addr_of(arg)?);
                    } else {
                        call_args.push(self.translate_expr(arg)?);
                    }
                }

                let func_ref = self
                    .module
                    .declare_func_in_func(clif_id, self.builder.func);
                let call = self.builder.ins().call(func_ref, &call_args);
                if ret_void {
                    // Statement position only; the value is unused.
                    Ok(self.builder.ins().iconst(types::I32, 0))
                } else {
                    Ok(self.builder.inst_results(call)[0])
                }
            }
        }
    }

    fn emit_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        values: &[Value],
        scalar: ScalarType,
        native: NativeNames,
        span: Span,
    ) -> Result<Value> {
        let ins = self.builder.ins();
        let value = match (intrinsic, values) {
            (Intrinsic::Min, [a, b]) => ins.fmin(*a, *b),
            (Intrinsic::Max, [a, b]) => ins.fmax(*a, *b),
            (Intrinsic::Abs, [a]) => ins.fabs(*a),
            (Intrinsic::Sqrt, [a]) => ins.sqrt(*a),
            // No single-instruction lowering; route to the shim.
            (Intrinsic::Sin | Intrinsic::Cos | Intrinsic::Pow | Intrinsic::Fmod, _) => {
                return self.call_native(native, scalar, values, span);
            }
            _ => return Err(internal("intrinsic arity mismatch", span)),
        };
        Ok(value)
    }

    fn call_native(
        &mut self,
        native: NativeNames,
        scalar: ScalarType,
        values: &[Value],
        span: Span,
    ) -> Result<Value> {
        let Some(name) = native.for_scalar(scalar) else {
            return Err(internal(
                format!("no native symbol for a {scalar} builtin"),
                span,
            ));
        };
        let Some(clif_id) = self.native_ids.get(name).copied() else {
            return Err(internal(format!("native symbol '{name}' undeclared"), span));
        };
        let func_ref = self
            .module
            .declare_func_in_func(clif_id, self.builder.func);
        let call = self.builder.ins().call(func_ref, values);
        Ok(self.builder.inst_results(call)[0])
    }
}
