//! The function table.
//!
//! Every concrete function the backend will compile (free functions,
//! struct methods, template instantiations, the synthesized root
//! constructor) plus the built-in library entries, keyed by fully
//! qualified name.

use rustc_hash::FxHashMap;
use sono_ir::{NamespacedIdentifier, Stmt, Visibility};
use sono_types::{ComplexTypeId, ScalarType, TypeInfo};

use crate::type_resolution::TemplateEnv;
use crate::Inliner;

/// Index into the [`FunctionTable`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FuncId(u32);

impl FuncId {
    pub fn from_index(index: usize) -> Self {
        FuncId(u32::try_from(index).unwrap_or(u32::MAX))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-scalar-type native symbols for a built-in, used when its inliner
/// is disabled (or the intrinsic has no single-instruction lowering).
#[derive(Copy, Clone, Debug, Default)]
pub struct NativeNames {
    pub f32_sym: Option<&'static str>,
    pub f64_sym: Option<&'static str>,
    pub i32_sym: Option<&'static str>,
}

impl NativeNames {
    pub fn for_scalar(&self, scalar: ScalarType) -> Option<&'static str> {
        match scalar {
            ScalarType::Float => self.f32_sym,
            ScalarType::Double => self.f64_sym,
            ScalarType::Int => self.i32_sym,
            ScalarType::Bool | ScalarType::Void => None,
        }
    }
}

/// How a function is implemented.
#[derive(Clone, Debug)]
pub enum FunctionKind {
    /// Compiled from source in this unit.
    Source,
    /// Built-in library function: lowered via its inliner or bound to a
    /// registered native symbol.
    Builtin {
        native: NativeNames,
        /// Built-ins whose operands unify to one numeric type (`float`
        /// or `double`; integer arguments promote to `float`).
        unify_numeric: bool,
    },
}

/// A resolved function signature bound to either a body to compile or a
/// built-in lowering.
#[derive(Clone, Debug)]
pub struct FunctionData {
    /// Fully qualified name.
    pub id: NamespacedIdentifier,
    /// Backend symbol name, unique per instantiation.
    pub mangled: String,
    /// Declared parameters, excluding the implicit receiver of methods.
    pub params: Vec<(String, TypeInfo)>,
    pub ret: TypeInfo,
    /// Receiver type for methods.
    pub owner: Option<ComplexTypeId>,
    /// Namespace the body resolves names from.
    pub scope: NamespacedIdentifier,
    pub visibility: Visibility,
    pub kind: FunctionKind,
    pub inliner: Option<Inliner>,
}

/// A local slot within one function body.
#[derive(Clone, Debug)]
pub struct LocalDecl {
    pub name: String,
    pub ty: TypeInfo,
}

/// The body of a source function, moved out of the syntax tree when the
/// signature is registered.
#[derive(Clone, Debug)]
pub struct FunctionBody {
    pub stmt: Stmt,
    /// All locals in declaration order; parameters first (receiver not
    /// included), then block-scoped declarations as resolution finds
    /// them.
    pub locals: Vec<LocalDecl>,
    /// Template parameter bindings for instantiated bodies.
    pub env: TemplateEnv,
}

#[derive(Clone, Debug)]
pub struct FunctionSpec {
    pub data: FunctionData,
    pub body: Option<FunctionBody>,
}

#[derive(Debug, Default)]
pub struct FunctionTable {
    specs: Vec<FunctionSpec>,
    by_id: FxHashMap<NamespacedIdentifier, FuncId>,
    /// Methods looked up by receiver type; instantiations of one
    /// template share a qualified name but never a receiver.
    methods: FxHashMap<(ComplexTypeId, String), FuncId>,
}

impl FunctionTable {
    pub fn new() -> Self {
        FunctionTable::default()
    }

    pub fn insert(&mut self, spec: FunctionSpec) -> FuncId {
        let id = FuncId::from_index(self.specs.len());
        match (spec.data.owner, spec.data.id.last()) {
            (Some(owner), Some(name)) => {
                self.methods.insert((owner, name.to_owned()), id);
            }
            _ => {
                self.by_id.insert(spec.data.id.clone(), id);
            }
        }
        self.specs.push(spec);
        id
    }

    pub fn lookup(&self, id: &NamespacedIdentifier) -> Option<FuncId> {
        self.by_id.get(id).copied()
    }

    /// Method of a concrete receiver type.
    pub fn lookup_method(&self, owner: ComplexTypeId, name: &str) -> Option<FuncId> {
        self.methods.get(&(owner, name.to_owned())).copied()
    }

    #[inline]
    pub fn get(&self, id: FuncId) -> &FunctionSpec {
        &self.specs[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: FuncId) -> &mut FunctionSpec {
        &mut self.specs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FuncId> {
        (0..self.specs.len()).map(FuncId::from_index)
    }

    /// Take a body out for processing, putting it back afterwards via
    /// [`FunctionTable::restore_body`]. Passes mutate bodies while also
    /// needing shared access to the rest of the table (signature
    /// lookups for calls), so bodies are checked out instead of borrowed.
    pub fn take_body(&mut self, id: FuncId) -> Option<FunctionBody> {
        self.specs[id.index()].body.take()
    }

    pub fn restore_body(&mut self, id: FuncId, body: FunctionBody) {
        debug_assert!(
            self.specs[id.index()].body.is_none(),
            "body restored over an existing one"
        );
        self.specs[id.index()].body = Some(body);
    }
}

/// Mangled backend name for a (possibly instantiated) function.
pub fn mangle(id: &NamespacedIdentifier, args: &[sono_types::TemplateArg]) -> String {
    let mut out = id.to_string();
    if !args.is_empty() {
        out.push('<');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&arg.to_string());
        }
        out.push('>');
    }
    out
}
