//! The compilation unit: the tree plus every side table passes attach.

use rustc_hash::FxHashMap;
use sono_ir::{Expr, NamespacedIdentifier, NodeId, NodeIdGen, SyntaxTree};
use sono_resolve::ConstValue;
use sono_types::{ComplexTypeId, TypeInfo};

use crate::const_eval::Folded;
use crate::function_table::FunctionTable;
use crate::FuncId;

/// What a resolved identifier refers to.
#[derive(Clone, Debug)]
pub enum SymbolRef {
    /// Local variable or parameter: index into the enclosing function's
    /// locals.
    Local(usize),
    /// Root-level variable: index into the data layout.
    Global(usize),
    /// Compile-time constant (const global, template constant
    /// parameter), folded at resolution.
    Const(ConstValue),
    /// Call target.
    Function(FuncId),
    /// Implicit `this`-relative member access inside a method.
    Member { offset: u32, ty: TypeInfo },
    /// Call to a function template, pending instantiation in the
    /// FunctionTemplateParsing stage.
    TemplatePending,
}

/// One root-level variable with storage in the data section.
#[derive(Clone, Debug)]
pub struct GlobalEntry {
    pub id: NamespacedIdentifier,
    pub ty: TypeInfo,
    pub offset: u32,
    pub is_const: bool,
}

/// The root data block: layout, initial byte image, and initializers
/// that could not be folded into it (run by the root constructor).
#[derive(Debug, Default)]
pub struct DataLayout {
    pub entries: Vec<GlobalEntry>,
    pub image: Vec<u8>,
    pub align: u32,
    /// `(global index, initializer)` pairs executed in declaration
    /// order by the synthesized root constructor.
    pub ctor_inits: Vec<(usize, Expr)>,
}

impl DataLayout {
    pub fn lookup(&self, id: &NamespacedIdentifier) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }
}

pub use crate::function_table::LocalDecl;

/// Everything one compilation unit accumulates on its way through the
/// pipeline. Node side tables are keyed by [`NodeId`]; replacement nodes
/// synthesized by later passes get fresh ids from `ids`.
#[derive(Debug, Default)]
pub struct CompilationUnit {
    /// Preprocessed source, the text all spans point into.
    pub source: String,
    pub tree: SyntaxTree,
    pub ids: NodeIdGen,
    /// Checked type of each expression node.
    pub types: FxHashMap<NodeId, TypeInfo>,
    /// Resolution result for symbol, call and member nodes.
    pub refs: FxHashMap<NodeId, SymbolRef>,
    pub data: DataLayout,
    pub functions: FunctionTable,
    /// Call sites waiting on a template instantiation:
    /// `(call node, call span, template id, argument list)`.
    pub pending_templates: Vec<(
        NodeId,
        sono_ir::Span,
        NamespacedIdentifier,
        Vec<sono_types::TemplateArg>,
    )>,
    /// Folded struct member default initializers, applied to globals of
    /// that type during data initialisation: `(member offset, value)`.
    pub member_defaults: FxHashMap<ComplexTypeId, Vec<(u32, Folded)>>,
}

impl CompilationUnit {
    pub fn new(source: String) -> Self {
        CompilationUnit {
            source,
            ..CompilationUnit::default()
        }
    }

    pub fn type_of(&self, id: NodeId) -> Option<TypeInfo> {
        self.types.get(&id).copied()
    }

    pub fn set_type(&mut self, id: NodeId, ty: TypeInfo) {
        self.types.insert(id, ty);
    }
}
