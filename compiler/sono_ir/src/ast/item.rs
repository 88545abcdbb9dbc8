//! Top-level items: functions, structs, globals, namespaces.

use std::fmt;

use crate::{Expr, NamespacedIdentifier, NodeId, ParsedType, Span, Stmt};

/// One compilation unit's parsed items, in source order.
#[derive(Clone, Debug, Default)]
pub struct SyntaxTree {
    pub items: Vec<Item>,
}

#[derive(Clone, Debug)]
pub enum Item {
    Function(FunctionDef),
    Struct(StructDef),
    /// Root-level variable. Storage is assigned by the data allocation
    /// pass; the initializer runs in the root constructor if it cannot
    /// be folded into the initial data image.
    GlobalVar {
        id: NodeId,
        name: String,
        ty: ParsedType,
        init: Option<Expr>,
        span: Span,
    },
    Namespace {
        name: String,
        items: Vec<Item>,
        span: Span,
    },
    /// `using namespace a::b;`
    UsingNamespace {
        path: NamespacedIdentifier,
        span: Span,
    },
}

/// Member/method visibility. Struct members default to public, matching
/// C-family `struct`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        })
    }
}

/// `template <typename T, int N>` header on a function or struct.
#[derive(Clone, Debug)]
pub struct TemplateHeader {
    pub params: Vec<TemplateParamDecl>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum TemplateParamDecl {
    /// `typename T`
    Type { name: String },
    /// `int N`
    Const { name: String },
}

impl TemplateParamDecl {
    pub fn name(&self) -> &str {
        match self {
            TemplateParamDecl::Type { name } | TemplateParamDecl::Const { name } => name,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub ty: ParsedType,
    pub span: Span,
}

/// A function definition: free function, struct method, or template
/// blueprint (when `template` is present, the body stays unresolved
/// until instantiation).
#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub ret: ParsedType,
    pub params: Vec<Param>,
    pub body: Stmt,
    pub template: Option<TemplateHeader>,
    pub visibility: Visibility,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct StructMember {
    pub name: String,
    pub ty: ParsedType,
    pub init: Option<Expr>,
    pub visibility: Visibility,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct StructDef {
    pub name: String,
    pub template: Option<TemplateHeader>,
    pub members: Vec<StructMember>,
    pub methods: Vec<FunctionDef>,
    pub span: Span,
}
