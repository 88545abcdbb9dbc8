//! Template declaration storage and instantiation memoization.

use sono_ir::{FunctionDef, NamespacedIdentifier, StructDef, TemplateParamDecl};
use sono_types::{ComplexTypeId, TemplateArg};

/// An unresolved template blueprint, stored as parsed.
#[derive(Clone, Debug)]
pub struct TemplateDecl {
    /// Namespace the template was declared in; instantiated bodies
    /// resolve names from here.
    pub owner: NamespacedIdentifier,
    pub params: Vec<TemplateParamDecl>,
    pub kind: TemplateKind,
}

#[derive(Clone, Debug)]
pub enum TemplateKind {
    Struct(StructDef),
    Function(FunctionDef),
}

/// Memoization key: the same (template, argument list) always maps to
/// the same instantiation.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct InstantiationKey {
    pub template: NamespacedIdentifier,
    pub args: Vec<TemplateArg>,
}

/// A cached instantiation result.
#[derive(Clone, Debug)]
pub enum Instantiation {
    /// Concrete struct type produced from a struct template.
    Struct(ComplexTypeId),
    /// Fully qualified id of the concrete function produced from a
    /// function template.
    Function(NamespacedIdentifier),
}
