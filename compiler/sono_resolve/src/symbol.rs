//! Symbols.

use sono_ir::{NamespacedIdentifier, Visibility};
use sono_types::TypeInfo;

/// What kind of thing a name refers to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SymbolKind {
    Variable,
    Constant,
    Function,
    Struct,
    TemplateFunction,
    TemplateStruct,
    Namespace,
    /// Struct data member, registered under `Struct::member`.
    Member,
    /// Struct member function.
    Method,
}

/// Compile-time constant value attached to `Constant` symbols and
/// template constant parameters.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
}

impl ConstValue {
    pub fn as_int(self) -> Option<i64> {
        match self {
            ConstValue::Int(v) => Some(v),
            ConstValue::Float(_) => None,
        }
    }
}

/// One registered symbol.
#[derive(Clone, Debug)]
pub struct Symbol {
    /// Fully qualified id, unique across the handler.
    pub id: NamespacedIdentifier,
    pub ty: TypeInfo,
    pub kind: SymbolKind,
    pub visibility: Visibility,
    /// Set for `Constant` symbols once their initializer folded.
    pub const_value: Option<ConstValue>,
}
