//! Namespace and symbol handling.
//!
//! An explicit context value: created per compiler instance, passed by
//! reference into parsing and every later pass. Lookup honors namespace
//! nesting and `using` directives; explicitly scoped names (`a::b`)
//! bypass `using` flattening. Three resolution policies cover every
//! caller intent: lookup-only, must-exist, must-be-new.

mod handler;
mod symbol;
mod templates;

pub use handler::{NamespaceHandler, Policy};
pub use symbol::{ConstValue, Symbol, SymbolKind};
pub use templates::{Instantiation, InstantiationKey, TemplateDecl, TemplateKind};
