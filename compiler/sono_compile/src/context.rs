//! The compiler context: namespace handler + type registry.

use sono_resolve::NamespaceHandler;
use sono_types::TypeRegistry;

/// Process-scoped state for one compiler instance, passed by reference
/// into every pipeline stage. Independent instances (one per plugin
/// instance, one per test) never share anything.
#[derive(Debug)]
pub struct CompilerContext {
    pub handler: NamespaceHandler,
    pub registry: TypeRegistry,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerContext {
    /// A fresh context with an empty registry and handler. The built-in
    /// library is registered when a unit is created, so its entries land
    /// in the unit's function table.
    pub fn new() -> Self {
        CompilerContext {
            handler: NamespaceHandler::new(),
            registry: TypeRegistry::new(),
        }
    }
}
