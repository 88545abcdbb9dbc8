//! The namespace handler.

use rustc_hash::FxHashMap;
use sono_diagnostic::{Error, Result};
use sono_ir::{NamespacedIdentifier, Span, Visibility};
use sono_types::TypeInfo;
use tracing::trace;

use crate::{ConstValue, Instantiation, InstantiationKey, Symbol, SymbolKind, TemplateDecl};

/// Caller intent for a lookup.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Policy {
    /// Lookup only; absence is not an error.
    CanExist,
    /// Fail with `UnresolvedSymbolError` if absent.
    MustExist,
    /// Fail with `RedeclarationError` if already present in the active
    /// scope.
    MustBeNew,
}

#[derive(Debug, Default)]
struct NamespaceData {
    symbols: FxHashMap<String, Symbol>,
    usings: Vec<NamespacedIdentifier>,
}

/// Symbol tables for one compiler instance.
///
/// Not a process-wide singleton: every compiler owns its own handler, so
/// concurrent independent compilations cannot observe each other.
#[derive(Debug)]
pub struct NamespaceHandler {
    namespaces: FxHashMap<NamespacedIdentifier, NamespaceData>,
    current: NamespacedIdentifier,
    templates: FxHashMap<NamespacedIdentifier, TemplateDecl>,
    instantiations: FxHashMap<InstantiationKey, Instantiation>,
}

impl Default for NamespaceHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceHandler {
    pub fn new() -> Self {
        let mut namespaces = FxHashMap::default();
        namespaces.insert(NamespacedIdentifier::root(), NamespaceData::default());
        NamespaceHandler {
            namespaces,
            current: NamespacedIdentifier::root(),
            templates: FxHashMap::default(),
            instantiations: FxHashMap::default(),
        }
    }

    /// The namespace declarations currently register into.
    pub fn current(&self) -> &NamespacedIdentifier {
        &self.current
    }

    /// Enter a (possibly new) child namespace of the current one.
    pub fn enter(&mut self, name: &str) {
        self.current = self.current.child(name);
        self.namespaces.entry(self.current.clone()).or_default();
    }

    /// Leave the current namespace.
    ///
    /// Leaving the root is a programming error in the parser, tolerated
    /// as a no-op rather than a panic.
    pub fn exit(&mut self) {
        debug_assert!(!self.current.is_root(), "exit() below the root namespace");
        self.current = self.current.parent();
    }

    /// Register a symbol in the current namespace under the must-be-new
    /// policy.
    pub fn add_symbol(
        &mut self,
        name: &str,
        ty: TypeInfo,
        kind: SymbolKind,
        visibility: Visibility,
        span: Span,
    ) -> Result<NamespacedIdentifier> {
        let id = self.current.child(name);
        let data = self.namespaces.entry(self.current.clone()).or_default();
        if data.symbols.contains_key(name) {
            return Err(Error::redeclaration(id.to_string(), span));
        }
        trace!(symbol = %id, ?kind, "add symbol");
        data.symbols.insert(
            name.to_owned(),
            Symbol {
                id: id.clone(),
                ty,
                kind,
                visibility,
                const_value: None,
            },
        );
        if kind == SymbolKind::Namespace {
            self.namespaces.entry(id.clone()).or_default();
        }
        Ok(id)
    }

    /// Update the stored type of an already registered symbol (the
    /// parser registers functions and globals as `Dynamic`; later passes
    /// patch in the resolved type).
    pub fn set_symbol_type(&mut self, id: &NamespacedIdentifier, ty: TypeInfo) {
        if let Some(symbol) = self.symbol_mut(id) {
            symbol.ty = ty;
        }
    }

    /// Attach a folded constant value to a `Constant` symbol.
    pub fn set_const_value(&mut self, id: &NamespacedIdentifier, value: ConstValue) {
        if let Some(symbol) = self.symbol_mut(id) {
            symbol.const_value = Some(value);
        }
    }

    fn symbol_mut(&mut self, id: &NamespacedIdentifier) -> Option<&mut Symbol> {
        let ns = id.parent();
        let name = id.last()?;
        self.namespaces.get_mut(&ns)?.symbols.get_mut(name)
    }

    /// Exact lookup by fully qualified id, no scope walking.
    pub fn symbol(&self, id: &NamespacedIdentifier) -> Option<&Symbol> {
        let ns = id.parent();
        let name = id.last()?;
        self.namespaces.get(&ns)?.symbols.get(name)
    }

    /// `using namespace path;` in the current namespace.
    pub fn add_using(&mut self, path: NamespacedIdentifier) {
        let data = self.namespaces.entry(self.current.clone()).or_default();
        if !data.usings.contains(&path) {
            data.usings.push(path);
        }
    }

    /// Resolve `path` as seen from namespace `from`.
    ///
    /// Search walks `from` outward to the root; at each level the name
    /// is tried directly and then, unless `explicit_scope`, through
    /// that level's `using` directives. Visibility is enforced for
    /// `MustExist` lookups: private symbols resolve only from inside
    /// their owning scope.
    pub fn resolve(
        &self,
        path: &NamespacedIdentifier,
        explicit_scope: bool,
        from: &NamespacedIdentifier,
        policy: Policy,
        span: Span,
    ) -> Result<Option<&Symbol>> {
        if policy == Policy::MustBeNew {
            // Must-be-new only inspects the active scope.
            let found = self
                .namespaces
                .get(from)
                .and_then(|data| path.last().and_then(|name| data.symbols.get(name)));
            return match found {
                Some(symbol) => Err(Error::redeclaration(symbol.id.to_string(), span)),
                None => Ok(None),
            };
        }

        let mut scope = from.clone();
        loop {
            if let Some(symbol) = self.lookup_in(&scope, path) {
                return self.check_access(symbol, from, policy, span);
            }
            if !explicit_scope {
                if let Some(data) = self.namespaces.get(&scope) {
                    for using in &data.usings {
                        if let Some(symbol) = self.lookup_in(using, path) {
                            return self.check_access(symbol, from, policy, span);
                        }
                    }
                }
            }
            if scope.is_root() {
                break;
            }
            scope = scope.parent();
        }

        match policy {
            Policy::MustExist => Err(Error::unresolved(path.to_string(), span)),
            _ => Ok(None),
        }
    }

    fn lookup_in(&self, scope: &NamespacedIdentifier, path: &NamespacedIdentifier) -> Option<&Symbol> {
        let full = scope.join(path);
        self.symbol(&full)
    }

    fn check_access<'a>(
        &self,
        symbol: &'a Symbol,
        from: &NamespacedIdentifier,
        policy: Policy,
        span: Span,
    ) -> Result<Option<&'a Symbol>> {
        if policy == Policy::MustExist
            && symbol.visibility == Visibility::Private
            && !from.is_inside(&symbol.id.parent())
        {
            return Err(Error::access(symbol.id.to_string(), span));
        }
        Ok(Some(symbol))
    }

    // Template bookkeeping

    pub fn register_template(&mut self, id: NamespacedIdentifier, decl: TemplateDecl) {
        self.templates.insert(id, decl);
    }

    pub fn template(&self, id: &NamespacedIdentifier) -> Option<&TemplateDecl> {
        self.templates.get(id)
    }

    /// Cached instantiation for (template, args), if any.
    pub fn instantiation(&self, key: &InstantiationKey) -> Option<&Instantiation> {
        self.instantiations.get(key)
    }

    /// Record an instantiation. Once recorded the entry never changes;
    /// repeated instantiation with the same key must observe the first
    /// result.
    pub fn record_instantiation(&mut self, key: InstantiationKey, instantiation: Instantiation) {
        debug_assert!(
            !self.instantiations.contains_key(&key),
            "instantiation recorded twice for {key:?}"
        );
        trace!(template = %key.template, "record instantiation");
        self.instantiations.insert(key, instantiation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sono_types::TemplateArg;

    fn handler_with(symbols: &[(&str, Visibility)]) -> NamespaceHandler {
        let mut h = NamespaceHandler::new();
        for (name, vis) in symbols {
            let Ok(_) = h.add_symbol(name, TypeInfo::FLOAT, SymbolKind::Variable, *vis, Span::DUMMY)
            else {
                panic!("add_symbol failed for {name}");
            };
        }
        h
    }

    #[test]
    fn must_be_new_rejects_redeclaration() {
        let mut h = handler_with(&[("x", Visibility::Public)]);
        let result = h.add_symbol(
            "x",
            TypeInfo::INT,
            SymbolKind::Variable,
            Visibility::Public,
            Span::DUMMY,
        );
        let Err(e) = result else {
            panic!("expected redeclaration error");
        };
        assert!(e.to_string().contains("redeclaration"));
        // The original registration survives untouched.
        let root = NamespacedIdentifier::root();
        let Ok(Some(sym)) = h.resolve(
            &NamespacedIdentifier::from_segment("x"),
            false,
            &root,
            Policy::MustExist,
            Span::DUMMY,
        ) else {
            panic!("x should still resolve");
        };
        assert_eq!(sym.ty, TypeInfo::FLOAT);
    }

    #[test]
    fn can_exist_is_silent_on_absence() {
        let h = NamespaceHandler::new();
        let root = NamespacedIdentifier::root();
        let Ok(found) = h.resolve(
            &NamespacedIdentifier::from_segment("missing"),
            false,
            &root,
            Policy::CanExist,
            Span::DUMMY,
        ) else {
            panic!("CanExist must not error");
        };
        assert!(found.is_none());
    }

    #[test]
    fn must_exist_errors_on_absence() {
        let h = NamespaceHandler::new();
        let root = NamespacedIdentifier::root();
        let result = h.resolve(
            &NamespacedIdentifier::from_segment("missing"),
            false,
            &root,
            Policy::MustExist,
            Span::DUMMY,
        );
        assert!(result.is_err());
    }

    #[test]
    fn lookup_walks_outward_through_nesting() {
        let mut h = NamespaceHandler::new();
        let Ok(_) = h.add_symbol(
            "outer",
            TypeInfo::FLOAT,
            SymbolKind::Variable,
            Visibility::Public,
            Span::DUMMY,
        ) else {
            panic!("add failed");
        };
        h.enter("inner");
        let from = h.current().clone();
        let Ok(Some(sym)) = h.resolve(
            &NamespacedIdentifier::from_segment("outer"),
            false,
            &from,
            Policy::MustExist,
            Span::DUMMY,
        ) else {
            panic!("outer should be visible from inner");
        };
        assert_eq!(sym.id.to_string(), "outer");
    }

    #[test]
    fn using_flattens_but_explicit_scope_does_not() {
        let mut h = NamespaceHandler::new();
        h.enter("dsp");
        let Ok(_) = h.add_symbol(
            "gain",
            TypeInfo::FLOAT,
            SymbolKind::Variable,
            Visibility::Public,
            Span::DUMMY,
        ) else {
            panic!("add failed");
        };
        h.exit();
        h.add_using(NamespacedIdentifier::from_segment("dsp"));

        let root = NamespacedIdentifier::root();
        let bare = NamespacedIdentifier::from_segment("gain");

        // Flattened lookup finds it.
        let Ok(Some(_)) = h.resolve(&bare, false, &root, Policy::MustExist, Span::DUMMY) else {
            panic!("using-directive lookup failed");
        };
        // Explicit scoping refuses the flattened path.
        let result = h.resolve(&bare, true, &root, Policy::MustExist, Span::DUMMY);
        assert!(result.is_err());
        // And the qualified name keeps working.
        let qualified = NamespacedIdentifier::from_segment("dsp").child("gain");
        let Ok(Some(_)) = h.resolve(&qualified, true, &root, Policy::MustExist, Span::DUMMY)
        else {
            panic!("qualified lookup failed");
        };
    }

    #[test]
    fn private_symbols_fail_from_outside() {
        let mut h = NamespaceHandler::new();
        h.enter("Filter");
        let Ok(_) = h.add_symbol(
            "state",
            TypeInfo::FLOAT,
            SymbolKind::Member,
            Visibility::Private,
            Span::DUMMY,
        ) else {
            panic!("add failed");
        };
        let inside = h.current().clone();
        h.exit();

        let path = NamespacedIdentifier::from_segment("Filter").child("state");
        let root = NamespacedIdentifier::root();

        let result = h.resolve(&path, true, &root, Policy::MustExist, Span::DUMMY);
        let Err(e) = result else {
            panic!("expected access error");
        };
        assert!(e.to_string().contains("private"));

        // From inside the owning scope it resolves.
        let Ok(Some(_)) = h.resolve(
            &NamespacedIdentifier::from_segment("state"),
            false,
            &inside,
            Policy::MustExist,
            Span::DUMMY,
        ) else {
            panic!("inside lookup failed");
        };
    }

    #[test]
    fn instantiations_are_memoized_by_key() {
        let mut h = NamespaceHandler::new();
        let key = InstantiationKey {
            template: NamespacedIdentifier::from_segment("Biquad"),
            args: vec![TemplateArg::Const(2)],
        };
        assert!(h.instantiation(&key).is_none());
        h.record_instantiation(
            key.clone(),
            Instantiation::Function(NamespacedIdentifier::from_segment("Biquad__2")),
        );
        let Some(Instantiation::Function(id)) = h.instantiation(&key) else {
            panic!("memoized instantiation missing");
        };
        assert_eq!(id.to_string(), "Biquad__2");

        let other = InstantiationKey {
            template: NamespacedIdentifier::from_segment("Biquad"),
            args: vec![TemplateArg::Const(4)],
        };
        assert!(h.instantiation(&other).is_none());
    }
}
