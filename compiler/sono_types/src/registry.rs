//! The complex type registry.
//!
//! Owned by a compiler context and passed by reference into every
//! pipeline stage. Registration is idempotent: the same key with the
//! same member layout returns the existing id; the same key with a
//! conflicting layout is an error, never a silent replacement.

use rustc_hash::FxHashMap;
use sono_diagnostic::{Error, Result};
use sono_ir::{NamespacedIdentifier, Span, Visibility};
use tracing::trace;

use crate::{
    ComplexType, ComplexTypeId, ComplexTypeKind, StructMemberInfo, TemplateArg, TypeInfo,
};

/// Registry key: a namespaced name plus the template arguments it was
/// instantiated with (empty for plain structs).
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct TypeKey {
    pub path: NamespacedIdentifier,
    pub args: Vec<TemplateArg>,
}

impl TypeKey {
    pub fn plain(path: NamespacedIdentifier) -> Self {
        TypeKey {
            path,
            args: Vec::new(),
        }
    }

    pub fn with_args(path: NamespacedIdentifier, args: Vec<TemplateArg>) -> Self {
        TypeKey { path, args }
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two(), "alignment must be a power of two");
    (value + align - 1) & !(align - 1)
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<ComplexType>,
    by_key: FxHashMap<TypeKey, ComplexTypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    #[inline]
    pub fn get(&self, id: ComplexTypeId) -> &ComplexType {
        &self.types[id.index()]
    }

    pub fn lookup(&self, key: &TypeKey) -> Option<ComplexTypeId> {
        self.by_key.get(key).copied()
    }

    /// Register a struct type, computing its member layout with natural
    /// alignment: each member aligned to its own alignment, total size
    /// rounded up to the largest member alignment.
    pub fn register_struct(
        &mut self,
        key: TypeKey,
        members: Vec<(String, TypeInfo, Visibility)>,
        span: Span,
    ) -> Result<ComplexTypeId> {
        let (laid_out, size, align) = self.lay_out(&members);

        if let Some(existing) = self.by_key.get(&key) {
            let existing_ty = self.get(*existing);
            if existing_ty.members() == laid_out.as_slice() {
                return Ok(*existing);
            }
            return Err(Error::compile(
                format!("type '{}' registered twice with different layouts", key.path),
                span,
            ));
        }

        trace!(name = %key.path, size, align, "registered struct type");
        Ok(self.insert(
            key,
            ComplexType {
                kind: ComplexTypeKind::Struct { members: laid_out },
                size,
                align,
            },
        ))
    }

    /// Get or create the span type `span<elem, len>`.
    pub fn span_type(&mut self, elem: TypeInfo, len: u32) -> ComplexTypeId {
        let key = TypeKey::with_args(
            NamespacedIdentifier::from_segment("span"),
            vec![TemplateArg::Type(elem), TemplateArg::Const(i64::from(len))],
        );
        if let Some(id) = self.by_key.get(&key) {
            return *id;
        }
        let elem_size = self.size_of(&elem);
        let elem_align = self.align_of(&elem);
        self.insert(
            key,
            ComplexType {
                kind: ComplexTypeKind::Span { elem, len },
                size: elem_size * len,
                align: elem_align,
            },
        )
    }

    fn insert(&mut self, key: TypeKey, ty: ComplexType) -> ComplexTypeId {
        let id = ComplexTypeId::from_index(self.types.len());
        self.types.push(ty);
        self.by_key.insert(key, id);
        id
    }

    fn lay_out(
        &self,
        members: &[(String, TypeInfo, Visibility)],
    ) -> (Vec<StructMemberInfo>, u32, u32) {
        let mut cursor = 0u32;
        let mut max_align = 1u32;
        let laid_out = members
            .iter()
            .map(|(name, ty, visibility)| {
                let align = self.align_of(ty);
                max_align = max_align.max(align);
                cursor = round_up(cursor, align);
                let offset = cursor;
                cursor += self.size_of(ty);
                StructMemberInfo {
                    name: name.clone(),
                    ty: *ty,
                    offset,
                    visibility: *visibility,
                }
            })
            .collect();
        let size = round_up(cursor, max_align).max(1);
        (laid_out, size, max_align)
    }

    /// Size in bytes as stored in memory. References and pointers are
    /// pointer-sized regardless of pointee.
    pub fn size_of(&self, ty: &TypeInfo) -> u32 {
        if ty.is_ref() || ty.is_ptr() {
            return 8;
        }
        match ty.scalar_type() {
            Some(s) => s.size(),
            None => ty.complex_id().map_or(0, |id| self.get(id).size),
        }
    }

    pub fn align_of(&self, ty: &TypeInfo) -> u32 {
        if ty.is_ref() || ty.is_ptr() {
            return 8;
        }
        match ty.scalar_type() {
            Some(s) => s.align(),
            None => ty.complex_id().map_or(1, |id| self.get(id).align),
        }
    }

    /// Human-readable type name for diagnostics.
    pub fn describe(&self, ty: &TypeInfo) -> String {
        let mut out = String::new();
        if ty.is_const() {
            out.push_str("const ");
        }
        match ty.complex_id() {
            Some(id) => match &self.get(id).kind {
                ComplexTypeKind::Span { elem, len } => {
                    out.push_str(&format!("span<{}, {len}>", self.describe(elem)));
                }
                ComplexTypeKind::Struct { .. } => {
                    let name = self
                        .by_key
                        .iter()
                        .find(|(_, v)| **v == id)
                        .map_or_else(|| "<struct>".to_owned(), |(k, _)| k.path.to_string());
                    out.push_str(&name);
                }
            },
            None => match ty.scalar_type() {
                Some(s) => out.push_str(s.name()),
                None => out.push_str("<unresolved>"),
            },
        }
        if ty.is_ptr() {
            out.push('*');
        }
        if ty.is_ref() {
            out.push('&');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Modifiers, ScalarType};
    use pretty_assertions::assert_eq;

    fn key(name: &str) -> TypeKey {
        TypeKey::plain(NamespacedIdentifier::from_segment(name))
    }

    #[test]
    fn natural_alignment_layout() {
        let mut reg = TypeRegistry::new();
        // struct { float a; double b; bool c; }
        let Ok(id) = reg.register_struct(
            key("Mixed"),
            vec![
                ("a".into(), TypeInfo::FLOAT, Visibility::Public),
                ("b".into(), TypeInfo::DOUBLE, Visibility::Public),
                ("c".into(), TypeInfo::BOOL, Visibility::Public),
            ],
            Span::DUMMY,
        ) else {
            panic!("registration failed");
        };
        let ty = reg.get(id);
        let offsets: Vec<u32> = ty.members().iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(ty.align, 8);
        // 17 bytes of fields, rounded up to alignment 8.
        assert_eq!(ty.size, 24);
    }

    #[test]
    fn registration_is_idempotent() {
        let mut reg = TypeRegistry::new();
        let members = vec![("gain".to_owned(), TypeInfo::FLOAT, Visibility::Public)];
        let Ok(first) = reg.register_struct(key("P"), members.clone(), Span::DUMMY) else {
            panic!("registration failed");
        };
        let Ok(second) = reg.register_struct(key("P"), members, Span::DUMMY) else {
            panic!("re-registration failed");
        };
        assert_eq!(first, second);
    }

    #[test]
    fn conflicting_registration_fails() {
        let mut reg = TypeRegistry::new();
        let Ok(_) = reg.register_struct(
            key("P"),
            vec![("gain".into(), TypeInfo::FLOAT, Visibility::Public)],
            Span::DUMMY,
        ) else {
            panic!("registration failed");
        };
        let result = reg.register_struct(
            key("P"),
            vec![("gain".into(), TypeInfo::DOUBLE, Visibility::Public)],
            Span::DUMMY,
        );
        assert!(result.is_err());
    }

    #[test]
    fn span_types_are_memoized() {
        let mut reg = TypeRegistry::new();
        let a = reg.span_type(TypeInfo::FLOAT, 4);
        let b = reg.span_type(TypeInfo::FLOAT, 4);
        let c = reg.span_type(TypeInfo::FLOAT, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reg.get(a).size, 16);
        assert_eq!(reg.get(a).align, 4);
    }

    #[test]
    fn references_are_pointer_sized() {
        let reg = TypeRegistry::new();
        let span_ref = TypeInfo::FLOAT.with(Modifiers::REF);
        assert_eq!(reg.size_of(&span_ref), 8);
        assert_eq!(reg.align_of(&span_ref), 8);
        assert_eq!(reg.size_of(&TypeInfo::scalar(ScalarType::Bool)), 1);
    }

    mod layout_invariant {
        use super::*;
        use proptest::prelude::*;

        fn arb_member_type() -> impl Strategy<Value = TypeInfo> {
            prop_oneof![
                Just(TypeInfo::INT),
                Just(TypeInfo::FLOAT),
                Just(TypeInfo::DOUBLE),
                Just(TypeInfo::BOOL),
            ]
        }

        proptest! {
            // For any member mix: offsets are non-overlapping, each
            // offset is a multiple of the member's natural alignment,
            // and the struct size is a multiple of the largest member
            // alignment.
            #[test]
            fn offsets_respect_natural_alignment(
                types in proptest::collection::vec(arb_member_type(), 1..12)
            ) {
                let mut reg = TypeRegistry::new();
                let members: Vec<(String, TypeInfo, Visibility)> = types
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| (format!("m{i}"), *ty, Visibility::Public))
                    .collect();
                let Ok(id) = reg.register_struct(key("Arb"), members, Span::DUMMY) else {
                    panic!("registration failed");
                };
                let ty = reg.get(id);
                let mut prev_end = 0u32;
                let mut max_align = 1u32;
                for m in ty.members() {
                    let size = reg.size_of(&m.ty);
                    let align = reg.align_of(&m.ty);
                    max_align = max_align.max(align);
                    prop_assert!(m.offset >= prev_end);
                    prop_assert_eq!(m.offset % align, 0);
                    prev_end = m.offset + size;
                }
                prop_assert_eq!(ty.size % max_align, 0);
                prop_assert!(ty.size >= prev_end);
                prop_assert_eq!(ty.align, max_align);
            }
        }
    }

    #[test]
    fn describe_names_spans_and_structs() {
        let mut reg = TypeRegistry::new();
        let span_id = reg.span_type(TypeInfo::FLOAT, 4);
        assert_eq!(reg.describe(&TypeInfo::complex(span_id)), "span<float, 4>");
        let Ok(p) = reg.register_struct(
            key("P"),
            vec![("gain".into(), TypeInfo::FLOAT, Visibility::Public)],
            Span::DUMMY,
        ) else {
            panic!("registration failed");
        };
        assert_eq!(reg.describe(&TypeInfo::complex(p)), "P");
    }
}
