//! Scalar types, modifiers and `TypeInfo`.

use std::fmt;

use bitflags::bitflags;

use crate::ComplexTypeId;

/// The built-in scalar types.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ScalarType {
    Int,
    Float,
    Double,
    Bool,
    Void,
}

impl ScalarType {
    /// Size in bytes. `void` has no size; callers never allocate it.
    pub fn size(self) -> u32 {
        match self {
            ScalarType::Int | ScalarType::Float => 4,
            ScalarType::Double => 8,
            ScalarType::Bool => 1,
            ScalarType::Void => 0,
        }
    }

    /// Natural alignment equals size for every scalar.
    pub fn align(self) -> u32 {
        self.size().max(1)
    }

    /// Widening rank: int < float < double. Comparison across ranks
    /// drives implicit numeric conversion.
    pub fn numeric_rank(self) -> Option<u8> {
        match self {
            ScalarType::Int => Some(0),
            ScalarType::Float => Some(1),
            ScalarType::Double => Some(2),
            ScalarType::Bool | ScalarType::Void => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::Bool => "bool",
            ScalarType::Void => "void",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Type modifiers. `PTR` only appears on backend-registered types
    /// (raw channel pointers); the surface language spells references
    /// with `&` and never produces bare pointers.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct Modifiers: u8 {
        const CONST = 1 << 0;
        const REF   = 1 << 1;
        const PTR   = 1 << 2;
    }
}

/// What a `TypeInfo` is, before modifiers.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BaseType {
    Scalar(ScalarType),
    /// Struct or span, identified by its registry entry.
    Complex(ComplexTypeId),
    /// Not yet resolved (template parameters before instantiation,
    /// symbols registered by the parser ahead of resolution).
    Dynamic,
}

/// A value's type: base type plus modifiers.
///
/// Two `TypeInfo` are equal iff base and modifiers match: structural
/// equality, nothing nominal hides behind it.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct TypeInfo {
    pub base: BaseType,
    pub modifiers: Modifiers,
}

impl TypeInfo {
    pub const fn scalar(scalar: ScalarType) -> Self {
        TypeInfo {
            base: BaseType::Scalar(scalar),
            modifiers: Modifiers::empty(),
        }
    }

    pub const INT: TypeInfo = TypeInfo::scalar(ScalarType::Int);
    pub const FLOAT: TypeInfo = TypeInfo::scalar(ScalarType::Float);
    pub const DOUBLE: TypeInfo = TypeInfo::scalar(ScalarType::Double);
    pub const BOOL: TypeInfo = TypeInfo::scalar(ScalarType::Bool);
    pub const VOID: TypeInfo = TypeInfo::scalar(ScalarType::Void);

    pub const fn complex(id: ComplexTypeId) -> Self {
        TypeInfo {
            base: BaseType::Complex(id),
            modifiers: Modifiers::empty(),
        }
    }

    pub const fn dynamic() -> Self {
        TypeInfo {
            base: BaseType::Dynamic,
            modifiers: Modifiers::empty(),
        }
    }

    #[must_use]
    pub fn with(mut self, flags: Modifiers) -> Self {
        self.modifiers |= flags;
        self
    }

    /// Same base type, no modifiers. Used when comparing value types
    /// across reference boundaries.
    #[must_use]
    pub fn value_type(self) -> Self {
        TypeInfo {
            base: self.base,
            modifiers: Modifiers::empty(),
        }
    }

    pub fn is_const(self) -> bool {
        self.modifiers.contains(Modifiers::CONST)
    }

    pub fn is_ref(self) -> bool {
        self.modifiers.contains(Modifiers::REF)
    }

    pub fn is_ptr(self) -> bool {
        self.modifiers.contains(Modifiers::PTR)
    }

    pub fn scalar_type(self) -> Option<ScalarType> {
        match self.base {
            BaseType::Scalar(s) if !self.is_ptr() => Some(s),
            _ => None,
        }
    }

    pub fn complex_id(self) -> Option<ComplexTypeId> {
        match self.base {
            BaseType::Complex(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_void(self) -> bool {
        matches!(self.base, BaseType::Scalar(ScalarType::Void)) && !self.is_ptr()
    }

    pub fn is_dynamic(self) -> bool {
        matches!(self.base, BaseType::Dynamic)
    }

    pub fn is_numeric(self) -> bool {
        self.scalar_type().is_some_and(|s| s.numeric_rank().is_some())
    }

    pub fn is_bool(self) -> bool {
        self.scalar_type() == Some(ScalarType::Bool)
    }

    /// Whether this type passes and returns as a pointer in generated
    /// code (complex types and anything ref/ptr qualified).
    pub fn is_pointer_sized(self) -> bool {
        self.is_ref() || self.is_ptr() || matches!(self.base, BaseType::Complex(_))
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const() {
            f.write_str("const ")?;
        }
        match self.base {
            BaseType::Scalar(s) => write!(f, "{s}")?,
            BaseType::Complex(id) => write!(f, "complex#{}", id.index())?,
            BaseType::Dynamic => f.write_str("dynamic")?,
        }
        if self.is_ptr() {
            f.write_str("*")?;
        }
        if self.is_ref() {
            f.write_str("&")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn equality_is_structural() {
        assert_eq!(TypeInfo::FLOAT, TypeInfo::scalar(ScalarType::Float));
        assert_ne!(TypeInfo::FLOAT, TypeInfo::DOUBLE);
        assert_ne!(TypeInfo::FLOAT, TypeInfo::FLOAT.with(Modifiers::REF));
        assert_eq!(
            TypeInfo::FLOAT.with(Modifiers::CONST),
            TypeInfo::FLOAT.with(Modifiers::CONST)
        );
    }

    #[test]
    fn complex_equality_is_by_id() {
        let a = TypeInfo::complex(ComplexTypeId::from_index(0));
        let b = TypeInfo::complex(ComplexTypeId::from_index(0));
        let c = TypeInfo::complex(ComplexTypeId::from_index(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn value_type_strips_modifiers() {
        let t = TypeInfo::FLOAT.with(Modifiers::CONST | Modifiers::REF);
        assert_eq!(t.value_type(), TypeInfo::FLOAT);
        assert!(t.is_ref());
        assert!(!t.value_type().is_ref());
    }

    #[test]
    fn numeric_rank_ordering() {
        let Some(int) = ScalarType::Int.numeric_rank() else {
            panic!("int has a rank");
        };
        let Some(float) = ScalarType::Float.numeric_rank() else {
            panic!("float has a rank");
        };
        let Some(double) = ScalarType::Double.numeric_rank() else {
            panic!("double has a rank");
        };
        assert!(int < float && float < double);
        assert_eq!(ScalarType::Bool.numeric_rank(), None);
    }
}
