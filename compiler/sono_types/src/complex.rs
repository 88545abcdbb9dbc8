//! Complex types: structs and fixed-size spans.

use sono_ir::Visibility;

use crate::TypeInfo;

/// Index into the [`crate::TypeRegistry`]. Complex types are registered
/// once and shared by id from every site that uses them.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct ComplexTypeId(u32);

impl ComplexTypeId {
    #[inline]
    pub fn from_index(index: usize) -> Self {
        ComplexTypeId(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One struct member with its computed byte offset.
#[derive(Clone, Debug, PartialEq)]
pub struct StructMemberInfo {
    pub name: String,
    pub ty: TypeInfo,
    pub offset: u32,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ComplexTypeKind {
    Struct { members: Vec<StructMemberInfo> },
    Span { elem: TypeInfo, len: u32 },
}

/// A registered complex type. Immutable after registration: layout is
/// finalized exactly once and the backend indexes by these offsets.
#[derive(Clone, Debug)]
pub struct ComplexType {
    pub kind: ComplexTypeKind,
    pub size: u32,
    pub align: u32,
}

impl ComplexType {
    pub fn members(&self) -> &[StructMemberInfo] {
        match &self.kind {
            ComplexTypeKind::Struct { members } => members,
            ComplexTypeKind::Span { .. } => &[],
        }
    }

    pub fn member(&self, name: &str) -> Option<&StructMemberInfo> {
        self.members().iter().find(|m| m.name == name)
    }
}
