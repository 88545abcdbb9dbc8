//! Type system for the Sono compiler.
//!
//! Scalar types, modifier flags, complex (struct/span) types with
//! registry-computed memory layout, and the implicit-conversion rules
//! the type checker applies. The registry is an explicit value owned by
//! the compiler context; there is no global state, so independent
//! compiler instances never observe each other's registrations.
//!
//! Layout is the contract with the native backend: member offsets
//! computed here are what generated code dereferences, byte for byte.

mod complex;
mod conversion;
mod registry;
mod template;
mod type_info;

pub use complex::{ComplexType, ComplexTypeId, ComplexTypeKind, StructMemberInfo};
pub use conversion::{common_numeric, explicit_convertible, implicit_convertible};
pub use registry::{TypeKey, TypeRegistry};
pub use template::TemplateArg;
pub use type_info::{BaseType, Modifiers, ScalarType, TypeInfo};
