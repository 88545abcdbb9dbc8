//! Implicit and explicit conversion rules.
//!
//! Numeric widening (`int` → `float` → `double`) happens implicitly;
//! narrowing needs a cast. `bool` never converts implicitly in either
//! direction; condition contexts are handled separately by the type
//! checker, which knows it is asking for a truth value.

use crate::{ScalarType, TypeInfo};

/// Can `from` be used where `to` is required without a cast?
pub fn implicit_convertible(from: TypeInfo, to: TypeInfo) -> bool {
    let from = from.value_type();
    let to = to.value_type();
    if from == to {
        return true;
    }
    match (from.scalar_type(), to.scalar_type()) {
        (Some(f), Some(t)) => match (f.numeric_rank(), t.numeric_rank()) {
            (Some(rf), Some(rt)) => rf <= rt,
            _ => false,
        },
        _ => false,
    }
}

/// Can `from` be cast to `to` with an explicit cast?
///
/// All scalar-to-scalar casts are allowed, bool included; complex types
/// never cast.
pub fn explicit_convertible(from: TypeInfo, to: TypeInfo) -> bool {
    if implicit_convertible(from, to) {
        return true;
    }
    from.value_type().scalar_type().is_some()
        && to.value_type().scalar_type().is_some_and(|s| s != ScalarType::Void)
}

/// The type both operands of a numeric binary operation widen to.
pub fn common_numeric(a: TypeInfo, b: TypeInfo) -> Option<ScalarType> {
    let sa = a.value_type().scalar_type()?;
    let sb = b.value_type().scalar_type()?;
    let ra = sa.numeric_rank()?;
    let rb = sb.numeric_rank()?;
    Some(if ra >= rb { sa } else { sb })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Modifiers;

    #[test]
    fn widening_is_implicit() {
        assert!(implicit_convertible(TypeInfo::INT, TypeInfo::FLOAT));
        assert!(implicit_convertible(TypeInfo::INT, TypeInfo::DOUBLE));
        assert!(implicit_convertible(TypeInfo::FLOAT, TypeInfo::DOUBLE));
    }

    #[test]
    fn narrowing_is_not() {
        assert!(!implicit_convertible(TypeInfo::DOUBLE, TypeInfo::FLOAT));
        assert!(!implicit_convertible(TypeInfo::FLOAT, TypeInfo::INT));
    }

    #[test]
    fn bool_is_isolated() {
        assert!(!implicit_convertible(TypeInfo::BOOL, TypeInfo::INT));
        assert!(!implicit_convertible(TypeInfo::INT, TypeInfo::BOOL));
        // But explicit casts work.
        assert!(explicit_convertible(TypeInfo::BOOL, TypeInfo::INT));
        assert!(explicit_convertible(TypeInfo::INT, TypeInfo::BOOL));
    }

    #[test]
    fn modifiers_do_not_block_value_conversion() {
        let const_int = TypeInfo::INT.with(Modifiers::CONST);
        assert!(implicit_convertible(const_int, TypeInfo::FLOAT));
    }

    #[test]
    fn common_type_picks_the_wider() {
        assert_eq!(
            common_numeric(TypeInfo::INT, TypeInfo::FLOAT),
            Some(ScalarType::Float)
        );
        assert_eq!(
            common_numeric(TypeInfo::DOUBLE, TypeInfo::INT),
            Some(ScalarType::Double)
        );
        assert_eq!(common_numeric(TypeInfo::BOOL, TypeInfo::INT), None);
    }

    #[test]
    fn nothing_casts_to_void() {
        assert!(!explicit_convertible(TypeInfo::INT, TypeInfo::VOID));
    }
}
