//! Namespaced identifiers.

use std::fmt;

use smallvec::SmallVec;

/// A dotted/scoped name: `Math::min`, `filters::OnePole`, `gain`.
///
/// Value type compared structurally. Most names have one or two segments,
/// hence the inline capacity.
#[derive(Clone, Eq, PartialEq, Hash, Default)]
pub struct NamespacedIdentifier {
    segments: SmallVec<[String; 2]>,
}

impl NamespacedIdentifier {
    /// The root (global) namespace.
    pub fn root() -> Self {
        NamespacedIdentifier::default()
    }

    pub fn from_segment(segment: impl Into<String>) -> Self {
        let mut segments = SmallVec::new();
        segments.push(segment.into());
        NamespacedIdentifier { segments }
    }

    pub fn from_segments(iter: impl IntoIterator<Item = String>) -> Self {
        NamespacedIdentifier {
            segments: iter.into_iter().collect(),
        }
    }

    /// Append one segment: `a::b`.child(`c`) == `a::b::c`.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        NamespacedIdentifier { segments }
    }

    /// Join a (possibly qualified) relative name onto this one.
    #[must_use]
    pub fn join(&self, relative: &NamespacedIdentifier) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(relative.segments.iter().cloned());
        NamespacedIdentifier { segments }
    }

    /// The enclosing scope: `a::b::c`.parent() == `a::b`.
    ///
    /// The root namespace is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        NamespacedIdentifier { segments }
    }

    /// Final segment, or `None` for the root namespace.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// More than one segment, i.e. written with explicit `::` scoping.
    pub fn is_qualified(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True if `self` is `other` or lives inside it.
    pub fn is_inside(&self, other: &NamespacedIdentifier) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }
}

impl fmt::Display for NamespacedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("::")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for NamespacedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn child_and_parent_invert() {
        let a = NamespacedIdentifier::from_segment("filters");
        let b = a.child("OnePole");
        assert_eq!(b.to_string(), "filters::OnePole");
        assert_eq!(b.parent(), a);
        assert_eq!(b.last(), Some("OnePole"));
    }

    #[test]
    fn structural_equality() {
        let a = NamespacedIdentifier::from_segments(["Math".into(), "min".into()]);
        let b = NamespacedIdentifier::from_segment("Math").child("min");
        assert_eq!(a, b);
    }

    #[test]
    fn is_inside_checks_prefix() {
        let ns = NamespacedIdentifier::from_segment("dsp");
        let sym = ns.child("Filter").child("gain");
        assert!(sym.is_inside(&ns));
        assert!(sym.is_inside(&NamespacedIdentifier::root()));
        assert!(!ns.is_inside(&sym));
    }

    #[test]
    fn root_is_its_own_parent() {
        let root = NamespacedIdentifier::root();
        assert!(root.is_root());
        assert_eq!(root.parent(), root);
        assert_eq!(root.last(), None);
    }
}
