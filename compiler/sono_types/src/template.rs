//! Template arguments.

use std::fmt;

use crate::TypeInfo;

/// One concrete template argument. The pair (template path, argument
/// list) is the memoization key for instantiation: identical arguments
/// always yield the same cached instance.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TemplateArg {
    Type(TypeInfo),
    Const(i64),
}

impl fmt::Display for TemplateArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // TypeInfo display needs the registry; the debug form is
            // only used for mangled names and log lines.
            TemplateArg::Type(t) => write!(f, "{t:?}"),
            TemplateArg::Const(v) => write!(f, "{v}"),
        }
    }
}
