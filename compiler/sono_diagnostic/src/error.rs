//! The error taxonomy.

use sono_ir::Span;
use thiserror::Error;

use crate::ErrorCode;

pub type Result<T> = std::result::Result<T, Error>;

/// Where an error points into the preprocessed source.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SourceLocation {
    pub span: Span,
}

impl SourceLocation {
    #[inline]
    pub fn new(span: Span) -> Self {
        SourceLocation { span }
    }
}

impl From<Span> for SourceLocation {
    fn from(span: Span) -> Self {
        SourceLocation { span }
    }
}

/// A compile failure. Surfaced as a value, never by unwinding: nothing
/// in this crate or its consumers panics across the audio thread's call
/// path.
#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("syntax error: {message}")]
    Syntax {
        message: String,
        location: SourceLocation,
    },

    #[error("unresolved symbol '{symbol}'")]
    UnresolvedSymbol {
        symbol: String,
        location: SourceLocation,
    },

    #[error("redeclaration of '{symbol}'")]
    Redeclaration {
        symbol: String,
        location: SourceLocation,
    },

    #[error("'{symbol}' is private and not accessible from this scope")]
    Access {
        symbol: String,
        location: SourceLocation,
    },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        location: SourceLocation,
    },

    #[error("{message}")]
    Compile {
        message: String,
        location: SourceLocation,
    },

    #[error("signature mismatch: {message}")]
    SignatureMismatch { message: String },
}

impl Error {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Error::Syntax {
            message: message.into(),
            location: span.into(),
        }
    }

    pub fn unresolved(symbol: impl Into<String>, span: Span) -> Self {
        Error::UnresolvedSymbol {
            symbol: symbol.into(),
            location: span.into(),
        }
    }

    pub fn redeclaration(symbol: impl Into<String>, span: Span) -> Self {
        Error::Redeclaration {
            symbol: symbol.into(),
            location: span.into(),
        }
    }

    pub fn access(symbol: impl Into<String>, span: Span) -> Self {
        Error::Access {
            symbol: symbol.into(),
            location: span.into(),
        }
    }

    pub fn type_mismatch(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
            location: span.into(),
        }
    }

    pub fn compile(message: impl Into<String>, span: Span) -> Self {
        Error::Compile {
            message: message.into(),
            location: span.into(),
        }
    }

    pub fn signature_mismatch(message: impl Into<String>) -> Self {
        Error::SignatureMismatch {
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Syntax { .. } => ErrorCode::Syntax,
            Error::UnresolvedSymbol { .. } => ErrorCode::UnresolvedSymbol,
            Error::Redeclaration { .. } => ErrorCode::Redeclaration,
            Error::Access { .. } => ErrorCode::Access,
            Error::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Error::Compile { .. } => ErrorCode::Compile,
            Error::SignatureMismatch { .. } => ErrorCode::SignatureMismatch,
        }
    }

    /// Source location, absent only for bind-time signature mismatches.
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Error::Syntax { location, .. }
            | Error::UnresolvedSymbol { location, .. }
            | Error::Redeclaration { location, .. }
            | Error::Access { location, .. }
            | Error::TypeMismatch { location, .. }
            | Error::Compile { location, .. } => Some(*location),
            Error::SignatureMismatch { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_variants() {
        let e = Error::redeclaration("x", Span::new(0, 1));
        assert_eq!(e.code(), ErrorCode::Redeclaration);
        let e = Error::signature_mismatch("return type");
        assert_eq!(e.code(), ErrorCode::SignatureMismatch);
        assert!(e.location().is_none());
    }

    #[test]
    fn display_is_single_line() {
        let e = Error::type_mismatch("float", "bool", Span::new(3, 7));
        let text = e.to_string();
        assert!(text.contains("float"));
        assert!(text.contains("bool"));
        assert!(!text.contains('\n'));
    }
}
