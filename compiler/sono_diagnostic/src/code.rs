//! Stable error codes for searchability.

use std::fmt;

/// One code per error class. The numbering is append-only; codes are
/// part of the host-facing contract and show up in rendered reports.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    /// Malformed token stream or grammar violation.
    Syntax,
    /// Identifier lookup failed under the must-exist policy.
    UnresolvedSymbol,
    /// Identifier already declared in the active scope.
    Redeclaration,
    /// Visibility rule violated during resolution.
    Access,
    /// Expression type incompatible with its required type.
    TypeMismatch,
    /// Pipeline-stage failure not covered by a more specific class.
    Compile,
    /// Host-requested call signature does not match the compiled
    /// function. Raised at bind time, never at call time.
    SignatureMismatch,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Syntax => "E0001",
            ErrorCode::UnresolvedSymbol => "E0002",
            ErrorCode::Redeclaration => "E0003",
            ErrorCode::Access => "E0004",
            ErrorCode::TypeMismatch => "E0005",
            ErrorCode::Compile => "E0006",
            ErrorCode::SignatureMismatch => "E0007",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
