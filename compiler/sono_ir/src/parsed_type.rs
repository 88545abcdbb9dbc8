//! Syntactic types as written in source.
//!
//! The parser produces these; the type system resolves them into
//! `TypeInfo` values once struct registrations and template arguments are
//! known. Keeping the two representations apart is what lets template
//! bodies be stored unresolved and instantiated later by substitution.

use std::fmt;

use crate::{NamespacedIdentifier, Span};

/// Built-in scalar type keywords.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ScalarKeyword {
    Int,
    Float,
    Double,
    Bool,
    Void,
}

impl fmt::Display for ScalarKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalarKeyword::Int => "int",
            ScalarKeyword::Float => "float",
            ScalarKeyword::Double => "double",
            ScalarKeyword::Bool => "bool",
            ScalarKeyword::Void => "void",
        })
    }
}

/// A compile-time constant position in a type: a literal or the name of
/// a template constant parameter.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum ParsedConst {
    Lit(i64),
    Param(String),
}

/// One template argument as written: `span<float, 4>` carries
/// `[Type(float), Const(Lit(4))]`.
#[derive(Clone, PartialEq, Debug)]
pub enum ParsedTemplateArg {
    Type(ParsedType),
    Const(ParsedConst),
}

/// A type expression before resolution.
#[derive(Clone, PartialEq, Debug)]
pub struct ParsedType {
    pub kind: ParsedTypeKind,
    /// `const` prefix.
    pub is_const: bool,
    /// `&` suffix.
    pub is_ref: bool,
    pub span: Span,
}

#[derive(Clone, PartialEq, Debug)]
pub enum ParsedTypeKind {
    Scalar(ScalarKeyword),
    /// `span<Elem, Len>`
    Span {
        elem: Box<ParsedType>,
        len: ParsedConst,
    },
    /// A named struct or template parameter, optionally with template
    /// arguments: `OnePole`, `T`, `Biquad<2>`.
    Named {
        path: NamespacedIdentifier,
        template_args: Vec<ParsedTemplateArg>,
    },
}

impl ParsedType {
    pub fn scalar(keyword: ScalarKeyword, span: Span) -> Self {
        ParsedType {
            kind: ParsedTypeKind::Scalar(keyword),
            is_const: false,
            is_ref: false,
            span,
        }
    }

    /// True for `void` with no modifiers, the only spelling `void` is
    /// legal in (a return type).
    pub fn is_plain_void(&self) -> bool {
        matches!(self.kind, ParsedTypeKind::Scalar(ScalarKeyword::Void))
            && !self.is_const
            && !self.is_ref
    }
}

impl fmt::Display for ParsedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            f.write_str("const ")?;
        }
        match &self.kind {
            ParsedTypeKind::Scalar(s) => write!(f, "{s}")?,
            ParsedTypeKind::Span { elem, len } => {
                write!(f, "span<{elem}, ")?;
                match len {
                    ParsedConst::Lit(n) => write!(f, "{n}")?,
                    ParsedConst::Param(p) => f.write_str(p)?,
                }
                f.write_str(">")?;
            }
            ParsedTypeKind::Named {
                path,
                template_args,
            } => {
                write!(f, "{path}")?;
                if !template_args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in template_args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        match arg {
                            ParsedTemplateArg::Type(t) => write!(f, "{t}")?,
                            ParsedTemplateArg::Const(ParsedConst::Lit(n)) => write!(f, "{n}")?,
                            ParsedTemplateArg::Const(ParsedConst::Param(p)) => f.write_str(p)?,
                        }
                    }
                    f.write_str(">")?;
                }
            }
        }
        if self.is_ref {
            f.write_str("&")?;
        }
        Ok(())
    }
}
