//! Type syntax.

use sono_diagnostic::{Error, Result};
use sono_ir::{
    NamespacedIdentifier, ParsedConst, ParsedTemplateArg, ParsedType, ParsedTypeKind,
    ScalarKeyword, TokenKind,
};

use super::Parser;

impl Parser<'_, '_> {
    /// True if the current token can begin a type.
    pub(crate) fn at_type_start(&self) -> bool {
        matches!(
            self.cursor.kind(),
            TokenKind::KwConst
                | TokenKind::KwInt
                | TokenKind::KwFloat
                | TokenKind::KwDouble
                | TokenKind::KwBool
                | TokenKind::KwVoid
                | TokenKind::KwSpan
        )
    }

    pub(crate) fn scalar_keyword(&self) -> Option<ScalarKeyword> {
        match self.cursor.kind() {
            TokenKind::KwInt => Some(ScalarKeyword::Int),
            TokenKind::KwFloat => Some(ScalarKeyword::Float),
            TokenKind::KwDouble => Some(ScalarKeyword::Double),
            TokenKind::KwBool => Some(ScalarKeyword::Bool),
            TokenKind::KwVoid => Some(ScalarKeyword::Void),
            _ => None,
        }
    }

    /// `[const] (scalar | span<T, N> | path<args>) [&]`
    pub(crate) fn parse_type(&mut self) -> Result<ParsedType> {
        let start = self.cursor.span();
        let is_const = self.cursor.eat(&TokenKind::KwConst);

        let kind = if let Some(scalar) = self.scalar_keyword() {
            self.cursor.bump();
            ParsedTypeKind::Scalar(scalar)
        } else if self.cursor.eat(&TokenKind::KwSpan) {
            self.cursor.expect(&TokenKind::Lt)?;
            let elem = self.parse_type()?;
            self.cursor.expect(&TokenKind::Comma)?;
            let len = self.parse_const_operand()?;
            self.cursor.expect(&TokenKind::Gt)?;
            ParsedTypeKind::Span {
                elem: Box::new(elem),
                len,
            }
        } else if matches!(self.cursor.kind(), TokenKind::Ident(_)) {
            let path = self.parse_path()?.0;
            let template_args = if self.cursor.at(&TokenKind::Lt) {
                self.parse_template_args()?
            } else {
                Vec::new()
            };
            ParsedTypeKind::Named {
                path,
                template_args,
            }
        } else {
            return Err(Error::syntax(
                format!("expected a type, found {}", self.cursor.kind().describe()),
                self.cursor.span(),
            ));
        };

        let is_ref = self.cursor.eat(&TokenKind::Amp);
        Ok(ParsedType {
            kind,
            is_const,
            is_ref,
            span: self.span_from(start),
        })
    }

    /// A compile-time constant position: integer literal or the name of
    /// a constant (template parameter or `const` global).
    pub(crate) fn parse_const_operand(&mut self) -> Result<ParsedConst> {
        match self.cursor.kind() {
            TokenKind::Int(v) => {
                let v = *v;
                self.cursor.bump();
                Ok(ParsedConst::Lit(v))
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.cursor.bump();
                Ok(ParsedConst::Param(name))
            }
            other => Err(Error::syntax(
                format!("expected a constant, found {}", other.describe()),
                self.cursor.span(),
            )),
        }
    }

    /// `ident (:: ident)*`: returns the path and whether `::` appeared.
    pub(crate) fn parse_path(&mut self) -> Result<(NamespacedIdentifier, bool)> {
        let (first, _) = self.cursor.expect_ident("an identifier")?;
        let mut path = NamespacedIdentifier::from_segment(first);
        let mut explicit = false;
        while self.cursor.at(&TokenKind::ColonColon) {
            self.cursor.bump();
            let (next, _) = self.cursor.expect_ident("an identifier after '::'")?;
            path = path.child(next);
            explicit = true;
        }
        Ok((path, explicit))
    }

    /// `< arg (, arg)* >` where each arg is a type or a constant.
    ///
    /// A bare identifier parses as a named type; resolution decides
    /// later whether it actually names a constant.
    pub(crate) fn parse_template_args(&mut self) -> Result<Vec<ParsedTemplateArg>> {
        self.cursor.expect(&TokenKind::Lt)?;
        let mut args = Vec::new();
        loop {
            if let TokenKind::Int(v) = self.cursor.kind() {
                let v = *v;
                self.cursor.bump();
                args.push(ParsedTemplateArg::Const(ParsedConst::Lit(v)));
            } else {
                args.push(ParsedTemplateArg::Type(self.parse_type()?));
            }
            if !self.cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.cursor.expect(&TokenKind::Gt)?;
        Ok(args)
    }
}
