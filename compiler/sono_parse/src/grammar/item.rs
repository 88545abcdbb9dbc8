//! Item declarations: namespaces, structs, functions, globals,
//! templates.

use sono_diagnostic::{Error, Result};
use sono_ir::{
    FunctionDef, Item, Param, StructDef, StructMember, TemplateHeader, TemplateParamDecl,
    TokenKind, Visibility,
};
use sono_resolve::{SymbolKind, TemplateDecl, TemplateKind};
use sono_types::TypeInfo;

use super::Parser;

impl Parser<'_, '_> {
    pub(crate) fn parse_item(&mut self) -> Result<Item> {
        match self.cursor.kind() {
            TokenKind::KwNamespace => self.parse_namespace(),
            TokenKind::KwUsing => self.parse_using(),
            TokenKind::KwTemplate => self.parse_template_item(),
            TokenKind::KwStruct => self.parse_struct_item(None),
            _ => self.parse_function_or_global(),
        }
    }

    fn parse_namespace(&mut self) -> Result<Item> {
        let start = self.cursor.span();
        self.cursor.expect(&TokenKind::KwNamespace)?;
        let (name, name_span) = self.cursor.expect_ident("a namespace name")?;

        // Reopening an existing namespace is legal; anything else under
        // that name is a redeclaration.
        let id = self.handler.current().child(&name);
        let existing = self.handler.symbol(&id).map(|s| s.kind);
        match existing {
            Some(SymbolKind::Namespace) => {}
            Some(_) => return Err(Error::redeclaration(id.to_string(), name_span)),
            None => {
                self.handler.add_symbol(
                    &name,
                    TypeInfo::VOID,
                    SymbolKind::Namespace,
                    Visibility::Public,
                    name_span,
                )?;
            }
        }

        self.handler.enter(&name);
        self.cursor.expect(&TokenKind::LBrace)?;
        let mut items = Vec::new();
        while !self.cursor.at(&TokenKind::RBrace) && !self.cursor.at_eof() {
            items.push(self.parse_item()?);
        }
        self.cursor.expect(&TokenKind::RBrace)?;
        self.handler.exit();

        Ok(Item::Namespace {
            name,
            items,
            span: self.span_from(start),
        })
    }

    fn parse_using(&mut self) -> Result<Item> {
        let start = self.cursor.span();
        self.cursor.expect(&TokenKind::KwUsing)?;
        self.cursor.expect(&TokenKind::KwNamespace)?;
        let (path, _) = self.parse_path()?;
        self.cursor.expect(&TokenKind::Semi)?;
        self.handler.add_using(path.clone());
        Ok(Item::UsingNamespace {
            path,
            span: self.span_from(start),
        })
    }

    /// `template <typename T, int N> struct ... | function ...`
    fn parse_template_item(&mut self) -> Result<Item> {
        let start = self.cursor.span();
        self.cursor.expect(&TokenKind::KwTemplate)?;
        self.cursor.expect(&TokenKind::Lt)?;
        let mut params = Vec::new();
        loop {
            match self.cursor.kind() {
                TokenKind::KwTypename => {
                    self.cursor.bump();
                    let (name, _) = self.cursor.expect_ident("a template parameter name")?;
                    params.push(TemplateParamDecl::Type { name });
                }
                TokenKind::KwInt => {
                    self.cursor.bump();
                    let (name, _) = self.cursor.expect_ident("a template parameter name")?;
                    params.push(TemplateParamDecl::Const { name });
                }
                other => {
                    return Err(Error::syntax(
                        format!(
                            "expected 'typename' or 'int' template parameter, found {}",
                            other.describe()
                        ),
                        self.cursor.span(),
                    ));
                }
            }
            if !self.cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.cursor.expect(&TokenKind::Gt)?;
        let header = TemplateHeader {
            params,
            span: self.span_from(start),
        };

        if self.cursor.at(&TokenKind::KwStruct) {
            self.parse_struct_item(Some(header))
        } else {
            self.parse_templated_function(header)
        }
    }

    fn parse_templated_function(&mut self, header: TemplateHeader) -> Result<Item> {
        let ret = self.parse_type()?;
        let (name, name_span) = self.cursor.expect_ident("a function name")?;
        let def = self.parse_function_rest(ret, name.clone(), Some(header.clone()), name_span)?;

        let id = self.handler.add_symbol(
            &name,
            TypeInfo::dynamic(),
            SymbolKind::TemplateFunction,
            Visibility::Public,
            name_span,
        )?;
        self.handler.register_template(
            id,
            TemplateDecl {
                owner: self.handler.current().clone(),
                params: header.params.clone(),
                kind: TemplateKind::Function(def.clone()),
            },
        );
        Ok(Item::Function(def))
    }

    fn parse_struct_item(&mut self, template: Option<TemplateHeader>) -> Result<Item> {
        let start = self.cursor.span();
        self.cursor.expect(&TokenKind::KwStruct)?;
        let (name, name_span) = self.cursor.expect_ident("a struct name")?;
        self.cursor.expect(&TokenKind::LBrace)?;

        let mut members = Vec::new();
        let mut methods = Vec::new();
        let mut visibility = Visibility::Public;

        while !self.cursor.at(&TokenKind::RBrace) && !self.cursor.at_eof() {
            // `public:` / `private:` access labels.
            if self.cursor.eat(&TokenKind::KwPublic) {
                self.cursor.expect(&TokenKind::Colon)?;
                visibility = Visibility::Public;
                continue;
            }
            if self.cursor.eat(&TokenKind::KwPrivate) {
                self.cursor.expect(&TokenKind::Colon)?;
                visibility = Visibility::Private;
                continue;
            }

            let member_start = self.cursor.span();
            let ty = self.parse_type()?;
            let member_name = self.parse_member_name()?;

            if self.cursor.at(&TokenKind::LParen) {
                let mut def =
                    self.parse_function_rest(ty, member_name, None, member_start)?;
                def.visibility = visibility;
                methods.push(def);
            } else {
                let init = if self.cursor.eat(&TokenKind::Assign) {
                    Some(self.parse_initializer()?)
                } else {
                    None
                };
                self.cursor.expect(&TokenKind::Semi)?;
                members.push(StructMember {
                    name: member_name,
                    ty,
                    init,
                    visibility,
                    span: self.span_from(member_start),
                });
            }
        }
        self.cursor.expect(&TokenKind::RBrace)?;
        self.cursor.expect(&TokenKind::Semi)?;

        let def = StructDef {
            name: name.clone(),
            template: template.clone(),
            members,
            methods,
            span: self.span_from(start),
        };

        match template {
            Some(header) => {
                let id = self.handler.add_symbol(
                    &name,
                    TypeInfo::dynamic(),
                    SymbolKind::TemplateStruct,
                    Visibility::Public,
                    name_span,
                )?;
                self.handler.register_template(
                    id,
                    TemplateDecl {
                        owner: self.handler.current().clone(),
                        params: header.params,
                        kind: TemplateKind::Struct(def.clone()),
                    },
                );
            }
            None => {
                self.handler.add_symbol(
                    &name,
                    TypeInfo::dynamic(),
                    SymbolKind::Struct,
                    Visibility::Public,
                    name_span,
                )?;
                // Members and methods live under the struct's scope so
                // method bodies and visibility checks can resolve them.
                self.handler.enter(&name);
                for member in &def.members {
                    self.handler.add_symbol(
                        &member.name,
                        TypeInfo::dynamic(),
                        SymbolKind::Member,
                        member.visibility,
                        member.span,
                    )?;
                }
                for method in &def.methods {
                    self.handler.add_symbol(
                        &method.name,
                        TypeInfo::dynamic(),
                        SymbolKind::Method,
                        method.visibility,
                        method.span,
                    )?;
                }
                self.handler.exit();
            }
        }

        Ok(Item::Struct(def))
    }

    /// A member or method name, including `operator+` spellings.
    fn parse_member_name(&mut self) -> Result<String> {
        if self.cursor.eat(&TokenKind::KwOperator) {
            let op = match self.cursor.kind() {
                TokenKind::Plus => "+",
                TokenKind::Minus => "-",
                TokenKind::Star => "*",
                TokenKind::Slash => "/",
                other => {
                    return Err(Error::syntax(
                        format!("'{}' cannot be overloaded", other.describe()),
                        self.cursor.span(),
                    ));
                }
            };
            self.cursor.bump();
            Ok(format!("operator{op}"))
        } else {
            Ok(self.cursor.expect_ident("a member name")?.0)
        }
    }

    fn parse_function_or_global(&mut self) -> Result<Item> {
        let start = self.cursor.span();
        if !self.at_type_start() && !matches!(self.cursor.kind(), TokenKind::Ident(_)) {
            return Err(Error::syntax(
                format!("expected a declaration, found {}", self.cursor.kind().describe()),
                self.cursor.span(),
            ));
        }
        let ty = self.parse_type()?;
        let (name, name_span) = self.cursor.expect_ident("a declaration name")?;

        if self.cursor.at(&TokenKind::LParen) {
            self.handler.add_symbol(
                &name,
                TypeInfo::dynamic(),
                SymbolKind::Function,
                Visibility::Public,
                name_span,
            )?;
            let def = self.parse_function_rest(ty, name, None, name_span)?;
            return Ok(Item::Function(def));
        }

        // Root-level variable.
        let kind = if ty.is_const {
            SymbolKind::Constant
        } else {
            SymbolKind::Variable
        };
        self.handler
            .add_symbol(&name, TypeInfo::dynamic(), kind, Visibility::Public, name_span)?;

        let init = if self.cursor.eat(&TokenKind::Assign) {
            Some(self.parse_initializer()?)
        } else {
            None
        };
        self.cursor.expect(&TokenKind::Semi)?;
        Ok(Item::GlobalVar {
            id: self.next_id(),
            name,
            ty,
            init,
            span: self.span_from(start),
        })
    }

    /// Parameter list and body, after the name has been consumed.
    pub(crate) fn parse_function_rest(
        &mut self,
        ret: sono_ir::ParsedType,
        name: String,
        template: Option<TemplateHeader>,
        name_span: sono_ir::Span,
    ) -> Result<FunctionDef> {
        self.cursor.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.cursor.at(&TokenKind::RParen) {
            loop {
                let param_start = self.cursor.span();
                let ty = self.parse_type()?;
                let (param_name, _) = self.cursor.expect_ident("a parameter name")?;
                params.push(Param {
                    name: param_name,
                    ty,
                    span: self.span_from(param_start),
                });
                if !self.cursor.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.cursor.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(FunctionDef {
            name,
            ret,
            params,
            body,
            template,
            visibility: Visibility::Public,
            span: name_span,
        })
    }
}
