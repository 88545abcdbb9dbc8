//! Statement grammar.

use sono_diagnostic::Result;
use sono_ir::{Stmt, StmtKind, TokenKind};

use super::Parser;

impl Parser<'_, '_> {
    pub(crate) fn parse_block(&mut self) -> Result<Stmt> {
        let start = self.cursor.span();
        self.cursor.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.cursor.at(&TokenKind::RBrace) && !self.cursor.at_eof() {
            stmts.push(self.parse_stmt()?);
        }
        self.cursor.expect(&TokenKind::RBrace)?;
        Ok(Stmt::new(
            self.next_id(),
            self.span_from(start),
            StmtKind::Block(stmts),
        ))
    }

    pub(crate) fn parse_stmt(&mut self) -> Result<Stmt> {
        let start = self.cursor.span();
        match self.cursor.kind() {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::KwIf => {
                self.cursor.bump();
                self.cursor.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.cursor.expect(&TokenKind::RParen)?;
                let then_branch = Box::new(self.parse_stmt()?);
                let else_branch = if self.cursor.eat(&TokenKind::KwElse) {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(Stmt::new(
                    self.next_id(),
                    self.span_from(start),
                    StmtKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                ))
            }
            TokenKind::KwWhile => {
                self.cursor.bump();
                self.cursor.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.cursor.expect(&TokenKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::new(
                    self.next_id(),
                    self.span_from(start),
                    StmtKind::While { cond, body },
                ))
            }
            TokenKind::KwFor => {
                self.cursor.bump();
                self.cursor.expect(&TokenKind::LParen)?;
                let init = if self.cursor.eat(&TokenKind::Semi) {
                    None
                } else {
                    Some(Box::new(self.parse_simple_stmt()?))
                };
                let cond = if self.cursor.at(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.cursor.expect(&TokenKind::Semi)?;
                let step = if self.cursor.at(&TokenKind::RParen) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.cursor.expect(&TokenKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::new(
                    self.next_id(),
                    self.span_from(start),
                    StmtKind::For {
                        init,
                        cond,
                        step,
                        body,
                    },
                ))
            }
            TokenKind::KwReturn => {
                self.cursor.bump();
                let value = if self.cursor.at(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.cursor.expect(&TokenKind::Semi)?;
                Ok(Stmt::new(
                    self.next_id(),
                    self.span_from(start),
                    StmtKind::Return(value),
                ))
            }
            TokenKind::KwBreak => {
                self.cursor.bump();
                self.cursor.expect(&TokenKind::Semi)?;
                Ok(Stmt::new(self.next_id(), self.span_from(start), StmtKind::Break))
            }
            TokenKind::KwContinue => {
                self.cursor.bump();
                self.cursor.expect(&TokenKind::Semi)?;
                Ok(Stmt::new(
                    self.next_id(),
                    self.span_from(start),
                    StmtKind::Continue,
                ))
            }
            _ => {
                let stmt = self.parse_simple_stmt()?;
                Ok(stmt)
            }
        }
    }

    /// Declaration or expression statement, semicolon included. Also
    /// the `for` initializer clause.
    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        let start = self.cursor.span();

        if self.at_type_start() {
            return self.parse_var_decl(start);
        }

        // `Ident` may begin a declaration with a named type
        // (`OnePole f = ...;`) or an expression (`f = ...;`). Speculate:
        // a type followed by an identifier is a declaration.
        if matches!(self.cursor.kind(), TokenKind::Ident(_)) {
            let mark = self.cursor.snapshot();
            if self.parse_type().is_ok() && matches!(self.cursor.kind(), TokenKind::Ident(_)) {
                self.cursor.restore(mark);
                return self.parse_var_decl(start);
            }
            self.cursor.restore(mark);
        }

        let expr = self.parse_expr()?;
        self.cursor.expect(&TokenKind::Semi)?;
        Ok(Stmt::new(
            self.next_id(),
            self.span_from(start),
            StmtKind::Expr(expr),
        ))
    }

    fn parse_var_decl(&mut self, start: sono_ir::Span) -> Result<Stmt> {
        let ty = self.parse_type()?;
        let (name, _) = self.cursor.expect_ident("a variable name")?;
        let init = if self.cursor.eat(&TokenKind::Assign) {
            Some(self.parse_initializer()?)
        } else {
            None
        };
        self.cursor.expect(&TokenKind::Semi)?;
        Ok(Stmt::new(
            self.next_id(),
            self.span_from(start),
            StmtKind::VarDecl { name, ty, init },
        ))
    }
}
