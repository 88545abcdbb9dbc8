//! Expression grammar: C-family precedence climbing.
//!
//! Assignment binds loosest, then `?:`, logical or/and, bitwise,
//! equality, relational, shift, additive, multiplicative; unary and
//! postfix bind tightest.

use sono_diagnostic::{Error, Result};
use sono_ir::{
    BinaryOp, Expr, ExprKind, ParsedType, ScalarKeyword, Span, TokenKind, UnaryOp,
};

use super::Parser;

/// Binding power per binary operator token. Higher binds tighter.
fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    Some(match kind {
        TokenKind::OrOr => (BinaryOp::LogicalOr, 1),
        TokenKind::AndAnd => (BinaryOp::LogicalAnd, 2),
        TokenKind::Pipe => (BinaryOp::BitOr, 3),
        TokenKind::Caret => (BinaryOp::BitXor, 4),
        TokenKind::Amp => (BinaryOp::BitAnd, 5),
        TokenKind::EqEq => (BinaryOp::Eq, 6),
        TokenKind::NotEq => (BinaryOp::Ne, 6),
        TokenKind::Lt => (BinaryOp::Lt, 7),
        TokenKind::Le => (BinaryOp::Le, 7),
        TokenKind::Gt => (BinaryOp::Gt, 7),
        TokenKind::Ge => (BinaryOp::Ge, 7),
        TokenKind::Shl => (BinaryOp::Shl, 8),
        TokenKind::Shr => (BinaryOp::Shr, 8),
        TokenKind::Plus => (BinaryOp::Add, 9),
        TokenKind::Minus => (BinaryOp::Sub, 9),
        TokenKind::Star => (BinaryOp::Mul, 10),
        TokenKind::Slash => (BinaryOp::Div, 10),
        TokenKind::Percent => (BinaryOp::Mod, 10),
        _ => return None,
    })
}

fn compound_op(kind: &TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::PlusAssign => BinaryOp::Add,
        TokenKind::MinusAssign => BinaryOp::Sub,
        TokenKind::StarAssign => BinaryOp::Mul,
        TokenKind::SlashAssign => BinaryOp::Div,
        TokenKind::PercentAssign => BinaryOp::Mod,
        _ => return None,
    })
}

impl Parser<'_, '_> {
    pub(crate) fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    /// An initializer: expression or `{ ... }` aggregate list.
    pub(crate) fn parse_initializer(&mut self) -> Result<Expr> {
        if !self.cursor.at(&TokenKind::LBrace) {
            return self.parse_expr();
        }
        let start = self.cursor.span();
        self.cursor.bump();
        let mut values = Vec::new();
        if !self.cursor.at(&TokenKind::RBrace) {
            loop {
                values.push(self.parse_initializer()?);
                if !self.cursor.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.cursor.expect(&TokenKind::RBrace)?;
        Ok(self.expr(start, ExprKind::InitList(values)))
    }

    fn expr(&mut self, start: Span, kind: ExprKind) -> Expr {
        Expr::new(self.next_id(), self.span_from(start), kind)
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let start = self.cursor.span();
        let lhs = self.parse_ternary()?;

        let op = if self.cursor.at(&TokenKind::Assign) {
            None
        } else if let Some(op) = compound_op(self.cursor.kind()) {
            Some(op)
        } else {
            return Ok(lhs);
        };
        self.cursor.bump();

        if !lhs.is_lvalue() {
            return Err(Error::syntax("left side of assignment is not assignable", lhs.span));
        }
        // Right associative.
        let value = self.parse_assignment()?;
        Ok(self.expr(
            start,
            ExprKind::Assign {
                op,
                target: Box::new(lhs),
                value: Box::new(value),
            },
        ))
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let start = self.cursor.span();
        let cond = self.parse_binary(1)?;
        if !self.cursor.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let then_value = self.parse_assignment()?;
        self.cursor.expect(&TokenKind::Colon)?;
        let else_value = self.parse_assignment()?;
        Ok(self.expr(
            start,
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
            },
        ))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let start = self.cursor.span();
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec)) = binary_op(self.cursor.kind()) {
            if prec < min_prec {
                break;
            }
            self.cursor.bump();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = self.expr(
                start,
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let start = self.cursor.span();
        let op = match self.cursor.kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.cursor.bump();
            let operand = self.parse_unary()?;
            return Ok(self.expr(
                start,
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            ));
        }

        if self.cursor.at(&TokenKind::PlusPlus) || self.cursor.at(&TokenKind::MinusMinus) {
            let decrement = self.cursor.at(&TokenKind::MinusMinus);
            self.cursor.bump();
            let target = self.parse_unary()?;
            return Ok(self.expr(
                start,
                ExprKind::IncDec {
                    decrement,
                    postfix: false,
                    target: Box::new(target),
                },
            ));
        }

        // `(float)x` is a cast when the parenthesis holds a bare scalar
        // keyword.
        if self.cursor.at(&TokenKind::LParen) {
            if let Some(scalar) = scalar_of(self.cursor.peek()) {
                let mark = self.cursor.snapshot();
                self.cursor.bump();
                self.cursor.bump();
                if self.cursor.eat(&TokenKind::RParen) {
                    let operand = self.parse_unary()?;
                    return Ok(self.expr(
                        start,
                        ExprKind::Cast {
                            ty: ParsedType::scalar(scalar, start),
                            expr: Box::new(operand),
                        },
                    ));
                }
                self.cursor.restore(mark);
            }

            // `(T)x` casts to a named type (template parameters in
            // generic bodies). Speculative, and only committed when the
            // closing parenthesis is followed by something that begins
            // an operand; `(x) - 1` stays a parenthesized expression.
            if matches!(self.cursor.peek(), TokenKind::Ident(_)) {
                let mark = self.cursor.snapshot();
                self.cursor.bump();
                if let Ok(ty) = self.parse_type() {
                    if self.cursor.at(&TokenKind::RParen) && starts_operand(self.cursor.peek()) {
                        self.cursor.bump();
                        let operand = self.parse_unary()?;
                        return Ok(self.expr(
                            start,
                            ExprKind::Cast {
                                ty,
                                expr: Box::new(operand),
                            },
                        ));
                    }
                }
                self.cursor.restore(mark);
            }
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let start = self.cursor.span();
        let mut expr = self.parse_primary()?;
        loop {
            match self.cursor.kind() {
                TokenKind::LParen => {
                    let args = self.parse_call_args()?;
                    expr = self.expr(
                        start,
                        ExprKind::Call {
                            callee: Box::new(expr),
                            template_args: Vec::new(),
                            args,
                        },
                    );
                }
                TokenKind::Lt if matches!(expr.kind, ExprKind::Symbol { .. }) => {
                    // `f<float, 4>(x)` is speculative: only a template
                    // argument list followed by a call survives.
                    let mark = self.cursor.snapshot();
                    match self.parse_template_args() {
                        Ok(template_args) if self.cursor.at(&TokenKind::LParen) => {
                            let args = self.parse_call_args()?;
                            expr = self.expr(
                                start,
                                ExprKind::Call {
                                    callee: Box::new(expr),
                                    template_args,
                                    args,
                                },
                            );
                        }
                        _ => {
                            self.cursor.restore(mark);
                            return Ok(expr);
                        }
                    }
                }
                TokenKind::LBracket => {
                    self.cursor.bump();
                    let index = self.parse_expr()?;
                    self.cursor.expect(&TokenKind::RBracket)?;
                    expr = self.expr(
                        start,
                        ExprKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                    );
                }
                TokenKind::Dot => {
                    self.cursor.bump();
                    let (name, _) = self.cursor.expect_ident("a member name")?;
                    expr = self.expr(
                        start,
                        ExprKind::Member {
                            base: Box::new(expr),
                            name,
                        },
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let decrement = self.cursor.at(&TokenKind::MinusMinus);
                    self.cursor.bump();
                    expr = self.expr(
                        start,
                        ExprKind::IncDec {
                            decrement,
                            postfix: true,
                            target: Box::new(expr),
                        },
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>> {
        self.cursor.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.cursor.at(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.cursor.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.cursor.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let start = self.cursor.span();
        match self.cursor.kind() {
            TokenKind::Int(v) => {
                let v = *v;
                self.cursor.bump();
                let value = i32::try_from(v).map_err(|_| {
                    Error::syntax("integer literal does not fit in 'int'", start)
                })?;
                Ok(self.expr(start, ExprKind::IntLit(value)))
            }
            TokenKind::Float(v) => {
                let v = *v;
                self.cursor.bump();
                Ok(self.expr(start, ExprKind::FloatLit(v)))
            }
            TokenKind::Double(v) => {
                let v = *v;
                self.cursor.bump();
                Ok(self.expr(start, ExprKind::DoubleLit(v)))
            }
            TokenKind::KwTrue => {
                self.cursor.bump();
                Ok(self.expr(start, ExprKind::BoolLit(true)))
            }
            TokenKind::KwFalse => {
                self.cursor.bump();
                Ok(self.expr(start, ExprKind::BoolLit(false)))
            }
            TokenKind::LParen => {
                self.cursor.bump();
                let inner = self.parse_expr()?;
                self.cursor.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(_) => {
                let (path, explicit_scope) = self.parse_path()?;
                Ok(self.expr(
                    start,
                    ExprKind::Symbol {
                        path,
                        explicit_scope,
                    },
                ))
            }
            other => Err(Error::syntax(
                format!("expected an expression, found {}", other.describe()),
                start,
            )),
        }
    }
}

/// Tokens that can begin a cast operand. Deliberately excludes unary
/// operators so `(x) - 1` keeps its arithmetic reading.
fn starts_operand(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::Double(_)
            | TokenKind::KwTrue
            | TokenKind::KwFalse
            | TokenKind::Ident(_)
            | TokenKind::LParen
    )
}

fn scalar_of(kind: &TokenKind) -> Option<ScalarKeyword> {
    match kind {
        TokenKind::KwInt => Some(ScalarKeyword::Int),
        TokenKind::KwFloat => Some(ScalarKeyword::Float),
        TokenKind::KwDouble => Some(ScalarKeyword::Double),
        TokenKind::KwBool => Some(ScalarKeyword::Bool),
        _ => None,
    }
}
