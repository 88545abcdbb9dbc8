//! Expression nodes.

use crate::{
    BinaryOp, NamespacedIdentifier, NodeId, ParsedTemplateArg, ParsedType, Span, UnaryOp,
};

/// One expression node.
#[derive(Clone, Debug)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(id: NodeId, span: Span, kind: ExprKind) -> Self {
        Expr { id, span, kind }
    }
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    IntLit(i32),
    FloatLit(f32),
    DoubleLit(f64),
    BoolLit(bool),

    /// A (possibly qualified) name. `explicit_scope` is set when the
    /// source wrote `a::b`, which bypasses `using`-directive flattening
    /// during lookup.
    Symbol {
        path: NamespacedIdentifier,
        explicit_scope: bool,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `cond ? a : b`
    Ternary {
        cond: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    /// `target = value` or compound `target op= value`.
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `++x`, `x--` and friends. Desugared by the type checker into a
    /// compound assignment, kept distinct so postfix result semantics
    /// survive until then.
    IncDec {
        decrement: bool,
        postfix: bool,
        target: Box<Expr>,
    },

    /// `callee(args)` or `callee<template_args>(args)`. The callee is a
    /// `Symbol` (free function) or `Member` (method call).
    Call {
        callee: Box<Expr>,
        template_args: Vec<ParsedTemplateArg>,
        args: Vec<Expr>,
    },
    /// `base.name`
    Member {
        base: Box<Expr>,
        name: String,
    },
    /// `base[index]`
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// `(float)x`, written explicitly or inserted by the type checker
    /// for implicit widening.
    Cast {
        ty: ParsedType,
        expr: Box<Expr>,
    },
    /// `{ 1.0f, 2.0f }` aggregate initializer.
    InitList(Vec<Expr>),
}

impl Expr {
    /// True for nodes that can appear on the left of an assignment.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Symbol { .. } | ExprKind::Member { .. } | ExprKind::Index { .. }
        )
    }
}
