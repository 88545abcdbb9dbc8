//! The inliner framework.
//!
//! A function may register one substitution strategy instead of (or in
//! addition to) a callable implementation:
//!
//! - a **high-level** rewrite receives the call site's argument
//!   subtrees and returns a replacement expression, which then re-enters
//!   symbol resolution and type checking, so rewrites can produce
//!   further inlinable calls, bounded by the configured depth;
//! - a **low-level** rewrite is an intrinsic tag the backend lowers
//!   directly to instructions (or a native-symbol call where no single
//!   instruction exists).
//!
//! Exactly one strategy is consulted per call site.

use sono_diagnostic::Result;
use sono_ir::{BinaryOp, Expr, ExprKind, NamespacedIdentifier, NodeIdGen, Span};

/// Backend-lowered intrinsics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Intrinsic {
    Min,
    Max,
    Abs,
    Sqrt,
    Sin,
    Cos,
    Pow,
    Fmod,
}

/// High-level rewrite: call-site arguments in, replacement subtree out.
pub type RewriteFn = fn(&mut InlineData<'_>) -> Result<Expr>;

/// The substitution strategy registered for a function.
#[derive(Clone, Debug)]
pub enum Inliner {
    HighLevel(RewriteFn),
    LowLevel(Intrinsic),
}

/// Everything a high-level rewrite gets to work with: the argument
/// subtrees (already resolved and type-checked clones) and a node id
/// generator for the replacement nodes it builds.
pub struct InlineData<'a> {
    pub args: Vec<Expr>,
    pub span: Span,
    pub ids: &'a mut NodeIdGen,
}

impl InlineData<'_> {
    /// Take argument `index` out of the call site.
    ///
    /// Each argument may be taken once; rewrites needing an argument
    /// twice must clone before building (the expansion driver re-numbers
    /// duplicated nodes afterwards).
    pub fn arg(&mut self, index: usize) -> Expr {
        self.args[index].clone()
    }

    pub fn symbol(&mut self, path: NamespacedIdentifier) -> Expr {
        Expr::new(
            self.ids.next(),
            self.span,
            ExprKind::Symbol {
                path,
                explicit_scope: true,
            },
        )
    }

    pub fn call(&mut self, path: NamespacedIdentifier, args: Vec<Expr>) -> Expr {
        let callee = self.symbol(path);
        Expr::new(
            self.ids.next(),
            self.span,
            ExprKind::Call {
                callee: Box::new(callee),
                template_args: Vec::new(),
                args,
            },
        )
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(
            self.ids.next(),
            self.span,
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }

    pub fn int(&mut self, value: i32) -> Expr {
        Expr::new(self.ids.next(), self.span, ExprKind::IntLit(value))
    }

    pub fn float(&mut self, value: f32) -> Expr {
        Expr::new(self.ids.next(), self.span, ExprKind::FloatLit(value))
    }
}
