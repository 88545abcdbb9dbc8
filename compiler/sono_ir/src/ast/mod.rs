//! The syntax tree.
//!
//! Produced by the parser, mutated in place by later passes: the type
//! checker wraps operands in implicit [`ExprKind::Cast`] nodes, the
//! optimizer replaces subtrees with folded equivalents, the inliner
//! splices replacement expressions over call sites. Nodes own their
//! children; there are no cycles and no parent links.

mod expr;
mod item;
mod stmt;

pub use expr::{Expr, ExprKind};
pub use item::{
    FunctionDef, Item, Param, StructDef, StructMember, SyntaxTree, TemplateHeader,
    TemplateParamDecl, Visibility,
};
pub use stmt::{Stmt, StmtKind};
