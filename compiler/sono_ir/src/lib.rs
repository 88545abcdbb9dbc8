//! Shared IR for the Sono compiler.
//!
//! Everything downstream crates agree on lives here: source spans, the
//! token stream produced by the lexer, the syntax tree produced by the
//! parser, namespaced identifiers and the syntactic (pre-resolution)
//! type representation.
//!
//! Statement and expression kinds are closed enums. Passes dispatch with
//! pattern matching, so adding a node kind is a compile error everywhere
//! it is not handled.

pub mod ast;
mod name;
mod node_id;
mod ops;
mod parsed_type;
mod span;
mod token;

pub use ast::{
    Expr, ExprKind, FunctionDef, Item, Param, Stmt, StmtKind, StructDef, StructMember,
    SyntaxTree, TemplateHeader, TemplateParamDecl, Visibility,
};
pub use name::NamespacedIdentifier;
pub use node_id::{NodeId, NodeIdGen};
pub use ops::{BinaryOp, UnaryOp};
pub use parsed_type::{ParsedConst, ParsedTemplateArg, ParsedType, ParsedTypeKind, ScalarKeyword};
pub use span::Span;
pub use token::{Token, TokenKind, TokenList};
