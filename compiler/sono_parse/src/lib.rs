//! Recursive-descent parser for Sono.
//!
//! Consumes the token stream, produces one [`SyntaxTree`] per
//! compilation unit and registers every declared symbol (namespace,
//! function, struct, global) with the namespace handler as it is
//! declared. Identifier *uses* are left for the resolution pass, which
//! is what makes same-namespace forward references work.

mod cursor;
mod grammar;

pub use cursor::Cursor;

use sono_diagnostic::Result;
use sono_ir::{NodeIdGen, SyntaxTree, TokenList};
use sono_resolve::NamespaceHandler;
use tracing::debug_span;

/// Parse one compilation unit.
pub fn parse(
    tokens: &TokenList,
    handler: &mut NamespaceHandler,
    ids: &mut NodeIdGen,
) -> Result<SyntaxTree> {
    let _span = debug_span!("parse", tokens = tokens.len()).entered();
    let mut parser = grammar::Parser::new(Cursor::new(tokens), handler, ids);
    parser.parse_unit()
}

#[cfg(test)]
mod tests;
