//! Lexer and preprocessor for Sono.
//!
//! A pure function of `(text, definitions)`: the preprocessor substitutes
//! host-supplied and in-source definitions textually, then the
//! logos-based scanner produces a [`TokenList`] with comments stripped.
//! Token spans point into the *preprocessed* text, which is returned
//! alongside the tokens so diagnostics can excerpt it.

mod preprocessor;
mod raw;
mod scan;

pub use preprocessor::{preprocess, Definitions};
pub use scan::tokenize;

use sono_diagnostic::Result;
use sono_ir::TokenList;

/// Preprocess and tokenize one compilation unit.
///
/// Returns the preprocessed source (the text all spans refer to) and the
/// token stream.
pub fn lex(source: &str, definitions: &Definitions) -> Result<(String, TokenList)> {
    let processed = preprocess(source, definitions)?;
    let tokens = tokenize(&processed)?;
    Ok((processed, tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sono_ir::TokenKind;

    #[test]
    fn definitions_flow_into_tokens() {
        let mut defs = Definitions::new();
        defs.define("GAIN", "0.5f");
        let Ok((_, tokens)) = lex("float g = GAIN;", &defs) else {
            panic!("lex failed");
        };
        assert!(matches!(tokens.get(3).kind, TokenKind::Float(v) if v == 0.5));
    }

    #[test]
    fn lex_is_deterministic() {
        let defs = Definitions::new();
        let Ok((text_a, a)) = lex("int x = 42;", &defs) else {
            panic!("lex failed");
        };
        let Ok((text_b, b)) = lex("int x = 42;", &defs) else {
            panic!("lex failed");
        };
        assert_eq!(text_a, text_b);
        assert_eq!(a.len(), b.len());
        for i in 0..a.len() {
            assert_eq!(a.get(i), b.get(i));
        }
    }
}
