//! Token cursor for navigating the token stream.

use sono_diagnostic::{Error, Result};
use sono_ir::{Span, Token, TokenKind, TokenList};

/// Cursor over a [`TokenList`].
///
/// Invariant: positions stay in `0..tokens.len()` and the final token is
/// EOF, so `current()` is always valid and lookahead past the end keeps
/// returning EOF.
pub struct Cursor<'t> {
    tokens: &'t TokenList,
    pos: usize,
}

impl<'t> Cursor<'t> {
    pub fn new(tokens: &'t TokenList) -> Self {
        Cursor { tokens, pos: 0 }
    }

    #[inline]
    pub fn current(&self) -> &'t Token {
        self.tokens.get(self.pos)
    }

    #[inline]
    pub fn kind(&self) -> &'t TokenKind {
        &self.current().kind
    }

    #[inline]
    pub fn span(&self) -> Span {
        self.current().span
    }

    /// Span of the most recently consumed token, for node spans that
    /// end "at the previous token".
    #[inline]
    pub fn previous_span(&self) -> Span {
        if self.pos == 0 {
            Span::DUMMY
        } else {
            self.tokens.get(self.pos - 1).span
        }
    }

    /// Kind of the token after the current one.
    #[inline]
    pub fn peek(&self) -> &'t TokenKind {
        &self.tokens.get(self.pos + 1).kind
    }

    /// Advance and return the consumed token.
    pub fn bump(&mut self) -> &'t Token {
        let token = self.tokens.get(self.pos);
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    #[inline]
    pub fn at(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    #[inline]
    pub fn at_eof(&self) -> bool {
        matches!(self.kind(), TokenKind::Eof)
    }

    /// Consume the current token if it matches.
    pub fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume a token of the given kind or fail with a syntax error.
    pub fn expect(&mut self, kind: &TokenKind) -> Result<Span> {
        if self.at(kind) {
            let span = self.span();
            self.bump();
            Ok(span)
        } else {
            Err(Error::syntax(
                format!("expected {}, found {}", kind.describe(), self.kind().describe()),
                self.span(),
            ))
        }
    }

    /// Consume an identifier, returning its text.
    pub fn expect_ident(&mut self, what: &str) -> Result<(String, Span)> {
        match self.kind() {
            TokenKind::Ident(name) => {
                let span = self.span();
                let name = name.clone();
                self.bump();
                Ok((name, span))
            }
            other => Err(Error::syntax(
                format!("expected {what}, found {}", other.describe()),
                self.span(),
            )),
        }
    }

    /// Position marker for speculative parsing.
    #[inline]
    pub fn snapshot(&self) -> usize {
        self.pos
    }

    /// Roll back to a snapshot taken earlier.
    pub fn restore(&mut self, snapshot: usize) {
        debug_assert!(snapshot <= self.pos, "restore must rewind, not advance");
        self.pos = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(kinds: Vec<TokenKind>) -> TokenList {
        TokenList::new(
            kinds
                .into_iter()
                .enumerate()
                .map(|(i, k)| {
                    let i = u32::try_from(i).unwrap_or(0);
                    Token::new(k, Span::new(i, i + 1))
                })
                .collect(),
        )
    }

    #[test]
    fn bump_stops_at_eof() {
        let tokens = list(vec![TokenKind::Int(1)]);
        let mut cursor = Cursor::new(&tokens);
        cursor.bump();
        cursor.bump();
        cursor.bump();
        assert!(cursor.at_eof());
    }

    #[test]
    fn expect_reports_both_sides() {
        let tokens = list(vec![TokenKind::Semi]);
        let mut cursor = Cursor::new(&tokens);
        let Err(e) = cursor.expect(&TokenKind::RParen) else {
            panic!("expected failure");
        };
        let text = e.to_string();
        assert!(text.contains("')'") && text.contains("';'"), "{text}");
    }

    #[test]
    fn snapshot_restore_rewinds() {
        let tokens = list(vec![TokenKind::Int(1), TokenKind::Plus, TokenKind::Int(2)]);
        let mut cursor = Cursor::new(&tokens);
        let mark = cursor.snapshot();
        cursor.bump();
        cursor.bump();
        cursor.restore(mark);
        assert_eq!(cursor.kind(), &TokenKind::Int(1));
    }
}
