//! Tokens for Sono.

use std::fmt;

use crate::Span;

/// Token kinds for the Sono language.
///
/// Float and double literals keep their parsed value; the lexer already
/// folded the `f` suffix. Identifiers own their text; the language deals
/// in short DSP kernels, not megabyte translation units, so interning
/// buys nothing here.
#[derive(Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal: `42`, `0x2A`
    Int(i64),
    /// Single-precision literal: `1.5f`
    Float(f32),
    /// Double-precision literal: `1.5`
    Double(f64),

    Ident(String),

    // Keywords
    KwInt,
    KwFloat,
    KwDouble,
    KwBool,
    KwVoid,
    KwSpan,
    KwIf,
    KwElse,
    KwFor,
    KwWhile,
    KwReturn,
    KwBreak,
    KwContinue,
    KwStruct,
    KwNamespace,
    KwTemplate,
    KwTypename,
    KwUsing,
    KwConst,
    KwPublic,
    KwPrivate,
    KwOperator,
    KwTrue,
    KwFalse,

    // Punctuation and operators
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Colon,
    ColonColon,
    Question,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Not,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,

    Eof,
}

impl TokenKind {
    /// Human-readable name used in "expected X, found Y" diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Int(_) => "integer literal",
            TokenKind::Float(_) => "float literal",
            TokenKind::Double(_) => "double literal",
            TokenKind::Ident(_) => "identifier",
            TokenKind::KwInt => "'int'",
            TokenKind::KwFloat => "'float'",
            TokenKind::KwDouble => "'double'",
            TokenKind::KwBool => "'bool'",
            TokenKind::KwVoid => "'void'",
            TokenKind::KwSpan => "'span'",
            TokenKind::KwIf => "'if'",
            TokenKind::KwElse => "'else'",
            TokenKind::KwFor => "'for'",
            TokenKind::KwWhile => "'while'",
            TokenKind::KwReturn => "'return'",
            TokenKind::KwBreak => "'break'",
            TokenKind::KwContinue => "'continue'",
            TokenKind::KwStruct => "'struct'",
            TokenKind::KwNamespace => "'namespace'",
            TokenKind::KwTemplate => "'template'",
            TokenKind::KwTypename => "'typename'",
            TokenKind::KwUsing => "'using'",
            TokenKind::KwConst => "'const'",
            TokenKind::KwPublic => "'public'",
            TokenKind::KwPrivate => "'private'",
            TokenKind::KwOperator => "'operator'",
            TokenKind::KwTrue => "'true'",
            TokenKind::KwFalse => "'false'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Semi => "';'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::Colon => "':'",
            TokenKind::ColonColon => "'::'",
            TokenKind::Question => "'?'",
            TokenKind::Assign => "'='",
            TokenKind::PlusAssign => "'+='",
            TokenKind::MinusAssign => "'-='",
            TokenKind::StarAssign => "'*='",
            TokenKind::SlashAssign => "'/='",
            TokenKind::PercentAssign => "'%='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::PlusPlus => "'++'",
            TokenKind::MinusMinus => "'--'",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Le => "'<='",
            TokenKind::Ge => "'>='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Not => "'!'",
            TokenKind::Amp => "'&'",
            TokenKind::Pipe => "'|'",
            TokenKind::Caret => "'^'",
            TokenKind::Tilde => "'~'",
            TokenKind::Shl => "'<<'",
            TokenKind::Shr => "'>>'",
            TokenKind::Eof => "end of file",
        }
    }
}

impl fmt::Debug for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(v) => write!(f, "Int({v})"),
            TokenKind::Float(v) => write!(f, "Float({v})"),
            TokenKind::Double(v) => write!(f, "Double({v})"),
            TokenKind::Ident(s) => write!(f, "Ident({s})"),
            other => f.write_str(other.describe()),
        }
    }
}

/// A token with its source span.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[inline]
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

/// The token stream for one compilation unit.
///
/// Invariant: the last token is always [`TokenKind::Eof`], so cursor
/// positions in `0..len()` are always valid and lookahead past the end
/// keeps returning EOF.
#[derive(Clone, Debug, Default)]
pub struct TokenList {
    tokens: Vec<Token>,
}

impl TokenList {
    /// Wrap a token vector, appending the EOF sentinel if missing.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        let eof_span = tokens.last().map_or(Span::DUMMY, |t| t.span);
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            tokens.push(Token::new(TokenKind::Eof, Span::new(eof_span.end, eof_span.end)));
        }
        TokenList { tokens }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        // Only the EOF sentinel.
        self.tokens.len() <= 1
    }

    /// Token at `pos`, clamped to the EOF sentinel.
    #[inline]
    pub fn get(&self, pos: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[pos.min(last)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_sentinel_is_appended() {
        let list = TokenList::new(vec![Token::new(TokenKind::Int(1), Span::new(0, 1))]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).kind, TokenKind::Eof);
    }

    #[test]
    fn get_clamps_past_the_end() {
        let list = TokenList::new(Vec::new());
        assert_eq!(list.get(100).kind, TokenKind::Eof);
        assert!(list.is_empty());
    }
}
