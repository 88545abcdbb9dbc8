//! Scanning: raw logos tokens into the parser's [`TokenList`].

use logos::Logos;
use sono_diagnostic::{Error, Result};
use sono_ir::{Span, Token, TokenKind, TokenList};

use crate::raw::RawToken;

/// Tokenize preprocessed source text.
///
/// Fails with a `SyntaxError` on the first invalid character,
/// unterminated string or unterminated block comment.
pub fn tokenize(source: &str) -> Result<TokenList> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();

    while let Some(raw) = lexer.next() {
        let span = Span::from_range(lexer.span());
        match raw {
            Ok(RawToken::UnterminatedComment) => {
                return Err(Error::syntax("unterminated block comment", span));
            }
            Ok(raw) => tokens.push(Token::new(cook(raw), span)),
            Err(()) => return Err(classify_error(source, lexer.span().start, span)),
        }
    }

    Ok(TokenList::new(tokens))
}

/// Pick the diagnostic for an unmatched input position.
fn classify_error(source: &str, start: usize, span: Span) -> Error {
    let rest = &source[start..];
    if let Some(after_quote) = rest.strip_prefix('"') {
        let closed_on_line = after_quote
            .find('"')
            .is_some_and(|q| !after_quote[..q].contains('\n'));
        return if closed_on_line {
            Error::syntax("string literals are not valid here", span)
        } else {
            Error::syntax("unterminated string literal", span)
        };
    }
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        Error::syntax("malformed numeric literal", span)
    } else {
        let ch = rest.chars().next().unwrap_or('\0');
        Error::syntax(format!("invalid character '{ch}'"), span)
    }
}

fn cook(raw: RawToken) -> TokenKind {
    match raw {
        RawToken::Int(v) => TokenKind::Int(v),
        RawToken::Float(v) => TokenKind::Float(v),
        RawToken::Double(v) => TokenKind::Double(v),
        RawToken::Ident(s) => TokenKind::Ident(s),
        RawToken::KwInt => TokenKind::KwInt,
        RawToken::KwFloat => TokenKind::KwFloat,
        RawToken::KwDouble => TokenKind::KwDouble,
        RawToken::KwBool => TokenKind::KwBool,
        RawToken::KwVoid => TokenKind::KwVoid,
        RawToken::KwSpan => TokenKind::KwSpan,
        RawToken::KwIf => TokenKind::KwIf,
        RawToken::KwElse => TokenKind::KwElse,
        RawToken::KwFor => TokenKind::KwFor,
        RawToken::KwWhile => TokenKind::KwWhile,
        RawToken::KwReturn => TokenKind::KwReturn,
        RawToken::KwBreak => TokenKind::KwBreak,
        RawToken::KwContinue => TokenKind::KwContinue,
        RawToken::KwStruct => TokenKind::KwStruct,
        RawToken::KwNamespace => TokenKind::KwNamespace,
        RawToken::KwTemplate => TokenKind::KwTemplate,
        RawToken::KwTypename => TokenKind::KwTypename,
        RawToken::KwUsing => TokenKind::KwUsing,
        RawToken::KwConst => TokenKind::KwConst,
        RawToken::KwPublic => TokenKind::KwPublic,
        RawToken::KwPrivate => TokenKind::KwPrivate,
        RawToken::KwOperator => TokenKind::KwOperator,
        RawToken::KwTrue => TokenKind::KwTrue,
        RawToken::KwFalse => TokenKind::KwFalse,
        RawToken::LParen => TokenKind::LParen,
        RawToken::RParen => TokenKind::RParen,
        RawToken::LBrace => TokenKind::LBrace,
        RawToken::RBrace => TokenKind::RBrace,
        RawToken::LBracket => TokenKind::LBracket,
        RawToken::RBracket => TokenKind::RBracket,
        RawToken::Semi => TokenKind::Semi,
        RawToken::Comma => TokenKind::Comma,
        RawToken::Dot => TokenKind::Dot,
        RawToken::ColonColon => TokenKind::ColonColon,
        RawToken::Colon => TokenKind::Colon,
        RawToken::Question => TokenKind::Question,
        RawToken::EqEq => TokenKind::EqEq,
        RawToken::NotEq => TokenKind::NotEq,
        RawToken::Le => TokenKind::Le,
        RawToken::Ge => TokenKind::Ge,
        RawToken::Shl => TokenKind::Shl,
        RawToken::Shr => TokenKind::Shr,
        RawToken::Lt => TokenKind::Lt,
        RawToken::Gt => TokenKind::Gt,
        RawToken::AndAnd => TokenKind::AndAnd,
        RawToken::OrOr => TokenKind::OrOr,
        RawToken::PlusAssign => TokenKind::PlusAssign,
        RawToken::MinusAssign => TokenKind::MinusAssign,
        RawToken::StarAssign => TokenKind::StarAssign,
        RawToken::SlashAssign => TokenKind::SlashAssign,
        RawToken::PercentAssign => TokenKind::PercentAssign,
        RawToken::PlusPlus => TokenKind::PlusPlus,
        RawToken::MinusMinus => TokenKind::MinusMinus,
        RawToken::Assign => TokenKind::Assign,
        RawToken::Plus => TokenKind::Plus,
        RawToken::Minus => TokenKind::Minus,
        RawToken::Star => TokenKind::Star,
        RawToken::Slash => TokenKind::Slash,
        RawToken::Percent => TokenKind::Percent,
        RawToken::Not => TokenKind::Not,
        RawToken::Amp => TokenKind::Amp,
        RawToken::Pipe => TokenKind::Pipe,
        RawToken::Caret => TokenKind::Caret,
        RawToken::Tilde => TokenKind::Tilde,
        // Handled before cook() is reached.
        RawToken::UnterminatedComment => TokenKind::Eof,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let Ok(tokens) = tokenize(source) else {
            panic!("tokenize failed for {source:?}");
        };
        (0..tokens.len()).map(|i| tokens.get(i).kind.clone()).collect()
    }

    #[test]
    fn scalar_declaration() {
        assert_eq!(
            kinds("int x = 42;"),
            vec![
                TokenKind::KwInt,
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::Int(42),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn float_suffix_vs_double() {
        assert_eq!(
            kinds("1.5f 1.5"),
            vec![
                TokenKind::Float(1.5),
                TokenKind::Double(1.5),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn hex_literal() {
        assert_eq!(kinds("0x2A")[0], TokenKind::Int(42));
    }

    #[test]
    fn comments_are_stripped() {
        assert_eq!(
            kinds("1 // line\n/* block\nspanning */ 2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn scope_operator_wins_over_colon() {
        assert_eq!(
            kinds("a::b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::ColonColon,
                TokenKind::Ident("b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn shift_and_relational() {
        assert_eq!(
            kinds("a << 1 >= 2"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Shl,
                TokenKind::Int(1),
                TokenKind::Ge,
                TokenKind::Int(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn invalid_character_is_a_syntax_error() {
        let Err(e) = tokenize("int x = $;") else {
            panic!("expected error");
        };
        assert!(e.to_string().contains("invalid character"));
    }

    #[test]
    fn unterminated_block_comment() {
        let Err(e) = tokenize("int x; /* dangling") else {
            panic!("expected error");
        };
        assert!(e.to_string().contains("unterminated block comment"));
    }

    #[test]
    fn unterminated_string() {
        let Err(e) = tokenize("\"dangling") else {
            panic!("expected error");
        };
        assert!(e.to_string().contains("unterminated string"));
    }
}
