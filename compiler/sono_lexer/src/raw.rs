//! Raw token definitions for logos.

use logos::Logos;

/// Raw tokens straight out of the scanner generator.
///
/// Comments and whitespace are skipped here; numeric literals parse
/// their value in the callback (a failing parse surfaces as a lexer
/// error, classified in [`crate::scan`]).
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum RawToken {
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| i64::from_str_radix(&lex.slice()[2..], 16).ok())]
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?f", |lex| {
        let s = lex.slice();
        s[..s.len() - 1].parse::<f32>().ok()
    })]
    Float(f32),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Double(f64),

    // Keywords
    #[token("int")]
    KwInt,
    #[token("float")]
    KwFloat,
    #[token("double")]
    KwDouble,
    #[token("bool")]
    KwBool,
    #[token("void")]
    KwVoid,
    #[token("span")]
    KwSpan,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("for")]
    KwFor,
    #[token("while")]
    KwWhile,
    #[token("return")]
    KwReturn,
    #[token("break")]
    KwBreak,
    #[token("continue")]
    KwContinue,
    #[token("struct")]
    KwStruct,
    #[token("namespace")]
    KwNamespace,
    #[token("template")]
    KwTemplate,
    #[token("typename")]
    KwTypename,
    #[token("using")]
    KwUsing,
    #[token("const")]
    KwConst,
    #[token("public")]
    KwPublic,
    #[token("private")]
    KwPrivate,
    #[token("operator")]
    KwOperator,
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    /// Matches only when the full block-comment skip above does not,
    /// i.e. when the comment never closes.
    #[token("/*")]
    UnterminatedComment,

    // Punctuation. Multi-character operators first where prefixes
    // overlap; logos picks the longest match either way.
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("::")]
    ColonColon,
    #[token(":")]
    Colon,
    #[token("?")]
    Question,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Not,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
}
