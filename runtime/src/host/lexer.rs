//! Token definitions for the kernel language, via `logos`.

use logos::Logos;

fn int_lit(lex: &mut logos::Lexer<Tok>) -> Option<i64> {
    lex.slice().trim_end_matches(['u', 'U', 'l', 'L']).parse().ok()
}

fn hex_lit(lex: &mut logos::Lexer<Tok>) -> Option<i64> {
    let digits = lex.slice().trim_start_matches("0x").trim_start_matches("0X");
    i64::from_str_radix(digits, 16).ok()
}

fn float_lit(lex: &mut logos::Lexer<Tok>) -> Option<f64> {
    lex.slice().trim_end_matches(['f', 'F']).parse().ok()
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
pub enum Tok {
    #[token("__kernel")]
    Kernel,
    #[token("__global")]
    Global,
    #[token("__local")]
    Local,
    #[token("const")]
    Const,
    #[token("void")]
    Void,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("return")]
    Return,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"0[xX][0-9a-fA-F]+", hex_lit)]
    #[regex(r"[0-9]+[uUlL]*", int_lit)]
    IntLit(i64),

    #[regex(r"([0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?[fF]?", float_lit)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+[fF]?", float_lit)]
    FloatLit(f64),

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
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Not,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
}

impl std::fmt::Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kernel => f.write_str("'__kernel'"),
            Self::Global => f.write_str("'__global'"),
            Self::Local => f.write_str("'__local'"),
            Self::Const => f.write_str("'const'"),
            Self::Void => f.write_str("'void'"),
            Self::If => f.write_str("'if'"),
            Self::Else => f.write_str("'else'"),
            Self::For => f.write_str("'for'"),
            Self::Return => f.write_str("'return'"),
            Self::Ident(name) => write!(f, "'{name}'"),
            Self::IntLit(v) => write!(f, "'{v}'"),
            Self::FloatLit(v) => write!(f, "'{v}'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::LBrace => f.write_str("'{'"),
            Self::RBrace => f.write_str("'}'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::Semi => f.write_str("';'"),
            Self::Comma => f.write_str("','"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Star => f.write_str("'*'"),
            Self::Slash => f.write_str("'/'"),
            Self::Percent => f.write_str("'%'"),
            Self::Assign => f.write_str("'='"),
            Self::PlusAssign => f.write_str("'+='"),
            Self::MinusAssign => f.write_str("'-='"),
            Self::StarAssign => f.write_str("'*='"),
            Self::SlashAssign => f.write_str("'/='"),
            Self::PlusPlus => f.write_str("'++'"),
            Self::MinusMinus => f.write_str("'--'"),
            Self::Lt => f.write_str("'<'"),
            Self::Gt => f.write_str("'>'"),
            Self::Le => f.write_str("'<='"),
            Self::Ge => f.write_str("'>='"),
            Self::EqEq => f.write_str("'=='"),
            Self::Ne => f.write_str("'!='"),
            Self::AndAnd => f.write_str("'&&'"),
            Self::OrOr => f.write_str("'||'"),
            Self::Not => f.write_str("'!'"),
            Self::Amp => f.write_str("'&'"),
            Self::Pipe => f.write_str("'|'"),
            Self::Caret => f.write_str("'^'"),
            Self::Shl => f.write_str("'<<'"),
            Self::Shr => f.write_str("'>>'"),
        }
    }
}

use super::ast::Span;

/// A lexed token with its source span.
pub type Spanned = (Result<Tok, ()>, Span);

/// Lex `source` into spanned tokens. Unrecognized input becomes an `Err`
/// entry the parser turns into a diagnostic.
pub fn lex(source: &str) -> Vec<Spanned> {
    Tok::lexer(source)
        .spanned()
        .map(|(tok, range)| (tok, Span::new(range.start, range.end)))
        .collect()
}
