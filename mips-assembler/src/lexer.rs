//! # Lexer for MIPS Assembly Language
//!
//! [`TokenKind`] is recognised by `logos`; [`tokenize`] wraps each match into a
//! [`Token`] carrying its absolute byte span, 1-based line number, lexeme and
//! decoded literal value. Unrecognised input becomes an error diagnostic and
//! scanning continues.

use crate::diagnostic::Diagnostic;
use logos::Logos;
use std::ops::Range;

/// Token kinds of MIPS assembly
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\f]+")] // Skip whitespace (not newlines)
pub enum TokenKind {
    /// Mnemonics, labels and `.eqv` names; dots allowed after the first
    /// character (`add.s`, `c.eq.d`)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_.]*")]
    Identifier,

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    /// `$` followed by a name or number (`$t0`, `$8`, `$f12`)
    #[regex(r"\$[a-zA-Z0-9]+")]
    Register,

    /// Decimal, hexadecimal or floating point literal
    #[regex(r"-?0[xX][0-9a-fA-F]+")]
    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    Number,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    /// `.text`, `.word`, ...
    #[regex(r"\.[a-zA-Z_][a-zA-Z0-9_]*")]
    Directive,

    /// `#` to end of line
    #[regex(r"#[^\n]*")]
    Comment,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    String,

    #[regex(r"'([^'\\\n]|\\.)'")]
    Char,

    #[token("\n")]
    Newline,

    /// End of input; never produced by the scanner itself
    Eof,
}

/// Decoded value of a literal token
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
}

/// Token with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: Literal,
    /// Absolute byte range in the source
    pub span: Range<usize>,
    /// 1-based line number
    pub line: usize,
    pub lexeme: String,
}

impl Token {
    /// Integer value of a `Number` or `Char` token
    pub fn int(&self) -> Option<i64> {
        match self.literal {
            Literal::Int(value) => Some(value),
            _ => None,
        }
    }

    /// Numeric value of a `Number` token as a float
    pub fn float(&self) -> Option<f64> {
        match self.literal {
            Literal::Int(value) => Some(value as f64),
            Literal::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Scan `source` into tokens terminated by a single `Eof`.
///
/// Comments are kept as tokens; the parser drops them.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();
    let mut line = 1;

    let mut lexer = TokenKind::lexer(source);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let lexeme = lexer.slice().to_string();
        match result {
            Ok(kind) => match literal(kind, &lexeme) {
                Ok(literal) => {
                    tokens.push(Token {
                        kind,
                        literal,
                        span,
                        line,
                        lexeme,
                    });
                    if kind == TokenKind::Newline {
                        line += 1;
                    }
                }
                Err(message) => diagnostics.push(Diagnostic::error(message, span, line, lexeme)),
            },
            Err(()) => diagnostics.push(Diagnostic::error(
                format!("unrecognized character `{}`", lexeme),
                span,
                line,
                lexeme,
            )),
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        literal: Literal::None,
        span: source.len()..source.len(),
        line,
        lexeme: String::new(),
    });
    (tokens, diagnostics)
}

fn literal(kind: TokenKind, lexeme: &str) -> Result<Literal, String> {
    match kind {
        TokenKind::Number => parse_number(lexeme),
        TokenKind::String => {
            let body = &lexeme[1..lexeme.len() - 1];
            unescape(body).map(Literal::Str)
        }
        TokenKind::Char => {
            let body = &lexeme[1..lexeme.len() - 1];
            let bytes = unescape(body)?;
            match bytes.as_slice() {
                [byte] => Ok(Literal::Int(*byte as i64)),
                _ => Err(format!("character literal {} is not a single byte", lexeme)),
            }
        }
        _ => Ok(Literal::None),
    }
}

fn parse_number(lexeme: &str) -> Result<Literal, String> {
    let (negative, body) = match lexeme.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lexeme),
    };

    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        let magnitude = u64::from_str_radix(hex, 16)
            .ok()
            .and_then(|v| i64::try_from(v).ok())
            .ok_or_else(|| format!("number {} is out of range", lexeme))?;
        return Ok(Literal::Int(if negative { -magnitude } else { magnitude }));
    }

    if body.contains(&['.', 'e', 'E'][..]) {
        return lexeme
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| format!("invalid floating point literal {}", lexeme));
    }

    lexeme
        .parse::<i64>()
        .map(Literal::Int)
        .map_err(|_| format!("number {} is out of range", lexeme))
}

fn unescape(body: &str) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let escaped = match chars.next() {
            Some('n') => b'\n',
            Some('t') => b'\t',
            Some('r') => b'\r',
            Some('0') => 0,
            Some('\\') => b'\\',
            Some('"') => b'"',
            Some('\'') => b'\'',
            Some(other) => return Err(format!("unknown escape sequence \\{}", other)),
            None => return Err("dangling escape at end of literal".to_string()),
        };
        bytes.push(escaped);
    }
    Ok(bytes)
}
