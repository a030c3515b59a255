//! Newick lexer: tokenizes a tree string.

use crate::{Error, Result};

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

/// Source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LParen, RParen, Comma, Colon, Semicolon,
    /// Unquoted or quoted label (quotes stripped, `''` unescaped)
    Label,
    /// Bracketed comment, brackets stripped (`&&NHX:...` lands here)
    Comment,
    Eof,
}

/// Tokenize a Newick string.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => { chars.next(); }

            '(' => { chars.next(); tokens.push(punct(TokenKind::LParen, pos, "(")); }
            ')' => { chars.next(); tokens.push(punct(TokenKind::RParen, pos, ")")); }
            ',' => { chars.next(); tokens.push(punct(TokenKind::Comma, pos, ",")); }
            ':' => { chars.next(); tokens.push(punct(TokenKind::Colon, pos, ":")); }
            ';' => { chars.next(); tokens.push(punct(TokenKind::Semicolon, pos, ";")); }

            '[' => {
                chars.next();
                let mut body = String::new();
                loop {
                    match chars.next() {
                        Some((end, ']')) => {
                            tokens.push(Token {
                                kind: TokenKind::Comment,
                                span: Span { start: pos, end: end + 1 },
                                text: body,
                            });
                            break;
                        }
                        Some((_, c)) => body.push(c),
                        None => {
                            return Err(Error::SyntaxError {
                                position: pos,
                                message: "Unterminated comment".into(),
                            });
                        }
                    }
                }
            }

            '\'' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((end, '\'')) => {
                            if matches!(chars.peek(), Some(&(_, '\''))) {
                                chars.next();
                                s.push('\'');
                            } else {
                                tokens.push(Token {
                                    kind: TokenKind::Label,
                                    span: Span { start: pos, end: end + 1 },
                                    text: s,
                                });
                                break;
                            }
                        }
                        Some((_, c)) => s.push(c),
                        None => {
                            return Err(Error::SyntaxError {
                                position: pos,
                                message: "Unterminated quoted label".into(),
                            });
                        }
                    }
                }
            }

            ']' => {
                return Err(Error::SyntaxError {
                    position: pos,
                    message: "Unexpected ']'".into(),
                });
            }

            _ => {
                let mut label = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || is_reserved(c) {
                        break;
                    }
                    label.push(c);
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Label,
                    span: Span { start: pos, end: pos + label.len() },
                    text: label,
                });
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len(), end: input.len() },
        text: String::new(),
    });

    Ok(tokens)
}

/// Characters that terminate an unquoted label.
pub(crate) fn is_reserved(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']' | ',' | ':' | ';' | '\'')
}

fn punct(kind: TokenKind, pos: usize, text: &str) -> Token {
    Token {
        kind,
        span: Span { start: pos, end: pos + text.len() },
        text: text.to_string(),
    }
}
