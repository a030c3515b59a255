//! Query lexer: tokenizes a predicate string.

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
    /// Identifier or bare literal
    Word,

    // Keyword operators
    In, Contains,

    // Punctuation
    Colon,
    Comma,      // AND
    Semicolon,  // OR

    // Comparison operators
    Eq, Neq, Lt, Lte, Gt, Gte,

    Eof,
}

impl TokenKind {
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq | TokenKind::Neq | TokenKind::Lt | TokenKind::Lte
                | TokenKind::Gt | TokenKind::Gte | TokenKind::In | TokenKind::Contains
        )
    }
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ':' | ',' | ';' | '<' | '>' | '=' | '!')
}

/// Tokenize a predicate string. Two-character operators win over their
/// one-character prefixes.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => { chars.next(); }

            ':' => { chars.next(); tokens.push(op(TokenKind::Colon, pos, ":")); }
            ',' => { chars.next(); tokens.push(op(TokenKind::Comma, pos, ",")); }
            ';' => { chars.next(); tokens.push(op(TokenKind::Semicolon, pos, ";")); }
            '=' => { chars.next(); tokens.push(op(TokenKind::Eq, pos, "=")); }

            '<' | '>' | '!' => {
                chars.next();
                let followed_by_eq = matches!(chars.peek(), Some(&(_, '=')));
                if followed_by_eq {
                    chars.next();
                }
                let tok = match (ch, followed_by_eq) {
                    ('<', true) => op(TokenKind::Lte, pos, "<="),
                    ('<', false) => op(TokenKind::Lt, pos, "<"),
                    ('>', true) => op(TokenKind::Gte, pos, ">="),
                    ('>', false) => op(TokenKind::Gt, pos, ">"),
                    ('!', true) => op(TokenKind::Neq, pos, "!="),
                    _ => {
                        return Err(Error::SyntaxError {
                            position: pos,
                            message: "Expected '=' after '!'".into(),
                        });
                    }
                };
                tokens.push(tok);
            }

            _ => {
                let mut text = String::new();
                let mut end = pos;
                while let Some(&(i, c)) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    text.push(c);
                    end = i + c.len_utf8();
                    chars.next();
                }
                let kind = match text.as_str() {
                    "in" => TokenKind::In,
                    "contains" => TokenKind::Contains,
                    _ => TokenKind::Word,
                };
                tokens.push(Token { kind, span: Span { start: pos, end }, text });
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

fn op(kind: TokenKind, pos: usize, text: &str) -> Token {
    Token {
        kind,
        span: Span { start: pos, end: pos + text.len() },
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(s: &str) -> Vec<TokenKind> {
        tokenize(s).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_longest_match_operators() {
        use TokenKind::*;
        assert_eq!(kinds("a<=1"), [Word, Lte, Word, Eof]);
        assert_eq!(kinds("a < 1"), [Word, Lt, Word, Eof]);
        assert_eq!(kinds("a!=b;c>=2,d>3"), [Word, Neq, Word, Semicolon, Word, Gte, Word, Comma, Word, Gt, Word, Eof]);
    }

    #[test]
    fn test_counter_atom() {
        let toks = tokenize("alphabet_type_counter:consonant < 2").unwrap();
        assert_eq!(toks[0].text, "alphabet_type_counter");
        assert_eq!(toks[1].kind, TokenKind::Colon);
        assert_eq!(toks[2].text, "consonant");
        assert_eq!(toks[4].text, "2");
    }

    #[test]
    fn test_keyword_operators() {
        use TokenKind::*;
        assert_eq!(kinds("tags contains x"), [Word, Contains, Word, Eof]);
        assert_eq!(kinds("c in a|b|c"), [Word, In, Word, Eof]);
        assert_eq!(tokenize("c in a|b|c").unwrap()[2].text, "a|b|c");
    }

    #[test]
    fn test_lone_bang() {
        assert!(tokenize("a ! b").is_err());
    }
}
