//! Predicate recursive descent parser.
//!
//! ```text
//! predicate := term (";" term)*
//! term      := atom ("," atom)*
//! atom      := ident (":" ident)? OP literal
//! literal   := word+            (consecutive words joined by one space)
//! ```

use super::ast::*;
use super::lexer::{Token, TokenKind};
use crate::{Error, Result};

/// Cursor over a predicate's tokens. The lexer always closes the slice
/// with `Eof`, and reads past the end keep returning it.
struct PredicateParser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> PredicateParser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &'t Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn bump(&mut self) -> &'t Token {
        let tok = self.current();
        self.pos += 1;
        tok
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        let hit = self.kind() == kind;
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn require(&mut self, kind: TokenKind, what: &str) -> Result<&'t Token> {
        if self.kind() == kind {
            Ok(self.bump())
        } else {
            Err(self.fail(format!("expected {what}, found '{}'", self.current().text)))
        }
    }

    fn fail(&self, message: String) -> Error {
        Error::SyntaxError { position: self.current().span.start, message }
    }

    // ========================================================================
    // Grammar
    // ========================================================================

    fn parse_predicate(&mut self) -> Result<Predicate> {
        let mut terms = vec![self.parse_term()?];
        while self.accept(TokenKind::Semicolon) {
            terms.push(self.parse_term()?);
        }
        if self.kind() != TokenKind::Eof {
            return Err(self.fail(format!("unexpected '{}' after condition", self.current().text)));
        }
        Ok(Predicate { terms })
    }

    fn parse_term(&mut self) -> Result<Term> {
        let mut atoms = vec![self.parse_atom()?];
        while self.accept(TokenKind::Comma) {
            atoms.push(self.parse_atom()?);
        }
        Ok(Term { atoms })
    }

    fn parse_atom(&mut self) -> Result<Atom> {
        let prop = self.require(TokenKind::Word, "a property name")?.text.clone();
        let target = if self.accept(TokenKind::Colon) {
            let key = self.require(TokenKind::Word, "a counter key")?.text.clone();
            Target::Counter { prop, key }
        } else {
            Target::Prop(prop)
        };

        let op_pos = self.current().span.start;
        let op = self.parse_op()?;
        let literal = self.parse_literal()?;

        let needs_number = op.is_ordering() || matches!(target, Target::Counter { .. });
        if needs_number && literal.number.is_none() {
            return Err(Error::SyntaxError {
                position: op_pos,
                message: format!("operator needs a numeric literal, found '{}'", literal.text),
            });
        }
        if matches!(target, Target::Counter { .. }) && matches!(op, CompareOp::In | CompareOp::Contains) {
            return Err(Error::SyntaxError {
                position: op_pos,
                message: "counter atoms only take comparison operators".into(),
            });
        }
        Ok(Atom { target, op, literal })
    }

    fn parse_op(&mut self) -> Result<CompareOp> {
        let op = match self.kind() {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Neq => CompareOp::Neq,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Lte => CompareOp::Lte,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Gte => CompareOp::Gte,
            TokenKind::In => CompareOp::In,
            TokenKind::Contains => CompareOp::Contains,
            _ => return Err(self.fail(format!("expected an operator, found '{}'", self.current().text))),
        };
        self.bump();
        Ok(op)
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        let mut words = vec![self.require(TokenKind::Word, "a literal")?.text.clone()];
        // A keyword operator cannot follow a literal, so these read as words here.
        while matches!(self.kind(), TokenKind::Word | TokenKind::In | TokenKind::Contains) {
            words.push(self.bump().text.clone());
        }
        Ok(Literal::new(words.join(" ")))
    }
}

/// Parse a token stream into a predicate.
pub fn parse_predicate(tokens: &[Token]) -> Result<Predicate> {
    let mut p = PredicateParser::new(tokens);
    if p.kind() == TokenKind::Eof {
        return Err(p.fail("empty predicate".into()));
    }
    p.parse_predicate()
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse(s: &str) -> Result<Predicate> {
        parse_predicate(&tokenize(s)?)
    }

    #[test]
    fn test_and_or_structure() {
        let p = parse("a = x, b > 2 ; c contains y").unwrap();
        assert_eq!(p.terms.len(), 2);
        assert_eq!(p.terms[0].atoms.len(), 2);
        assert_eq!(p.terms[0].atoms[1].op, CompareOp::Gt);
        assert_eq!(p.terms[0].atoms[1].literal.number, Some(2.0));
        assert_eq!(p.terms[1].atoms[0].op, CompareOp::Contains);
    }

    #[test]
    fn test_counter_target() {
        let p = parse("alphabet_type_counter:consonant < 2").unwrap();
        assert_eq!(
            p.terms[0].atoms[0].target,
            Target::Counter { prop: "alphabet_type_counter".into(), key: "consonant".into() }
        );
    }

    #[test]
    fn test_multi_word_literal() {
        let p = parse("sci_name = Homo sapiens").unwrap();
        assert_eq!(p.terms[0].atoms[0].literal.text, "Homo sapiens");
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("a <").is_err());
        assert!(parse("a < x").is_err());
        assert!(parse("a:b = x").is_err());
        assert!(parse("a = 1,").is_err());
        assert!(matches!(parse("= 1"), Err(Error::SyntaxError { position: 0, .. })));
    }
}
