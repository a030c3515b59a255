//! Newick parser.
//!
//! Builds an arena `Tree` from the token stream with an explicit stack of
//! open clades, so nesting depth is bounded only by memory.

use super::lexer::{Token, TokenKind};
use super::nhx;
use crate::model::{Node, NodeId, Tree};
use crate::{Error, Result};

/// Token cursor plus the tree being assembled. `open` holds the clades
/// whose `)` has not been seen yet, innermost last.
struct TreeBuilder<'t> {
    tokens: &'t [Token],
    pos: usize,
    tree: Tree,
    root_used: bool,
    open: Vec<NodeId>,
}

impl<'t> TreeBuilder<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            tree: Tree::new(Node::new("")),
            root_used: false,
            open: Vec::new(),
        }
    }

    /// Current token; the trailing `Eof` repeats once the stream is spent.
    fn current(&self) -> &'t Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> &'t Token {
        let tok = self.current();
        self.pos += 1;
        tok
    }

    fn fail(&self, message: impl Into<String>) -> Error {
        Error::SyntaxError { position: self.current().span.start, message: message.into() }
    }

    /// Allocate the next node: the root slot first, then children of the
    /// innermost open clade.
    fn new_node(&mut self) -> Result<NodeId> {
        if !self.root_used {
            self.root_used = true;
            return Ok(self.tree.root());
        }
        match self.open.last() {
            Some(parent) => Ok(self.tree.add_child(*parent, Node::new(""))),
            None => Err(self.fail("Node outside of any clade (missing ';'?)")),
        }
    }
}

/// Parse a token stream into a tree.
pub fn parse_tree(tokens: &[Token]) -> Result<Tree> {
    let mut p = TreeBuilder::new(tokens);
    // Node that receives the next label / length / comment.
    let mut current: Option<NodeId> = None;
    let mut expect_node = true;

    loop {
        let kind = p.current().kind;
        match kind {
            TokenKind::LParen => {
                if !expect_node {
                    return Err(p.fail("Unexpected '('"));
                }
                p.bump();
                let id = p.new_node()?;
                p.open.push(id);
                current = None;
            }
            TokenKind::Comma => {
                if expect_node {
                    p.new_node()?;
                }
                if p.open.is_empty() {
                    return Err(p.fail("',' outside of any clade"));
                }
                p.bump();
                expect_node = true;
                current = None;
            }
            TokenKind::RParen => {
                if expect_node {
                    p.new_node()?;
                }
                p.bump();
                let closed = p.open.pop().ok_or_else(|| p.fail("Unbalanced ')'"))?;
                current = Some(closed);
                expect_node = false;
            }
            TokenKind::Label => {
                let id = match (expect_node, current) {
                    (true, _) => p.new_node()?,
                    (false, Some(id)) => id,
                    (false, None) => return Err(p.fail("Label without a node")),
                };
                let text = p.bump().text.clone();
                let node = p.tree.node_mut(id);
                if node.is_leaf() {
                    node.name = text;
                } else {
                    match text.parse::<f64>() {
                        Ok(support) => node.support = Some(support),
                        Err(_) => node.name = text,
                    }
                }
                current = Some(id);
                expect_node = false;
            }
            TokenKind::Colon => {
                let id = match (expect_node, current) {
                    (true, _) => p.new_node()?,
                    (false, Some(id)) => id,
                    (false, None) => return Err(p.fail("Branch length without a node")),
                };
                p.bump();
                let tok = p.current().clone();
                if tok.kind != TokenKind::Label {
                    return Err(p.fail("Expected branch length after ':'"));
                }
                let dist = tok.text.parse::<f64>().map_err(|_| Error::SyntaxError {
                    position: tok.span.start,
                    message: format!("Invalid branch length '{}'", tok.text),
                })?;
                p.bump();
                p.tree.node_mut(id).dist = dist;
                current = Some(id);
                expect_node = false;
            }
            TokenKind::Comment => {
                let id = match (expect_node, current) {
                    (true, _) => p.new_node()?,
                    (false, Some(id)) => id,
                    (false, None) => return Err(p.fail("Comment without a node")),
                };
                let text = p.bump().text.clone();
                if let Some(body) = text.strip_prefix("&&NHX") {
                    nhx::apply(p.tree.node_mut(id), body)?;
                }
                current = Some(id);
                expect_node = false;
            }
            TokenKind::Semicolon => {
                if !p.open.is_empty() {
                    return Err(p.fail("Unbalanced '(' at end of tree"));
                }
                if !p.root_used {
                    p.new_node()?;
                }
                p.bump();
                break;
            }
            TokenKind::Eof => {
                return Err(p.fail("Missing ';' at end of tree"));
            }
        }
    }

    if p.current().kind != TokenKind::Eof {
        return Err(p.fail("Unexpected content after ';'"));
    }
    Ok(p.tree)
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse(s: &str) -> Result<Tree> {
        parse_tree(&tokenize(s)?)
    }

    #[test]
    fn test_parse_nested() {
        let t = parse("(A:1,(B:1,(E:1,D:1)I1:0.5)I2:0.5)Root;").unwrap();
        assert_eq!(t.leaf_names(), ["A", "B", "E", "D"]);
        let i1 = t.find_by_name("I1").unwrap();
        assert_eq!(t.node(i1).dist, 0.5);
        assert_eq!(t.node(t.root()).name, "Root");
    }

    #[test]
    fn test_internal_support() {
        let t = parse("((A,B)0.95,C);").unwrap();
        let inner = t.children(t.root())[0];
        assert_eq!(t.node(inner).support, Some(0.95));
        assert_eq!(t.node(inner).name, "");
    }

    #[test]
    fn test_empty_leaves() {
        let t = parse("(,(,));").unwrap();
        assert_eq!(t.leaves().len(), 3);
    }

    #[test]
    fn test_single_node() {
        let t = parse("A;").unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.node(t.root()).name, "A");
    }

    #[test]
    fn test_errors() {
        assert!(parse("(A,B").is_err());
        assert!(parse("(A,B));").is_err());
        assert!(parse("(A:x,B);").is_err());
        assert!(parse("(A,B);C").is_err());
    }
}
