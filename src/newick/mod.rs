//! # Newick Format
//!
//! Reader and writer for (extended) Newick trees. The reader accepts
//! quoted labels, branch lengths, numeric internal labels (read as support)
//! and NHX property blocks. Pure functions; no I/O.

pub mod lexer;
pub mod nhx;
pub mod parser;
pub mod writer;

use crate::model::{Prop2Type, Tree};
use crate::Result;

pub use writer::WriteMode;

/// Parse a Newick string into a tree. NHX properties stay raw strings.
pub fn parse(input: &str) -> Result<Tree> {
    let tokens = lexer::tokenize(input)?;
    parser::parse_tree(&tokens)
}

/// Parse a Newick string and convert NHX properties using `prop2type`.
pub fn parse_typed(input: &str, prop2type: &Prop2Type) -> Result<Tree> {
    let mut tree = parse(input)?;
    for id in tree.preorder() {
        nhx::retype(tree.node_mut(id), prop2type);
    }
    Ok(tree)
}

/// Names and branch lengths only.
pub fn to_newick(tree: &Tree) -> String {
    writer::write_tree(tree, WriteMode::Plain)
}

/// Extended Newick carrying every node property.
pub fn to_nhx(tree: &Tree) -> String {
    writer::write_tree(tree, WriteMode::Nhx)
}
