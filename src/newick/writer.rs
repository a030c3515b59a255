//! Newick / NHX writer.

use super::lexer::is_reserved;
use super::nhx;
use crate::model::{Node, Tree};

/// Which node data to emit next to each label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Names and branch lengths only.
    Plain,
    /// Names, branch lengths and a full NHX property block per node.
    Nhx,
}

/// Serialize `tree` to a single Newick line ending in `;`.
pub fn write_tree(tree: &Tree, mode: WriteMode) -> String {
    let mut out = String::new();
    // (node, index of the next child to visit)
    let mut stack = vec![(tree.root(), 0usize)];
    while let Some((id, k)) = stack.pop() {
        let children = tree.children(id);
        if k == 0 && !children.is_empty() {
            out.push('(');
        }
        if k < children.len() {
            if k > 0 {
                out.push(',');
            }
            stack.push((id, k + 1));
            stack.push((children[k], 0));
            continue;
        }
        if !children.is_empty() {
            out.push(')');
        }
        write_label(&mut out, tree.node(id), tree.is_root(id), mode);
    }
    out.push(';');
    out
}

fn write_label(out: &mut String, node: &Node, is_root: bool, mode: WriteMode) {
    out.push_str(&quote(&node.name));
    if !is_root {
        out.push_str(&format!(":{}", node.dist));
    }
    if mode == WriteMode::Nhx {
        out.push_str(&nhx::render(node, is_root));
    }
}

fn quote(name: &str) -> String {
    if name.chars().any(|c| c.is_whitespace() || is_reserved(c)) {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}
