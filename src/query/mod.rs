//! # Query Language
//!
//! Predicates over node properties and the tree operations they drive.
//!
//! ```text
//! alphabet_type = vowel, col1 > 2     -- ',' is AND
//! rank = species ; rank = genus       -- ';' is OR
//! alphabet_type_counter:consonant < 2 -- count inside a counter property
//! ```
//!
//! `prune` mutates topology; `collapse` and `highlight` only return a
//! [`Decoration`] for the renderer.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{NodeId, Tree, Value};
use crate::taxonomy::{lca_at_rank, LCA, RANK};
use crate::Result;

pub use ast::{Atom, CompareOp, Literal, Predicate, Target, Term};

/// Parse a predicate string.
pub fn parse(query: &str) -> Result<Predicate> {
    let tokens = lexer::tokenize(query)?;
    parser::parse_predicate(&tokens)
}

/// Every reachable node satisfying `pred`, in preorder.
pub fn select(tree: &Tree, pred: &Predicate) -> Result<Vec<NodeId>> {
    let mut out = Vec::new();
    for id in tree.preorder() {
        if pred.matches(tree, id)? {
            out.push(id);
        }
    }
    Ok(out)
}

// ============================================================================
// Prune
// ============================================================================

/// Detach every non-root node satisfying `pred` together with its subtree,
/// repeating until a pass detaches nothing. Returns the number of detached
/// subtrees.
pub fn prune(tree: &mut Tree, pred: &Predicate) -> Result<usize> {
    let mut total = 0;
    loop {
        let mut detached = 0;
        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            if !tree.is_root(id) && pred.matches(tree, id)? {
                tree.detach(id)?;
                detached += 1;
                continue;
            }
            stack.extend(tree.children(id).iter().rev().copied());
        }
        total += detached;
        if detached == 0 {
            break;
        }
    }
    tracing::info!(pruned = total, "tree pruned");
    Ok(total)
}

/// Cut the tree at `rank`: every node of that rank loses its children and
/// takes its `lca` name at that rank when one is recorded.
pub fn prune_by_rank(tree: &mut Tree, rank: &str) -> usize {
    let mut cut = 0;
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        let at_rank = matches!(node.get(RANK), Some(Value::Str(r)) if r == rank);
        if at_rank && !tree.is_leaf(id) {
            if let Some(name) = node.get(LCA).and_then(|lca| lca_at_rank(lca, rank)) {
                let name = name.to_string();
                tree.node_mut(id).name = name;
            }
            tree.remove_children(id);
            cut += 1;
            continue;
        }
        stack.extend(tree.children(id).iter().rev().copied());
    }
    tracing::info!(rank, nodes = cut, "tree cut at rank");
    cut
}

// ============================================================================
// Decorations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationKind {
    Collapsed,
    Highlighted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub node: NodeId,
    pub name: String,
    pub color: String,
}

/// Renderer hints produced without touching the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoration {
    pub kind: DecorationKind,
    pub marks: Vec<Mark>,
    /// Ancestors of marked nodes and the colour tags they carry.
    pub path: BTreeMap<NodeId, BTreeSet<String>>,
}

impl Decoration {
    fn new(kind: DecorationKind) -> Self {
        Self { kind, marks: Vec::new(), path: BTreeMap::new() }
    }

    fn mark(&mut self, tree: &Tree, id: NodeId, color: &str) {
        self.marks.push(Mark {
            node: id,
            name: tree.node(id).name.clone(),
            color: color.to_string(),
        });
        for anc in tree.ancestors(id) {
            self.path.entry(anc).or_default().insert(color.to_string());
        }
    }

    pub fn is_marked(&self, id: NodeId) -> bool {
        self.marks.iter().any(|m| m.node == id)
    }

    pub fn marked_names(&self) -> Vec<&str> {
        self.marks.iter().map(|m| m.name.as_str()).collect()
    }

    /// Fold in another decoration of the same kind.
    pub fn merge(&mut self, other: Decoration) {
        for m in other.marks {
            if !self.is_marked(m.node) {
                self.marks.push(m);
            }
        }
        for (id, colors) in other.path {
            self.path.entry(id).or_default().extend(colors);
        }
    }
}

/// Mark the topmost internal nodes satisfying `pred` as collapsed.
pub fn collapse(tree: &Tree, pred: &Predicate, color: &str) -> Result<Decoration> {
    let mut deco = Decoration::new(DecorationKind::Collapsed);
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        if !tree.is_leaf(id) && pred.matches(tree, id)? {
            deco.mark(tree, id, color);
            continue;
        }
        stack.extend(tree.children(id).iter().rev().copied());
    }
    tracing::debug!(collapsed = deco.marks.len(), "collapse decoration built");
    Ok(deco)
}

/// Mark every node satisfying `pred`; branches up to the root carry `color`.
pub fn highlight(tree: &Tree, pred: &Predicate, color: &str) -> Result<Decoration> {
    let mut deco = Decoration::new(DecorationKind::Highlighted);
    for id in select(tree, pred)? {
        deco.mark(tree, id, color);
    }
    tracing::debug!(highlighted = deco.marks.len(), "highlight decoration built");
    Ok(deco)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newick;

    fn annotated() -> Tree {
        let mut t = newick::parse("(A:1,(B:1,(E:1,D:1)I1:0.5)I2:0.5)Root;").unwrap();
        for (n, c) in [("I1", "consonant--1||vowel--1"), ("I2", "consonant--2||vowel--1"), ("Root", "consonant--2||vowel--2")] {
            let id = t.find_by_name(n).unwrap();
            t.node_mut(id).set("alphabet_type_counter", c);
        }
        t
    }

    #[test]
    fn test_prune_by_counter() {
        let mut t = annotated();
        let pred = parse("alphabet_type_counter:consonant < 2").unwrap();
        assert_eq!(prune(&mut t, &pred).unwrap(), 1);
        assert_eq!(t.leaf_names(), ["A", "B"]);
        assert_eq!(prune(&mut t, &pred).unwrap(), 0);
    }

    #[test]
    fn test_root_never_pruned() {
        let mut t = annotated();
        let pred = parse("name = Root").unwrap();
        assert_eq!(prune(&mut t, &pred).unwrap(), 0);
        assert_eq!(t.len(), 7);
    }

    #[test]
    fn test_collapse_marks_topmost_only() {
        let t = annotated();
        let pred = parse("alphabet_type_counter:vowel >= 1").unwrap();
        let deco = collapse(&t, &pred, "red").unwrap();
        assert_eq!(deco.marked_names(), ["Root"]);
        let pred = parse("alphabet_type_counter:consonant <= 2, alphabet_type_counter:vowel = 1").unwrap();
        let deco = collapse(&t, &pred, "red").unwrap();
        assert_eq!(deco.marked_names(), ["I2"]);
        assert_eq!(deco.path.len(), 1);
    }

    #[test]
    fn test_highlight_path_to_root() {
        let t = annotated();
        let deco = highlight(&t, &parse("name = E").unwrap(), "blue").unwrap();
        assert_eq!(deco.marked_names(), ["E"]);
        let names: Vec<&str> = deco.path.keys().map(|id| t.node(*id).name.as_str()).collect();
        assert_eq!(names, ["Root", "I2", "I1"]);
    }

    #[test]
    fn test_prune_by_rank() {
        let mut t = newick::parse("((a,b)x,c)Root;").unwrap();
        let x = t.find_by_name("x").unwrap();
        t.node_mut(x).set(RANK, "genus");
        t.node_mut(x).set(LCA, Value::StrList(vec!["genus--Homo".into()]));
        assert_eq!(prune_by_rank(&mut t, "genus"), 1);
        assert_eq!(t.leaf_names(), ["Homo", "c"]);
    }
}
