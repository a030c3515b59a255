//! Arena-backed rooted tree.
//!
//! Nodes live in a flat `Vec` and refer to each other by `NodeId`. Detaching
//! a subtree only unlinks it from its parent; the arena slots stay allocated
//! but are no longer reachable from the root. Every traversal uses an explicit
//! stack so trees deeper than the call stack are fine.

use serde::{Deserialize, Serialize};

use super::{Node, NodeId, PropertyMap};
use crate::{Error, Result};

/// Rooted tree owning all of its nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

/// One row of the flat preorder encoding used by snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatNode {
    pub name: String,
    pub dist: f64,
    pub support: Option<f64>,
    /// Index of the parent within the flat list; `None` for the root.
    pub parent: Option<usize>,
    pub props: PropertyMap,
}

impl Tree {
    pub fn new(root: Node) -> Self {
        Self { nodes: vec![root], root: NodeId(0) }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Append `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id.0].children.is_empty()
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    pub fn preorder(&self) -> Vec<NodeId> {
        self.preorder_from(self.root)
    }

    pub fn preorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    pub fn postorder(&self) -> Vec<NodeId> {
        self.postorder_from(self.root)
    }

    /// Children before parents, siblings left to right.
    pub fn postorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().copied());
        }
        out.reverse();
        out
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        self.leaves_under(self.root)
    }

    /// Leaves of the clade rooted at `id`, left to right.
    pub fn leaves_under(&self, id: NodeId) -> Vec<NodeId> {
        self.preorder_from(id).into_iter().filter(|n| self.is_leaf(*n)).collect()
    }

    pub fn leaf_names(&self) -> Vec<String> {
        self.leaves().into_iter().map(|id| self.node(id).name.clone()).collect()
    }

    /// Parent chain from `id` (exclusive) up to the root (inclusive).
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.preorder().into_iter().find(|id| self.node(*id).name == name)
    }

    /// Number of nodes reachable from the root.
    pub fn len(&self) -> usize {
        self.preorder().len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Unlink `id` (and its subtree) from its parent.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let parent = self
            .parent(id)
            .ok_or_else(|| Error::Topology("cannot detach the root".into()))?;
        self.nodes[parent.0].children.retain(|c| *c != id);
        self.nodes[id.0].parent = None;
        Ok(())
    }

    /// Unlink every child of `id`, turning it into a leaf.
    pub fn remove_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for c in children {
            self.nodes[c.0].parent = None;
        }
    }

    /// Apply the naming and branch-length conventions:
    /// unnamed nodes become `N{postorder_index}`, the root becomes `"Root"`,
    /// and a tree whose distances are all zero gets unit distances.
    pub fn normalize(&mut self) {
        let order = self.postorder();
        let all_zero = order.iter().all(|id| self.node(*id).dist == 0.0);
        for (idx, id) in order.iter().enumerate() {
            let node = &mut self.nodes[id.0];
            if node.name.trim().is_empty() {
                node.name = format!("N{idx}");
            }
            if all_zero {
                node.dist = 1.0;
            }
        }
        let root = self.root;
        self.nodes[root.0].name = "Root".to_string();
    }

    // ========================================================================
    // Flat encoding
    // ========================================================================

    /// Reachable nodes in preorder with parent indices into the same list.
    pub fn to_flat(&self) -> Vec<FlatNode> {
        let order = self.preorder();
        let mut index = vec![usize::MAX; self.nodes.len()];
        for (i, id) in order.iter().enumerate() {
            index[id.0] = i;
        }
        order
            .iter()
            .map(|id| {
                let n = self.node(*id);
                FlatNode {
                    name: n.name.clone(),
                    dist: n.dist,
                    support: n.support,
                    parent: if self.is_root(*id) { None } else { n.parent.map(|p| index[p.0]) },
                    props: n.props.clone(),
                }
            })
            .collect()
    }

    pub fn from_flat(flat: Vec<FlatNode>) -> Result<Self> {
        let mut iter = flat.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| Error::InputValidation("empty tree snapshot".into()))?;
        if first.parent.is_some() {
            return Err(Error::InputValidation("snapshot does not start at the root".into()));
        }
        let mut tree = Tree::new(flat_to_node(first));
        for (i, row) in iter.enumerate() {
            let parent = row.parent.filter(|p| *p <= i).ok_or_else(|| {
                Error::InputValidation(format!("snapshot node {} has no valid parent", i + 1))
            })?;
            tree.add_child(NodeId(parent), flat_to_node(row));
        }
        Ok(tree)
    }

    /// Drop unreachable arena slots; ids are reassigned in preorder.
    pub fn compact(&self) -> Tree {
        let mut tree = Tree::new(Node::new(""));
        let order = self.preorder();
        let mut index = vec![NodeId(0); self.nodes.len()];
        for id in order {
            let n = self.node(id);
            let copy = Node {
                name: n.name.clone(),
                dist: n.dist,
                support: n.support,
                props: n.props.clone(),
                parent: None,
                children: Vec::new(),
            };
            if self.is_root(id) {
                tree.nodes[0] = copy;
            } else if let Some(p) = n.parent {
                index[id.0] = tree.add_child(index[p.0], copy);
            }
        }
        tree
    }
}

fn flat_to_node(row: FlatNode) -> Node {
    let mut node = Node::new(row.name);
    node.dist = row.dist;
    node.support = row.support;
    node.props = row.props;
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    /// (A,(B,(E,D)I1)I2)Root
    fn sample() -> Tree {
        let mut t = Tree::new(Node::new("Root"));
        let r = t.root();
        t.add_child(r, Node::new("A"));
        let i2 = t.add_child(r, Node::new("I2"));
        t.add_child(i2, Node::new("B"));
        let i1 = t.add_child(i2, Node::new("I1"));
        t.add_child(i1, Node::new("E"));
        t.add_child(i1, Node::new("D"));
        t
    }

    fn names(t: &Tree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| t.node(*id).name.clone()).collect()
    }

    #[test]
    fn test_orders() {
        let t = sample();
        assert_eq!(names(&t, &t.preorder()), ["Root", "A", "I2", "B", "I1", "E", "D"]);
        assert_eq!(names(&t, &t.postorder()), ["A", "B", "E", "D", "I1", "I2", "Root"]);
        assert_eq!(t.leaf_names(), ["A", "B", "E", "D"]);
    }

    #[test]
    fn test_detach_and_root_guard() {
        let mut t = sample();
        let i1 = t.find_by_name("I1").unwrap();
        t.detach(i1).unwrap();
        assert_eq!(t.leaf_names(), ["A", "B"]);
        assert!(t.detach(t.root()).is_err());
        assert_eq!(t.compact().len(), 4);
    }

    #[test]
    fn test_normalize_names_and_dists() {
        let mut t = Tree::new(Node::new(""));
        let r = t.root();
        let x = t.add_child(r, Node::new(""));
        t.add_child(x, Node::new("a"));
        t.add_child(x, Node::new("b"));
        t.normalize();
        assert_eq!(t.node(r).name, "Root");
        assert_eq!(t.node(x).name, "N2");
        assert!(t.preorder().iter().all(|id| t.node(*id).dist == 1.0));
    }

    #[test]
    fn test_deep_tree_traversal() {
        let mut t = Tree::new(Node::new("Root"));
        let mut cur = t.root();
        for i in 0..200_000 {
            t.add_child(cur, Node::new(format!("L{i}")));
            cur = t.add_child(cur, Node::new(format!("I{i}")));
        }
        assert_eq!(t.postorder().len(), 400_001);
        assert_eq!(t.ancestors(cur).len(), 200_000);
    }

    #[test]
    fn test_flat_roundtrip() {
        let t = sample();
        let back = Tree::from_flat(t.to_flat()).unwrap();
        assert_eq!(names(&back, &back.preorder()), names(&t, &t.preorder()));
    }
}
