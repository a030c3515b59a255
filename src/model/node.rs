//! Node in the annotated tree.

use serde::{Deserialize, Serialize};
use super::{PropertyMap, Value};

/// Arena index of a node. Stable for the lifetime of its `Tree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node of a rooted, possibly multifurcating tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub dist: f64,
    pub support: Option<f64>,
    pub props: PropertyMap,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dist: 0.0,
            support: None,
            props: PropertyMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_dist(mut self, dist: f64) -> Self {
        self.dist = dist;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.props.insert(key.into(), value.into());
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}
