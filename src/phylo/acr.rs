//! Ancestral character reconstruction seam.
//!
//! ## Implementations
//!
//! | Engine | Description |
//! |--------|-------------|
//! | `LeafFrequencyEngine` | State frequencies among each clade's leaves; no model |

use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::model::{NodeId, Tree, Value};
use crate::Result;

/// Per-internal-node state probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct Marginals {
    /// Column labels, sorted.
    pub states: Vec<String>,
    /// One row per internal node; every row sums to 1.
    pub rows: Vec<(NodeId, Vec<f64>)>,
}

impl Marginals {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The reconstruction collaborator. Failures should surface as
/// [`crate::Error::External`].
pub trait ACREngine {
    fn marginals(&self, tree: &Tree, leaf_states: &[(NodeId, String)]) -> Result<Marginals>;
}

/// Leaf states of `prop`, skipping leaves where it is absent or missing.
pub fn leaf_states(tree: &Tree, prop: &str) -> Vec<(NodeId, String)> {
    tree.leaves()
        .into_iter()
        .filter_map(|id| match tree.node(id).get(prop) {
            Some(v) if !v.is_missing() => Some((id, state_label(v))),
            _ => None,
        })
        .collect()
}

fn state_label(v: &Value) -> String {
    v.to_string()
}

/// Reference engine: an internal node's marginal is the state distribution
/// over the leaves below it. Clades with no observed leaf get a uniform row.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafFrequencyEngine;

impl ACREngine for LeafFrequencyEngine {
    fn marginals(&self, tree: &Tree, leaf_states: &[(NodeId, String)]) -> Result<Marginals> {
        let states: Vec<String> = leaf_states
            .iter()
            .map(|(_, s)| s.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let observed: HashMap<NodeId, usize> = {
            let index: HashMap<&str, usize> =
                states.iter().enumerate().map(|(i, s)| (s.as_str(), i)).collect();
            leaf_states
                .iter()
                .filter_map(|(id, s)| index.get(s.as_str()).map(|i| (*id, *i)))
                .collect()
        };

        let k = states.len();
        let mut counts: HashMap<NodeId, Vec<u64>> = HashMap::new();
        let mut rows = Vec::new();
        for id in tree.postorder() {
            let mut c = vec![0u64; k];
            if tree.is_leaf(id) {
                if let Some(i) = observed.get(&id) {
                    c[*i] = 1;
                }
            } else {
                for child in tree.children(id) {
                    if let Some(cc) = counts.remove(child) {
                        c.iter_mut().zip(cc).for_each(|(a, b)| *a += b);
                    }
                }
                let total: u64 = c.iter().sum();
                let row = if total == 0 {
                    vec![1.0 / k.max(1) as f64; k]
                } else {
                    c.iter().map(|n| *n as f64 / total as f64).collect()
                };
                rows.push((id, row));
            }
            counts.insert(id, c);
        }
        Ok(Marginals { states, rows })
    }
}
