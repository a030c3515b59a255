//! Lineage-specificity of a binary trait.
//!
//! For every internal clade: precision = positives / leaves, sensitivity =
//! positives / all positives, F1 their harmonic mean. Non-root clades that
//! clear both cut-offs are marked.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::{parse_bool, NodeId, Prop2Type, PropType, Tree, Value};
use crate::{Error, Result};

pub const PREC_SUFFIX: &str = "prec";
pub const SENS_SUFFIX: &str = "sens";
pub const F1_SUFFIX: &str = "f1";
pub const CLADE_SUFFIX: &str = "ls_clade";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageOptions {
    pub precision_cutoff: f64,
    pub sensitivity_cutoff: f64,
}

impl Default for LineageOptions {
    fn default() -> Self {
        Self { precision_cutoff: 0.95, sensitivity_cutoff: 0.95 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CladeScore {
    pub node: NodeId,
    pub name: String,
    pub precision: f64,
    pub sensitivity: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageReport {
    pub prop: String,
    pub positives: u64,
    /// Marked clades in preorder.
    pub marked: Vec<CladeScore>,
    /// Highest-F1 marked clade; ties go to the first in preorder.
    pub best: Option<CladeScore>,
}

/// Score every internal node for binary property `prop` and stamp
/// `{prop}_prec`, `{prop}_sens`, `{prop}_f1` and `{prop}_ls_clade` on it.
pub fn lineage_specificity(tree: &mut Tree, prop: &str, opts: &LineageOptions) -> Result<LineageReport> {
    for cut in [opts.precision_cutoff, opts.sensitivity_cutoff] {
        if !(0.0..=1.0).contains(&cut) {
            return Err(Error::InputValidation(format!("cut-off {cut} is outside [0, 1]")));
        }
    }

    // (positives, leaves) per clade.
    let mut tally: HashMap<NodeId, (u64, u64)> = HashMap::new();
    for id in tree.postorder() {
        let entry = if tree.is_leaf(id) {
            (u64::from(is_positive(tree.node(id).get(prop), prop)?), 1)
        } else {
            tree.children(id)
                .iter()
                .filter_map(|c| tally.get(c))
                .fold((0, 0), |(p, n), (cp, cn)| (p + cp, n + cn))
        };
        tally.insert(id, entry);
    }

    let root = tree.root();
    let positives = tally.get(&root).map(|t| t.0).unwrap_or(0);
    if positives == 0 {
        return Err(Error::InputValidation(format!("no leaf is positive for '{prop}'")));
    }

    let mut marked = Vec::new();
    for id in tree.preorder() {
        if tree.is_leaf(id) {
            continue;
        }
        let (p, n) = tally.get(&id).copied().unwrap_or((0, 0));
        let precision = if n == 0 { 0.0 } else { p as f64 / n as f64 };
        let sensitivity = p as f64 / positives as f64;
        let f1 = if precision + sensitivity == 0.0 {
            0.0
        } else {
            2.0 * precision * sensitivity / (precision + sensitivity)
        };
        let hit = id != root && precision >= opts.precision_cutoff && sensitivity >= opts.sensitivity_cutoff;

        let node = tree.node_mut(id);
        node.set(format!("{prop}_{PREC_SUFFIX}"), precision);
        node.set(format!("{prop}_{SENS_SUFFIX}"), sensitivity);
        node.set(format!("{prop}_{F1_SUFFIX}"), f1);
        node.set(format!("{prop}_{CLADE_SUFFIX}"), hit);
        if hit {
            marked.push(CladeScore { node: id, name: node.name.clone(), precision, sensitivity, f1 });
        }
    }

    let best = marked
        .iter()
        .fold(None::<&CladeScore>, |best, c| match best {
            Some(b) if b.f1 >= c.f1 => Some(b),
            _ => Some(c),
        })
        .cloned();

    tracing::info!(prop, positives, marked = marked.len(), "lineage specificity scored");
    Ok(LineageReport { prop: prop.to_string(), positives, marked, best })
}

/// Types of the properties [`lineage_specificity`] writes for `prop`.
pub fn lineage_prop2type(prop: &str) -> Prop2Type {
    Prop2Type::from([
        (format!("{prop}_{PREC_SUFFIX}"), PropType::Numeric),
        (format!("{prop}_{SENS_SUFFIX}"), PropType::Numeric),
        (format!("{prop}_{F1_SUFFIX}"), PropType::Numeric),
        (format!("{prop}_{CLADE_SUFFIX}"), PropType::Boolean),
    ])
}

fn is_positive(value: Option<&Value>, prop: &str) -> Result<bool> {
    match value {
        None => Ok(false),
        Some(v) if v.is_missing() => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Float(f)) if *f == 0.0 || *f == 1.0 => Ok(*f == 1.0),
        Some(Value::Str(s)) => parse_bool(s).ok_or_else(|| Error::TypeError {
            expected: format!("boolean value for '{prop}'"),
            got: format!("'{s}'"),
        }),
        Some(other) => Err(Error::TypeError {
            expected: format!("boolean value for '{prop}'"),
            got: other.type_name().to_string(),
        }),
    }
}
