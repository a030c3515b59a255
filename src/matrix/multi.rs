//! Multi-presence matrix for one multi-categorical property.

use std::collections::BTreeSet;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::color::{Gradient, Rgb, ABSENCE_COLOR, CATEGORICAL_PALETTE};
use super::config::ColorConfig;
use super::{row_keys, RowKey};
use crate::model::{NodeId, Tree, Value};
use crate::summary::Counter;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPresenceMatrix {
    pub prop: String,
    pub rows: Vec<RowKey>,
    /// Sorted union of every value seen on a leaf.
    pub columns: Vec<String>,
    /// 0/1 on leaves; share of clade leaves carrying the value on internal nodes.
    pub cells: Vec<Vec<f64>>,
    pub colors: Vec<Vec<String>>,
}

pub fn multi_presence_matrix(
    tree: &Tree,
    prop: &str,
    include_internal: bool,
    config: Option<&ColorConfig>,
) -> Result<MultiPresenceMatrix> {
    // Distinct items per clade plus clade leaf counts, built bottom-up.
    let mut presence: HashMap<NodeId, (Counter, u64)> = HashMap::new();
    let mut union = BTreeSet::new();

    for id in tree.postorder() {
        let entry = if tree.is_leaf(id) {
            let mut c = Counter::new();
            for item in leaf_items(tree.node(id).get(prop), prop)? {
                union.insert(item.clone());
                if c.get(&item) == 0 {
                    c.add(item, 1);
                }
            }
            (c, 1)
        } else {
            let mut c = Counter::new();
            let mut n = 0u64;
            for child in tree.children(id) {
                if let Some((cc, cn)) = presence.get(child) {
                    c.merge(cc);
                    n += *cn;
                }
            }
            (c, n)
        };
        presence.insert(id, entry);
    }

    let columns: Vec<String> = union.into_iter().collect();
    let rows = row_keys(tree, include_internal);
    let cells: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| {
            let (counter, n) = presence.get(&row.node).cloned().unwrap_or_default();
            columns
                .iter()
                .map(|col| if n == 0 { 0.0 } else { counter.get(col) as f64 / n as f64 })
                .collect()
        })
        .collect();

    let column_colors: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            config
                .and_then(|c| c.value_color(prop, col))
                .unwrap_or(CATEGORICAL_PALETTE[i % CATEGORICAL_PALETTE.len()])
                .to_string()
        })
        .collect();
    let absence = Rgb::parse(ABSENCE_COLOR).unwrap_or(Rgb(0xEB, 0xEB, 0xEB));
    let colors = cells
        .iter()
        .map(|line| {
            line.iter()
                .zip(&column_colors)
                .map(|(v, color)| match *v {
                    v if v >= 1.0 => color.clone(),
                    v if v <= 0.0 => ABSENCE_COLOR.to_string(),
                    v => match Rgb::parse(color) {
                        Some(high) => Gradient::between(absence, high).bucket(v),
                        None => color.clone(),
                    },
                })
                .collect()
        })
        .collect();

    tracing::debug!(prop, columns = columns.len(), rows = rows.len(), "multi-presence matrix built");
    Ok(MultiPresenceMatrix { prop: prop.to_string(), rows, columns, cells, colors })
}

fn leaf_items(value: Option<&Value>, prop: &str) -> Result<Vec<String>> {
    match value {
        None => Ok(Vec::new()),
        Some(v) if v.is_missing() => Ok(Vec::new()),
        Some(Value::StrList(items)) => Ok(items.clone()),
        Some(Value::Str(s)) => Ok(vec![s.clone()]),
        Some(other) => Err(Error::TypeError {
            expected: format!("multi_categorical value for '{prop}'"),
            got: other.type_name().to_string(),
        }),
    }
}
