//! Presence/absence matrix over boolean-like properties.

use serde::{Deserialize, Serialize};

use super::color::{Gradient, Rgb, ABSENCE_COLOR};
use super::config::ColorConfig;
use super::{row_keys, RowKey};
use crate::model::{parse_bool, Tree, Value};
use crate::summary::{derived_name, CounterMap, COUNTER_SUFFIX};
use crate::{Error, Result};

pub const POSITIVE_COLOR: &str = "#E41A1C";
pub const NEGATIVE_COLOR: &str = "#FFFFFF";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryOptions {
    /// Non-zero internal shares are raised to at least this value.
    pub min_visible: f64,
    pub include_internal: bool,
}

impl Default for BinaryOptions {
    fn default() -> Self {
        Self { min_visible: 0.05, include_internal: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryMatrix {
    pub rows: Vec<RowKey>,
    pub columns: Vec<String>,
    /// 0/1 on leaves, positive share on internal nodes, `None` when absent.
    pub cells: Vec<Vec<Option<f64>>>,
    pub colors: Vec<Vec<String>>,
}

pub fn binary_matrix(
    tree: &Tree,
    props: &[String],
    opts: &BinaryOptions,
    config: Option<&ColorConfig>,
) -> Result<BinaryMatrix> {
    let rows = row_keys(tree, opts.include_internal);
    let mut cells = Vec::with_capacity(rows.len());
    for row in &rows {
        let node = tree.node(row.node);
        let mut line = Vec::with_capacity(props.len());
        for p in props {
            let cell = if row.is_leaf {
                leaf_cell(node.get(p), p)?
            } else {
                let key = derived_name(p, COUNTER_SUFFIX);
                match node.get(&key) {
                    Some(Value::Str(raw)) => Some(positive_share(&CounterMap::parse(raw)?, opts.min_visible)),
                    _ => None,
                }
            };
            line.push(cell);
        }
        cells.push(line);
    }

    let colors = cells
        .iter()
        .map(|line| {
            line.iter()
                .zip(props)
                .map(|(cell, p)| cell_color(*cell, p, config))
                .collect()
        })
        .collect();

    tracing::debug!(rows = rows.len(), columns = props.len(), "binary matrix built");
    Ok(BinaryMatrix { rows, columns: props.to_vec(), cells, colors })
}

fn leaf_cell(value: Option<&Value>, prop: &str) -> Result<Option<f64>> {
    match value {
        None => Ok(None),
        Some(v) if v.is_missing() => Ok(None),
        Some(v) => v
            .as_bool()
            .map(|b| Some(if b { 1.0 } else { 0.0 }))
            .ok_or_else(|| Error::TypeError {
                expected: format!("boolean value for '{prop}'"),
                got: v.to_string(),
            }),
    }
}

/// Share of positive keys among all counted leaves.
fn positive_share(counter: &CounterMap, min_visible: f64) -> f64 {
    let total = counter.total();
    if total <= 0.0 {
        return 0.0;
    }
    let positive: f64 = counter
        .entries()
        .iter()
        .filter(|(k, _)| parse_bool(k) == Some(true))
        .map(|(_, n)| n)
        .sum();
    let share = positive / total;
    if share > 0.0 { share.max(min_visible) } else { 0.0 }
}

fn cell_color(cell: Option<f64>, prop: &str, config: Option<&ColorConfig>) -> String {
    let lookup = |key: &str, fallback: &str| {
        config
            .and_then(|c| c.value_color(prop, key))
            .unwrap_or(fallback)
            .to_string()
    };
    match cell {
        None => config
            .and_then(|c| c.detail(prop).color_nan)
            .unwrap_or_else(|| ABSENCE_COLOR.to_string()),
        Some(v) if v >= 1.0 => lookup("True", POSITIVE_COLOR),
        Some(v) if v <= 0.0 => lookup("False", NEGATIVE_COLOR),
        Some(v) => {
            let low = Rgb::parse(&lookup("False", NEGATIVE_COLOR)).unwrap_or(Rgb(255, 255, 255));
            let high = Rgb::parse(&lookup("True", POSITIVE_COLOR)).unwrap_or(Rgb(0xE4, 0x1A, 0x1C));
            Gradient::between(low, high).bucket(v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Prop2Type, PropType};
    use crate::newick;
    use crate::summary::{summarize, SummaryOptions};

    fn annotated() -> Tree {
        let mut t = newick::parse("((A,B)I1,(C,D)I2)Root;").unwrap();
        for (n, v) in [("A", true), ("B", false), ("C", false), ("D", false)] {
            let id = t.find_by_name(n).unwrap();
            t.node_mut(id).set("flag", v);
        }
        let p2t = Prop2Type::from([("flag".to_string(), PropType::Boolean)]);
        summarize(&mut t, &p2t, &SummaryOptions::default(), None).unwrap();
        t
    }

    #[test]
    fn test_leaf_and_internal_cells() {
        let t = annotated();
        let m = binary_matrix(&t, &["flag".to_string()], &BinaryOptions::default(), None).unwrap();
        let cell = |name: &str| {
            let i = m.rows.iter().position(|r| r.name == name).unwrap();
            m.cells[i][0]
        };
        assert_eq!(cell("A"), Some(1.0));
        assert_eq!(cell("B"), Some(0.0));
        assert_eq!(cell("I1"), Some(0.5));
        assert_eq!(cell("I2"), Some(0.0));
        assert_eq!(cell("Root"), Some(0.25));
        let a = m.rows.iter().position(|r| r.name == "A").unwrap();
        assert_eq!(m.colors[a][0], POSITIVE_COLOR);
    }

    #[test]
    fn test_min_visible_clamp() {
        let counter = CounterMap::parse("False--99||True--1").unwrap();
        assert_eq!(positive_share(&counter, 0.05), 0.05);
        assert_eq!(positive_share(&counter, 0.0), 0.01);
    }

    #[test]
    fn test_non_boolean_leaf() {
        let mut t = newick::parse("(A,B)Root;").unwrap();
        let a = t.find_by_name("A").unwrap();
        t.node_mut(a).set("flag", "maybe");
        let opts = BinaryOptions { include_internal: false, ..Default::default() };
        assert!(binary_matrix(&t, &["flag".to_string()], &opts, None).is_err());
    }
}
