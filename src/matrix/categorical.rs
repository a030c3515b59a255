//! Categorical matrix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::color::{assign_categorical, ABSENCE_COLOR, CATEGORICAL_PALETTE};
use super::{row_keys, ColorConfig, RowKey};
use crate::model::{Tree, Value, MISSING};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalMatrix {
    pub rows: Vec<RowKey>,
    pub columns: Vec<String>,
    /// Cell text; absent values are `"NaN"`.
    pub cells: Vec<Vec<String>>,
    /// Value → colour over every distinct cell value.
    pub value2color: BTreeMap<String, String>,
}

impl CategoricalMatrix {
    pub fn color_of(&self, row: usize, col: usize) -> &str {
        self.value2color
            .get(&self.cells[row][col])
            .map(String::as_str)
            .unwrap_or(ABSENCE_COLOR)
    }
}

/// Leaf × `props` matrix of raw values. Colours come from `config` when it
/// names a value, otherwise from `palette` (the built-in one by default).
pub fn categorical_matrix(
    tree: &Tree,
    props: &[String],
    palette: Option<&[&str]>,
    config: Option<&ColorConfig>,
) -> CategoricalMatrix {
    let rows = row_keys(tree, false);
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let node = tree.node(row.node);
            props
                .iter()
                .map(|p| match node.get(p) {
                    Some(v) if !v.is_missing() => cell_text(v),
                    _ => MISSING.to_string(),
                })
                .collect()
        })
        .collect();

    let palette = palette.unwrap_or(&CATEGORICAL_PALETTE);
    let mut value2color = assign_categorical(cells.iter().flatten().map(String::as_str), palette);
    if let Some(cfg) = config {
        for (value, color) in value2color.iter_mut() {
            if let Some(c) = props.iter().find_map(|p| cfg.value_color(p, value)) {
                *color = c.to_string();
            }
        }
    }

    tracing::debug!(rows = rows.len(), columns = props.len(), "categorical matrix built");
    CategoricalMatrix { rows, columns: props.to_vec(), cells, value2color }
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::StrList(items) => items.join(","),
        other => other.to_string(),
    }
}
