//! Numeric matrices and normalisation.

use serde::{Deserialize, Serialize};

use super::color::{Gradient, ABSENCE_COLOR};
use super::config::{ColorConfig, Detail, WILDCARD};
use super::{row_keys, RowKey};
use crate::model::{format_float, Prop2Type, PropType, Tree, Value, MISSING};
use crate::summary::{derived_name, NumericStat};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    #[default]
    MinMax,
    Mean,
    #[serde(rename = "zscore")]
    ZScore,
}

impl Normalization {
    fn is_signed(&self) -> bool {
        !matches!(self, Normalization::MinMax)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericMatrixOptions {
    pub normalization: Normalization,
    /// Gradient name; `Reds` for min-max and `coolwarm` for signed methods
    /// when unset.
    pub gradient: Option<String>,
    /// Add internal-node rows read from `p_avg`.
    pub include_internal: bool,
}

impl Default for NumericMatrixOptions {
    fn default() -> Self {
        Self { normalization: Normalization::MinMax, gradient: None, include_internal: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericMatrix {
    /// Property (list matrices) or comma-joined properties (scalar group).
    pub name: String,
    pub rows: Vec<RowKey>,
    pub columns: Vec<String>,
    pub raw: Vec<Vec<Option<f64>>>,
    pub normalized: Vec<Vec<Option<f64>>>,
    pub colors: Vec<Vec<String>>,
}

/// Normalise every present value against the statistics of all present
/// values. `bounds` overrides the observed min/max.
pub fn normalize(values: &[Option<f64>], method: Normalization, bounds: (Option<f64>, Option<f64>)) -> Vec<Option<f64>> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return values.to_vec();
    }
    let n = present.len() as f64;
    let min = bounds.0.unwrap_or_else(|| present.iter().copied().fold(f64::INFINITY, f64::min));
    let max = bounds.1.unwrap_or_else(|| present.iter().copied().fold(f64::NEG_INFINITY, f64::max));
    let mean = present.iter().sum::<f64>() / n;
    let std = (present.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    let range = max - min;

    values
        .iter()
        .map(|v| {
            v.map(|x| match method {
                Normalization::MinMax if range > 0.0 => (x - min) / range,
                Normalization::Mean if range > 0.0 => (x - mean) / range,
                Normalization::ZScore if std > 0.0 => (x - mean) / std,
                _ => 0.0,
            })
        })
        .collect()
}

/// Build one matrix for the scalar properties in `props` and one per
/// `list_numeric` property.
pub fn numeric_matrices(
    tree: &Tree,
    props: &[String],
    prop2type: &Prop2Type,
    opts: &NumericMatrixOptions,
    config: Option<&ColorConfig>,
) -> Result<Vec<NumericMatrix>> {
    let gradient_name = opts.gradient.clone().unwrap_or_else(|| {
        if opts.normalization.is_signed() { "coolwarm" } else { "Reds" }.to_string()
    });
    let gradient = Gradient::named(&gradient_name)
        .ok_or_else(|| Error::InputValidation(format!("unknown gradient '{gradient_name}'")))?;

    let (lists, scalars): (Vec<&String>, Vec<&String>) = props
        .iter()
        .partition(|p| prop2type.get(p.as_str()) == Some(&PropType::ListNumeric));

    let rows = row_keys(tree, opts.include_internal);
    let mut out = Vec::new();

    if !scalars.is_empty() {
        let mut raw = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cells = Vec::with_capacity(scalars.len());
            for p in &scalars {
                let key = source_key(p, row.is_leaf);
                cells.push(scalar_cell(tree.node(row.node).get(&key), &key)?);
            }
            raw.push(cells);
        }
        let columns: Vec<String> = scalars.iter().map(|p| p.to_string()).collect();
        let detail = match (config, columns.as_slice()) {
            (Some(cfg), [single]) => cfg.detail(single),
            (Some(cfg), _) => cfg.detail(WILDCARD),
            (None, _) => Detail::default(),
        };
        out.push(finish(columns.join(","), rows.clone(), columns, raw, &detail, &gradient, opts, config));
    }

    for p in lists {
        let mut raw = Vec::with_capacity(rows.len());
        for row in &rows {
            let key = source_key(p, row.is_leaf);
            raw.push(list_cells(tree.node(row.node).get(&key), &key)?);
        }
        let width = raw.iter().map(Vec::len).max().unwrap_or(0);
        for r in &mut raw {
            r.resize(width, None);
        }
        let columns: Vec<String> = (0..width).map(|i| format!("{p}_{i}")).collect();
        let detail = config.map(|c| c.detail(p)).unwrap_or_default();
        out.push(finish(p.clone(), rows.clone(), columns, raw, &detail, &gradient, opts, config));
    }

    tracing::debug!(matrices = out.len(), rows = rows.len(), "numeric matrices built");
    Ok(out)
}

fn source_key(prop: &str, is_leaf: bool) -> String {
    if is_leaf { prop.to_string() } else { derived_name(prop, NumericStat::Avg.suffix()) }
}

fn scalar_cell(value: Option<&Value>, prop: &str) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Missing) => Ok(None),
        Some(Value::Float(f)) => Ok((!f.is_nan()).then_some(*f)),
        Some(Value::Str(s)) if s == MISSING => Ok(None),
        Some(v) => v.as_float().map(Some).ok_or_else(|| Error::TypeError {
            expected: format!("numeric value for '{prop}'"),
            got: v.to_string(),
        }),
    }
}

fn list_cells(value: Option<&Value>, prop: &str) -> Result<Vec<Option<f64>>> {
    match value {
        None | Some(Value::Missing) => Ok(Vec::new()),
        Some(Value::FloatList(items)) => Ok(items.iter().map(|f| (!f.is_nan()).then_some(*f)).collect()),
        Some(other) => Err(Error::TypeError {
            expected: format!("list_numeric value for '{prop}'"),
            got: other.type_name().to_string(),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn finish(
    name: String,
    rows: Vec<RowKey>,
    columns: Vec<String>,
    raw: Vec<Vec<Option<f64>>>,
    detail: &Detail,
    gradient: &Gradient,
    opts: &NumericMatrixOptions,
    config: Option<&ColorConfig>,
) -> NumericMatrix {
    let width = columns.len();
    let flat: Vec<Option<f64>> = raw.iter().flatten().copied().collect();
    let flat_norm = normalize(&flat, opts.normalization, (detail.min_value(), detail.max_value()));
    let normalized: Vec<Vec<Option<f64>>> = if width == 0 {
        vec![Vec::new(); raw.len()]
    } else {
        flat_norm.chunks(width).map(<[Option<f64>]>::to_vec).collect()
    };

    let gradient = gradient.with_overrides(detail.min_rgb(), detail.mid_rgb(), detail.max_rgb());
    let nan_color = detail.color_nan.clone().unwrap_or_else(|| ABSENCE_COLOR.to_string());
    let max_abs = flat_norm.iter().flatten().fold(0.0_f64, |m, v| m.max(v.abs()));
    let position = |v: f64| {
        if opts.normalization.is_signed() {
            if max_abs > 0.0 { 0.5 + v / (2.0 * max_abs) } else { 0.5 }
        } else {
            v
        }
    };

    let colors = raw
        .iter()
        .zip(&normalized)
        .map(|(raw_row, norm_row)| {
            raw_row
                .iter()
                .zip(norm_row)
                .enumerate()
                .map(|(col, (x, v))| {
                    let exact = x.and_then(|x| {
                        let prop = columns[col].as_str();
                        config.and_then(|c| c.value_color(prop, &format_float(x)))
                    });
                    match (exact, v) {
                        (Some(c), _) => c.to_string(),
                        (None, Some(v)) => gradient.bucket(position(*v)),
                        (None, None) => nan_color.clone(),
                    }
                })
                .collect()
        })
        .collect();

    NumericMatrix { name, rows, columns, raw, normalized, colors }
}
