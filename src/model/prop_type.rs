//! Semantic property types and the `prop2type` side table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::value::{parse_bool, Value, MISSING};
use crate::Error;

/// Semantic type of a metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropType {
    Categorical,
    MultiCategorical,
    Numeric,
    Boolean,
    Taxon,
    Alignment,
    ListNumeric,
}

/// Property name → declared type. Ordered so the side file is deterministic.
pub type Prop2Type = BTreeMap<String, PropType>;

impl PropType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropType::Categorical => "categorical",
            PropType::MultiCategorical => "multi_categorical",
            PropType::Numeric => "numeric",
            PropType::Boolean => "boolean",
            PropType::Taxon => "taxon",
            PropType::Alignment => "alignment",
            PropType::ListNumeric => "list_numeric",
        }
    }

    /// Types summarized with a `_counter` on internal nodes.
    pub fn is_counted(&self) -> bool {
        matches!(
            self,
            PropType::Categorical | PropType::MultiCategorical | PropType::Boolean | PropType::Taxon
        )
    }

    /// Best-effort type for a value that was never declared (derived properties).
    pub fn of_value(value: &Value) -> PropType {
        match value {
            Value::Float(_) => PropType::Numeric,
            Value::Bool(_) | Value::Missing => PropType::Boolean,
            Value::StrList(_) => PropType::MultiCategorical,
            Value::FloatList(_) => PropType::ListNumeric,
            Value::Seq(_) => PropType::Alignment,
            Value::Str(_) => PropType::Categorical,
        }
    }

    /// Coerce a raw string into a value of this type.
    ///
    /// `list_sep` splits multi-categorical and list-numeric values. Coercion
    /// never fails: unparseable numerics become NaN, unparseable booleans
    /// become `Missing`.
    pub fn coerce(&self, raw: &str, list_sep: &str) -> Value {
        let raw = raw.trim();
        match self {
            PropType::Categorical | PropType::Taxon => Value::Str(raw.to_string()),
            PropType::MultiCategorical if raw.is_empty() => Value::StrList(Vec::new()),
            PropType::MultiCategorical => Value::StrList(
                raw.split(list_sep).map(|item| item.trim().to_string()).collect(),
            ),
            PropType::Numeric => Value::Float(raw.parse::<f64>().unwrap_or(f64::NAN)),
            PropType::Boolean => match parse_bool(raw) {
                Some(b) => Value::Bool(b),
                None => Value::Missing,
            },
            PropType::Alignment => Value::Seq(raw.to_string()),
            PropType::ListNumeric => {
                if raw == MISSING || raw.is_empty() {
                    return Value::FloatList(Vec::new());
                }
                Value::FloatList(
                    raw.split(list_sep)
                        .map(|item| item.trim().parse::<f64>().unwrap_or(f64::NAN))
                        .collect(),
                )
            }
        }
    }
}

impl fmt::Display for PropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "categorical" | "str" => Ok(PropType::Categorical),
            "multi_categorical" | "list" => Ok(PropType::MultiCategorical),
            "numeric" | "float" | "int" => Ok(PropType::Numeric),
            "boolean" | "bool" => Ok(PropType::Boolean),
            "taxon" => Ok(PropType::Taxon),
            "alignment" => Ok(PropType::Alignment),
            "list_numeric" => Ok(PropType::ListNumeric),
            other => Err(Error::InputValidation(format!("unknown property type '{other}'"))),
        }
    }
}
