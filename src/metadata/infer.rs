//! Column type inference and explicit type overrides.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{parse_bool, PropType, MISSING};
use crate::{Error, Result};

static MISSING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\W+|none|None|null|Null|NaN|)$").expect("valid missing-value regex")
});

/// A comma inside a run of non-whitespace marks a multi-valued cell.
static MULTI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S,\S").expect("valid multi regex"));

/// Whether a raw cell encodes a missing value.
pub fn is_missing_raw(raw: &str) -> bool {
    MISSING_RE.is_match(raw.trim())
}

/// Replace missing encodings with the `"NaN"` sentinel.
pub fn normalize_missing(raw: &str) -> String {
    if is_missing_raw(raw) { MISSING.to_string() } else { raw.trim().to_string() }
}

/// Infer a column type from its (already normalized) cells, first rule wins:
/// multi-categorical, numeric, boolean, categorical.
pub fn infer_type<'a, I>(cells: I) -> PropType
where
    I: IntoIterator<Item = &'a str>,
{
    let present: Vec<&str> = cells.into_iter().filter(|c| *c != MISSING).collect();
    if present.iter().any(|c| MULTI_RE.is_match(c)) {
        return PropType::MultiCategorical;
    }
    if !present.is_empty() && present.iter().all(|c| c.parse::<f64>().is_ok()) {
        return PropType::Numeric;
    }
    if !present.is_empty() && present.iter().all(|c| parse_bool(c).is_some()) {
        return PropType::Boolean;
    }
    PropType::Categorical
}

/// Explicit per-column types. Each entry is a column name, a 1-based
/// property-column index (`3`), or an inclusive index range (`[2-5]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeOverrides {
    pub categorical: Vec<String>,
    pub multi_categorical: Vec<String>,
    pub numeric: Vec<String>,
    pub boolean: Vec<String>,
    pub taxon: Vec<String>,
    pub list_numeric: Vec<String>,
}

impl TypeOverrides {
    pub fn is_empty(&self) -> bool {
        self.entries().all(|(_, specs)| specs.is_empty())
    }

    fn entries(&self) -> impl Iterator<Item = (PropType, &Vec<String>)> {
        [
            (PropType::Categorical, &self.categorical),
            (PropType::MultiCategorical, &self.multi_categorical),
            (PropType::Numeric, &self.numeric),
            (PropType::Boolean, &self.boolean),
            (PropType::Taxon, &self.taxon),
            (PropType::ListNumeric, &self.list_numeric),
        ]
        .into_iter()
    }

    /// Resolve every entry against `columns`, yielding `(column, type)` pairs.
    pub fn resolve(&self, columns: &[String]) -> Result<Vec<(String, PropType)>> {
        let mut out = Vec::new();
        for (ptype, specs) in self.entries() {
            for spec in specs {
                for idx in resolve_column_spec(spec, columns)? {
                    out.push((columns[idx].clone(), ptype));
                }
            }
        }
        Ok(out)
    }
}

/// Map a column spec to 0-based positions in `columns`.
pub fn resolve_column_spec(spec: &str, columns: &[String]) -> Result<Vec<usize>> {
    let spec = spec.trim();
    if let Some(pos) = columns.iter().position(|c| c == spec) {
        return Ok(vec![pos]);
    }
    if let Some(inner) = spec.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let (a, b) = inner
            .split_once('-')
            .ok_or_else(|| Error::InputValidation(format!("unparseable column range '{spec}'")))?;
        let start = parse_index(a, spec)?;
        let end = parse_index(b, spec)?;
        if start > end {
            return Err(Error::InputValidation(format!("empty column range '{spec}'")));
        }
        return (start..=end).map(|i| check_index(i, spec, columns)).collect();
    }
    if spec.chars().all(|c| c.is_ascii_digit()) && !spec.is_empty() {
        return Ok(vec![check_index(parse_index(spec, spec)?, spec, columns)?]);
    }
    Err(Error::InputValidation(format!("unknown column '{spec}'")))
}

fn parse_index(raw: &str, spec: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| Error::InputValidation(format!("unparseable column range '{spec}'")))
}

fn check_index(one_based: usize, spec: &str, columns: &[String]) -> Result<usize> {
    if one_based == 0 || one_based > columns.len() {
        return Err(Error::InputValidation(format!(
            "column index {one_based} in '{spec}' is out of range (1..={})",
            columns.len()
        )));
    }
    Ok(one_based - 1)
}
