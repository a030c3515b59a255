//! Tagged property value carried on every tree node.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sentinel written wherever a value is absent.
pub const MISSING: &str = "NaN";

/// Separator used when a list value crosses a textual boundary (NHX, snapshots).
pub const LIST_SEP: &str = "||";

/// A single property value.
///
/// Mirrors the semantic property types:
/// - `Str` backs categorical and taxon columns (missing is the `"NaN"` string)
/// - `StrList` backs multi-categorical columns
/// - `Float` backs numeric columns (missing is `f64::NAN`)
/// - `Bool` / `Missing` back the tri-valued boolean columns
/// - `FloatList` backs list-numeric columns, `Seq` backs alignments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Missing,
    Bool(bool),
    Float(#[serde(with = "nan_safe")] f64),
    Str(String),
    StrList(Vec<String>),
    FloatList(#[serde(with = "nan_safe_vec")] Vec<f64>),
    Seq(String),
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Missing => "MISSING",
            Value::Bool(_) => "BOOL",
            Value::Float(_) => "FLOAT",
            Value::Str(_) => "STRING",
            Value::StrList(_) => "STRING_LIST",
            Value::FloatList(_) => "FLOAT_LIST",
            Value::Seq(_) => "SEQUENCE",
        }
    }

    /// True for every encoding of "no value": the `Missing` tag, a NaN float,
    /// or the `"NaN"` categorical sentinel.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Float(f) => f.is_nan(),
            Value::Str(s) => s == MISSING,
            _ => false,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) if !f.is_nan() => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Str(s) => parse_bool(s),
            Value::Float(f) if *f == 1.0 => Some(true),
            Value::Float(f) if *f == 0.0 => Some(false),
            _ => None,
        }
    }

    /// Items of the value viewed as a multiset of category keys.
    ///
    /// Scalars yield one key; lists yield each item. Missing yields `"NaN"`.
    pub fn category_keys(&self) -> Vec<String> {
        match self {
            Value::StrList(items) => items.clone(),
            Value::FloatList(items) => items.iter().map(|f| format_float(*f)).collect(),
            other => vec![other.to_string()],
        }
    }

    /// Render the value for a textual sink, joining list items with `sep`.
    pub fn to_wire(&self, sep: &str) -> String {
        match self {
            Value::StrList(items) => items.join(sep),
            Value::FloatList(items) => items
                .iter()
                .map(|f| format_float(*f))
                .collect::<Vec<_>>()
                .join(sep),
            other => other.to_string(),
        }
    }
}

/// Parse the boolean alphabet `{yes,true,t,y,1,no,false,f,n,0}` (case-insensitive).
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Some(true),
        "no" | "false" | "f" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Float formatting shared by every textual sink: NaN is the missing sentinel,
/// integral values keep one decimal (`7.0`).
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        MISSING.to_string()
    } else if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Float(v as f64) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::Str(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::Str(v.to_owned()) } }
impl From<Vec<String>> for Value { fn from(v: Vec<String>) -> Self { Value::StrList(v) } }
impl From<Vec<f64>> for Value { fn from(v: Vec<f64>) -> Self { Value::FloatList(v) } }
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Value::Missing) }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "{MISSING}"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Str(s) | Value::Seq(s) => write!(f, "{s}"),
            Value::StrList(_) | Value::FloatList(_) => write!(f, "{}", self.to_wire(LIST_SEP)),
        }
    }
}

// ============================================================================
// NaN-preserving serde (JSON has no NaN literal)
// ============================================================================

mod nan_safe {
    use super::*;

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() { s.serialize_none() } else { s.serialize_some(v) }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

mod nan_safe_vec {
    use super::*;

    pub fn serialize<S: Serializer>(v: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let opt: Vec<Option<f64>> = v.iter().map(|f| (!f.is_nan()).then_some(*f)).collect();
        opt.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let opt = Vec::<Option<f64>>::deserialize(d)?;
        Ok(opt.into_iter().map(|f| f.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_encodings() {
        assert!(Value::Missing.is_missing());
        assert!(Value::Float(f64::NAN).is_missing());
        assert!(Value::from("NaN").is_missing());
        assert!(!Value::from("vowel").is_missing());
    }

    #[test]
    fn test_bool_alphabet() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("f"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(7.0).to_string(), "7.0");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::StrList(vec!["a".into(), "b".into()]).to_string(), "a||b");
        assert_eq!(Value::FloatList(vec![1.0, f64::NAN]).to_wire("|"), "1.0|NaN");
    }

    #[test]
    fn test_json_keeps_nan() {
        let v = Value::FloatList(vec![1.5, f64::NAN]);
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        match back {
            Value::FloatList(items) => {
                assert_eq!(items[0], 1.5);
                assert!(items[1].is_nan());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
