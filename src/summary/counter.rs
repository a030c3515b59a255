//! Counter maps and their wire format.
//!
//! ```text
//! <counter> ::= <item> ("||" <item>)*
//! <item>    ::= <key> "--" <value>
//! ```
//!
//! Keys are sorted lexicographically. Values are raw counts or relative
//! frequencies printed with two decimals.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const ITEM_SEP: &str = "||";
pub const PAIR_SEP: &str = "--";

/// How counters are emitted on internal nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterPolicy {
    #[default]
    Raw,
    Relative,
    None,
}

/// Multiset of category keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counter {
    counts: BTreeMap<String, u64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, n: u64) {
        *self.counts.entry(key.into()).or_insert(0) += n;
    }

    pub fn merge(&mut self, other: &Counter) {
        for (k, n) in &other.counts {
            self.add(k.clone(), *n);
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, n)| (k.as_str(), *n))
    }

    /// Wire form under `policy`; `None` when the policy suppresses counters
    /// or there is nothing to count.
    pub fn serialize(&self, policy: CounterPolicy) -> Option<String> {
        if self.counts.is_empty() {
            return None;
        }
        let total = self.total() as f64;
        let items: Vec<String> = match policy {
            CounterPolicy::None => return None,
            CounterPolicy::Raw => self
                .counts
                .iter()
                .map(|(k, n)| format!("{k}{PAIR_SEP}{n}"))
                .collect(),
            CounterPolicy::Relative => self
                .counts
                .iter()
                .map(|(k, n)| format!("{k}{PAIR_SEP}{:.2}", *n as f64 / total))
                .collect(),
        };
        Some(items.join(ITEM_SEP))
    }
}

/// A decoded counter string (raw or relative).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CounterMap {
    entries: Vec<(String, f64)>,
    relative: bool,
}

impl CounterMap {
    /// Decode the wire format. Keys may themselves contain `--`; the value is
    /// whatever follows the last separator.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut relative = false;
        for item in raw.split(ITEM_SEP).filter(|i| !i.is_empty()) {
            let (key, value) = item.rsplit_once(PAIR_SEP).ok_or_else(|| {
                Error::InputValidation(format!("counter item '{item}' lacks '{PAIR_SEP}'"))
            })?;
            let count = value.parse::<f64>().map_err(|_| Error::TypeError {
                expected: "counter value".into(),
                got: value.to_string(),
            })?;
            relative |= value.contains('.');
            entries.push((key.to_string(), count));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self { entries, relative })
    }

    pub fn get(&self, key: &str) -> f64 {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }
}

impl fmt::Display for CounterMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(ITEM_SEP)?;
            }
            if self.relative {
                write!(f, "{k}{PAIR_SEP}{v:.2}")?;
            } else {
                write!(f, "{k}{PAIR_SEP}{}", *v as u64)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(items: &[(&str, u64)]) -> Counter {
        let mut c = Counter::new();
        for (k, n) in items {
            c.add(*k, *n);
        }
        c
    }

    #[test]
    fn test_raw_sorted() {
        let c = counter(&[("vowel", 1), ("consonant", 2)]);
        assert_eq!(c.serialize(CounterPolicy::Raw).unwrap(), "consonant--2||vowel--1");
    }

    #[test]
    fn test_relative_two_decimals() {
        let c = counter(&[("a", 1), ("b", 2)]);
        assert_eq!(c.serialize(CounterPolicy::Relative).unwrap(), "a--0.33||b--0.67");
        assert_eq!(c.serialize(CounterPolicy::None), None);
    }

    #[test]
    fn test_parse_roundtrip() {
        for raw in ["consonant--2||vowel--1", "NaN--0.20||a--0.40||b--0.40", "x--y--3"] {
            let parsed = CounterMap::parse(raw).unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
        let parsed = CounterMap::parse("x--y--3").unwrap();
        assert_eq!(parsed.get("x--y"), 3.0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(CounterMap::parse("novalue").is_err());
        assert!(CounterMap::parse("a--b").is_err());
    }

    #[test]
    fn test_merge() {
        let mut a = counter(&[("x", 1)]);
        a.merge(&counter(&[("x", 2), ("y", 1)]));
        assert_eq!(a.get("x"), 3);
        assert_eq!(a.total(), 4);
    }
}
