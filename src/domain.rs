//! Protein domain architectures on leaves.
//!
//! A domain travels as `name@start@end`; a leaf's architecture is the list of
//! its domains ordered by start, or the single absence token when the source
//! knows nothing about the leaf.

use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::{Prop2Type, PropType, Tree, Value};
use crate::{Error, Result};

pub const DOMAIN_PROP: &str = "dom_arq";
pub const NO_DOMAIN: &str = "none@none@none";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub start: u32,
    pub end: u32,
}

impl Domain {
    pub fn new(name: impl Into<String>, start: u32, end: u32) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || start > end {
            return Err(Error::InputValidation(format!("invalid domain '{name}' at {start}..{end}")));
        }
        Ok(Self { name, start, end })
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}@{}", self.name, self.start, self.end)
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.rsplitn(3, '@');
        let (end, start, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(e), Some(s), Some(n)) => (e, s, n),
            _ => return Err(Error::InputValidation(format!("domain '{s}' is not name@start@end"))),
        };
        let coord = |raw: &str| {
            raw.trim()
                .parse::<u32>()
                .map_err(|_| Error::InputValidation(format!("bad coordinate '{raw}' in domain '{s}'")))
        };
        Domain::new(name.trim(), coord(start)?, coord(end)?)
    }
}

/// Supplier of per-sequence domain hits.
pub trait DomainSource {
    /// Domains of `leaf`, in any order; `None` when the leaf is unknown.
    fn domains(&self, leaf: &str) -> Result<Option<Vec<Domain>>>;
}

/// Table-backed source: `seq_name<TAB>domain<TAB>start<TAB>end` per line.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDomains {
    hits: HashMap<String, Vec<Domain>>,
}

impl InMemoryDomains {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, leaf: impl Into<String>, domain: Domain) -> &mut Self {
        self.hits.entry(leaf.into()).or_default().push(domain);
        self
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut out = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let [leaf, name, start, end] = fields.as_slice() else {
                return Err(Error::InputValidation(format!(
                    "domain table line {} has {} fields, expected 4",
                    lineno + 1,
                    fields.len()
                )));
            };
            let domain: Domain = format!("{name}@{start}@{end}").parse()?;
            out.insert(*leaf, domain);
        }
        Ok(out)
    }
}

impl DomainSource for InMemoryDomains {
    fn domains(&self, leaf: &str) -> Result<Option<Vec<Domain>>> {
        Ok(self.hits.get(leaf).cloned())
    }
}

/// Attach the architecture of every leaf under `prop`. Returns the number of
/// leaves with at least one domain.
pub fn annotate_domains(tree: &mut Tree, source: &dyn DomainSource, prop: &str) -> Result<usize> {
    let mut hits = 0;
    for id in tree.leaves() {
        let found = source.domains(&tree.node(id).name)?;
        let items = match found {
            Some(mut doms) if !doms.is_empty() => {
                hits += 1;
                doms.sort_by(|a, b| (a.start, a.end, &a.name).cmp(&(b.start, b.end, &b.name)));
                doms.iter().map(Domain::to_string).collect()
            }
            _ => vec![NO_DOMAIN.to_string()],
        };
        tree.node_mut(id).set(prop, Value::StrList(items));
    }
    tracing::debug!(prop, leaves_with_domains = hits, "domains annotated");
    Ok(hits)
}

/// Decode a stored architecture; the absence token yields an empty list.
pub fn parse_domains(value: &Value) -> Result<Vec<Domain>> {
    let items: Vec<&str> = match value {
        Value::StrList(items) => items.iter().map(String::as_str).collect(),
        Value::Str(s) => vec![s.as_str()],
        Value::Missing => Vec::new(),
        other => {
            return Err(Error::TypeError {
                expected: "domain architecture".into(),
                got: other.type_name().to_string(),
            })
        }
    };
    items.into_iter().filter(|s| *s != NO_DOMAIN).map(str::parse::<Domain>).collect()
}

pub fn domain_prop2type(prop: &str) -> Prop2Type {
    Prop2Type::from([(prop.to_string(), PropType::MultiCategorical)])
}
