//! In-memory taxonomy resolver.
//!
//! This is the reference implementation of `TaxonomyResolver`: a plain
//! taxid → (name, rank, parent) table.
//!
//! ## Limitations
//!
//! - **No synonyms or merged ids**: an unknown taxid is an error.
//! - **Internal nodes get the LCA of their leaves**, never a taxon of their
//!   own. Leaves without a taxid do not take part.

use std::io::BufRead;

use hashbrown::HashMap;

use super::{TaxonomyResolver, LINEAGE, NAMED_LINEAGE, RANK, SCI_NAME, TAXID};
use crate::model::{NodeId, Tree, Value};
use crate::{Error, Result};

/// One taxon of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonRecord {
    pub name: String,
    pub rank: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTaxonomy {
    taxa: HashMap<String, TaxonRecord>,
}

impl InMemoryTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, taxid: &str, name: &str, rank: &str, parent: Option<&str>) -> &mut Self {
        self.taxa.insert(
            taxid.to_string(),
            TaxonRecord {
                name: name.to_string(),
                rank: rank.to_string(),
                parent: parent.map(str::to_string),
            },
        );
        self
    }

    /// Load a `taxid<TAB>parent<TAB>rank<TAB>name` table. An empty parent,
    /// or a parent equal to the taxid, marks a root.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut tax = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let [taxid, parent, rank, name] = fields.as_slice() else {
                return Err(Error::InputValidation(format!(
                    "taxonomy line {} needs 4 tab-separated fields, found {}",
                    lineno + 1,
                    fields.len()
                )));
            };
            let parent = (!parent.is_empty() && parent != taxid).then_some(*parent);
            tax.insert(taxid, name, rank, parent);
        }
        Ok(tax)
    }

    pub fn get(&self, taxid: &str) -> Option<&TaxonRecord> {
        self.taxa.get(taxid)
    }

    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }

    /// Taxids from the root down to `taxid` inclusive.
    pub fn lineage(&self, taxid: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut cur = Some(taxid.to_string());
        while let Some(id) = cur {
            let rec = self
                .taxa
                .get(&id)
                .ok_or_else(|| Error::External(format!("taxid '{id}' not found in taxonomy")))?;
            out.push(id);
            if out.len() > self.taxa.len() {
                return Err(Error::External(format!("cycle in lineage of taxid '{taxid}'")));
            }
            cur = rec.parent.clone();
        }
        out.reverse();
        Ok(out)
    }

    fn stamp(&self, tree: &mut Tree, id: NodeId, lineage: &[String]) {
        let Some(taxid) = lineage.last() else { return };
        let Some(rec) = self.taxa.get(taxid) else { return };
        let names: Vec<String> = lineage
            .iter()
            .map(|t| self.taxa.get(t).map(|r| r.name.clone()).unwrap_or_default())
            .collect();
        let node = tree.node_mut(id);
        node.set(TAXID, taxid.as_str());
        node.set(SCI_NAME, rec.name.as_str());
        node.set(RANK, rec.rank.as_str());
        node.set(LINEAGE, Value::StrList(lineage.to_vec()));
        node.set(NAMED_LINEAGE, Value::StrList(names));
    }
}

fn leaf_taxid(tree: &Tree, id: NodeId, attr: &str) -> Option<String> {
    let node = tree.node(id);
    let raw = if attr == "name" {
        node.name.clone()
    } else {
        node.get(attr).filter(|v| !v.is_missing())?.to_string()
    };
    let raw = raw.trim().to_string();
    (!raw.is_empty()).then_some(raw)
}

impl TaxonomyResolver for InMemoryTaxonomy {
    fn annotate(&self, tree: &mut Tree, taxid_attr: &str) -> Result<()> {
        let mut lineages: HashMap<NodeId, Vec<String>> = HashMap::new();
        let mut unresolved = 0usize;

        for id in tree.postorder() {
            let lineage = if tree.is_leaf(id) {
                match leaf_taxid(tree, id, taxid_attr) {
                    Some(taxid) => self.lineage(&taxid)?,
                    None => {
                        unresolved += 1;
                        continue;
                    }
                }
            } else {
                let mut prefix: Option<Vec<String>> = None;
                for child in tree.children(id) {
                    let Some(l) = lineages.remove(child) else { continue };
                    prefix = Some(match prefix {
                        None => l,
                        Some(p) => p.into_iter().zip(l).take_while(|(a, b)| a == b).map(|(a, _)| a).collect(),
                    });
                }
                match prefix {
                    Some(p) if !p.is_empty() => p,
                    _ => continue,
                }
            };
            self.stamp(tree, id, &lineage);
            lineages.insert(id, lineage);
        }

        if unresolved > 0 {
            tracing::warn!(leaves = unresolved, attr = taxid_attr, "leaves without a taxid");
        }
        Ok(())
    }

    fn rank_of(&self, taxid: &str) -> Option<String> {
        self.taxa.get(taxid).map(|r| r.rank.clone())
    }
}
