//! # Taxon Annotator
//!
//! Lineage enrichment and speciation/duplication calls.
//!
//! The resolver behind it is opaque: anything implementing
//! [`TaxonomyResolver`] may stamp `taxid`, `sci_name`, `rank`, `lineage` and
//! `named_lineage` onto the tree. The annotator then fills names, evoltype
//! calls, per-node `lca` and the `rank2values` table.
//!
//! ## Implementations
//!
//! | Resolver | Module | Description |
//! |----------|--------|-------------|
//! | `InMemoryTaxonomy` | `memory` | Table-backed, for embedding and tests |

pub mod memory;

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::{NodeId, Prop2Type, PropType, Tree, Value};
use crate::summary::counter::PAIR_SEP;
use crate::{Error, Result};

pub use memory::{InMemoryTaxonomy, TaxonRecord};

// ============================================================================
// Property names
// ============================================================================

pub const TAXID: &str = "taxid";
pub const SCI_NAME: &str = "sci_name";
pub const RANK: &str = "rank";
pub const LINEAGE: &str = "lineage";
pub const NAMED_LINEAGE: &str = "named_lineage";
pub const EVOLTYPE: &str = "evoltype";
pub const DUP_SP: &str = "dup_sp";
pub const DUP_PERCENT: &str = "dup_percent";
pub const LCA: &str = "lca";

/// Rank reported for taxa the resolver cannot place.
pub const NO_RANK: &str = "no rank";

// ============================================================================
// Resolver trait
// ============================================================================

/// The taxonomy collaborator.
///
/// Failures should be reported as [`Error::External`] with the collaborator's
/// message unchanged.
pub trait TaxonomyResolver {
    /// Stamp taxonomic properties on every node. Leaves read their taxon id
    /// from `taxid_attr` (`"name"` means the node name).
    fn annotate(&self, tree: &mut Tree, taxid_attr: &str) -> Result<()>;

    /// Rank of `taxid`, if the taxon is known.
    fn rank_of(&self, taxid: &str) -> Option<String>;
}

// ============================================================================
// Options and report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyOptions {
    /// Leaf property holding the taxon id; `"name"` reads the node name.
    pub taxid_attr: String,
    /// Fail with a topology error on non-bifurcating internal nodes instead
    /// of skipping them during evoltype detection.
    pub strict_binary: bool,
}

impl Default for TaxonomyOptions {
    fn default() -> Self {
        Self { taxid_attr: "name".to_string(), strict_binary: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxonomyReport {
    /// Rank → every scientific name observed at that rank (duplicates kept).
    pub rank2values: BTreeMap<String, Vec<String>>,
    pub speciations: usize,
    pub duplications: usize,
}

/// Types of the properties this module writes.
pub fn taxonomy_prop2type() -> Prop2Type {
    Prop2Type::from([
        (TAXID.to_string(), PropType::Taxon),
        (SCI_NAME.to_string(), PropType::Categorical),
        (RANK.to_string(), PropType::Categorical),
        (LINEAGE.to_string(), PropType::MultiCategorical),
        (NAMED_LINEAGE.to_string(), PropType::MultiCategorical),
        (EVOLTYPE.to_string(), PropType::Categorical),
        (DUP_SP.to_string(), PropType::Categorical),
        (DUP_PERCENT.to_string(), PropType::Numeric),
        (LCA.to_string(), PropType::MultiCategorical),
    ])
}

// ============================================================================
// Annotation
// ============================================================================

/// Run the resolver, then add names, `lca`, evoltype calls and `rank2values`.
pub fn annotate_taxa(
    tree: &mut Tree,
    resolver: &dyn TaxonomyResolver,
    opts: &TaxonomyOptions,
) -> Result<TaxonomyReport> {
    resolver.annotate(tree, &opts.taxid_attr)?;
    fill_names(tree);
    stamp_lca(tree, resolver);
    let mut report = detect_evoltypes(tree, opts.strict_binary)?;
    report.rank2values = rank2values(tree);
    tracing::info!(
        ranks = report.rank2values.len(),
        speciations = report.speciations,
        duplications = report.duplications,
        "taxonomy annotated"
    );
    Ok(report)
}

fn fill_names(tree: &mut Tree) {
    for (idx, id) in tree.postorder().into_iter().enumerate() {
        let node = tree.node_mut(id);
        if !node.name.trim().is_empty() {
            continue;
        }
        node.name = match node.get(SCI_NAME).and_then(Value::as_str) {
            Some(sci) if !sci.is_empty() => sci.to_string(),
            _ => format!("N{idx}"),
        };
    }
}

fn stamp_lca(tree: &mut Tree, resolver: &dyn TaxonomyResolver) {
    for id in tree.preorder() {
        if tree.is_leaf(id) {
            continue;
        }
        let node = tree.node(id);
        let (Some(Value::StrList(taxids)), Some(Value::StrList(names))) =
            (node.get(LINEAGE), node.get(NAMED_LINEAGE))
        else {
            continue;
        };
        let lca: Vec<String> = taxids
            .iter()
            .zip(names)
            .filter_map(|(taxid, name)| match resolver.rank_of(taxid) {
                Some(rank) if rank != NO_RANK => Some(format!("{rank}{PAIR_SEP}{name}")),
                _ => None,
            })
            .collect();
        tree.node_mut(id).set(LCA, Value::StrList(lca));
    }
}

/// Look up `rank` in a node's `lca` entries.
pub fn lca_at_rank<'a>(lca: &'a Value, rank: &str) -> Option<&'a str> {
    let Value::StrList(entries) = lca else { return None };
    entries.iter().find_map(|e| {
        let (r, name) = e.split_once(PAIR_SEP)?;
        (r == rank).then_some(name)
    })
}

fn detect_evoltypes(tree: &mut Tree, strict: bool) -> Result<TaxonomyReport> {
    let mut report = TaxonomyReport::default();
    let mut species: HashMap<NodeId, BTreeSet<String>> = HashMap::new();

    for id in tree.postorder() {
        if tree.is_leaf(id) {
            let mut set = BTreeSet::new();
            if let Some(taxid) = tree.node(id).get(TAXID).filter(|v| !v.is_missing()) {
                set.insert(taxid.to_string());
            }
            species.insert(id, set);
            continue;
        }

        let children = tree.children(id).to_vec();
        let child_sets: Vec<BTreeSet<String>> = children
            .iter()
            .map(|c| species.remove(c).unwrap_or_default())
            .collect();

        if let [left, right] = child_sets.as_slice() {
            let shared: Vec<String> = left.intersection(right).cloned().collect();
            let all: BTreeSet<&String> = left.union(right).collect();
            let node = tree.node_mut(id);
            if shared.is_empty() {
                node.set(EVOLTYPE, "S");
                report.speciations += 1;
            } else {
                let pct = shared.len() as f64 / all.len() as f64 * 100.0;
                node.set(EVOLTYPE, "D");
                node.set(DUP_SP, shared.join(","));
                node.set(DUP_PERCENT, (pct * 1000.0).round() / 1000.0);
                report.duplications += 1;
            }
        } else if strict {
            return Err(Error::Topology(format!(
                "node '{}' has {} children; evoltype needs a bifurcating tree",
                tree.node(id).name,
                children.len()
            )));
        } else {
            tracing::debug!(node = %tree.node(id).name, "skipping evoltype on multifurcation");
        }

        let merged = child_sets.into_iter().fold(BTreeSet::new(), |mut acc, s| {
            acc.extend(s);
            acc
        });
        species.insert(id, merged);
    }
    Ok(report)
}

fn rank2values(tree: &Tree) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for id in tree.preorder() {
        let node = tree.node(id);
        if let (Some(Value::Str(rank)), Some(Value::Str(sci))) = (node.get(RANK), node.get(SCI_NAME)) {
            out.entry(rank.clone()).or_default().push(sci.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newick;

    fn taxonomy() -> InMemoryTaxonomy {
        let mut tax = InMemoryTaxonomy::new();
        tax.insert("1", "root", NO_RANK, None)
            .insert("2759", "Eukaryota", "superkingdom", Some("1"))
            .insert("9604", "Hominidae", "family", Some("2759"))
            .insert("9606", "Homo sapiens", "species", Some("9604"))
            .insert("9598", "Pan troglodytes", "species", Some("9604"))
            .insert("4932", "Saccharomyces cerevisiae", "species", Some("2759"));
        tax
    }

    #[test]
    fn test_speciation_and_duplication() {
        let mut t = newick::parse("((9606,9598)a,(9606,4932)b)Root;").unwrap();
        let report = annotate_taxa(&mut t, &taxonomy(), &TaxonomyOptions::default()).unwrap();
        let a = t.find_by_name("a").unwrap();
        assert_eq!(t.node(a).get(EVOLTYPE), Some(&Value::from("S")));
        let root = t.root();
        assert_eq!(t.node(root).get(EVOLTYPE), Some(&Value::from("D")));
        assert_eq!(t.node(root).get(DUP_SP), Some(&Value::from("9606")));
        // 1 shared out of {9606, 9598, 4932}
        assert_eq!(t.node(root).get(DUP_PERCENT), Some(&Value::Float(33.333)));
        assert_eq!(report.duplications, 1);
        assert_eq!(report.speciations, 2);
        assert_eq!(report.rank2values["species"].len(), 4);
    }

    #[test]
    fn test_lca_entries() {
        let mut t = newick::parse("((9606,9598)a,4932)Root;").unwrap();
        annotate_taxa(&mut t, &taxonomy(), &TaxonomyOptions::default()).unwrap();
        let a = t.find_by_name("a").unwrap();
        let lca = t.node(a).get(LCA).unwrap();
        assert_eq!(lca_at_rank(lca, "family"), Some("Hominidae"));
        assert_eq!(lca_at_rank(lca, "superkingdom"), Some("Eukaryota"));
        assert_eq!(lca_at_rank(lca, "species"), None);
    }

    #[test]
    fn test_strict_binary_rejects_polytomy() {
        let mut t = newick::parse("(9606,9598,4932)Root;").unwrap();
        let opts = TaxonomyOptions { strict_binary: true, ..Default::default() };
        let err = annotate_taxa(&mut t, &taxonomy(), &opts).unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
        let mut t = newick::parse("(9606,9598,4932)Root;").unwrap();
        assert!(annotate_taxa(&mut t, &taxonomy(), &TaxonomyOptions::default()).is_ok());
    }

    #[test]
    fn test_unnamed_internal_takes_sci_name() {
        let mut t = newick::parse("((9606,9598),4932)Root;").unwrap();
        annotate_taxa(&mut t, &taxonomy(), &TaxonomyOptions::default()).unwrap();
        let root = t.root();
        let inner = t.children(root)[0];
        assert_eq!(t.node(inner).name, "Hominidae");
    }
}
