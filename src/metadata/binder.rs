//! Leaf binder: attach typed metadata values to matching leaves.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::{FastaRecord, Metadata};
use crate::model::{NodeId, PropType, Tree, Value, MISSING};
use crate::{Error, Result};

/// Coercion knobs for binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindOptions {
    /// Splits multi-categorical and list-numeric cells.
    pub multi_delimiter: String,
    /// When set, taxon cells are split on it and `taxa_field` is kept.
    pub taxon_delimiter: Option<String>,
    /// 0-based field index used with `taxon_delimiter`.
    pub taxa_field: usize,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            multi_delimiter: ",".to_string(),
            taxon_delimiter: None,
            taxa_field: 0,
        }
    }
}

/// Outcome of a bind pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindStats {
    /// Leaves that received at least one row.
    pub leaves_bound: usize,
    /// Metadata keys with no leaf of that name.
    pub keys_unmatched: usize,
}

/// Attach every metadata row to the leaves named by its key.
///
/// Leaves sharing a name all receive the same row; keys without a leaf are
/// skipped.
pub fn bind(tree: &mut Tree, metadata: &Metadata, opts: &BindOptions) -> Result<BindStats> {
    let by_name = leaves_by_name(tree);
    let mut stats = BindStats::default();

    for (key, row) in &metadata.rows {
        let Some(leaves) = by_name.get(key.as_str()) else {
            stats.keys_unmatched += 1;
            continue;
        };
        let mut typed = Vec::with_capacity(row.len());
        for (col, raw) in row {
            let ptype = metadata.column_type(col).ok_or_else(|| {
                Error::InputValidation(format!("column '{col}' has no declared type"))
            })?;
            typed.push((col.clone(), coerce(ptype, raw, opts)?));
        }
        for leaf in leaves {
            let node = tree.node_mut(*leaf);
            for (col, value) in &typed {
                node.props.insert(col.clone(), value.clone());
            }
        }
        stats.leaves_bound += leaves.len();
    }

    tracing::info!(
        leaves_bound = stats.leaves_bound,
        keys_unmatched = stats.keys_unmatched,
        "metadata bound to leaves"
    );
    Ok(stats)
}

fn coerce(ptype: PropType, raw: &str, opts: &BindOptions) -> Result<Value> {
    match ptype {
        PropType::Taxon => match &opts.taxon_delimiter {
            Some(delim) if raw != MISSING => {
                let field = raw.split(delim.as_str()).nth(opts.taxa_field).ok_or_else(|| {
                    Error::InputValidation(format!(
                        "taxon '{raw}' has no field {} when split on '{delim}'",
                        opts.taxa_field
                    ))
                })?;
                Ok(Value::Str(field.trim().to_string()))
            }
            _ => Ok(Value::Str(raw.to_string())),
        },
        other => Ok(other.coerce(raw, &opts.multi_delimiter)),
    }
}

/// Attach aligned sequences to leaves under `prop`.
///
/// All sequences that land on a leaf must share one length. Returns the
/// number of leaves that received a sequence.
pub fn bind_alignment(tree: &mut Tree, records: &[FastaRecord], prop: &str) -> Result<usize> {
    let by_name = leaves_by_name(tree);
    let mut width: Option<(usize, &str)> = None;
    let mut matched: Vec<(&FastaRecord, &Vec<NodeId>)> = Vec::new();

    for rec in records {
        let Some(leaves) = by_name.get(rec.name.as_str()) else { continue };
        let len = rec.seq.chars().count();
        match width {
            None => width = Some((len, rec.name.as_str())),
            Some((w, first)) if w != len => {
                return Err(Error::InputValidation(format!(
                    "alignment length mismatch: '{first}' has {w} columns, '{}' has {len}",
                    rec.name
                )));
            }
            _ => {}
        }
        matched.push((rec, leaves));
    }

    let mut bound = 0;
    for (rec, leaves) in matched {
        for leaf in leaves {
            tree.node_mut(*leaf).set(prop, Value::Seq(rec.seq.clone()));
            bound += 1;
        }
    }
    tracing::info!(prop, leaves = bound, "alignment bound to leaves");
    Ok(bound)
}

fn leaves_by_name(tree: &Tree) -> HashMap<String, Vec<NodeId>> {
    let mut map: HashMap<String, Vec<NodeId>> = HashMap::new();
    for leaf in tree.leaves() {
        map.entry(tree.node(leaf).name.clone()).or_default().push(leaf);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataOptions, MetadataTable, ReadOptions};
    use crate::newick;

    fn metadata(text: &str, opts: &MetadataOptions) -> Metadata {
        let table = MetadataTable::parse_str(text, &ReadOptions::default()).unwrap();
        Metadata::from_tables(&[table], opts).unwrap()
    }

    #[test]
    fn test_bind_typed_values() {
        let mut tree = newick::parse("(A,(B,C));").unwrap();
        let md = metadata(
            "name\tn\tflag\ttags\nA\t1.5\tyes\tx,y\nB\tnone\tno\tz\nZ\t3\tyes\tq\n",
            &MetadataOptions::default(),
        );
        let stats = bind(&mut tree, &md, &BindOptions::default()).unwrap();
        assert_eq!(stats, BindStats { leaves_bound: 2, keys_unmatched: 1 });

        let a = tree.find_by_name("A").unwrap();
        assert_eq!(tree.node(a).get("n"), Some(&Value::Float(1.5)));
        assert_eq!(tree.node(a).get("flag"), Some(&Value::Bool(true)));
        assert_eq!(tree.node(a).get("tags"), Some(&Value::StrList(vec!["x".into(), "y".into()])));

        let b = tree.find_by_name("B").unwrap();
        assert!(tree.node(b).get("n").unwrap().is_missing());
        let c = tree.find_by_name("C").unwrap();
        assert!(tree.node(c).props.is_empty());
    }

    #[test]
    fn test_duplicate_leaf_names_share_row() {
        let mut tree = newick::parse("(A,(A,B));").unwrap();
        let md = metadata("name\tv\nA\tx\n", &MetadataOptions::default());
        bind(&mut tree, &md, &BindOptions::default()).unwrap();
        let tagged = tree.leaves().into_iter().filter(|l| tree.node(*l).get("v").is_some()).count();
        assert_eq!(tagged, 2);
    }

    #[test]
    fn test_taxon_field_extraction() {
        let mut tree = newick::parse("(A,B);").unwrap();
        let mut mopts = MetadataOptions::default();
        mopts.overrides.taxon = vec!["sp".into()];
        let md = metadata("name\tsp\nA\t9606.ENSP1\n", &mopts);
        let opts = BindOptions { taxon_delimiter: Some(".".into()), ..Default::default() };
        bind(&mut tree, &md, &opts).unwrap();
        let a = tree.find_by_name("A").unwrap();
        assert_eq!(tree.node(a).get("sp"), Some(&Value::from("9606")));
    }

    #[test]
    fn test_alignment_length_mismatch() {
        let mut tree = newick::parse("(A,B);").unwrap();
        let recs = vec![
            FastaRecord { name: "A".into(), seq: "MAE".into() },
            FastaRecord { name: "B".into(), seq: "MA".into() },
        ];
        assert!(matches!(bind_alignment(&mut tree, &recs, "alignment"), Err(Error::InputValidation(_))));
        // Unmatched records do not take part in the length check.
        let recs = vec![
            FastaRecord { name: "A".into(), seq: "MAE".into() },
            FastaRecord { name: "Q".into(), seq: "M".into() },
        ];
        assert_eq!(bind_alignment(&mut tree, &recs, "alignment").unwrap(), 1);
    }
}
