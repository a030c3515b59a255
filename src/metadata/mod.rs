//! # Metadata
//!
//! Turns one or more raw tables into a typed, key-indexed metadata set
//! (type inference, missing-value normalization, duplicate handling) and
//! binds it onto tree leaves.

pub mod binder;
pub mod fasta;
pub mod infer;
pub mod table;

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::{Prop2Type, PropType};
use crate::Result;

pub use binder::{bind, bind_alignment, BindOptions, BindStats};
pub use fasta::{parse_fasta, FastaRecord};
pub use infer::{infer_type, is_missing_raw, TypeOverrides};
pub use table::{MetadataTable, ReadOptions};

/// What to do when a key appears on more than one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Later rows overwrite earlier ones, per property.
    #[default]
    LastWriteWins,
    /// Values of all rows are joined with `,` per property.
    Aggregate,
}

/// Options for turning tables into `Metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataOptions {
    pub read: ReadOptions,
    pub duplicates: DuplicatePolicy,
    pub overrides: TypeOverrides,
}

/// Typed metadata ready for binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Property columns in first-seen order across tables.
    pub columns: Vec<String>,
    /// key → property → normalized raw value (`"NaN"` when missing).
    pub rows: BTreeMap<String, HashMap<String, String>>,
    /// Declared type of every column.
    pub prop2type: Prop2Type,
}

impl Metadata {
    /// Merge `tables`, normalize missing values, infer and override types.
    pub fn from_tables(tables: &[MetadataTable], opts: &MetadataOptions) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut rows: BTreeMap<String, HashMap<String, String>> = BTreeMap::new();
        // Every raw cell per column, duplicates included; inference reads these.
        let mut cells: HashMap<String, Vec<String>> = HashMap::new();

        for table in tables {
            for col in &table.columns {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
            for (key, values) in &table.rows {
                let row = rows.entry(key.clone()).or_default();
                for (col, raw) in table.columns.iter().zip(values) {
                    let value = infer::normalize_missing(raw);
                    cells.entry(col.clone()).or_default().push(value.clone());
                    if opts.duplicates == DuplicatePolicy::Aggregate {
                        if let Some(existing) = row.get_mut(col) {
                            existing.push(',');
                            existing.push_str(&value);
                            continue;
                        }
                    }
                    row.insert(col.clone(), value);
                }
            }
        }

        let mut prop2type = Prop2Type::new();
        for col in &columns {
            let raw = cells.get(col.as_str()).into_iter().flatten().map(String::as_str);
            let ptype = if opts.duplicates == DuplicatePolicy::Aggregate {
                // Joined duplicates carry `,`, which the bound values must reflect.
                infer_type(raw.chain(rows.values().filter_map(|r| r.get(col)).map(String::as_str)))
            } else {
                infer_type(raw)
            };
            prop2type.insert(col.clone(), ptype);
        }
        for (col, ptype) in opts.overrides.resolve(&columns)? {
            prop2type.insert(col, ptype);
        }

        for (col, ptype) in &prop2type {
            tracing::debug!(column = %col, r#type = %ptype, "inferred column type");
        }
        tracing::info!(columns = columns.len(), keys = rows.len(), "metadata loaded");
        Ok(Self { columns, rows, prop2type })
    }

    pub fn column_type(&self, column: &str) -> Option<PropType> {
        self.prop2type.get(column).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> MetadataTable {
        MetadataTable::parse_str(text, &ReadOptions::default()).unwrap()
    }

    #[test]
    fn test_last_write_wins() {
        let md = Metadata::from_tables(
            &[table("k\tv\nA\tx\nA\ty\n")],
            &MetadataOptions::default(),
        )
        .unwrap();
        assert_eq!(md.rows["A"]["v"], "y");
        assert_eq!(md.column_type("v"), Some(PropType::Categorical));
    }

    #[test]
    fn test_type_sees_overwritten_rows() {
        let md = Metadata::from_tables(
            &[table("k\tflag\nA\t1\nA\tmaybe\nB\tno\n")],
            &MetadataOptions::default(),
        )
        .unwrap();
        assert_eq!(md.rows["A"]["flag"], "maybe");
        assert_eq!(md.column_type("flag"), Some(PropType::Categorical));

        let md = Metadata::from_tables(
            &[table("k\tn\nA\tabc\nA\t2.5\n")],
            &MetadataOptions::default(),
        )
        .unwrap();
        assert_eq!(md.rows["A"]["n"], "2.5");
        assert_eq!(md.column_type("n"), Some(PropType::Categorical));
    }

    #[test]
    fn test_aggregate_duplicates() {
        let opts = MetadataOptions { duplicates: DuplicatePolicy::Aggregate, ..Default::default() };
        let md = Metadata::from_tables(&[table("k\tv\nA\tx\nA\ty\n")], &opts).unwrap();
        assert_eq!(md.rows["A"]["v"], "x,y");
        assert_eq!(md.column_type("v"), Some(PropType::MultiCategorical));
    }

    #[test]
    fn test_missing_normalized() {
        let md = Metadata::from_tables(&[table("k\tn\nA\t1\nB\tnone\nC\t-\n")], &MetadataOptions::default())
            .unwrap();
        assert_eq!(md.rows["B"]["n"], "NaN");
        assert_eq!(md.rows["C"]["n"], "NaN");
        assert_eq!(md.column_type("n"), Some(PropType::Numeric));
    }

    #[test]
    fn test_override_by_index_and_unknown() {
        let mut opts = MetadataOptions::default();
        opts.overrides.categorical = vec!["1".into()];
        let md = Metadata::from_tables(&[table("k\tn\nA\t1\n")], &opts).unwrap();
        assert_eq!(md.column_type("n"), Some(PropType::Categorical));

        opts.overrides.categorical = vec!["missing_col".into()];
        assert!(Metadata::from_tables(&[table("k\tn\nA\t1\n")], &opts).is_err());
    }

    #[test]
    fn test_multiple_tables_merge() {
        let md = Metadata::from_tables(
            &[table("k\ta\nA\t1\n"), table("k\tb\nA\tx\nB\ty\n")],
            &MetadataOptions::default(),
        )
        .unwrap();
        assert_eq!(md.columns, ["a", "b"]);
        assert_eq!(md.rows["A"]["b"], "x");
        assert!(!md.rows["B"].contains_key("a"));
    }
}
