//! Raw metadata tables: tab- or comma-separated, first column is the node key.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How rows are read from one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Treat the first line as data and name columns `col0..colN`.
    pub no_header: bool,
    /// Field separator; detected from the first line when unset.
    pub delimiter: Option<char>,
}

/// One table as read from disk, values still raw strings.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataTable {
    /// Header of the key column (`col0` in no-header mode).
    pub key_column: String,
    /// Property column names, in file order.
    pub columns: Vec<String>,
    /// `(key, values)` per row; `values` is aligned with `columns`.
    pub rows: Vec<(String, Vec<String>)>,
}

impl MetadataTable {
    pub fn from_path(path: impl AsRef<Path>, opts: &ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::InputValidation(format!("cannot open metadata '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(file), opts)
    }

    pub fn parse_str(text: &str, opts: &ReadOptions) -> Result<Self> {
        Self::from_reader(text.as_bytes(), opts)
    }

    pub fn from_reader<R: BufRead>(reader: R, opts: &ReadOptions) -> Result<Self> {
        let mut lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim_end_matches(['\r', '\n']);
            // `##` lines are comments; a single `#` may prefix the header.
            if trimmed.trim().is_empty() || trimmed.starts_with("##") {
                continue;
            }
            lines.push(trimmed.to_string());
        }
        let first = lines
            .first()
            .ok_or_else(|| Error::InputValidation("metadata table is empty".into()))?;
        let delimiter = opts.delimiter.unwrap_or_else(|| detect_delimiter(first));

        let mut iter = lines.iter();
        let (key_column, columns, width) = if opts.no_header {
            let width = split_fields(first, delimiter).len();
            let columns = (1..width).map(|i| format!("col{i}")).collect();
            ("col0".to_string(), columns, width)
        } else {
            let header = split_fields(iter.next().map(String::as_str).unwrap_or_default(), delimiter);
            let header: Vec<String> = header
                .into_iter()
                .map(|h| h.trim().trim_start_matches('#').to_string())
                .collect();
            if header.len() < 2 {
                return Err(Error::InputValidation(
                    "metadata header needs a key column and at least one property".into(),
                ));
            }
            let width = header.len();
            (header[0].clone(), header[1..].to_vec(), width)
        };

        let mut rows = Vec::new();
        for (lineno, line) in iter.enumerate() {
            let mut fields = split_fields(line, delimiter);
            if fields.len() > width {
                return Err(Error::InputValidation(format!(
                    "row {} has {} fields, header has {width}",
                    lineno + 1,
                    fields.len()
                )));
            }
            fields.resize(width, String::new());
            let key = fields.remove(0).trim().to_string();
            rows.push((key, fields));
        }

        tracing::debug!(columns = columns.len(), rows = rows.len(), "read metadata table");
        Ok(Self { key_column, columns, rows })
    }
}

/// Tab wins when present on the first line, comma otherwise.
pub(crate) fn detect_delimiter(line: &str) -> char {
    if line.contains('\t') { '\t' } else if line.contains(',') { ',' } else { '\t' }
}

/// Split one line, honouring double-quoted fields (`""` escapes a quote).
pub(crate) fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' if in_quotes => in_quotes = false,
            '"' if cur.trim().is_empty() => {
                cur.clear();
                in_quotes = true;
            }
            c if c == delimiter && !in_quotes => fields.push(std::mem::take(&mut cur)),
            c => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}
