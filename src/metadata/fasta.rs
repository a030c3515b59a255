//! FASTA alignment sources, read with `bio`.

use std::io::BufRead;

use bio::io::fasta;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Header up to the first whitespace.
    pub name: String,
    pub seq: String,
}

/// Read every record; sequence lines are concatenated with whitespace removed.
pub fn parse_fasta<R: BufRead>(reader: R) -> Result<Vec<FastaRecord>> {
    let mut records = Vec::new();
    for (i, record) in fasta::Reader::new(reader).records().enumerate() {
        let record = record
            .map_err(|e| Error::InputValidation(format!("FASTA record {}: {e}", i + 1)))?;
        let seq = String::from_utf8_lossy(record.seq())
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        records.push(FastaRecord { name: record.id().to_string(), seq });
    }
    Ok(records)
}
