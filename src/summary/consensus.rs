//! Column-wise plurality consensus over aligned sequences.

use smallvec::SmallVec;

use crate::{Error, Result};

/// Default plurality threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.7;
/// Symbol emitted for ties and below-threshold columns.
pub const GAP: char = '-';

/// Per-column symbol counts for a set of equal-length sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnCounts {
    sequences: u32,
    columns: Vec<SmallVec<[(char, u32); 4]>>,
}

impl ColumnCounts {
    pub fn from_sequence(seq: &str) -> Self {
        Self {
            sequences: 1,
            columns: seq.chars().map(|c| SmallVec::from_elem((c, 1), 1)).collect(),
        }
    }

    pub fn sequences(&self) -> u32 {
        self.sequences
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn merge(&mut self, other: &ColumnCounts) -> Result<()> {
        if other.sequences == 0 {
            return Ok(());
        }
        if self.sequences == 0 {
            *self = other.clone();
            return Ok(());
        }
        if self.columns.len() != other.columns.len() {
            return Err(Error::InputValidation(format!(
                "alignment length mismatch: {} vs {} columns",
                self.columns.len(),
                other.columns.len()
            )));
        }
        for (mine, theirs) in self.columns.iter_mut().zip(&other.columns) {
            for (sym, n) in theirs {
                match mine.iter_mut().find(|(s, _)| s == sym) {
                    Some((_, count)) => *count += n,
                    None => mine.push((*sym, *n)),
                }
            }
        }
        self.sequences += other.sequences;
        Ok(())
    }

    /// Consensus string: a column keeps its most frequent symbol when that
    /// symbol is unique and its frequency reaches `threshold`; otherwise `gap`.
    pub fn consensus(&self, threshold: f64, gap: char) -> String {
        let total = self.sequences.max(1) as f64;
        self.columns
            .iter()
            .map(|col| {
                let best = col.iter().map(|(_, n)| *n).max().unwrap_or(0);
                let mut winners = col.iter().filter(|(_, n)| *n == best);
                match (winners.next(), winners.next()) {
                    (Some((sym, n)), None) if *n as f64 / total >= threshold => *sym,
                    _ => gap,
                }
            })
            .collect()
    }
}
