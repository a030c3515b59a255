//! Mergeable numeric statistics.

use serde::{Deserialize, Serialize};

/// One numeric summary and its property suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericStat {
    Avg,
    Sum,
    Max,
    Min,
    Std,
}

impl NumericStat {
    pub const ALL: [NumericStat; 5] =
        [NumericStat::Avg, NumericStat::Sum, NumericStat::Max, NumericStat::Min, NumericStat::Std];

    pub fn suffix(&self) -> &'static str {
        match self {
            NumericStat::Avg => "avg",
            NumericStat::Sum => "sum",
            NumericStat::Max => "max",
            NumericStat::Min => "min",
            NumericStat::Std => "std",
        }
    }
}

/// Running count / sum / mean / M2 / extrema over non-NaN samples.
///
/// Merging two accumulators yields the same statistics as feeding every
/// sample into one, so clade results depend only on the leaf multiset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericAccumulator {
    n: u64,
    sum: f64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for NumericAccumulator {
    fn default() -> Self {
        Self {
            n: 0,
            sum: 0.0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl NumericAccumulator {
    pub fn push(&mut self, x: f64) {
        if x.is_nan() {
            return;
        }
        self.merge(&NumericAccumulator {
            n: 1,
            sum: x,
            mean: x,
            m2: 0.0,
            min: x,
            max: x,
        });
    }

    pub fn merge(&mut self, other: &NumericAccumulator) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = *other;
            return;
        }
        let n = self.n + other.n;
        let delta = other.mean - self.mean;
        self.mean += delta * other.n as f64 / n as f64;
        self.m2 += other.m2 + delta * delta * (self.n as f64 * other.n as f64) / n as f64;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.n = n;
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    /// Value of `stat`, or `None` when no sample was seen.
    pub fn get(&self, stat: NumericStat) -> Option<f64> {
        if self.n == 0 {
            return None;
        }
        Some(match stat {
            NumericStat::Avg => self.mean,
            NumericStat::Sum => self.sum,
            NumericStat::Max => self.max,
            NumericStat::Min => self.min,
            // Population deviation; a single sample gives 0.
            NumericStat::Std => (self.m2 / self.n as f64).max(0.0).sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats() {
        let mut acc = NumericAccumulator::default();
        for x in [3.0, 4.0, f64::NAN] {
            acc.push(x);
        }
        assert_eq!(acc.get(NumericStat::Avg), Some(3.5));
        assert_eq!(acc.get(NumericStat::Sum), Some(7.0));
        assert_eq!(acc.get(NumericStat::Max), Some(4.0));
        assert_eq!(acc.get(NumericStat::Min), Some(3.0));
        assert_eq!(acc.get(NumericStat::Std), Some(0.5));
    }

    #[test]
    fn test_empty_and_single() {
        let mut acc = NumericAccumulator::default();
        assert_eq!(acc.get(NumericStat::Avg), None);
        acc.push(f64::NAN);
        assert_eq!(acc.get(NumericStat::Sum), None);
        acc.push(2.0);
        assert_eq!(acc.get(NumericStat::Std), Some(0.0));
    }

    #[test]
    fn test_merge_matches_sequential() {
        let xs = [1.0, 2.0, 3.0, 4.0, 10.0];
        let mut seq = NumericAccumulator::default();
        xs.iter().for_each(|x| seq.push(*x));
        let mut left = NumericAccumulator::default();
        let mut right = NumericAccumulator::default();
        xs[..2].iter().for_each(|x| left.push(*x));
        xs[2..].iter().for_each(|x| right.push(*x));
        left.merge(&right);
        for stat in NumericStat::ALL {
            let (a, b) = (seq.get(stat).unwrap(), left.get(stat).unwrap());
            assert!((a - b).abs() < 1e-12, "{stat:?}: {a} vs {b}");
        }
    }
}
