//! Postorder summarizer.
//!
//! One pass over the tree builds a mergeable accumulator per clade and writes
//! the derived properties (`p_counter`, `p_avg`, ..., `p_consensus`) onto
//! every internal node. Accumulators only ever combine leaf samples, so a
//! node's output depends on its leaf multiset and not on tree shape.

pub mod consensus;
pub mod counter;
pub mod numeric;

pub use consensus::ColumnCounts;
pub use counter::{Counter, CounterMap, CounterPolicy};
pub use numeric::{NumericAccumulator, NumericStat};

use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::{NodeId, Prop2Type, PropType, Tree, Value, MISSING};
use crate::{Error, Result};

/// Suffix of the derived counter property.
pub const COUNTER_SUFFIX: &str = "counter";
/// Suffix of the derived consensus property.
pub const CONSENSUS_SUFFIX: &str = "consensus";

/// Summarizer policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    pub counter: CounterPolicy,
    /// Numeric stats to emit; empty disables numeric summaries.
    pub numeric: Vec<NumericStat>,
    pub consensus_threshold: f64,
    pub gap: char,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            counter: CounterPolicy::Raw,
            numeric: NumericStat::ALL.to_vec(),
            consensus_threshold: consensus::DEFAULT_THRESHOLD,
            gap: consensus::GAP,
        }
    }
}

/// What a summary pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryStats {
    pub internal_nodes: usize,
    /// Types of every derived property written.
    pub derived: Prop2Type,
}

pub fn derived_name(prop: &str, suffix: &str) -> String {
    format!("{prop}_{suffix}")
}

// ============================================================================
// Clade accumulator
// ============================================================================

#[derive(Debug, Default)]
struct CladeAcc {
    counters: HashMap<String, Counter>,
    numeric: HashMap<String, NumericAccumulator>,
    lists: HashMap<String, Vec<NumericAccumulator>>,
    columns: HashMap<String, ColumnCounts>,
}

impl CladeAcc {
    fn from_leaf(tree: &Tree, leaf: NodeId, prop2type: &Prop2Type) -> Result<Self> {
        let node = tree.node(leaf);
        let mut acc = CladeAcc::default();
        for (prop, ptype) in prop2type {
            let value = node.get(prop);
            match ptype {
                t if t.is_counted() => {
                    let counter = acc.counters.entry(prop.clone()).or_default();
                    match value {
                        Some(v) if !v.is_missing() => {
                            for key in v.category_keys() {
                                counter.add(key, 1);
                            }
                        }
                        _ => counter.add(MISSING, 1),
                    }
                }
                PropType::Numeric => {
                    let stat = acc.numeric.entry(prop.clone()).or_default();
                    if let Some(x) = numeric_sample(prop, value)? {
                        stat.push(x);
                    }
                }
                PropType::ListNumeric => {
                    let items = match value {
                        Some(Value::FloatList(items)) => items.as_slice(),
                        None | Some(Value::Missing) => &[],
                        Some(other) => {
                            return Err(Error::TypeError {
                                expected: format!("list_numeric value for '{prop}'"),
                                got: other.type_name().to_string(),
                            });
                        }
                    };
                    let slots: Vec<NumericAccumulator> = items
                        .iter()
                        .map(|x| {
                            let mut a = NumericAccumulator::default();
                            a.push(*x);
                            a
                        })
                        .collect();
                    acc.lists.insert(prop.clone(), slots);
                }
                PropType::Alignment => {
                    if let Some(Value::Seq(seq)) = value {
                        acc.columns.insert(prop.clone(), ColumnCounts::from_sequence(seq));
                    }
                }
                _ => {}
            }
        }
        Ok(acc)
    }

    fn merge(&mut self, other: CladeAcc) -> Result<()> {
        for (prop, c) in other.counters {
            self.counters.entry(prop).or_default().merge(&c);
        }
        for (prop, n) in other.numeric {
            self.numeric.entry(prop).or_default().merge(&n);
        }
        for (prop, slots) in other.lists {
            let mine = self.lists.entry(prop).or_default();
            if mine.len() < slots.len() {
                mine.resize(slots.len(), NumericAccumulator::default());
            }
            for (m, s) in mine.iter_mut().zip(&slots) {
                m.merge(s);
            }
        }
        for (prop, cols) in other.columns {
            match self.columns.get_mut(&prop) {
                Some(mine) => mine.merge(&cols)?,
                None => {
                    self.columns.insert(prop, cols);
                }
            }
        }
        Ok(())
    }
}

fn numeric_sample(prop: &str, value: Option<&Value>) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Missing) => Ok(None),
        Some(Value::Float(f)) => Ok((!f.is_nan()).then_some(*f)),
        Some(Value::Str(s)) if s == MISSING => Ok(None),
        Some(v @ Value::Str(s)) => match s.trim().parse::<f64>() {
            Ok(f) => Ok((!f.is_nan()).then_some(f)),
            Err(_) => Err(Error::TypeError {
                expected: format!("numeric value for '{prop}'"),
                got: v.to_string(),
            }),
        },
        Some(other) => Err(Error::TypeError {
            expected: format!("numeric value for '{prop}'"),
            got: other.type_name().to_string(),
        }),
    }
}

// ============================================================================
// Pass
// ============================================================================

/// Summarize every internal node of `tree` from its leaves.
///
/// `cancel` is polled between nodes; a raised flag aborts with
/// [`Error::Cancelled`] and leaves the tree partially annotated.
pub fn summarize(
    tree: &mut Tree,
    prop2type: &Prop2Type,
    opts: &SummaryOptions,
    cancel: Option<&AtomicBool>,
) -> Result<SummaryStats> {
    if prop2type.is_empty() {
        return Err(Error::NotAnnotated("no properties bound to summarize".into()));
    }

    let mut stats = SummaryStats::default();
    let mut pending: HashMap<NodeId, CladeAcc> = HashMap::new();

    for id in tree.postorder() {
        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            tracing::warn!(summarized = stats.internal_nodes, "summary cancelled");
            return Err(Error::Cancelled);
        }

        let acc = if tree.is_leaf(id) {
            CladeAcc::from_leaf(tree, id, prop2type)?
        } else {
            let mut acc = CladeAcc::default();
            for child in tree.children(id).to_vec() {
                if let Some(c) = pending.remove(&child) {
                    acc.merge(c)?;
                }
            }
            emit(tree, id, &acc, prop2type, opts, &mut stats.derived);
            stats.internal_nodes += 1;
            acc
        };
        pending.insert(id, acc);
    }

    tracing::info!(
        internal_nodes = stats.internal_nodes,
        derived = stats.derived.len(),
        "tree summarized"
    );
    Ok(stats)
}

fn emit(
    tree: &mut Tree,
    id: NodeId,
    acc: &CladeAcc,
    prop2type: &Prop2Type,
    opts: &SummaryOptions,
    derived: &mut Prop2Type,
) {
    let node = tree.node_mut(id);

    for (prop, counter) in &acc.counters {
        if let Some(wire) = counter.serialize(opts.counter) {
            let name = derived_name(prop, COUNTER_SUFFIX);
            node.set(name.clone(), Value::Str(wire));
            derived.insert(name, PropType::Categorical);
        }
    }

    for (prop, num) in &acc.numeric {
        for stat in &opts.numeric {
            if let Some(v) = num.get(*stat) {
                let name = derived_name(prop, stat.suffix());
                node.set(name.clone(), Value::Float(v));
                derived.insert(name, PropType::Numeric);
            }
        }
    }

    for (prop, slots) in &acc.lists {
        if slots.iter().all(|s| s.count() == 0) {
            continue;
        }
        for stat in &opts.numeric {
            let values: Vec<f64> = slots.iter().map(|s| s.get(*stat).unwrap_or(f64::NAN)).collect();
            let name = derived_name(prop, stat.suffix());
            node.set(name.clone(), Value::FloatList(values));
            derived.insert(name, PropType::ListNumeric);
        }
    }

    for (prop, cols) in &acc.columns {
        if prop2type.get(prop) != Some(&PropType::Alignment) {
            continue;
        }
        let name = derived_name(prop, CONSENSUS_SUFFIX);
        node.set(name.clone(), Value::Seq(cols.consensus(opts.consensus_threshold, opts.gap)));
        derived.insert(name, PropType::Alignment);
    }
}
