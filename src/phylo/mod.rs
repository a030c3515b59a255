//! # Phylogenetic signal
//!
//! | Analysis | Input | Output |
//! |----------|-------|--------|
//! | Lineage specificity | binary leaf property | per-clade precision / sensitivity / F1, marked clades |
//! | Delta | categorical leaf property | δ statistic, optional permutation p-value |
//!
//! Ancestral reconstruction sits behind [`ACREngine`]; [`LeafFrequencyEngine`]
//! is the in-process reference.

pub mod acr;
pub mod delta;
pub mod ls;

pub use acr::{leaf_states, ACREngine, LeafFrequencyEngine, Marginals};
pub use delta::{delta, delta_for_trait, entropies, ln_gamma, DeltaOptions, DeltaResult, EntropyMode};
pub use ls::{lineage_prop2type, lineage_specificity, CladeScore, LineageOptions, LineageReport};

/// Root property holding δ for `prop`.
pub fn delta_prop(prop: &str) -> String {
    format!("{prop}_delta")
}

/// Root property holding the δ p-value for `prop`.
pub fn pvalue_prop(prop: &str) -> String {
    format!("{prop}_pval")
}
