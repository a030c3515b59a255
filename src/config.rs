//! Run configuration for the annotation pipeline.
//!
//! Every section has the defaults of its module; a JSON document only needs
//! the fields it changes:
//!
//! ```json
//! { "summary": { "counter": "relative" }, "lineage_props": ["is_vowel"] }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::DOMAIN_PROP;
use crate::metadata::{BindOptions, MetadataOptions};
use crate::phylo::{DeltaOptions, LineageOptions};
use crate::summary::SummaryOptions;
use crate::taxonomy::TaxonomyOptions;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    pub metadata: MetadataOptions,
    pub bind: BindOptions,
    pub summary: SummaryOptions,
    pub taxonomy: TaxonomyOptions,
    pub lineage: LineageOptions,
    pub delta: DeltaOptions,
    /// Boolean properties scored for lineage specificity.
    pub lineage_props: Vec<String>,
    /// Categorical properties scored with the delta statistic.
    pub delta_props: Vec<String>,
    /// Property receiving domain architectures; defaults to `dom_arq`.
    pub domain_prop: Option<String>,
}

impl AnnotateConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Serialization(format!("config: {e}")))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn domain_prop(&self) -> &str {
        self.domain_prop.as_deref().unwrap_or(DOMAIN_PROP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::CounterPolicy;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = AnnotateConfig::from_json_str(
            r#"{ "summary": { "counter": "relative" }, "delta": { "seed": 7 }, "lineage_props": ["b"] }"#,
        )
        .unwrap();
        assert_eq!(cfg.summary.counter, CounterPolicy::Relative);
        assert_eq!(cfg.summary.consensus_threshold, 0.7);
        assert_eq!(cfg.delta.seed, 7);
        assert_eq!(cfg.delta.sim, 10_000);
        assert_eq!(cfg.lineage.precision_cutoff, 0.95);
        assert_eq!(cfg.lineage_props, ["b"]);
        assert_eq!(cfg.domain_prop(), "dom_arq");
        assert_eq!(cfg.taxonomy.taxid_attr, "name");
    }

    #[test]
    fn test_json_round_trip_and_errors() {
        let cfg = AnnotateConfig::default();
        assert_eq!(AnnotateConfig::from_json_str(&cfg.to_json_string().unwrap()).unwrap(), cfg);
        assert!(matches!(AnnotateConfig::from_json_str("{ nope"), Err(Error::Serialization(_))));
    }
}
