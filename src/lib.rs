//! # treeprofiler: annotate phylogenetic trees with tabular metadata
//!
//! Binds per-leaf metadata of heterogeneous types onto a rooted tree,
//! summarizes it bottom-up on every internal node, and produces the
//! matrices, colours and decorations a renderer needs.
//!
//! ## Design Principles
//!
//! 1. **Typed columns**: every property carries a [`PropType`]; summaries and
//!    matrices dispatch on it, never on the raw text
//! 2. **Arena tree**: nodes live in one `Vec`, traversals use explicit stacks
//! 3. **Collaborators behind traits**: taxonomy, ancestral reconstruction and
//!    domain tables are injected ([`TaxonomyResolver`], [`ACREngine`],
//!    [`DomainSource`])
//! 4. **Owned results**: decorations and matrices are plain data keyed by
//!    [`NodeId`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use treeprofiler::{newick, AnnotateConfig, MetadataTable, Profiler, ReadOptions};
//!
//! # fn example() -> treeprofiler::Result<()> {
//! let mut tree = newick::parse("((A:1,B:1)I1:0.5,C:2)Root;")?;
//! let table = MetadataTable::parse_str("name\tcolor\nA\tred\nB\tblue\nC\tred\n", &ReadOptions::default())?;
//!
//! let report = Profiler::new(AnnotateConfig::default()).annotate(&mut tree, &[table])?;
//! assert!(report.prop2type.contains_key("color_counter"));
//! println!("{}", newick::to_nhx(&tree));
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! | Stage | Module | Writes |
//! |-------|--------|--------|
//! | Type inference, binding | [`metadata`] | leaf properties |
//! | Taxonomy | [`taxonomy`] | `taxid`, `sci_name`, `lca`, `evoltype`, ... |
//! | Summaries | [`summary`] | `p_counter`, `p_avg`, `p_consensus`, ... |
//! | Lineage specificity, delta | [`phylo`] | `b_prec`, `b_ls_clade`, root `p_delta` |

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod domain;
pub mod export;
pub mod matrix;
pub mod metadata;
pub mod model;
pub mod newick;
pub mod phylo;
pub mod query;
pub mod summary;
pub mod taxonomy;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{Node, NodeId, Prop2Type, PropType, PropertyMap, Tree, Value};

pub use config::AnnotateConfig;
pub use domain::{annotate_domains, Domain, DomainSource, InMemoryDomains};
pub use metadata::{BindStats, FastaRecord, Metadata, MetadataTable, ReadOptions};
pub use phylo::{ACREngine, DeltaResult, LeafFrequencyEngine, LineageReport};
pub use query::{Decoration, Predicate};
pub use summary::{summarize, CounterPolicy, NumericStat, SummaryOptions};
pub use taxonomy::{InMemoryTaxonomy, TaxonomyResolver};

// ============================================================================
// Pipeline
// ============================================================================

/// An analysis that failed without aborting the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub prop: String,
    pub analysis: String,
    pub message: String,
}

/// Everything [`Profiler::annotate`] learned besides what it wrote on the tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationReport {
    /// Types of every property now on the tree, source and derived.
    pub prop2type: Prop2Type,
    pub bind: Option<BindStats>,
    pub rank2values: BTreeMap<String, Vec<String>>,
    pub lineage: Vec<LineageReport>,
    pub delta: Vec<DeltaResult>,
    pub failures: Vec<Failure>,
}

/// Runs binding, taxonomy, summaries and phylogenetic signal over one tree.
///
/// Cancellation is cooperative: set the flag from [`Profiler::cancel_handle`]
/// and the run stops between nodes or between chains with
/// [`Error::Cancelled`], leaving the tree partially annotated.
pub struct Profiler<'a> {
    config: AnnotateConfig,
    taxonomy: Option<&'a dyn TaxonomyResolver>,
    acr: Option<&'a dyn ACREngine>,
    domains: Option<&'a dyn DomainSource>,
    alignment: Option<(String, &'a [FastaRecord])>,
    cancel: Arc<AtomicBool>,
}

impl<'a> Profiler<'a> {
    pub fn new(config: AnnotateConfig) -> Self {
        Self {
            config,
            taxonomy: None,
            acr: None,
            domains: None,
            alignment: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_taxonomy(mut self, resolver: &'a dyn TaxonomyResolver) -> Self {
        self.taxonomy = Some(resolver);
        self
    }

    /// Engine for the delta statistic; [`LeafFrequencyEngine`] when unset.
    pub fn with_acr_engine(mut self, engine: &'a dyn ACREngine) -> Self {
        self.acr = Some(engine);
        self
    }

    pub fn with_domains(mut self, source: &'a dyn DomainSource) -> Self {
        self.domains = Some(source);
        self
    }

    /// Bind aligned sequences under `prop`; they get a consensus on internal nodes.
    pub fn with_alignment(mut self, prop: impl Into<String>, records: &'a [FastaRecord]) -> Self {
        self.alignment = Some((prop.into(), records));
        self
    }

    pub fn config(&self) -> &AnnotateConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    pub fn annotate(&self, tree: &mut Tree, tables: &[MetadataTable]) -> Result<AnnotationReport> {
        let cfg = &self.config;
        let mut report = AnnotationReport::default();
        // Properties summarized by the postorder pass.
        let mut source = Prop2Type::new();
        // Written directly, never summarized.
        let mut annotated = Prop2Type::new();

        self.check_cancel()?;
        if !tables.is_empty() {
            let meta = Metadata::from_tables(tables, &cfg.metadata)?;
            report.bind = Some(metadata::bind(tree, &meta, &cfg.bind)?);
            source.extend(meta.prop2type);
        }
        if let Some((prop, records)) = &self.alignment {
            metadata::bind_alignment(tree, records, prop)?;
            source.insert(prop.clone(), PropType::Alignment);
        }

        self.check_cancel()?;
        if let Some(resolver) = self.taxonomy {
            let taxa = taxonomy::annotate_taxa(tree, resolver, &cfg.taxonomy)?;
            report.rank2values = taxa.rank2values;
            annotated.extend(taxonomy::taxonomy_prop2type());
        }
        tree.normalize();

        if let Some(domains) = self.domains {
            let prop = cfg.domain_prop();
            domain::annotate_domains(tree, domains, prop)?;
            annotated.extend(domain::domain_prop2type(prop));
        }

        if !source.is_empty() {
            let stats = summary::summarize(tree, &source, &cfg.summary, Some(self.cancel.as_ref()))?;
            annotated.extend(stats.derived);
        }

        for prop in &cfg.lineage_props {
            match phylo::lineage_specificity(tree, prop, &cfg.lineage) {
                Ok(ls) => {
                    annotated.extend(phylo::lineage_prop2type(prop));
                    report.lineage.push(ls);
                }
                Err(e) => report.failures.push(failure(prop, "lineage_specificity", &e)),
            }
        }

        let engine: &dyn ACREngine = self.acr.unwrap_or(&LeafFrequencyEngine);
        for prop in &cfg.delta_props {
            match phylo::delta_for_trait(tree, prop, engine, &cfg.delta, Some(self.cancel.as_ref())) {
                Ok(result) => {
                    let root = tree.root();
                    tree.node_mut(root).set(phylo::delta_prop(prop), result.delta);
                    annotated.insert(phylo::delta_prop(prop), PropType::Numeric);
                    if let Some(p) = result.p_value {
                        tree.node_mut(root).set(phylo::pvalue_prop(prop), p);
                        annotated.insert(phylo::pvalue_prop(prop), PropType::Numeric);
                    }
                    report.delta.push(result);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => report.failures.push(failure(prop, "delta", &e)),
            }
        }

        report.prop2type = source;
        report.prop2type.extend(annotated);
        tracing::info!(
            properties = report.prop2type.len(),
            failures = report.failures.len(),
            "annotation finished"
        );
        Ok(report)
    }
}

fn failure(prop: &str, analysis: &str, err: &Error) -> Failure {
    tracing::warn!(prop, analysis, error = %err, "analysis skipped");
    Failure { prop: prop.to_string(), analysis: analysis.to_string(), message: err.to_string() }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Topology error: {0}")]
    Topology(String),

    #[error("Not annotated: {0}")]
    NotAnnotated(String),

    #[error("{0}")]
    External(String),

    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
