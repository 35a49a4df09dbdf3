//! gemma_linkstats: coexpression link statistics in Rust
//!
//! Two analyses over a collection of expression experiments:
//!
//! - link support: how many experiments report each gene pair as positively
//!   or negatively coexpressed, compared against shuffled backgrounds
//! - coexpression matrices: per-experiment gene x gene correlations reduced
//!   to meta-analysis effect sizes and k-max correlations with empirical
//!   p-values
//!
//! # Example
//!
//! ```ignore
//! use gemma_linkstats::io::FileStore;
//! use gemma_linkstats::prelude::*;
//!
//! let store = FileStore::open("db")?;
//! let taxon = store.find_by_common_name("mouse")?.unwrap();
//! let experiments = store.experiments_by_taxon(&taxon)?;
//! let genes = store.genes_by_taxon(&taxon)?;
//!
//! let config = LinkAnalysisConfig { real_analysis: true, iterations: 10, ..Default::default() };
//! let mut orchestrator = ShuffleOrchestrator::new(&store, &store, &store, config);
//! orchestrator.prepare(&experiments)?;
//! let report = orchestrator.analyze(&experiments, &genes)?;
//! ```

pub mod cli;
pub mod coexpression;
pub mod data;
pub mod error;
pub mod io;
pub mod links;
pub mod matrix;
pub mod rng;
pub mod stats;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coexpression::{
        CoexpressionMatrices, CoexpressionMatrixEngine, CorrelationMetaAnalysis, CorrelationMethod, EffectSizeParams,
        FilterConfig, Histogram1D, MetaAnalysisModel, SamplerParams,
    };
    pub use crate::data::{
        resolve_gene_sets, wait_until_ready, CorrelationDistributionService, ExperimentService, ExpressionDataMatrix,
        ExpressionDataService, ExpressionExperiment, Gene, GeneId, GeneKind, GeneLink, GeneOntologyService, GeneService,
        LinkService, ProbeGeneMap, ProbeLink, ProbeMappingService, Taxon, TaxonService, WorkingTable,
    };
    pub use crate::error::{GemmaError, Result};
    pub use crate::links::{LinkAnalysisConfig, LinkConfirmationStatistics, LinkStatistics, ShuffleOrchestrator, ShuffleReport};
}
