//! Data structures and store interfaces

mod entities;
mod expression;
mod probe_map;
pub mod services;

pub use entities::{
    ExperimentId, ExpressionExperiment, Gene, GeneId, GeneKind, GeneLink, ProbeId, ProbeLink, Taxon,
    TaxonId,
};
pub use expression::ExpressionDataMatrix;
pub use probe_map::ProbeGeneMap;
pub use services::{
    resolve_gene_sets, wait_until_ready, CorrelationDistributionService, ExperimentService, ExpressionDataService, GeneOntologyService,
    GeneService, LinkService, ProbeMappingService, TaxonService, WorkingTable,
};
