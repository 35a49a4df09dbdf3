//! Error types for gemma_linkstats

use thiserror::Error;

/// Main error type for link statistics and coexpression analyses
#[derive(Error, Debug)]
pub enum GemmaError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Taxon not found: {name}")]
    TaxonNotFound { name: String },

    #[error("Empty gene set: {reason}")]
    EmptyGeneSet { reason: String },

    #[error("Expression experiment {id} is not part of this analysis")]
    UnknownExperiment { id: u64 },

    #[error("Working table has not been prepared for experiment {experiment}")]
    WorkingTableMissing { experiment: String },

    #[error("Invalid data: {reason}")]
    InvalidData { reason: String },

    #[error("Invalid histogram: {reason}")]
    InvalidHistogram { reason: String },

    #[error("Timed out after {waited_secs}s waiting for {service} to become ready")]
    ServiceTimeout { service: String, waited_secs: u64 },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for gemma_linkstats operations
pub type Result<T> = std::result::Result<T, GemmaError>;
