//! Gene coexpression across expression experiments
//!
//! Probe-level correlations are reduced to gene x gene matrices per
//! experiment, then combined across experiments by meta-analysis or by
//! n-th largest correlation with an empirical null.

mod correlation;
mod engine;
mod filter;
mod histogram;
mod meta;

pub use correlation::{correlate_rows, pearson, spearman, CorrelationMethod, MomentCache, RowMoments, MIN_NUM_USED};
pub use engine::{
    calculate_effect_size_matrix, filter_coexpression_matrix, get_max_correlation_matrix, CoexpressionMatrices,
    CoexpressionMatrixEngine, EffectSizeOutput, EffectSizeParams, GenePairMatrix, GenePairMatrix3, SamplerParams,
    NUM_HISTOGRAM_BINS, NUM_HISTOGRAM_SAMPLES,
};
pub use filter::{filter_expression_data, FilterConfig};
pub use histogram::{Histogram1D, HistogramSampler};
pub use meta::{CorrelationMetaAnalysis, MetaAnalysisModel, MetaAnalysisResult};
