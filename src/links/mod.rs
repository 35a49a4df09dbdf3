//! Gene-pair link statistics
//!
//! Probe links from the working table are resolved to gene links, recorded
//! per experiment in positive and negative support matrices, and summarized
//! as support-count distributions for real and shuffled data.

mod confirmation;
mod driver;
mod extract;
mod prepare;
mod statistics;

pub use confirmation::LinkConfirmationStatistics;
pub use driver::{LinkAnalysisConfig, ShuffleOrchestrator, ShuffleReport};
pub use extract::{extract_gene_links, LinkShuffler, ProbeLabelShuffler};
pub use prepare::{dedup_links, prepare_working_table, remove_non_specific, PrepareSummary};
pub use statistics::LinkStatistics;
