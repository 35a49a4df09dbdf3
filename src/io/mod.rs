//! File-backed store and output writers

mod store;
mod writers;

pub use store::{read_name_list, FileStore};
pub use writers::{write_correlation_matrix, write_gene_matrix, write_sample_size_matrix, write_samples};
