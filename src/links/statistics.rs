//! Gene x gene link support across experiments
//!
//! One `LinkStatistics` covers one analysis pass (the real data or one shuffle
//! iteration) over a fixed set of experiments and genes. Positive and negative
//! links are kept in separate bit matrices so the two signs are summarized
//! independently.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{BufWriter, Write};

use super::confirmation::LinkConfirmationStatistics;
use crate::data::{ExperimentId, ExpressionExperiment, Gene, GeneId, GeneLink};
use crate::error::{GemmaError, Result};
use crate::matrix::BitSupportMatrix;

const SUMMARY_LOG_ROWS: usize = 10_000;
const WRITE_LOG_LINKS: u64 = 100_000;
const WRITE_LOG_ROWS: usize = 1_000;

#[derive(Debug, Clone)]
pub struct LinkStatistics {
    experiment_index: HashMap<ExperimentId, usize>,
    gene_names: HashMap<GeneId, String>,
    pos_links: BitSupportMatrix<GeneId, GeneId>,
    neg_links: BitSupportMatrix<GeneId, GeneId>,
    gene_coverage: BTreeSet<GeneId>,
}

impl LinkStatistics {
    /// Bind a fresh pair of support matrices to `experiments` x `genes`
    ///
    /// Experiment bit indices follow the order of `experiments`.
    pub fn new(experiments: &[ExpressionExperiment], genes: &[Gene]) -> Result<Self> {
        let mut experiment_index = HashMap::with_capacity(experiments.len());
        for (k, ee) in experiments.iter().enumerate() {
            if experiment_index.insert(ee.id, k).is_some() {
                return Err(GemmaError::InvalidData {
                    reason: format!("Experiment {} listed more than once", ee.short_name),
                });
            }
        }

        let gene_ids: Vec<GeneId> = genes.iter().map(|g| g.id).collect();
        let gene_names = genes.iter().map(|g| (g.id, g.name.clone())).collect();
        let width = experiments.len();

        Ok(Self {
            experiment_index,
            gene_names,
            pos_links: BitSupportMatrix::new(gene_ids.clone(), gene_ids.clone(), width)?,
            neg_links: BitSupportMatrix::new(gene_ids.clone(), gene_ids, width)?,
            gene_coverage: BTreeSet::new(),
        })
    }

    pub fn n_genes(&self) -> usize {
        self.pos_links.rows()
    }

    pub fn n_experiments(&self) -> usize {
        self.experiment_index.len()
    }

    /// Record the links one experiment reported
    ///
    /// Self-links and links touching a gene outside the axis are skipped. The
    /// return value counts the links that reached a matrix, including repeats of
    /// a link already recorded for this experiment.
    pub fn add_links(&mut self, links: &[GeneLink], ee: &ExpressionExperiment) -> Result<usize> {
        let bit = *self
            .experiment_index
            .get(&ee.id)
            .ok_or(GemmaError::UnknownExperiment { id: ee.id })?;

        let mut applied = 0;
        for link in links {
            if link.is_self_link() {
                log::trace!("Skipping self-link for gene {}", link.first_gene);
                continue;
            }

            let matrix = if link.is_positive() {
                &mut self.pos_links
            } else {
                &mut self.neg_links
            };

            match matrix.set(&link.first_gene, &link.second_gene, bit) {
                Some(_) => {
                    applied += 1;
                    self.gene_coverage.insert(link.first_gene);
                    self.gene_coverage.insert(link.second_gene);
                }
                None => {
                    log::warn!(
                        "Link {}-{} in {} refers to a gene outside the analysis axis, skipped",
                        link.first_gene,
                        link.second_gene,
                        ee.short_name
                    );
                }
            }
        }
        Ok(applied)
    }

    /// One pass over both matrices, bucketing every non-empty cell by support
    pub fn get_link_confirmation_stats(&self) -> LinkConfirmationStatistics {
        let mut results = LinkConfirmationStatistics::new();
        let rows = self.pos_links.rows();
        let mut total_counted: u64 = 0;

        log::info!("Summarizing ...");
        for i in 0..rows {
            for (_, support) in self.pos_links.row_support(i) {
                results.add_pos(support);
                total_counted += 1;
            }
            for (_, support) in self.neg_links.row_support(i) {
                results.add_neg(support);
                total_counted += 1;
            }
            if i > 0 && i % SUMMARY_LOG_ROWS == 0 {
                log::info!("Summarized results for {} genes, {} links.", i, total_counted);
            }
        }
        log::info!("Summarized results for {} genes, {} links.", rows, total_counted);
        results
    }

    /// Stream the link table to `out`
    ///
    /// With `stringency == 0` every non-empty cell is written with both its
    /// positive and negative support. Otherwise one row is written per cell
    /// and sign whose support reaches `stringency`, marked `+` or `-`.
    pub fn write_links<W: Write>(&self, out: W, stringency: u32) -> Result<()> {
        log::info!("Writing links with support >={}", stringency);
        let mut out = BufWriter::new(out);

        if stringency == 0 {
            writeln!(out, "Gene1\tGene2\tPosLinks\tNegLinks")?;
        } else {
            writeln!(out, "Gene1\tGene2\tSupport\tCorrSign")?;
        }

        let mut count: u64 = 0;
        let mut last_logged: u64 = 0;
        for i in 0..self.pos_links.rows() {
            let gene1 = self.gene_name(*self.pos_links.row_name(i));

            for (j, (pos, neg)) in self.row_cells(i) {
                let gene2 = self.gene_name(*self.pos_links.col_name(j));
                if stringency > 0 {
                    if pos >= stringency {
                        writeln!(out, "{}\t{}\t{}\t+", gene1, gene2, pos)?;
                        count += 1;
                    }
                    if neg >= stringency {
                        writeln!(out, "{}\t{}\t{}\t-", gene1, gene2, neg)?;
                        count += 1;
                    }
                } else {
                    writeln!(out, "{}\t{}\t{}\t{}", gene1, gene2, pos, neg)?;
                    count += 1;
                }
            }

            if count / WRITE_LOG_LINKS > last_logged / WRITE_LOG_LINKS {
                log::info!("{} links written", count);
                last_logged = count;
            }
            if i > 0 && i % WRITE_LOG_ROWS == 0 {
                log::info!("Links for {} genes written", i);
            }
        }
        log::info!("{} links written", count);
        out.flush()?;
        Ok(())
    }

    /// Positive plus negative links recorded
    pub fn total_link_count(&self) -> u64 {
        self.pos_links.total_bit_count() + self.neg_links.total_bit_count()
    }

    /// Genes that took part in at least one recorded link
    pub fn gene_coverage(&self) -> &BTreeSet<GeneId> {
        &self.gene_coverage
    }

    /// Positive and negative support for the ordered pair (first, second)
    pub fn support(&self, first: GeneId, second: GeneId) -> Option<(u32, u32)> {
        let i = self.pos_links.row_index_of(&first)?;
        let j = self.pos_links.col_index_of(&second)?;
        Some((self.pos_links.cell_count(i, j), self.neg_links.cell_count(i, j)))
    }

    pub fn pos_links(&self) -> &BitSupportMatrix<GeneId, GeneId> {
        &self.pos_links
    }

    pub fn neg_links(&self) -> &BitSupportMatrix<GeneId, GeneId> {
        &self.neg_links
    }

    fn gene_name(&self, id: GeneId) -> &str {
        self.gene_names.get(&id).map(String::as_str).unwrap_or("")
    }

    /// Non-empty cells of row `i` across both signs, in column order
    fn row_cells(&self, i: usize) -> BTreeMap<usize, (u32, u32)> {
        let mut cells: BTreeMap<usize, (u32, u32)> = BTreeMap::new();
        for (j, support) in self.pos_links.row_support(i) {
            cells.entry(j).or_default().0 = support;
        }
        for (j, support) in self.neg_links.row_support(i) {
            cells.entry(j).or_default().1 = support;
        }
        cells
    }
}
