//! Gene x gene coexpression matrices across experiments
//!
//! For each experiment the filtered expression matrix is read, every query x
//! target gene pair is scored by the median probe-pair correlation, and the
//! resulting (experiment, query, target) matrix is reduced to effect sizes,
//! n-th largest correlations and empirical p-values.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use rayon::prelude::*;

use super::correlation::{correlate_rows, CorrelationMethod, MomentCache};
use super::filter::{filter_expression_data, FilterConfig};
use super::histogram::{Histogram1D, HistogramSampler};
use super::meta::{CorrelationMetaAnalysis, MetaAnalysisModel};
use crate::data::{
    CorrelationDistributionService, ExperimentId, ExpressionDataMatrix, ExpressionDataService, ExpressionExperiment,
    Gene, GeneId, ProbeId, ProbeMappingService,
};
use crate::error::{GemmaError, Result};
use crate::matrix::{NamedMatrix2, NamedMatrix3};
use crate::rng::MersenneTwister;
use crate::stats::{median_upper, nth_largest};

/// Draws taken to build the null distribution of n-th largest correlations
pub const NUM_HISTOGRAM_SAMPLES: usize = 10_000;
/// Bins of the null distribution over [-1, 1]
pub const NUM_HISTOGRAM_BINS: usize = 2000;

/// (experiment, query gene, target gene) matrix
pub type GenePairMatrix3 = NamedMatrix3<ExperimentId, GeneId, GeneId>;
/// (query gene, target gene) matrix
pub type GenePairMatrix = NamedMatrix2<GeneId, GeneId>;

/// Parameters for the effect-size analysis
#[derive(Debug, Clone)]
pub struct EffectSizeParams {
    pub method: CorrelationMethod,
    pub filter: FilterConfig,
    pub model: MetaAnalysisModel,
    pub fisher_transform: bool,
    /// Which largest correlation to take (0 = maximum)
    pub kmax: usize,
    /// Also compute the k-max and p-value matrices
    pub p_values: bool,
    pub seed: u64,
}

impl Default for EffectSizeParams {
    fn default() -> Self {
        Self {
            method: CorrelationMethod::Pearson,
            filter: FilterConfig::default(),
            model: MetaAnalysisModel::Random,
            fisher_transform: false,
            kmax: 0,
            p_values: false,
            seed: 42,
        }
    }
}

/// Parameters for sampling n-th largest values from correlation distributions
#[derive(Debug, Clone)]
pub struct SamplerParams {
    pub num_samples: usize,
    pub kmax: usize,
    pub seed: u64,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            num_samples: 1000,
            kmax: 5,
            seed: 42,
        }
    }
}

/// Per-experiment median correlations and their sample sizes
#[derive(Debug, Clone)]
pub struct CoexpressionMatrices {
    pub correlation: GenePairMatrix3,
    pub sample_size: GenePairMatrix3,
    /// Experiment id -> short name
    pub experiment_names: HashMap<ExperimentId, String>,
    /// Gene id -> display name
    pub gene_names: HashMap<GeneId, String>,
}

impl CoexpressionMatrices {
    fn new(experiments: &[ExpressionExperiment], query_genes: &[Gene], target_genes: &[Gene]) -> Result<Self> {
        let ee_ids: Vec<ExperimentId> = experiments.iter().map(|e| e.id).collect();
        let query_ids: Vec<GeneId> = query_genes.iter().map(|g| g.id).collect();
        let target_ids: Vec<GeneId> = target_genes.iter().map(|g| g.id).collect();

        let experiment_names = experiments.iter().map(|e| (e.id, e.short_name.clone())).collect();
        let gene_names = query_genes
            .iter()
            .chain(target_genes)
            .map(|g| (g.id, g.display_name()))
            .collect();

        Ok(Self {
            correlation: NamedMatrix3::new(ee_ids.clone(), query_ids.clone(), target_ids.clone())?,
            sample_size: NamedMatrix3::new(ee_ids, query_ids, target_ids)?,
            experiment_names,
            gene_names,
        })
    }

    pub fn experiment_name(&self, id: ExperimentId) -> String {
        self.experiment_names.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    pub fn gene_name(&self, id: GeneId) -> String {
        self.gene_names.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    /// Drop experiments with no data for any gene pair
    pub fn filter_empty_experiments(&self) -> Self {
        let correlation = filter_coexpression_matrix(&self.correlation);
        let keep: Vec<usize> = correlation
            .slice_names()
            .iter()
            .filter_map(|id| self.sample_size.slice_index(id))
            .collect();
        let sample_size = self.sample_size.select_slices(&keep);
        Self {
            correlation,
            sample_size,
            experiment_names: self.experiment_names.clone(),
            gene_names: self.gene_names.clone(),
        }
    }
}

/// All outputs of one effect-size run
#[derive(Debug, Clone)]
pub struct EffectSizeOutput {
    pub matrices: CoexpressionMatrices,
    pub effect_size: GenePairMatrix,
    pub max_correlation: Option<GenePairMatrix>,
    pub p_values: Option<GenePairMatrix>,
    pub null_histogram: Option<Histogram1D>,
}

/// Drop slices of `matrix` that hold no non-missing value
pub fn filter_coexpression_matrix(matrix: &GenePairMatrix3) -> GenePairMatrix3 {
    log::info!("Filtering expression experiments...");
    let filtered = matrix.retain_nonempty_slices();
    log::info!("{} of {} passed", filtered.n_slices(), matrix.n_slices());
    filtered
}

/// Fold the experiment axis to the n-th largest correlation per gene pair
pub fn get_max_correlation_matrix(matrix: &GenePairMatrix3, n: usize) -> GenePairMatrix {
    log::info!("Calculating {}-max matrix", n);
    let start = Instant::now();
    let mut out = matrix.plane_like();
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            out.set(i, j, nth_largest(matrix.lane(i, j).iter().copied(), n));
        }
    }
    log::info!("Finished calculating {}-max matrix in {:.2?}", n, start.elapsed());
    out
}

/// Meta-analysis effect size per gene pair across experiments
pub fn calculate_effect_size_matrix(
    correlation: &GenePairMatrix3,
    sample_size: &GenePairMatrix3,
    meta: &CorrelationMetaAnalysis,
) -> Result<GenePairMatrix> {
    let dims = (correlation.n_slices(), correlation.nrows(), correlation.ncols());
    let other = (sample_size.n_slices(), sample_size.nrows(), sample_size.ncols());
    if dims != other {
        return Err(GemmaError::DimensionMismatch {
            expected: format!("{:?}", dims),
            got: format!("{:?}", other),
        });
    }

    let start = Instant::now();
    let mut out = correlation.plane_like();
    for i in 0..correlation.nrows() {
        for j in 0..correlation.ncols() {
            let r = correlation.lane(i, j).to_vec();
            let n = sample_size.lane(i, j).to_vec();
            out.set(i, j, meta.run(&r, &n).e);
        }
    }
    log::info!("Calculated effect size matrix in {:.2?}", start.elapsed());
    Ok(out)
}

/// Median correlation over every probe pair of two genes, with its sample size
///
/// Probe pairs with too few shared samples are left out; `None` when no
/// probe pair is usable.
fn median_gene_pair_correlation(
    ee: ExperimentId,
    query_probes: &[ProbeId],
    target_probes: &[ProbeId],
    data: &ExpressionDataMatrix,
    method: CorrelationMethod,
    cache: &MomentCache,
) -> Option<(f64, usize)> {
    let mut observed: Vec<(f64, usize)> = Vec::new();
    for &qp in query_probes {
        let Some(q_row) = data.row(qp) else { continue };
        for &tp in target_probes {
            let Some(t_row) = data.row(tp) else { continue };
            let moments = cache.get(ee, qp).zip(cache.get(ee, tp));
            if let Some(pair) = correlate_rows(method, q_row, t_row, moments) {
                observed.push(pair);
            }
        }
    }
    median_upper(&observed, |p| p.0)
}

/// Computes coexpression matrices from the backing store
pub struct CoexpressionMatrixEngine<'a> {
    expression: &'a dyn ExpressionDataService,
    probes: &'a dyn ProbeMappingService,
    distributions: &'a dyn CorrelationDistributionService,
    cache: MomentCache,
}

impl<'a> CoexpressionMatrixEngine<'a> {
    pub fn new(
        expression: &'a dyn ExpressionDataService,
        probes: &'a dyn ProbeMappingService,
        distributions: &'a dyn CorrelationDistributionService,
    ) -> Self {
        Self {
            expression,
            probes,
            distributions,
            cache: MomentCache::new(),
        }
    }

    pub fn cache(&self) -> &MomentCache {
        &self.cache
    }

    /// Correlation and sample-size matrices for `query_genes` x `target_genes`
    ///
    /// Experiments whose expression data does not survive filtering are logged
    /// and left as all-missing slices.
    pub fn calculate_coexpression_matrices(
        &mut self,
        experiments: &[ExpressionExperiment],
        query_genes: &[Gene],
        target_genes: &[Gene],
        filter_config: &FilterConfig,
        method: CorrelationMethod,
    ) -> Result<CoexpressionMatrices> {
        if query_genes.is_empty() || target_genes.is_empty() {
            return Err(GemmaError::EmptyGeneSet {
                reason: format!("{} query and {} target genes", query_genes.len(), target_genes.len()),
            });
        }

        self.cache.clear();
        let mut matrices = CoexpressionMatrices::new(experiments, query_genes, target_genes)?;

        log::info!("Calculating correlation and sample size matrices");
        let start = Instant::now();
        for (slice, ee) in experiments.iter().enumerate() {
            log::info!("Processing {} ({} of {})", ee.short_name, slice + 1, experiments.len());

            let gene_probes = self.probes.probe_gene_map(ee)?.gene_to_specific_probes();
            let raw = self.expression.expression_data(ee)?;
            let data = match filter_expression_data(&raw, filter_config) {
                Ok(data) => data,
                Err(e) => {
                    log::error!("ERROR: cannot process {}: {}", ee.short_name, e);
                    continue;
                }
            };

            self.prime_cache(ee.id, &gene_probes, query_genes.iter().chain(target_genes), &data);
            let cells = self.score_gene_pairs(ee.id, &gene_probes, query_genes, target_genes, &data, method);

            for (i, j, r, n) in cells {
                matrices.correlation.set(slice, i, j, r);
                matrices.sample_size.set(slice, i, j, n as f64);
            }
        }
        log::info!(
            "Calculated correlations of all {} experiments in {:.2?}",
            experiments.len(),
            start.elapsed()
        );
        Ok(matrices)
    }

    fn prime_cache<'g, I: Iterator<Item = &'g Gene>>(
        &mut self,
        ee: ExperimentId,
        gene_probes: &BTreeMap<GeneId, Vec<ProbeId>>,
        genes: I,
        data: &ExpressionDataMatrix,
    ) {
        for gene in genes {
            for &probe in gene_probes.get(&gene.id).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(row) = data.row(probe) {
                    self.cache.prime(ee, probe, row);
                }
            }
        }
    }

    /// `(row, col, r, n)` for every gene pair with data, computed per query gene in parallel
    fn score_gene_pairs(
        &self,
        ee: ExperimentId,
        gene_probes: &BTreeMap<GeneId, Vec<ProbeId>>,
        query_genes: &[Gene],
        target_genes: &[Gene],
        data: &ExpressionDataMatrix,
        method: CorrelationMethod,
    ) -> Vec<(usize, usize, f64, usize)> {
        let cache = &self.cache;
        query_genes
            .par_iter()
            .enumerate()
            .flat_map_iter(move |(i, q)| {
                let q_probes = gene_probes.get(&q.id);
                target_genes.iter().enumerate().filter_map(move |(j, t)| {
                    let q_probes = q_probes?;
                    let t_probes = gene_probes.get(&t.id)?;
                    median_gene_pair_correlation(ee, q_probes, t_probes, data, method, cache)
                        .map(|(r, n)| (i, j, r, n))
                })
            })
            .collect()
    }

    /// Samplers for every experiment with a usable correlation distribution
    pub fn get_histogram_samplers(&self, experiments: &[ExpressionExperiment]) -> Vec<HistogramSampler> {
        let mut samplers = Vec::with_capacity(experiments.len());
        for ee in experiments {
            match self.distributions.correlation_distribution(ee) {
                Ok(hist) => match HistogramSampler::new(&hist) {
                    Ok(sampler) => samplers.push(sampler),
                    Err(_) => log::error!("ERROR: {} has an invalid correlation distribution", ee.short_name),
                },
                Err(e) => {
                    log::error!("{}", e);
                    log::error!("ERROR: Unable to read correlation distribution file for {}", ee.short_name);
                }
            }
        }
        samplers
    }

    /// Empirical p-value of each n-th largest correlation
    ///
    /// The null is built from `NUM_HISTOGRAM_SAMPLES` draws, each taking one
    /// value from every experiment's correlation distribution and keeping the
    /// n-th largest. A cell's p-value is the null mass at or below its value
    /// divided by the number of draws. Missing or zero correlations get NaN.
    pub fn calculate_max_correlation_p_value_matrix(
        &self,
        max_correlation: &GenePairMatrix,
        n: usize,
        experiments: &[ExpressionExperiment],
        rng: &mut MersenneTwister,
    ) -> Result<(GenePairMatrix, Histogram1D)> {
        log::info!("Calculating {}-max p-value matrix", n);
        let start = Instant::now();

        let samplers = self.get_histogram_samplers(experiments);
        if samplers.len() <= n {
            return Err(GemmaError::InvalidConfig {
                reason: format!(
                    "{} usable correlation distributions, need more than {} to take the {}-max",
                    samplers.len(),
                    n,
                    n
                ),
            });
        }

        let mut hist = Histogram1D::new(NUM_HISTOGRAM_BINS, -1.0, 1.0)?;
        for _ in 0..NUM_HISTOGRAM_SAMPLES {
            hist.fill(nth_largest(samplers.iter().map(|s| s.next_sample(rng)), n));
        }

        let mut p_matrix = NamedMatrix2::new(max_correlation.row_names().to_vec(), max_correlation.col_names().to_vec())?;
        for i in 0..max_correlation.nrows() {
            for j in 0..max_correlation.ncols() {
                let corr = max_correlation.get(i, j);
                if corr.is_nan() || corr == 0.0 {
                    continue;
                }
                p_matrix.set(i, j, hist.cumulative_at(corr) / NUM_HISTOGRAM_SAMPLES as f64);
            }
        }

        log::info!("Finished calculating {}-max p-value matrix in {:.2?}", n, start.elapsed());
        Ok((p_matrix, hist))
    }

    /// The k-max-th largest of one draw per experiment, `num_samples` times
    pub fn sample_histograms(&self, experiments: &[ExpressionExperiment], params: &SamplerParams) -> Result<Vec<f64>> {
        let samplers = self.get_histogram_samplers(experiments);
        if samplers.len() <= params.kmax {
            return Err(GemmaError::InvalidConfig {
                reason: format!(
                    "{} usable correlation distributions, need more than k-max = {}",
                    samplers.len(),
                    params.kmax
                ),
            });
        }

        log::info!("Sampling {} expression experiments", samplers.len());
        log::info!("Taking the n-{} largest value {} times", params.kmax, params.num_samples);
        let start = Instant::now();
        let mut rng = MersenneTwister::from_u64(params.seed);
        let samples = (0..params.num_samples)
            .map(|_| nth_largest(samplers.iter().map(|s| s.next_sample(&mut rng)), params.kmax))
            .collect();
        log::info!("Finished sampling in {:.2?}", start.elapsed());
        Ok(samples)
    }

    /// Full effect-size analysis as driven by the command line
    pub fn run_effect_size(
        &mut self,
        experiments: &[ExpressionExperiment],
        query_genes: &[Gene],
        target_genes: &[Gene],
        params: &EffectSizeParams,
    ) -> Result<EffectSizeOutput> {
        let matrices = self
            .calculate_coexpression_matrices(experiments, query_genes, target_genes, &params.filter, params.method)?
            .filter_empty_experiments();

        let meta = CorrelationMetaAnalysis::new(params.model, params.fisher_transform);
        let effect_size = calculate_effect_size_matrix(&matrices.correlation, &matrices.sample_size, &meta)?;

        let (max_correlation, p_values, null_histogram) = if params.p_values {
            let max_corr = get_max_correlation_matrix(&matrices.correlation, params.kmax);
            let kept: Vec<ExpressionExperiment> = experiments
                .iter()
                .filter(|e| matrices.correlation.slice_index(&e.id).is_some())
                .cloned()
                .collect();
            let mut rng = MersenneTwister::from_u64(params.seed);
            let (p, hist) = self.calculate_max_correlation_p_value_matrix(&max_corr, params.kmax, &kept, &mut rng)?;
            (Some(max_corr), Some(p), Some(hist))
        } else {
            (None, None, None)
        };

        Ok(EffectSizeOutput {
            matrices,
            effect_size,
            max_correlation,
            p_values,
            null_histogram,
        })
    }
}
