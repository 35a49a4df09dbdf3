//! Real versus shuffled link analysis
//!
//! A run optionally analyses the real data once, then repeats the analysis
//! `iterations` times with each experiment's probe labels shuffled. Every pass
//! builds a fresh `LinkStatistics`; only the reduced confirmation statistics
//! are kept across passes. Comparing the real support distribution with the
//! shuffled ones gives an empirical false discovery rate per support level.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use super::confirmation::LinkConfirmationStatistics;
use super::extract::{extract_gene_links, LinkShuffler, ProbeLabelShuffler};
use super::prepare::{prepare_working_table, PrepareSummary};
use super::statistics::LinkStatistics;
use crate::data::{ExpressionExperiment, Gene, LinkService, ProbeMappingService, WorkingTable};
use crate::error::{GemmaError, Result};

/// Stringency used for per-iteration shuffled link files
const SHUFFLED_OUTPUT_STRINGENCY: u32 = 2;

/// Parameters for a link statistics run
#[derive(Debug, Clone)]
pub struct LinkAnalysisConfig {
    /// Number of shuffled passes
    pub iterations: usize,
    /// Run the unshuffled pass and write `link-data.txt`
    pub real_analysis: bool,
    /// Write `shuffled-link-data-<i>.txt` for each shuffled pass
    pub output_shuffled_data: bool,
    /// Directory for link table files
    pub output_dir: PathBuf,
    /// Restrict the gene axis to known genes
    pub known_genes_only: bool,
    /// Drop probes mapping to more than one gene
    pub filter_non_specific: bool,
    /// Seed for the probe label shuffler
    pub seed: u64,
}

impl Default for LinkAnalysisConfig {
    fn default() -> Self {
        Self {
            iterations: 0,
            real_analysis: false,
            output_shuffled_data: false,
            output_dir: PathBuf::from("."),
            known_genes_only: true,
            filter_non_specific: true,
            seed: 42,
        }
    }
}

/// Confirmation statistics from every pass of a run
#[derive(Debug, Clone, Default)]
pub struct ShuffleReport {
    pub real: Option<LinkConfirmationStatistics>,
    pub shuffled: Vec<LinkConfirmationStatistics>,
}

impl ShuffleReport {
    /// Highest support level seen in any pass
    pub fn max_support(&self) -> u32 {
        self.real
            .iter()
            .chain(self.shuffled.iter())
            .map(|s| s.max_support())
            .max()
            .unwrap_or(0)
    }

    fn mean_shuffled<F: Fn(&LinkConfirmationStatistics) -> u64>(&self, f: F) -> f64 {
        if self.shuffled.is_empty() {
            return f64::NAN;
        }
        self.shuffled.iter().map(|s| f(s) as f64).sum::<f64>() / self.shuffled.len() as f64
    }

    /// Mean shuffled count with support >= `k` over the real count with support >= `k`
    pub fn fdr_pos(&self, k: u32) -> f64 {
        let real = self.real.as_ref().map_or(0, |r| r.cumulative_pos(k));
        ratio(self.mean_shuffled(|s| s.cumulative_pos(k)), real)
    }

    pub fn fdr_neg(&self, k: u32) -> f64 {
        let real = self.real.as_ref().map_or(0, |r| r.cumulative_neg(k));
        ratio(self.mean_shuffled(|s| s.cumulative_neg(k)), real)
    }

    /// Tab-delimited comparison of real and mean shuffled support, one row per level
    pub fn write_summary<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "# Link support: real versus {} shuffled runs", self.shuffled.len())?;
        writeln!(
            out,
            "Support\tRealPos\tRealNeg\tRealPosCum\tRealNegCum\tShufPos\tShufNeg\tShufPosCum\tShufNegCum\tFDRPos\tFDRNeg"
        )?;
        let real = self.real.clone().unwrap_or_default();
        for k in 1..=self.max_support() {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                k,
                real.pos_count(k),
                real.neg_count(k),
                real.cumulative_pos(k),
                real.cumulative_neg(k),
                fmt_mean(self.mean_shuffled(|s| s.pos_count(k))),
                fmt_mean(self.mean_shuffled(|s| s.neg_count(k))),
                fmt_mean(self.mean_shuffled(|s| s.cumulative_pos(k))),
                fmt_mean(self.mean_shuffled(|s| s.cumulative_neg(k))),
                fmt_mean(self.fdr_pos(k)),
                fmt_mean(self.fdr_neg(k)),
            )?;
        }
        out.flush()?;
        Ok(())
    }
}

fn ratio(shuffled: f64, real: u64) -> f64 {
    if real == 0 {
        f64::NAN
    } else {
        shuffled / real as f64
    }
}

fn fmt_mean(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.4}", v)
    }
}

/// Drives the prepare and analysis phases against the backing store
pub struct ShuffleOrchestrator<'a> {
    links: &'a dyn LinkService,
    probes: &'a dyn ProbeMappingService,
    table: &'a dyn WorkingTable,
    shuffler: Box<dyn LinkShuffler + 'a>,
    config: LinkAnalysisConfig,
}

impl<'a> ShuffleOrchestrator<'a> {
    pub fn new(
        links: &'a dyn LinkService,
        probes: &'a dyn ProbeMappingService,
        table: &'a dyn WorkingTable,
        config: LinkAnalysisConfig,
    ) -> Self {
        let shuffler = Box::new(ProbeLabelShuffler::new(config.seed));
        Self {
            links,
            probes,
            table,
            shuffler,
            config,
        }
    }

    /// Replace the default probe label shuffler
    pub fn with_shuffler(mut self, shuffler: Box<dyn LinkShuffler + 'a>) -> Self {
        self.shuffler = shuffler;
        self
    }

    pub fn config(&self) -> &LinkAnalysisConfig {
        &self.config
    }

    /// Build the working table the analysis phase reads from
    pub fn prepare(&self, experiments: &[ExpressionExperiment]) -> Result<PrepareSummary> {
        prepare_working_table(
            experiments,
            self.links,
            self.probes,
            self.table,
            self.config.filter_non_specific,
        )
    }

    /// Real pass (if configured) followed by the shuffled passes
    ///
    /// The first failure writing a link file ends the run with that error.
    pub fn analyze(&mut self, experiments: &[ExpressionExperiment], genes: &[Gene]) -> Result<ShuffleReport> {
        let axis: Vec<Gene> = if self.config.known_genes_only {
            genes.iter().filter(|g| g.kind.is_known()).cloned().collect()
        } else {
            genes.to_vec()
        };
        if axis.is_empty() {
            return Err(GemmaError::EmptyGeneSet {
                reason: "no genes left on the analysis axis".to_string(),
            });
        }
        log::info!("{} genes on the analysis axis, {} experiments", axis.len(), experiments.len());

        let mut report = ShuffleReport::default();

        if self.config.real_analysis {
            let real = self.run_pass(experiments, &axis, false)?;
            log::info!("{} gene links in total", real.total_link_count());
            report.real = Some(real.get_link_confirmation_stats());

            let path = self.config.output_dir.join("link-data.txt");
            real.write_links(File::create(&path)?, 0)?;
        }

        log::info!("Running shuffled runs");
        for i in 0..self.config.iterations {
            log::info!("*** Iteration {} ****", i);
            let shuffled = self.run_pass(experiments, &axis, true)?;
            log::info!("{} gene links in total", shuffled.total_link_count());
            report.shuffled.push(shuffled.get_link_confirmation_stats());

            if self.config.output_shuffled_data {
                let path = self.config.output_dir.join(format!("shuffled-link-data-{}.txt", i));
                shuffled.write_links(File::create(&path)?, SHUFFLED_OUTPUT_STRINGENCY)?;
            }
        }

        Ok(report)
    }

    fn run_pass(&mut self, experiments: &[ExpressionExperiment], genes: &[Gene], shuffle: bool) -> Result<LinkStatistics> {
        let mut stats = LinkStatistics::new(experiments, genes)?;

        for (k, ee) in experiments.iter().enumerate() {
            let mut probe_links = self.table.load(ee)?;
            let mut probe_map = self.probes.probe_gene_map(ee)?;
            if self.config.filter_non_specific {
                probe_map = probe_map.specific_only();
            }
            if shuffle {
                probe_links = self.shuffler.shuffle(&probe_links);
            }

            let gene_links = extract_gene_links(&probe_links, &probe_map);
            let applied = stats.add_links(&gene_links, ee)?;
            log::debug!(
                "{} ({} of {}): {} of {} gene links applied",
                ee.short_name,
                k + 1,
                experiments.len(),
                applied,
                gene_links.len()
            );
        }

        log::info!("{} genes covered by links", stats.gene_coverage().len());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    use crate::data::{ExperimentId, GeneKind, ProbeGeneMap, ProbeLink};

    #[derive(Default)]
    struct MemStore {
        raw: HashMap<ExperimentId, Vec<ProbeLink>>,
        working: RefCell<HashMap<ExperimentId, Vec<ProbeLink>>>,
        probes: ProbeGeneMap,
    }

    impl LinkService for MemStore {
        fn raw_links(&self, ee: &ExpressionExperiment) -> Result<Vec<ProbeLink>> {
            Ok(self.raw.get(&ee.id).cloned().unwrap_or_default())
        }
    }

    impl ProbeMappingService for MemStore {
        fn probe_gene_map(&self, _ee: &ExpressionExperiment) -> Result<ProbeGeneMap> {
            Ok(self.probes.clone())
        }
    }

    impl WorkingTable for MemStore {
        fn store(&self, ee: &ExpressionExperiment, links: &[ProbeLink]) -> Result<()> {
            self.working.borrow_mut().insert(ee.id, links.to_vec());
            Ok(())
        }

        fn load(&self, ee: &ExpressionExperiment) -> Result<Vec<ProbeLink>> {
            self.working
                .borrow()
                .get(&ee.id)
                .cloned()
                .ok_or_else(|| GemmaError::WorkingTableMissing {
                    experiment: ee.short_name.clone(),
                })
        }
    }

    /// Leaves links untouched, so shuffled passes reproduce the real one
    struct NoShuffle;

    impl LinkShuffler for NoShuffle {
        fn shuffle(&mut self, links: &[ProbeLink]) -> Vec<ProbeLink> {
            links.to_vec()
        }
    }

    /// Counts shuffle calls so tests can tell how many passes ran
    struct CountingShuffle(Rc<Cell<usize>>);

    impl LinkShuffler for CountingShuffle {
        fn shuffle(&mut self, links: &[ProbeLink]) -> Vec<ProbeLink> {
            self.0.set(self.0.get() + 1);
            links.to_vec()
        }
    }

    fn fixture() -> (MemStore, Vec<ExpressionExperiment>, Vec<Gene>) {
        let ees = vec![ExpressionExperiment::new(1, "GSE1"), ExpressionExperiment::new(2, "GSE2")];
        let mut genes = vec![Gene::new(10, "A"), Gene::new(20, "B"), Gene::new(30, "C")];
        genes[2].kind = GeneKind::Predicted;

        let mut probes = ProbeGeneMap::new();
        probes.insert(100, 10);
        probes.insert(200, 20);
        probes.insert(300, 30);

        let mut raw = HashMap::new();
        raw.insert(
            1,
            vec![ProbeLink::new(100, 200, 0.6), ProbeLink::new(200, 100, 0.6), ProbeLink::new(200, 300, -0.4)],
        );
        raw.insert(2, vec![ProbeLink::new(100, 200, 0.7), ProbeLink::new(200, 100, 0.7)]);

        let store = MemStore {
            raw,
            probes,
            ..Default::default()
        };
        (store, ees, genes)
    }

    #[test]
    fn test_analysis_requires_prepared_table() {
        let (store, ees, genes) = fixture();
        let config = LinkAnalysisConfig {
            iterations: 1,
            ..Default::default()
        };
        let mut driver = ShuffleOrchestrator::new(&store, &store, &store, config);
        let err = driver.analyze(&ees, &genes).unwrap_err();
        assert!(matches!(err, GemmaError::WorkingTableMissing { .. }));
    }

    #[test]
    fn test_real_pass_and_shuffles_are_reported() {
        let (store, ees, genes) = fixture();
        let dir = tempfile::tempdir().unwrap();
        let config = LinkAnalysisConfig {
            iterations: 3,
            real_analysis: true,
            output_shuffled_data: true,
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut driver = ShuffleOrchestrator::new(&store, &store, &store, config).with_shuffler(Box::new(NoShuffle));
        driver.prepare(&ees).unwrap();
        let report = driver.analyze(&ees, &genes).unwrap();

        let real = report.real.as_ref().unwrap();
        assert_eq!(real.pos_count(2), 1);
        // C is a predicted gene and is off the axis by default
        assert_eq!(real.total_neg(), 0);
        assert_eq!(report.shuffled.len(), 3);
        assert_eq!(report.fdr_pos(1), 1.0);

        let real_table = std::fs::read_to_string(dir.path().join("link-data.txt")).unwrap();
        assert_eq!(real_table, "Gene1\tGene2\tPosLinks\tNegLinks\nA\tB\t2\t0\n");
        let shuffled_table = std::fs::read_to_string(dir.path().join("shuffled-link-data-2.txt")).unwrap();
        assert_eq!(shuffled_table, "Gene1\tGene2\tSupport\tCorrSign\nA\tB\t2\t+\n");
    }

    #[test]
    fn test_real_link_file_failure_stops_the_run() {
        let (store, ees, genes) = fixture();
        let dir = tempfile::tempdir().unwrap();
        let calls = Rc::new(Cell::new(0));
        let config = LinkAnalysisConfig {
            iterations: 2,
            real_analysis: true,
            output_shuffled_data: true,
            output_dir: dir.path().join("missing"),
            ..Default::default()
        };
        let mut driver = ShuffleOrchestrator::new(&store, &store, &store, config)
            .with_shuffler(Box::new(CountingShuffle(Rc::clone(&calls))));
        driver.prepare(&ees).unwrap();

        let err = driver.analyze(&ees, &genes).unwrap_err();
        assert!(matches!(err, GemmaError::IoError(_)));
        assert_eq!(calls.get(), 0);
        assert!(!dir.path().join("missing").exists());
    }

    #[test]
    fn test_shuffled_link_file_failure_stops_the_run() {
        let (store, ees, genes) = fixture();
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("taken");
        std::fs::write(&not_a_dir, "").unwrap();
        let calls = Rc::new(Cell::new(0));
        let config = LinkAnalysisConfig {
            iterations: 3,
            output_shuffled_data: true,
            output_dir: not_a_dir,
            ..Default::default()
        };
        let mut driver = ShuffleOrchestrator::new(&store, &store, &store, config)
            .with_shuffler(Box::new(CountingShuffle(Rc::clone(&calls))));
        driver.prepare(&ees).unwrap();

        let err = driver.analyze(&ees, &genes).unwrap_err();
        assert!(matches!(err, GemmaError::IoError(_)));
        // one shuffle per experiment: only the first pass ran
        assert_eq!(calls.get(), ees.len());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_all_genes_brings_predicted_genes_in() {
        let (store, ees, genes) = fixture();
        let dir = tempfile::tempdir().unwrap();
        let config = LinkAnalysisConfig {
            real_analysis: true,
            known_genes_only: false,
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut driver = ShuffleOrchestrator::new(&store, &store, &store, config);
        driver.prepare(&ees).unwrap();
        let report = driver.analyze(&ees, &genes).unwrap();
        assert_eq!(report.real.unwrap().neg_count(1), 1);
        assert!(report.shuffled.is_empty());
    }

    #[test]
    fn test_probe_shuffle_preserves_link_totals() {
        let (store, ees, genes) = fixture();
        let config = LinkAnalysisConfig {
            iterations: 5,
            known_genes_only: false,
            ..Default::default()
        };
        let mut driver = ShuffleOrchestrator::new(&store, &store, &store, config);
        driver.prepare(&ees).unwrap();
        let report = driver.analyze(&ees, &genes).unwrap();
        assert_eq!(report.shuffled.len(), 5);
        for run in &report.shuffled {
            // A permutation of single-gene probes never turns a link into a self-link
            let bits: u64 = run
                .pos_distribution()
                .chain(run.neg_distribution())
                .map(|(k, c)| k as u64 * c)
                .sum();
            assert_eq!(bits, 3);
            assert_eq!(run.total_neg(), 1);
        }
    }

    #[test]
    fn test_summary_lists_each_support_level() {
        let mut real = LinkConfirmationStatistics::new();
        real.add_pos(1);
        real.add_pos(1);
        real.add_pos(2);
        let mut shuffled = LinkConfirmationStatistics::new();
        shuffled.add_pos(1);
        let report = ShuffleReport {
            real: Some(real),
            shuffled: vec![shuffled],
        };
        let mut out = Vec::new();
        report.write_summary(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().skip(2).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "1\t2\t0\t3\t0\t1.0000\t0.0000\t1.0000\t0.0000\t0.3333\tNA");
        assert_eq!(rows[1], "2\t1\t0\t1\t0\t0.0000\t0.0000\t0.0000\t0.0000\t0.0000\tNA");
    }
}
