//! Command-line interface for gemma_linkstats

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gemma_linkstats")]
#[command(version)]
#[command(about = "Coexpression link statistics across expression experiments")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of threads (0 = auto) [default: 0]
    #[arg(short = 't', long, global = true, default_value = "0")]
    pub threads: usize,
}

/// Options shared by every analysis
#[derive(clap::Args, Debug, Clone)]
pub struct StoreArgs {
    /// Root directory of the file store
    #[arg(long, value_name = "DIR",
        long_help = "Root directory of the file store.\n\
            Expected files: taxa.tsv, genes.tsv, experiments.tsv, probes.tsv,\n\
            plus the links/, working/, expression/ and distributions/ directories.")]
    pub store: String,

    /// Taxon common name, e.g. mouse
    #[arg(long)]
    pub taxon: String,

    /// File of experiment short names, one per line [default: all of the taxon]
    #[arg(short = 'f', long, value_name = "FILE")]
    pub experiments: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count gene-pair link support across experiments
    #[command(
        name = "link-stats",
        long_about = "Count gene-pair link support across experiments.\n\n\
            Run once with --prepare to build the deduplicated working table, then\n\
            with --real-analysis and/or --iterations N to compare real support\n\
            against shuffled backgrounds.",
        after_long_help = "\
Examples:
  # Build the working table
  gemma_linkstats link-stats --store db --taxon mouse --prepare

  # Real support plus 10 shuffled backgrounds
  gemma_linkstats link-stats --store db --taxon mouse -r -i 10 -o results"
    )]
    LinkStats {
        #[command(flatten)]
        store: StoreArgs,

        /// Only build the working table
        #[arg(short = 's', long)]
        prepare: bool,

        /// Number of shuffled iterations
        #[arg(short, long, default_value = "0")]
        iterations: usize,

        /// Analyze the real (unshuffled) data
        #[arg(short, long)]
        real_analysis: bool,

        /// Write the links of every shuffled iteration
        #[arg(long)]
        output_shuffled_data: bool,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output_dir: String,

        /// Include predicted genes and probe-aligned regions
        #[arg(long)]
        all_genes: bool,

        /// Keep probes that map to more than one gene
        #[arg(long)]
        keep_non_specific: bool,

        /// Shuffle seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Gene x gene coexpression effect sizes
    #[command(
        name = "effect-size",
        long_about = "Compute gene x gene coexpression effect sizes.\n\n\
            Per experiment, each gene pair gets the median correlation over its\n\
            probe pairs. The per-experiment correlations are combined by\n\
            meta-analysis; with --p-values the k-max correlation and its empirical\n\
            p-value are also written.",
        after_long_help = "\
Examples:
  gemma_linkstats effect-size --store db --taxon mouse -q query.txt -o out/ribosome

  gemma_linkstats effect-size --store db --taxon mouse -g GO:0005840 \\
    --kmax 3 --p-values -o out/ribosome"
    )]
    EffectSize {
        #[command(flatten)]
        store: StoreArgs,

        /// File of query gene symbols, one per line
        #[arg(short, long, value_name = "FILE")]
        query_genes: Option<String>,

        /// File of target gene symbols [default: same as query]
        #[arg(long, value_name = "FILE")]
        target_genes: Option<String>,

        /// GO term whose genes are added to the targets; the query set when -q is absent
        #[arg(short, long)]
        go_term: Option<String>,

        /// Seconds to wait for the gene ontology service
        #[arg(long, default_value = "60")]
        go_timeout: u64,

        /// Output file prefix
        #[arg(short, long)]
        out_prefix: String,

        /// Correlation method: pearson, spearman
        #[arg(long, default_value = "pearson")]
        method: String,

        /// JSON file with expression filter settings
        #[arg(long, value_name = "FILE")]
        filter_config: Option<String>,

        /// Meta-analysis model: random, fixed
        #[arg(long, default_value = "random")]
        model: String,

        /// Combine correlations on the Fisher z scale
        #[arg(long)]
        fisher: bool,

        /// Which largest correlation to report (0 = maximum)
        #[arg(long, default_value = "0")]
        kmax: usize,

        /// Also write k-max correlation and p-value matrices
        #[arg(long)]
        p_values: bool,

        /// Seed for the null distribution
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Sample k-max values from correlation distributions
    #[command(
        name = "sample-histograms",
        long_about = "Sample k-max values from per-experiment correlation distributions.\n\n\
            Each draw takes one value from every experiment's distribution and\n\
            keeps the k-max-th largest.",
        after_long_help = "\
Examples:
  gemma_linkstats sample-histograms --store db --taxon mouse -n 1000 -k 5 -o samples.txt"
    )]
    SampleHistograms {
        #[command(flatten)]
        store: StoreArgs,

        /// Number of draws
        #[arg(short, long, default_value = "1000")]
        num_samples: usize,

        /// Which largest value to keep (0 = maximum)
        #[arg(short, long, default_value = "5")]
        kmax: usize,

        /// Output file
        #[arg(short, long)]
        output: String,

        /// Sampling seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}
