//! gemma_linkstats command-line interface

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::{info, LevelFilter};

use gemma_linkstats::cli::{Cli, Commands, StoreArgs};
use gemma_linkstats::io::{
    read_name_list, write_correlation_matrix, write_gene_matrix, write_sample_size_matrix, write_samples, FileStore,
};
use gemma_linkstats::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["link-stats", "effect-size", "sample-histograms", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("gemma_linkstats {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .ok();
    }

    let result = match cli.command {
        Some(Commands::LinkStats {
            store,
            prepare,
            iterations,
            real_analysis,
            output_shuffled_data,
            output_dir,
            all_genes,
            keep_non_specific,
            seed,
        }) => {
            let config = LinkAnalysisConfig {
                iterations,
                real_analysis,
                output_shuffled_data,
                output_dir: PathBuf::from(output_dir),
                known_genes_only: !all_genes,
                filter_non_specific: !keep_non_specific,
                seed,
            };
            run_link_stats(&store, prepare, config)
        }
        Some(Commands::EffectSize {
            store,
            query_genes,
            target_genes,
            go_term,
            go_timeout,
            out_prefix,
            method,
            filter_config,
            model,
            fisher,
            kmax,
            p_values,
            seed,
        }) => run_effect_size(
            &store,
            query_genes.as_deref(),
            target_genes.as_deref(),
            go_term.as_deref(),
            go_timeout,
            &out_prefix,
            &method,
            filter_config.as_deref(),
            &model,
            fisher,
            kmax,
            p_values,
            seed,
        ),
        Some(Commands::SampleHistograms {
            store,
            num_samples,
            kmax,
            output,
            seed,
        }) => run_sample_histograms(&store, SamplerParams { num_samples, kmax, seed }, &output),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("gemma_linkstats v{}", VERSION);
    println!("Run `gemma_linkstats -h` for usage or `gemma_linkstats --help` for detailed information.");
}

fn print_short_help() {
    println!("gemma_linkstats v{}", VERSION);
    println!();
    println!("Usage: gemma_linkstats <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  link-stats         Count gene-pair link support across experiments");
    println!("  effect-size        Gene x gene coexpression effect sizes");
    println!("  sample-histograms  Sample k-max values from correlation distributions");
    println!();
    println!("Run `gemma_linkstats <COMMAND> -h` for command-specific options.");
}

fn print_long_help() {
    println!("gemma_linkstats v{}", VERSION);
    println!("Coexpression link statistics across expression experiments");
    println!();
    println!("Usage: gemma_linkstats <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  link-stats         Count gene-pair link support across experiments");
    println!("                       - Working table preparation (--prepare)");
    println!("                       - Real support counts and shuffled backgrounds");
    println!("                       - Empirical FDR per support level");
    println!("  effect-size        Gene x gene coexpression effect sizes");
    println!("                       - Pearson or Spearman probe correlations");
    println!("                       - Fixed or random effects meta-analysis");
    println!("                       - k-max correlation with empirical p-values");
    println!("  sample-histograms  Sample k-max values from correlation distributions");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose      Enable verbose output");
    println!("  -t, --threads <N>  Number of threads (0 = auto)");
    println!("  -h                 Print short help");
    println!("      --help         Print detailed help");
    println!("  -V, --version      Print version");
    println!();
    println!("Examples:");
    println!("  gemma_linkstats link-stats --store db --taxon mouse --prepare");
    println!();
    println!("  gemma_linkstats link-stats --store db --taxon mouse -r -i 10 -o results");
    println!();
    println!("  gemma_linkstats effect-size --store db --taxon mouse -q genes.txt \\");
    println!("    --kmax 3 --p-values -o out/genes");
    println!();
    println!("  gemma_linkstats sample-histograms --store db --taxon mouse -o samples.txt");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

/// Open the store, resolve the taxon and the experiments to analyze
fn open_store(args: &StoreArgs) -> Result<(FileStore, Taxon, Vec<ExpressionExperiment>)> {
    info!("Opening store at: {}", args.store);
    let store = FileStore::open(&args.store)?;

    let taxon = store
        .find_by_common_name(&args.taxon)?
        .ok_or_else(|| GemmaError::TaxonNotFound {
            name: args.taxon.clone(),
        })?;

    let experiments = match &args.experiments {
        Some(path) => {
            info!("Reading experiment list from: {}", path);
            store.find_by_short_names(&read_name_list(path)?)?
        }
        None => store.experiments_by_taxon(&taxon)?,
    };
    if experiments.is_empty() {
        return Err(GemmaError::InvalidConfig {
            reason: format!("No expression experiments to analyze for {}", taxon.common_name),
        });
    }
    info!("  {} expression experiments", experiments.len());

    Ok((store, taxon, experiments))
}

fn run_link_stats(args: &StoreArgs, prepare_only: bool, config: LinkAnalysisConfig) -> Result<()> {
    let (store, taxon, experiments) = open_store(args)?;
    fs::create_dir_all(&config.output_dir)?;

    let mut orchestrator = ShuffleOrchestrator::new(&store, &store, &store, config);

    if prepare_only {
        let summary = orchestrator.prepare(&experiments)?;
        info!(
            "Prepared {} experiments: {} raw links, {} stored",
            summary.experiments, summary.raw_links, summary.stored_links
        );
        return Ok(());
    }

    let genes = store.genes_by_taxon(&taxon)?;
    info!("  {} {} genes", genes.len(), taxon.common_name);

    let report = orchestrator.analyze(&experiments, &genes)?;
    report.write_summary(&mut io::stdout().lock())?;

    info!("Done!");
    Ok(())
}

fn read_symbols(path: &str) -> Result<Vec<String>> {
    info!("Reading gene symbols from: {}", path);
    read_name_list(path)
}

fn create_output<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    info!("Writing {}", path.display());
    Ok(File::create(path)?)
}

#[allow(clippy::too_many_arguments)]
fn run_effect_size(
    args: &StoreArgs,
    query_file: Option<&str>,
    target_file: Option<&str>,
    go_term: Option<&str>,
    go_timeout: u64,
    out_prefix: &str,
    method: &str,
    filter_config: Option<&str>,
    model: &str,
    fisher: bool,
    kmax: usize,
    p_values: bool,
    seed: u64,
) -> Result<()> {
    let method: CorrelationMethod = method.parse()?;
    let model = match model.to_ascii_lowercase().as_str() {
        "random" => MetaAnalysisModel::Random,
        "fixed" => MetaAnalysisModel::Fixed,
        other => {
            return Err(GemmaError::InvalidConfig {
                reason: format!("Unknown meta-analysis model '{}'. Use 'random' or 'fixed'.", other),
            });
        }
    };
    let filter = match filter_config {
        Some(path) => {
            info!("Loading filter settings from: {}", path);
            FilterConfig::from_json_file(path)?
        }
        None => FilterConfig::default(),
    };

    let (store, taxon, experiments) = open_store(args)?;

    let query_symbols = query_file.map(read_symbols).transpose()?;
    let target_symbols = target_file.map(read_symbols).transpose()?;
    let (query_genes, target_genes) = resolve_gene_sets(
        &store,
        &taxon,
        query_symbols.as_deref(),
        target_symbols.as_deref(),
        go_term,
        Duration::from_secs(go_timeout),
    )?;
    info!("  {} query genes, {} target genes", query_genes.len(), target_genes.len());

    let params = EffectSizeParams {
        method,
        filter,
        model,
        fisher_transform: fisher,
        kmax,
        p_values,
        seed,
    };

    let mut engine = CoexpressionMatrixEngine::new(&store, &store, &store);
    let output = engine.run_effect_size(&experiments, &query_genes, &target_genes, &params)?;

    let matrices = &output.matrices;
    let gene_name = |g: GeneId| matrices.gene_name(g);

    write_correlation_matrix(create_output(format!("{}.corr.txt", out_prefix))?, matrices)?;
    write_sample_size_matrix(create_output(format!("{}.sample_size.txt", out_prefix))?, matrices)?;
    write_gene_matrix(
        create_output(format!("{}.effect_size.txt", out_prefix))?,
        &output.effect_size,
        gene_name,
    )?;
    if let Some(max_corr) = &output.max_correlation {
        write_gene_matrix(create_output(format!("{}.max_corr.txt", out_prefix))?, max_corr, gene_name)?;
    }
    if let Some(p) = &output.p_values {
        write_gene_matrix(create_output(format!("{}.pvalues.txt", out_prefix))?, p, gene_name)?;
    }
    if let Some(hist) = &output.null_histogram {
        hist.write(create_output(format!("{}.null_hist.txt", out_prefix))?)?;
    }

    info!("Done!");
    Ok(())
}

fn run_sample_histograms(args: &StoreArgs, params: SamplerParams, output: &str) -> Result<()> {
    let (store, _taxon, experiments) = open_store(args)?;

    let engine = CoexpressionMatrixEngine::new(&store, &store, &store);
    let samples = engine.sample_histograms(&experiments, &params)?;

    let names: Vec<String> = experiments.iter().map(|e| e.short_name.clone()).collect();
    write_samples(create_output(output)?, &names, &samples)?;

    info!("Done!");
    Ok(())
}
