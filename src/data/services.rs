//! Narrow interfaces to the backing store
//!
//! Every analysis component receives its collaborators through these traits.
//! `crate::io::FileStore` implements all of them over a directory of
//! tab-delimited files; tests use small in-memory fakes.

use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

use super::entities::{ExpressionExperiment, Gene, GeneId, ProbeLink, Taxon};
use super::expression::ExpressionDataMatrix;
use super::probe_map::ProbeGeneMap;
use crate::coexpression::Histogram1D;
use crate::error::{GemmaError, Result};

pub trait TaxonService {
    fn find_by_common_name(&self, name: &str) -> Result<Option<Taxon>>;
}

pub trait GeneService {
    fn genes_by_taxon(&self, taxon: &Taxon) -> Result<Vec<Gene>>;

    /// Genes matching the given official symbols; unknown symbols are skipped
    fn find_by_symbols(&self, symbols: &[String], taxon: &Taxon) -> Result<Vec<Gene>>;
}

pub trait ExperimentService {
    fn experiments_by_taxon(&self, taxon: &Taxon) -> Result<Vec<ExpressionExperiment>>;

    fn find_by_short_names(&self, short_names: &[String]) -> Result<Vec<ExpressionExperiment>>;
}

pub trait ProbeMappingService {
    /// Probe -> genes for every array design the experiment used
    fn probe_gene_map(&self, ee: &ExpressionExperiment) -> Result<ProbeGeneMap>;
}

pub trait LinkService {
    /// Probe-level links as stored, including the reversed duplicate rows
    fn raw_links(&self, ee: &ExpressionExperiment) -> Result<Vec<ProbeLink>>;
}

/// Denormalized, deduplicated link store written by the prepare phase
pub trait WorkingTable {
    fn store(&self, ee: &ExpressionExperiment, links: &[ProbeLink]) -> Result<()>;

    /// Fails with `WorkingTableMissing` if the experiment was never prepared
    fn load(&self, ee: &ExpressionExperiment) -> Result<Vec<ProbeLink>>;
}

pub trait ExpressionDataService {
    /// Unfiltered probe-level expression matrix
    fn expression_data(&self, ee: &ExpressionExperiment) -> Result<ExpressionDataMatrix>;
}

pub trait CorrelationDistributionService {
    /// Precomputed distribution of all probe-pair correlations in the experiment
    fn correlation_distribution(&self, ee: &ExpressionExperiment) -> Result<Histogram1D>;
}

pub trait GeneOntologyService {
    fn is_ready(&self) -> bool;

    fn genes_for_term(&self, term: &str, taxon: &Taxon) -> Result<Vec<GeneId>>;
}

/// Poll `service` until it reports ready, giving up after `timeout`
pub fn wait_until_ready<S: GeneOntologyService + ?Sized>(
    service: &S,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let start = Instant::now();
    let mut announced = false;
    while !service.is_ready() {
        if start.elapsed() >= timeout {
            return Err(GemmaError::ServiceTimeout {
                service: "gene ontology service".to_string(),
                waited_secs: start.elapsed().as_secs(),
            });
        }
        if !announced {
            log::info!("Waiting for gene ontology service to finish loading...");
            announced = true;
        }
        thread::sleep(poll_interval);
    }
    Ok(())
}

/// Query and target genes for a coexpression run
///
/// Symbol lists resolve through `find_by_symbols`. Without a target list the
/// query genes are used as targets. Genes annotated with `go_term` are added
/// to the targets once the ontology is ready, and form the query set when no
/// query list is given. Genes appear at most once in either set.
pub fn resolve_gene_sets<S>(
    service: &S,
    taxon: &Taxon,
    query_symbols: Option<&[String]>,
    target_symbols: Option<&[String]>,
    go_term: Option<&str>,
    go_timeout: Duration,
) -> Result<(Vec<Gene>, Vec<Gene>)>
where
    S: GeneService + GeneOntologyService + ?Sized,
{
    let term_genes = match go_term {
        Some(term) => {
            wait_until_ready(service, go_timeout, Duration::from_secs(1))?;
            let ids: HashSet<GeneId> = service.genes_for_term(term, taxon)?.into_iter().collect();
            let genes: Vec<Gene> = service
                .genes_by_taxon(taxon)?
                .into_iter()
                .filter(|g| ids.contains(&g.id))
                .collect();
            log::info!("  {} genes annotated with {}", genes.len(), term);
            Some(genes)
        }
        None => None,
    };

    let query = match (query_symbols, &term_genes) {
        (Some(symbols), _) => service.find_by_symbols(symbols, taxon)?,
        (None, Some(genes)) => genes.clone(),
        (None, None) => {
            return Err(GemmaError::InvalidConfig {
                reason: "a query gene list or a GO term is required".to_string(),
            });
        }
    };
    let mut target = match target_symbols {
        Some(symbols) => service.find_by_symbols(symbols, taxon)?,
        None => query.clone(),
    };
    if let Some(genes) = term_genes {
        let mut seen: HashSet<GeneId> = target.iter().map(|g| g.id).collect();
        target.extend(genes.into_iter().filter(|g| seen.insert(g.id)));
    }

    if query.is_empty() || target.is_empty() {
        return Err(GemmaError::EmptyGeneSet {
            reason: "no genes in query or target".to_string(),
        });
    }
    Ok((query, target))
}
