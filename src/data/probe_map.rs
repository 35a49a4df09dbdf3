//! Probe (composite sequence) to gene mapping

use std::collections::{BTreeMap, BTreeSet};

use super::entities::{GeneId, ProbeId};

/// Probe-to-gene assignments for the array designs used by one experiment
#[derive(Debug, Clone, Default)]
pub struct ProbeGeneMap {
    probe_to_genes: BTreeMap<ProbeId, BTreeSet<GeneId>>,
}

impl ProbeGeneMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `probe` maps to `gene`
    pub fn insert(&mut self, probe: ProbeId, gene: GeneId) {
        self.probe_to_genes.entry(probe).or_default().insert(gene);
    }

    pub fn n_probes(&self) -> usize {
        self.probe_to_genes.len()
    }

    pub fn contains_probe(&self, probe: ProbeId) -> bool {
        self.probe_to_genes.contains_key(&probe)
    }

    /// Genes for a probe; empty when the probe is unmapped
    pub fn genes(&self, probe: ProbeId) -> impl Iterator<Item = GeneId> + '_ {
        self.probe_to_genes
            .get(&probe)
            .into_iter()
            .flat_map(|genes| genes.iter().copied())
    }

    /// A probe is non-specific when it maps to more than one gene
    pub fn is_specific(&self, probe: ProbeId) -> bool {
        self.probe_to_genes
            .get(&probe)
            .map_or(false, |genes| genes.len() == 1)
    }

    pub fn is_non_specific(&self, probe: ProbeId) -> bool {
        self.probe_to_genes
            .get(&probe)
            .map_or(false, |genes| genes.len() > 1)
    }

    /// Copy of this map with non-specific probes removed
    pub fn specific_only(&self) -> Self {
        let probe_to_genes = self
            .probe_to_genes
            .iter()
            .filter(|(_, genes)| genes.len() == 1)
            .map(|(&p, genes)| (p, genes.clone()))
            .collect();
        Self { probe_to_genes }
    }

    /// Gene -> probes hitting only that gene
    pub fn gene_to_specific_probes(&self) -> BTreeMap<GeneId, Vec<ProbeId>> {
        let mut result: BTreeMap<GeneId, Vec<ProbeId>> = BTreeMap::new();
        for (&probe, genes) in &self.probe_to_genes {
            if genes.len() > 1 {
                continue;
            }
            for &gene in genes {
                result.entry(gene).or_default().push(probe);
            }
        }
        result
    }
}
