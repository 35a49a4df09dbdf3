//! Probe-level links to gene-level links, with optional probe shuffling

use std::collections::{BTreeSet, HashMap};

use crate::data::{GeneLink, ProbeGeneMap, ProbeId, ProbeLink};
use crate::rng::MersenneTwister;

/// Resolve each probe link through `probe_map` into gene links
///
/// A probe that maps to several genes contributes one gene link per
/// combination. Links touching a probe with no gene are dropped.
pub fn extract_gene_links(probe_links: &[ProbeLink], probe_map: &ProbeGeneMap) -> Vec<GeneLink> {
    let mut gene_links = Vec::with_capacity(probe_links.len());
    let mut unmapped = 0usize;

    for link in probe_links {
        if !probe_map.contains_probe(link.first_probe) || !probe_map.contains_probe(link.second_probe) {
            unmapped += 1;
            continue;
        }
        for g1 in probe_map.genes(link.first_probe) {
            for g2 in probe_map.genes(link.second_probe) {
                gene_links.push(GeneLink::new(g1, g2, link.score));
            }
        }
    }

    if unmapped > 0 {
        log::debug!("{} probe links skipped: probe has no gene", unmapped);
    }
    gene_links
}

/// Randomizes an experiment's probe links before they are resolved to genes
pub trait LinkShuffler {
    fn shuffle(&mut self, links: &[ProbeLink]) -> Vec<ProbeLink>;
}

/// Permutes probe identities within one experiment
///
/// The distinct probes appearing in the links are relabelled by a uniform
/// random permutation of themselves, so each experiment keeps the shape of
/// its link graph while the genes at its vertices change.
pub struct ProbeLabelShuffler {
    rng: MersenneTwister,
}

impl ProbeLabelShuffler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: MersenneTwister::from_u64(seed),
        }
    }
}

impl LinkShuffler for ProbeLabelShuffler {
    fn shuffle(&mut self, links: &[ProbeLink]) -> Vec<ProbeLink> {
        let probes: Vec<ProbeId> = links
            .iter()
            .flat_map(|l| [l.first_probe, l.second_probe])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut permuted = probes.clone();
        self.rng.shuffle(&mut permuted);
        let relabel: HashMap<ProbeId, ProbeId> = probes.into_iter().zip(permuted).collect();

        links
            .iter()
            .map(|l| ProbeLink::new(relabel[&l.first_probe], relabel[&l.second_probe], l.score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_map() -> ProbeGeneMap {
        let mut map = ProbeGeneMap::new();
        map.insert(10, 1);
        map.insert(20, 2);
        map.insert(30, 3);
        map.insert(30, 4);
        map
    }

    #[test]
    fn test_specific_probes_resolve_one_to_one() {
        let links = extract_gene_links(&[ProbeLink::new(10, 20, 0.8)], &probe_map());
        assert_eq!(links, vec![GeneLink::new(1, 2, 0.8)]);
    }

    #[test]
    fn test_non_specific_probe_yields_every_combination() {
        let links = extract_gene_links(&[ProbeLink::new(10, 30, -0.4)], &probe_map());
        assert_eq!(links, vec![GeneLink::new(1, 3, -0.4), GeneLink::new(1, 4, -0.4)]);

        let filtered = extract_gene_links(&[ProbeLink::new(10, 30, -0.4)], &probe_map().specific_only());
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_unmapped_probe_is_dropped() {
        let links = extract_gene_links(&[ProbeLink::new(10, 99, 0.5), ProbeLink::new(20, 10, 0.5)], &probe_map());
        assert_eq!(links, vec![GeneLink::new(2, 1, 0.5)]);
    }

    #[test]
    fn test_shuffle_permutes_probe_labels_only() {
        let links = vec![
            ProbeLink::new(1, 2, 0.1),
            ProbeLink::new(2, 3, 0.2),
            ProbeLink::new(3, 4, 0.3),
            ProbeLink::new(4, 5, 0.4),
            ProbeLink::new(5, 6, 0.5),
        ];
        let mut shuffler = ProbeLabelShuffler::new(42);
        let shuffled = shuffler.shuffle(&links);

        assert_eq!(shuffled.len(), links.len());
        for (a, b) in links.iter().zip(&shuffled) {
            assert_eq!(a.score, b.score);
        }
        let before: BTreeSet<ProbeId> = links.iter().flat_map(|l| [l.first_probe, l.second_probe]).collect();
        let after: BTreeSet<ProbeId> = shuffled.iter().flat_map(|l| [l.first_probe, l.second_probe]).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_shuffle_is_reproducible_for_a_seed() {
        let links: Vec<ProbeLink> = (0..20).map(|i| ProbeLink::new(i, i + 1, 0.5)).collect();
        let a = ProbeLabelShuffler::new(7).shuffle(&links);
        let b = ProbeLabelShuffler::new(7).shuffle(&links);
        assert_eq!(a, b);
    }
}
