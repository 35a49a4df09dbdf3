//! Working table preparation
//!
//! The link store keeps every probe link twice, once per orientation. The
//! prepare phase copies one orientation of each link into the working table,
//! optionally dropping links that touch a non-specific probe.

use std::collections::HashSet;

use crate::data::{ExpressionExperiment, LinkService, ProbeGeneMap, ProbeId, ProbeLink, ProbeMappingService, WorkingTable};
use crate::error::Result;

/// Counts from one prepare run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareSummary {
    pub experiments: usize,
    pub raw_links: usize,
    pub stored_links: usize,
}

/// Keep the first occurrence of each unordered probe pair
pub fn dedup_links(links: &[ProbeLink]) -> Vec<ProbeLink> {
    let mut seen: HashSet<(ProbeId, ProbeId)> = HashSet::with_capacity(links.len() / 2 + 1);
    links
        .iter()
        .filter(|l| {
            let key = if l.first_probe <= l.second_probe {
                (l.first_probe, l.second_probe)
            } else {
                (l.second_probe, l.first_probe)
            };
            seen.insert(key)
        })
        .copied()
        .collect()
}

/// Drop links where either probe maps to more than one gene
pub fn remove_non_specific(links: Vec<ProbeLink>, probe_map: &ProbeGeneMap) -> Vec<ProbeLink> {
    links
        .into_iter()
        .filter(|l| !probe_map.is_non_specific(l.first_probe) && !probe_map.is_non_specific(l.second_probe))
        .collect()
}

/// Materialize the working table for every experiment
pub fn prepare_working_table(
    experiments: &[ExpressionExperiment],
    link_service: &dyn LinkService,
    probe_service: &dyn ProbeMappingService,
    table: &dyn WorkingTable,
    filter_non_specific: bool,
) -> Result<PrepareSummary> {
    let mut summary = PrepareSummary::default();

    for (k, ee) in experiments.iter().enumerate() {
        let raw = link_service.raw_links(ee)?;
        let mut links = dedup_links(&raw);
        if filter_non_specific {
            let probe_map = probe_service.probe_gene_map(ee)?;
            links = remove_non_specific(links, &probe_map);
        }
        table.store(ee, &links)?;

        log::info!(
            "Prepared {} ({} of {}): {} raw links, {} stored",
            ee.short_name,
            k + 1,
            experiments.len(),
            raw.len(),
            links.len()
        );
        summary.experiments += 1;
        summary.raw_links += raw.len();
        summary.stored_links += links.len();
    }

    log::info!(
        "Working table ready: {} links from {} experiments",
        summary.stored_links,
        summary.experiments
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    use crate::data::ExperimentId;
    use crate::error::GemmaError;

    #[derive(Default)]
    struct MemTable {
        rows: RefCell<HashMap<ExperimentId, Vec<ProbeLink>>>,
    }

    impl WorkingTable for MemTable {
        fn store(&self, ee: &ExpressionExperiment, links: &[ProbeLink]) -> Result<()> {
            self.rows.borrow_mut().insert(ee.id, links.to_vec());
            Ok(())
        }

        fn load(&self, ee: &ExpressionExperiment) -> Result<Vec<ProbeLink>> {
            self.rows
                .borrow()
                .get(&ee.id)
                .cloned()
                .ok_or_else(|| GemmaError::WorkingTableMissing {
                    experiment: ee.short_name.clone(),
                })
        }
    }

    struct FixedLinks(Vec<ProbeLink>);

    impl LinkService for FixedLinks {
        fn raw_links(&self, _ee: &ExpressionExperiment) -> Result<Vec<ProbeLink>> {
            Ok(self.0.clone())
        }
    }

    struct FixedProbes(ProbeGeneMap);

    impl ProbeMappingService for FixedProbes {
        fn probe_gene_map(&self, _ee: &ExpressionExperiment) -> Result<ProbeGeneMap> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_reverse_rows_are_collapsed() {
        let links = [
            ProbeLink::new(1, 2, 0.5),
            ProbeLink::new(2, 1, 0.5),
            ProbeLink::new(3, 1, -0.2),
            ProbeLink::new(1, 3, -0.2),
        ];
        assert_eq!(dedup_links(&links), vec![ProbeLink::new(1, 2, 0.5), ProbeLink::new(3, 1, -0.2)]);
    }

    #[test]
    fn test_prepare_filters_non_specific_probes() {
        let mut map = ProbeGeneMap::new();
        map.insert(1, 100);
        map.insert(2, 200);
        map.insert(3, 300);
        map.insert(3, 301);

        let links = FixedLinks(vec![
            ProbeLink::new(1, 2, 0.5),
            ProbeLink::new(2, 1, 0.5),
            ProbeLink::new(1, 3, 0.4),
            ProbeLink::new(3, 1, 0.4),
        ]);
        let probes = FixedProbes(map);
        let table = MemTable::default();
        let ee = ExpressionExperiment::new(7, "GSE7");

        let summary = prepare_working_table(&[ee.clone()], &links, &probes, &table, true).unwrap();
        assert_eq!(summary.raw_links, 4);
        assert_eq!(summary.stored_links, 1);
        assert_eq!(table.load(&ee).unwrap(), vec![ProbeLink::new(1, 2, 0.5)]);

        let kept = prepare_working_table(&[ee.clone()], &links, &probes, &table, false).unwrap();
        assert_eq!(kept.stored_links, 2);
    }
}
