//! Domain entities consumed from the backing store
//!
//! Only the identifiers and display names needed by the statistics engine are
//! carried; everything else about genes and experiments stays in the store.

use serde::{Deserialize, Serialize};

pub type GeneId = u64;
pub type ExperimentId = u64;
pub type ProbeId = u64;
pub type TaxonId = u64;

/// A taxon (species) as resolved from its common name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Taxon {
    pub id: TaxonId,
    pub common_name: String,
    pub scientific_name: String,
}

/// Gene classification used for "known gene" filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneKind {
    /// Curated gene (e.g. NCBI gene)
    Known,
    /// Computationally predicted gene
    Predicted,
    /// Probe-aligned region
    ProbeAlignedRegion,
}

impl GeneKind {
    pub fn is_known(self) -> bool {
        matches!(self, GeneKind::Known)
    }
}

/// A gene on the analysis axis
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gene {
    pub id: GeneId,
    /// Official symbol, used for display and gene-list lookups
    pub symbol: Option<String>,
    pub name: String,
    pub taxon: TaxonId,
    pub kind: GeneKind,
}

impl Gene {
    pub fn new(id: GeneId, name: &str) -> Self {
        Self {
            id,
            symbol: Some(name.to_string()),
            name: name.to_string(),
            taxon: 0,
            kind: GeneKind::Known,
        }
    }

    /// Symbol if present, otherwise the numeric id
    pub fn display_name(&self) -> String {
        match &self.symbol {
            Some(s) if !s.is_empty() => s.clone(),
            _ => self.id.to_string(),
        }
    }
}

/// An expression experiment (EE)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpressionExperiment {
    pub id: ExperimentId,
    pub short_name: String,
    pub name: String,
    pub taxon: TaxonId,
    /// Array designs whose probes this experiment was measured on
    pub array_designs: Vec<String>,
}

impl ExpressionExperiment {
    pub fn new(id: ExperimentId, short_name: &str) -> Self {
        Self {
            id,
            short_name: short_name.to_string(),
            name: short_name.to_string(),
            taxon: 0,
            array_designs: Vec::new(),
        }
    }
}

/// One observed gene-level association within one experiment
///
/// The orientation (first, second) is whatever the source presented and is
/// preserved as-is when recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneLink {
    pub first_gene: GeneId,
    pub second_gene: GeneId,
    pub score: f64,
}

impl GeneLink {
    pub fn new(first_gene: GeneId, second_gene: GeneId, score: f64) -> Self {
        Self {
            first_gene,
            second_gene,
            score,
        }
    }

    /// Sign test used for bucketing: a score of exactly 0 counts as negative
    pub fn is_positive(&self) -> bool {
        self.score > 0.0
    }

    pub fn is_self_link(&self) -> bool {
        self.first_gene == self.second_gene
    }
}

/// A probe-level link as stored by the backing store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeLink {
    pub first_probe: ProbeId,
    pub second_probe: ProbeId,
    pub score: f64,
}

impl ProbeLink {
    pub fn new(first_probe: ProbeId, second_probe: ProbeId, score: f64) -> Self {
        Self {
            first_probe,
            second_probe,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_score_is_negative() {
        assert!(!GeneLink::new(1, 2, 0.0).is_positive());
        assert!(GeneLink::new(1, 2, 1e-9).is_positive());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let mut gene = Gene::new(22, "");
        assert_eq!(gene.display_name(), "22");
        gene.symbol = None;
        assert_eq!(gene.display_name(), "22");
        assert_eq!(Gene::new(1, "ACTB").display_name(), "ACTB");
    }
}
