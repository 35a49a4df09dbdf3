//! Probe-level expression data for one experiment

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::entities::ProbeId;
use crate::error::{GemmaError, Result};

/// Expression values for one experiment
/// Rows are probes, columns are samples; missing values are NaN
#[derive(Debug, Clone)]
pub struct ExpressionDataMatrix {
    values: Array2<f64>,
    probe_ids: Vec<ProbeId>,
    sample_ids: Vec<String>,
    row_index: HashMap<ProbeId, usize>,
}

impl ExpressionDataMatrix {
    /// Create a new expression matrix from raw data
    pub fn new(values: Array2<f64>, probe_ids: Vec<ProbeId>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_probes, n_samples) = values.dim();

        if probe_ids.len() != n_probes {
            return Err(GemmaError::DimensionMismatch {
                expected: format!("{} probe IDs", n_probes),
                got: format!("{} probe IDs", probe_ids.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(GemmaError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        let mut row_index = HashMap::with_capacity(n_probes);
        for (i, &probe) in probe_ids.iter().enumerate() {
            if row_index.insert(probe, i).is_some() {
                return Err(GemmaError::InvalidData {
                    reason: format!("Probe {} appears more than once in expression matrix", probe),
                });
            }
        }

        if values.iter().any(|v| v.is_infinite()) {
            return Err(GemmaError::InvalidData {
                reason: "Expression values must be finite or NaN (missing)".to_string(),
            });
        }

        Ok(Self {
            values,
            probe_ids,
            sample_ids,
            row_index,
        })
    }

    pub fn n_probes(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn probe_ids(&self) -> &[ProbeId] {
        &self.probe_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Row for a probe, `None` when the probe was filtered out or never measured
    pub fn row(&self, probe: ProbeId) -> Option<ArrayView1<'_, f64>> {
        self.row_index.get(&probe).map(|&i| self.values.row(i))
    }

    /// Subset to the given row indices, keeping their order
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        let values = self.values.select(Axis(0), rows);
        let probe_ids = rows.iter().map(|&i| self.probe_ids[i]).collect();
        Self::new(values, probe_ids, self.sample_ids.clone())
    }
}
