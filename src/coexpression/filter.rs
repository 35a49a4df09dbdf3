//! Expression matrix filtering before correlation
//!
//! Rows are removed in three passes: too many missing values, then the
//! lowest-expressed fraction, then the lowest-variance fraction of what is left.

use std::cmp::Ordering;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::ExpressionDataMatrix;
use crate::error::{GemmaError, Result};

/// Expression filtering thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum fraction of samples a probe must be measured in
    pub min_present_fraction: f64,
    /// Fraction of rows with the lowest mean expression to drop
    pub low_expression_cut: f64,
    /// Fraction of rows with the lowest variance to drop
    pub low_variance_cut: f64,
    pub apply_present_filter: bool,
    pub apply_low_expression_filter: bool,
    pub apply_low_variance_filter: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_present_fraction: 0.3,
            low_expression_cut: 0.3,
            low_variance_cut: 0.05,
            apply_present_filter: true,
            apply_low_expression_filter: true,
            apply_low_variance_filter: true,
        }
    }
}

impl FilterConfig {
    /// No filtering at all
    pub fn none() -> Self {
        Self {
            apply_present_filter: false,
            apply_low_expression_filter: false,
            apply_low_variance_filter: false,
            ..Default::default()
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: FilterConfig = serde_json::from_reader(File::open(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("min_present_fraction", self.min_present_fraction),
            ("low_expression_cut", self.low_expression_cut),
            ("low_variance_cut", self.low_variance_cut),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(GemmaError::InvalidConfig {
                    reason: format!("{} must be in [0, 1], got {}", name, v),
                });
            }
        }
        Ok(())
    }
}

/// Apply `config` to `data`; fails if no rows survive
pub fn filter_expression_data(data: &ExpressionDataMatrix, config: &FilterConfig) -> Result<ExpressionDataMatrix> {
    let values = data.values();
    let n_samples = data.n_samples();
    let mut keep: Vec<usize> = (0..data.n_probes()).collect();

    if config.apply_present_filter && n_samples > 0 {
        keep.retain(|&i| {
            let present = values.row(i).iter().filter(|v| !v.is_nan()).count();
            present as f64 / n_samples as f64 >= config.min_present_fraction
        });
        log::debug!("{} rows pass the present-value filter", keep.len());
    }

    if config.apply_low_expression_filter {
        keep = drop_lowest(&keep, config.low_expression_cut, |i| row_mean(&values.row(i).to_vec()));
        log::debug!("{} rows pass the low-expression filter", keep.len());
    }

    if config.apply_low_variance_filter {
        keep = drop_lowest(&keep, config.low_variance_cut, |i| row_variance(&values.row(i).to_vec()));
        log::debug!("{} rows pass the low-variance filter", keep.len());
    }

    if keep.is_empty() {
        return Err(GemmaError::InvalidData {
            reason: "no expression rows left after filtering".to_string(),
        });
    }
    data.select_rows(&keep)
}

/// Remove the `fraction` of rows with the smallest score, keeping input order
fn drop_lowest<F: Fn(usize) -> f64>(rows: &[usize], fraction: f64, score: F) -> Vec<usize> {
    let n_drop = (rows.len() as f64 * fraction).floor() as usize;
    if n_drop == 0 {
        return rows.to_vec();
    }
    let mut scored: Vec<(usize, f64)> = rows.iter().map(|&i| (i, score(i))).collect();
    // NaN scores sort first so all-missing rows go before anything real
    scored.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal),
    });
    let mut kept: Vec<usize> = scored[n_drop..].iter().map(|&(i, _)| i).collect();
    kept.sort_unstable();
    kept
}

fn row_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

fn row_variance(values: &[f64]) -> f64 {
    let mean = row_mean(values);
    let (ss, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + (v - mean) * (v - mean), n + 1));
    if n < 2 {
        f64::NAN
    } else {
        ss / (n - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;

    fn matrix() -> ExpressionDataMatrix {
        ExpressionDataMatrix::new(
            array![
                [1.0, 2.0, 3.0, 4.0],
                [f64::NAN, f64::NAN, f64::NAN, 5.0],
                [10.0, 10.5, 11.0, 9.5],
                [5.0, 5.0, 5.0, 5.0],
                [7.0, 1.0, 9.0, 2.0],
            ],
            vec![1, 2, 3, 4, 5],
            (1..=4).map(|i| format!("s{}", i)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_present_filter_drops_sparse_rows() {
        let config = FilterConfig {
            min_present_fraction: 0.5,
            apply_present_filter: true,
            ..FilterConfig::none()
        };
        let filtered = filter_expression_data(&matrix(), &config).unwrap();
        assert_eq!(filtered.probe_ids(), &[1, 3, 4, 5]);
    }

    #[test]
    fn test_low_expression_then_low_variance() {
        let config = FilterConfig {
            min_present_fraction: 0.5,
            low_expression_cut: 0.25,
            low_variance_cut: 0.34,
            ..Default::default()
        };
        // present: 1,3,4,5; drop 1 lowest mean (probe 1, mean 2.5); then drop 1 lowest variance (probe 4)
        let filtered = filter_expression_data(&matrix(), &config).unwrap();
        assert_eq!(filtered.probe_ids(), &[3, 5]);
    }

    #[test]
    fn test_no_filtering_keeps_everything() {
        let filtered = filter_expression_data(&matrix(), &FilterConfig::none()).unwrap();
        assert_eq!(filtered.n_probes(), 5);
    }

    #[test]
    fn test_empty_result_is_an_error() {
        let config = FilterConfig {
            min_present_fraction: 1.0,
            low_expression_cut: 1.0,
            ..Default::default()
        };
        assert!(filter_expression_data(&matrix(), &config).is_err());
    }

    #[test]
    fn test_config_from_json_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"low_variance_cut\": 0.1, \"apply_present_filter\": false}}").unwrap();
        let config = FilterConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.low_variance_cut, 0.1);
        assert!(!config.apply_present_filter);
        assert_eq!(config.low_expression_cut, 0.3);
    }

    #[test]
    fn test_out_of_range_fraction_rejected() {
        let config = FilterConfig {
            low_expression_cut: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
