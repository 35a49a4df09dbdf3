//! Probe-pair correlations with pairwise-complete observations

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView1;

use crate::data::{ExperimentId, ProbeId};
use crate::error::GemmaError;

/// Probe pairs with fewer jointly present samples than this are not correlated
pub const MIN_NUM_USED: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

impl FromStr for CorrelationMethod {
    type Err = GemmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pearson" => Ok(CorrelationMethod::Pearson),
            "spearman" => Ok(CorrelationMethod::Spearman),
            other => Err(GemmaError::InvalidConfig {
                reason: format!("Unknown correlation method '{}'. Use 'pearson' or 'spearman'.", other),
            }),
        }
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationMethod::Pearson => write!(f, "pearson"),
            CorrelationMethod::Spearman => write!(f, "spearman"),
        }
    }
}

/// Mean and root sum of squared deviations of one expression row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowMoments {
    pub mean: f64,
    pub root_ss: f64,
    /// True when the row has no missing value
    pub complete: bool,
}

impl RowMoments {
    pub fn of(row: ArrayView1<'_, f64>) -> Self {
        let present: Vec<f64> = row.iter().copied().filter(|v| !v.is_nan()).collect();
        let complete = present.len() == row.len();
        if present.is_empty() {
            return Self {
                mean: f64::NAN,
                root_ss: f64::NAN,
                complete,
            };
        }
        let mean = present.iter().sum::<f64>() / present.len() as f64;
        let ss: f64 = present.iter().map(|v| (v - mean) * (v - mean)).sum();
        Self {
            mean,
            root_ss: ss.sqrt(),
            complete,
        }
    }
}

/// Per-(experiment, probe) row moments reused across gene pairs
///
/// Owned by the engine and cleared at the start of each run.
#[derive(Debug, Clone, Default)]
pub struct MomentCache {
    moments: HashMap<(ExperimentId, ProbeId), RowMoments>,
}

impl MomentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.moments.clear();
    }

    pub fn len(&self) -> usize {
        self.moments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moments.is_empty()
    }

    pub fn get(&self, ee: ExperimentId, probe: ProbeId) -> Option<&RowMoments> {
        self.moments.get(&(ee, probe))
    }

    /// Compute and store moments for `probe` unless already cached
    pub fn prime(&mut self, ee: ExperimentId, probe: ProbeId, row: ArrayView1<'_, f64>) -> RowMoments {
        *self.moments.entry((ee, probe)).or_insert_with(|| RowMoments::of(row))
    }
}

/// Pearson correlation over jointly present samples; returns `(r, n_used)`
///
/// `r` is NaN when fewer than two samples are shared or either side is constant.
pub fn pearson(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> (f64, usize) {
    let (xs, ys) = pairwise_complete(x, y);
    (pearson_slices(&xs, &ys), xs.len())
}

/// Spearman correlation (average ranks for ties) over jointly present samples
pub fn spearman(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> (f64, usize) {
    let (xs, ys) = pairwise_complete(x, y);
    let rx = average_ranks(&xs);
    let ry = average_ranks(&ys);
    (pearson_slices(&rx, &ry), xs.len())
}

/// Correlate two rows, using cached moments when both rows are complete
///
/// Returns `None` when fewer than `MIN_NUM_USED` samples are shared or the
/// correlation is undefined.
pub fn correlate_rows(
    method: CorrelationMethod,
    x: ArrayView1<'_, f64>,
    y: ArrayView1<'_, f64>,
    moments: Option<(&RowMoments, &RowMoments)>,
) -> Option<(f64, usize)> {
    let (r, n) = match (method, moments) {
        (CorrelationMethod::Pearson, Some((mx, my))) if mx.complete && my.complete && x.len() == y.len() => {
            (pearson_with_moments(x, y, mx, my), x.len())
        }
        (CorrelationMethod::Pearson, _) => pearson(x, y),
        (CorrelationMethod::Spearman, _) => spearman(x, y),
    };
    if n < MIN_NUM_USED || r.is_nan() {
        None
    } else {
        Some((r, n))
    }
}

fn pearson_with_moments(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>, mx: &RowMoments, my: &RowMoments) -> f64 {
    let denom = mx.root_ss * my.root_ss;
    if !(denom > 0.0) {
        return f64::NAN;
    }
    let cov: f64 = x.iter().zip(y.iter()).map(|(a, b)| (a - mx.mean) * (b - my.mean)).sum();
    (cov / denom).clamp(-1.0, 1.0)
}

fn pairwise_complete(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y.iter())
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(&a, &b)| (a, b))
        .unzip()
}

fn pearson_slices(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 {
        return f64::NAN;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if !(denom > 0.0) {
        return f64::NAN;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// 1-based ranks, ties get the average of the ranks they span
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pearson_perfect_linear() {
        let x = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
        let (r, n) = pearson(x.view(), y.view());
        assert!((r - 1.0).abs() < 1e-12);
        assert_eq!(n, 6);
    }

    #[test]
    fn test_pearson_skips_samples_missing_on_either_side() {
        let x = array![1.0, f64::NAN, 3.0, 4.0, 5.0, 6.0, 7.0];
        let y = array![7.0, 6.0, f64::NAN, 4.0, 3.0, 2.0, 1.0];
        let (r, n) = pearson(x.view(), y.view());
        assert_eq!(n, 5);
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_is_rank_based() {
        let x = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = array![1.0, 4.0, 9.0, 16.0, 100.0];
        let (r, _) = spearman(x.view(), y.view());
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_too_few_shared_samples_is_no_data() {
        let x = array![1.0, 2.0, 3.0, 4.0, f64::NAN, f64::NAN];
        let y = array![1.0, 2.0, 3.0, 5.0, 1.0, 2.0];
        assert!(correlate_rows(CorrelationMethod::Pearson, x.view(), y.view(), None).is_none());

        let x5 = array![1.0, 2.0, 3.0, 4.0, 6.0];
        let y5 = array![1.0, 2.0, 3.0, 5.0, 5.0];
        assert!(correlate_rows(CorrelationMethod::Pearson, x5.view(), y5.view(), None).is_some());
    }

    #[test]
    fn test_constant_row_is_no_data() {
        let x = array![2.0, 2.0, 2.0, 2.0, 2.0, 2.0];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert!(correlate_rows(CorrelationMethod::Pearson, x.view(), y.view(), None).is_none());
    }

    #[test]
    fn test_cached_moments_match_direct_computation() {
        let x = array![0.3, 1.2, -0.4, 2.2, 0.9, 1.1];
        let y = array![1.0, 0.5, -1.2, 1.9, 0.1, 0.7];
        let mut cache = MomentCache::new();
        let mx = cache.prime(1, 10, x.view());
        let my = cache.prime(1, 20, y.view());
        assert_eq!(cache.len(), 2);

        let (fast, _) = correlate_rows(CorrelationMethod::Pearson, x.view(), y.view(), Some((&mx, &my))).unwrap();
        let (direct, _) = pearson(x.view(), y.view());
        assert!((fast - direct).abs() < 1e-12);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("Spearman".parse::<CorrelationMethod>().unwrap(), CorrelationMethod::Spearman);
        assert!("kendall".parse::<CorrelationMethod>().is_err());
    }
}
