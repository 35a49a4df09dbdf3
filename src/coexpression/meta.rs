//! Correlation effect-size meta-analysis across experiments

use statrs::function::erf::erfc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetaAnalysisModel {
    Fixed,
    /// DerSimonian-Laird between-study variance
    #[default]
    Random,
}

/// Combined estimate for one gene pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetaAnalysisResult {
    /// Combined effect, on the correlation scale
    pub e: f64,
    /// Variance of the combined effect
    pub v: f64,
    pub z: f64,
    /// Two-sided p-value for `e != 0`
    pub p: f64,
    /// Cochran's Q heterogeneity statistic
    pub q: f64,
    /// Between-study variance (0 for the fixed model)
    pub tau2: f64,
    /// Observations used
    pub k: usize,
}

impl MetaAnalysisResult {
    fn empty() -> Self {
        Self {
            e: f64::NAN,
            v: f64::NAN,
            z: f64::NAN,
            p: f64::NAN,
            q: f64::NAN,
            tau2: f64::NAN,
            k: 0,
        }
    }
}

/// Inverse-variance meta-analysis of correlations
///
/// The sampling variance of `r` with sample size `n` is `(1 - r^2)^2 / (n - 1)`,
/// or `1 / (n - 3)` after the Fisher z transform. Observations with a missing
/// value or a non-positive variance are left out.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CorrelationMetaAnalysis {
    pub model: MetaAnalysisModel,
    pub fisher_transform: bool,
}

impl CorrelationMetaAnalysis {
    pub fn new(model: MetaAnalysisModel, fisher_transform: bool) -> Self {
        Self { model, fisher_transform }
    }

    pub fn run(&self, correlations: &[f64], sample_sizes: &[f64]) -> MetaAnalysisResult {
        let mut effects = Vec::with_capacity(correlations.len());
        let mut variances = Vec::with_capacity(correlations.len());

        for (&r, &n) in correlations.iter().zip(sample_sizes) {
            if r.is_nan() || n.is_nan() {
                continue;
            }
            let (x, v) = if self.fisher_transform {
                (r.atanh(), 1.0 / (n - 3.0))
            } else {
                (r, (1.0 - r * r).powi(2) / (n - 1.0))
            };
            if x.is_finite() && v.is_finite() && v > 0.0 {
                effects.push(x);
                variances.push(v);
            }
        }

        let k = effects.len();
        if k == 0 {
            return MetaAnalysisResult::empty();
        }

        let weights: Vec<f64> = variances.iter().map(|v| 1.0 / v).collect();
        let sum_w: f64 = weights.iter().sum();
        let fixed_mean = weighted_mean(&effects, &weights);
        let q: f64 = effects
            .iter()
            .zip(&weights)
            .map(|(x, w)| w * (x - fixed_mean).powi(2))
            .sum();

        let tau2 = match self.model {
            MetaAnalysisModel::Fixed => 0.0,
            MetaAnalysisModel::Random => {
                let sum_w2: f64 = weights.iter().map(|w| w * w).sum();
                let denom = sum_w - sum_w2 / sum_w;
                if denom > 0.0 {
                    ((q - (k as f64 - 1.0)) / denom).max(0.0)
                } else {
                    0.0
                }
            }
        };

        let weights: Vec<f64> = variances.iter().map(|v| 1.0 / (v + tau2)).collect();
        let pooled = weighted_mean(&effects, &weights);
        let v = 1.0 / weights.iter().sum::<f64>();
        let z = pooled.abs() / v.sqrt();
        let p = erfc(z / std::f64::consts::SQRT_2);
        let e = if self.fisher_transform { pooled.tanh() } else { pooled };

        MetaAnalysisResult { e, v, z, p, q, tau2, k }
    }
}

fn weighted_mean(x: &[f64], w: &[f64]) -> f64 {
    let sw: f64 = w.iter().sum();
    x.iter().zip(w).map(|(a, b)| a * b).sum::<f64>() / sw
}
