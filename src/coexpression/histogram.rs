//! Fixed-bin 1-D histograms and sampling from them
//!
//! Correlation distributions are stored as one row per bin:
//!
//! ```text
//! Bin     Count
//! -1.0    0
//! -0.999  3
//! ...
//! ```
//!
//! where `Bin` is the lower edge. Bin width and range are recovered from the
//! first two rows and the row count.

use std::io::{Read, Write};

use crate::error::{GemmaError, Result};
use crate::rng::MersenneTwister;

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram1D {
    min: f64,
    max: f64,
    heights: Vec<f64>,
    underflow: f64,
    overflow: f64,
}

impl Histogram1D {
    pub fn new(n_bins: usize, min: f64, max: f64) -> Result<Self> {
        if n_bins == 0 || !(max > min) || !min.is_finite() || !max.is_finite() {
            return Err(GemmaError::InvalidHistogram {
                reason: format!("{} bins over [{}, {}]", n_bins, min, max),
            });
        }
        Ok(Self {
            min,
            max,
            heights: vec![0.0; n_bins],
            underflow: 0.0,
            overflow: 0.0,
        })
    }

    /// Build from explicit bin heights
    pub fn from_heights(heights: Vec<f64>, min: f64, max: f64) -> Result<Self> {
        let mut hist = Self::new(heights.len(), min, max)?;
        if heights.iter().any(|h| !h.is_finite() || *h < 0.0) {
            return Err(GemmaError::InvalidHistogram {
                reason: "bin heights must be finite and non-negative".to_string(),
            });
        }
        hist.heights = heights;
        Ok(hist)
    }

    pub fn n_bins(&self) -> usize {
        self.heights.len()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.n_bins() as f64
    }

    pub fn lower_edge(&self, bin: usize) -> f64 {
        self.min + bin as f64 * self.bin_width()
    }

    /// Bin holding `x`, `None` when `x` is outside `[min, max)` or NaN
    pub fn coord_to_index(&self, x: f64) -> Option<usize> {
        if x.is_nan() || x < self.min || x >= self.max {
            return None;
        }
        let bin = ((x - self.min) / self.bin_width()) as usize;
        Some(bin.min(self.n_bins() - 1))
    }

    pub fn fill(&mut self, x: f64) {
        if x.is_nan() {
            return;
        }
        match self.coord_to_index(x) {
            Some(bin) => self.heights[bin] += 1.0,
            None if x < self.min => self.underflow += 1.0,
            None => self.overflow += 1.0,
        }
    }

    pub fn bin_height(&self, bin: usize) -> f64 {
        self.heights[bin]
    }

    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Total in-range mass
    pub fn sum_bin_heights(&self) -> f64 {
        self.heights.iter().sum()
    }

    /// Entries that fell outside the range
    pub fn out_of_range(&self) -> (f64, f64) {
        (self.underflow, self.overflow)
    }

    /// In-range mass at or below the bin holding `x`
    ///
    /// Values below the range have no mass beneath them; values at or above
    /// the upper edge count the whole histogram.
    pub fn cumulative_at(&self, x: f64) -> f64 {
        if x.is_nan() || x < self.min {
            return 0.0;
        }
        let bin = self.coord_to_index(x).unwrap_or(self.n_bins() - 1);
        self.heights[..=bin].iter().sum()
    }

    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut edges = Vec::new();
        let mut heights = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.len() < 2 {
                return Err(GemmaError::InvalidHistogram {
                    reason: format!("expected bin and count columns, got {} fields", record.len()),
                });
            }
            edges.push(parse_field(&record[0])?);
            heights.push(parse_field(&record[1])?);
        }

        if edges.len() < 2 {
            return Err(GemmaError::InvalidHistogram {
                reason: format!("{} bins is too few to recover the bin width", edges.len()),
            });
        }
        let width = edges[1] - edges[0];
        let min = edges[0];
        let max = min + width * edges.len() as f64;
        Self::from_heights(heights, min, max)
    }

    pub fn write<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "Bin\tCount")?;
        for (bin, h) in self.heights.iter().enumerate() {
            writeln!(out, "{}\t{}", self.lower_edge(bin), h)?;
        }
        out.flush()?;
        Ok(())
    }
}

fn parse_field(s: &str) -> Result<f64> {
    s.trim().parse::<f64>().map_err(|_| GemmaError::InvalidHistogram {
        reason: format!("invalid number '{}'", s),
    })
}

/// Draws values distributed like a histogram
///
/// A bin is chosen with probability proportional to its height, then the
/// value is uniform within that bin.
#[derive(Debug, Clone)]
pub struct HistogramSampler {
    min: f64,
    width: f64,
    cdf: Vec<f64>,
}

impl HistogramSampler {
    pub fn new(hist: &Histogram1D) -> Result<Self> {
        let mut cdf = Vec::with_capacity(hist.n_bins());
        let mut acc = 0.0;
        for &h in hist.heights() {
            acc += h;
            cdf.push(acc);
        }
        if !(acc > 0.0) {
            return Err(GemmaError::InvalidHistogram {
                reason: "histogram has no mass to sample from".to_string(),
            });
        }
        Ok(Self {
            min: hist.min(),
            width: hist.bin_width(),
            cdf,
        })
    }

    pub fn next_sample(&self, rng: &mut MersenneTwister) -> f64 {
        let total = self.cdf[self.cdf.len() - 1];
        let u = rng.next_f64() * total;
        let bin = self.cdf.partition_point(|&c| c <= u).min(self.cdf.len() - 1);
        self.min + (bin as f64 + rng.next_f64()) * self.width
    }
}
