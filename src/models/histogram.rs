//! Quantile binning of feature columns for histogram-based split search

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Bin index reserved for NaN values
pub const MISSING_BIN: u16 = u16::MAX;

/// Per-feature cut points.
///
/// A value `x` falls into bin `b` where `b` is the number of cuts `<= x`,
/// so "bin <= b" is the same test as "x < cuts[b]".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinMapper {
    cuts: Vec<Vec<f64>>,
}

impl BinMapper {
    /// Compute cut points for every column of `x`.
    ///
    /// Columns with at most `max_bins` distinct values get one cut between
    /// each pair of neighbouring values; wider columns get quantile cuts.
    pub fn fit(x: &Array2<f64>, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, MISSING_BIN as usize - 1);
        let cuts = x
            .columns()
            .into_iter()
            .map(|column| {
                let mut values: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
                values.sort_by(f64::total_cmp);
                feature_cuts(&values, max_bins)
            })
            .collect();

        Self { cuts }
    }

    pub fn n_features(&self) -> usize {
        self.cuts.len()
    }

    /// Number of non-missing bins of a feature
    pub fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len() + 1
    }

    /// Split threshold that separates bins `..=bin` from the rest
    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.cuts[feature][bin]
    }

    pub fn bin_of(&self, feature: usize, value: f64) -> u16 {
        if value.is_nan() {
            MISSING_BIN
        } else {
            self.cuts[feature].partition_point(|&c| c <= value) as u16
        }
    }

    /// Bin every cell of `x`
    pub fn transform(&self, x: &Array2<f64>) -> BinnedMatrix {
        let n_rows = x.nrows();
        let mut bins = Vec::with_capacity(n_rows * x.ncols());
        for (feature, column) in x.columns().into_iter().enumerate() {
            bins.extend(column.iter().map(|&v| self.bin_of(feature, v)));
        }

        BinnedMatrix { n_rows, bins }
    }
}

fn feature_cuts(sorted: &[f64], max_bins: usize) -> Vec<f64> {
    let mut distinct = sorted.to_vec();
    distinct.dedup();

    if distinct.len() <= max_bins {
        return distinct.windows(2).map(|w| w[0] + (w[1] - w[0]) / 2.0).collect();
    }

    let mut cuts: Vec<f64> = Vec::with_capacity(max_bins);
    for i in 1..max_bins {
        let candidate = sorted[i * sorted.len() / max_bins];
        let above_previous = cuts.last().map_or(candidate > sorted[0], |&last| candidate > last);
        if above_previous {
            cuts.push(candidate);
        }
    }
    cuts
}

/// Column-major matrix of bin indices
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    n_rows: usize,
    bins: Vec<u16>,
}

impl BinnedMatrix {
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Bin indices of one feature, indexed by row
    pub fn column(&self, feature: usize) -> &[u16] {
        &self.bins[feature * self.n_rows..(feature + 1) * self.n_rows]
    }
}
