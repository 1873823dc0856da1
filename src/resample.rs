//! SMOTE oversampling of the minority class

use crate::dataset::ClassCounts;
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/// Synthetic minority oversampling.
///
/// Only ever applied to the training split; evaluation and serving data
/// are scored as they are.
#[derive(Debug, Clone)]
pub struct Smote {
    k_neighbors: usize,
    seed: u64,
}

impl Smote {
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Self {
            k_neighbors: k_neighbors.max(1),
            seed,
        }
    }

    /// Append synthetic minority rows until both classes have the same count.
    ///
    /// Original rows come first in their original order.
    pub fn fit_resample(&self, x: &Array2<f64>, y: &Array1<u8>) -> Result<(Array2<f64>, Array1<u8>)> {
        if x.nrows() != y.len() {
            bail!("X has {} rows but y has {}", x.nrows(), y.len());
        }

        let counts = ClassCounts::of(y);
        if counts.fraud == 0 || counts.legitimate == 0 {
            bail!(
                "Cannot oversample a split with a single class ({} legitimate, {} fraud)",
                counts.legitimate,
                counts.fraud
            );
        }
        if counts.fraud == counts.legitimate {
            return Ok((x.clone(), y.clone()));
        }

        let (minority_label, n_minority, n_majority) = if counts.fraud < counts.legitimate {
            (1u8, counts.fraud, counts.legitimate)
        } else {
            (0u8, counts.legitimate, counts.fraud)
        };

        let minority_rows: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == minority_label)
            .map(|(i, _)| i)
            .collect();
        let minority = x.select(Axis(0), &minority_rows);

        let k = self.k_neighbors.min(n_minority - 1);
        let neighbors = nearest_neighbors(&minority, k);

        let n_synthetic = n_majority - n_minority;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut synthetic = Array2::<f64>::zeros((n_synthetic, x.ncols()));

        for mut row in synthetic.rows_mut() {
            let sample = rng.gen_range(0..n_minority);
            let base = minority.row(sample);
            if k == 0 {
                row.assign(&base);
                continue;
            }
            let neighbor = minority.row(neighbors[sample][rng.gen_range(0..k)]);
            let gap: f64 = rng.gen();
            for ((out, &b), &n) in row.iter_mut().zip(base.iter()).zip(neighbor.iter()) {
                *out = b + gap * (n - b);
            }
        }

        let x_resampled = ndarray::concatenate(Axis(0), &[x.view(), synthetic.view()])?;
        let mut labels = y.to_vec();
        labels.extend(std::iter::repeat(minority_label).take(n_synthetic));

        info!(
            minority_label,
            original = n_minority,
            synthetic = n_synthetic,
            k_neighbors = k,
            "Oversampled minority class"
        );

        Ok((x_resampled, Array1::from(labels)))
    }
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let d: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    if d.is_nan() {
        f64::INFINITY
    } else {
        d
    }
}

/// Indices of the `k` closest other rows for every row, nearest first.
/// Ties resolve to the lower row index.
fn nearest_neighbors(points: &Array2<f64>, k: usize) -> Vec<Vec<usize>> {
    let n = points.nrows();
    (0..n)
        .map(|i| {
            let mut candidates: Vec<(f64, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (squared_distance(points.row(i), points.row(j)), j))
                .collect();
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            candidates.truncate(k);
            candidates.into_iter().map(|(_, j)| j).collect()
        })
        .collect()
}
