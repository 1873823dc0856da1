//! Gradient-boosted tree classifier with a binary log-loss objective

use crate::config::BoosterConfig;
use crate::models::histogram::BinMapper;
use crate::models::tree::{RegressionTree, TreeBuilder, TreeParams};
use anyhow::{bail, ensure, Result};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Probability above which a row is labelled fraud
pub const DECISION_THRESHOLD: f64 = 0.5;

const PROBABILITY_FLOOR: f64 = 1e-6;
const HESSIAN_FLOOR: f64 = 1e-16;

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Boosted ensemble of regression trees.
///
/// Each round fits a tree to the gradient and hessian of the log loss at
/// the current margins; the fraud probability is the sigmoid of the summed
/// margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    config: BoosterConfig,
    seed: u64,
    base_margin: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedClassifier {
    /// Create an untrained classifier
    pub fn new(config: BoosterConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            base_margin: 0.0,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    fn validate(&self, x: &Array2<f64>, y: &Array1<u8>) -> Result<()> {
        let c = &self.config;
        ensure!(x.nrows() > 0, "Cannot fit on an empty dataset");
        ensure!(x.ncols() > 0, "Cannot fit without features");
        ensure!(
            x.nrows() == y.len(),
            "X has {} rows but y has {}",
            x.nrows(),
            y.len()
        );
        ensure!(y.iter().all(|&v| v <= 1), "Labels must be 0 or 1");
        ensure!(c.learning_rate > 0.0, "learning_rate must be positive");
        ensure!(c.reg_lambda >= 0.0, "reg_lambda must be non-negative");
        ensure!(c.max_bins >= 2, "max_bins must be at least 2");
        if !(c.subsample > 0.0 && c.subsample <= 1.0) {
            bail!("subsample must be in (0, 1], got {}", c.subsample);
        }
        if !(c.colsample_bytree > 0.0 && c.colsample_bytree <= 1.0) {
            bail!("colsample_bytree must be in (0, 1], got {}", c.colsample_bytree);
        }
        Ok(())
    }

    /// Train on the full batch, replacing any previously fitted trees.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>) -> Result<()> {
        self.validate(x, y)?;

        let n_rows = x.nrows();
        let n_features = x.ncols();
        let labels: Vec<f64> = y.iter().map(|&v| f64::from(v)).collect();

        let prior = (labels.iter().sum::<f64>() / n_rows as f64)
            .clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
        self.base_margin = (prior / (1.0 - prior)).ln();
        self.n_features = n_features;
        self.trees = Vec::with_capacity(self.config.n_estimators);

        let mapper = BinMapper::fit(x, self.config.max_bins);
        let binned = mapper.transform(x);
        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_child_weight: self.config.min_child_weight,
            reg_lambda: self.config.reg_lambda,
            gamma: self.config.gamma,
            learning_rate: self.config.learning_rate,
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut margins = vec![self.base_margin; n_rows];
        let mut grad = vec![0.0; n_rows];
        let mut hess = vec![0.0; n_rows];

        for round in 0..self.config.n_estimators {
            for r in 0..n_rows {
                let p = sigmoid(margins[r]);
                grad[r] = p - labels[r];
                hess[r] = (p * (1.0 - p)).max(HESSIAN_FLOOR);
            }

            let rows = self.sample_rows(n_rows, &mut rng);
            let features = self.sample_features(n_features, &mut rng);

            let tree = TreeBuilder::new(&mapper, &binned, &grad, &hess, &features, params).build(rows);
            for (r, margin) in margins.iter_mut().enumerate() {
                *margin += tree.predict_row(x.row(r));
            }

            if (round + 1) % 10 == 0 {
                debug!(
                    round = round + 1,
                    leaves = tree.n_leaves(),
                    train_logloss = log_loss(&labels, &margins),
                    "Boosting progress"
                );
            }
            self.trees.push(tree);
        }

        info!(
            trees = self.trees.len(),
            rows = n_rows,
            features = n_features,
            train_logloss = log_loss(&labels, &margins),
            "Gradient boosted classifier trained"
        );

        Ok(())
    }

    fn sample_rows(&self, n_rows: usize, rng: &mut StdRng) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n_rows).collect();
        }
        let rows: Vec<usize> = (0..n_rows)
            .filter(|_| rng.gen::<f64>() < self.config.subsample)
            .collect();
        if rows.is_empty() {
            (0..n_rows).collect()
        } else {
            rows
        }
    }

    fn sample_features(&self, n_features: usize, rng: &mut StdRng) -> Vec<usize> {
        if self.config.colsample_bytree >= 1.0 {
            return (0..n_features).collect();
        }
        let k = ((n_features as f64 * self.config.colsample_bytree).round() as usize).clamp(1, n_features);
        let mut features = rand::seq::index::sample(rng, n_features, k).into_vec();
        features.sort_unstable();
        features
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        ensure!(self.is_fitted(), "Classifier has not been fitted");
        ensure!(
            x.ncols() == self.n_features,
            "Expected {} features, got {}",
            self.n_features,
            x.ncols()
        );
        Ok(())
    }

    /// Raw additive score (log-odds) per row
    pub fn predict_margin(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .fold(self.base_margin, |acc, tree| acc + tree.predict_row(row))
            })
            .collect())
    }

    /// Probability of the fraud class per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_margin(x)?.mapv(sigmoid))
    }

    /// Class label per row at [`DECISION_THRESHOLD`]
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| u8::from(p > DECISION_THRESHOLD)))
    }
}

fn log_loss(labels: &[f64], margins: &[f64]) -> f64 {
    let total: f64 = labels
        .iter()
        .zip(margins)
        .map(|(&y, &m)| {
            let p = sigmoid(m).clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn small_config() -> BoosterConfig {
        BoosterConfig {
            n_estimators: 20,
            max_depth: 3,
            ..BoosterConfig::default()
        }
    }

    /// Fraud when the first feature exceeds 50, second feature is noise
    fn toy_data() -> (Array2<f64>, Array1<u8>) {
        let x = Array::from_shape_fn((200, 2), |(r, c)| {
            if c == 0 {
                r as f64 / 2.0
            } else {
                ((r * 7919) % 13) as f64
            }
        });
        let y = Array1::from_shape_fn(200, |r| u8::from(r as f64 / 2.0 > 50.0));
        (x, y)
    }

    #[test]
    fn test_learns_threshold_rule() {
        let (x, y) = toy_data();
        let mut model = GradientBoostedClassifier::new(small_config(), 42);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_trees(), 20);
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = toy_data();
        let mut model = GradientBoostedClassifier::new(small_config(), 42);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[0] < 0.1);
        assert!(proba[199] > 0.9);
    }

    #[test]
    fn test_training_is_deterministic() {
        let (x, y) = toy_data();
        let config = BoosterConfig {
            subsample: 0.7,
            colsample_bytree: 0.5,
            ..small_config()
        };

        let mut a = GradientBoostedClassifier::new(config.clone(), 7);
        let mut b = GradientBoostedClassifier::new(config, 7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_handles_missing_values() {
        let (mut x, y) = toy_data();
        x[[3, 0]] = f64::NAN;
        x[[150, 1]] = f64::NAN;

        let mut model = GradientBoostedClassifier::new(small_config(), 42);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_rejects_wrong_width_and_unfitted() {
        let (x, y) = toy_data();
        let mut model = GradientBoostedClassifier::new(small_config(), 42);
        assert!(model.predict_proba(&x).is_err());

        model.fit(&x, &y).unwrap();
        let narrow = Array2::<f64>::zeros((1, 1));
        assert!(model.predict_proba(&narrow).is_err());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let (x, _) = toy_data();
        let y = Array1::from_elem(10, 0u8);
        let mut model = GradientBoostedClassifier::new(small_config(), 42);
        assert!(model.fit(&x, &y).is_err());

        let bad = BoosterConfig {
            subsample: 0.0,
            ..small_config()
        };
        let (x, y) = toy_data();
        assert!(GradientBoostedClassifier::new(bad, 1).fit(&x, &y).is_err());
    }
}
