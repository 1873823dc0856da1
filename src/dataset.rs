//! Training dataset assembly and the stratified train/test split

use crate::feature_extractor::FeatureExtractor;
use crate::frame::FeatureFrame;
use crate::models::store::ArtifactStore;
use crate::types::transaction::Transaction;
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Label column the classifier is trained against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetColumn {
    #[serde(rename = "isFraud")]
    IsFraud,
    #[serde(rename = "isFlaggedFraud")]
    IsFlaggedFraud,
}

impl TargetColumn {
    pub fn name(&self) -> &'static str {
        match self {
            TargetColumn::IsFraud => "isFraud",
            TargetColumn::IsFlaggedFraud => "isFlaggedFraud",
        }
    }

    /// Label of a record for this column, if present
    pub fn label(&self, tx: &Transaction) -> Option<u8> {
        match self {
            TargetColumn::IsFraud => tx.is_fraud,
            TargetColumn::IsFlaggedFraud => tx.is_flagged_fraud,
        }
    }
}

impl fmt::Display for TargetColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetColumn {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "isFraud" => Ok(TargetColumn::IsFraud),
            "isFlaggedFraud" => Ok(TargetColumn::IsFlaggedFraud),
            other => bail!("Unknown target column '{}'", other),
        }
    }
}

/// Per-class row counts of a label vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub legitimate: usize,
    pub fraud: usize,
}

impl ClassCounts {
    pub fn of(labels: &Array1<u8>) -> Self {
        let fraud = labels.iter().filter(|&&y| y == 1).count();
        Self {
            legitimate: labels.len() - fraud,
            fraud,
        }
    }

    pub fn total(&self) -> usize {
        self.legitimate + self.fraud
    }
}

/// Feature matrix X, labels y and the frozen feature-name list
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: FeatureFrame,
    pub labels: Array1<u8>,
}

impl Dataset {
    pub fn feature_names(&self) -> &[String] {
        self.features.columns()
    }

    /// Split into `(X, y, feature_names)`
    pub fn into_parts(self) -> (Array2<f64>, Array1<u8>, Vec<String>) {
        let names = self.features.columns().to_vec();
        (self.features.into_values(), self.labels, names)
    }
}

/// Builds the training dataset and freezes its feature list
pub struct DatasetAssembler {
    extractor: FeatureExtractor,
    target: TargetColumn,
}

impl DatasetAssembler {
    pub fn new(target: TargetColumn) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            target,
        }
    }

    /// Assemble X / y from labelled records.
    ///
    /// Rows without a target value are dropped. The resulting feature-name
    /// list is written to `store` so serving can align to it later.
    pub fn assemble(&self, transactions: &[Transaction], store: &ArtifactStore) -> Result<Dataset> {
        let (labelled, labels): (Vec<Transaction>, Vec<u8>) = transactions
            .iter()
            .filter_map(|tx| self.target.label(tx).map(|y| (tx.clone(), y)))
            .unzip();

        let dropped = transactions.len() - labelled.len();
        if dropped > 0 {
            info!(dropped, target = %self.target, "Dropped rows with missing target");
        }
        if labelled.is_empty() {
            bail!("No rows with a '{}' label to train on", self.target);
        }
        if let Some(bad) = labels.iter().find(|&&y| y > 1) {
            bail!("Target '{}' must be 0 or 1, found {}", self.target, bad);
        }

        let features = self.extractor.extract(&labelled);
        store.save_features(features.columns())?;

        debug!(
            rows = features.n_rows(),
            columns = features.n_cols(),
            "Assembled training dataset"
        );

        Ok(Dataset {
            features,
            labels: Array1::from(labels),
        })
    }
}

/// Held-out evaluation split next to the training split
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<u8>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<u8>,
}

/// Split rows so that each class keeps its proportion in both halves.
///
/// `round(class_rows * test_size)` rows of every class go to the test
/// split. Rows keep their original relative order inside each split.
pub fn stratified_split(
    x: &Array2<f64>,
    y: &Array1<u8>,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        bail!("test_size must be in (0, 1), got {}", test_size);
    }
    if x.nrows() != y.len() {
        bail!("X has {} rows but y has {}", x.nrows(), y.len());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_idx = Vec::with_capacity(y.len());
    let mut test_idx = Vec::new();

    for class in [0u8, 1u8] {
        let mut rows: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect();
        rows.shuffle(&mut rng);

        let n_test = ((rows.len() as f64) * test_size).round() as usize;
        let n_test = n_test.min(rows.len());
        test_idx.extend_from_slice(&rows[..n_test]);
        train_idx.extend_from_slice(&rows[n_test..]);
    }

    train_idx.sort_unstable();
    test_idx.sort_unstable();

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_idx),
        y_train: y.select(Axis(0), &train_idx),
        x_test: x.select(Axis(0), &test_idx),
        y_test: y.select(Axis(0), &test_idx),
    })
}
