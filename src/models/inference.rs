//! Inference engine for scoring raw transactions with a stored model

use crate::feature_extractor::{EngineeredFeatures, FeatureExtractor};
use crate::frame::FeatureFrame;
use crate::models::booster::{GradientBoostedClassifier, DECISION_THRESHOLD};
use crate::models::store::{ArtifactStore, LoadedModel};
use crate::types::scored::{Prediction, ScoredTransaction};
use crate::types::transaction::Transaction;
use anyhow::{Context, Result};
use ndarray::Array1;
use tracing::{debug, info};
use uuid::Uuid;

/// Scores transactions against the trained classifier.
///
/// Every batch goes through the same feature extraction as training and is
/// then aligned to the stored feature list, so batches missing some
/// transaction types still produce the column layout the model expects.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    model: GradientBoostedClassifier,
    features: Vec<String>,
    extractor: FeatureExtractor,
    run_id: Uuid,
}

impl InferenceEngine {
    /// Load the model and feature list from an artifact store
    pub fn from_store(store: &ArtifactStore) -> Result<Self> {
        let loaded = store
            .load()
            .context("Failed to load model artifacts")?;
        Ok(Self::from_loaded(loaded))
    }

    pub fn from_loaded(loaded: LoadedModel) -> Self {
        info!(
            run_id = %loaded.run_id,
            features = loaded.features.len(),
            trees = loaded.model.n_trees(),
            "Inference engine initialized"
        );
        Self {
            model: loaded.model,
            features: loaded.features,
            extractor: FeatureExtractor::new(),
            run_id: loaded.run_id,
        }
    }

    /// Ordered feature names the model was trained on
    pub fn feature_names(&self) -> &[String] {
        &self.features
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Engineer features for a batch and align them to the stored schema
    pub fn features_for(&self, transactions: &[Transaction]) -> FeatureFrame {
        let frame = self.extractor.extract(transactions);
        frame.align_to(&self.features)
    }

    /// Fraud probability per transaction
    pub fn predict_proba(&self, transactions: &[Transaction]) -> Result<Array1<f64>> {
        if transactions.is_empty() {
            return Ok(Array1::zeros(0));
        }
        let frame = self.features_for(transactions);
        let proba = self.model.predict_proba(frame.values())?;
        debug!(rows = transactions.len(), "Scored batch");
        Ok(proba)
    }

    /// Fraud label per transaction
    pub fn predict(&self, transactions: &[Transaction]) -> Result<Array1<u8>> {
        Ok(self
            .predict_proba(transactions)?
            .mapv(|p| u8::from(p > DECISION_THRESHOLD)))
    }

    /// Score a batch and attach predictions and balance deltas to each row
    pub fn score(&self, transactions: &[Transaction]) -> Result<Vec<ScoredTransaction>> {
        let proba = self.predict_proba(transactions)?;
        Ok(transactions
            .iter()
            .zip(proba.iter())
            .map(|(tx, &p)| {
                let engineered = EngineeredFeatures::from_transaction(tx);
                ScoredTransaction {
                    transaction: tx.clone(),
                    prediction: Prediction {
                        fraud_probability: p,
                        is_fraud: p > DECISION_THRESHOLD,
                    },
                    balance_diff_org: engineered.balance_diff_org,
                    balance_diff_dest: engineered.balance_diff_dest,
                }
            })
            .collect())
    }
}
