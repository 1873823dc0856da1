//! Read-only state shared by every dashboard request

use crate::config::{AppConfig, ServingConfig};
use crate::models::inference::InferenceEngine;
use crate::models::store::ArtifactStore;
use crate::types::scored::ScoredTransaction;
use crate::types::transaction::{load_transactions, Transaction};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use tracing::info;

/// Scored dataset plus everything the views derive their controls from.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug)]
pub struct ServingContext {
    engine: InferenceEngine,
    scored: Vec<ScoredTransaction>,
    amount_range: (f64, f64),
    categories: Vec<String>,
    config: ServingConfig,
}

impl ServingContext {
    /// Load the transaction CSV and model artifacts, then score every row
    pub fn build(config: &AppConfig) -> Result<Self> {
        let store = ArtifactStore::new(&config.artifacts.dir);
        let engine = InferenceEngine::from_store(&store)?;
        let transactions = load_transactions(&config.data.csv_path)?;
        Self::from_parts(engine, transactions, config.serving.clone())
    }

    pub fn from_parts(
        engine: InferenceEngine,
        transactions: Vec<Transaction>,
        config: ServingConfig,
    ) -> Result<Self> {
        let scored = engine
            .score(&transactions)
            .context("Failed to score transactions")?;

        let amounts = scored.iter().map(|s| s.amount()).filter(|a| a.is_finite());
        let amount_range = amounts
            .fold(None, |range: Option<(f64, f64)>, a| match range {
                None => Some((a, a)),
                Some((lo, hi)) => Some((lo.min(a), hi.max(a))),
            })
            .unwrap_or((0.0, 0.0));

        let categories: Vec<String> = scored
            .iter()
            .map(|s| s.kind().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let flagged = scored.iter().filter(|s| s.prediction.is_fraud).count();
        info!(
            rows = scored.len(),
            flagged,
            categories = categories.len(),
            min_amount = amount_range.0,
            max_amount = amount_range.1,
            "Serving context ready"
        );

        Ok(Self {
            engine,
            scored,
            amount_range,
            categories,
            config,
        })
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn scored(&self) -> &[ScoredTransaction] {
        &self.scored
    }

    /// Observed (min, max) of finite amounts, `(0, 0)` for an empty dataset
    pub fn amount_range(&self) -> (f64, f64) {
        self.amount_range
    }

    /// Transaction types in the full dataset, sorted
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn config(&self) -> &ServingConfig {
        &self.config
    }
}
