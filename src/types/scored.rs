//! Model output attached to the transaction it was computed for

use crate::types::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Fraud probability and thresholded label for one row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Model-estimated probability of fraud (0.0 - 1.0)
    pub fraud_probability: f64,
    /// Label at the model's decision threshold
    pub is_fraud: bool,
}

/// A transaction together with its prediction and the balance deltas the
/// dashboard shows alongside it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTransaction {
    pub transaction: Transaction,
    pub prediction: Prediction,
    pub balance_diff_org: f64,
    pub balance_diff_dest: f64,
}

impl ScoredTransaction {
    pub fn fraud_probability(&self) -> f64 {
        self.prediction.fraud_probability
    }

    pub fn amount(&self) -> f64 {
        self.transaction.amount
    }

    pub fn kind(&self) -> &str {
        &self.transaction.kind
    }
}
