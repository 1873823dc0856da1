//! Feature engineering shared by training and serving.
//!
//! Both paths go through [`FeatureExtractor::extract`], so the derived
//! columns are computed with the same formula and the same epsilon.

use crate::frame::FeatureFrame;
use crate::types::transaction::Transaction;
use ndarray::Array2;
use std::collections::BTreeSet;

/// Offset added to balance denominators to avoid division by zero
pub const RATIO_EPSILON: f64 = 1e-9;

/// Prefix of the one-hot transaction type columns
pub const TYPE_PREFIX: &str = "type_";

/// Raw numeric columns carried into the feature matrix, in CSV order
pub const RAW_NUMERIC_COLUMNS: [&str; 6] = [
    "step",
    "amount",
    "oldbalanceOrg",
    "newbalanceOrig",
    "oldbalanceDest",
    "newbalanceDest",
];

/// Derived columns appended after the raw ones
pub const ENGINEERED_COLUMNS: [&str; 4] = [
    "amount_to_oldbalance_ratio",
    "amount_to_newbalance_ratio",
    "balance_diff_org",
    "balance_diff_dest",
];

/// Columns that identify accounts or carry labels and never reach the model
pub const EXCLUDED_COLUMNS: [&str; 4] = ["nameOrig", "nameDest", "isFraud", "isFlaggedFraud"];

/// The four derived values for one transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineeredFeatures {
    pub amount_to_oldbalance_ratio: f64,
    pub amount_to_newbalance_ratio: f64,
    pub balance_diff_org: f64,
    pub balance_diff_dest: f64,
}

impl EngineeredFeatures {
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self {
            amount_to_oldbalance_ratio: tx.amount / (tx.old_balance_org + RATIO_EPSILON),
            amount_to_newbalance_ratio: tx.amount / (tx.new_balance_orig + RATIO_EPSILON),
            balance_diff_org: tx.old_balance_org - tx.new_balance_orig,
            balance_diff_dest: tx.new_balance_dest - tx.old_balance_dest,
        }
    }

    fn as_array(&self) -> [f64; 4] {
        [
            self.amount_to_oldbalance_ratio,
            self.amount_to_newbalance_ratio,
            self.balance_diff_org,
            self.balance_diff_dest,
        ]
    }
}

/// Feature extractor that turns transactions into model input columns.
///
/// Column order: raw numeric columns, engineered columns, then one
/// `type_<KIND>` indicator per transaction kind seen in the batch, sorted
/// by kind.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Build the feature frame for a batch of transactions.
    pub fn extract(&self, transactions: &[Transaction]) -> FeatureFrame {
        let kinds: Vec<&str> = transactions
            .iter()
            .map(|tx| tx.kind.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut columns: Vec<String> = RAW_NUMERIC_COLUMNS
            .iter()
            .chain(ENGINEERED_COLUMNS.iter())
            .map(|c| c.to_string())
            .collect();
        columns.extend(kinds.iter().map(|kind| format!("{}{}", TYPE_PREFIX, kind)));

        let width = columns.len();
        let mut values = Array2::<f64>::zeros((transactions.len(), width));

        for (row, tx) in transactions.iter().enumerate() {
            let raw = [
                tx.step,
                tx.amount,
                tx.old_balance_org,
                tx.new_balance_orig,
                tx.old_balance_dest,
                tx.new_balance_dest,
            ];
            let engineered = EngineeredFeatures::from_transaction(tx).as_array();

            let mut out = values.row_mut(row);
            for (col, value) in raw.iter().chain(engineered.iter()).enumerate() {
                out[col] = *value;
            }

            // kinds is sorted and contains every kind in the batch
            if let Ok(offset) = kinds.binary_search(&tx.kind.as_str()) {
                out[RAW_NUMERIC_COLUMNS.len() + ENGINEERED_COLUMNS.len() + offset] = 1.0;
            }
        }

        FeatureFrame::from_columns(columns, values)
    }

    /// Number of columns that do not depend on the batch's transaction kinds
    pub fn fixed_feature_count(&self) -> usize {
        RAW_NUMERIC_COLUMNS.len() + ENGINEERED_COLUMNS.len()
    }
}
