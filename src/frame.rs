//! Named-column feature matrix and train/serve schema alignment

use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView1, Axis};
use std::collections::HashMap;
use tracing::debug;

/// Dense numeric matrix whose columns carry names.
///
/// Rows are transactions, columns are features in a fixed order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureFrame {
    /// Create a frame from column names and a row-major matrix.
    ///
    /// Fails if the matrix width does not match the number of names.
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        ensure!(
            columns.len() == values.ncols(),
            "{} column names for a matrix {} columns wide",
            columns.len(),
            values.ncols()
        );
        Ok(Self { columns, values })
    }

    /// Frame whose width was fixed from `columns` by the caller
    pub(crate) fn from_columns(columns: Vec<String>, values: Array2<f64>) -> Self {
        debug_assert_eq!(columns.len(), values.ncols());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name).map(|i| self.values.column(i))
    }

    /// Keep only the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> FeatureFrame {
        FeatureFrame {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// Reshape this frame to exactly `feature_list`.
    ///
    /// Columns named in `feature_list` but absent here are zero-filled,
    /// columns present here but not named are dropped, and the output
    /// follows `feature_list` order.
    pub fn align_to(&self, feature_list: &[String]) -> FeatureFrame {
        let positions: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut values = Array2::<f64>::zeros((self.n_rows(), feature_list.len()));
        let mut missing = Vec::new();

        for (target, name) in feature_list.iter().enumerate() {
            match positions.get(name.as_str()) {
                Some(&source) => values.column_mut(target).assign(&self.values.column(source)),
                None => missing.push(name.as_str()),
            }
        }

        if !missing.is_empty() {
            debug!(columns = ?missing, "Zero-filled columns absent from batch");
        }

        let ignored = self
            .columns
            .iter()
            .filter(|c| !feature_list.contains(c))
            .count();
        if ignored > 0 {
            debug!(ignored, "Dropped columns unknown to the feature list");
        }

        FeatureFrame {
            columns: feature_list.to_vec(),
            values,
        }
    }
}
