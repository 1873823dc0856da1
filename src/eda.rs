//! Pre-training data checks: missing values and correlated columns

use crate::types::transaction::Transaction;
use serde::Serialize;
use std::fmt;

/// Correlation magnitude above which a column pair is reported
pub const CORRELATION_THRESHOLD: f64 = 0.7;

/// Missing-value count per input column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingValues {
    pub counts: Vec<(&'static str, usize)>,
}

impl MissingValues {
    pub fn count(transactions: &[Transaction]) -> Self {
        let count_nan = |f: fn(&Transaction) -> f64| transactions.iter().filter(|tx| f(tx).is_nan()).count();
        let count_blank = |f: fn(&Transaction) -> &str| transactions.iter().filter(|tx| f(tx).is_empty()).count();

        let counts = vec![
            ("step", count_nan(|tx| tx.step)),
            ("type", count_blank(|tx| tx.kind.as_str())),
            ("amount", count_nan(|tx| tx.amount)),
            ("nameOrig", count_blank(|tx| tx.name_orig.as_str())),
            ("oldbalanceOrg", count_nan(|tx| tx.old_balance_org)),
            ("newbalanceOrig", count_nan(|tx| tx.new_balance_orig)),
            ("nameDest", count_blank(|tx| tx.name_dest.as_str())),
            ("oldbalanceDest", count_nan(|tx| tx.old_balance_dest)),
            ("newbalanceDest", count_nan(|tx| tx.new_balance_dest)),
            ("isFraud", transactions.iter().filter(|tx| tx.is_fraud.is_none()).count()),
            (
                "isFlaggedFraud",
                transactions.iter().filter(|tx| tx.is_flagged_fraud.is_none()).count(),
            ),
        ];

        Self { counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

impl fmt::Display for MissingValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, count) in &self.counts {
            writeln!(f, "{:<16}{:>10}", name, count)?;
        }
        Ok(())
    }
}

const NUMERIC_COLUMNS: [&str; 8] = [
    "step",
    "amount",
    "oldbalanceOrg",
    "newbalanceOrig",
    "oldbalanceDest",
    "newbalanceDest",
    "isFraud",
    "isFlaggedFraud",
];

fn numeric_row(tx: &Transaction) -> [f64; 8] {
    let label = |v: Option<u8>| v.map_or(f64::NAN, f64::from);
    [
        tx.step,
        tx.amount,
        tx.old_balance_org,
        tx.new_balance_orig,
        tx.old_balance_dest,
        tx.new_balance_dest,
        label(tx.is_fraud),
        label(tx.is_flagged_fraud),
    ]
}

/// Pearson correlation between two columns over rows where both are present.
/// NaN when fewer than two such rows exist or either column is constant.
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(&x, &y)| (x, y))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    cov / (var_a * var_b).sqrt()
}

/// Pairwise Pearson correlations of the numeric input columns
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<&'static str>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn compute(transactions: &[Transaction]) -> Self {
        let rows: Vec<[f64; 8]> = transactions.iter().map(numeric_row).collect();
        let columns: Vec<Vec<f64>> = (0..NUMERIC_COLUMNS.len())
            .map(|c| rows.iter().map(|r| r[c]).collect())
            .collect();

        let values = (0..columns.len())
            .map(|i| {
                (0..columns.len())
                    .map(|j| if i == j { 1.0 } else { pearson(&columns[i], &columns[j]) })
                    .collect()
            })
            .collect();

        Self {
            columns: NUMERIC_COLUMNS.to_vec(),
            values,
        }
    }

    /// Distinct column pairs whose |correlation| exceeds `threshold`
    pub fn highly_correlated(&self, threshold: f64) -> Vec<(&'static str, &'static str, f64)> {
        let mut pairs = Vec::new();
        for i in 0..self.columns.len() {
            for j in (i + 1)..self.columns.len() {
                let r = self.values[i][j];
                if r.abs() > threshold {
                    pairs.push((self.columns[i], self.columns[j], r));
                }
            }
        }
        pairs
    }
}

impl fmt::Display for CorrelationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<16}", "")?;
        for name in &self.columns {
            write!(f, "{:>16}", name)?;
        }
        writeln!(f)?;
        for (name, row) in self.columns.iter().zip(&self.values) {
            write!(f, "{:<16}", name)?;
            for r in row {
                write!(f, "{:>16.4}", r)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
