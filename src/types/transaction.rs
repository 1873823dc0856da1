//! Transaction records as they appear in the PaySim-style CSV

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::info;

/// A single mobile-money transaction.
///
/// Numeric cells left empty in the source file become NaN so that they
/// propagate through feature engineering instead of failing the load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Simulation hour the transaction happened in
    #[serde(default, deserialize_with = "nan_if_missing")]
    pub step: f64,

    /// Transaction kind (CASH_IN, CASH_OUT, DEBIT, PAYMENT, TRANSFER)
    #[serde(rename = "type")]
    pub kind: String,

    /// Transaction amount
    #[serde(default = "missing_number", deserialize_with = "nan_if_missing")]
    pub amount: f64,

    /// Originating account
    #[serde(rename = "nameOrig", default)]
    pub name_orig: String,

    /// Origin balance before the transaction
    #[serde(rename = "oldbalanceOrg", default = "missing_number", deserialize_with = "nan_if_missing")]
    pub old_balance_org: f64,

    /// Origin balance after the transaction
    #[serde(rename = "newbalanceOrig", default = "missing_number", deserialize_with = "nan_if_missing")]
    pub new_balance_orig: f64,

    /// Destination account
    #[serde(rename = "nameDest", default)]
    pub name_dest: String,

    /// Destination balance before the transaction
    #[serde(rename = "oldbalanceDest", default = "missing_number", deserialize_with = "nan_if_missing")]
    pub old_balance_dest: f64,

    /// Destination balance after the transaction
    #[serde(rename = "newbalanceDest", default = "missing_number", deserialize_with = "nan_if_missing")]
    pub new_balance_dest: f64,

    /// Ground-truth fraud label
    #[serde(rename = "isFraud", default)]
    pub is_fraud: Option<u8>,

    /// Label raised by the legacy rule engine
    #[serde(rename = "isFlaggedFraud", default)]
    pub is_flagged_fraud: Option<u8>,
}

fn missing_number() -> f64 {
    f64::NAN
}

fn nan_if_missing<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl Transaction {
    /// Create a transaction with zero balances and no labels
    pub fn new(kind: &str, amount: f64) -> Self {
        Self {
            step: 1.0,
            kind: kind.to_string(),
            amount,
            name_orig: String::new(),
            old_balance_org: 0.0,
            new_balance_orig: 0.0,
            name_dest: String::new(),
            old_balance_dest: 0.0,
            new_balance_dest: 0.0,
            is_fraud: None,
            is_flagged_fraud: None,
        }
    }

    /// Set origin and destination balances
    pub fn with_balances(
        mut self,
        old_balance_org: f64,
        new_balance_orig: f64,
        old_balance_dest: f64,
        new_balance_dest: f64,
    ) -> Self {
        self.old_balance_org = old_balance_org;
        self.new_balance_orig = new_balance_orig;
        self.old_balance_dest = old_balance_dest;
        self.new_balance_dest = new_balance_dest;
        self
    }

    /// Set account names
    pub fn with_accounts(mut self, name_orig: &str, name_dest: &str) -> Self {
        self.name_orig = name_orig.to_string();
        self.name_dest = name_dest.to_string();
        self
    }

    /// Set the fraud label
    pub fn with_label(mut self, is_fraud: u8) -> Self {
        self.is_fraud = Some(is_fraud);
        self.is_flagged_fraud = Some(0);
        self
    }
}

/// Read every transaction from a CSV file with a header row
pub fn load_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<Transaction>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open transaction file {}", path.display()))?;

    let transactions = reader
        .deserialize::<Transaction>()
        .enumerate()
        .map(|(row, record)| {
            record.with_context(|| format!("Malformed record at row {} of {}", row + 1, path.display()))
        })
        .collect::<Result<Vec<Transaction>>>()?;

    info!(
        path = %path.display(),
        rows = transactions.len(),
        "Loaded transactions"
    );

    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest,isFraud,isFlaggedFraud";

    fn write_csv(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        write!(file, "{}", body).unwrap();
        file
    }

    #[test]
    fn test_load_paysim_rows() {
        let file = write_csv(
            "1,PAYMENT,9839.64,C1231006815,170136.0,160296.36,M1979787155,0.0,0.0,0,0\n\
             1,TRANSFER,181.0,C1305486145,181.0,0.0,C553264065,0.0,0.0,1,0\n",
        );

        let transactions = load_transactions(file.path()).unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].kind, "PAYMENT");
        assert_eq!(transactions[0].name_orig, "C1231006815");
        assert_eq!(transactions[0].old_balance_org, 170136.0);
        assert_eq!(transactions[1].is_fraud, Some(1));
        assert_eq!(transactions[1].is_flagged_fraud, Some(0));
    }

    #[test]
    fn test_empty_cells_become_nan_or_none() {
        let file = write_csv("1,CASH_OUT,,C1,100.0,,C2,0.0,0.0,,0\n");

        let transactions = load_transactions(file.path()).unwrap();
        assert!(transactions[0].amount.is_nan());
        assert!(transactions[0].new_balance_orig.is_nan());
        assert_eq!(transactions[0].is_fraud, None);
    }

    #[test]
    fn test_missing_step_column_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest"
        )
        .unwrap();
        writeln!(file, "DEBIT,10.0,C1,20.0,10.0,C2,0.0,10.0").unwrap();

        let transactions = load_transactions(file.path()).unwrap();
        assert_eq!(transactions[0].step, 0.0);
        assert_eq!(transactions[0].is_fraud, None);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_transactions(dir.path().join("Fraud.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to open transaction file"));
    }

    #[test]
    fn test_transaction_json_roundtrip() {
        let tx = Transaction::new("CASH_OUT", 250.0)
            .with_balances(500.0, 250.0, 0.0, 250.0)
            .with_accounts("C1", "C2");

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"type\":\"CASH_OUT\""));
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }
}
