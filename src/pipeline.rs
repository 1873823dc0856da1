//! End-to-end training run: load, inspect, assemble, split, resample, fit,
//! evaluate and persist

use crate::config::AppConfig;
use crate::dataset::{stratified_split, ClassCounts, DatasetAssembler};
use crate::eda::{CorrelationMatrix, MissingValues, CORRELATION_THRESHOLD};
use crate::metrics::Evaluation;
use crate::models::booster::GradientBoostedClassifier;
use crate::models::store::ArtifactStore;
use crate::resample::Smote;
use crate::types::transaction::load_transactions;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Everything a training run reports
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub rows_loaded: usize,
    pub missing_values: MissingValues,
    pub correlated_pairs: Vec<(&'static str, &'static str, f64)>,
    pub class_counts: ClassCounts,
    pub train_counts: ClassCounts,
    pub resampled_counts: ClassCounts,
    pub test_counts: ClassCounts,
    pub feature_names: Vec<String>,
    pub evaluation: Evaluation,
    pub run_id: Uuid,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Missing Values ===")?;
        write!(f, "{}", self.missing_values)?;

        writeln!(f, "\n=== Highly Correlated Pairs (|r| > {}) ===", CORRELATION_THRESHOLD)?;
        if self.correlated_pairs.is_empty() {
            writeln!(f, "none")?;
        }
        for (a, b, r) in &self.correlated_pairs {
            writeln!(f, "{:<16}{:<16}{:>8.4}", a, b, r)?;
        }

        writeln!(f, "\n=== Class Counts ===")?;
        writeln!(f, "0    {}", self.class_counts.legitimate)?;
        writeln!(f, "1    {}", self.class_counts.fraud)?;
        writeln!(
            f,
            "\nTraining split: {} legitimate / {} fraud, after resampling: {} / {}",
            self.train_counts.legitimate,
            self.train_counts.fraud,
            self.resampled_counts.legitimate,
            self.resampled_counts.fraud
        )?;
        writeln!(
            f,
            "Test split: {} legitimate / {} fraud\n",
            self.test_counts.legitimate, self.test_counts.fraud
        )?;

        writeln!(f, "{}", self.evaluation)?;
        write!(f, "\nModel run {} saved ({} features)", self.run_id, self.feature_names.len())
    }
}

/// Batch training pipeline driven by [`AppConfig`]
pub struct TrainingPipeline {
    config: AppConfig,
}

impl TrainingPipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<TrainingReport> {
        let started = Instant::now();
        let cfg = &self.config;
        let store = ArtifactStore::new(&cfg.artifacts.dir);

        let transactions = load_transactions(&cfg.data.csv_path)?;

        let missing_values = MissingValues::count(&transactions);
        let correlated_pairs =
            CorrelationMatrix::compute(&transactions).highly_correlated(CORRELATION_THRESHOLD);
        info!(
            missing = missing_values.total(),
            correlated_pairs = correlated_pairs.len(),
            "Data inspection complete"
        );

        let dataset = DatasetAssembler::new(cfg.training.target_column)
            .assemble(&transactions, &store)
            .context("Failed to assemble training dataset")?;
        let class_counts = ClassCounts::of(&dataset.labels);
        info!(
            legitimate = class_counts.legitimate,
            fraud = class_counts.fraud,
            "Class distribution"
        );

        let (x, y, feature_names) = dataset.into_parts();
        let split = stratified_split(&x, &y, cfg.training.test_size, cfg.training.seed)?;
        let train_counts = ClassCounts::of(&split.y_train);
        let test_counts = ClassCounts::of(&split.y_test);

        let (x_train, y_train) = Smote::new(cfg.resampling.k_neighbors, cfg.training.seed)
            .fit_resample(&split.x_train, &split.y_train)
            .context("Failed to resample training split")?;
        let resampled_counts = ClassCounts::of(&y_train);

        let mut model = GradientBoostedClassifier::new(cfg.booster.clone(), cfg.training.seed);
        model
            .fit(&x_train, &y_train)
            .context("Failed to train classifier")?;

        let probabilities = model.predict_proba(&split.x_test)?;
        let predictions = model.predict(&split.x_test)?;
        let evaluation = Evaluation::new(&split.y_test, &predictions, &probabilities);

        let run_id = store
            .save(&model, &feature_names)
            .context("Failed to save model artifacts")?;

        info!(
            run_id = %run_id,
            frauds_detected = evaluation.frauds_detected(),
            total_frauds = evaluation.total_frauds(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Training run complete"
        );

        Ok(TrainingReport {
            rows_loaded: transactions.len(),
            missing_values,
            correlated_pairs,
            class_counts,
            train_counts,
            resampled_counts,
            test_counts,
            feature_names,
            evaluation,
            run_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoosterConfig;
    use crate::models::store::{StoreError, FEATURES_FILE, MODEL_FILE};
    use std::fmt::Write as _;
    use std::path::Path;

    const HEADER: &str = "step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest,isFraud,isFlaggedFraud";

    fn write_csv(path: &Path) {
        let kinds = ["CASH_IN", "CASH_OUT", "DEBIT", "PAYMENT", "TRANSFER"];
        let mut csv = String::from(HEADER);
        csv.push('\n');
        for i in 0..200 {
            let fraud = i % 10 == 0;
            let kind = if fraud { "TRANSFER" } else { kinds[i % kinds.len()] };
            let old = 5000.0 + (i * 37 % 500) as f64;
            let amount = if fraud { old } else { 50.0 + (i * 13 % 400) as f64 };
            let new = old - amount;
            writeln!(
                csv,
                "{},{},{},C{},{},{},M{},0,{},{},0",
                i % 24 + 1,
                kind,
                amount,
                i,
                old,
                new,
                i,
                amount,
                u8::from(fraud)
            )
            .unwrap();
        }
        // unlabelled rows are dropped before training
        writeln!(csv, "1,PAYMENT,10,C999,100,90,M999,0,10,,").unwrap();
        std::fs::write(path, csv).unwrap();
    }

    fn test_config(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.data.csv_path = dir.join("transactions.csv");
        config.artifacts.dir = dir.join("artifacts");
        config.booster = BoosterConfig {
            n_estimators: 15,
            max_depth: 3,
            ..BoosterConfig::default()
        };
        config
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(&dir.path().join("transactions.csv"));
        let config = test_config(dir.path());

        let report = TrainingPipeline::new(config.clone()).run().unwrap();

        assert_eq!(report.rows_loaded, 201);
        assert_eq!(report.class_counts, ClassCounts { legitimate: 180, fraud: 20 });
        assert_eq!(report.test_counts, ClassCounts { legitimate: 36, fraud: 4 });
        assert_eq!(report.train_counts, ClassCounts { legitimate: 144, fraud: 16 });
        assert_eq!(report.resampled_counts, ClassCounts { legitimate: 144, fraud: 144 });
        assert_eq!(report.evaluation.confusion.total(), 40);

        assert!(config.artifacts.dir.join(MODEL_FILE).exists());
        assert!(config.artifacts.dir.join(FEATURES_FILE).exists());

        let loaded = ArtifactStore::new(&config.artifacts.dir).load().unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.features, report.feature_names);
        assert!(report.to_string().contains("Fraud detection accuracy"));
    }

    #[test]
    fn test_pipeline_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(&dir.path().join("transactions.csv"));
        let config = test_config(dir.path());

        let first = TrainingPipeline::new(config.clone()).run().unwrap();
        let second = TrainingPipeline::new(config).run().unwrap();

        assert_eq!(first.evaluation, second.evaluation);
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn test_missing_csv_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let err = TrainingPipeline::new(config).run().unwrap_err();
        assert!(format!("{:#}", err).contains("transactions.csv"));
    }

    #[test]
    fn test_failed_retrain_does_not_pair_old_model_with_new_features() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("transactions.csv");
        write_csv(&csv_path);
        let config = test_config(dir.path());
        TrainingPipeline::new(config.clone()).run().unwrap();

        // same width, WIRE instead of TRANSFER and no fraud rows: fails at resampling
        let kinds = ["CASH_IN", "CASH_OUT", "DEBIT", "PAYMENT", "WIRE"];
        let mut csv = String::from(HEADER);
        csv.push('\n');
        for i in 0..100 {
            writeln!(csv, "1,{},100,C{},1000,900,M{},0,100,0,0", kinds[i % kinds.len()], i, i).unwrap();
        }
        std::fs::write(&csv_path, csv).unwrap();

        let err = TrainingPipeline::new(config.clone()).run().unwrap_err();
        assert!(format!("{:#}", err).contains("single class"));

        let store = ArtifactStore::new(&config.artifacts.dir);
        assert!(store.load_features().unwrap().contains(&"type_WIRE".to_string()));
        assert!(matches!(store.load(), Err(StoreError::SchemaMismatch { .. })));
    }
}
