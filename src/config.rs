//! Configuration management for the fraud model pipeline

use crate::dataset::TargetColumn;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub artifacts: ArtifactsConfig,
    pub training: TrainingConfig,
    pub resampling: ResamplingConfig,
    pub booster: BoosterConfig,
    pub serving: ServingConfig,
    pub logging: LoggingConfig,
}

/// Input data configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Transaction CSV used for training and for the dashboard
    pub csv_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/Fraud.csv"),
        }
    }
}

/// Model/feature artifact locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory holding `model.bin` and `features.json`
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
        }
    }
}

/// Train/test split configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Label column ("isFraud" or "isFlaggedFraud")
    pub target_column: TargetColumn,
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    /// Seed shared by the split, the resampler and the booster
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: TargetColumn::IsFraud,
            test_size: 0.2,
            seed: 42,
        }
    }
}

/// SMOTE configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResamplingConfig {
    /// Number of nearest minority neighbours used for interpolation
    pub k_neighbors: usize,
}

impl Default for ResamplingConfig {
    fn default() -> Self {
        Self { k_neighbors: 5 }
    }
}

/// Gradient boosting hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to every leaf value
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum hessian sum required in each child
    pub min_child_weight: f64,
    /// L2 regularisation on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction required to split
    pub gamma: f64,
    /// Row subsampling ratio per tree
    pub subsample: f64,
    /// Column subsampling ratio per tree
    pub colsample_bytree: f64,
    /// Maximum histogram bins per feature
    pub max_bins: usize,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            max_bins: 256,
        }
    }
}

/// Dashboard API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    /// Socket address the dashboard API binds to
    pub bind_addr: String,
    /// Initial value of the probability threshold control
    pub default_threshold: f64,
    /// Number of rows in the top-risk ranking
    pub top_n: usize,
    /// Number of bins in the probability histogram
    pub histogram_bins: usize,
    /// Step of the minimum amount control
    pub amount_step: f64,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8050".to_string(),
            default_threshold: 0.5,
            top_n: 10,
            histogram_bins: 50,
            amount_step: 1000.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file and the environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path.
    ///
    /// The file is optional; `FRAUD__SECTION__KEY` environment variables
    /// override whatever it sets.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("FRAUD")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.data.csv_path, PathBuf::from("data/Fraud.csv"));
        assert_eq!(config.training.test_size, 0.2);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.target_column, TargetColumn::IsFraud);
        assert_eq!(config.resampling.k_neighbors, 5);
        assert_eq!(config.serving.default_threshold, 0.5);
        assert_eq!(config.serving.histogram_bins, 50);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.booster, BoosterConfig::default());
        assert_eq!(config.artifacts.dir, PathBuf::from("artifacts"));
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[booster]\nn_estimators = 10\nmax_depth = 3\n\n[training]\ntarget_column = \"isFlaggedFraud\""
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.booster.n_estimators, 10);
        assert_eq!(config.booster.max_depth, 3);
        assert_eq!(config.booster.learning_rate, 0.3);
        assert_eq!(config.training.target_column, TargetColumn::IsFlaggedFraud);
        assert_eq!(config.training.seed, 42);
    }
}
