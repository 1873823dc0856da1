//! Model and feature-list artifact store

use crate::models::booster::GradientBoostedClassifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// File name of the serialized classifier
pub const MODEL_FILE: &str = "model.bin";
/// File name of the frozen feature list
pub const FEATURES_FILE: &str = "features.json";

const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{artifact} artifact not found at {path} (run training first)")]
    NotFound { artifact: &'static str, path: PathBuf },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode or decode model artifact")]
    Model(#[from] bincode::Error),

    #[error("failed to encode or decode feature list")]
    Features(#[from] serde_json::Error),

    #[error("model artifact format {found} is not supported (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("feature list does not match the model: {detail}")]
    SchemaMismatch { detail: String },
}

/// Envelope written to `model.bin`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub run_id: Uuid,
    pub trained_at: DateTime<Utc>,
    /// Ordered feature names the model was fitted on
    pub features: Vec<String>,
    pub model: GradientBoostedClassifier,
}

/// Classifier and feature list loaded back from disk
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub run_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub model: GradientBoostedClassifier,
    pub features: Vec<String>,
}

/// Reads and writes artifacts under a fixed directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn features_path(&self) -> PathBuf {
        self.dir.join(FEATURES_FILE)
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    fn read(&self, artifact: &'static str, path: PathBuf) -> Result<Vec<u8>, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound { artifact, path });
        }
        fs::read(&path).map_err(|source| StoreError::Io { path, source })
    }

    /// Write next to `path` first, then rename over it
    fn write(&self, path: PathBuf, bytes: &[u8]) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let mut staged = path.clone().into_os_string();
        staged.push(".tmp");
        let staged = PathBuf::from(staged);

        fs::write(&staged, bytes).map_err(|source| StoreError::Io {
            path: staged.clone(),
            source,
        })?;
        fs::rename(&staged, &path).map_err(|source| StoreError::Io { path, source })
    }

    /// Persist the ordered feature-name list
    pub fn save_features(&self, features: &[String]) -> Result<(), StoreError> {
        let path = self.features_path();
        let bytes = serde_json::to_vec_pretty(features)?;
        self.write(path.clone(), &bytes)?;
        info!(path = %path.display(), count = features.len(), "Saved feature list");
        Ok(())
    }

    pub fn load_features(&self) -> Result<Vec<String>, StoreError> {
        let bytes = self.read("feature list", self.features_path())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist the classifier and the feature list it was trained on.
    ///
    /// Returns the run id stamped on the model artifact.
    pub fn save(
        &self,
        model: &GradientBoostedClassifier,
        features: &[String],
    ) -> Result<Uuid, StoreError> {
        if model.n_features() != features.len() {
            return Err(StoreError::SchemaMismatch {
                detail: format!(
                    "model expects {} features but {} were given",
                    model.n_features(),
                    features.len()
                ),
            });
        }

        let artifact = ModelArtifact {
            format_version: FORMAT_VERSION,
            run_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            features: features.to_vec(),
            model: model.clone(),
        };

        let path = self.model_path();
        self.write(path.clone(), &bincode::serialize(&artifact)?)?;
        self.save_features(features)?;

        info!(
            run_id = %artifact.run_id,
            path = %path.display(),
            trees = model.n_trees(),
            "Saved model artifact"
        );

        Ok(artifact.run_id)
    }

    /// Load the classifier and its feature list.
    ///
    /// Fails with [`StoreError::NotFound`] when either file is absent.
    pub fn load(&self) -> Result<LoadedModel, StoreError> {
        let bytes = self.read("model", self.model_path())?;
        let artifact: ModelArtifact = bincode::deserialize(&bytes)?;
        if artifact.format_version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedFormat {
                found: artifact.format_version,
                expected: FORMAT_VERSION,
            });
        }

        if artifact.model.n_features() != artifact.features.len() {
            return Err(StoreError::SchemaMismatch {
                detail: format!(
                    "model expects {} features but its artifact names {}",
                    artifact.model.n_features(),
                    artifact.features.len()
                ),
            });
        }

        let features = self.load_features()?;
        check_same_features(&artifact.features, &features)?;

        info!(
            run_id = %artifact.run_id,
            trained_at = %artifact.trained_at,
            features = features.len(),
            "Loaded model artifact"
        );

        Ok(LoadedModel {
            run_id: artifact.run_id,
            trained_at: artifact.trained_at,
            model: artifact.model,
            features,
        })
    }
}

/// The feature list on disk must name the model's columns exactly, in order
fn check_same_features(model: &[String], stored: &[String]) -> Result<(), StoreError> {
    if model.len() != stored.len() {
        return Err(StoreError::SchemaMismatch {
            detail: format!(
                "model has {} features, {} lists {}",
                model.len(),
                FEATURES_FILE,
                stored.len()
            ),
        });
    }
    if let Some((i, (m, s))) = model.iter().zip(stored).enumerate().find(|(_, (m, s))| m != s) {
        return Err(StoreError::SchemaMismatch {
            detail: format!("column {} is '{}' in the model but '{}' in {}", i, m, s, FEATURES_FILE),
        });
    }
    Ok(())
}
