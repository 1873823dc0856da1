//! Classifier, artifact store and inference components

pub mod booster;
pub mod histogram;
pub mod inference;
pub mod store;
pub mod tree;

pub use booster::{GradientBoostedClassifier, DECISION_THRESHOLD};
pub use inference::InferenceEngine;
pub use store::{ArtifactStore, LoadedModel, StoreError};
