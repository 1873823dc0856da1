//! Fraud Model Pipeline Library
//!
//! Trains a gradient-boosted fraud classifier on PaySim-style mobile-money
//! transactions and serves its scores through a dashboard API.

pub mod config;
pub mod dataset;
pub mod eda;
pub mod feature_extractor;
pub mod frame;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod resample;
pub mod serving;
pub mod types;

pub use config::AppConfig;
pub use feature_extractor::FeatureExtractor;
pub use frame::FeatureFrame;
pub use models::inference::InferenceEngine;
pub use pipeline::{TrainingPipeline, TrainingReport};
pub use serving::ServingContext;
pub use types::{scored::ScoredTransaction, transaction::Transaction};
