//! Fraud Model Pipeline - Training Entry Point
//!
//! Loads the transaction CSV, trains the classifier, prints the evaluation
//! and writes the model and feature-list artifacts.

use anyhow::Result;
use fraud_model_pipeline::{config::AppConfig, logging, pipeline::TrainingPipeline};
use std::process::ExitCode;
use tracing::{error, info};

fn run() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging)?;

    info!("Starting fraud model training");
    info!(
        csv = %config.data.csv_path.display(),
        target = %config.training.target_column,
        test_size = config.training.test_size,
        seed = config.training.seed,
        estimators = config.booster.n_estimators,
        "Configuration loaded"
    );

    let report = TrainingPipeline::new(config).run()?;
    println!("{}", report);
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Training failed");
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
