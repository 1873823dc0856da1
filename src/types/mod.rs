//! Type definitions for the fraud model pipeline

pub mod scored;
pub mod transaction;

pub use scored::{Prediction, ScoredTransaction};
pub use transaction::{load_transactions, Transaction};
