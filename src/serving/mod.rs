//! Dashboard API over the scored transaction dataset

pub mod context;
pub mod error;
pub mod handlers;
pub mod views;

pub use context::ServingContext;
pub use error::{ApiError, ApiResult};
pub use handlers::create_router;
