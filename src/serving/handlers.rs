//! HTTP routes of the dashboard API

use crate::serving::context::ServingContext;
use crate::serving::error::{ApiError, ApiResult};
use crate::serving::views::{ControlsView, DashboardFilter, DashboardQuery, DashboardView};
use crate::types::scored::Prediction;
use crate::types::transaction::Transaction;
use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::Uri,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

pub type SharedContext = Arc<ServingContext>;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model_run_id: String,
    rows: usize,
    timestamp: i64,
}

pub async fn health(State(ctx): State<SharedContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_run_id: ctx.engine().run_id().to_string(),
        rows: ctx.scored().len(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

pub async fn controls(State(ctx): State<SharedContext>) -> Json<ControlsView> {
    Json(ControlsView::build(&ctx))
}

pub async fn dashboard(
    State(ctx): State<SharedContext>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<DashboardView>> {
    let filter = DashboardFilter::resolve(query, &ctx)?;
    // filtering and ranking walk the whole scored dataset
    let view = tokio::task::spawn_blocking(move || DashboardView::build(&ctx, filter))
        .await
        .context("Dashboard view task failed")?;
    debug!(
        prob_threshold = filter.prob_threshold,
        min_amount = filter.min_amount,
        matched = view.matched,
        "Dashboard view computed"
    );
    Ok(Json(view))
}

pub async fn score(
    State(ctx): State<SharedContext>,
    Json(transactions): Json<Vec<Transaction>>,
) -> ApiResult<Json<Vec<Prediction>>> {
    let scored = ctx.engine().score(&transactions)?;
    Ok(Json(scored.into_iter().map(|s| s.prediction).collect()))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}

/// Build the router with all dashboard routes
pub fn create_router(ctx: SharedContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/controls", get(controls))
        .route("/api/dashboard", get(dashboard))
        .route("/api/score", post(score))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serving::context::fixture;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(Arc::new(fixture::context()))
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn get_uri(uri: &str) -> Response {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = get_uri("/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["rows"], 60);
    }

    #[tokio::test]
    async fn test_controls() {
        let body = json_body(get_uri("/api/controls").await).await;
        assert_eq!(body["prob_threshold"]["max"], 1.0);
        assert_eq!(body["min_amount"]["default"], 105.0);
    }

    #[tokio::test]
    async fn test_dashboard_with_query() {
        let response = get_uri("/api/dashboard?prob_threshold=0&min_amount=1000").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["matched"], 10);
        assert_eq!(body["histogram"].as_array().unwrap().len(), 50);
        assert_eq!(body["type_breakdown"].as_array().unwrap().len(), 5);
        assert_eq!(body["top_transactions"][0]["type"], "TRANSFER");
    }

    #[tokio::test]
    async fn test_dashboard_threshold_one_is_empty() {
        let response = get_uri("/api/dashboard?prob_threshold=1.0").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["matched"], 0);
        assert!(body["top_transactions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_rejects_out_of_range_threshold() {
        let response = get_uri("/api/dashboard?prob_threshold=1.5").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().unwrap().contains("prob_threshold"));
    }

    #[tokio::test]
    async fn test_dashboard_rejects_non_finite_amount() {
        let response = get_uri("/api/dashboard?min_amount=inf").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_score_endpoint() {
        let payload = serde_json::json!([
            {"type": "CASH_OUT", "amount": 150.0, "oldbalanceOrg": 1000.0, "newbalanceOrig": 850.0},
            {"type": "TRANSFER", "amount": 2500.0, "oldbalanceOrg": 2500.0, "newbalanceOrig": 0.0,
             "oldbalanceDest": 0.0, "newbalanceDest": 2500.0}
        ]);
        let request = Request::builder()
            .method("POST")
            .uri("/api/score")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let predictions = body.as_array().unwrap();
        assert_eq!(predictions.len(), 2);
        for p in predictions {
            let prob = p["fraud_probability"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&prob));
        }
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = get_uri("/api/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["status"], 404);
    }
}
