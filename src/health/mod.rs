//! Health check endpoints

use crate::api::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub hub: String,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub hub: String,
    pub negotiator_configured: bool,
    pub broadcaster: &'static str,
}

/// Health routes, mounted by [`crate::api::router`]
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
}

/// Health endpoint - always returns 200 if process is running
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        hub: state.hub,
    })
}

/// Readiness endpoint - returns 200 once clients can negotiate
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let negotiator_configured = state.negotiator.is_some();

    let response = ReadyResponse {
        ready: negotiator_configured,
        hub: state.hub.clone(),
        negotiator_configured,
        broadcaster: state.broadcaster.kind(),
    };

    if negotiator_configured {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Metrics endpoint - returns Prometheus format metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
}
