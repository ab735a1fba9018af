//! System endpoints: home page and health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;

/// Browser client served at `/`.
const HOME_PAGE: &str = include_str!("../../../static/index.html");

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    sessions: usize,
    dropped_messages: u64,
}

/// `GET /` — Minimal browser client for subscribing and publishing.
pub async fn home_handler() -> impl IntoResponse {
    Html(HOME_PAGE)
}

/// `GET /health` — Service health status and hub counters.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            sessions: state.registry.len().await,
            dropped_messages: state.registry.dropped_total(),
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
}
