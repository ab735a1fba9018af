//! HTTP surface: route handlers and router composition.
//!
//! Plain HTTP routes get a request timeout; the WebSocket route does not,
//! since an upgraded connection lives as long as its session.

pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the router of plain HTTP endpoints.
pub fn build_router() -> Router<AppState> {
    handlers::routes()
}

/// Builds the complete application: HTTP endpoints plus `/ws`.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`;
/// the WebSocket handler records each peer's address.
pub fn build_app(state: AppState, http_timeout: Duration) -> Router {
    let http = build_router().layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        http_timeout,
    ));

    Router::new()
        .merge(http)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
