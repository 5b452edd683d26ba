//! API Router configuration

use super::call_handler::{health, incoming_call};
use super::media_stream::media_stream_handler;
use super::metrics_handler::metrics_handler;
use crate::config::Config;
use crate::infrastructure::bridge::CallSessionBridge;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub bridge: Arc<CallSessionBridge>,
}

/// Build the API router
pub fn build_router(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/incoming-call", get(incoming_call).post(incoming_call))
        .route("/media-stream", get(media_stream_handler))
        .with_state(state);

    // Metrics route (separate state)
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    Router::new()
        .merge(api_routes)
        .merge(metrics_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
