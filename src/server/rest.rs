//! REST endpoints served alongside the websocket.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;

use super::hub::BroadcastHub;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connections: usize,
    pub baseline: bool,
}

/// Create REST API router.
pub fn create_rest_router(hub: Arc<BroadcastHub>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/registry", get(registry))
        .route("/metrics", get(metrics))
        .with_state(hub)
}

/// Health check endpoint.
async fn health_check(State(hub): State<Arc<BroadcastHub>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: hub.connection_count(),
        baseline: hub.latest().is_some(),
    };

    tracing::debug!(connections = response.connections, "Health check");

    Json(response)
}

/// Latest registry snapshot; unavailable until the initial scan completes.
async fn registry(State(hub): State<Arc<BroadcastHub>>) -> impl IntoResponse {
    match hub.latest() {
        Some(registry) => Json(registry).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "initial scan in progress" })),
        )
            .into_response(),
    }
}

/// Prometheus metrics endpoint.
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; charset=utf-8",
            )],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(
                    axum::http::header::CONTENT_TYPE,
                    "text/plain; charset=utf-8",
                )],
                b"Failed to encode metrics".to_vec(),
            )
        }
    }
}
