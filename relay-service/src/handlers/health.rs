use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::startup::AppState;

/// Liveness plus downstream reachability.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.generator.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "relay-service",
                "version": env!("CARGO_PKG_VERSION"),
                "downstream": "reachable"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "service": "relay-service",
                "version": env!("CARGO_PKG_VERSION"),
                "downstream": "unreachable",
                "error": e.to_string()
            })),
        ),
    }
}
