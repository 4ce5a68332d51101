//! Readiness check handler.

use axum::{extract::State, http::StatusCode, Json};

use crate::models::HealthResponse;
use crate::state::AppState;

/// `200` once the model is loaded, `503` before that.
pub async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.installed_host() {
        Some(host) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                model_loaded: true,
                model: Some(host.model_id().to_string()),
            }),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "starting",
                model_loaded: false,
                model: None,
            }),
        ),
    }
}
