use axum::Json;
use serde_json::{json, Value};

/// Liveness banner. Answers as soon as the listener is up.
pub async fn handle_root() -> Json<Value> {
    Json(json!({ "message": "LLM Backend is running!" }))
}
