//! Wire types for the HTTP API.

pub mod generate;

use serde::Serialize;

pub use generate::{GenerateBody, GenerateResponse, UsageBody, WireOptions};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: &'static str,
    /// Whether the same request may succeed if sent again.
    pub retryable: bool,
}
