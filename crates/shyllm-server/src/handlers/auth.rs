//! Optional shared-key check for generation endpoints.

use axum::http::HeaderMap;
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::error::ServerError;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Default, Deserialize)]
pub struct AuthParams {
    pub api_key: Option<String>,
}

/// Accepts the key from the `x-api-key` header or the `api_key` query parameter.
/// A no-op when no key is configured.
pub fn authorize(
    config: &ServerConfig,
    headers: &HeaderMap,
    params: &AuthParams,
) -> Result<(), ServerError> {
    let Some(expected) = config.api_key.as_deref() else {
        return Ok(());
    };
    let supplied = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .or(params.api_key.as_deref());

    match supplied {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => Ok(()),
        _ => {
            tracing::warn!("rejected request with missing or invalid API key");
            Err(ServerError::Unauthorized)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
