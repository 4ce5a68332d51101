//! HTTP error handling and response mapping.

use std::net::SocketAddr;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shyllm_engine::{GenerationError, ModelLoadError};

use crate::config::ConfigError;
use crate::models::{ErrorBody, ErrorDetail};

/// Message returned for backend faults; details stay in the server log.
const GENERATION_FAILED: &str = "Failed to generate text.";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Body rejected before parsing, e.g. wrong content type or over the size limit.
    #[error("unusable request body: {message}")]
    Payload { status: StatusCode, message: String },

    #[error("missing or invalid API key")]
    Unauthorized,

    #[error("model is still loading")]
    NotReady,

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Payload { status, .. } => *status,
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Generation(err) => match err {
                GenerationError::InvalidOptions(_) | GenerationError::InvalidPrompt(_) => {
                    StatusCode::BAD_REQUEST
                }
                GenerationError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                GenerationError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                GenerationError::Inference(_) | GenerationError::ModelCorrupted(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) | ServerError::Payload { .. } => "invalid_request_error",
            ServerError::Unauthorized => "authentication_error",
            ServerError::NotReady => "unavailable",
            ServerError::Generation(err) => match err {
                GenerationError::InvalidOptions(_) | GenerationError::InvalidPrompt(_) => {
                    "invalid_request_error"
                }
                GenerationError::Timeout(_) => "timeout",
                GenerationError::Unavailable => "unavailable",
                GenerationError::Inference(_) => "server_error",
                GenerationError::ModelCorrupted(_) => "fatal_error",
            },
        }
    }

    fn retryable(&self) -> bool {
        match self {
            ServerError::NotReady => true,
            ServerError::Generation(err) => err.is_retryable(),
            _ => false,
        }
    }

    fn message(&self) -> String {
        match self {
            ServerError::Generation(
                GenerationError::Inference(_) | GenerationError::ModelCorrupted(_),
            ) => GENERATION_FAILED.to_string(),
            ServerError::Generation(
                GenerationError::InvalidOptions(msg) | GenerationError::InvalidPrompt(msg),
            ) => msg.clone(),
            ServerError::BadRequest(msg) | ServerError::Payload { message: msg, .. } => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        if status == StatusCode::UNSUPPORTED_MEDIA_TYPE || status == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::Payload {
                status,
                message: rejection.body_text(),
            }
        } else {
            ServerError::BadRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                message: self.message(),
                error_type: self.error_type(),
                retryable: self.retryable(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Anything that stops the process from serving, at startup or afterwards.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load model: {0}")]
    ModelLoad(#[from] ModelLoadError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("model loader did not finish: {0}")]
    Loader(String),

    #[error("shut down after unrecoverable model fault: {0}")]
    ModelFault(GenerationError),
}
