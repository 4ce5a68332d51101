//! # shyllm-server
//!
//! Small HTTP API in front of a single locally hosted model.
//!
//! Endpoints:
//! - `GET /`: liveness banner
//! - `GET /health`: readiness (`503` until the model is loaded)
//! - `POST /generate`: one-shot text generation
//! - `POST /stream`: the same, streamed as plain text while tokens are produced

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;
pub mod state;

pub use config::{GenerationDefaults, ServeArgs, ServerConfig};
pub use error::{LaunchError, ServerError};
pub use server::{bind_listener, create_router, launch, run_server};
pub use state::{AppState, Lifecycle};
