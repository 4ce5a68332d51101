//! # shyllm-engine
//!
//! The "narrow waist" between the HTTP surface and whatever library actually runs
//! the model. Defines the capability traits a backend implements ([`ModelLoader`],
//! [`TextGenerator`]), the request/response types that cross that boundary, and
//! [`ModelHost`], which owns the single loaded model for the lifetime of the process.
//!
//! ## Design Notes
//!
//! ### One model, one caller at a time
//! Backends are not assumed to tolerate concurrent generation on a single loaded
//! instance. [`ModelHost`] keeps the model behind a fair async mutex, so requests
//! queue in arrival order and only one generation runs at any moment.
//!
//! ### Blocking backends
//! [`TextGenerator::generate`] is a plain blocking call. The host runs it on the
//! tokio blocking pool and hands it a per-token callback, which is where
//! cancellation (timeouts, dropped stream consumers) is observed.

pub mod config;
pub mod host;
pub mod request;

use std::ops::ControlFlow;
use std::time::Duration;

pub use config::{Device, ModelConfig, Precision};
pub use host::{HostOptions, ModelHost};
pub use request::{FinishReason, GenerationOptions, GenerationRequest, GenerationResponse, Usage};

/// Failure to bring a model up. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelLoadError {
    #[error("unknown model identifier: {0}")]
    UnknownModel(String),
    #[error("model {model} does not support device {device}")]
    UnsupportedDevice { model: String, device: Device },
    #[error("insufficient resources to load model: {0}")]
    InsufficientResources(String),
    #[error("backend failed to initialize: {0}")]
    Backend(String),
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),
}

/// Failure during a single generation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("invalid generation options: {0}")]
    InvalidOptions(String),
    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("model is not loaded")]
    Unavailable,
    #[error("model state corrupted: {0}")]
    ModelCorrupted(String),
}

impl GenerationError {
    /// The loaded model can no longer be trusted; the process should restart.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GenerationError::ModelCorrupted(_))
    }

    /// Whether resending the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::Inference(_) | GenerationError::Timeout(_)
        )
    }

    /// Caused by the request itself rather than the model.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GenerationError::InvalidOptions(_) | GenerationError::InvalidPrompt(_)
        )
    }
}

pub type Result<T, E = GenerationError> = std::result::Result<T, E>;

/// Per-chunk callback handed to [`TextGenerator::generate`].
///
/// Returning [`ControlFlow::Break`] asks the backend to stop and report
/// [`FinishReason::Cancelled`].
pub type ChunkSink<'a> = dyn FnMut(&str) -> ControlFlow<()> + 'a;

/// A loaded model able to produce text.
///
/// Implementations are driven by one caller at a time; `&mut self` is deliberate.
pub trait TextGenerator: Send {
    /// Identifier the model was loaded under.
    fn model_id(&self) -> &str;

    /// Generate a completion, reporting each decoded chunk to `on_chunk` as it is
    /// produced. The concatenation of reported chunks equals the returned text.
    fn generate(
        &mut self,
        request: &GenerationRequest,
        on_chunk: &mut ChunkSink<'_>,
    ) -> Result<GenerationResponse>;

    /// Release weights and accelerator resources. Called once, at shutdown.
    fn unload(&mut self) {}
}

/// Resolves a [`ModelConfig`] into a ready [`TextGenerator`].
pub trait ModelLoader: Send + Sync {
    /// Load the configured model, blocking until it is ready or has failed.
    fn load(&self, config: &ModelConfig) -> Result<Box<dyn TextGenerator>, ModelLoadError>;
}

impl<F> ModelLoader for F
where
    F: Fn(&ModelConfig) -> Result<Box<dyn TextGenerator>, ModelLoadError> + Send + Sync,
{
    fn load(&self, config: &ModelConfig) -> Result<Box<dyn TextGenerator>, ModelLoadError> {
        self(config)
    }
}
