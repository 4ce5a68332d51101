//! Application state shared across handlers.

use std::sync::{Arc, OnceLock};

use shyllm_engine::{GenerationError, ModelHost};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::ServerError;

/// Whether the process can take generation requests yet.
///
/// `launch` loads the model before binding, so the binary only ever serves in
/// `Serving`. `Starting` is seen when a state is built with [`AppState::starting`]
/// and the host is [installed](AppState::install) later, as embedders and tests do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Starting,
    Serving,
}

#[derive(Clone)]
pub struct AppState {
    /// Filled exactly once, when the model has loaded.
    host: Arc<OnceLock<Arc<ModelHost>>>,
    pub config: Arc<ServerConfig>,
    /// Fired on an unrecoverable model fault; the server drains and exits.
    shutdown: CancellationToken,
    fault: Arc<OnceLock<GenerationError>>,
}

impl AppState {
    /// State with no model installed yet. Generation requests get `503`.
    pub fn starting(config: ServerConfig) -> Self {
        Self {
            host: Arc::new(OnceLock::new()),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
            fault: Arc::new(OnceLock::new()),
        }
    }

    pub fn serving(config: ServerConfig, host: Arc<ModelHost>) -> Self {
        let state = Self::starting(config);
        // A fresh slot cannot already be filled.
        let _ = state.host.set(host);
        state
    }

    /// Install the loaded model. Fails, handing the host back, if one is already installed.
    pub fn install(&self, host: Arc<ModelHost>) -> Result<(), Arc<ModelHost>> {
        self.host.set(host)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.host.get().is_some() {
            Lifecycle::Serving
        } else {
            Lifecycle::Starting
        }
    }

    pub fn host(&self) -> Result<Arc<ModelHost>, ServerError> {
        self.installed_host().ok_or(ServerError::NotReady)
    }

    pub fn installed_host(&self) -> Option<Arc<ModelHost>> {
        self.host.get().cloned()
    }

    /// Record the outcome of a generation; a fatal fault starts process shutdown.
    pub fn observe<T>(&self, result: &Result<T, GenerationError>) {
        if let Err(err) = result {
            if err.is_fatal() {
                if self.fault.set(err.clone()).is_ok() {
                    tracing::error!(error = %err, "unrecoverable model fault, shutting down");
                }
                self.shutdown.cancel();
            }
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The fault that triggered shutdown, if any.
    pub fn fault(&self) -> Option<&GenerationError> {
        self.fault.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_without_a_model() {
        let state = AppState::starting(ServerConfig::default());
        assert_eq!(state.lifecycle(), Lifecycle::Starting);
        assert!(matches!(state.host(), Err(ServerError::NotReady)));
    }

    #[test]
    fn only_fatal_errors_trigger_shutdown() {
        let state = AppState::starting(ServerConfig::default());
        let token = state.shutdown_token();

        state.observe::<()>(&Err(GenerationError::Inference("transient".into())));
        assert!(!token.is_cancelled());
        assert!(state.fault().is_none());

        state.observe::<()>(&Err(GenerationError::ModelCorrupted("gone".into())));
        assert!(token.is_cancelled());
        assert!(state.fault().is_some_and(GenerationError::is_fatal));
    }
}
