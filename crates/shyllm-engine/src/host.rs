//! The Model Host: sole owner of the loaded model.
//!
//! ```text
//!  handler ──generate()──┐
//!  handler ──generate()──┤  FIFO   ┌──────────────┐  spawn_blocking  ┌───────────────┐
//!  handler ──generate()──┴─ Mutex ─│  ModelHost   │ ───────────────> │ TextGenerator │
//!                                  └──────────────┘  on_chunk / stop └───────────────┘
//! ```
//!
//! Every in-flight generation holds a [`CancellationToken`] whose drop guard lives in
//! the awaiting future. When that future is dropped (timeout, client gone) the token
//! fires and the backend stops at its next chunk, releasing the model for the queue.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::{
    GenerationError, GenerationRequest, GenerationResponse, ModelConfig, ModelLoadError,
    ModelLoader, Result, TextGenerator,
};

/// Runtime knobs for the host.
#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    /// Upper bound on queueing plus generation for one call. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

/// Owns the single loaded model and serializes access to it.
pub struct ModelHost {
    config: ModelConfig,
    model_id: String,
    model: Arc<Mutex<Option<Box<dyn TextGenerator>>>>,
    poisoned: Arc<AtomicBool>,
    options: HostOptions,
}

impl ModelHost {
    /// Load the configured model. Blocks until the model is ready or has failed.
    pub fn initialize(
        loader: &dyn ModelLoader,
        config: ModelConfig,
        options: HostOptions,
    ) -> Result<Self, ModelLoadError> {
        tracing::info!(
            model = %config.model_id,
            device = %config.device,
            precision = %config.precision,
            "loading model"
        );
        let started = Instant::now();

        let model = loader.load(&config).inspect_err(|err| {
            tracing::error!(model = %config.model_id, error = %err, "model load failed");
        })?;
        let model_id = model.model_id().to_string();

        tracing::info!(
            model = %model_id,
            load_ms = started.elapsed().as_millis() as u64,
            "model ready"
        );

        Ok(Self {
            config,
            model_id,
            model: Arc::new(Mutex::new(Some(model))),
            poisoned: Arc::new(AtomicBool::new(false)),
            options,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Identifier reported by the loaded model.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Set once a backend fault has left the model in an unknown state.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Run one generation, waiting for any in-flight generation to finish first.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        self.dispatch(request, None).await
    }

    /// Like [`generate`](Self::generate), also forwarding each decoded chunk to
    /// `chunks`. Dropping the receiver stops generation early.
    pub async fn generate_streaming(
        &self,
        request: GenerationRequest,
        chunks: mpsc::Sender<String>,
    ) -> Result<GenerationResponse> {
        self.dispatch(request, Some(chunks)).await
    }

    /// Take the model out of the host and release it. Idempotent.
    pub async fn shutdown(&self) {
        let model = self.model.lock().await.take();
        let Some(mut model) = model else {
            return;
        };
        let model_id = self.model_id.clone();
        match tokio::task::spawn_blocking(move || model.unload()).await {
            Ok(()) => tracing::info!(model = %model_id, "model unloaded"),
            Err(err) => tracing::error!(model = %model_id, error = %err, "model unload failed"),
        }
    }

    async fn dispatch(
        &self,
        request: GenerationRequest,
        chunks: Option<mpsc::Sender<String>>,
    ) -> Result<GenerationResponse> {
        request.options.validate()?;

        let Some(limit) = self.options.request_timeout else {
            return self.run(request, chunks).await;
        };
        match tokio::time::timeout(limit, self.run(request, chunks)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(model = %self.model_id, timeout_ms = limit.as_millis() as u64, "generation timed out");
                Err(GenerationError::Timeout(limit))
            }
        }
    }

    async fn run(
        &self,
        request: GenerationRequest,
        chunks: Option<mpsc::Sender<String>>,
    ) -> Result<GenerationResponse> {
        self.check_poisoned()?;
        let mut slot = Arc::clone(&self.model).lock_owned().await;
        // Re-check: the fault may have happened while this request was queued.
        self.check_poisoned()?;

        let cancel = CancellationToken::new();
        let _stop_on_drop = cancel.clone().drop_guard();
        let started = Instant::now();

        let worker = tokio::task::spawn_blocking(move || {
            let model = slot.as_mut().ok_or(GenerationError::Unavailable)?;
            let mut on_chunk = |chunk: &str| {
                if cancel.is_cancelled() {
                    return ControlFlow::Break(());
                }
                match &chunks {
                    Some(tx) if tx.blocking_send(chunk.to_owned()).is_err() => {
                        ControlFlow::Break(())
                    }
                    _ => ControlFlow::Continue(()),
                }
            };
            model.generate(&request, &mut on_chunk)
        });

        match worker.await {
            Ok(Ok(response)) => {
                let elapsed = started.elapsed();
                let secs = elapsed.as_secs_f64();
                let tokens_per_sec = if secs > 0.0 {
                    response.usage.completion_tokens as f64 / secs
                } else {
                    0.0
                };
                tracing::info!(
                    model = %self.model_id,
                    prompt_tokens = response.usage.prompt_tokens,
                    completion_tokens = response.usage.completion_tokens,
                    elapsed_ms = elapsed.as_millis() as u64,
                    tokens_per_sec,
                    finish_reason = %response.finish_reason,
                    "generation complete"
                );
                Ok(response)
            }
            Ok(Err(err)) => {
                if err.is_fatal() {
                    self.poison(&err);
                } else {
                    tracing::warn!(model = %self.model_id, error = %err, "generation failed");
                }
                Err(err)
            }
            Err(join) => {
                let reason = if join.is_panic() {
                    "generation worker panicked"
                } else {
                    "generation worker was aborted"
                };
                let err = GenerationError::ModelCorrupted(reason.to_string());
                self.poison(&err);
                Err(err)
            }
        }
    }

    fn check_poisoned(&self) -> Result<()> {
        if self.is_poisoned() {
            return Err(GenerationError::ModelCorrupted(
                "an earlier generation left the model in an unknown state".to_string(),
            ));
        }
        Ok(())
    }

    fn poison(&self, err: &GenerationError) {
        self.poisoned.store(true, Ordering::Release);
        tracing::error!(model = %self.model_id, error = %err, "model host poisoned");
    }
}

impl std::fmt::Debug for ModelHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHost")
            .field("model_id", &self.model_id)
            .field("config", &self.config)
            .field("poisoned", &self.is_poisoned())
            .finish()
    }
}
