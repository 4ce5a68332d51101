//! Types that cross the host/backend boundary for one generation call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GenerationError;

/// Sampling and length controls for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Upper bound on generated tokens. Must be at least 1.
    pub max_tokens: usize,
    /// Softmax temperature. `0.0` selects greedy decoding.
    pub temperature: f32,
    /// Nucleus sampling mass, in `(0, 1]`.
    pub top_p: f32,
    /// Restrict sampling to the `k` most likely tokens.
    pub top_k: Option<usize>,
    /// Fixing the seed makes output reproducible.
    pub seed: Option<u64>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            temperature: 1.0,
            top_p: 0.95,
            top_k: None,
            seed: None,
        }
    }
}

impl GenerationOptions {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.max_tokens == 0 {
            return Err(GenerationError::InvalidOptions(
                "max_tokens must be a positive integer".to_string(),
            ));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(GenerationError::InvalidOptions(format!(
                "temperature must be a non-negative number (got {})",
                self.temperature
            )));
        }
        if self.top_p.is_nan() || self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(GenerationError::InvalidOptions(format!(
                "top_p must be in (0, 1] (got {})",
                self.top_p
            )));
        }
        if self.top_k == Some(0) {
            return Err(GenerationError::InvalidOptions(
                "top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A prompt plus the options to generate with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            prompt: prompt.into(),
            options,
        }
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// The model emitted its end-of-sequence token.
    Stop,
    /// `max_tokens` was reached or the context window filled up.
    Length,
    /// The caller stopped consuming output (timeout or disconnect).
    Cancelled,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Token accounting for a finished generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl Usage {
    pub fn total_tokens(&self) -> usize {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Output of a generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}
