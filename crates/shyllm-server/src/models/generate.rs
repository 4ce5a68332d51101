//! Request and response bodies for `/generate` and `/stream`.

use serde::{Deserialize, Serialize};
use shyllm_engine::{FinishReason, GenerationOptions, GenerationRequest, GenerationResponse};

use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateBody {
    pub prompt: String,
    #[serde(default)]
    pub options: Option<WireOptions>,
}

/// Options as sent by clients. Integers are signed so that negative values are
/// reported as out of range instead of as a type error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireOptions {
    pub max_tokens: Option<i64>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<i64>,
    pub seed: Option<u64>,
}

impl GenerateBody {
    /// Fill in server defaults and validate against the configured limits.
    pub fn into_request(self, config: &ServerConfig) -> Result<GenerationRequest, ServerError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(ServerError::BadRequest(
                "prompt must be a non-empty string".to_string(),
            ));
        }

        let wire = self.options.unwrap_or_default();
        let defaults = &config.defaults;

        let max_tokens = match wire.max_tokens {
            None => defaults.max_tokens,
            Some(n) if n < 1 => {
                return Err(ServerError::BadRequest(
                    "max_tokens must be a positive integer".to_string(),
                ))
            }
            Some(n) => match usize::try_from(n) {
                Ok(n) if n <= config.max_tokens_limit => n,
                _ => {
                    return Err(ServerError::BadRequest(format!(
                        "max_tokens must not exceed {}",
                        config.max_tokens_limit
                    )))
                }
            },
        };

        let top_k = match wire.top_k {
            None => None,
            Some(k) if k < 1 => {
                return Err(ServerError::BadRequest(
                    "top_k must be a positive integer".to_string(),
                ))
            }
            Some(k) => Some(usize::try_from(k).unwrap_or(usize::MAX)),
        };

        let options = GenerationOptions {
            max_tokens,
            temperature: wire.temperature.unwrap_or(defaults.temperature),
            top_p: wire.top_p.unwrap_or(defaults.top_p),
            top_k,
            seed: wire.seed,
        };
        options.validate()?;

        Ok(GenerationRequest::new(prompt, options))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageBody {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub model: String,
    pub prompt: String,
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: UsageBody,
}

impl GenerateResponse {
    pub fn new(model: &str, prompt: String, response: GenerationResponse) -> Self {
        Self {
            model: model.to_string(),
            prompt,
            text: response.text,
            finish_reason: response.finish_reason,
            usage: UsageBody {
                prompt_tokens: response.usage.prompt_tokens,
                completion_tokens: response.usage.completion_tokens,
                total_tokens: response.usage.total_tokens(),
            },
        }
    }
}
