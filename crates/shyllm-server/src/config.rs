//! Startup configuration: command-line flags, each with an environment fallback.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use shyllm_engine::{Device, GenerationOptions, ModelConfig, ModelLoadError, Precision};
use shyllm_runtime::DEMO_MODEL_ID;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Model(#[from] ModelLoadError),
    #[error("invalid generation defaults: {0}")]
    Defaults(String),
}

/// Self-host a language model behind a small HTTP API.
#[derive(Debug, Clone, Parser)]
#[command(name = "shyllm-server", version, about)]
pub struct ServeArgs {
    /// Model identifier to load at startup.
    #[arg(long, env = "MODEL_NAME", default_value = DEMO_MODEL_ID)]
    pub model: String,

    /// Device the weights are placed on (cpu, cuda, cuda:N, metal).
    #[arg(long, env = "SHYLLM_DEVICE", default_value = "cpu")]
    pub device: Device,

    /// Weight precision (f32, f16, bf16).
    #[arg(long, env = "SHYLLM_PRECISION", default_value = "f32")]
    pub precision: Precision,

    /// Tokens generated when a request does not set `max_tokens`.
    #[arg(long, env = "SHYLLM_MAX_TOKENS", default_value_t = 100)]
    pub max_tokens: usize,

    /// Largest `max_tokens` a request may ask for.
    #[arg(long, env = "SHYLLM_MAX_TOKENS_LIMIT", default_value_t = 2048)]
    pub max_tokens_limit: usize,

    /// Sampling temperature when a request does not set one.
    #[arg(long, env = "SHYLLM_TEMPERATURE", default_value_t = 1.0, allow_negative_numbers = true)]
    pub temperature: f32,

    /// Nucleus sampling mass when a request does not set one.
    #[arg(long, env = "SHYLLM_TOP_P", default_value_t = 0.95)]
    pub top_p: f32,

    /// Address to listen on.
    #[arg(long, env = "SHYLLM_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "SHYLLM_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Bind an OS-assigned port if the configured one is taken.
    #[arg(long, env = "SHYLLM_PORT_FALLBACK")]
    pub port_fallback: bool,

    /// Require this key on generation requests (`x-api-key` header or `api_key` query).
    #[arg(long, env = "SHYLLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Per-request limit on queueing plus generation, in seconds. 0 disables it.
    #[arg(long, env = "SHYLLM_REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,
}

/// Option values applied when a request leaves them out.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationDefaults {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        let options = GenerationOptions::default();
        Self {
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        }
    }
}

/// Server-side settings, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub port_fallback: bool,
    pub api_key: Option<String>,
    pub request_timeout: Option<Duration>,
    pub defaults: GenerationDefaults,
    pub max_tokens_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000),
            port_fallback: false,
            api_key: None,
            request_timeout: Some(Duration::from_secs(120)),
            defaults: GenerationDefaults::default(),
            max_tokens_limit: 2048,
        }
    }
}

impl ServeArgs {
    /// Validate every option and split into model and server configuration.
    pub fn resolve(self) -> Result<(ModelConfig, ServerConfig), ConfigError> {
        let model = ModelConfig::new(self.model, self.device, self.precision)?;

        let defaults = GenerationDefaults {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        };
        GenerationOptions {
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            top_k: None,
            seed: None,
        }
        .validate()
        .map_err(|e| ConfigError::Defaults(e.to_string()))?;

        if self.max_tokens_limit < defaults.max_tokens {
            return Err(ConfigError::Defaults(format!(
                "max tokens limit {} is below the default of {}",
                self.max_tokens_limit, defaults.max_tokens
            )));
        }

        let server = ServerConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            port_fallback: self.port_fallback,
            api_key: self.api_key.filter(|key| !key.trim().is_empty()),
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
            defaults,
            max_tokens_limit: self.max_tokens_limit,
        };
        Ok((model, server))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServeArgs {
        let mut argv = vec!["shyllm-server"];
        argv.extend_from_slice(args);
        ServeArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_resolve() {
        let args = ServeArgs {
            model: DEMO_MODEL_ID.into(),
            device: Device::Cpu,
            precision: Precision::F32,
            max_tokens: 100,
            max_tokens_limit: 2048,
            temperature: 1.0,
            top_p: 0.95,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            port_fallback: false,
            api_key: None,
            request_timeout_secs: 120,
        };
        let (model, server) = args.resolve().unwrap();
        assert_eq!(model.model_id, DEMO_MODEL_ID);
        assert_eq!(server.bind_addr.port(), 8000);
        assert_eq!(server.defaults, GenerationDefaults::default());
        assert_eq!(server.request_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn flags_parse() {
        let args = parse(&[
            "--model",
            "demo-model",
            "--device",
            "cuda:1",
            "--precision",
            "bf16",
            "--port",
            "9001",
            "--request-timeout-secs",
            "0",
            "--api-key",
            "",
        ]);
        assert_eq!(args.device, Device::Cuda(1));
        assert_eq!(args.precision, Precision::Bf16);

        let (_, server) = args.resolve().unwrap();
        assert_eq!(server.bind_addr.port(), 9001);
        assert_eq!(server.request_timeout, None);
        assert_eq!(server.api_key, None);
    }

    #[test]
    fn bad_device_is_a_parse_error() {
        assert!(ServeArgs::try_parse_from(["shyllm-server", "--device", "tpu"]).is_err());
    }

    #[test]
    fn invalid_defaults_rejected() {
        let err = parse(&["--temperature", "-1"]).resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Defaults(_)));

        let err = parse(&["--max-tokens", "0"]).resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Defaults(_)));

        let err = parse(&["--max-tokens", "500", "--max-tokens-limit", "100"])
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Defaults(_)));
    }

    #[test]
    fn blank_model_rejected() {
        let err = parse(&["--model", "  "]).resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Model(ModelLoadError::InvalidConfig(_))));
    }
}
