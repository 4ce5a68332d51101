//! Load-time model configuration.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::ModelLoadError;

/// Where the model weights are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    /// CUDA device ordinal.
    Cuda(u32),
    Metal,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(0) => write!(f, "cuda"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            Device::Metal => write!(f, "metal"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            "metal" | "mps" => Ok(Device::Metal),
            other => match other.strip_prefix("cuda:") {
                Some(ordinal) => ordinal
                    .parse()
                    .map(Device::Cuda)
                    .map_err(|_| format!("invalid cuda ordinal in {s:?}")),
                None => Err(format!(
                    "unknown device {s:?} (expected cpu, cuda, cuda:N or metal)"
                )),
            },
        }
    }
}

/// Numeric precision the weights are loaded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    F32,
    F16,
    Bf16,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::F32 => write!(f, "f32"),
            Precision::F16 => write!(f, "f16"),
            Precision::Bf16 => write!(f, "bf16"),
        }
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f32" | "fp32" | "float32" => Ok(Precision::F32),
            "f16" | "fp16" | "float16" => Ok(Precision::F16),
            "bf16" | "bfloat16" => Ok(Precision::Bf16),
            _ => Err(format!("unknown precision {s:?} (expected f32, f16 or bf16)")),
        }
    }
}

/// Identifies the model to load and how to place it.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelConfig {
    pub model_id: String,
    pub device: Device,
    pub precision: Precision,
}

impl ModelConfig {
    /// Validated constructor. The identifier is trimmed and must not be empty.
    pub fn new(
        model_id: impl Into<String>,
        device: Device,
        precision: Precision,
    ) -> Result<Self, ModelLoadError> {
        let model_id = model_id.into().trim().to_string();
        if model_id.is_empty() {
            return Err(ModelLoadError::InvalidConfig(
                "model identifier must not be empty".to_string(),
            ));
        }
        Ok(Self {
            model_id,
            device,
            precision,
        })
    }

    /// CPU, full precision.
    pub fn cpu(model_id: impl Into<String>) -> Result<Self, ModelLoadError> {
        Self::new(model_id, Device::Cpu, Precision::F32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_parses_common_spellings() {
        assert_eq!("cpu".parse::<Device>(), Ok(Device::Cpu));
        assert_eq!("CUDA".parse::<Device>(), Ok(Device::Cuda(0)));
        assert_eq!("cuda:3".parse::<Device>(), Ok(Device::Cuda(3)));
        assert_eq!("mps".parse::<Device>(), Ok(Device::Metal));
        assert!("cuda:x".parse::<Device>().is_err());
        assert!("tpu".parse::<Device>().is_err());
    }

    #[test]
    fn device_display_round_trips() {
        for device in [Device::Cpu, Device::Cuda(0), Device::Cuda(2), Device::Metal] {
            assert_eq!(device.to_string().parse::<Device>(), Ok(device));
        }
    }

    #[test]
    fn precision_parses_aliases() {
        assert_eq!("fp16".parse::<Precision>(), Ok(Precision::F16));
        assert_eq!("bfloat16".parse::<Precision>(), Ok(Precision::Bf16));
        assert!("int4".parse::<Precision>().is_err());
    }

    #[test]
    fn blank_model_id_rejected() {
        assert!(matches!(
            ModelConfig::cpu("   "),
            Err(ModelLoadError::InvalidConfig(_))
        ));
        assert_eq!(ModelConfig::cpu(" demo-model ").unwrap().model_id, "demo-model");
    }
}
