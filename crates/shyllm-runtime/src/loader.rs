//! Model identifier resolution.

use shyllm_engine::{Device, ModelConfig, ModelLoadError, ModelLoader, TextGenerator};

use crate::demo::{DemoModel, DEMO_MODEL_ID};

/// Resolves the built-in demo model. Any other identifier is unknown.
#[derive(Debug, Clone, Default)]
pub struct DemoLoader {
    memory_budget_bytes: Option<u64>,
}

impl DemoLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to load models whose weights exceed `bytes`.
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget_bytes = Some(bytes);
        self
    }

    /// Identifiers this loader can resolve.
    pub fn available_models(&self) -> &'static [&'static str] {
        &[DEMO_MODEL_ID]
    }
}

impl ModelLoader for DemoLoader {
    fn load(&self, config: &ModelConfig) -> Result<Box<dyn TextGenerator>, ModelLoadError> {
        if config.model_id != DEMO_MODEL_ID {
            return Err(ModelLoadError::UnknownModel(config.model_id.clone()));
        }
        if config.device != Device::Cpu {
            return Err(ModelLoadError::UnsupportedDevice {
                model: config.model_id.clone(),
                device: config.device,
            });
        }

        let needed = DemoModel::footprint_bytes();
        if let Some(budget) = self.memory_budget_bytes {
            if needed > budget {
                return Err(ModelLoadError::InsufficientResources(format!(
                    "{} needs {needed} bytes, budget is {budget}",
                    config.model_id
                )));
            }
        }

        tracing::debug!(model = %config.model_id, bytes = needed, "allocating demo weights");
        Ok(Box::new(DemoModel::new(
            config.model_id.clone(),
            config.precision,
        )))
    }
}
