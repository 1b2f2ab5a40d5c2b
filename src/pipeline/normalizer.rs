use crate::{
    error::ValidationError,
    models::{GenerationDefaults, GenerationRequest, ModelRegistry, RawGenerationForm},
};
use std::sync::Arc;

/// Turns raw form fields into a [`GenerationRequest`].
///
/// Sizes and step counts outside what the form offers are logged and passed
/// through; the backend decides whether it can honor them.
#[derive(Debug, Clone)]
pub struct RequestNormalizer {
    registry: Arc<ModelRegistry>,
    defaults: GenerationDefaults,
}

impl RequestNormalizer {
    pub fn new(registry: Arc<ModelRegistry>, defaults: GenerationDefaults) -> Self {
        Self { registry, defaults }
    }

    pub fn defaults(&self) -> &GenerationDefaults {
        &self.defaults
    }

    pub fn normalize(
        &self,
        raw: &RawGenerationForm,
    ) -> Result<GenerationRequest, ValidationError> {
        let prompt = match raw.prompt.as_deref() {
            Some(prompt) if !prompt.trim().is_empty() => prompt.to_string(),
            _ => return Err(ValidationError::MissingPrompt),
        };

        let model_id =
            non_empty(raw.model.as_deref()).unwrap_or(self.defaults.model.as_str());
        if !self.registry.contains(model_id) {
            return Err(ValidationError::InvalidModel(model_id.to_string()));
        }

        let size = non_empty(raw.size.as_deref()).unwrap_or(self.defaults.size.as_str());
        if !self.defaults.is_supported_size(size) {
            log::warn!("Size {} is not offered by the form, forwarding as-is", size);
        }

        let num_steps = match non_empty(raw.num_steps.as_deref()) {
            Some(value) => value
                .trim()
                .parse::<i32>()
                .map_err(|_| ValidationError::InvalidNumSteps(value.to_string()))?,
            None => self.defaults.num_steps,
        };
        if !self.defaults.steps_in_range(num_steps) {
            log::warn!(
                "Step count {} is outside {}..={}, forwarding as-is",
                num_steps,
                self.defaults.min_steps,
                self.defaults.max_steps
            );
        }

        Ok(GenerationRequest {
            prompt,
            enhance: raw.enhance.as_deref() == Some("true"),
            model_id: model_id.to_string(),
            size: size.to_string(),
            num_steps,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
