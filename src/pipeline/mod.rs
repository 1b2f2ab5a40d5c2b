pub mod dispatcher;
pub mod normalizer;

use crate::{
    backend::ImageBackend,
    error::BackendError,
    models::{GenerationDefaults, GenerationOutcome, ModelRegistry, RawGenerationForm},
};
use std::sync::Arc;

pub use dispatcher::GenerationDispatcher;
pub use normalizer::RequestNormalizer;

/// Validation followed by dispatch, for one form submission at a time.
#[derive(Clone)]
pub struct ImagePipeline {
    registry: Arc<ModelRegistry>,
    normalizer: RequestNormalizer,
    dispatcher: GenerationDispatcher,
}

impl ImagePipeline {
    pub fn new(
        registry: Arc<ModelRegistry>,
        defaults: GenerationDefaults,
        backend: Arc<dyn ImageBackend>,
    ) -> Self {
        Self {
            normalizer: RequestNormalizer::new(registry.clone(), defaults),
            dispatcher: GenerationDispatcher::new(registry.clone(), backend),
            registry,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn defaults(&self) -> &GenerationDefaults {
        self.normalizer.defaults()
    }

    pub async fn handle(&self, raw: &RawGenerationForm) -> GenerationOutcome {
        match self.normalizer.normalize(raw) {
            Ok(request) => self.dispatcher.dispatch(&request).await,
            Err(err) => {
                log::warn!("Rejected submission: {}", err);
                GenerationOutcome::failure(err.to_string(), err.status_code())
            }
        }
    }

    pub async fn test_connection(&self) -> Result<(), BackendError> {
        self.dispatcher.test_connection().await
    }
}
