use crate::{
    backend::ImageBackend,
    error::{BackendError, ValidationError},
    logger,
    models::{GenerationOutcome, GenerationRequest, ModelRegistry},
};
use std::sync::Arc;

const FAILURE_PREFIX: &str = "Image generation failed";

/// Sends a validated request to the backend, exactly once, and folds every
/// result into a [`GenerationOutcome`].
#[derive(Clone)]
pub struct GenerationDispatcher {
    registry: Arc<ModelRegistry>,
    backend: Arc<dyn ImageBackend>,
}

impl GenerationDispatcher {
    pub fn new(registry: Arc<ModelRegistry>, backend: Arc<dyn ImageBackend>) -> Self {
        Self { registry, backend }
    }

    pub async fn dispatch(&self, request: &GenerationRequest) -> GenerationOutcome {
        // may be called without going through the normalizer
        let model_path = match self.registry.resolve(&request.model_id) {
            Some(path) => path,
            None => {
                let err = ValidationError::InvalidModel(request.model_id.clone());
                log::warn!("{}", err);
                return GenerationOutcome::failure(err.to_string(), err.status_code());
            }
        };

        let prompt = request.final_prompt();
        log::debug!(
            "Dispatching to {} (size {}, steps {}, enhance {})",
            model_path,
            request.size,
            request.num_steps,
            request.enhance
        );

        let result = {
            let _timer = logger::timer(&format!("generate {}", request.model_id));
            self.backend
                .generate_image(&prompt, model_path, &request.size, request.num_steps)
                .await
        };

        match result {
            Ok(image_bytes) => {
                log::info!(
                    "Generated {} bytes with {}",
                    image_bytes.len(),
                    request.model_id
                );
                GenerationOutcome::success(image_bytes)
            }
            Err(err) => failure_from_backend(err),
        }
    }

    pub async fn test_connection(&self) -> Result<(), BackendError> {
        self.backend.test_connection().await
    }
}

fn failure_from_backend(err: BackendError) -> GenerationOutcome {
    match err {
        BackendError::Service { message, status } => {
            log::error!("Backend rejected generation ({:?}): {}", status, message);
            GenerationOutcome::failure(
                format!("{}: {}", FAILURE_PREFIX, message),
                status.unwrap_or(500),
            )
        }
        BackendError::Unknown(detail) => {
            log::error!("Unexpected backend failure: {}", detail);
            GenerationOutcome::failure(format!("{}: unknown error", FAILURE_PREFIX), 500)
        }
    }
}
