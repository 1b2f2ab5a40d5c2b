pub mod backend;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;

pub use backend::{CloudflareClient, ImageBackend};
pub use config::{CloudflareAccount, CloudflareConfig, Config};
pub use error::{BackendError, FluxgenError, Result, ValidationError};
pub use models::{
    GenerationDefaults, GenerationOutcome, GenerationRequest, GenerationResponse, ImageEncoding,
    ModelRegistry, RawGenerationForm,
};
pub use pipeline::{GenerationDispatcher, ImagePipeline, RequestNormalizer};
