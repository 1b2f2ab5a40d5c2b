pub mod cloudflare;

use crate::error::BackendError;
use async_trait::async_trait;

pub use cloudflare::CloudflareClient;

/// The remote service that turns a prompt into image bytes.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        model_path: &str,
        size: &str,
        num_steps: i32,
    ) -> Result<Vec<u8>, BackendError>;

    /// Reachability check. Performs no generation.
    async fn test_connection(&self) -> Result<(), BackendError>;
}
