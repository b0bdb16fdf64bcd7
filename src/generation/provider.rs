//! Image provider trait.

use crate::error::Result;
use crate::generation::types::{GenerationRequest, ProviderReply};
use async_trait::async_trait;

/// Adapter to an external image-generation/editing service.
///
/// Implementations perform exactly one service call per `generate` and do
/// not retry. Service-level failures are returned as errors; whatever the
/// service sent back on success is returned as-is for classification.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Sends one request to the service.
    async fn generate(&self, request: &GenerationRequest) -> Result<ProviderReply>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
