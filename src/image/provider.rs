//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GenerationRequest, ImagePayload};
use async_trait::async_trait;

/// Trait for image generation providers.
///
/// One call is one outbound request. Implementations do not retry; the
/// caller decides whether a failure is worth remediating.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image from the given request.
    async fn generate(&self, request: &GenerationRequest) -> Result<ImagePayload>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self, model: &str) -> Result<()>;
}

#[async_trait]
impl<T: ImageProvider + ?Sized> ImageProvider for std::sync::Arc<T> {
    async fn generate(&self, request: &GenerationRequest) -> Result<ImagePayload> {
        (**self).generate(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn health_check(&self, model: &str) -> Result<()> {
        (**self).health_check(model).await
    }
}
