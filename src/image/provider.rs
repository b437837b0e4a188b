//! Image provider trait.

use crate::error::{NexusError, Result};
use crate::image::types::{GeneratedImage, GenerationRequest, ImageProviderKind};
use async_trait::async_trait;

/// Trait for text-to-image generation providers.
///
/// Implementations send exactly one request per call and never retry.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image from the given request.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ImageProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        self.kind().display_name()
    }

    /// Text shown to the user when a generation fails.
    fn failure_message(&self, err: &NexusError) -> String {
        err.to_string()
    }
}
