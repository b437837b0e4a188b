//! Clipdrop text-to-image provider.
//!
//! Multipart in, raw image bytes out.

use crate::error::{NexusError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProviderKind,
};
use async_trait::async_trait;
use std::time::{Duration, Instant};

const TEXT_TO_IMAGE_PATH: &str = "/text-to-image/v1";

/// Builder for ClipdropProvider.
#[derive(Debug, Clone)]
pub struct ClipdropProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl Default for ClipdropProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: ImageProviderKind::Clipdrop.default_base_url().to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl ClipdropProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API key if one is configured.
    pub fn maybe_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Sets the base URL (real host or a reverse-proxy prefix).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the HTTP timeout for a generation call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the provider. A missing key is reported on each `generate`.
    pub fn build(self) -> Result<ClipdropProvider> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        Ok(ClipdropProvider {
            client,
            api_key: self.api_key.filter(|k| !k.is_empty()),
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: self.timeout,
        })
    }
}

/// Clipdrop image generation provider.
pub struct ClipdropProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl ClipdropProvider {
    /// Creates a new `ClipdropProviderBuilder`.
    pub fn builder() -> ClipdropProviderBuilder {
        ClipdropProviderBuilder::new()
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, TEXT_TO_IMAGE_PATH)
    }
}

#[async_trait]
impl ImageProvider for ClipdropProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let api_key = self.api_key.as_deref().ok_or(NexusError::MissingCredential {
            env_var: ImageProviderKind::Clipdrop.env_var(),
        })?;
        request.validate()?;
        let start = Instant::now();

        let form = reqwest::multipart::Form::new().text("prompt", request.prompt.clone());

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| NexusError::transport(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NexusError::from_status(status.as_u16(), &text));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let data = response
            .bytes()
            .await
            .map_err(|e| NexusError::transport(e, self.timeout))?
            .to_vec();

        if data.is_empty() {
            return Err(NexusError::UnexpectedResponse(
                "Clipdrop returned an empty body".into(),
            ));
        }

        let format = ImageFormat::from_magic_bytes(&data)
            .or_else(|| content_type.as_deref().and_then(ImageFormat::from_mime_type))
            .unwrap_or(ImageProviderKind::Clipdrop.default_format());

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(bytes = data.len(), ?format, duration_ms, "clipdrop image received");

        Ok(GeneratedImage::new(
            data,
            format,
            ImageProviderKind::Clipdrop,
            GenerationMetadata {
                model: Some("text-to-image/v1".to_string()),
                seed: None,
                duration_ms: Some(duration_ms),
            },
        ))
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Clipdrop
    }
}
