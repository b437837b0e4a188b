//! Stability AI (Stable Diffusion XL) image generation provider.
//!
//! JSON in, JSON out: the generated image comes back as base64 text in the
//! first element of `artifacts`.

use crate::error::{NexusError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    decode_base64_lenient, GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat,
    ImageProviderKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Message shown to the user for every Stability failure.
pub const FAILURE_MESSAGE: &str = "Error! Check API Key in .env file";

const CFG_SCALE: u32 = 7;
const IMAGE_SIZE: u32 = 1024;
const STEPS: u32 = 30;
const SAMPLES: u32 = 1;

/// Stable Diffusion XL 1.0 at 1024x1024.
const ENGINE: &str = "stable-diffusion-xl-1024-v1-0";

/// Builder for StabilityProvider.
#[derive(Debug, Clone)]
pub struct StabilityProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl Default for StabilityProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: ImageProviderKind::Stability.default_base_url().to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl StabilityProviderBuilder {
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

    /// Builds the provider.
    ///
    /// A missing key is not an error here: the request goes out with an
    /// empty bearer token and the provider's rejection is reported instead.
    pub fn build(self) -> Result<StabilityProvider> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        Ok(StabilityProvider {
            client,
            api_key: self.api_key.unwrap_or_default(),
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: self.timeout,
        })
    }
}

/// Stability AI image generation provider.
pub struct StabilityProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl StabilityProvider {
    /// Creates a new `StabilityProviderBuilder`.
    pub fn builder() -> StabilityProviderBuilder {
        StabilityProviderBuilder::new()
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/generation/{ENGINE}/text-to-image", self.base_url)
    }
}

#[async_trait]
impl ImageProvider for StabilityProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        request.validate()?;
        let start = Instant::now();

        let body = StabilityRequest::from_generation_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| NexusError::transport(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NexusError::from_status(status.as_u16(), &text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| NexusError::transport(e, self.timeout))?;
        let parsed: StabilityResponse = serde_json::from_str(&text)?;

        let artifact = parsed
            .artifacts
            .ok_or(NexusError::NoImage)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                NexusError::UnexpectedResponse("No artifacts in Stability response".into())
            })?;

        let data = decode_base64_lenient(&artifact.base64)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(bytes = data.len(), duration_ms, "stability artifact decoded");

        Ok(GeneratedImage::new(
            data,
            ImageFormat::Png,
            ImageProviderKind::Stability,
            GenerationMetadata {
                model: Some(ENGINE.to_string()),
                seed: artifact.seed,
                duration_ms: Some(duration_ms),
            },
        )
        .with_base64(artifact.base64))
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Stability
    }

    fn failure_message(&self, _err: &NexusError) -> String {
        FAILURE_MESSAGE.to_string()
    }
}

#[derive(Debug, Serialize)]
struct StabilityRequest {
    text_prompts: Vec<TextPrompt>,
    cfg_scale: u32,
    height: u32,
    width: u32,
    steps: u32,
    samples: u32,
}

#[derive(Debug, Serialize)]
struct TextPrompt {
    text: String,
}

impl StabilityRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        Self {
            text_prompts: vec![TextPrompt {
                text: req.prompt.clone(),
            }],
            cfg_scale: CFG_SCALE,
            height: IMAGE_SIZE,
            width: IMAGE_SIZE,
            steps: STEPS,
            samples: SAMPLES,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StabilityResponse {
    #[serde(default)]
    artifacts: Option<Vec<StabilityArtifact>>,
}

#[derive(Debug, Deserialize)]
struct StabilityArtifact {
    base64: String,
    #[serde(default)]
    seed: Option<u64>,
}
