//! Core types for image generation.

use crate::error::{NexusError, Result};
use serde::{Deserialize, Serialize};

/// Stem of the filename offered by the download control.
pub const DOWNLOAD_FILE_STEM: &str = "nexus-art";

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Maps a `Content-Type` header value to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// How a provider hands the generated image back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// Base64 text inside a JSON document; rendered as a data URI.
    InlineBase64,
    /// Raw image bytes as the response body; rendered as an object URL.
    Binary,
}

/// Image provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProviderKind {
    /// Stability AI, Stable Diffusion XL (JSON API).
    Stability,
    /// Clipdrop text-to-image (binary API).
    Clipdrop,
}

impl ImageProviderKind {
    /// All known provider kinds.
    pub const ALL: [Self; 2] = [Self::Stability, Self::Clipdrop];

    /// Environment variable that holds this provider's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::Stability => "STABILITY_API_KEY",
            Self::Clipdrop => "CLIPDROP_API_KEY",
        }
    }

    /// Payload convention used by this provider's success response.
    pub fn encoding(&self) -> PayloadEncoding {
        match self {
            Self::Stability => PayloadEncoding::InlineBase64,
            Self::Clipdrop => PayloadEncoding::Binary,
        }
    }

    /// Public API host, used unless a base URL is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Stability => "https://api.stability.ai",
            Self::Clipdrop => "https://clipdrop-api.co",
        }
    }

    /// Format assumed when the payload itself does not say.
    pub fn default_format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    /// Human-readable provider name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Stability => "Stable Diffusion XL (Stability AI)",
            Self::Clipdrop => "Clipdrop (Jasper)",
        }
    }
}

impl std::fmt::Display for ImageProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stability => write!(f, "stability"),
            Self::Clipdrop => write!(f, "clipdrop"),
        }
    }
}

impl std::str::FromStr for ImageProviderKind {
    type Err = NexusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stability" | "stable-diffusion" | "sdxl" => Ok(Self::Stability),
            "clipdrop" => Ok(Self::Clipdrop),
            other => Err(NexusError::Config(format!(
                "unknown provider '{other}' (expected 'stability' or 'clipdrop')"
            ))),
        }
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Seed reported by the provider.
    pub seed: Option<u64>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A request to generate an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }

    /// Rejects the empty prompt; any other text is the provider's business.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.is_empty() {
            return Err(NexusError::InvalidRequest("prompt is empty".into()));
        }
        Ok(())
    }
}

/// A generated image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be rendered or saved"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Provider that generated this image.
    pub provider: ImageProviderKind,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
    /// Base64 text exactly as the provider sent it, for inline payloads.
    pub base64: Option<String>,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(
        data: Vec<u8>,
        format: ImageFormat,
        provider: ImageProviderKind,
        metadata: GenerationMetadata,
    ) -> Self {
        Self {
            data,
            format,
            provider,
            metadata,
            base64: None,
        }
    }

    /// Keeps the provider's own base64 text for the data URL.
    pub fn with_base64(mut self, text: impl Into<String>) -> Self {
        self.base64 = Some(text.into());
        self
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Filename offered by the download control, e.g. `nexus-art.png`.
    pub fn download_filename(&self) -> String {
        format!("{}.{}", DOWNLOAD_FILE_STEM, self.format.extension())
    }

    /// Base64 form of the image: the provider's text if it sent one.
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        match &self.base64 {
            Some(text) => text.clone(),
            None => base64::engine::general_purpose::STANDARD.encode(&self.data),
        }
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            self.to_base64()
        )
    }
}

/// Decodes base64 that may carry a data URI prefix, whitespace, or no padding.
pub(crate) fn decode_base64_lenient(input: &str) -> Result<Vec<u8>> {
    use base64::Engine;

    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };
    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }
    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(&cleaned)
        .map_err(|e| NexusError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"A"), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(
            ImageFormat::from_mime_type("image/jpeg"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_mime_type("image/png; charset=binary"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_mime_type("application/json"), None);
    }

    #[test]
    fn test_provider_kind_parse_and_display() {
        assert_eq!(
            "stability".parse::<ImageProviderKind>().unwrap(),
            ImageProviderKind::Stability
        );
        assert_eq!(
            "Clipdrop".parse::<ImageProviderKind>().unwrap(),
            ImageProviderKind::Clipdrop
        );
        assert!("dalle".parse::<ImageProviderKind>().is_err());
        assert_eq!(ImageProviderKind::Clipdrop.to_string(), "clipdrop");
    }

    #[test]
    fn test_provider_encoding() {
        assert_eq!(
            ImageProviderKind::Stability.encoding(),
            PayloadEncoding::InlineBase64
        );
        assert_eq!(
            ImageProviderKind::Clipdrop.encoding(),
            PayloadEncoding::Binary
        );
    }

    #[test]
    fn test_empty_prompt_is_invalid() {
        assert!(GenerationRequest::new("").validate().is_err());
        assert!(GenerationRequest::new(" ").validate().is_ok());
        assert!(GenerationRequest::new("a cyberpunk warrior").validate().is_ok());
    }

    #[test]
    fn test_data_url_and_download_name() {
        let image = GeneratedImage::new(
            b"A".to_vec(),
            ImageFormat::Png,
            ImageProviderKind::Stability,
            GenerationMetadata::default(),
        );
        assert_eq!(image.to_data_url(), "data:image/png;base64,QQ==");
        assert_eq!(image.download_filename(), "nexus-art.png");

        let jpeg = GeneratedImage::new(
            JPEG_MAGIC.to_vec(),
            ImageFormat::Jpeg,
            ImageProviderKind::Clipdrop,
            GenerationMetadata::default(),
        );
        assert_eq!(jpeg.download_filename(), "nexus-art.jpg");
    }

    #[test]
    fn test_data_url_keeps_provider_text() {
        let image = GeneratedImage::new(
            b"A".to_vec(),
            ImageFormat::Png,
            ImageProviderKind::Stability,
            GenerationMetadata::default(),
        )
        .with_base64("QQ");
        assert_eq!(image.to_data_url(), "data:image/png;base64,QQ");
    }

    #[test]
    fn test_decode_base64_lenient() {
        assert_eq!(decode_base64_lenient("QQ==").unwrap(), b"A");
        assert_eq!(decode_base64_lenient("QQ").unwrap(), b"A");
        assert_eq!(decode_base64_lenient("Q Q=\n=").unwrap(), b"A");
        assert_eq!(
            decode_base64_lenient("data:image/png;base64,QUI").unwrap(),
            b"AB"
        );
        assert!(decode_base64_lenient("not base64!").is_err());
    }

    #[test]
    fn test_default_base_urls() {
        assert_eq!(
            ImageProviderKind::Stability.default_base_url(),
            "https://api.stability.ai"
        );
        assert_eq!(
            ImageProviderKind::Clipdrop.default_base_url(),
            "https://clipdrop-api.co"
        );
    }
}
