//! Error types for image generation.

use std::time::Duration;

/// Longest provider error body carried inside an error, in characters.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Errors that can occur while generating or rendering an image.
#[derive(Debug, thiserror::Error)]
pub enum NexusError {
    /// Provider rejected the credential (HTTP 401/403).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// No credential configured for a provider that requires one up front.
    #[error("missing API key: set {env_var} in your environment or .env file")]
    MissingCredential {
        /// Environment variable that should hold the key.
        env_var: &'static str,
    },

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Rate limit or quota exceeded (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Provider answered 2xx with a body we could not use.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Provider answered 2xx without any image field; nothing to show or report.
    #[error("provider returned no image")]
    NoImage,

    /// I/O error (e.g., saving a download).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider not available (feature not enabled).
    #[error("provider not available: {0}")]
    ProviderNotAvailable(String),

    /// Generation task stopped (aborted or panicked) before producing a result.
    #[error("generation task ended without a result")]
    TaskEnded,

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl NexusError {
    /// Classifies a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = sanitize_error_message(body);
        match status {
            401 | 403 => Self::Auth(message),
            429 => Self::RateLimited(message),
            _ => Self::Api { status, message },
        }
    }

    /// Returns true for configuration problems detected before any request.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. } | Self::Config(_) | Self::ProviderNotAvailable(_)
        )
    }

    /// Returns true when the failure should not reach the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::NoImage)
    }

    /// Maps a transport failure, keeping client timeouts distinct.
    pub fn transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err)
        }
    }
}

/// Trims a provider error body and caps its length.
pub(crate) fn sanitize_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    cut.push_str("...");
    cut
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, NexusError>;
