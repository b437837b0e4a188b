//! Process configuration.
//!
//! Read once at startup; credentials are handed to providers explicitly
//! instead of being looked up from the environment at call time.

use crate::error::{NexusError, Result};
use crate::image::{ImageProvider, ImageProviderKind};
use std::sync::Arc;
use std::time::Duration;

/// Default HTTP timeout for a generation call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Runtime configuration for the generation client.
#[derive(Clone)]
pub struct Config {
    /// Provider selected for this session.
    pub provider: ImageProviderKind,
    /// Stability API key.
    pub stability_api_key: Option<String>,
    /// Clipdrop API key.
    pub clipdrop_api_key: Option<String>,
    /// Stability base URL (host or proxy prefix).
    pub stability_base_url: String,
    /// Clipdrop base URL (host or proxy prefix).
    pub clipdrop_base_url: String,
    /// HTTP timeout per generation call.
    pub timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("stability_api_key", &redact(&self.stability_api_key))
            .field("clipdrop_api_key", &redact(&self.clipdrop_api_key))
            .field("stability_base_url", &self.stability_base_url)
            .field("clipdrop_base_url", &self.clipdrop_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ImageProviderKind::Stability,
            stability_api_key: None,
            clipdrop_api_key: None,
            stability_base_url: ImageProviderKind::Stability.default_base_url().to_string(),
            clipdrop_base_url: ImageProviderKind::Clipdrop.default_base_url().to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(provider) = get("NEXUS_PROVIDER") {
            config.provider = provider.parse()?;
        }

        config.stability_api_key = get("STABILITY_API_KEY").or_else(|| get("VITE_STABILITY_API_KEY"));
        config.clipdrop_api_key = get("CLIPDROP_API_KEY").or_else(|| get("VITE_CLIPDROP_API_KEY"));

        if let Some(url) = get("STABILITY_BASE_URL") {
            config.stability_base_url = url;
        }
        if let Some(url) = get("CLIPDROP_BASE_URL") {
            config.clipdrop_base_url = url;
        }

        if let Some(secs) = get("NEXUS_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                NexusError::Config(format!("NEXUS_TIMEOUT_SECS must be a number, got '{secs}'"))
            })?;
            if secs == 0 {
                return Err(NexusError::Config(
                    "NEXUS_TIMEOUT_SECS must be greater than zero".into(),
                ));
            }
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Selects a different provider.
    pub fn with_provider(mut self, provider: ImageProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// Overrides the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Credential configured for `kind`, if any.
    pub fn api_key(&self, kind: ImageProviderKind) -> Option<&str> {
        match kind {
            ImageProviderKind::Stability => self.stability_api_key.as_deref(),
            ImageProviderKind::Clipdrop => self.clipdrop_api_key.as_deref(),
        }
    }

    /// Builds the selected provider with its credential.
    pub fn build_provider(&self) -> Result<Arc<dyn ImageProvider>> {
        match self.provider {
            ImageProviderKind::Stability => {
                #[cfg(feature = "stability")]
                {
                    let provider = crate::image::providers::StabilityProvider::builder()
                        .maybe_api_key(self.stability_api_key.clone())
                        .base_url(&self.stability_base_url)
                        .timeout(self.timeout)
                        .build()?;
                    Ok(Arc::new(provider))
                }
                #[cfg(not(feature = "stability"))]
                {
                    Err(NexusError::ProviderNotAvailable("stability".into()))
                }
            }
            ImageProviderKind::Clipdrop => {
                #[cfg(feature = "clipdrop")]
                {
                    let provider = crate::image::providers::ClipdropProvider::builder()
                        .maybe_api_key(self.clipdrop_api_key.clone())
                        .base_url(&self.clipdrop_base_url)
                        .timeout(self.timeout)
                        .build()?;
                    Ok(Arc::new(provider))
                }
                #[cfg(not(feature = "clipdrop"))]
                {
                    Err(NexusError::ProviderNotAvailable("clipdrop".into()))
                }
            }
        }
    }
}
