#![warn(missing_docs)]
//! Nexus Art - prompt-to-image client for Stability AI and Clipdrop.
//!
//! A [`GenerationClient`] holds the prompt, dispatches one generation at a
//! time to an [`ImageProvider`], and turns the answer into a displayable
//! image reference with a download action.
//!
//! # Quick Start
//!
//! ```no_run
//! use nexus_art::{Config, GenerationClient, GenerationStatus};
//!
//! #[tokio::main]
//! async fn main() -> nexus_art::Result<()> {
//!     let config = Config::from_env()?;
//!     let provider = config.build_provider()?;
//!     let (mut client, mut completions) =
//!         GenerationClient::new(provider, |msg: &str| eprintln!("{msg}"));
//!
//!     client.set_prompt("A cyberpunk warrior in neon rain");
//!     client.submit();
//!     if client.settle(&mut completions).await == GenerationStatus::Done {
//!         let path = client.download(None)?;
//!         println!("saved {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `stability`: Stability AI, Stable Diffusion XL (JSON, base64 artifacts)
//! - `clipdrop`: Clipdrop text-to-image (multipart, binary response)
//! - `cli`: the `nexus-art` terminal front-end

pub mod client;
pub mod config;
mod error;
pub mod image;
pub mod render;

pub use client::{
    Completion, Completions, GenerationClient, GenerationStatus, Notifier, RequestId,
    SubmitOutcome,
};
pub use config::Config;
pub use error::{NexusError, Result};
pub use image::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProvider,
    ImageProviderKind, PayloadEncoding,
};
pub use render::{ImageResource, ObjectUrl, ObjectUrlStore, RenderedImage};

#[cfg(feature = "clipdrop")]
pub use image::providers::{ClipdropProvider, ClipdropProviderBuilder};

#[cfg(feature = "stability")]
pub use image::providers::{StabilityProvider, StabilityProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{GenerationClient, GenerationStatus, SubmitOutcome};
    pub use crate::config::Config;
    pub use crate::error::{NexusError, Result};
    pub use crate::image::{GeneratedImage, GenerationRequest, ImageProvider};

    #[cfg(feature = "clipdrop")]
    pub use crate::image::providers::ClipdropProvider;

    #[cfg(feature = "stability")]
    pub use crate::image::providers::StabilityProvider;
}
