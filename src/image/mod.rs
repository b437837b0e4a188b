//! Image generation module.

mod provider;
pub mod providers;
mod types;

pub use provider::ImageProvider;
pub use types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProviderKind,
    PayloadEncoding, DOWNLOAD_FILE_STEM,
};

pub(crate) use types::decode_base64_lenient;
