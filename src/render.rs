//! Displayable image references.
//!
//! Inline (base64) payloads become `data:` URIs. Binary payloads are parked
//! in a session-scoped [`ObjectUrlStore`] and referenced through a `blob:`
//! URL that is revoked when its [`ObjectUrl`] guard is dropped.

use crate::error::{NexusError, Result};
use crate::image::{decode_base64_lenient, GeneratedImage, PayloadEncoding};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const OBJECT_URL_PREFIX: &str = "blob:nexus-art/";

#[derive(Default)]
struct StoreInner {
    next_id: u64,
    blobs: HashMap<String, Arc<[u8]>>,
}

/// Session-scoped registry of in-memory images addressable by URL.
#[derive(Clone, Default)]
pub struct ObjectUrlStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl ObjectUrlStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `data` and returns a guard owning its URL.
    pub fn create(&self, data: &[u8]) -> ObjectUrl {
        let mut inner = self.lock();
        inner.next_id += 1;
        let url = format!("{OBJECT_URL_PREFIX}{}", inner.next_id);
        inner.blobs.insert(url.clone(), Arc::from(data));
        tracing::debug!(%url, bytes = data.len(), "object url created");
        ObjectUrl {
            url,
            store: self.clone(),
        }
    }

    /// Number of live object URLs.
    pub fn len(&self) -> usize {
        self.lock().blobs.len()
    }

    /// Returns true when no object URL is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true while `url` is resolvable.
    pub fn contains(&self, url: &str) -> bool {
        self.lock().blobs.contains_key(url)
    }

    /// Resolves a `blob:` or `data:` URL to its bytes.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("data:") {
            return decode_data_uri(url);
        }
        self.lock()
            .blobs
            .get(url)
            .map(|data| data.to_vec())
            .ok_or_else(|| NexusError::InvalidRequest(format!("{url} has been revoked")))
    }

    fn revoke(&self, url: &str) {
        if self.lock().blobs.remove(url).is_some() {
            tracing::debug!(%url, "object url revoked");
        }
    }
}

/// Owning handle to an object URL; revokes it on drop.
#[derive(Debug)]
pub struct ObjectUrl {
    url: String,
    store: ObjectUrlStore,
}

impl ObjectUrl {
    /// The `blob:` URL.
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.store.revoke(&self.url);
    }
}

impl std::fmt::Debug for ObjectUrlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectUrlStore")
            .field("live", &self.len())
            .finish()
    }
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    if !uri.contains(";base64,") {
        return Err(NexusError::Decode("data URI is not base64 encoded".into()));
    }
    decode_base64_lenient(uri)
}

/// A displayable reference to a generated image.
#[derive(Debug)]
pub enum ImageResource {
    /// `data:<mime>;base64,<payload>`.
    DataUri(String),
    /// Object URL backed by the session store.
    ObjectUrl(ObjectUrl),
}

impl ImageResource {
    /// The URL to use as an image source or download link.
    pub fn src(&self) -> &str {
        match self {
            Self::DataUri(uri) => uri,
            Self::ObjectUrl(url) => url.as_str(),
        }
    }
}

/// An image ready for display: the resource plus what it was made from.
#[derive(Debug)]
pub struct RenderedImage {
    resource: ImageResource,
    image: GeneratedImage,
}

impl RenderedImage {
    /// Builds the displayable resource matching the provider's payload convention.
    pub fn new(image: GeneratedImage, store: &ObjectUrlStore) -> Self {
        let resource = match image.provider.encoding() {
            PayloadEncoding::InlineBase64 => ImageResource::DataUri(image.to_data_url()),
            PayloadEncoding::Binary => ImageResource::ObjectUrl(store.create(&image.data)),
        };
        Self { resource, image }
    }

    /// Image source URL.
    pub fn src(&self) -> &str {
        self.resource.src()
    }

    /// The displayable resource.
    pub fn resource(&self) -> &ImageResource {
        &self.resource
    }

    /// The generated image behind the resource.
    pub fn image(&self) -> &GeneratedImage {
        &self.image
    }

    /// Filename offered by the download control.
    pub fn download_filename(&self) -> String {
        self.image.download_filename()
    }

    /// Saves the image the way the download link would.
    ///
    /// `target` may be a directory (the default filename is used inside it),
    /// a file path, or `None` for the default filename in the current
    /// directory.
    pub fn download(&self, store: &ObjectUrlStore, target: Option<&Path>) -> Result<PathBuf> {
        let path = match target {
            Some(dir) if dir.is_dir() => dir.join(self.download_filename()),
            Some(file) => file.to_path_buf(),
            None => PathBuf::from(self.download_filename()),
        };
        let bytes = store.fetch(self.src())?;
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), "image downloaded");
        Ok(path)
    }
}
