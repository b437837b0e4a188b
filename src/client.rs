//! The generation client: prompt input, dispatch, and result state.
//!
//! `GenerationClient` is driven from a single event loop. [`submit`] spawns
//! one generation task and returns immediately; the task's outcome arrives
//! on the [`Completions`] channel and must be fed back through
//! [`complete`]. Only the completion carrying the current [`RequestId`] is
//! applied; anything older is discarded.
//!
//! [`submit`]: GenerationClient::submit
//! [`complete`]: GenerationClient::complete

use crate::error::{NexusError, Result};
use crate::image::{GeneratedImage, GenerationRequest, ImageProvider, ImageProviderKind};
use crate::render::{ObjectUrlStore, RenderedImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Which region of the interface is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    /// Nothing in flight, no image.
    Idle,
    /// A request is in flight.
    Loading,
    /// An image is ready.
    Done,
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Monotonically increasing dispatch identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Raw counter value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a generation task, tagged with the dispatch it belongs to.
#[derive(Debug)]
pub struct Completion {
    id: RequestId,
    outcome: Result<GeneratedImage>,
}

impl Completion {
    /// Dispatch this completion answers.
    pub fn id(&self) -> RequestId {
        self.id
    }
}

/// Receiving side for generation results.
pub type Completions = mpsc::UnboundedReceiver<Completion>;

/// What a submit trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A request was dispatched.
    Dispatched(RequestId),
    /// Prompt is empty; nothing happened.
    EmptyPrompt,
    /// A request is already in flight; nothing happened.
    Busy,
}

/// Blocking user notification for failed generations.
pub trait Notifier: Send {
    /// Shows `message` to the user.
    fn alert(&mut self, message: &str);
}

impl<F> Notifier for F
where
    F: FnMut(&str) + Send,
{
    fn alert(&mut self, message: &str) {
        self(message)
    }
}

enum ViewState {
    Idle,
    Loading { id: RequestId, task: AbortHandle },
    Done(RenderedImage),
}

/// Sends a `TaskEnded` completion if the task is dropped before reporting.
struct CompletionGuard {
    id: RequestId,
    tx: Option<mpsc::UnboundedSender<Completion>>,
}

impl CompletionGuard {
    fn finish(mut self, outcome: Result<GeneratedImage>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Completion {
                id: self.id,
                outcome,
            });
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Completion {
                id: self.id,
                outcome: Err(NexusError::TaskEnded),
            });
        }
    }
}

/// Prompt-to-image component.
pub struct GenerationClient {
    provider: Arc<dyn ImageProvider>,
    notifier: Box<dyn Notifier>,
    store: ObjectUrlStore,
    prompt: String,
    state: ViewState,
    last_id: u64,
    tx: mpsc::UnboundedSender<Completion>,
}

impl GenerationClient {
    /// Creates an idle client and the channel its results arrive on.
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        notifier: impl Notifier + 'static,
    ) -> (Self, Completions) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Self {
            provider,
            notifier: Box::new(notifier),
            store: ObjectUrlStore::new(),
            prompt: String::new(),
            state: ViewState::Idle,
            last_id: 0,
            tx,
        };
        (client, rx)
    }

    /// Current prompt text.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Replaces the prompt text.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Current status.
    pub fn status(&self) -> GenerationStatus {
        match self.state {
            ViewState::Idle => GenerationStatus::Idle,
            ViewState::Loading { .. } => GenerationStatus::Loading,
            ViewState::Done(_) => GenerationStatus::Done,
        }
    }

    /// Identifier of the request in flight, if any.
    pub fn in_flight(&self) -> Option<RequestId> {
        match self.state {
            ViewState::Loading { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The rendered image, once status is `Done`.
    pub fn image(&self) -> Option<&RenderedImage> {
        match &self.state {
            ViewState::Done(image) => Some(image),
            _ => None,
        }
    }

    /// Provider this client dispatches to.
    pub fn provider_kind(&self) -> ImageProviderKind {
        self.provider.kind()
    }

    /// Object URL store backing binary images.
    pub fn store(&self) -> &ObjectUrlStore {
        &self.store
    }

    /// Submit trigger (generate button or Enter key).
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.prompt.is_empty() {
            return SubmitOutcome::EmptyPrompt;
        }
        if let Some(id) = self.in_flight() {
            tracing::debug!(%id, "submit ignored while a request is in flight");
            return SubmitOutcome::Busy;
        }

        // Drops any previous image, releasing its object URL.
        self.state = ViewState::Idle;

        self.last_id += 1;
        let id = RequestId(self.last_id);
        let provider = Arc::clone(&self.provider);
        let request = GenerationRequest::new(self.prompt.clone());
        let guard = CompletionGuard {
            id,
            tx: Some(self.tx.clone()),
        };

        tracing::debug!(%id, provider = %provider.kind(), "dispatching generation");
        let handle = tokio::spawn(async move {
            let outcome = provider.generate(&request).await;
            guard.finish(outcome);
        });

        self.state = ViewState::Loading {
            id,
            task: handle.abort_handle(),
        };
        SubmitOutcome::Dispatched(id)
    }

    /// Applies a generation result. Returns false if it was stale.
    pub fn complete(&mut self, completion: Completion) -> bool {
        if self.in_flight() != Some(completion.id) {
            tracing::warn!(id = %completion.id, "discarding stale generation result");
            return false;
        }

        match completion.outcome {
            Ok(image) => {
                tracing::debug!(id = %completion.id, bytes = image.size(), "generation done");
                self.state = ViewState::Done(RenderedImage::new(image, &self.store));
            }
            Err(err) => {
                self.state = ViewState::Idle;
                if err.is_silent() {
                    tracing::debug!(id = %completion.id, error = %err, "generation produced nothing");
                    return true;
                }
                if err.is_configuration() {
                    tracing::error!(id = %completion.id, error = %err, "generation not attempted");
                } else {
                    tracing::warn!(id = %completion.id, error = %err, "generation failed");
                }
                let message = self.provider.failure_message(&err);
                self.notifier.alert(&message);
            }
        }
        true
    }

    /// Waits on `completions` until nothing is in flight.
    pub async fn settle(&mut self, completions: &mut Completions) -> GenerationStatus {
        while self.in_flight().is_some() {
            match completions.recv().await {
                Some(completion) => {
                    self.complete(completion);
                }
                None => break,
            }
        }
        self.status()
    }

    /// Aborts the request in flight, if any, and returns to `Idle`.
    pub fn cancel(&mut self) -> bool {
        match std::mem::replace(&mut self.state, ViewState::Idle) {
            ViewState::Loading { id, task } => {
                task.abort();
                tracing::debug!(%id, "generation cancelled");
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Saves the current image through the download control.
    pub fn download(&self, target: Option<&Path>) -> Result<PathBuf> {
        let image = self
            .image()
            .ok_or_else(|| NexusError::InvalidRequest("no image to download yet".into()))?;
        image.download(&self.store, target)
    }
}

impl Drop for GenerationClient {
    fn drop(&mut self) {
        if let ViewState::Loading { task, .. } = &self.state {
            task.abort();
        }
    }
}
