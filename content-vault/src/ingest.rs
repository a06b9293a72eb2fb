//! Ingestion pipeline: capture event → classified item → prepended to the store
//!
//! Text, link and article captures are appended synchronously. Image captures
//! read and base64-encode their attachment on the tokio runtime and append when
//! that finishes, so an image can land after a text pasted later. That
//! reordering is accepted: pastes are independent user actions.

use crate::capture::{Attachment, CaptureEvent};
use crate::content_detection::{classify, Classification};
use crate::interface::{IngestOutcome, VaultError};
use crate::models::ContentItem;
use crate::slot::Slot;
use base64::Engine;
use once_cell::sync::Lazy;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runtime used when ingestion is driven from outside any tokio context.
/// Shared by every vault and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("content-vault-ingest")
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Current runtime if there is one, otherwise the shared fallback
pub(crate) fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

/// Self-contained `data:` URI for an attachment's bytes
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime.trim().to_ascii_lowercase(),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Read an attachment and encode it off the async workers
async fn encode_attachment(attachment: Attachment) -> Result<String, VaultError> {
    let bytes = attachment.read().await?;
    if bytes.is_empty() {
        return Err(VaultError::InvalidInput("Empty image data".into()));
    }
    let mime = attachment.mime;
    tokio::task::spawn_blocking(move || encode_data_uri(&mime, &bytes))
        .await
        .map_err(|_| VaultError::Aborted)
}

/// Completion of one ingestion.
///
/// Already resolved for synchronous captures. For images it wraps the spawned
/// encode task; dropping a `CaptureTask` does not cancel the append.
pub struct CaptureTask {
    state: TaskState,
}

enum TaskState {
    Ready(Option<IngestOutcome>),
    Pending(JoinHandle<IngestOutcome>),
}

impl CaptureTask {
    fn ready(outcome: IngestOutcome) -> Self {
        Self {
            state: TaskState::Ready(Some(outcome)),
        }
    }

    fn pending(handle: JoinHandle<IngestOutcome>) -> Self {
        Self {
            state: TaskState::Pending(handle),
        }
    }

    /// True while an image encode may still be running
    pub fn is_pending(&self) -> bool {
        match &self.state {
            TaskState::Ready(_) => false,
            TaskState::Pending(handle) => !handle.is_finished(),
        }
    }
}

impl Future for CaptureTask {
    type Output = IngestOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            TaskState::Ready(outcome) => Poll::Ready(outcome.take().unwrap_or(IngestOutcome::Empty)),
            TaskState::Pending(handle) => Pin::new(handle).poll(cx).map(|joined| {
                joined.unwrap_or_else(|_| IngestOutcome::Failed {
                    error: VaultError::Aborted,
                })
            }),
        }
    }
}

/// Prepend under the slot's write lock
fn prepend(items: &Slot<Vec<ContentItem>>, item: ContentItem) -> IngestOutcome {
    let id = item.id();
    let content_type = item.content_type();
    items.update(move |collection| {
        collection.insert(0, item);
        true
    });
    debug!(%id, %content_type, "captured item");
    IngestOutcome::Added { id, content_type }
}

/// The capture → item → store path. Cheap to clone; clones append to the
/// same collection.
#[derive(Clone)]
pub(crate) struct Pipeline {
    items: Slot<Vec<ContentItem>>,
}

impl Pipeline {
    pub(crate) fn new(items: Slot<Vec<ContentItem>>) -> Self {
        Self { items }
    }

    pub(crate) fn ingest(&self, event: CaptureEvent) -> CaptureTask {
        match classify(&event) {
            Classification::Empty => {
                debug!("ignoring capture with no usable content");
                CaptureTask::ready(IngestOutcome::Empty)
            }
            Classification::Ready { content_type, content } => {
                let item = ContentItem::new(content_type, content);
                CaptureTask::ready(prepend(&self.items, item))
            }
            Classification::Image(attachment) => {
                let items = self.items.clone();
                let handle = runtime_handle().spawn(async move {
                    match encode_attachment(attachment).await {
                        Ok(data_uri) => prepend(&items, ContentItem::new_image(data_uri)),
                        Err(error) => {
                            warn!(%error, "dropping image capture");
                            IngestOutcome::Failed { error }
                        }
                    }
                });
                CaptureTask::pending(handle)
            }
        }
    }
}
