//! Paste event boundary
//!
//! The environment publishes capture events on a `PasteBus`; a vault attaches
//! once and detaches on shutdown. Detach is tied to the subscription's
//! lifetime, so attach and detach are always paired.

use crate::capture::CaptureEvent;
use crate::ingest::{runtime_handle, Pipeline};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DEFAULT_BUS_CAPACITY: usize = 64;

/// Process-wide hub for paste events
pub struct PasteBus {
    sender: broadcast::Sender<CaptureEvent>,
}

impl PasteBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver an event to every attached listener. Returns how many saw it.
    pub fn publish(&self, event: CaptureEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.sender.subscribe()
    }
}

impl Default for PasteBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// An attached listener. Dropping it detaches.
pub struct CaptureSubscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CaptureSubscription {
    pub fn is_attached(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Token that detaches this subscription when cancelled
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Detach and wait until the listener has released the bus
    pub async fn detach(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for CaptureSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawn the listener loop. Events are handled one at a time; image encodes
/// continue on their own task so the loop never waits for them.
pub(crate) fn attach(pipeline: Pipeline, bus: &PasteBus) -> CaptureSubscription {
    // Subscribe before spawning so events published right after attach are seen
    let mut receiver = bus.subscribe();
    let token = CancellationToken::new();
    let cancelled = token.clone();

    let handle = runtime_handle().spawn(async move {
        debug!("capture listener attached");
        loop {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => break,
                received = receiver.recv() => match received {
                    Ok(event) => {
                        // Image encodes finish on their own task; the loop moves on
                        drop(pipeline.ingest(event));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "paste bus lagged, capture events were dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!("capture listener detached");
    });

    CaptureSubscription {
        token,
        handle: Some(handle),
    }
}
