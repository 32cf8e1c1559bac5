use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::client::{CompletionStatus, RequestId};

/// One completed request as seen by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvent {
    pub request_id: RequestId,
    pub status: CompletionStatus,
}

impl CompletionEvent {
    pub fn new(request_id: RequestId, status: CompletionStatus) -> Self {
        Self { request_id, status }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Completion bus already closed")]
    Closed,
}

/// Hot, multi-subscriber stream of completion events.
///
/// Subscribers only see events published after they subscribe. Closing the
/// bus drops the sender, which ends every live receiver once it has drained
/// what was published before.
pub struct CompletionBus {
    sender: Mutex<Option<broadcast::Sender<CompletionEvent>>>,
}

impl CompletionBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Returns `None` once the bus has been closed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<CompletionEvent>> {
        self.lock().as_ref().map(|sender| sender.subscribe())
    }

    /// Publishes to every current subscriber and returns how many there were.
    ///
    /// Having no subscribers is not an error: the event is simply gone.
    pub fn publish(&self, event: CompletionEvent) -> Result<usize, EventError> {
        let guard = self.lock();
        let sender = guard.as_ref().ok_or(EventError::Closed)?;
        match sender.send(event) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                debug!("no subscribers for request {}", event.request_id);
                Ok(0)
            }
        }
    }

    /// Closes the bus. Only the first call has an effect and returns `true`.
    pub fn close(&self) -> bool {
        let closed = self.lock().take().is_some();
        if closed {
            debug!("completion bus closed");
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .as_ref()
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Option<broadcast::Sender<CompletionEvent>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
