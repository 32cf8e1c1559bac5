use std::{
    pin::Pin,
    sync::Arc,
    task::{ready, Context, Poll},
};

use futures::{stream::FusedStream, Stream, StreamExt};
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{trace, warn};

use super::event_bus::{CompletionBus, CompletionEvent};
use crate::client::RequestId;

/// Lazily subscribed view of the completion bus for a single request.
///
/// Nothing is attached to the bus until [`RequestView::subscribe`] is called,
/// and the bus does not replay: if the matching completion was broadcast
/// before that, the subscription stays silent until the bus closes.
#[derive(Clone)]
pub struct RequestView {
    request_id: RequestId,
    bus: Arc<CompletionBus>,
    runtime: Handle,
}

impl RequestView {
    pub(crate) fn new(request_id: RequestId, bus: Arc<CompletionBus>, runtime: Handle) -> Self {
        Self {
            request_id,
            bus,
            runtime,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Attaches to the bus now.
    pub fn subscribe(&self) -> RequestSubscription {
        let inner = self.bus.subscribe().map(BroadcastStream::new);
        if inner.is_none() {
            trace!("subscribed to closed bus for request {}", self.request_id);
        }
        RequestSubscription {
            request_id: self.request_id,
            inner,
        }
    }

    /// Subscribes immediately and calls `on_result` from a task on the
    /// adapter's runtime once the result arrives. If the bus closes first it
    /// is never called.
    pub fn subscribe_with<F>(&self, on_result: F) -> JoinHandle<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let subscription = self.subscribe();
        self.runtime.spawn(async move {
            if let Some(result) = subscription.first().await {
                on_result(result);
            }
        })
    }
}

/// Yields `true`/`false` for its request at most once, then ends.
pub struct RequestSubscription {
    request_id: RequestId,
    inner: Option<BroadcastStream<CompletionEvent>>,
}

impl RequestSubscription {
    pub async fn first(mut self) -> Option<bool> {
        self.next().await
    }
}

impl Stream for RequestSubscription {
    type Item = bool;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<bool>> {
        let request_id = self.request_id;
        loop {
            let Some(inner) = self.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match ready!(inner.poll_next_unpin(cx)) {
                Some(Ok(event)) if event.request_id == request_id => {
                    self.inner = None;
                    return Poll::Ready(Some(event.status.is_success()));
                }
                Some(Ok(_)) => continue,
                Some(Err(BroadcastStreamRecvError::Lagged(count))) => {
                    warn!(
                        "subscription for request {} lagged by {} events",
                        request_id, count
                    );
                    continue;
                }
                None => {
                    self.inner = None;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl FusedStream for RequestSubscription {
    fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}
