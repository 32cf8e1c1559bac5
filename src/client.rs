//! # Callback-based asynchronous client
//!
//! [`AsyncClient`] is the one-shot callback interface being bridged: a
//! request returns its identifier immediately and the single registered
//! [`CompletionListener`] hears about it later. [`SampleClient`] is the
//! reference implementation, completing every request successfully after a
//! configurable delay.
//!
//! The client only keeps a [`Weak`] reference to its listener. Whoever
//! registered the listener owns it; once it is dropped, completions that
//! arrive afterwards are discarded.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError, Weak,
    },
};

use tokio::runtime::Handle;
use tracing::{debug, info, instrument};

use crate::{config::DelayPolicy, BridgeError, BridgeResult};

/// Identifier handed out by a client; unique and increasing per instance.
pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Success,
    Failure { code: i32 },
}

impl CompletionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CompletionStatus::Success)
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionStatus::Success => write!(f, "0"),
            CompletionStatus::Failure { code } => write!(f, "{}", code),
        }
    }
}

/// Receives the outcome of requests made on an [`AsyncClient`].
#[mockall::automock]
pub trait CompletionListener: Send + Sync {
    fn on_complete(&self, request_id: RequestId, status: CompletionStatus);

    /// Part of the contract, but [`SampleClient`] never reports errors.
    fn on_error(&self, request_id: RequestId, status: CompletionStatus);
}

pub trait AsyncClient: Send + Sync {
    /// Replaces the registered listener. Only one listener is kept.
    fn listen(&self, listener: Weak<dyn CompletionListener>) -> BridgeResult<()>;

    /// Starts a request and returns its identifier without waiting for it.
    fn request(&self, payload: Option<&str>) -> BridgeResult<RequestId>;
}

struct ClientShared {
    listener: Mutex<Option<Weak<dyn CompletionListener>>>,
    last_request_id: AtomicU64,
}

impl ClientShared {
    fn current_listener(&self) -> Option<Arc<dyn CompletionListener>> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }
}

/// Completes every request with [`CompletionStatus::Success`] after the
/// delay chosen by its [`DelayPolicy`], on a detached tokio task.
pub struct SampleClient {
    shared: Arc<ClientShared>,
    runtime: Handle,
    delay: DelayPolicy,
}

impl SampleClient {
    /// Must be called from within a tokio runtime; completions are spawned
    /// onto that runtime.
    pub fn acquire(delay: DelayPolicy) -> BridgeResult<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            BridgeError::construction(format!("No async runtime for client: {}", e))
        })?;
        Ok(Self {
            shared: Arc::new(ClientShared {
                listener: Mutex::new(None),
                last_request_id: AtomicU64::new(0),
            }),
            runtime,
            delay,
        })
    }

    fn next_request_id(&self) -> BridgeResult<RequestId> {
        self.shared
            .last_request_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map(|previous| previous + 1)
            .map_err(|_| BridgeError::submission("Request identifiers exhausted"))
    }
}

impl AsyncClient for SampleClient {
    fn listen(&self, listener: Weak<dyn CompletionListener>) -> BridgeResult<()> {
        *self
            .shared
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn request(&self, payload: Option<&str>) -> BridgeResult<RequestId> {
        let request_id = self.next_request_id()?;
        info!(
            "SampleClient::request {} {}",
            request_id,
            payload.unwrap_or("")
        );

        let delay = self.delay.delay_for(request_id);
        let shared = self.shared.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            match shared.current_listener() {
                Some(listener) => listener.on_complete(request_id, CompletionStatus::Success),
                None => debug!("no listener for request {}, completion dropped", request_id),
            }
        });

        Ok(request_id)
    }
}
