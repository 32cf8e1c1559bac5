//! # Stream Adapter
//!
//! [`StreamAdapter`] turns the one-shot callbacks of an [`AsyncClient`] into
//! per-request [`RequestView`]s over a shared [`CompletionBus`].
//!
//! The adapter owns its listener and hands the client only a weak reference.
//! Dropping the adapter drops the listener, which closes the bus; any
//! subscription still waiting then ends without a value.
//!
//! The bus is hot. A view has to be subscribed before its request completes,
//! otherwise the result is missed:
//!
//! ```rust,no_run
//! # use callbridge::{adapter::StreamAdapter, config::BridgeConfig};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = StreamAdapter::new(&BridgeConfig::default())?;
//! let view = adapter.request(Some("foo"))?;
//! view.subscribe_with(|ok| println!("write_result {} foo", ok));
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::{
    client::{AsyncClient, CompletionListener, CompletionStatus, RequestId, SampleClient},
    config::BridgeConfig,
    event::{CompletionBus, CompletionEvent, RequestView},
    BridgeError, BridgeResult,
};

/// Listener registered with the client; republishes onto the bus.
struct BusListener {
    bus: Arc<CompletionBus>,
}

impl BusListener {
    fn publish(&self, request_id: RequestId, status: CompletionStatus) {
        if let Err(e) = self
            .bus
            .publish(CompletionEvent::new(request_id, status))
        {
            warn!("completion for request {} not published: {}", request_id, e);
        }
    }
}

impl CompletionListener for BusListener {
    fn on_complete(&self, request_id: RequestId, status: CompletionStatus) {
        info!("BusListener::on_complete {} {}", request_id, status);
        self.publish(request_id, status);
    }

    fn on_error(&self, request_id: RequestId, status: CompletionStatus) {
        warn!("BusListener::on_error {} {}", request_id, status);
        self.publish(request_id, status);
    }
}

impl Drop for BusListener {
    fn drop(&mut self) {
        if self.bus.close() {
            debug!("listener dropped, completion stream finished");
        }
    }
}

pub struct StreamAdapter {
    client: Arc<dyn AsyncClient>,
    bus: Arc<CompletionBus>,
    runtime: Handle,
    // Keeps the listener alive; the client only holds a weak reference.
    _listener: Arc<BusListener>,
}

impl StreamAdapter {
    /// Acquires a [`SampleClient`] and registers with it.
    pub fn new(config: &BridgeConfig) -> BridgeResult<Self> {
        let client = SampleClient::acquire(config.delay)?;
        Self::with_client(Arc::new(client), config.channel_capacity)
    }

    /// Must be called from within a tokio runtime; result callbacks from
    /// [`RequestView::subscribe_with`] run on that runtime.
    pub fn with_client(client: Arc<dyn AsyncClient>, capacity: usize) -> BridgeResult<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            BridgeError::construction(format!("No async runtime for adapter: {}", e))
        })?;
        let bus = Arc::new(CompletionBus::new(capacity));
        let listener = Arc::new(BusListener { bus: bus.clone() });

        let weak: Weak<dyn CompletionListener> = Arc::downgrade(&listener) as _;
        client.listen(weak).map_err(|e| match e {
            BridgeError::Construction(_) => e,
            other => BridgeError::construction(format!("Failed to register listener: {}", other)),
        })?;

        Ok(Self {
            client,
            bus,
            runtime,
            _listener: listener,
        })
    }

    /// Submits `payload` and returns a view of its eventual result.
    ///
    /// The view yields `true` when the request succeeds and `false` when it
    /// fails. It must be subscribed before the result arrives.
    #[instrument(level = "debug", skip(self))]
    pub fn request(&self, payload: Option<&str>) -> BridgeResult<RequestView> {
        let request_id = self.client.request(payload).map_err(|e| match e {
            BridgeError::Submission(_) => e,
            other => BridgeError::submission(format!("Request rejected: {}", other)),
        })?;
        Ok(RequestView::new(
            request_id,
            self.bus.clone(),
            self.runtime.clone(),
        ))
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }
}
