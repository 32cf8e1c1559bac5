use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, Weak,
};
use std::time::Duration;

use callbridge::{
    client::{AsyncClient, CompletionListener, CompletionStatus, RequestId},
    config::{BridgeConfig, DelayPolicy},
    BridgeError, BridgeResult, StreamAdapter,
};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Client whose completions are fired by hand.
#[derive(Default)]
struct ManualClient {
    listener: Mutex<Option<Weak<dyn CompletionListener>>>,
    last_request_id: AtomicU64,
    refuse_listen: bool,
    refuse_requests: bool,
}

impl ManualClient {
    fn listener(&self) -> Option<Arc<dyn CompletionListener>> {
        self.listener.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    fn complete(&self, request_id: RequestId, status: CompletionStatus) -> bool {
        self.listener()
            .map(|l| l.on_complete(request_id, status))
            .is_some()
    }

    fn fail(&self, request_id: RequestId, status: CompletionStatus) -> bool {
        self.listener()
            .map(|l| l.on_error(request_id, status))
            .is_some()
    }
}

impl AsyncClient for ManualClient {
    fn listen(&self, listener: Weak<dyn CompletionListener>) -> BridgeResult<()> {
        if self.refuse_listen {
            return Err(BridgeError::Internal("listener refused".to_string()));
        }
        *self.listener.lock().unwrap() = Some(listener);
        Ok(())
    }

    fn request(&self, _payload: Option<&str>) -> BridgeResult<RequestId> {
        if self.refuse_requests {
            return Err(BridgeError::Submission("client busy".to_string()));
        }
        Ok(self.last_request_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

fn manual_adapter() -> (Arc<ManualClient>, StreamAdapter) {
    let client = Arc::new(ManualClient::default());
    let adapter = StreamAdapter::with_client(client.clone(), 16).unwrap();
    (client, adapter)
}

fn sample_config(unit_ms: u64) -> BridgeConfig {
    BridgeConfig {
        delay: DelayPolicy::Proportional {
            unit: Duration::from_millis(unit_ms),
        },
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_foo_bar_baz_delivered_in_delay_order() {
    let adapter = StreamAdapter::new(&sample_config(10)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut handles = vec![];
    for payload in ["foo", "bar", "baz"] {
        let view = adapter.request(Some(payload)).unwrap();
        let tx = tx.clone();
        handles.push(view.subscribe_with(move |result| {
            let _ = tx.send((payload, result));
        }));
    }
    drop(tx);

    for handle in handles {
        handle.await.unwrap();
    }

    let mut results = vec![];
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    assert_eq!(results, vec![("foo", true), ("bar", true), ("baz", true)]);
}

#[tokio::test]
async fn test_request_ids_strictly_increase() {
    let adapter = StreamAdapter::new(&sample_config(10)).unwrap();
    let mut previous = 0;
    for _ in 0..10 {
        let id = adapter.request(None).unwrap().request_id();
        assert!(id > previous);
        previous = id;
    }
}

#[tokio::test]
async fn test_completions_out_of_submission_order() {
    let (client, adapter) = manual_adapter();
    let (tx, mut rx) = mpsc::unbounded_channel();

    for payload in ["foo", "bar", "baz"] {
        let tx = tx.clone();
        adapter
            .request(Some(payload))
            .unwrap()
            .subscribe_with(move |result| {
                let _ = tx.send((payload, result));
            });
    }

    assert!(client.complete(3, CompletionStatus::Success));
    assert_eq!(rx.recv().await, Some(("baz", true)));
    assert!(client.complete(1, CompletionStatus::Success));
    assert_eq!(rx.recv().await, Some(("foo", true)));
    assert!(client.complete(2, CompletionStatus::Failure { code: -1 }));
    assert_eq!(rx.recv().await, Some(("bar", false)));
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_reaches_only_matching_views() {
    let (client, adapter) = manual_adapter();
    let first = adapter.request(Some("foo")).unwrap();
    let second = adapter.request(Some("bar")).unwrap();

    let mut a = first.subscribe();
    let mut b = first.subscribe();
    let mut other = second.subscribe();
    assert_eq!(adapter.subscriber_count(), 3);

    client.complete(first.request_id(), CompletionStatus::Success);

    assert_eq!(a.next().await, Some(true));
    assert_eq!(b.next().await, Some(true));
    let missed = tokio::time::timeout(Duration::from_secs(1), other.next()).await;
    assert!(missed.is_err());

    drop(adapter);
    assert_eq!(other.next().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_late_subscription_never_fires() {
    let (client, adapter) = manual_adapter();
    let view = adapter.request(Some("foo")).unwrap();

    client.complete(view.request_id(), CompletionStatus::Success);

    let late = view.subscribe();
    let result = tokio::time::timeout(Duration::from_secs(5), late.first()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_failure_status_maps_to_false() {
    let (client, adapter) = manual_adapter();
    let complete = adapter.request(Some("foo")).unwrap();
    let error = adapter.request(Some("bar")).unwrap();
    let complete_sub = complete.subscribe();
    let error_sub = error.subscribe();

    client.complete(complete.request_id(), CompletionStatus::Failure { code: -1 });
    client.fail(error.request_id(), CompletionStatus::Failure { code: -2 });

    assert_eq!(complete_sub.first().await, Some(false));
    assert_eq!(error_sub.first().await, Some(false));
}

#[tokio::test]
async fn test_drop_completes_stream_and_stops_publishing() {
    let (client, adapter) = manual_adapter();
    let view = adapter.request(Some("foo")).unwrap();
    let pending = view.subscribe();

    drop(adapter);

    assert_eq!(pending.first().await, None);
    // The client only held a weak reference; nothing is left to publish to.
    assert!(!client.complete(view.request_id(), CompletionStatus::Success));
    assert_eq!(view.subscribe().first().await, None);
}

#[test]
fn test_adapter_outside_runtime_is_construction_error() {
    let client = Arc::new(ManualClient::default());
    let result = StreamAdapter::with_client(client.clone(), 16);
    assert!(matches!(result, Err(BridgeError::Construction(_))));
    // Nothing was registered, so no callback can reach a half-built adapter.
    assert!(client.listener().is_none());
}

#[tokio::test]
async fn test_listener_registration_failure_is_construction_error() {
    let client = Arc::new(ManualClient {
        refuse_listen: true,
        ..Default::default()
    });
    let result = StreamAdapter::with_client(client, 16);
    assert!(matches!(result, Err(BridgeError::Construction(_))));
}

#[tokio::test]
async fn test_rejected_request_is_submission_error() {
    let client = Arc::new(ManualClient {
        refuse_requests: true,
        ..Default::default()
    });
    let adapter = StreamAdapter::with_client(client, 16).unwrap();
    assert!(matches!(
        adapter.request(Some("foo")),
        Err(BridgeError::Submission(_))
    ));
}
