//! Connection Lifecycle Integration Tests
//!
//! Exercises the feed client against a scripted in-memory transport:
//! subscription replay per connection epoch, reconnect-window exhaustion,
//! shutdown idempotence, and ingestion resilience.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bitfinex_stream_feed::application::dispatch::{Dispatcher, DispatcherConfig};
use bitfinex_stream_feed::application::ports::{
    ConnectionEvent, HandlerError, RecordHandler, Transport, TransportError,
};
use bitfinex_stream_feed::domain::connection::ConnectionState;
use bitfinex_stream_feed::domain::record::{DecodedRecord, RecordKind};
use bitfinex_stream_feed::domain::subscription::{Subscription, SubscriptionRegistry};
use bitfinex_stream_feed::infrastructure::bitfinex::{
    BitfinexCodec, FeedClient, FeedClientConfig, FeedError, LivenessConfig, ReconnectConfig,
};

// =============================================================================
// Scripted Transport
// =============================================================================

/// Shared observation log for a scripted transport.
#[derive(Default)]
struct TransportLog {
    sent: Mutex<Vec<String>>,
    open_count: AtomicUsize,
    close_count: AtomicUsize,
    fail_all_opens: AtomicBool,
    fail_send_indices: Mutex<HashSet<usize>>,
    send_calls: AtomicUsize,
}

impl TransportLog {
    fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    fn subscribe_frames(&self) -> Vec<String> {
        self.sent_frames()
            .into_iter()
            .filter(|frame| frame.contains(r#""event":"subscribe""#))
            .collect()
    }
}

/// Transport driven entirely by the test: connection events are fed through
/// a channel, open/send outcomes are scripted via the log.
struct ScriptedTransport {
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    log: Arc<TransportLog>,
}

impl ScriptedTransport {
    fn new() -> (
        Self,
        mpsc::UnboundedSender<ConnectionEvent>,
        Arc<TransportLog>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let log = Arc::new(TransportLog::default());
        (
            Self {
                events: rx,
                log: Arc::clone(&log),
            },
            tx,
            log,
        )
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.log.open_count.fetch_add(1, Ordering::SeqCst);
        if self.log.fail_all_opens.load(Ordering::SeqCst) {
            return Err(TransportError::Open("scripted open failure".to_string()));
        }
        Ok(())
    }

    async fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        let index = self.log.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.log.fail_send_indices.lock().contains(&index) {
            return Err(TransportError::Send("scripted send failure".to_string()));
        }
        self.log.sent.lock().push(frame.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn fast_config() -> FeedClientConfig {
    FeedClientConfig {
        reconnect_timeout: Duration::from_secs(30),
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
            jitter_factor: 0.0,
        },
        liveness: LivenessConfig::default(),
    }
}

fn started_dispatcher(cancel: &CancellationToken) -> Arc<Dispatcher> {
    let mut dispatcher = Dispatcher::new(DispatcherConfig::default());
    dispatcher.start(cancel);
    Arc::new(dispatcher)
}

struct Counting {
    count: AtomicUsize,
}

impl Counting {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            count: AtomicUsize::new(0),
        })
    }
}

impl RecordHandler for Counting {
    fn on_record(&self, _record: &DecodedRecord) -> Result<(), HandlerError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn wait_until(check: impl Fn() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn replays_full_registry_once_per_epoch_in_insertion_order() {
    let (transport, events, log) = ScriptedTransport::new();
    let cancel = CancellationToken::new();

    let registry = Arc::new(SubscriptionRegistry::new());
    registry.add(Subscription::ticker("BTC/USD"));
    registry.add(Subscription::trades("BTC/USD"));

    let client = FeedClient::new(
        fast_config(),
        transport,
        BitfinexCodec::new(),
        Arc::clone(&registry),
        started_dispatcher(&cancel),
        cancel.clone(),
    );
    let task = tokio::spawn(client.run());

    // First epoch: exactly two subscribe frames, ticker first.
    events.send(ConnectionEvent::Connected).unwrap();
    wait_until(|| log.subscribe_frames().len() == 2).await;

    let frames = log.subscribe_frames();
    assert!(frames[0].contains(r#""channel":"ticker""#));
    assert!(frames[0].contains("tBTCUSD"));
    assert!(frames[1].contains(r#""channel":"trades""#));
    assert!(frames[1].contains("tBTCUSD"));

    // Second epoch: the full set is replayed again, exactly once.
    events
        .send(ConnectionEvent::Disconnected {
            reason: "peer reset".to_string(),
        })
        .unwrap();
    events.send(ConnectionEvent::Connected).unwrap();
    wait_until(|| log.subscribe_frames().len() == 4).await;

    let frames = log.subscribe_frames();
    assert!(frames[2].contains(r#""channel":"ticker""#));
    assert!(frames[3].contains(r#""channel":"trades""#));

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert_eq!(log.subscribe_frames().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn reconnect_window_exhaustion_surfaces_one_terminal_error() {
    let (transport, _events, log) = ScriptedTransport::new();
    log.fail_all_opens.store(true, Ordering::SeqCst);

    let cancel = CancellationToken::new();
    let config = FeedClientConfig {
        reconnect_timeout: Duration::from_secs(30),
        ..fast_config()
    };

    let client = FeedClient::new(
        config,
        transport,
        BitfinexCodec::new(),
        Arc::new(SubscriptionRegistry::new()),
        started_dispatcher(&cancel),
        cancel.clone(),
    );
    let mut state = client.state_watch();

    let result = tokio::spawn(client.run()).await.unwrap();

    assert!(matches!(
        result,
        Err(FeedError::ReconnectTimedOut { timeout }) if timeout == Duration::from_secs(30)
    ));
    assert_eq!(*state.borrow_and_update(), ConnectionState::Disconnected);
    assert!(log.open_count.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_shutdown_closes_the_transport_exactly_once() {
    let (transport, events, log) = ScriptedTransport::new();
    let cancel = CancellationToken::new();

    let registry = Arc::new(SubscriptionRegistry::new());
    registry.add(Subscription::ticker("BTC/USD"));

    let client = FeedClient::new(
        fast_config(),
        transport,
        BitfinexCodec::new(),
        Arc::clone(&registry),
        started_dispatcher(&cancel),
        cancel.clone(),
    );
    let mut state = client.state_watch();
    let task = tokio::spawn(client.run());

    events.send(ConnectionEvent::Connected).unwrap();
    wait_until(|| log.subscribe_frames().len() == 1).await;

    // A second and third trigger are no-ops, not errors.
    cancel.cancel();
    cancel.cancel();
    cancel.cancel();

    task.await.unwrap().unwrap();
    assert_eq!(log.close_count.load(Ordering::SeqCst), 1);
    assert_eq!(*state.borrow_and_update(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn replay_continues_past_a_failed_subscription() {
    let (transport, events, log) = ScriptedTransport::new();
    let cancel = CancellationToken::new();

    let registry = Arc::new(SubscriptionRegistry::new());
    for symbol in ["A/USD", "B/USD", "C/USD", "D/USD", "E/USD"] {
        registry.add(Subscription::ticker(symbol));
    }

    // Second send of the replay fails.
    log.fail_send_indices.lock().insert(1);

    let client = FeedClient::new(
        fast_config(),
        transport,
        BitfinexCodec::new(),
        Arc::clone(&registry),
        started_dispatcher(&cancel),
        cancel.clone(),
    );
    let task = tokio::spawn(client.run());

    events.send(ConnectionEvent::Connected).unwrap();
    wait_until(|| log.subscribe_frames().len() == 4).await;

    let frames = log.subscribe_frames();
    assert!(frames[0].contains("tAUSD"));
    assert!(frames[1].contains("tCUSD"));
    assert!(frames[2].contains("tDUSD"));
    assert!(frames[3].contains("tEUSD"));

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn ingestion_survives_malformed_and_unrecognized_frames() {
    let (transport, events, log) = ScriptedTransport::new();
    let cancel = CancellationToken::new();

    let registry = Arc::new(SubscriptionRegistry::new());
    registry.add(Subscription::trades("BTC/USD"));

    let trades = Counting::new();
    let mut dispatcher = Dispatcher::new(DispatcherConfig::default());
    dispatcher
        .register(RecordKind::Trade, Arc::clone(&trades) as Arc<dyn RecordHandler>)
        .unwrap();
    dispatcher.start(&cancel);

    let client = FeedClient::new(
        fast_config(),
        transport,
        BitfinexCodec::new(),
        Arc::clone(&registry),
        Arc::new(dispatcher),
        cancel.clone(),
    );
    let task = tokio::spawn(client.run());

    events.send(ConnectionEvent::Connected).unwrap();
    wait_until(|| log.subscribe_frames().len() == 1).await;

    // Garbage, an unknown event tag, and a frame for an unknown channel all
    // drop without stalling the feed.
    events
        .send(ConnectionEvent::Frame("not json at all".to_string()))
        .unwrap();
    events
        .send(ConnectionEvent::Frame(
            r#"{"event":"wallet-v2","fields":[]}"#.to_string(),
        ))
        .unwrap();
    events
        .send(ConnectionEvent::Frame("[999,[1,2,3]]".to_string()))
        .unwrap();

    // The stream is still alive: a real trade makes it to the handler.
    events
        .send(ConnectionEvent::Frame(
            r#"{"event":"subscribed","channel":"trades","chanId":17,"symbol":"tBTCUSD"}"#
                .to_string(),
        ))
        .unwrap();
    events
        .send(ConnectionEvent::Frame(
            r#"[17,"te",[401597395,1574694478808,0.005,7245.3]]"#.to_string(),
        ))
        .unwrap();

    wait_until(|| trades.count.load(Ordering::SeqCst) == 1).await;

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn unanswered_liveness_ping_triggers_reconnect() {
    let (transport, events, log) = ScriptedTransport::new();
    let cancel = CancellationToken::new();

    let config = FeedClientConfig {
        liveness: LivenessConfig {
            ping_interval: Duration::from_millis(50),
            pong_timeout: Duration::from_millis(100),
        },
        ..fast_config()
    };

    let client = FeedClient::new(
        config,
        transport,
        BitfinexCodec::new(),
        Arc::new(SubscriptionRegistry::new()),
        started_dispatcher(&cancel),
        cancel.clone(),
    );
    let task = tokio::spawn(client.run());

    events.send(ConnectionEvent::Connected).unwrap();

    // A ping goes out, no pong ever arrives, and the client reopens the
    // connection on its own.
    wait_until(|| {
        log.sent_frames()
            .iter()
            .any(|frame| frame.contains(r#""event":"ping""#))
    })
    .await;
    wait_until(|| log.open_count.load(Ordering::SeqCst) >= 2).await;

    cancel.cancel();
    task.await.unwrap().unwrap();
}
