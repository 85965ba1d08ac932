//! Bitfinex Stream Feed Binary
//!
//! Starts the market data feed client.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p bitfinex-stream-feed
//! ```
//!
//! # Environment Variables
//!
//! All optional; see `infrastructure::config` for the full list.
//!
//! - `BFX_STREAM_URL`: WebSocket endpoint (default: `wss://api-pub.bitfinex.com/ws/2`)
//! - `BFX_RECONNECT_TIMEOUT_SECS`: reconnect window (default: 30)
//! - `BFX_SUBSCRIPTIONS`: subscription list (defaults to a representative set)
//! - `BFX_LOG_FILE`: optional log file destination
//! - `RUST_LOG`: log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use bitfinex_stream_feed::application::dispatch::{Dispatcher, DispatcherConfig};
use bitfinex_stream_feed::application::ports::{HandlerError, RecordHandler};
use bitfinex_stream_feed::domain::record::{DecodedRecord, RecordKind};
use bitfinex_stream_feed::domain::subscription::SubscriptionRegistry;
use bitfinex_stream_feed::infrastructure::bitfinex::{BitfinexCodec, FeedClient, FeedClientConfig};
use bitfinex_stream_feed::infrastructure::config::FeedConfig;
use bitfinex_stream_feed::infrastructure::telemetry;
use bitfinex_stream_feed::infrastructure::transport::WsTransport;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// How long to wait for the client to wind down after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default consumer wired to every record kind: logs the record and leaves
/// interpretation to whoever replaces it with a real [`RecordHandler`].
struct DebugHandler;

impl RecordHandler for DebugHandler {
    fn on_record(&self, record: &DecodedRecord) -> Result<(), HandlerError> {
        tracing::debug!(kind = %record.kind(), ?record, "Record received");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[allow(clippy::expect_used)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let _ = dotenvy::dotenv();

    let config = FeedConfig::from_env()?;
    telemetry::init(&config.log)?;

    tracing::info!("Starting Bitfinex stream feed");
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Subscription registry: the durable memory of desired state.
    let registry = Arc::new(SubscriptionRegistry::new());
    for subscription in &config.subscriptions {
        registry.add(subscription.clone());
    }
    tracing::info!(
        subscriptions = registry.len(),
        "Subscription registry populated"
    );

    // Dispatcher must be running before the client connects so records
    // arriving during subscription replay are not lost.
    let mut dispatcher = Dispatcher::new(DispatcherConfig {
        queue_capacity: config.dispatch.queue_capacity,
    });
    let handler = Arc::new(DebugHandler);
    for kind in RecordKind::all() {
        dispatcher.register(*kind, Arc::clone(&handler) as Arc<dyn RecordHandler>)?;
    }
    dispatcher.start(&shutdown_token);
    let dispatcher = Arc::new(dispatcher);

    let client = FeedClient::new(
        FeedClientConfig::from_connection_settings(&config.connection),
        WsTransport::new(config.url.clone()),
        BitfinexCodec::new(),
        Arc::clone(&registry),
        Arc::clone(&dispatcher),
        shutdown_token.clone(),
    );
    let state = client.state_watch();

    let mut client_task = tokio::spawn(client.run());

    tokio::select! {
        result = &mut client_task => match result {
            Ok(Ok(())) => tracing::info!("Feed client finished"),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Feed client gave up");
                return Err(e.into());
            }
            Err(e) => {
                tracing::error!(error = %e, "Feed client task failed");
                return Err(e.into());
            }
        },
        () = await_shutdown() => {
            shutdown_token.cancel();
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, client_task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    tracing::warn!(error = %e, "Feed client ended with error during shutdown");
                }
                Ok(Err(e)) => tracing::warn!(error = %e, "Feed client task join failed"),
                Err(_) => tracing::warn!("Feed client did not stop within the shutdown timeout"),
            }
        }
    }

    tracing::info!(state = %*state.borrow(), "Stream feed stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &FeedConfig) {
    tracing::info!(
        url = %config.url,
        reconnect_timeout_secs = config.connection.reconnect_timeout.as_secs(),
        ping_interval_secs = config.connection.ping_interval.as_secs(),
        queue_capacity = config.dispatch.queue_capacity,
        subscriptions = config.subscriptions.len(),
        "Configuration loaded"
    );
    for subscription in &config.subscriptions {
        tracing::debug!(subscription = %subscription, "Declared subscription");
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
