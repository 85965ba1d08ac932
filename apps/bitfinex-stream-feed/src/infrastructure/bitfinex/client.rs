//! Feed Client
//!
//! The connection lifecycle controller. Owns one transport end to end and
//! guarantees that:
//!
//! - every successful connection is followed by a full subscription replay
//!   before the epoch is considered ready,
//! - a lost connection is retried with backoff inside a bounded reconnect
//!   window (exhaustion surfaces one terminal error to the supervisor),
//! - cancellation closes the transport exactly once and lands the state
//!   machine in its terminal `Closed` state.
//!
//! The exchange treats every physical connection as stateless, so the
//! subscription registry is replayed on every `Connected` event, not just
//! the first.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::liveness::{LivenessConfig, LivenessProbe, ProbeAction};
use super::messages::{PingRequest, SubscribeRequest};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::dispatch::Dispatcher;
use crate::application::ports::{
    ConnectionEvent, DecodeError, FrameCodec, Transport, TransportError,
};
use crate::domain::connection::ConnectionState;
use crate::domain::record::DecodedRecord;
use crate::domain::subscription::{Subscription, SubscriptionRegistry, SubscriptionSink};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// Wall-clock window for re-establishing a lost connection before the
    /// client gives up and surfaces a terminal error.
    pub reconnect_timeout: Duration,
    /// Backoff policy between attempts inside the window.
    pub reconnect: ReconnectConfig,
    /// Liveness probe settings.
    pub liveness: LivenessConfig,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            reconnect_timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            liveness: LivenessConfig::default(),
        }
    }
}

impl FeedClientConfig {
    /// Create configuration from `ConnectionSettings`.
    #[must_use]
    pub const fn from_connection_settings(
        settings: &crate::infrastructure::config::ConnectionSettings,
    ) -> Self {
        Self {
            reconnect_timeout: settings.reconnect_timeout,
            reconnect: ReconnectConfig::from_connection_settings(settings),
            liveness: LivenessConfig::from_connection_settings(settings),
        }
    }
}

/// Errors surfaced by the feed client.
///
/// Everything else (open failures, send failures, decode failures, handler
/// failures) is recovered internally and only reaches the log.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// No connection was re-established within the reconnect window.
    #[error("no connection re-established within {timeout:?}")]
    ReconnectTimedOut {
        /// The configured reconnect window.
        timeout: Duration,
    },
}

/// How a reconnect window ended.
enum ReconnectOutcome {
    /// A connection attempt succeeded; the `Connected` event follows.
    Resumed,
    /// The run is over (cancellation or window exhaustion).
    Stop(Result<(), FeedError>),
}

// =============================================================================
// Feed Client
// =============================================================================

/// Connection lifecycle controller for one feed.
///
/// Built at startup and consumed by [`FeedClient::run`], which drives the
/// connection until cancellation or reconnect-window exhaustion. The
/// connection state is observable through [`FeedClient::state_watch`].
pub struct FeedClient<T, C> {
    config: FeedClientConfig,
    transport: T,
    codec: C,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,
    probe: LivenessProbe,
    transport_closed: bool,
}

impl<T, C> FeedClient<T, C>
where
    T: Transport,
    C: FrameCodec,
{
    /// Create a feed client.
    ///
    /// The dispatcher should already be started so records flowing in
    /// during subscription replay are not lost.
    #[must_use]
    pub fn new(
        config: FeedClientConfig,
        transport: T,
        codec: C,
        registry: Arc<SubscriptionRegistry>,
        dispatcher: Arc<Dispatcher>,
        cancel: CancellationToken,
    ) -> Self {
        let probe = LivenessProbe::new(config.liveness.clone());
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            transport,
            codec,
            registry,
            dispatcher,
            cancel,
            state_tx,
            probe,
            transport_closed: false,
        }
    }

    /// Observe connection state changes.
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Drive the connection until cancellation or reconnect exhaustion.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::ReconnectTimedOut`] when a lost connection was
    /// not re-established within the configured window. The caller decides
    /// whether to run again or exit; the client never loops forever
    /// silently.
    pub async fn run(mut self) -> Result<(), FeedError> {
        self.transition(ConnectionState::Connecting);

        if self.cancel.is_cancelled() {
            return self.shut_down().await;
        }

        if let Err(e) = self.transport.open().await {
            tracing::warn!(error = %e, "Initial connection attempt failed");
            self.transition(ConnectionState::Reconnecting);
            if let ReconnectOutcome::Stop(result) = self.reconnect().await {
                return result;
            }
        }

        let mut ticker = tokio::time::interval(self.probe.ping_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    return self.shut_down().await;
                }
                _ = ticker.tick(), if *self.state_tx.borrow() == ConnectionState::Connected => {
                    if let Err(reason) = self.probe_tick().await {
                        tracing::warn!(reason = %reason, "Liveness check failed");
                        self.transition(ConnectionState::Reconnecting);
                        if let ReconnectOutcome::Stop(result) = self.reconnect().await {
                            return result;
                        }
                    }
                }
                event = self.transport.next_event() => match event {
                    Some(ConnectionEvent::Connected) => {
                        self.on_connected().await;
                    }
                    Some(ConnectionEvent::Frame(frame)) => {
                        self.on_frame(&frame);
                    }
                    Some(ConnectionEvent::Disconnected { reason }) => {
                        tracing::warn!(reason = %reason, "Connection lost");
                        self.transition(ConnectionState::Reconnecting);
                        if let ReconnectOutcome::Stop(result) = self.reconnect().await {
                            return result;
                        }
                    }
                    None => {
                        tracing::warn!("Transport event stream ended");
                        self.transition(ConnectionState::Reconnecting);
                        if let ReconnectOutcome::Stop(result) = self.reconnect().await {
                            return result;
                        }
                    }
                },
            }
        }
    }

    /// Handle a fresh connection epoch: reset per-connection state and
    /// replay the full subscription set before the epoch counts as ready.
    async fn on_connected(&mut self) {
        self.transition(ConnectionState::Connected);
        self.codec.reset();
        self.probe.reset();
        self.replay_subscriptions().await;
    }

    async fn replay_subscriptions(&mut self) {
        let total = self.registry.len();
        tracing::info!(subscriptions = total, "Replaying subscriptions");

        let mut sink = TransportSink {
            transport: &mut self.transport,
        };
        let failed = self.registry.replay(&mut sink).await;

        for subscription in &failed {
            tracing::warn!(subscription = %subscription, "Subscription request failed, continuing");
        }
        if failed.is_empty() {
            tracing::info!(subscriptions = total, "Subscription replay complete");
        } else {
            tracing::warn!(
                failed = failed.len(),
                total,
                "Subscription replay finished with failures"
            );
        }
    }

    /// Decode one inbound frame and dispatch its records.
    ///
    /// Decode failures drop the frame with a log entry; ingestion always
    /// continues with the next frame.
    fn on_frame(&mut self, frame: &str) {
        match self.codec.decode(frame) {
            Ok(records) => {
                for record in records {
                    if let DecodedRecord::Pong(pong) = &record
                        && self.probe.on_pong(pong.cid)
                    {
                        tracing::debug!(cid = pong.cid, "Liveness pong received");
                    }
                    self.dispatcher.dispatch(record);
                }
            }
            Err(DecodeError::UnknownKind(tag)) => {
                tracing::info!(tag = %tag, "Unrecognized record kind, frame dropped");
            }
            Err(e) => {
                tracing::warn!(error = %e, frame_len = frame.len(), "Frame decode failed, dropped");
            }
        }

        // Any inbound frame is proof of life.
        self.probe.on_activity();
    }

    /// Advance the liveness probe; an error means the connection is dead.
    async fn probe_tick(&mut self) -> Result<(), String> {
        match self.probe.on_tick() {
            ProbeAction::Ping(cid) => {
                match PingRequest::new(cid).to_json() {
                    Ok(frame) => {
                        if let Err(e) = self.transport.send(&frame).await {
                            return Err(format!("ping send failed: {e}"));
                        }
                        tracing::debug!(cid, "Liveness ping sent");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Ping serialization failed");
                    }
                }
                Ok(())
            }
            ProbeAction::Expired { cid } => Err(format!("ping {cid} unanswered past timeout")),
            ProbeAction::Wait => Ok(()),
        }
    }

    /// Retry the connection with backoff until success, cancellation, or
    /// expiry of the reconnect window.
    async fn reconnect(&mut self) -> ReconnectOutcome {
        let timeout = self.config.reconnect_timeout;
        let deadline = Instant::now() + timeout;
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            let delay = policy.next_delay();
            let attempt = policy.attempt_count();

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return ReconnectOutcome::Stop(self.shut_down().await);
                }
                () = tokio::time::sleep_until(deadline) => {
                    return ReconnectOutcome::Stop(self.give_up(timeout));
                }
                () = tokio::time::sleep(delay) => {}
            }

            tracing::info!(attempt, delay_ms = delay.as_millis(), "Reconnecting");
            match tokio::time::timeout_at(deadline, self.transport.open()).await {
                Ok(Ok(())) => {
                    tracing::info!(attempt, "Connection re-established");
                    return ReconnectOutcome::Resumed;
                }
                Ok(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
                }
                Err(_elapsed) => {
                    return ReconnectOutcome::Stop(self.give_up(timeout));
                }
            }
        }
    }

    /// The reconnect window elapsed without a connection; surface the one
    /// terminal error for this attempt.
    fn give_up(&mut self, timeout: Duration) -> Result<(), FeedError> {
        tracing::error!(timeout_secs = timeout.as_secs(), "Reconnect window elapsed");
        self.transition(ConnectionState::Disconnected);
        Err(FeedError::ReconnectTimedOut { timeout })
    }

    /// Close the transport exactly once and land in `Closed`.
    async fn shut_down(&mut self) -> Result<(), FeedError> {
        if !self.transport_closed {
            self.transport_closed = true;
            if let Err(e) = self.transport.close().await {
                tracing::warn!(error = %e, "Transport close failed during shutdown");
            }
        }
        self.transition(ConnectionState::Closed);
        tracing::info!("Feed client closed");
        Ok(())
    }

    /// Apply a state transition, ignoring no-ops and rejecting illegal ones.
    fn transition(&self, next: ConnectionState) {
        let current = *self.state_tx.borrow();
        if current == next {
            return;
        }
        if !current.can_transition(next) {
            tracing::error!(from = %current, to = %next, "Illegal state transition ignored");
            return;
        }
        tracing::debug!(from = %current, to = %next, "Connection state changed");
        self.state_tx.send_replace(next);
    }
}

// =============================================================================
// Replay Sink
// =============================================================================

/// Adapts the transport into the registry's replay sink, encoding each
/// subscription into its wire request.
struct TransportSink<'a, T> {
    transport: &'a mut T,
}

#[async_trait]
impl<T> SubscriptionSink for TransportSink<'_, T>
where
    T: Transport,
{
    type Error = TransportError;

    async fn send_subscription(&mut self, subscription: &Subscription) -> Result<(), Self::Error> {
        let frame = SubscribeRequest::for_subscription(subscription)
            .to_json()
            .map_err(|e| TransportError::Send(format!("encode failed: {e}")))?;
        self.transport.send(&frame).await
    }
}
