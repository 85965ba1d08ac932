//! Record Dispatcher
//!
//! Routes each decoded record to the handlers registered for its kind
//! without letting a slow or failing handler stall ingestion.
//!
//! # Architecture
//!
//! Every record kind with at least one handler gets a bounded broadcast
//! channel; every registered handler gets a dedicated worker task holding
//! its own receiver. `dispatch` is a non-blocking send into the kind's
//! channel, so the ingestion path never waits on a consumer. A handler
//! that falls behind lags its receiver and loses the oldest records, with
//! a logged warning carrying the dropped count.
//!
//! Handlers observe records of a given kind in wire-arrival order. Handler
//! registration is startup-time wiring: `register` is rejected once the
//! workers are running.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::application::ports::RecordHandler;
use crate::domain::record::{DecodedRecord, RecordKind};

// =============================================================================
// Configuration
// =============================================================================

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Capacity of each per-kind record queue.
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4_096,
        }
    }
}

/// Errors surfaced by dispatcher wiring.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// `register` was called after the workers were started.
    #[error("handlers must be registered before the dispatcher is started")]
    AlreadyStarted,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Handler table plus the per-handler worker machinery.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use bitfinex_stream_feed::application::dispatch::{Dispatcher, DispatcherConfig};
/// use bitfinex_stream_feed::application::ports::{HandlerError, RecordHandler};
/// use bitfinex_stream_feed::domain::record::{DecodedRecord, RecordKind};
/// use tokio_util::sync::CancellationToken;
///
/// struct Printer;
///
/// impl RecordHandler for Printer {
///     fn on_record(&self, record: &DecodedRecord) -> Result<(), HandlerError> {
///         println!("{record:?}");
///         Ok(())
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut dispatcher = Dispatcher::new(DispatcherConfig::default());
/// dispatcher
///     .register(RecordKind::Ticker, Arc::new(Printer))
///     .unwrap();
/// dispatcher.start(&CancellationToken::new());
/// # }
/// ```
pub struct Dispatcher {
    config: DispatcherConfig,
    handlers: HashMap<RecordKind, Vec<Arc<dyn RecordHandler>>>,
    channels: HashMap<RecordKind, broadcast::Sender<Arc<DecodedRecord>>>,
    started: bool,
}

impl Dispatcher {
    /// Create a dispatcher with the given configuration.
    #[must_use]
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            handlers: HashMap::new(),
            channels: HashMap::new(),
            started: false,
        }
    }

    /// Append a handler to the ordered sequence for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::AlreadyStarted`] once the workers are
    /// running; handler wiring is startup-time only.
    pub fn register(
        &mut self,
        kind: RecordKind,
        handler: Arc<dyn RecordHandler>,
    ) -> Result<(), DispatchError> {
        if self.started {
            return Err(DispatchError::AlreadyStarted);
        }
        self.handlers.entry(kind).or_default().push(handler);
        Ok(())
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: RecordKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Spawn one worker task per registered handler.
    ///
    /// Workers run until `cancel` fires or the dispatcher is dropped.
    /// Calling `start` twice is a no-op.
    pub fn start(&mut self, cancel: &CancellationToken) {
        if self.started {
            return;
        }
        self.started = true;

        for (kind, handlers) in &self.handlers {
            let (tx, _) = broadcast::channel(self.config.queue_capacity);

            for (index, handler) in handlers.iter().enumerate() {
                let rx = tx.subscribe();
                spawn_worker(*kind, index, Arc::clone(handler), rx, cancel.clone());
            }

            self.channels.insert(*kind, tx);
        }
    }

    /// Route one record to every handler registered for its kind.
    ///
    /// Records of kinds nobody registered for are dropped quietly; that is
    /// normal operation, not an error.
    pub fn dispatch(&self, record: DecodedRecord) {
        let kind = record.kind();
        if let Some(tx) = self.channels.get(&kind) {
            // Send only fails when every worker is gone (shutdown races).
            let _ = tx.send(Arc::new(record));
        } else {
            tracing::trace!(kind = %kind, "No handlers registered, record dropped");
        }
    }
}

/// Run one handler against its own receiver until cancellation.
fn spawn_worker(
    kind: RecordKind,
    index: usize,
    handler: Arc<dyn RecordHandler>,
    mut rx: broadcast::Receiver<Arc<DecodedRecord>>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!(kind = %kind, handler = index, "Dispatch worker cancelled");
                    break;
                }
                received = rx.recv() => match received {
                    Ok(record) => {
                        if let Err(e) = handler.on_record(&record) {
                            tracing::error!(
                                kind = %kind,
                                handler = index,
                                error = %e,
                                "Record handler failed"
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            kind = %kind,
                            handler = index,
                            dropped = n,
                            "Handler fell behind, oldest records dropped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                },
            }
        }
    });
}
