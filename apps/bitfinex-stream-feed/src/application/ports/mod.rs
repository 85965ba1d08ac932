//! Port Interfaces
//!
//! Contracts between the feed client and its external collaborators,
//! following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`Transport`]: the physical streaming connection
//! - [`FrameCodec`]: wire-frame decoding into typed records
//!
//! ## Driver Ports (Inbound)
//!
//! - [`RecordHandler`]: per-kind record consumers plugged in at startup

use async_trait::async_trait;

use crate::domain::record::DecodedRecord;

// =============================================================================
// Transport
// =============================================================================

/// Connection-level events surfaced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The physical connection is established and ready for traffic.
    Connected,
    /// The connection dropped; `reason` is best-effort diagnostic text.
    Disconnected {
        /// Why the connection ended, as far as the transport can tell.
        reason: String,
    },
    /// One raw inbound text frame.
    Frame(String),
}

/// Errors surfaced by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("connection open failed: {0}")]
    Open(String),

    /// Sending an outbound frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Closing the connection failed.
    #[error("close failed: {0}")]
    Close(String),

    /// An operation was attempted without an open connection.
    #[error("transport is not connected")]
    NotConnected,
}

/// The physical streaming connection.
///
/// One transport instance is owned end-to-end by the feed client: the
/// client opens it, pumps its events, replays subscriptions through it,
/// and closes it exactly once on shutdown.
#[async_trait]
pub trait Transport: Send {
    /// Open (or re-open) the connection.
    ///
    /// On success a [`ConnectionEvent::Connected`] is delivered through
    /// [`Transport::next_event`] before any frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection could not be established; the
    /// caller decides whether and when to retry.
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Send one outbound text frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame could not be written.
    async fn send(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the close handshake failed; resources are
    /// released regardless.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Wait for the next connection event.
    ///
    /// Returns `None` when the transport has no open connection and no
    /// buffered events.
    async fn next_event(&mut self) -> Option<ConnectionEvent>;
}

// =============================================================================
// Codec
// =============================================================================

/// Errors surfaced when decoding an inbound frame.
///
/// All decode errors are recoverable: the ingestion path logs them and
/// moves on to the next frame.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame was not parseable at all.
    #[error("malformed frame ({context}): {detail}")]
    Malformed {
        /// What was being parsed when the failure occurred.
        context: &'static str,
        /// Parser diagnostic.
        detail: String,
    },

    /// The frame parsed but carried an event tag this codec does not know.
    #[error("unknown record kind tag: {0}")]
    UnknownKind(String),

    /// A data frame referenced a channel id with no registered route.
    #[error("unknown channel id: {0}")]
    UnknownChannel(u64),
}

/// Decodes raw inbound frames into typed records.
///
/// Codecs may be stateful (the Bitfinex codec learns channel routes from
/// subscribe confirmations); `reset` is called at the start of every
/// connection epoch.
pub trait FrameCodec: Send {
    /// Forget any per-connection state.
    fn reset(&mut self);

    /// Decode one frame into zero or more records.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the frame is malformed, carries an
    /// unknown tag, or references an unknown channel.
    fn decode(&mut self, frame: &str) -> Result<Vec<DecodedRecord>, DecodeError>;
}

// =============================================================================
// Handlers
// =============================================================================

/// Error returned by a record handler.
///
/// Handler errors are caught at the dispatch boundary, logged, and never
/// propagate to the ingestion path or to other handlers.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    /// What went wrong, for the log.
    message: String,
}

impl HandlerError {
    /// Create a handler error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A consumer of decoded records of one kind.
///
/// Handlers run on dedicated worker tasks and must not assume anything
/// about each other; a failing handler only affects itself.
pub trait RecordHandler: Send + Sync {
    /// Consume one record.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the record could not be consumed;
    /// the dispatcher logs it and continues.
    fn on_record(&self, record: &DecodedRecord) -> Result<(), HandlerError>;
}
