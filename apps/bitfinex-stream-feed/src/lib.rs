#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Bitfinex Stream Feed - Market Data Client
//!
//! A long-lived client that maintains a single WebSocket connection to the
//! Bitfinex v2 public stream, re-establishes every declared subscription
//! after each reconnect, and fans decoded records out to typed handlers.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core feed types with no transport knowledge
//!   - `record`: decoded record model (tickers, trades, books, ...)
//!   - `subscription`: declarative subscription registry and replay
//!   - `connection`: connection lifecycle state machine
//!
//! - **Application**: Ports and record routing
//!   - `ports`: transport, codec, and handler contracts
//!   - `dispatch`: per-kind fan-out with isolated handler workers
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `bitfinex`: wire messages, codec, reconnect, liveness, feed client
//!   - `transport`: WebSocket transport adapter
//!   - `config`: environment-variable configuration
//!   - `telemetry`: tracing initialization
//!
//! # Data Flow
//!
//! ```text
//! Bitfinex WS ──► Transport ──► FeedClient ──► Codec ──► Dispatcher ──► Handler 1
//!                     ▲             │                        │      └──► Handler 2
//!                     │             ▼                        └─────────► Handler N
//!                     └──── SubscriptionRegistry (replayed every epoch)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core feed types with no external dependencies.
pub mod domain;

/// Application layer - Ports and record dispatch.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::ConnectionState;
pub use domain::record::{DecodedRecord, RecordKind};
pub use domain::subscription::{
    ChannelKind, Frequency, Precision, Subscription, SubscriptionRegistry, SubscriptionSink,
    TimeFrame,
};

// Application types
pub use application::dispatch::{DispatchError, Dispatcher, DispatcherConfig};
pub use application::ports::{
    ConnectionEvent, DecodeError, FrameCodec, HandlerError, RecordHandler, Transport,
    TransportError,
};

// Infrastructure adapters
pub use infrastructure::bitfinex::{
    BitfinexCodec, FeedClient, FeedClientConfig, FeedError, LivenessConfig, ReconnectConfig,
};
pub use infrastructure::config::{ConfigError, ConnectionSettings, FeedConfig};
pub use infrastructure::transport::WsTransport;
