//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the port interfaces defined in the
//! application layer.

/// Bitfinex dialect: wire messages, codec, reconnect policy, liveness
/// probe, and the feed client.
pub mod bitfinex;

/// WebSocket transport adapter.
pub mod transport;

/// Configuration loading.
pub mod config;

/// Logging/tracing initialization.
pub mod telemetry;
