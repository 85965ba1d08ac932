//! Application Layer - Ports and record dispatch.
//!
//! Defines the contracts the feed client consumes (transport, codec,
//! handlers) and the dispatcher that fans decoded records out to them.

/// Port interfaces for transport, codec, and handlers.
pub mod ports;

/// Record dispatcher with per-handler workers.
pub mod dispatch;
