//! Bitfinex Stream Adapters
//!
//! Everything that speaks the Bitfinex WebSocket v2 dialect:
//!
//! - **messages**: outbound request shapes and symbol normalization
//! - **codec**: inbound frame decoding into typed records
//! - **reconnect**: backoff policy between reconnect attempts
//! - **liveness**: application-level ping/pong probing
//! - **client**: the connection lifecycle controller

pub mod client;
pub mod codec;
pub mod liveness;
pub mod messages;
pub mod reconnect;

pub use client::{FeedClient, FeedClientConfig, FeedError};
pub use codec::BitfinexCodec;
pub use liveness::{LivenessConfig, LivenessProbe, ProbeAction};
pub use messages::{PingRequest, SubscribeRequest};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
