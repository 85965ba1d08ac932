//! Configuration Module
//!
//! Configuration loading for the feed binary.

mod settings;

pub use settings::{
    ConfigError, ConnectionSettings, DispatchSettings, FeedConfig, LogSettings,
    default_subscriptions, parse_subscriptions,
};
