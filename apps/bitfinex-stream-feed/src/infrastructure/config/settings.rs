//! Feed Configuration Settings
//!
//! Configuration types for the feed client, loaded once at startup from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `BFX_STREAM_URL`: WebSocket endpoint (default: `wss://api-pub.bitfinex.com/ws/2`)
//! - `BFX_RECONNECT_TIMEOUT_SECS`: reconnect window (default: 30)
//! - `BFX_RECONNECT_DELAY_INITIAL_MS`: first backoff delay (default: 500)
//! - `BFX_RECONNECT_DELAY_MAX_SECS`: backoff ceiling (default: 10)
//! - `BFX_RECONNECT_DELAY_MULTIPLIER`: backoff multiplier (default: 2.0)
//! - `BFX_PING_INTERVAL_SECS`: liveness ping interval (default: 30)
//! - `BFX_PONG_TIMEOUT_SECS`: liveness pong timeout (default: 60)
//! - `BFX_DISPATCH_QUEUE_CAPACITY`: per-kind dispatch queue size (default: 4096)
//! - `BFX_LOG_FILE`: optional log file destination
//! - `BFX_SUBSCRIPTIONS`: semicolon-separated subscription list, e.g.
//!   `ticker:BTC/USD;book:BTC/USD:P0:F0;raw-book:BTCUSD:100;candles:BTC/USD:1m;status:liq:global`

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::subscription::{Frequency, Precision, Subscription, TimeFrame};

/// Default public Bitfinex v2 stream endpoint.
const DEFAULT_STREAM_URL: &str = "wss://api-pub.bitfinex.com/ws/2";

// =============================================================================
// Settings Groups
// =============================================================================

/// Connection lifecycle settings.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Wall-clock window for re-establishing a lost connection.
    pub reconnect_timeout: Duration,
    /// Initial backoff delay between reconnect attempts.
    pub reconnect_delay_initial: Duration,
    /// Backoff delay ceiling.
    pub reconnect_delay_max: Duration,
    /// Backoff multiplier.
    pub reconnect_delay_multiplier: f64,
    /// Liveness ping interval.
    pub ping_interval: Duration,
    /// Liveness pong timeout.
    pub pong_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            reconnect_timeout: Duration::from_secs(30),
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(10),
            reconnect_delay_multiplier: 2.0,
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Capacity of each per-kind record queue.
    pub queue_capacity: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 4_096,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    /// Optional file destination, in addition to the console.
    pub file: Option<PathBuf>,
}

/// Complete feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Connection lifecycle settings.
    pub connection: ConnectionSettings,
    /// Dispatcher settings.
    pub dispatch: DispatchSettings,
    /// Log output settings.
    pub log: LogSettings,
    /// Static subscription list declared at startup.
    pub subscriptions: Vec<Subscription>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            connection: ConnectionSettings::default(),
            dispatch: DispatchSettings::default(),
            log: LogSettings::default(),
            subscriptions: default_subscriptions(),
        }
    }
}

impl FeedConfig {
    /// Create configuration from environment variables.
    ///
    /// Unset or unparsable numeric variables fall back to their defaults;
    /// a malformed subscription list is an error.
    ///
    /// # Errors
    ///
    /// Returns an error when `BFX_SUBSCRIPTIONS` is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("BFX_STREAM_URL").unwrap_or_else(|_| DEFAULT_STREAM_URL.to_string());

        let defaults = ConnectionSettings::default();
        let connection = ConnectionSettings {
            reconnect_timeout: parse_env_duration_secs(
                "BFX_RECONNECT_TIMEOUT_SECS",
                defaults.reconnect_timeout,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "BFX_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "BFX_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "BFX_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            ping_interval: parse_env_duration_secs("BFX_PING_INTERVAL_SECS", defaults.ping_interval),
            pong_timeout: parse_env_duration_secs("BFX_PONG_TIMEOUT_SECS", defaults.pong_timeout),
        };

        let dispatch = DispatchSettings {
            queue_capacity: parse_env_usize(
                "BFX_DISPATCH_QUEUE_CAPACITY",
                DispatchSettings::default().queue_capacity,
            ),
        };

        let log = LogSettings {
            file: std::env::var("BFX_LOG_FILE").ok().map(PathBuf::from),
        };

        let subscriptions = match std::env::var("BFX_SUBSCRIPTIONS") {
            Ok(list) => parse_subscriptions(&list)?,
            Err(_) => default_subscriptions(),
        };

        Ok(Self {
            url,
            connection,
            dispatch,
            log,
            subscriptions,
        })
    }
}

// =============================================================================
// Subscription List
// =============================================================================

/// The static subscription set used when `BFX_SUBSCRIPTIONS` is unset.
#[must_use]
pub fn default_subscriptions() -> Vec<Subscription> {
    vec![
        Subscription::ticker("BTC/USD"),
        Subscription::ticker("ETH/USD"),
        Subscription::trades("BTC/USD"),
        Subscription::trades("NEC/ETH"),
        Subscription::funding("BTC"),
        Subscription::funding("USD"),
        Subscription::candles("BTC/USD", TimeFrame::OneMinute),
        Subscription::candles("ETH/USD", TimeFrame::OneMinute),
        Subscription::book("BTC/USD", Precision::P0, Frequency::Realtime),
        Subscription::book("BTC/USD", Precision::P3, Frequency::Realtime),
        Subscription::book("ETH/USD", Precision::P0, Frequency::Realtime),
        Subscription::book("fUSD", Precision::P0, Frequency::Realtime),
        Subscription::raw_book("BTCUSD", 100),
        Subscription::raw_book("fUSD", 25),
        Subscription::raw_book("fBTC", 25),
        Subscription::status("liq:global"),
        Subscription::status("deriv:tBTCF0:USTF0"),
    ]
}

/// Parse a semicolon-separated subscription list.
///
/// # Errors
///
/// Returns an error for any entry that does not name a known channel kind
/// or carries malformed parameters.
pub fn parse_subscriptions(list: &str) -> Result<Vec<Subscription>, ConfigError> {
    list.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_subscription)
        .collect()
}

fn parse_subscription(entry: &str) -> Result<Subscription, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSubscription {
        entry: entry.to_string(),
        reason: reason.to_string(),
    };

    let (kind, rest) = entry
        .split_once(':')
        .ok_or_else(|| invalid("expected kind:symbol"))?;
    if rest.is_empty() {
        return Err(invalid("missing symbol"));
    }

    match kind {
        "ticker" => Ok(Subscription::ticker(rest)),
        "trades" => Ok(Subscription::trades(rest)),
        "funding" => Ok(Subscription::funding(rest)),
        // Status keys contain colons themselves ("liq:global").
        "status" => Ok(Subscription::status(rest)),
        "book" => {
            let mut parts = rest.split(':');
            let symbol = parts.next().ok_or_else(|| invalid("missing symbol"))?;
            let precision = match parts.next() {
                Some(p) => Precision::parse(p).ok_or_else(|| invalid("unknown precision"))?,
                None => Precision::default(),
            };
            let frequency = match parts.next() {
                Some(f) => Frequency::parse(f).ok_or_else(|| invalid("unknown frequency"))?,
                None => Frequency::default(),
            };
            Ok(Subscription::book(symbol, precision, frequency))
        }
        "raw-book" => {
            let (symbol, depth) = match rest.split_once(':') {
                Some((symbol, depth)) => (
                    symbol,
                    depth
                        .parse::<u32>()
                        .map_err(|_| invalid("depth is not a number"))?,
                ),
                None => (rest, 25),
            };
            Ok(Subscription::raw_book(symbol, depth))
        }
        "candles" => {
            let (symbol, time_frame) = match rest.split_once(':') {
                Some((symbol, tf)) => (
                    symbol,
                    TimeFrame::parse(tf).ok_or_else(|| invalid("unknown time frame"))?,
                ),
                None => (rest, TimeFrame::default()),
            };
            Ok(Subscription::candles(symbol, time_frame))
        }
        _ => Err(invalid("unknown channel kind")),
    }
}

// =============================================================================
// Errors and Parse Helpers
// =============================================================================

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A subscription list entry could not be parsed.
    #[error("invalid subscription entry '{entry}': {reason}")]
    InvalidSubscription {
        /// The offending entry.
        entry: String,
        /// Why it was rejected.
        reason: String,
    },
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::ChannelKind;

    #[test]
    fn connection_defaults() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.reconnect_timeout, Duration::from_secs(30));
        assert_eq!(settings.reconnect_delay_initial, Duration::from_millis(500));
        assert!((settings.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_subscription_set_is_deduplicated_by_registry_semantics() {
        let subscriptions = default_subscriptions();
        let unique: std::collections::HashSet<_> = subscriptions.iter().collect();
        assert_eq!(unique.len(), subscriptions.len());
    }

    #[test]
    fn parses_simple_entries() {
        let sub = parse_subscription("ticker:BTC/USD").unwrap();
        assert_eq!(sub.channel, ChannelKind::Ticker);
        assert_eq!(sub.symbol, "BTC/USD");

        let sub = parse_subscription("funding:USD").unwrap();
        assert_eq!(sub.channel, ChannelKind::Funding);
    }

    #[test]
    fn parses_book_with_parameters() {
        let sub = parse_subscription("book:BTC/USD:P3:F1").unwrap();
        assert_eq!(sub.precision, Some(Precision::P3));
        assert_eq!(sub.frequency, Some(Frequency::TwoSeconds));

        // Parameters are optional.
        let sub = parse_subscription("book:BTC/USD").unwrap();
        assert_eq!(sub.precision, Some(Precision::P0));
        assert_eq!(sub.frequency, Some(Frequency::Realtime));
    }

    #[test]
    fn parses_raw_book_depth() {
        let sub = parse_subscription("raw-book:BTCUSD:100").unwrap();
        assert_eq!(sub.depth, Some(100));

        let sub = parse_subscription("raw-book:fUSD").unwrap();
        assert_eq!(sub.depth, Some(25));
    }

    #[test]
    fn parses_candles_time_frame() {
        let sub = parse_subscription("candles:BTC/USD:5m").unwrap();
        assert_eq!(sub.time_frame, Some(TimeFrame::FiveMinutes));
    }

    #[test]
    fn status_keys_keep_their_colons() {
        let sub = parse_subscription("status:deriv:tBTCF0:USTF0").unwrap();
        assert_eq!(sub.channel, ChannelKind::Status);
        assert_eq!(sub.symbol, "deriv:tBTCF0:USTF0");
    }

    #[test]
    fn rejects_unknown_kind_and_bad_parameters() {
        assert!(parse_subscription("margin:BTC/USD").is_err());
        assert!(parse_subscription("ticker").is_err());
        assert!(parse_subscription("book:BTC/USD:P9").is_err());
        assert!(parse_subscription("raw-book:BTCUSD:lots").is_err());
        assert!(parse_subscription("candles:BTC/USD:2m").is_err());
    }

    #[test]
    fn parses_a_full_list() {
        let subs =
            parse_subscriptions("ticker:BTC/USD; trades:BTC/USD;book:BTC/USD:P0:F0;;").unwrap();
        assert_eq!(subs.len(), 3);
    }
}
