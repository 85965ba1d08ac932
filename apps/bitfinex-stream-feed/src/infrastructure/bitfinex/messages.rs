//! Bitfinex Outbound Message Types
//!
//! Wire shapes for requests sent to the Bitfinex WebSocket v2 stream,
//! plus symbol normalization between human form ("BTC/USD") and wire
//! form ("tBTCUSD").
//!
//! # Wire Formats
//!
//! ```json
//! {"event":"subscribe","channel":"ticker","symbol":"tBTCUSD"}
//! {"event":"subscribe","channel":"book","symbol":"tBTCUSD","prec":"P0","freq":"F0"}
//! {"event":"subscribe","channel":"book","symbol":"tBTCUSD","prec":"R0","len":"100"}
//! {"event":"subscribe","channel":"candles","key":"trade:1m:tBTCUSD"}
//! {"event":"subscribe","channel":"status","key":"liq:global"}
//! {"event":"ping","cid":42}
//! ```

use serde::Serialize;

use crate::domain::subscription::{ChannelKind, Subscription};

// =============================================================================
// Symbol Normalization
// =============================================================================

/// Normalize a trading symbol to wire form.
///
/// "BTC/USD" becomes "tBTCUSD"; already-normalized symbols ("tBTCUSD")
/// pass through unchanged.
#[must_use]
pub fn trading_symbol(symbol: &str) -> String {
    if symbol.starts_with('t') && !symbol.contains('/') {
        return symbol.to_string();
    }
    let compact: String = symbol.chars().filter(|c| *c != '/').collect();
    format!("t{compact}")
}

/// Normalize a funding currency to wire form.
///
/// "USD" becomes "fUSD"; already-normalized symbols ("fUSD") pass through.
#[must_use]
pub fn funding_symbol(currency: &str) -> String {
    if currency.starts_with('f') {
        return currency.to_string();
    }
    format!("f{currency}")
}

/// Normalize a book symbol, which may be a trading pair or a funding
/// currency ("BTCUSD" vs "fUSD").
#[must_use]
pub fn book_symbol(symbol: &str) -> String {
    if symbol.starts_with('f') {
        symbol.to_string()
    } else {
        trading_symbol(symbol)
    }
}

// =============================================================================
// Subscribe Request
// =============================================================================

/// One channel subscription request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    /// Always "subscribe".
    pub event: &'static str,
    /// Wire channel name.
    pub channel: &'static str,
    /// Symbol, for symbol-keyed channels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Book precision ("P0".."P4", "R0" for raw books).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prec: Option<&'static str>,
    /// Book update frequency ("F0"/"F1").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq: Option<&'static str>,
    /// Book depth, as the decimal string the exchange expects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<String>,
    /// Subscription key, for key-keyed channels (candles, status).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl SubscribeRequest {
    /// Build the wire request for a registered subscription.
    #[must_use]
    pub fn for_subscription(subscription: &Subscription) -> Self {
        let base = Self {
            event: "subscribe",
            channel: "",
            symbol: None,
            prec: None,
            freq: None,
            len: None,
            key: None,
        };

        match subscription.channel {
            ChannelKind::Ticker => Self {
                channel: "ticker",
                symbol: Some(trading_symbol(&subscription.symbol)),
                ..base
            },
            ChannelKind::Trades => Self {
                channel: "trades",
                symbol: Some(trading_symbol(&subscription.symbol)),
                ..base
            },
            // Funding trades ride the trades channel under an f-symbol.
            ChannelKind::Funding => Self {
                channel: "trades",
                symbol: Some(funding_symbol(&subscription.symbol)),
                ..base
            },
            ChannelKind::Book => Self {
                channel: "book",
                symbol: Some(book_symbol(&subscription.symbol)),
                prec: Some(subscription.precision.unwrap_or_default().as_str()),
                freq: Some(subscription.frequency.unwrap_or_default().as_str()),
                ..base
            },
            ChannelKind::RawBook => Self {
                channel: "book",
                symbol: Some(book_symbol(&subscription.symbol)),
                prec: Some("R0"),
                len: Some(subscription.depth.unwrap_or(25).to_string()),
                ..base
            },
            ChannelKind::Candles => Self {
                channel: "candles",
                key: Some(format!(
                    "trade:{}:{}",
                    subscription.time_frame.unwrap_or_default().as_str(),
                    trading_symbol(&subscription.symbol)
                )),
                ..base
            },
            ChannelKind::Status => Self {
                channel: "status",
                key: Some(subscription.symbol.clone()),
                ..base
            },
        }
    }

    /// Serialize to the wire JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Ping Request
// =============================================================================

/// Liveness probe request with a client-chosen correlation id.
///
/// The exchange answers with a pong event carrying the same `cid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PingRequest {
    /// Always "ping".
    pub event: &'static str,
    /// Correlation id echoed back in the pong.
    pub cid: u64,
}

impl PingRequest {
    /// Create a ping with the given correlation id.
    #[must_use]
    pub const fn new(cid: u64) -> Self {
        Self { event: "ping", cid }
    }

    /// Serialize to the wire JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::{Frequency, Precision, TimeFrame};

    fn parse(json: &str) -> serde_json::Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn trading_symbol_forms() {
        assert_eq!(trading_symbol("BTC/USD"), "tBTCUSD");
        assert_eq!(trading_symbol("NEC/ETH"), "tNECETH");
        assert_eq!(trading_symbol("BTCUSD"), "tBTCUSD");
        assert_eq!(trading_symbol("tBTCUSD"), "tBTCUSD");
    }

    #[test]
    fn funding_symbol_forms() {
        assert_eq!(funding_symbol("USD"), "fUSD");
        assert_eq!(funding_symbol("fUSD"), "fUSD");
    }

    #[test]
    fn ticker_request_shape() {
        let request = SubscribeRequest::for_subscription(&Subscription::ticker("BTC/USD"));
        let json = parse(&request.to_json().unwrap());

        assert_eq!(json["event"], "subscribe");
        assert_eq!(json["channel"], "ticker");
        assert_eq!(json["symbol"], "tBTCUSD");
        assert!(json.get("prec").is_none());
        assert!(json.get("key").is_none());
    }

    #[test]
    fn funding_trades_ride_the_trades_channel() {
        let request = SubscribeRequest::for_subscription(&Subscription::funding("USD"));
        let json = parse(&request.to_json().unwrap());

        assert_eq!(json["channel"], "trades");
        assert_eq!(json["symbol"], "fUSD");
    }

    #[test]
    fn book_request_carries_precision_and_frequency() {
        let request = SubscribeRequest::for_subscription(&Subscription::book(
            "BTC/USD",
            Precision::P3,
            Frequency::Realtime,
        ));
        let json = parse(&request.to_json().unwrap());

        assert_eq!(json["channel"], "book");
        assert_eq!(json["symbol"], "tBTCUSD");
        assert_eq!(json["prec"], "P3");
        assert_eq!(json["freq"], "F0");
        assert!(json.get("len").is_none());
    }

    #[test]
    fn raw_book_request_uses_r0_and_len() {
        let request = SubscribeRequest::for_subscription(&Subscription::raw_book("BTCUSD", 100));
        let json = parse(&request.to_json().unwrap());

        assert_eq!(json["channel"], "book");
        assert_eq!(json["symbol"], "tBTCUSD");
        assert_eq!(json["prec"], "R0");
        assert_eq!(json["len"], "100");
    }

    #[test]
    fn funding_raw_book_keeps_f_symbol() {
        let request = SubscribeRequest::for_subscription(&Subscription::raw_book("fUSD", 25));
        let json = parse(&request.to_json().unwrap());

        assert_eq!(json["symbol"], "fUSD");
        assert_eq!(json["len"], "25");
    }

    #[test]
    fn candles_request_builds_key() {
        let request = SubscribeRequest::for_subscription(&Subscription::candles(
            "ETH/USD",
            TimeFrame::OneMinute,
        ));
        let json = parse(&request.to_json().unwrap());

        assert_eq!(json["channel"], "candles");
        assert_eq!(json["key"], "trade:1m:tETHUSD");
        assert!(json.get("symbol").is_none());
    }

    #[test]
    fn status_request_passes_key_through() {
        let request =
            SubscribeRequest::for_subscription(&Subscription::status("deriv:tBTCF0:USTF0"));
        let json = parse(&request.to_json().unwrap());

        assert_eq!(json["channel"], "status");
        assert_eq!(json["key"], "deriv:tBTCF0:USTF0");
    }

    #[test]
    fn ping_request_shape() {
        let json = parse(&PingRequest::new(42).to_json().unwrap());
        assert_eq!(json["event"], "ping");
        assert_eq!(json["cid"], 42);
    }
}
