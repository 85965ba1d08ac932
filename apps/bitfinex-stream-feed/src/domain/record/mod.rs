//! Decoded Record Model
//!
//! Canonical, codec-agnostic representation of everything the exchange
//! stream can deliver. Each inbound frame decodes into one or more
//! [`DecodedRecord`] values; the dispatcher routes them by [`RecordKind`].
//!
//! Payload fields carry the exchange data relevant to consumers; no
//! business interpretation happens here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

// =============================================================================
// Record Kinds
// =============================================================================

/// Routing tag distinguishing decoded record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Platform info, configuration acknowledgments, and stream errors.
    Info,
    /// Subscribe/unsubscribe confirmations.
    SubscriptionAck,
    /// Liveness probe response.
    Pong,
    /// Channel keep-alive marker.
    Heartbeat,
    /// Ticker update for a trading pair.
    Ticker,
    /// Executed trade on a trading pair.
    Trade,
    /// Executed funding trade.
    Funding,
    /// Aggregated order book snapshot or level update.
    Book,
    /// Order-level (raw) book snapshot or entry update.
    RawBook,
    /// Candle snapshot or update.
    Candle,
    /// Derivatives/liquidation status update.
    Status,
    /// Wallet balance update (authenticated streams only).
    Wallet,
    /// Order book checksum.
    Checksum,
}

impl RecordKind {
    /// All record kinds, in routing-table order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Info,
            Self::SubscriptionAck,
            Self::Pong,
            Self::Heartbeat,
            Self::Ticker,
            Self::Trade,
            Self::Funding,
            Self::Book,
            Self::RawBook,
            Self::Candle,
            Self::Status,
            Self::Wallet,
            Self::Checksum,
        ]
    }

    /// Stable name for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::SubscriptionAck => "subscription-ack",
            Self::Pong => "pong",
            Self::Heartbeat => "heartbeat",
            Self::Ticker => "ticker",
            Self::Trade => "trade",
            Self::Funding => "funding",
            Self::Book => "book",
            Self::RawBook => "raw-book",
            Self::Candle => "candle",
            Self::Status => "status",
            Self::Wallet => "wallet",
            Self::Checksum => "checksum",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Platform info / configuration / stream-level error payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoMessage {
    /// Protocol version announced on connect.
    pub version: Option<u32>,
    /// Platform or error code, when present.
    pub code: Option<i64>,
    /// Human-readable message, when present.
    pub message: Option<String>,
}

/// Whether an acknowledgment confirms a subscribe or an unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    /// Channel was opened.
    Subscribed,
    /// Channel was closed.
    Unsubscribed,
}

/// Subscribe/unsubscribe confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionAck {
    /// Confirmation direction.
    pub kind: AckKind,
    /// Channel name as reported by the exchange.
    pub channel: String,
    /// Exchange-assigned channel id.
    pub channel_id: u64,
    /// Subscribed symbol, for symbol-keyed channels.
    pub symbol: Option<String>,
    /// Subscription key, for key-keyed channels (candles, status).
    pub key: Option<String>,
}

/// Liveness probe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PongMessage {
    /// Correlation id echoed back from the probe request.
    pub cid: u64,
    /// Server timestamp, when reported.
    pub ts: Option<i64>,
}

/// Ticker update for a trading pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerUpdate {
    /// Trading pair symbol (e.g. "tBTCUSD").
    pub symbol: String,
    /// Best bid price.
    pub bid: Decimal,
    /// Aggregated bid size at the best level.
    pub bid_size: Decimal,
    /// Best ask price.
    pub ask: Decimal,
    /// Aggregated ask size at the best level.
    pub ask_size: Decimal,
    /// Absolute change over the last 24h.
    pub daily_change: Decimal,
    /// Relative change over the last 24h.
    pub daily_change_relative: Decimal,
    /// Last traded price.
    pub last_price: Decimal,
    /// 24h volume.
    pub volume: Decimal,
    /// 24h high.
    pub high: Decimal,
    /// 24h low.
    pub low: Decimal,
}

/// Executed trade on a trading pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeUpdate {
    /// Trading pair symbol.
    pub symbol: String,
    /// Exchange trade id.
    pub id: u64,
    /// Execution time.
    pub executed_at: DateTime<Utc>,
    /// Signed amount; positive = buy, negative = sell.
    pub amount: Decimal,
    /// Execution price.
    pub price: Decimal,
}

/// Executed funding trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingTrade {
    /// Funding symbol (e.g. "fUSD").
    pub symbol: String,
    /// Exchange trade id.
    pub id: u64,
    /// Execution time.
    pub executed_at: DateTime<Utc>,
    /// Signed amount.
    pub amount: Decimal,
    /// Funding rate.
    pub rate: Decimal,
    /// Funding period in days.
    pub period: u32,
}

/// One aggregated order book level.
///
/// Funding books carry a period; trading books do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLevel {
    /// Price (trading) or rate (funding).
    pub price: Decimal,
    /// Number of orders at this level; zero means the level is gone.
    pub count: u32,
    /// Signed aggregated amount.
    pub amount: Decimal,
    /// Funding period in days, funding books only.
    pub period: Option<u32>,
}

/// Aggregated order book snapshot or single-level update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookUpdate {
    /// Subscribed symbol.
    pub symbol: String,
    /// Levels carried by this frame; a snapshot carries the full picture.
    pub levels: Vec<BookLevel>,
    /// True for the initial snapshot of a connection epoch.
    pub is_snapshot: bool,
}

/// One order-level (raw) book entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBookEntry {
    /// Exchange order id (trading) or offer id (funding).
    pub order_id: u64,
    /// Price (trading) or rate (funding); zero means the order left the book.
    pub price: Decimal,
    /// Signed amount.
    pub amount: Decimal,
    /// Funding period in days, funding books only.
    pub period: Option<u32>,
}

/// Raw order book snapshot or entry update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBookUpdate {
    /// Subscribed symbol.
    pub symbol: String,
    /// Entries carried by this frame.
    pub entries: Vec<RawBookEntry>,
    /// True for the initial snapshot of a connection epoch.
    pub is_snapshot: bool,
}

/// One OHLCV candle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candle {
    /// Bucket open time.
    pub opened_at: DateTime<Utc>,
    /// Open price.
    pub open: Decimal,
    /// Close price.
    pub close: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Traded volume.
    pub volume: Decimal,
}

/// Candle snapshot or single-bucket update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleUpdate {
    /// Subscription key (e.g. "trade:1m:tBTCUSD").
    pub key: String,
    /// Candles carried by this frame, newest first in snapshots.
    pub candles: Vec<Candle>,
    /// True for the initial snapshot of a connection epoch.
    pub is_snapshot: bool,
}

/// Derivatives/liquidation status payload, kept loose.
///
/// Status arrays vary by key and evolve with the exchange; consumers that
/// care interpret the raw fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// Subscription key (e.g. "liq:global").
    pub key: String,
    /// Raw status fields as delivered.
    pub fields: Vec<serde_json::Value>,
}

/// Wallet balance update from an authenticated stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletUpdate {
    /// Wallet bucket ("exchange", "margin", "funding").
    pub wallet_type: String,
    /// Currency code.
    pub currency: String,
    /// Total balance.
    pub balance: Decimal,
    /// Interest accrued but not yet settled.
    pub unsettled_interest: Decimal,
    /// Balance available for use, when reported.
    pub available: Option<Decimal>,
}

/// Order book checksum for integrity verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumUpdate {
    /// Subscribed symbol.
    pub symbol: String,
    /// CRC32 checksum of the top of the book.
    pub value: i64,
}

// =============================================================================
// Decoded Record
// =============================================================================

/// One decoded inbound record.
///
/// Produced by the codec, consumed exactly once by the dispatcher; handlers
/// own any further retention.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord {
    /// Platform info / configuration / stream error.
    Info(InfoMessage),
    /// Subscribe/unsubscribe confirmation.
    SubscriptionAck(SubscriptionAck),
    /// Liveness probe response.
    Pong(PongMessage),
    /// Channel keep-alive.
    Heartbeat {
        /// Exchange channel id the keep-alive arrived on.
        channel_id: u64,
    },
    /// Ticker update.
    Ticker(TickerUpdate),
    /// Executed trade.
    Trade(TradeUpdate),
    /// Executed funding trade.
    Funding(FundingTrade),
    /// Aggregated book snapshot/update.
    Book(BookUpdate),
    /// Raw book snapshot/update.
    RawBook(RawBookUpdate),
    /// Candle snapshot/update.
    Candle(CandleUpdate),
    /// Status update.
    Status(StatusUpdate),
    /// Wallet update.
    Wallet(WalletUpdate),
    /// Book checksum.
    Checksum(ChecksumUpdate),
}

impl DecodedRecord {
    /// Routing tag for this record.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Info(_) => RecordKind::Info,
            Self::SubscriptionAck(_) => RecordKind::SubscriptionAck,
            Self::Pong(_) => RecordKind::Pong,
            Self::Heartbeat { .. } => RecordKind::Heartbeat,
            Self::Ticker(_) => RecordKind::Ticker,
            Self::Trade(_) => RecordKind::Trade,
            Self::Funding(_) => RecordKind::Funding,
            Self::Book(_) => RecordKind::Book,
            Self::RawBook(_) => RecordKind::RawBook,
            Self::Candle(_) => RecordKind::Candle,
            Self::Status(_) => RecordKind::Status,
            Self::Wallet(_) => RecordKind::Wallet,
            Self::Checksum(_) => RecordKind::Checksum,
        }
    }
}
