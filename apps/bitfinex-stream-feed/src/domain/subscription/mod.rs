//! Subscription Registry
//!
//! Declarative set of desired channel subscriptions. The registry is the
//! durable memory of desired state across connection epochs: the exchange
//! forgets all subscriptions when a connection drops, so the full set is
//! replayed after every reconnect.
//!
//! # Design
//!
//! - Set semantics keyed by the whole subscription tuple; duplicate adds
//!   are no-ops.
//! - Insertion order is preserved and is the replay order.
//! - Replay is partial-failure tolerant: a subscription whose send fails is
//!   collected and returned, the rest are still attempted.

use async_trait::async_trait;
use parking_lot::RwLock;

// =============================================================================
// Subscription Parameters
// =============================================================================

/// Channel kind of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Ticker updates for a trading pair.
    Ticker,
    /// Executed trades for a trading pair.
    Trades,
    /// Aggregated order book.
    Book,
    /// Order-level (raw) book.
    RawBook,
    /// OHLCV candles.
    Candles,
    /// Funding trades for a currency.
    Funding,
    /// Derivatives/liquidation status stream.
    Status,
}

impl ChannelKind {
    /// Stable name for logging and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Trades => "trades",
            Self::Book => "book",
            Self::RawBook => "raw-book",
            Self::Candles => "candles",
            Self::Funding => "funding",
            Self::Status => "status",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Book price aggregation precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Precision {
    /// Highest precision (most price levels).
    #[default]
    P0,
    /// One aggregation step.
    P1,
    /// Two aggregation steps.
    P2,
    /// Three aggregation steps.
    P3,
    /// Four aggregation steps.
    P4,
}

impl Precision {
    /// Wire name of the precision level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
            Self::P4 => "P4",
        }
    }

    /// Parse a wire/config name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "P0" => Some(Self::P0),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            "P4" => Some(Self::P4),
            _ => None,
        }
    }
}

/// Book update frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Frequency {
    /// Realtime updates (F0).
    #[default]
    Realtime,
    /// Throttled to one update per two seconds (F1).
    TwoSeconds,
}

impl Frequency {
    /// Wire name of the frequency.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Realtime => "F0",
            Self::TwoSeconds => "F1",
        }
    }

    /// Parse a wire/config name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "F0" => Some(Self::Realtime),
            "F1" => Some(Self::TwoSeconds),
            _ => None,
        }
    }
}

/// Candle bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeFrame {
    /// One minute.
    #[default]
    OneMinute,
    /// Five minutes.
    FiveMinutes,
    /// Fifteen minutes.
    FifteenMinutes,
    /// Thirty minutes.
    ThirtyMinutes,
    /// One hour.
    OneHour,
    /// Three hours.
    ThreeHours,
    /// Six hours.
    SixHours,
    /// Twelve hours.
    TwelveHours,
    /// One day.
    OneDay,
    /// One week.
    OneWeek,
    /// Two weeks.
    TwoWeeks,
    /// One month.
    OneMonth,
}

impl TimeFrame {
    /// Wire name used inside candle subscription keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::ThreeHours => "3h",
            Self::SixHours => "6h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1D",
            Self::OneWeek => "7D",
            Self::TwoWeeks => "14D",
            Self::OneMonth => "1M",
        }
    }

    /// Parse a wire/config name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::OneMinute),
            "5m" => Some(Self::FiveMinutes),
            "15m" => Some(Self::FifteenMinutes),
            "30m" => Some(Self::ThirtyMinutes),
            "1h" => Some(Self::OneHour),
            "3h" => Some(Self::ThreeHours),
            "6h" => Some(Self::SixHours),
            "12h" => Some(Self::TwelveHours),
            "1D" => Some(Self::OneDay),
            "7D" => Some(Self::OneWeek),
            "14D" => Some(Self::TwoWeeks),
            "1M" => Some(Self::OneMonth),
            _ => None,
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// One desired channel subscription.
///
/// Immutable once added; the full field tuple is the set identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    /// Channel kind.
    pub channel: ChannelKind,
    /// Symbol ("BTC/USD", funding currency "USD") or status key ("liq:global").
    pub symbol: String,
    /// Book precision, book channels only.
    pub precision: Option<Precision>,
    /// Book update frequency, aggregated book only.
    pub frequency: Option<Frequency>,
    /// Candle bucket width, candle channels only.
    pub time_frame: Option<TimeFrame>,
    /// Book depth, raw book only.
    pub depth: Option<u32>,
}

impl Subscription {
    /// Ticker subscription for a trading pair.
    #[must_use]
    pub fn ticker(symbol: impl Into<String>) -> Self {
        Self {
            channel: ChannelKind::Ticker,
            symbol: symbol.into(),
            precision: None,
            frequency: None,
            time_frame: None,
            depth: None,
        }
    }

    /// Trades subscription for a trading pair.
    #[must_use]
    pub fn trades(symbol: impl Into<String>) -> Self {
        Self {
            channel: ChannelKind::Trades,
            symbol: symbol.into(),
            precision: None,
            frequency: None,
            time_frame: None,
            depth: None,
        }
    }

    /// Funding trades subscription for a currency.
    #[must_use]
    pub fn funding(currency: impl Into<String>) -> Self {
        Self {
            channel: ChannelKind::Funding,
            symbol: currency.into(),
            precision: None,
            frequency: None,
            time_frame: None,
            depth: None,
        }
    }

    /// Aggregated book subscription.
    #[must_use]
    pub fn book(symbol: impl Into<String>, precision: Precision, frequency: Frequency) -> Self {
        Self {
            channel: ChannelKind::Book,
            symbol: symbol.into(),
            precision: Some(precision),
            frequency: Some(frequency),
            time_frame: None,
            depth: None,
        }
    }

    /// Raw (order-level) book subscription.
    #[must_use]
    pub fn raw_book(symbol: impl Into<String>, depth: u32) -> Self {
        Self {
            channel: ChannelKind::RawBook,
            symbol: symbol.into(),
            precision: None,
            frequency: None,
            time_frame: None,
            depth: Some(depth),
        }
    }

    /// Candle subscription.
    #[must_use]
    pub fn candles(symbol: impl Into<String>, time_frame: TimeFrame) -> Self {
        Self {
            channel: ChannelKind::Candles,
            symbol: symbol.into(),
            precision: None,
            frequency: None,
            time_frame: Some(time_frame),
            depth: None,
        }
    }

    /// Status subscription by key.
    #[must_use]
    pub fn status(key: impl Into<String>) -> Self {
        Self {
            channel: ChannelKind::Status,
            symbol: key.into(),
            precision: None,
            frequency: None,
            time_frame: None,
            depth: None,
        }
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.channel, self.symbol)?;
        if let Some(p) = self.precision {
            write!(f, ":{}", p.as_str())?;
        }
        if let Some(fr) = self.frequency {
            write!(f, ":{}", fr.as_str())?;
        }
        if let Some(tf) = self.time_frame {
            write!(f, ":{}", tf.as_str())?;
        }
        if let Some(d) = self.depth {
            write!(f, ":{d}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Replay Sink
// =============================================================================

/// Outbound path used during replay.
///
/// Implementations translate a subscription into the wire format of the
/// active connection and send it.
#[async_trait]
pub trait SubscriptionSink {
    /// Error surfaced when a single send fails.
    type Error: std::fmt::Display;

    /// Send one subscription request.
    async fn send_subscription(&mut self, subscription: &Subscription)
    -> Result<(), Self::Error>;
}

// =============================================================================
// Registry
// =============================================================================

/// Insertion-ordered set of desired subscriptions.
///
/// Thread-safe: added from the control path, read (replayed) from the
/// connection path.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<Vec<Subscription>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription if it is not already present.
    ///
    /// Returns `true` when the subscription was inserted, `false` on a
    /// duplicate (which is a no-op).
    pub fn add(&self, subscription: Subscription) -> bool {
        let mut entries = self.entries.write();
        if entries.contains(&subscription) {
            return false;
        }
        entries.push(subscription);
        true
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The current set, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries.read().clone()
    }

    /// Send every registered subscription through `sink`, in insertion order.
    ///
    /// Returns the subscriptions whose send failed. A failure never aborts
    /// the remainder of the replay, and replaying repeatedly is safe: the
    /// exchange treats a re-subscribe of an active channel as a refresh.
    pub async fn replay<S>(&self, sink: &mut S) -> Vec<Subscription>
    where
        S: SubscriptionSink + Send,
    {
        let snapshot = self.snapshot();
        let mut failed = Vec::new();

        for subscription in snapshot {
            if sink.send_subscription(&subscription).await.is_err() {
                failed.push(subscription);
            }
        }

        failed
    }
}
