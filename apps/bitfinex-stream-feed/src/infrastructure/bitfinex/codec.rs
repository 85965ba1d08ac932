//! Bitfinex Stream Codec
//!
//! Decodes inbound Bitfinex WebSocket v2 frames into typed records.
//!
//! The codec is stateful: `subscribed` confirmations register a route from
//! the exchange-assigned channel id to the channel's kind and symbol, and
//! data frames (`[chanId, ...]`) are decoded through that route. Routes are
//! forgotten on `reset`, which the client calls at the start of every
//! connection epoch.
//!
//! # Frame Shapes
//!
//! ```json
//! {"event":"info","version":2}
//! {"event":"subscribed","channel":"ticker","chanId":123,"symbol":"tBTCUSD"}
//! [123,[16_100,15.2,16_101,9.8,120.5,0.0075,16_100,1234.5,16_500,15_800]]
//! [124,"te",[401_597_395,1_574_694_478_808,0.005,7_245.3]]
//! [125,"hb"]
//! ```

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::application::ports::{DecodeError, FrameCodec};
use crate::domain::record::{
    AckKind, BookLevel, BookUpdate, Candle, CandleUpdate, ChecksumUpdate, DecodedRecord,
    FundingTrade, InfoMessage, PongMessage, RawBookEntry, RawBookUpdate, StatusUpdate,
    SubscriptionAck, TickerUpdate, TradeUpdate, WalletUpdate,
};

// =============================================================================
// Channel Routes
// =============================================================================

/// What an exchange-assigned channel id maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Ticker { symbol: String },
    Trades { symbol: String, funding: bool },
    Book { symbol: String, funding: bool },
    RawBook { symbol: String, funding: bool },
    Candles { key: String },
    Status { key: String },
}

impl Route {
    const fn channel_name(&self) -> &'static str {
        match self {
            Self::Ticker { .. } => "ticker",
            Self::Trades { .. } => "trades",
            Self::Book { .. } | Self::RawBook { .. } => "book",
            Self::Candles { .. } => "candles",
            Self::Status { .. } => "status",
        }
    }

    fn symbol(&self) -> Option<String> {
        match self {
            Self::Ticker { symbol }
            | Self::Trades { symbol, .. }
            | Self::Book { symbol, .. }
            | Self::RawBook { symbol, .. } => Some(symbol.clone()),
            Self::Candles { .. } | Self::Status { .. } => None,
        }
    }

    fn key(&self) -> Option<String> {
        match self {
            Self::Candles { key } | Self::Status { key } => Some(key.clone()),
            _ => None,
        }
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Stateful decoder for the Bitfinex v2 stream.
#[derive(Debug, Default)]
pub struct BitfinexCodec {
    routes: HashMap<u64, Route>,
}

impl BitfinexCodec {
    /// Create a codec with no registered routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live channel routes (for diagnostics).
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    fn decode_event(&mut self, value: &Value) -> Result<Vec<DecodedRecord>, DecodeError> {
        let event = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("control event", "missing event tag"))?;

        match event {
            "info" => Ok(vec![DecodedRecord::Info(InfoMessage {
                version: value
                    .get("version")
                    .and_then(Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok()),
                code: value.get("code").and_then(Value::as_i64),
                message: value
                    .get("msg")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
            })]),
            "conf" => Ok(vec![DecodedRecord::Info(InfoMessage {
                version: None,
                code: None,
                message: value
                    .get("status")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
            })]),
            "error" => Ok(vec![DecodedRecord::Info(InfoMessage {
                version: None,
                code: value.get("code").and_then(Value::as_i64),
                message: value
                    .get("msg")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
            })]),
            "pong" => Ok(vec![DecodedRecord::Pong(PongMessage {
                cid: value
                    .get("cid")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| malformed("pong", "missing cid"))?,
                ts: value.get("ts").and_then(Value::as_i64),
            })]),
            "subscribed" => self.register_route(value).map(|ack| vec![ack]),
            "unsubscribed" => {
                let channel_id = value
                    .get("chanId")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| malformed("unsubscribed", "missing chanId"))?;
                let route = self.routes.remove(&channel_id);
                Ok(vec![DecodedRecord::SubscriptionAck(SubscriptionAck {
                    kind: AckKind::Unsubscribed,
                    channel: route
                        .as_ref()
                        .map_or("unknown", Route::channel_name)
                        .to_string(),
                    channel_id,
                    symbol: route.as_ref().and_then(Route::symbol),
                    key: route.as_ref().and_then(Route::key),
                })])
            }
            other => Err(DecodeError::UnknownKind(other.to_string())),
        }
    }

    fn register_route(&mut self, value: &Value) -> Result<DecodedRecord, DecodeError> {
        let channel = value
            .get("channel")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("subscribed", "missing channel"))?;
        let channel_id = value
            .get("chanId")
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed("subscribed", "missing chanId"))?;
        let symbol = value
            .get("symbol")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        let key = value
            .get("key")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        let route = match channel {
            "ticker" => Route::Ticker {
                symbol: symbol
                    .clone()
                    .ok_or_else(|| malformed("subscribed ticker", "missing symbol"))?,
            },
            "trades" => {
                let symbol = symbol
                    .clone()
                    .ok_or_else(|| malformed("subscribed trades", "missing symbol"))?;
                let funding = symbol.starts_with('f');
                Route::Trades { symbol, funding }
            }
            "book" => {
                let symbol = symbol
                    .clone()
                    .ok_or_else(|| malformed("subscribed book", "missing symbol"))?;
                let funding = symbol.starts_with('f');
                let raw = value.get("prec").and_then(Value::as_str) == Some("R0");
                if raw {
                    Route::RawBook { symbol, funding }
                } else {
                    Route::Book { symbol, funding }
                }
            }
            "candles" => Route::Candles {
                key: key
                    .clone()
                    .ok_or_else(|| malformed("subscribed candles", "missing key"))?,
            },
            "status" => Route::Status {
                key: key
                    .clone()
                    .ok_or_else(|| malformed("subscribed status", "missing key"))?,
            },
            other => return Err(DecodeError::UnknownKind(other.to_string())),
        };

        self.routes.insert(channel_id, route);

        Ok(DecodedRecord::SubscriptionAck(SubscriptionAck {
            kind: AckKind::Subscribed,
            channel: channel.to_string(),
            channel_id,
            symbol,
            key,
        }))
    }

    fn decode_channel_frame(&self, arr: &[Value]) -> Result<Vec<DecodedRecord>, DecodeError> {
        let channel_id = arr
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed("channel frame", "first element is not a channel id"))?;
        let body = arr
            .get(1)
            .ok_or_else(|| malformed("channel frame", "missing body"))?;

        if let Some(tag) = body.as_str() {
            return self.decode_tagged_frame(channel_id, tag, arr);
        }

        let payload = body
            .as_array()
            .ok_or_else(|| malformed("channel frame", "body is neither tag nor array"))?;

        let route = self
            .routes
            .get(&channel_id)
            .ok_or(DecodeError::UnknownChannel(channel_id))?;

        match route {
            Route::Ticker { symbol } => Ok(vec![decode_ticker(symbol, payload)?]),
            Route::Trades { symbol, funding } => decode_trade_snapshot(symbol, *funding, payload),
            Route::Book { symbol, funding } => Ok(vec![decode_book(symbol, *funding, payload)?]),
            Route::RawBook { symbol, funding } => {
                Ok(vec![decode_raw_book(symbol, *funding, payload)?])
            }
            Route::Candles { key } => Ok(vec![decode_candles(key, payload)?]),
            Route::Status { key } => Ok(vec![DecodedRecord::Status(StatusUpdate {
                key: key.clone(),
                fields: payload.clone(),
            })]),
        }
    }

    fn decode_tagged_frame(
        &self,
        channel_id: u64,
        tag: &str,
        arr: &[Value],
    ) -> Result<Vec<DecodedRecord>, DecodeError> {
        match tag {
            "hb" => Ok(vec![DecodedRecord::Heartbeat { channel_id }]),
            "cs" => {
                let value = arr
                    .get(2)
                    .and_then(Value::as_i64)
                    .ok_or_else(|| malformed("checksum", "missing value"))?;
                let symbol = self
                    .routes
                    .get(&channel_id)
                    .ok_or(DecodeError::UnknownChannel(channel_id))?
                    .symbol()
                    .ok_or_else(|| malformed("checksum", "channel carries no symbol"))?;
                Ok(vec![DecodedRecord::Checksum(ChecksumUpdate {
                    symbol,
                    value,
                })])
            }
            "te" | "tu" | "fte" | "ftu" => {
                let route = self
                    .routes
                    .get(&channel_id)
                    .ok_or(DecodeError::UnknownChannel(channel_id))?;
                let Route::Trades { symbol, funding } = route else {
                    return Err(malformed("trade execution", "channel is not a trades route"));
                };
                let payload = arr
                    .get(2)
                    .and_then(Value::as_array)
                    .ok_or_else(|| malformed("trade execution", "missing payload"))?;
                Ok(vec![decode_trade(symbol, *funding, payload)?])
            }
            // Wallet frames only arrive on the authenticated channel 0.
            "ws" => {
                let payload = arr
                    .get(2)
                    .and_then(Value::as_array)
                    .ok_or_else(|| malformed("wallet snapshot", "missing payload"))?;
                payload
                    .iter()
                    .map(|entry| {
                        let fields = entry
                            .as_array()
                            .ok_or_else(|| malformed("wallet snapshot", "entry is not an array"))?;
                        decode_wallet(fields)
                    })
                    .collect()
            }
            "wu" => {
                let fields = arr
                    .get(2)
                    .and_then(Value::as_array)
                    .ok_or_else(|| malformed("wallet update", "missing payload"))?;
                Ok(vec![decode_wallet(fields)?])
            }
            other => Err(DecodeError::UnknownKind(other.to_string())),
        }
    }
}

impl FrameCodec for BitfinexCodec {
    fn reset(&mut self) {
        self.routes.clear();
    }

    fn decode(&mut self, frame: &str) -> Result<Vec<DecodedRecord>, DecodeError> {
        let trimmed = frame.trim();

        if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| malformed("control event", e.to_string()))?;
            self.decode_event(&value)
        } else if trimmed.starts_with('[') {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| malformed("channel frame", e.to_string()))?;
            let arr = value
                .as_array()
                .ok_or_else(|| malformed("channel frame", "not an array"))?;
            self.decode_channel_frame(arr)
        } else {
            Err(malformed(
                "frame",
                format!("expected object or array, got: {}", preview(trimmed)),
            ))
        }
    }
}

// =============================================================================
// Payload Decoding
// =============================================================================

fn malformed(context: &'static str, detail: impl Into<String>) -> DecodeError {
    DecodeError::Malformed {
        context,
        detail: detail.into(),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(48).collect()
}

fn field<'a>(arr: &'a [Value], index: usize, context: &'static str) -> Result<&'a Value, DecodeError> {
    arr.get(index)
        .ok_or_else(|| malformed(context, format!("missing field {index}")))
}

fn dec(value: &Value, context: &'static str) -> Result<Decimal, DecodeError> {
    serde_json::from_value(value.clone()).map_err(|e| malformed(context, e.to_string()))
}

fn uint(value: &Value, context: &'static str) -> Result<u64, DecodeError> {
    value
        .as_u64()
        .ok_or_else(|| malformed(context, "expected unsigned integer"))
}

fn uint32(value: &Value, context: &'static str) -> Result<u32, DecodeError> {
    uint(value, context).and_then(|v| {
        u32::try_from(v).map_err(|_| malformed(context, "integer out of range"))
    })
}

fn timestamp(value: &Value, context: &'static str) -> Result<DateTime<Utc>, DecodeError> {
    let millis = value
        .as_i64()
        .ok_or_else(|| malformed(context, "expected millisecond timestamp"))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| malformed(context, "timestamp out of range"))
}

fn decode_ticker(symbol: &str, payload: &[Value]) -> Result<DecodedRecord, DecodeError> {
    const CTX: &str = "ticker";
    if payload.len() != 10 {
        return Err(malformed(
            CTX,
            format!("expected 10 fields, got {}", payload.len()),
        ));
    }
    Ok(DecodedRecord::Ticker(TickerUpdate {
        symbol: symbol.to_string(),
        bid: dec(field(payload, 0, CTX)?, CTX)?,
        bid_size: dec(field(payload, 1, CTX)?, CTX)?,
        ask: dec(field(payload, 2, CTX)?, CTX)?,
        ask_size: dec(field(payload, 3, CTX)?, CTX)?,
        daily_change: dec(field(payload, 4, CTX)?, CTX)?,
        daily_change_relative: dec(field(payload, 5, CTX)?, CTX)?,
        last_price: dec(field(payload, 6, CTX)?, CTX)?,
        volume: dec(field(payload, 7, CTX)?, CTX)?,
        high: dec(field(payload, 8, CTX)?, CTX)?,
        low: dec(field(payload, 9, CTX)?, CTX)?,
    }))
}

fn decode_trade(
    symbol: &str,
    funding: bool,
    payload: &[Value],
) -> Result<DecodedRecord, DecodeError> {
    const CTX: &str = "trade";
    if funding {
        // [ID, MTS, AMOUNT, RATE, PERIOD]
        Ok(DecodedRecord::Funding(FundingTrade {
            symbol: symbol.to_string(),
            id: uint(field(payload, 0, CTX)?, CTX)?,
            executed_at: timestamp(field(payload, 1, CTX)?, CTX)?,
            amount: dec(field(payload, 2, CTX)?, CTX)?,
            rate: dec(field(payload, 3, CTX)?, CTX)?,
            period: uint32(field(payload, 4, CTX)?, CTX)?,
        }))
    } else {
        // [ID, MTS, AMOUNT, PRICE]
        Ok(DecodedRecord::Trade(TradeUpdate {
            symbol: symbol.to_string(),
            id: uint(field(payload, 0, CTX)?, CTX)?,
            executed_at: timestamp(field(payload, 1, CTX)?, CTX)?,
            amount: dec(field(payload, 2, CTX)?, CTX)?,
            price: dec(field(payload, 3, CTX)?, CTX)?,
        }))
    }
}

fn decode_trade_snapshot(
    symbol: &str,
    funding: bool,
    payload: &[Value],
) -> Result<Vec<DecodedRecord>, DecodeError> {
    // A snapshot is an array of trade arrays; updates arrive tagged.
    payload
        .iter()
        .map(|entry| {
            let fields = entry
                .as_array()
                .ok_or_else(|| malformed("trade snapshot", "entry is not an array"))?;
            decode_trade(symbol, funding, fields)
        })
        .collect()
}

fn decode_book_level(fields: &[Value], funding: bool) -> Result<BookLevel, DecodeError> {
    const CTX: &str = "book level";
    if funding {
        // [RATE, PERIOD, COUNT, AMOUNT]
        Ok(BookLevel {
            price: dec(field(fields, 0, CTX)?, CTX)?,
            period: Some(uint32(field(fields, 1, CTX)?, CTX)?),
            count: uint32(field(fields, 2, CTX)?, CTX)?,
            amount: dec(field(fields, 3, CTX)?, CTX)?,
        })
    } else {
        // [PRICE, COUNT, AMOUNT]
        Ok(BookLevel {
            price: dec(field(fields, 0, CTX)?, CTX)?,
            count: uint32(field(fields, 1, CTX)?, CTX)?,
            amount: dec(field(fields, 2, CTX)?, CTX)?,
            period: None,
        })
    }
}

fn decode_book(
    symbol: &str,
    funding: bool,
    payload: &[Value],
) -> Result<DecodedRecord, DecodeError> {
    let is_snapshot = payload.first().is_some_and(Value::is_array);
    let levels = if is_snapshot {
        payload
            .iter()
            .map(|entry| {
                let fields = entry
                    .as_array()
                    .ok_or_else(|| malformed("book snapshot", "level is not an array"))?;
                decode_book_level(fields, funding)
            })
            .collect::<Result<Vec<_>, _>>()?
    } else {
        vec![decode_book_level(payload, funding)?]
    };

    Ok(DecodedRecord::Book(BookUpdate {
        symbol: symbol.to_string(),
        levels,
        is_snapshot,
    }))
}

fn decode_raw_book_entry(fields: &[Value], funding: bool) -> Result<RawBookEntry, DecodeError> {
    const CTX: &str = "raw book entry";
    if funding {
        // [OFFER_ID, PERIOD, RATE, AMOUNT]
        Ok(RawBookEntry {
            order_id: uint(field(fields, 0, CTX)?, CTX)?,
            period: Some(uint32(field(fields, 1, CTX)?, CTX)?),
            price: dec(field(fields, 2, CTX)?, CTX)?,
            amount: dec(field(fields, 3, CTX)?, CTX)?,
        })
    } else {
        // [ORDER_ID, PRICE, AMOUNT]
        Ok(RawBookEntry {
            order_id: uint(field(fields, 0, CTX)?, CTX)?,
            price: dec(field(fields, 1, CTX)?, CTX)?,
            amount: dec(field(fields, 2, CTX)?, CTX)?,
            period: None,
        })
    }
}

fn decode_raw_book(
    symbol: &str,
    funding: bool,
    payload: &[Value],
) -> Result<DecodedRecord, DecodeError> {
    let is_snapshot = payload.first().is_some_and(Value::is_array);
    let entries = if is_snapshot {
        payload
            .iter()
            .map(|entry| {
                let fields = entry
                    .as_array()
                    .ok_or_else(|| malformed("raw book snapshot", "entry is not an array"))?;
                decode_raw_book_entry(fields, funding)
            })
            .collect::<Result<Vec<_>, _>>()?
    } else {
        vec![decode_raw_book_entry(payload, funding)?]
    };

    Ok(DecodedRecord::RawBook(RawBookUpdate {
        symbol: symbol.to_string(),
        entries,
        is_snapshot,
    }))
}

fn decode_candle(fields: &[Value]) -> Result<Candle, DecodeError> {
    const CTX: &str = "candle";
    // [MTS, OPEN, CLOSE, HIGH, LOW, VOLUME]
    Ok(Candle {
        opened_at: timestamp(field(fields, 0, CTX)?, CTX)?,
        open: dec(field(fields, 1, CTX)?, CTX)?,
        close: dec(field(fields, 2, CTX)?, CTX)?,
        high: dec(field(fields, 3, CTX)?, CTX)?,
        low: dec(field(fields, 4, CTX)?, CTX)?,
        volume: dec(field(fields, 5, CTX)?, CTX)?,
    })
}

fn decode_candles(key: &str, payload: &[Value]) -> Result<DecodedRecord, DecodeError> {
    let is_snapshot = payload.first().is_some_and(Value::is_array);
    let candles = if is_snapshot {
        payload
            .iter()
            .map(|entry| {
                let fields = entry
                    .as_array()
                    .ok_or_else(|| malformed("candle snapshot", "entry is not an array"))?;
                decode_candle(fields)
            })
            .collect::<Result<Vec<_>, _>>()?
    } else {
        vec![decode_candle(payload)?]
    };

    Ok(DecodedRecord::Candle(CandleUpdate {
        key: key.to_string(),
        candles,
        is_snapshot,
    }))
}

fn decode_wallet(fields: &[Value]) -> Result<DecodedRecord, DecodeError> {
    const CTX: &str = "wallet";
    // [WALLET_TYPE, CURRENCY, BALANCE, UNSETTLED_INTEREST, AVAILABLE, ...]
    Ok(DecodedRecord::Wallet(WalletUpdate {
        wallet_type: field(fields, 0, CTX)?
            .as_str()
            .ok_or_else(|| malformed(CTX, "wallet type is not a string"))?
            .to_string(),
        currency: field(fields, 1, CTX)?
            .as_str()
            .ok_or_else(|| malformed(CTX, "currency is not a string"))?
            .to_string(),
        balance: dec(field(fields, 2, CTX)?, CTX)?,
        unsettled_interest: dec(field(fields, 3, CTX)?, CTX)?,
        available: fields
            .get(4)
            .filter(|v| !v.is_null())
            .map(|v| dec(v, CTX))
            .transpose()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::RecordKind;

    fn codec_with_route(subscribed: &str) -> BitfinexCodec {
        let mut codec = BitfinexCodec::new();
        codec.decode(subscribed).unwrap();
        codec
    }

    #[test]
    fn decodes_info_event() {
        let mut codec = BitfinexCodec::new();
        let records = codec.decode(r#"{"event":"info","version":2}"#).unwrap();

        assert_eq!(records.len(), 1);
        match &records[0] {
            DecodedRecord::Info(info) => assert_eq!(info.version, Some(2)),
            other => panic!("expected Info, got {other:?}"),
        }
    }

    #[test]
    fn decodes_pong_with_cid() {
        let mut codec = BitfinexCodec::new();
        let records = codec
            .decode(r#"{"event":"pong","cid":123456,"ts":1574694478808}"#)
            .unwrap();

        match &records[0] {
            DecodedRecord::Pong(pong) => {
                assert_eq!(pong.cid, 123_456);
                assert_eq!(pong.ts, Some(1_574_694_478_808));
            }
            other => panic!("expected Pong, got {other:?}"),
        }
    }

    #[test]
    fn subscribed_registers_route_and_acks() {
        let mut codec = BitfinexCodec::new();
        let records = codec
            .decode(r#"{"event":"subscribed","channel":"ticker","chanId":123,"symbol":"tBTCUSD","pair":"BTCUSD"}"#)
            .unwrap();

        assert_eq!(codec.route_count(), 1);
        match &records[0] {
            DecodedRecord::SubscriptionAck(ack) => {
                assert_eq!(ack.kind, AckKind::Subscribed);
                assert_eq!(ack.channel_id, 123);
                assert_eq!(ack.symbol.as_deref(), Some("tBTCUSD"));
            }
            other => panic!("expected SubscriptionAck, got {other:?}"),
        }
    }

    #[test]
    fn decodes_ticker_through_route() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"ticker","chanId":123,"symbol":"tBTCUSD"}"#,
        );
        let records = codec
            .decode("[123,[16100,15.2,16101,9.8,120.5,0.0075,16100,1234.5,16500,15800]]")
            .unwrap();

        match &records[0] {
            DecodedRecord::Ticker(ticker) => {
                assert_eq!(ticker.symbol, "tBTCUSD");
                assert_eq!(ticker.bid, Decimal::from(16_100));
                assert_eq!(ticker.low, Decimal::from(15_800));
            }
            other => panic!("expected Ticker, got {other:?}"),
        }
    }

    #[test]
    fn decodes_trade_execution() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"trades","chanId":17,"symbol":"tBTCUSD"}"#,
        );
        let records = codec
            .decode(r#"[17,"te",[401597395,1574694478808,0.005,7245.3]]"#)
            .unwrap();

        match &records[0] {
            DecodedRecord::Trade(trade) => {
                assert_eq!(trade.id, 401_597_395);
                assert_eq!(trade.price, Decimal::try_from(7245.3).unwrap());
            }
            other => panic!("expected Trade, got {other:?}"),
        }
    }

    #[test]
    fn decodes_trade_snapshot_as_multiple_records() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"trades","chanId":17,"symbol":"tBTCUSD"}"#,
        );
        let records = codec
            .decode(r#"[17,[[1,1574694478808,0.005,7245.3],[2,1574694478809,-0.25,7245.1]]]"#)
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind() == RecordKind::Trade));
    }

    #[test]
    fn funding_trades_decode_with_rate_and_period() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"trades","chanId":21,"symbol":"fUSD"}"#,
        );
        let records = codec
            .decode(r#"[21,"fte",[636854,1574694605000,-800,0.0002,2]]"#)
            .unwrap();

        match &records[0] {
            DecodedRecord::Funding(trade) => {
                assert_eq!(trade.symbol, "fUSD");
                assert_eq!(trade.period, 2);
            }
            other => panic!("expected Funding, got {other:?}"),
        }
    }

    #[test]
    fn decodes_book_snapshot_and_update() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"book","chanId":31,"symbol":"tBTCUSD","prec":"P0","freq":"F0"}"#,
        );

        let snapshot = codec
            .decode("[31,[[16100,2,1.5],[16101,1,-0.5]]]")
            .unwrap();
        match &snapshot[0] {
            DecodedRecord::Book(book) => {
                assert!(book.is_snapshot);
                assert_eq!(book.levels.len(), 2);
                assert_eq!(book.levels[0].count, 2);
                assert!(book.levels[0].period.is_none());
            }
            other => panic!("expected Book, got {other:?}"),
        }

        let update = codec.decode("[31,[16100,0,1.5]]").unwrap();
        match &update[0] {
            DecodedRecord::Book(book) => {
                assert!(!book.is_snapshot);
                assert_eq!(book.levels.len(), 1);
                assert_eq!(book.levels[0].count, 0);
            }
            other => panic!("expected Book, got {other:?}"),
        }
    }

    #[test]
    fn funding_book_levels_carry_period() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"book","chanId":32,"symbol":"fUSD","prec":"P0","freq":"F0"}"#,
        );
        let records = codec.decode("[32,[0.0002,30,5,1000]]").unwrap();

        match &records[0] {
            DecodedRecord::Book(book) => {
                assert_eq!(book.levels[0].period, Some(30));
                assert_eq!(book.levels[0].count, 5);
            }
            other => panic!("expected Book, got {other:?}"),
        }
    }

    #[test]
    fn raw_book_routes_on_r0_precision() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"book","chanId":41,"symbol":"tBTCUSD","prec":"R0","len":"100"}"#,
        );
        let records = codec
            .decode("[41,[[55804480,16100,1.5],[55804481,16101,-0.25]]]")
            .unwrap();

        match &records[0] {
            DecodedRecord::RawBook(book) => {
                assert!(book.is_snapshot);
                assert_eq!(book.entries[0].order_id, 55_804_480);
            }
            other => panic!("expected RawBook, got {other:?}"),
        }
    }

    #[test]
    fn decodes_candle_snapshot_and_update() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"candles","chanId":51,"key":"trade:1m:tBTCUSD"}"#,
        );

        let snapshot = codec
            .decode("[51,[[1574694480000,16100,16110,16120,16090,12.5]]]")
            .unwrap();
        match &snapshot[0] {
            DecodedRecord::Candle(candle) => {
                assert!(candle.is_snapshot);
                assert_eq!(candle.key, "trade:1m:tBTCUSD");
                assert_eq!(candle.candles.len(), 1);
            }
            other => panic!("expected Candle, got {other:?}"),
        }

        let update = codec
            .decode("[51,[1574694540000,16110,16105,16115,16100,3.25]]")
            .unwrap();
        match &update[0] {
            DecodedRecord::Candle(candle) => assert!(!candle.is_snapshot),
            other => panic!("expected Candle, got {other:?}"),
        }
    }

    #[test]
    fn decodes_status_with_loose_fields() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"status","chanId":61,"key":"deriv:tBTCF0:USTF0"}"#,
        );
        let records = codec
            .decode("[61,[1574694605000,null,16100.5,16099.8,null,250000]]")
            .unwrap();

        match &records[0] {
            DecodedRecord::Status(status) => {
                assert_eq!(status.key, "deriv:tBTCF0:USTF0");
                assert_eq!(status.fields.len(), 6);
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn decodes_heartbeat() {
        let mut codec = BitfinexCodec::new();
        let records = codec.decode(r#"[123,"hb"]"#).unwrap();
        assert_eq!(records[0], DecodedRecord::Heartbeat { channel_id: 123 });
    }

    #[test]
    fn decodes_checksum_for_book_channel() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"book","chanId":31,"symbol":"tBTCUSD","prec":"P0"}"#,
        );
        let records = codec.decode(r#"[31,"cs",-1591311021]"#).unwrap();

        match &records[0] {
            DecodedRecord::Checksum(checksum) => {
                assert_eq!(checksum.symbol, "tBTCUSD");
                assert_eq!(checksum.value, -1_591_311_021);
            }
            other => panic!("expected Checksum, got {other:?}"),
        }
    }

    #[test]
    fn decodes_wallet_update_on_account_channel() {
        let mut codec = BitfinexCodec::new();
        let records = codec
            .decode(r#"[0,"wu",["exchange","BTC",1.5,0,null]]"#)
            .unwrap();

        match &records[0] {
            DecodedRecord::Wallet(wallet) => {
                assert_eq!(wallet.wallet_type, "exchange");
                assert_eq!(wallet.currency, "BTC");
                assert!(wallet.available.is_none());
            }
            other => panic!("expected Wallet, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_tag_is_reported() {
        let mut codec = BitfinexCodec::new();
        let result = codec.decode(r#"{"event":"wallet-v2","fields":[]}"#);
        assert!(matches!(result, Err(DecodeError::UnknownKind(tag)) if tag == "wallet-v2"));
    }

    #[test]
    fn unknown_channel_id_is_reported() {
        let mut codec = BitfinexCodec::new();
        let result = codec.decode("[999,[16100,2,1.5]]");
        assert!(matches!(result, Err(DecodeError::UnknownChannel(999))));
    }

    #[test]
    fn malformed_frame_is_reported() {
        let mut codec = BitfinexCodec::new();
        assert!(matches!(
            codec.decode("not json at all"),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            codec.decode("[123"),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn reset_forgets_routes() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"ticker","chanId":123,"symbol":"tBTCUSD"}"#,
        );
        assert_eq!(codec.route_count(), 1);

        codec.reset();

        assert_eq!(codec.route_count(), 0);
        assert!(matches!(
            codec.decode("[123,[16100,15.2,16101,9.8,120.5,0.0075,16100,1234.5,16500,15800]]"),
            Err(DecodeError::UnknownChannel(123))
        ));
    }

    #[test]
    fn unsubscribed_removes_route() {
        let mut codec = codec_with_route(
            r#"{"event":"subscribed","channel":"ticker","chanId":123,"symbol":"tBTCUSD"}"#,
        );

        let records = codec
            .decode(r#"{"event":"unsubscribed","status":"OK","chanId":123}"#)
            .unwrap();

        assert_eq!(codec.route_count(), 0);
        match &records[0] {
            DecodedRecord::SubscriptionAck(ack) => {
                assert_eq!(ack.kind, AckKind::Unsubscribed);
                assert_eq!(ack.symbol.as_deref(), Some("tBTCUSD"));
            }
            other => panic!("expected SubscriptionAck, got {other:?}"),
        }
    }
}
