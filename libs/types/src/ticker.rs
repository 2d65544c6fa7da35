//! Top-of-book tick wire format
//!
//! Payloads arrive from the market-data aggregator over pub/sub. Upstream
//! venues are inconsistent about numeric encoding, so every numeric field
//! is parsed leniently: JSON numbers and numeric strings both decode.

use crate::numeric::{Price, Quantity};
use crate::symbol::{stream_key, Exchange};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => {
            Decimal::from_str(s.trim()).map_err(|e| D::Error::custom(format!("bad decimal: {e}")))
        }
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .map_err(|e| D::Error::custom(format!("bad decimal: {e}"))),
        other => Err(D::Error::custom(format!("expected number, got {other}"))),
    }
}

fn lenient_price<'de, D>(deserializer: D) -> Result<Price, D::Error>
where
    D: Deserializer<'de>,
{
    let decimal = lenient_decimal(deserializer)?;
    Price::new(decimal).map_err(D::Error::custom)
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<Quantity, D::Error>
where
    D: Deserializer<'de>,
{
    let decimal = lenient_decimal(deserializer)?;
    Quantity::new(decimal).map_err(D::Error::custom)
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| D::Error::custom("bad timestamp")),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| D::Error::custom(format!("bad timestamp: {e}"))),
        other => Err(D::Error::custom(format!("expected timestamp, got {other}"))),
    }
}

fn lenient_millis_opt<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))),
        Some(serde_json::Value::String(s)) => Ok(s.trim().parse::<i64>().ok()),
        Some(other) => Err(D::Error::custom(format!("expected timestamp, got {other}"))),
    }
}

/// One top-of-book update for a symbol on a venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub exchange: Exchange,
    #[serde(rename = "bestAsk", deserialize_with = "lenient_price")]
    pub best_ask: Price,
    #[serde(rename = "bestBid", deserialize_with = "lenient_price")]
    pub best_bid: Price,
    #[serde(rename = "bestAskQnt", deserialize_with = "lenient_quantity")]
    pub best_ask_qnt: Quantity,
    #[serde(rename = "bestBidQnt", deserialize_with = "lenient_quantity")]
    pub best_bid_qnt: Quantity,
    #[serde(deserialize_with = "lenient_price")]
    pub price: Price,
    #[serde(deserialize_with = "lenient_millis")]
    pub time: i64,
    #[serde(
        rename = "eventTime",
        default,
        deserialize_with = "lenient_millis_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub event_time: Option<i64>,
}

impl Ticker {
    /// Effective event timestamp in Unix millis
    pub fn ticker_time(&self) -> i64 {
        self.event_time.unwrap_or(self.time)
    }

    /// Watch-set / price-map key for this tick
    pub fn stream_key(&self) -> String {
        stream_key(&self.symbol, self.exchange)
    }

    /// Canonical seed for the dedup signature: the five quote fields
    /// joined in a fixed order.
    pub fn signature_seed(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.best_ask, self.best_bid, self.best_ask_qnt, self.best_bid_qnt, self.price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_decode_numeric_fields_as_numbers() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "exchange": "binance",
            "bestAsk": 50000.5,
            "bestBid": 49999.5,
            "bestAskQnt": 0.2,
            "bestBidQnt": 0.4,
            "price": 50000,
            "time": 1708123456789
        }"#;
        let tick: Ticker = serde_json::from_str(json).unwrap();
        assert_eq!(tick.best_ask, Price::from_str("50000.5").unwrap());
        assert_eq!(tick.best_bid_qnt, Quantity::from_str("0.4").unwrap());
        assert_eq!(tick.event_time, None);
        assert_eq!(tick.ticker_time(), 1708123456789);
    }

    #[test]
    fn test_decode_numeric_fields_as_strings() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "exchange": "binanceUsdm",
            "bestAsk": "50000.5",
            "bestBid": "49999.5",
            "bestAskQnt": "0.2",
            "bestBidQnt": "0",
            "price": "50000",
            "time": "1708123456789",
            "eventTime": "1708123456790"
        }"#;
        let tick: Ticker = serde_json::from_str(json).unwrap();
        assert_eq!(tick.price, Price::from_u64(50_000));
        assert!(tick.best_bid_qnt.is_zero());
        assert_eq!(tick.ticker_time(), 1708123456790);
    }

    #[test]
    fn test_reject_negative_quantity() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "exchange": "binance",
            "bestAsk": "50000",
            "bestBid": "49999",
            "bestAskQnt": "-1",
            "bestBidQnt": "0",
            "price": "50000",
            "time": 1708123456789
        }"#;
        assert!(serde_json::from_str::<Ticker>(json).is_err());
    }

    #[test]
    fn test_signature_seed_depends_on_quote_fields_only() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "exchange": "binance",
            "bestAsk": "50000",
            "bestBid": "49999",
            "bestAskQnt": "0.2",
            "bestBidQnt": "0.4",
            "price": "50000",
            "time": 1708123456789
        }"#;
        let a: Ticker = serde_json::from_str(json).unwrap();
        let mut b = a.clone();
        b.time += 1_000;
        b.event_time = Some(b.time);
        assert_eq!(a.signature_seed(), b.signature_seed());

        let mut c = a.clone();
        c.best_bid_qnt = Quantity::from_str("0.5").unwrap();
        assert_ne!(a.signature_seed(), c.signature_seed());
    }

    #[test]
    fn test_stream_key() {
        let json = r#"{
            "symbol": "ETHUSDT",
            "exchange": "okxLinear",
            "bestAsk": "3000",
            "bestBid": "2999",
            "bestAskQnt": "1",
            "bestBidQnt": "1",
            "price": "3000",
            "time": 1708123456789
        }"#;
        let tick: Ticker = serde_json::from_str(json).unwrap();
        assert_eq!(tick.stream_key(), "ETHUSDT@okxLinear");
    }
}
