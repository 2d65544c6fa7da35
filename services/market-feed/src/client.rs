//! Symbol / market-data service HTTP client
//!
//! All endpoints answer the `BaseReturn` envelope
//! `{status: "OK"|"NOTOK", data, reason, timeProfile?}`. Transient
//! failures are retried up to 5 attempts before the error surfaces.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use engine::ports::SymbolService;
use types::errors::FeedError;
use types::numeric::Price;
use types::symbol::{Exchange, SymbolInfo};

const MAX_ATTEMPTS: usize = 5;
const RETRY_DELAY: Duration = Duration::from_millis(300);

/// Response envelope used by every market-data endpoint.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::Deserialize<'de>"))]
pub struct BaseReturn<T> {
    pub status: String,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(rename = "timeProfile", default)]
    pub time_profile: Option<serde_json::Value>,
}

impl<T> BaseReturn<T> {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

/// HTTP client for the external symbol/market-data service.
pub struct MarketDataClient {
    http: reqwest::Client,
    base_url: String,
}

impl MarketDataClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// GET a path and decode the envelope, retrying transient failures.
    async fn get_envelope<T: DeserializeOwned>(
        &self,
        path_and_query: &str,
    ) -> Result<BaseReturn<T>, FeedError> {
        let url = format!("{}/{}", self.base_url, path_and_query);
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            match self.http.get(&url).send().await {
                Ok(response) => match response.json::<BaseReturn<T>>().await {
                    Ok(envelope) => return Ok(envelope),
                    Err(err) => last_error = format!("decode: {err}"),
                },
                Err(err) => last_error = err.to_string(),
            }
            debug!(%url, attempt, %last_error, "market-data request failed");
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }

        warn!(%url, %last_error, "market-data request exhausted retries");
        Err(FeedError::Disconnected(last_error))
    }
}

/// `latestPrice` payload; the price arrives as a string or number.
#[derive(Debug, Deserialize)]
struct LatestPrice {
    price: serde_json::Value,
}

impl LatestPrice {
    fn parse(&self) -> Option<Price> {
        let decimal = match &self.price {
            serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok()?,
            serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok()?,
            _ => return None,
        };
        Price::new(decimal).ok()
    }
}

#[async_trait]
impl SymbolService for MarketDataClient {
    async fn symbol_info(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Option<SymbolInfo>, FeedError> {
        let envelope: BaseReturn<SymbolInfo> = self
            .get_envelope(&format!("exchange?symbol={}&exchange={}", symbol, exchange))
            .await?;
        if !envelope.is_ok() {
            debug!(
                symbol,
                %exchange,
                reason = envelope.reason.as_deref().unwrap_or("unknown"),
                "symbol lookup NOTOK"
            );
            return Ok(None);
        }
        Ok(envelope.data)
    }

    async fn latest_price(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Option<Price>, FeedError> {
        let envelope: BaseReturn<LatestPrice> = self
            .get_envelope(&format!(
                "latestPrice?symbol={}&exchange={}",
                symbol, exchange
            ))
            .await?;
        if !envelope.is_ok() {
            return Ok(None);
        }
        Ok(envelope.data.and_then(|latest| latest.parse()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_ok_with_data() {
        let json = r#"{
            "status": "OK",
            "data": {"price": "50000.5"},
            "reason": null,
            "timeProfile": {"exchangeRequestEndTime": 1708123456789}
        }"#;
        let envelope: BaseReturn<LatestPrice> = serde_json::from_str(json).unwrap();
        assert!(envelope.is_ok());
        let price = envelope.data.unwrap().parse().unwrap();
        assert_eq!(price, Price::from_str("50000.5").unwrap());
    }

    #[test]
    fn test_envelope_notok() {
        let json = r#"{"status": "NOTOK", "data": null, "reason": "symbol unknown"}"#;
        let envelope: BaseReturn<LatestPrice> = serde_json::from_str(json).unwrap();
        assert!(!envelope.is_ok());
        assert_eq!(envelope.reason.as_deref(), Some("symbol unknown"));
    }

    #[test]
    fn test_latest_price_number_encoding() {
        let json = r#"{"status": "OK", "data": {"price": 49999.5}}"#;
        let envelope: BaseReturn<LatestPrice> = serde_json::from_str(json).unwrap();
        let price = envelope.data.unwrap().parse().unwrap();
        assert_eq!(price, Price::from_str("49999.5").unwrap());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = MarketDataClient::new("http://md.internal/");
        assert_eq!(client.base_url, "http://md.internal");
    }
}
