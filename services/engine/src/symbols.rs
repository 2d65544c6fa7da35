//! Symbol-info and latest-price caches
//!
//! Symbol parameters are immutable per retrieval and cached for 3 hours;
//! on miss or expiry they are refetched through the `SymbolService` port.
//! Latest prices live in a second cache with a 60-second lifetime, fed by
//! surviving ticks and, on miss, by the service's `latestPrice` endpoint.
//! Callers receive snapshots and must not hold them across suspension
//! points beyond one request.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;
use types::errors::{EngineError, FeedError};
use types::numeric::Price;
use types::symbol::{stream_key, Exchange, SymbolInfo};

use crate::ports::SymbolService;

/// Default symbol-info lifetime: 3 hours.
pub const SYMBOL_TTL_MS: i64 = 3 * 60 * 60 * 1_000;

/// Default latest-price lifetime: 60 seconds.
pub const PRICE_TTL_MS: i64 = 60 * 1_000;

/// Cache of per-symbol parameters and latest prices.
pub struct SymbolCache {
    service: Arc<dyn SymbolService>,
    symbols: DashMap<(String, Exchange), (SymbolInfo, i64)>,
    prices: DashMap<String, (Price, i64)>,
    symbol_ttl_ms: i64,
    price_ttl_ms: i64,
}

impl SymbolCache {
    pub fn new(service: Arc<dyn SymbolService>, symbol_ttl_ms: i64, price_ttl_ms: i64) -> Self {
        Self {
            service,
            symbols: DashMap::new(),
            prices: DashMap::new(),
            symbol_ttl_ms,
            price_ttl_ms,
        }
    }

    /// Snapshot of symbol parameters, refreshed through the service when
    /// missing or older than the TTL.
    pub async fn get(
        &self,
        symbol: &str,
        exchange: Exchange,
        now: i64,
    ) -> Result<SymbolInfo, EngineError> {
        let key = (symbol.to_string(), exchange);
        if let Some(entry) = self.symbols.get(&key) {
            let (info, fetched_at) = entry.value();
            if now - fetched_at < self.symbol_ttl_ms {
                return Ok(info.clone());
            }
        }

        match self.service.symbol_info(symbol, exchange).await {
            Ok(Some(info)) => {
                self.symbols.insert(key, (info.clone(), now));
                Ok(info)
            }
            Ok(None) => Err(EngineError::SymbolNotFound {
                symbol: symbol.to_string(),
                exchange: exchange.to_string(),
            }),
            Err(err) => {
                // Serve a stale entry over failing the caller outright.
                if let Some(entry) = self.symbols.get(&(symbol.to_string(), exchange)) {
                    warn!(symbol, %exchange, %err, "symbol refresh failed, serving stale entry");
                    return Ok(entry.value().0.clone());
                }
                Err(EngineError::Feed(err))
            }
        }
    }

    /// Record the latest traded price for a stream (from a surviving tick).
    pub fn set_price(&self, symbol: &str, exchange: Exchange, price: Price, now: i64) {
        self.prices.insert(stream_key(symbol, exchange), (price, now));
    }

    /// Drop the cached price for a stream (stale tick handling).
    pub fn invalidate_price(&self, symbol: &str, exchange: Exchange) {
        self.prices.remove(&stream_key(symbol, exchange));
    }

    /// Current price for a symbol: the cached tick price when fresh,
    /// otherwise the service's latest price (which is then cached).
    pub async fn current_price(
        &self,
        symbol: &str,
        exchange: Exchange,
        now: i64,
    ) -> Result<Price, EngineError> {
        let key = stream_key(symbol, exchange);
        if let Some(entry) = self.prices.get(&key) {
            let (price, seen_at) = *entry.value();
            if now - seen_at < self.price_ttl_ms {
                return Ok(price);
            }
        }

        match self.service.latest_price(symbol, exchange).await? {
            Some(price) => {
                self.prices.insert(key, (price, now));
                Ok(price)
            }
            None => Err(EngineError::Feed(FeedError::PriceUnavailable {
                symbol: symbol.to_string(),
                exchange: exchange.to_string(),
            })),
        }
    }
}
