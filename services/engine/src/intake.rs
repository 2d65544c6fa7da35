//! Ticker intake filters
//!
//! Every decoded tick passes three filters, in order:
//!
//! 1. Per-exchange monotonicity — drop if older than the last tick seen
//!    for that exchange.
//! 2. Freshness — drop with a warning if more than the staleness window
//!    behind the wall clock; the caller invalidates the cached price.
//! 3. Signature dedup — drop if the quote fields match the last signature
//!    recorded for the symbol.
//!
//! Survivors update the price map and are coalesced into a per-exchange
//! batch processed under the per-exchange ticker lock.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use types::symbol::Exchange;
use types::ticker::Ticker;

/// Default staleness window: 30 seconds.
pub const TICK_STALENESS_MS: i64 = 30_000;

/// Outcome of admitting a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admit {
    /// Tick survived all filters.
    Accepted,
    /// Older than the last tick for its exchange.
    DroppedMonotonic,
    /// Too far behind the wall clock; cached price must be invalidated.
    DroppedStale,
    /// Identical quote signature to the previous tick for the symbol.
    DroppedDuplicate,
}

/// Stateful tick filter.
pub struct TickerIntake {
    last_time: DashMap<Exchange, i64>,
    last_signature: DashMap<String, [u8; 32]>,
    staleness_ms: i64,
    accepted: AtomicU64,
    dropped_monotonic: AtomicU64,
    dropped_stale: AtomicU64,
    dropped_duplicate: AtomicU64,
}

impl TickerIntake {
    pub fn new(staleness_ms: i64) -> Self {
        Self {
            last_time: DashMap::new(),
            last_signature: DashMap::new(),
            staleness_ms,
            accepted: AtomicU64::new(0),
            dropped_monotonic: AtomicU64::new(0),
            dropped_stale: AtomicU64::new(0),
            dropped_duplicate: AtomicU64::new(0),
        }
    }

    /// Run the three filters against one tick.
    pub fn admit(&self, tick: &Ticker, now: i64) -> Admit {
        let time = tick.ticker_time();

        // 1. Per-exchange monotonicity
        {
            let mut last = self.last_time.entry(tick.exchange).or_insert(i64::MIN);
            if time < *last {
                self.dropped_monotonic.fetch_add(1, Ordering::Relaxed);
                debug!(
                    symbol = %tick.symbol,
                    exchange = %tick.exchange,
                    time,
                    last = *last,
                    "dropping out-of-order tick"
                );
                return Admit::DroppedMonotonic;
            }
            *last = time;
        }

        // 2. Freshness
        if time + self.staleness_ms < now {
            self.dropped_stale.fetch_add(1, Ordering::Relaxed);
            warn!(
                symbol = %tick.symbol,
                exchange = %tick.exchange,
                age_ms = now - time,
                "dropping stale tick"
            );
            return Admit::DroppedStale;
        }

        // 3. Signature dedup
        let signature: [u8; 32] = Sha256::digest(tick.signature_seed().as_bytes()).into();
        let key = tick.stream_key();
        let duplicate = self
            .last_signature
            .get(&key)
            .map(|prev| *prev.value() == signature)
            .unwrap_or(false);
        if duplicate {
            self.dropped_duplicate.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %tick.symbol, exchange = %tick.exchange, "dropping duplicate tick");
            return Admit::DroppedDuplicate;
        }
        self.last_signature.insert(key, signature);

        self.accepted.fetch_add(1, Ordering::Relaxed);
        Admit::Accepted
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn dropped_monotonic(&self) -> u64 {
        self.dropped_monotonic.load(Ordering::Relaxed)
    }

    pub fn dropped_stale(&self) -> u64 {
        self.dropped_stale.load(Ordering::Relaxed)
    }

    pub fn dropped_duplicate(&self) -> u64 {
        self.dropped_duplicate.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::numeric::{Price, Quantity};

    fn make_tick(exchange: Exchange, time: i64, ask: u64) -> Ticker {
        Ticker {
            symbol: "BTCUSDT".to_string(),
            exchange,
            best_ask: Price::from_u64(ask),
            best_bid: Price::from_u64(ask - 1),
            best_ask_qnt: Quantity::from_u64(1),
            best_bid_qnt: Quantity::from_u64(1),
            price: Price::from_u64(ask),
            time,
            event_time: None,
        }
    }

    #[test]
    fn test_accepts_fresh_tick() {
        let intake = TickerIntake::new(TICK_STALENESS_MS);
        let tick = make_tick(Exchange::Binance, 1_000, 50_000);
        assert_eq!(intake.admit(&tick, 2_000), Admit::Accepted);
        assert_eq!(intake.accepted(), 1);
    }

    #[test]
    fn test_monotonicity_per_exchange() {
        let intake = TickerIntake::new(TICK_STALENESS_MS);
        intake.admit(&make_tick(Exchange::Binance, 2_000, 50_000), 2_000);

        // Older tick on the same exchange is dropped.
        assert_eq!(
            intake.admit(&make_tick(Exchange::Binance, 1_000, 50_001), 2_000),
            Admit::DroppedMonotonic
        );
        // Same-age tick passes (strict < comparison).
        assert_eq!(
            intake.admit(&make_tick(Exchange::Binance, 2_000, 50_002), 2_000),
            Admit::Accepted
        );
        // A different exchange has independent time tracking.
        assert_eq!(
            intake.admit(&make_tick(Exchange::Kucoin, 1_000, 50_003), 2_000),
            Admit::Accepted
        );
    }

    #[test]
    fn test_stale_tick_dropped() {
        let intake = TickerIntake::new(TICK_STALENESS_MS);
        let tick = make_tick(Exchange::Binance, 1_000, 50_000);
        assert_eq!(
            intake.admit(&tick, 1_000 + TICK_STALENESS_MS + 1),
            Admit::DroppedStale
        );
        assert_eq!(intake.dropped_stale(), 1);
    }

    #[test]
    fn test_signature_dedup_is_a_noop_on_replay() {
        let intake = TickerIntake::new(TICK_STALENESS_MS);
        let tick = make_tick(Exchange::Binance, 1_000, 50_000);
        assert_eq!(intake.admit(&tick, 1_000), Admit::Accepted);

        // Same quote fields, newer timestamp: duplicate.
        let mut replay = tick.clone();
        replay.time = 1_500;
        assert_eq!(intake.admit(&replay, 1_500), Admit::DroppedDuplicate);

        // Changed quote field: accepted again.
        let changed = make_tick(Exchange::Binance, 2_000, 50_001);
        assert_eq!(intake.admit(&changed, 2_000), Admit::Accepted);
        assert_eq!(intake.dropped_duplicate(), 1);
    }

    #[test]
    fn test_signature_tracked_per_symbol() {
        let intake = TickerIntake::new(TICK_STALENESS_MS);
        let btc = make_tick(Exchange::Binance, 1_000, 50_000);
        let mut eth = btc.clone();
        eth.symbol = "ETHUSDT".to_string();
        eth.time = 1_100;

        assert_eq!(intake.admit(&btc, 1_000), Admit::Accepted);
        // Same quote fields on a different symbol are not duplicates.
        assert_eq!(intake.admit(&eth, 1_100), Admit::Accepted);
    }
}
