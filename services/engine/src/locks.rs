//! Named-lock manager
//!
//! Every mutation path that touches the projection, balances or positions
//! is serialized by a named lock with waiting (non-fair) semantics:
//!
//! | Lock        | Key                                   | Guards                      |
//! |-------------|---------------------------------------|-----------------------------|
//! | CreateOrder | `create:<key>\|<secret>\|<sym>\|<ex>` | `create_order` end-to-end   |
//! | UpdateOrder | `order:<externalId>`                  | cancel + limit-fill path    |
//! | Ticker      | `ticker:<exchange>`                   | per-exchange tick batches   |
//! | Common      | `common:leverage:…` / `common:position:…` | leverage rows, position close |
//!
//! Nesting order is `Ticker → {CreateOrder | UpdateOrder} → Common`, and
//! within the Common tier always position before leverage (the
//! leverage-lock helper runs inside settlement's position branches).
//! Synthetic liquidation orders use `create:liq:<uuid>` keys so the
//! Ticker-held frame never waits on a key it already holds.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use types::ids::{PositionId, UserId};
use types::symbol::Exchange;

/// Guard for a named lock; the lock is held until dropped.
pub type LockGuard = OwnedMutexGuard<()>;

/// Process-wide registry of named async locks.
///
/// Lock entries are created on first use and kept for the process lifetime;
/// the key space is bounded by live users, symbols and exchanges.
pub struct LockManager {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the named lock, waiting if it is held.
    pub async fn acquire(&self, key: &str) -> LockGuard {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_default()
            .value()
            .clone();
        lock.lock_owned().await
    }

    /// Number of named locks ever created (diagnostics).
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

/// CreateOrder key: serializes identical (key, secret, symbol, exchange).
pub fn create_order_key(key: &str, secret: &str, symbol: &str, exchange: Exchange) -> String {
    format!("create:{}|{}|{}|{}", key, secret, symbol, exchange)
}

/// CreateOrder key for a synthetic liquidation order.
pub fn liquidation_order_key(uuid: &PositionId) -> String {
    format!("create:liq:{}", uuid)
}

/// UpdateOrder key: serializes cancel and fill for one external id.
pub fn update_order_key(external_id: &str) -> String {
    format!("order:{}", external_id)
}

/// Ticker key: serializes tick batches per exchange.
pub fn ticker_key(exchange: Exchange) -> String {
    format!("ticker:{}", exchange)
}

/// Common key guarding a user's leverage rows for one symbol.
pub fn leverage_key(user: &UserId, symbol: &str) -> String {
    format!("common:leverage:{}|{}", user, symbol)
}

/// Common key guarding close/reduce of one position.
pub fn position_key(uuid: &PositionId) -> String {
    format!("common:position:{}", uuid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_same_key_serializes() {
        let manager = Arc::new(LockManager::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let counter = counter.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = manager.acquire("order:abc").await;
                let inside = counter.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(inside, Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1, "lock must exclude");
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let manager = LockManager::new();
        let guard_a = manager.acquire("ticker:binance").await;
        // A second, distinct key must be acquirable while A is held.
        let guard_b = manager.acquire("ticker:bybit").await;
        drop(guard_a);
        drop(guard_b);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_key_formats() {
        let user = UserId::new();
        let uuid = PositionId::new();
        assert_eq!(
            create_order_key("k", "s", "BTCUSDT", Exchange::Binance),
            "create:k|s|BTCUSDT|binance"
        );
        assert_eq!(update_order_key("ext-1"), "order:ext-1");
        assert_eq!(ticker_key(Exchange::BinanceUsdm), "ticker:binanceUsdm");
        assert!(leverage_key(&user, "BTCUSDT").starts_with("common:leverage:"));
        assert!(position_key(&uuid).starts_with("common:position:"));
        assert!(liquidation_order_key(&uuid).starts_with("create:liq:"));
    }
}
