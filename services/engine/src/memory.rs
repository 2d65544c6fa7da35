//! In-memory reference implementations of every port
//!
//! Used by the test suites and the gateway binary when no durable backend
//! is wired in. Wallet deltas are applied atomically per row via the map's
//! entry API, matching the "atomic per wallet row" storage contract.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use types::errors::{FeedError, StorageError};
use types::ids::{OrderId, PositionId, UserId};
use types::leverage::LeverageSetting;
use types::numeric::Price;
use types::order::{Order, OrderType};
use types::position::{Position, PositionSide, PositionStatus};
use types::symbol::{Exchange, SymbolInfo};
use types::wallet::Balance;

use crate::engine::EnginePorts;
use crate::events::{PushEvent, PushTopic};
use crate::ports::{
    CredentialStore, FeedControl, HedgeStore, LeverageStore, OrderStore, PositionStore,
    PushChannel, SymbolService, WalletStore,
};

// ── Orders ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryOrderStore {
    rows: DashMap<(String, String), Order>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), StorageError> {
        let key = (order.external_id.clone(), order.symbol.clone());
        if self.rows.contains_key(&key) {
            return Err(StorageError::Duplicate(format!(
                "{}/{}",
                order.external_id, order.symbol
            )));
        }
        self.rows.insert(key, order.clone());
        Ok(())
    }

    async fn update(&self, order: &Order) -> Result<(), StorageError> {
        let key = (order.external_id.clone(), order.symbol.clone());
        self.rows.insert(key, order.clone());
        Ok(())
    }

    async fn get(&self, external_id: &str, symbol: &str) -> Result<Option<Order>, StorageError> {
        Ok(self
            .rows
            .get(&(external_id.to_string(), symbol.to_string()))
            .map(|entry| entry.clone()))
    }

    async fn get_by_id(&self, id: &OrderId) -> Result<Option<Order>, StorageError> {
        Ok(self
            .rows
            .iter()
            .find(|entry| entry.value().id == *id)
            .map(|entry| entry.value().clone()))
    }

    async fn open_limit_orders(&self) -> Result<Vec<Order>, StorageError> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| {
                entry.value().order_type == OrderType::LIMIT && entry.value().status.is_live()
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, StorageError> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| entry.value().user_id == *user)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

// ── Positions ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryPositionStore {
    rows: DashMap<PositionId, Position>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionStore for MemoryPositionStore {
    async fn insert(&self, position: &Position) -> Result<(), StorageError> {
        if self.rows.contains_key(&position.uuid) {
            return Err(StorageError::Duplicate(position.uuid.to_string()));
        }
        self.rows.insert(position.uuid, position.clone());
        Ok(())
    }

    async fn update(&self, position: &Position) -> Result<(), StorageError> {
        self.rows.insert(position.uuid, position.clone());
        Ok(())
    }

    async fn get(&self, uuid: &PositionId) -> Result<Option<Position>, StorageError> {
        Ok(self.rows.get(uuid).map(|entry| entry.clone()))
    }

    async fn open_positions(&self) -> Result<Vec<Position>, StorageError> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| entry.value().status == PositionStatus::New)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn positions_for_user(&self, user: &UserId) -> Result<Vec<Position>, StorageError> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| entry.value().user_id == *user)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

// ── Wallets ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryWalletStore {
    rows: DashMap<(UserId, String), Balance>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance row (test setup).
    pub fn seed(&self, user: UserId, asset: &str, free: Decimal) {
        self.rows
            .insert((user, asset.to_string()), Balance::new(user, asset, free));
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn get(&self, user: &UserId, asset: &str) -> Result<Option<Balance>, StorageError> {
        Ok(self
            .rows
            .get(&(*user, asset.to_string()))
            .map(|entry| entry.clone()))
    }

    async fn put(&self, balance: &Balance) -> Result<(), StorageError> {
        self.rows
            .insert((balance.user_id, balance.asset.clone()), balance.clone());
        Ok(())
    }

    async fn apply(
        &self,
        user: &UserId,
        asset: &str,
        free_delta: Decimal,
        locked_delta: Decimal,
    ) -> Result<Balance, StorageError> {
        let mut entry = self
            .rows
            .entry((*user, asset.to_string()))
            .or_insert_with(|| Balance::new(*user, asset, Decimal::ZERO));
        entry.apply(free_delta, locked_delta);
        Ok(entry.clone())
    }

    async fn balances_for_user(&self, user: &UserId) -> Result<Vec<Balance>, StorageError> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| entry.value().user_id == *user)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn all(&self) -> Result<Vec<Balance>, StorageError> {
        Ok(self.rows.iter().map(|entry| entry.value().clone()).collect())
    }
}

// ── Leverage ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryLeverageStore {
    rows: DashMap<(UserId, String, Option<PositionSide>), LeverageSetting>,
}

impl MemoryLeverageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeverageStore for MemoryLeverageStore {
    async fn get(
        &self,
        user: &UserId,
        symbol: &str,
        side: Option<PositionSide>,
    ) -> Result<Option<LeverageSetting>, StorageError> {
        Ok(self
            .rows
            .get(&(*user, symbol.to_string(), side))
            .map(|entry| entry.clone()))
    }

    async fn put(&self, row: &LeverageSetting) -> Result<(), StorageError> {
        self.rows
            .insert((row.user_id, row.symbol.clone(), row.side), row.clone());
        Ok(())
    }

    async fn remove(
        &self,
        user: &UserId,
        symbol: &str,
        side: Option<PositionSide>,
    ) -> Result<(), StorageError> {
        self.rows.remove(&(*user, symbol.to_string(), side));
        Ok(())
    }

    async fn all(&self) -> Result<Vec<LeverageSetting>, StorageError> {
        Ok(self.rows.iter().map(|entry| entry.value().clone()).collect())
    }
}

// ── Hedge mode ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryHedgeStore {
    rows: DashMap<UserId, bool>,
}

impl MemoryHedgeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HedgeStore for MemoryHedgeStore {
    async fn get(&self, user: &UserId) -> Result<bool, StorageError> {
        Ok(self.rows.get(user).map(|entry| *entry).unwrap_or(false))
    }

    async fn set(&self, user: &UserId, hedge: bool) -> Result<(), StorageError> {
        self.rows.insert(*user, hedge);
        Ok(())
    }
}

// ── Credentials ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCredentialStore {
    rows: DashMap<(String, String), UserId>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh user under (key, secret) and return its id.
    pub fn add_user(&self, key: &str, secret: &str) -> UserId {
        let user = UserId::new();
        self.rows
            .insert((key.to_string(), secret.to_string()), user);
        user
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn resolve(&self, key: &str, secret: &str) -> Result<Option<UserId>, StorageError> {
        Ok(self
            .rows
            .get(&(key.to_string(), secret.to_string()))
            .map(|entry| *entry))
    }
}

// ── Feed control ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryFeed {
    subscriptions: Mutex<Vec<String>>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .any(|c| c == channel)
    }

    pub fn subscribed_channels(&self) -> Vec<String> {
        let mut channels = self.subscriptions.lock().unwrap().clone();
        channels.sort();
        channels
    }
}

#[async_trait]
impl FeedControl for MemoryFeed {
    async fn subscribe(&self, channel: &str) -> Result<(), FeedError> {
        let mut subs = self.subscriptions.lock().unwrap();
        if !subs.iter().any(|c| c == channel) {
            subs.push(channel.to_string());
        }
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), FeedError> {
        self.subscriptions.lock().unwrap().retain(|c| c != channel);
        Ok(())
    }
}

// ── Push channel ─────────────────────────────────────────────────────

/// One recorded push delivery.
#[derive(Debug, Clone)]
pub struct PushRecord {
    pub user: UserId,
    pub topic: &'static str,
    pub event: PushEvent,
}

#[derive(Default)]
pub struct MemoryPush {
    events: Mutex<Vec<PushRecord>>,
}

impl MemoryPush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PushRecord> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, user: &UserId, topic: &str) -> Vec<PushRecord> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.user == *user && record.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PushChannel for MemoryPush {
    async fn push(
        &self,
        user: &UserId,
        topic: PushTopic,
        event: &PushEvent,
    ) -> Result<(), FeedError> {
        self.events.lock().unwrap().push(PushRecord {
            user: *user,
            topic: topic.as_str(),
            event: event.clone(),
        });
        Ok(())
    }
}

// ── Symbol service ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MemorySymbolService {
    symbols: DashMap<(String, Exchange), SymbolInfo>,
    prices: DashMap<(String, Exchange), Price>,
    symbol_lookups: AtomicU64,
    price_lookups: AtomicU64,
}

impl MemorySymbolService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_symbol(&self, info: SymbolInfo) {
        self.symbols.insert((info.pair.clone(), info.exchange), info);
    }

    pub fn put_price(&self, symbol: &str, exchange: Exchange, price: Price) {
        self.prices.insert((symbol.to_string(), exchange), price);
    }

    pub fn symbol_lookups(&self) -> u64 {
        self.symbol_lookups.load(Ordering::Relaxed)
    }

    pub fn price_lookups(&self) -> u64 {
        self.price_lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SymbolService for MemorySymbolService {
    async fn symbol_info(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Option<SymbolInfo>, FeedError> {
        self.symbol_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .symbols
            .get(&(symbol.to_string(), exchange))
            .map(|entry| entry.clone()))
    }

    async fn latest_price(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Option<Price>, FeedError> {
        self.price_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .prices
            .get(&(symbol.to_string(), exchange))
            .map(|entry| *entry))
    }
}

// ── Bundle ───────────────────────────────────────────────────────────

/// All memory ports together, for tests and the demo gateway.
pub struct MemoryEnv {
    pub orders: Arc<MemoryOrderStore>,
    pub positions: Arc<MemoryPositionStore>,
    pub wallets: Arc<MemoryWalletStore>,
    pub leverage: Arc<MemoryLeverageStore>,
    pub hedge: Arc<MemoryHedgeStore>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub feed: Arc<MemoryFeed>,
    pub push: Arc<MemoryPush>,
    pub symbols: Arc<MemorySymbolService>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self {
            orders: Arc::new(MemoryOrderStore::new()),
            positions: Arc::new(MemoryPositionStore::new()),
            wallets: Arc::new(MemoryWalletStore::new()),
            leverage: Arc::new(MemoryLeverageStore::new()),
            hedge: Arc::new(MemoryHedgeStore::new()),
            credentials: Arc::new(MemoryCredentialStore::new()),
            feed: Arc::new(MemoryFeed::new()),
            push: Arc::new(MemoryPush::new()),
            symbols: Arc::new(MemorySymbolService::new()),
        }
    }

    /// Port handles for [`crate::Engine::new`].
    pub fn ports(&self) -> EnginePorts {
        EnginePorts {
            orders: self.orders.clone(),
            positions: self.positions.clone(),
            wallets: self.wallets.clone(),
            leverage: self.leverage.clone(),
            hedge: self.hedge.clone(),
            credentials: self.credentials.clone(),
            feed: self.feed.clone(),
            push: self.push.clone(),
            symbols: self.symbols.clone(),
        }
    }
}

impl Default for MemoryEnv {
    fn default() -> Self {
        Self::new()
    }
}
