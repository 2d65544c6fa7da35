//! External collaborator contracts
//!
//! Every mutation path in the engine goes through these traits: durable
//! stores for orders, positions, wallets, leverage and hedge mode, the
//! credential resolver, the market-data feed control surface, the per-user
//! push channel, and the symbol/market-data HTTP service.
//!
//! All methods are suspension points; callers must not assume the
//! projection is unchanged across an await and re-fetch records after one.

use async_trait::async_trait;
use rust_decimal::Decimal;
use types::errors::{FeedError, StorageError};
use types::ids::{OrderId, PositionId, UserId};
use types::leverage::LeverageSetting;
use types::numeric::Price;
use types::order::Order;
use types::position::{Position, PositionSide};
use types::symbol::{Exchange, SymbolInfo};
use types::wallet::Balance;

use crate::events::{PushEvent, PushTopic};

/// Durable order storage. `(external_id, symbol)` is globally unique.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order; fails with `StorageError::Duplicate` if the
    /// `(external_id, symbol)` pair already exists.
    async fn insert(&self, order: &Order) -> Result<(), StorageError>;

    /// Replace the stored record for this `(external_id, symbol)`.
    async fn update(&self, order: &Order) -> Result<(), StorageError>;

    async fn get(&self, external_id: &str, symbol: &str) -> Result<Option<Order>, StorageError>;

    async fn get_by_id(&self, id: &OrderId) -> Result<Option<Order>, StorageError>;

    /// All live LIMIT orders (status NEW or PARTIALLY_FILLED).
    async fn open_limit_orders(&self) -> Result<Vec<Order>, StorageError>;

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, StorageError>;
}

/// Durable position storage, keyed by uuid.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn insert(&self, position: &Position) -> Result<(), StorageError>;

    async fn update(&self, position: &Position) -> Result<(), StorageError>;

    async fn get(&self, uuid: &PositionId) -> Result<Option<Position>, StorageError>;

    /// All positions with status NEW.
    async fn open_positions(&self) -> Result<Vec<Position>, StorageError>;

    async fn positions_for_user(&self, user: &UserId) -> Result<Vec<Position>, StorageError>;
}

/// Durable wallet storage, one row per (user, asset).
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get(&self, user: &UserId, asset: &str) -> Result<Option<Balance>, StorageError>;

    /// Replace a row wholesale (reconciliation repair path).
    async fn put(&self, balance: &Balance) -> Result<(), StorageError>;

    /// Apply signed deltas to `free` and `locked` atomically with respect
    /// to the row, creating the row at zero if missing. Returns the row
    /// after the change.
    async fn apply(
        &self,
        user: &UserId,
        asset: &str,
        free_delta: Decimal,
        locked_delta: Decimal,
    ) -> Result<Balance, StorageError>;

    async fn balances_for_user(&self, user: &UserId) -> Result<Vec<Balance>, StorageError>;

    async fn all(&self) -> Result<Vec<Balance>, StorageError>;
}

/// Durable leverage rows, keyed (user, symbol, side).
#[async_trait]
pub trait LeverageStore: Send + Sync {
    async fn get(
        &self,
        user: &UserId,
        symbol: &str,
        side: Option<PositionSide>,
    ) -> Result<Option<LeverageSetting>, StorageError>;

    /// Insert or replace the row for `(user, symbol, side)`.
    async fn put(&self, row: &LeverageSetting) -> Result<(), StorageError>;

    async fn remove(
        &self,
        user: &UserId,
        symbol: &str,
        side: Option<PositionSide>,
    ) -> Result<(), StorageError>;

    async fn all(&self) -> Result<Vec<LeverageSetting>, StorageError>;
}

/// Durable hedge-mode flags, keyed by user. Missing record means one-way.
#[async_trait]
pub trait HedgeStore: Send + Sync {
    async fn get(&self, user: &UserId) -> Result<bool, StorageError>;

    async fn set(&self, user: &UserId, hedge: bool) -> Result<(), StorageError>;
}

/// Credential resolution: (key, secret) → user.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn resolve(&self, key: &str, secret: &str) -> Result<Option<UserId>, StorageError>;
}

/// Subscription control for the market-data pub/sub.
///
/// Channels are named `trade@<symbol>@<exchange>`. The feed owner replays
/// the full subscription set after a reconnect.
#[async_trait]
pub trait FeedControl: Send + Sync {
    async fn subscribe(&self, channel: &str) -> Result<(), FeedError>;

    async fn unsubscribe(&self, channel: &str) -> Result<(), FeedError>;
}

/// Per-user real-time push channel.
///
/// Emission is best-effort: a failed push never fails settlement.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn push(
        &self,
        user: &UserId,
        topic: PushTopic,
        event: &PushEvent,
    ) -> Result<(), FeedError>;
}

/// Symbol and latest-price lookups against the external market-data service.
///
/// Implementations retry transient failures (up to 5 attempts) before
/// surfacing an error; `Ok(None)` means the service answered but does not
/// know the symbol.
#[async_trait]
pub trait SymbolService: Send + Sync {
    async fn symbol_info(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Option<SymbolInfo>, FeedError>;

    async fn latest_price(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Option<Price>, FeedError>;
}
