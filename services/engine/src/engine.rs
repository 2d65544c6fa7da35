//! Engine orchestrator
//!
//! Owns every piece of process-local state (projection, watch set, caches,
//! named locks) and the handles to external collaborators. All mutating
//! operations live in `lifecycle`, `settlement`, `matching` and
//! `reconcile`; this module holds the shared plumbing: construction,
//! authentication, tick dispatch, subscription edges, push emission and
//! the read-side queries used by the HTTP surface.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use types::errors::{AccountError, EngineError};
use types::ids::UserId;
use types::leverage::LeverageSetting;
use types::order::Order;
use types::position::{Position, PositionSide, PositionStatus};
use types::symbol::{trade_channel, Exchange};
use types::ticker::Ticker;
use types::wallet::Balance;

use crate::events::{self, PushTopic};
use crate::intake::{Admit, TickerIntake, TICK_STALENESS_MS};
use crate::locks::{self, LockManager};
use crate::ports::{
    CredentialStore, FeedControl, HedgeStore, LeverageStore, OrderStore, PositionStore,
    PushChannel, SymbolService, WalletStore,
};
use crate::projection::Projection;
use crate::symbols::{SymbolCache, PRICE_TTL_MS, SYMBOL_TTL_MS};
use crate::watch::WatchSet;

/// Handles to every external collaborator.
#[derive(Clone)]
pub struct EnginePorts {
    pub orders: Arc<dyn OrderStore>,
    pub positions: Arc<dyn PositionStore>,
    pub wallets: Arc<dyn WalletStore>,
    pub leverage: Arc<dyn LeverageStore>,
    pub hedge: Arc<dyn HedgeStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub feed: Arc<dyn FeedControl>,
    pub push: Arc<dyn PushChannel>,
    pub symbols: Arc<dyn SymbolService>,
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ticks older than this are discarded and invalidate the price cache.
    pub tick_staleness_ms: i64,
    /// Lifetime of latest-price cache entries.
    pub price_ttl_ms: i64,
    /// Lifetime of symbol-info cache entries.
    pub symbol_ttl_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_staleness_ms: TICK_STALENESS_MS,
            price_ttl_ms: PRICE_TTL_MS,
            symbol_ttl_ms: SYMBOL_TTL_MS,
        }
    }
}

/// The matching and settlement engine.
pub struct Engine {
    pub(crate) ports: EnginePorts,
    pub(crate) projection: Projection,
    pub(crate) watch: WatchSet,
    pub(crate) symbols: SymbolCache,
    pub(crate) intake: TickerIntake,
    pub(crate) locks: LockManager,
}

impl Engine {
    pub fn new(ports: EnginePorts, config: EngineConfig) -> Self {
        let symbols = SymbolCache::new(
            ports.symbols.clone(),
            config.symbol_ttl_ms,
            config.price_ttl_ms,
        );
        Self {
            ports,
            projection: Projection::new(),
            watch: WatchSet::new(),
            symbols,
            intake: TickerIntake::new(config.tick_staleness_ms),
            locks: LockManager::new(),
        }
    }

    /// Wall-clock time in Unix millis.
    pub(crate) fn now(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Read access to the projection (tests, diagnostics).
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Read access to the watch set (tests, diagnostics).
    pub fn watch(&self) -> &WatchSet {
        &self.watch
    }

    /// Read access to intake counters (tests, diagnostics).
    pub fn intake(&self) -> &TickerIntake {
        &self.intake
    }

    /// Resolve (key, secret) to a user.
    pub async fn authenticate(&self, key: &str, secret: &str) -> Result<UserId, EngineError> {
        self.ports
            .credentials
            .resolve(key, secret)
            .await?
            .ok_or_else(|| AccountError::UserNotFound.into())
    }

    // ── Tick dispatch ────────────────────────────────────────────────

    /// Run one decoded tick through the intake filters and the matching
    /// scans. Convenience wrapper over [`Engine::process_ticks`].
    pub async fn handle_tick(&self, tick: Ticker) {
        let exchange = tick.exchange;
        self.process_ticks(exchange, vec![tick]).await;
    }

    /// Process a batch of ticks for one exchange.
    ///
    /// Survivors of the intake filters are coalesced per symbol (later
    /// ticks replace earlier ones) and processed under the per-exchange
    /// ticker lock, so batches for the same exchange apply in arrival
    /// order and never concurrently.
    pub async fn process_ticks(&self, exchange: Exchange, ticks: Vec<Ticker>) {
        let now = self.now();
        let mut batch: HashMap<String, Ticker> = HashMap::new();

        for tick in ticks {
            if tick.exchange != exchange {
                warn!(
                    expected = %exchange,
                    got = %tick.exchange,
                    symbol = %tick.symbol,
                    "tick routed to wrong exchange queue"
                );
                continue;
            }
            match self.intake.admit(&tick, now) {
                Admit::Accepted => {
                    self.symbols
                        .set_price(&tick.symbol, exchange, tick.price, now);
                    batch.insert(tick.symbol.clone(), tick);
                }
                Admit::DroppedStale => {
                    self.symbols.invalidate_price(&tick.symbol, exchange);
                }
                Admit::DroppedMonotonic | Admit::DroppedDuplicate => {}
            }
        }

        if batch.is_empty() {
            return;
        }

        let _guard = self.locks.acquire(&locks::ticker_key(exchange)).await;
        for (symbol, tick) in batch {
            self.match_symbol(&symbol, exchange, &tick).await;
        }
    }

    // ── Subscription edges ───────────────────────────────────────────

    /// Register a holder in the watch set, opening the pub/sub
    /// subscription on the first holder for the stream.
    pub(crate) async fn watch_add(&self, symbol: &str, exchange: Exchange, holder: &str) {
        let key = types::symbol::stream_key(symbol, exchange);
        if self.watch.add(&key, holder) {
            let channel = trade_channel(symbol, exchange);
            debug!(%channel, "opening market-data subscription");
            if let Err(err) = self.ports.feed.subscribe(&channel).await {
                warn!(%channel, %err, "subscribe failed; feed owner will retry on reconnect");
            }
        }
    }

    /// Drop a holder from the watch set, closing the subscription when the
    /// stream has no holders left.
    pub(crate) async fn watch_remove(&self, symbol: &str, exchange: Exchange, holder: &str) {
        let key = types::symbol::stream_key(symbol, exchange);
        if self.watch.remove(&key, holder) {
            let channel = trade_channel(symbol, exchange);
            debug!(%channel, "dropping market-data subscription");
            if let Err(err) = self.ports.feed.unsubscribe(&channel).await {
                warn!(%channel, %err, "unsubscribe failed");
            }
        }
    }

    // ── Push emission (best-effort) ──────────────────────────────────

    pub(crate) async fn emit_order_event(&self, order: &Order) {
        let event = events::order_update(order);
        if let Err(err) = self
            .ports
            .push
            .push(&order.user_id, PushTopic::Order, &event)
            .await
        {
            warn!(external_id = %order.external_id, %err, "order push failed");
        }
    }

    pub(crate) async fn emit_position_event(&self, position: &Position) {
        let event = events::position_update(position);
        if let Err(err) = self
            .ports
            .push
            .push(&position.user_id, PushTopic::Order, &event)
            .await
        {
            warn!(uuid = %position.uuid, %err, "position push failed");
        }
    }

    pub(crate) async fn emit_account_event(&self, user: &UserId) {
        let balances = match self.ports.wallets.balances_for_user(user).await {
            Ok(balances) => balances,
            Err(err) => {
                warn!(%user, %err, "balance snapshot failed");
                return;
            }
        };
        let event = events::account_snapshot(&balances);
        if let Err(err) = self
            .ports
            .push
            .push(user, PushTopic::OutboundAccountInfo, &event)
            .await
        {
            warn!(%user, %err, "account push failed");
        }
    }

    // ── Balances and leverage helpers ────────────────────────────────

    /// Balance row for (user, asset), zero if absent.
    pub(crate) async fn balance(&self, user: &UserId, asset: &str) -> Result<Balance, EngineError> {
        Ok(self
            .ports
            .wallets
            .get(user, asset)
            .await?
            .unwrap_or_else(|| Balance::new(*user, asset, Decimal::ZERO)))
    }

    /// Leverage for (user, symbol, side), inserting an unlocked 1x row
    /// when missing.
    pub(crate) async fn ensure_leverage(
        &self,
        user: &UserId,
        symbol: &str,
        side: PositionSide,
    ) -> Result<LeverageSetting, EngineError> {
        if let Some(row) = self.ports.leverage.get(user, symbol, Some(side)).await? {
            return Ok(row);
        }
        let row = LeverageSetting::default_for(*user, symbol, side);
        self.ports.leverage.put(&row).await?;
        Ok(row)
    }

    /// Mark the leverage row locked while a position is open.
    pub(crate) async fn lock_leverage(
        &self,
        user: &UserId,
        symbol: &str,
        side: PositionSide,
        leverage: u32,
    ) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(&locks::leverage_key(user, symbol)).await;
        let mut row = self
            .ports
            .leverage
            .get(user, symbol, Some(side))
            .await?
            .unwrap_or_else(|| LeverageSetting::default_for(*user, symbol, side));
        row.leverage = leverage;
        row.locked = true;
        self.ports.leverage.put(&row).await?;
        Ok(())
    }

    /// Release the leverage row once the last position on its key closes.
    pub(crate) async fn unlock_leverage(
        &self,
        user: &UserId,
        symbol: &str,
        side: PositionSide,
    ) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(&locks::leverage_key(user, symbol)).await;
        if let Some(mut row) = self.ports.leverage.get(user, symbol, Some(side)).await? {
            row.locked = false;
            self.ports.leverage.put(&row).await?;
        }
        Ok(())
    }

    // ── User-facing settings ─────────────────────────────────────────

    /// Change leverage for (user, symbol, side). Rejected while locked.
    pub async fn set_leverage(
        &self,
        user: &UserId,
        symbol: &str,
        side: Option<PositionSide>,
        leverage: u32,
    ) -> Result<LeverageSetting, EngineError> {
        let hedge = self.ports.hedge.get(user).await?;
        let side = if hedge {
            match side {
                Some(side @ (PositionSide::LONG | PositionSide::SHORT)) => side,
                _ => return Err(AccountError::HedgeModeViolation.into()),
            }
        } else {
            PositionSide::BOTH
        };

        let _guard = self.locks.acquire(&locks::leverage_key(user, symbol)).await;
        let mut row = self
            .ports
            .leverage
            .get(user, symbol, Some(side))
            .await?
            .unwrap_or_else(|| LeverageSetting::default_for(*user, symbol, side));
        if row.locked {
            return Err(AccountError::LeverageLocked {
                symbol: symbol.to_string(),
            }
            .into());
        }
        row.leverage = leverage;
        self.ports.leverage.put(&row).await?;
        info!(%user, symbol, ?side, leverage, "leverage updated");
        Ok(row)
    }

    /// Toggle hedge mode. Rejected while any open position or live
    /// derivatives order exists for the user.
    pub async fn set_hedge(&self, user: &UserId, hedge: bool) -> Result<(), EngineError> {
        let open_positions = self
            .ports
            .positions
            .positions_for_user(user)
            .await?
            .into_iter()
            .any(|p| p.status == PositionStatus::New);
        let open_orders = self
            .projection
            .all_orders()
            .into_iter()
            .any(|o| o.user_id == *user && o.exchange.is_futures());
        if open_positions || open_orders {
            return Err(AccountError::HedgeLocked.into());
        }
        self.ports.hedge.set(user, hedge).await?;
        info!(%user, hedge, "hedge mode updated");
        Ok(())
    }

    // ── Read-side queries for the HTTP surface ───────────────────────

    /// One order by external id and symbol, ownership-checked.
    pub async fn get_order(
        &self,
        user: &UserId,
        external_id: &str,
        symbol: &str,
    ) -> Result<Order, EngineError> {
        let order = self
            .ports
            .orders
            .get(external_id, symbol)
            .await?
            .filter(|o| o.user_id == *user)
            .ok_or_else(|| types::errors::OrderError::NotFound {
                selector: format!("{}/{}", external_id, symbol),
            })?;
        Ok(order)
    }

    /// All of a user's orders (live and terminal) from storage.
    pub async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, EngineError> {
        Ok(self.ports.orders.orders_for_user(user).await?)
    }

    /// A user's live orders from the projection.
    pub fn open_orders_for_user(&self, user: &UserId) -> Vec<Order> {
        self.projection
            .all_orders()
            .into_iter()
            .filter(|o| o.user_id == *user)
            .collect()
    }

    /// A user's open positions.
    pub async fn positions_for_user(&self, user: &UserId) -> Result<Vec<Position>, EngineError> {
        Ok(self
            .ports
            .positions
            .positions_for_user(user)
            .await?
            .into_iter()
            .filter(|p| p.status == PositionStatus::New)
            .collect())
    }

    /// A user's wallet rows.
    pub async fn balances_for_user(&self, user: &UserId) -> Result<Vec<Balance>, EngineError> {
        Ok(self.ports.wallets.balances_for_user(user).await?)
    }

    /// Symbol parameters through the cache.
    pub async fn symbol_info(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<types::symbol::SymbolInfo, EngineError> {
        self.symbols.get(symbol, exchange, self.now()).await
    }

    /// Current price through the cache (tick price or latest-price lookup).
    pub async fn latest_price(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<types::numeric::Price, EngineError> {
        self.symbols.current_price(symbol, exchange, self.now()).await
    }
}
