//! Order lifecycle: create, cancel, fill
//!
//! `create_order` is serialized per (key, secret, symbol, exchange);
//! cancel and the limit-fill path per external id. Every path re-fetches
//! records from the projection after acquiring its lock — the projection
//! may have changed across any await.

use rust_decimal::Decimal;
use tracing::{debug, info};
use types::errors::{AccountError, EngineError, OrderError};
use types::fee::{fee_rate, FeeRole};
use types::ids::{OrderId, UserId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderType, Side};
use types::position::PositionSide;
use types::symbol::{Exchange, MarketClass, SymbolInfo};
use types::ticker::Ticker;
use uuid::Uuid;

use crate::engine::Engine;
use crate::liquidation::margin_required;
use crate::locks;

/// Client-supplied order parameters (credentials stripped).
#[derive(Debug, Clone)]
pub struct OrderParams {
    pub symbol: String,
    pub exchange: Exchange,
    pub side: Side,
    pub order_type: OrderType,
    /// Required for LIMIT orders; ignored for MARKET.
    pub price: Option<Price>,
    pub amount: Quantity,
    /// Client order id; generated when absent.
    pub external_id: Option<String>,
    pub reduce_only: bool,
    pub position_side: Option<PositionSide>,
}

/// How a caller identifies an order.
#[derive(Debug, Clone)]
pub enum OrderSelector {
    External { external_id: String, symbol: String },
    ById(OrderId),
}

impl Engine {
    // ── createOrder ──────────────────────────────────────────────────

    /// Authenticate and submit an order.
    ///
    /// Serialized for identical (key, secret, symbol, exchange) tuples.
    pub async fn create_order(
        &self,
        key: &str,
        secret: &str,
        params: OrderParams,
    ) -> Result<Order, EngineError> {
        let user = self.authenticate(key, secret).await?;
        let _guard = self
            .locks
            .acquire(&locks::create_order_key(
                key,
                secret,
                &params.symbol,
                params.exchange,
            ))
            .await;
        self.submit_order(user, params, None).await
    }

    /// Core submission path, shared by HTTP orders and synthetic
    /// liquidation orders. The caller holds a CreateOrder-tier lock.
    ///
    /// `exec_price_override` forces the execution price of a MARKET order
    /// (liquidations execute at the pre-computed liquidation price).
    pub(crate) async fn submit_order(
        &self,
        user: UserId,
        params: OrderParams,
        exec_price_override: Option<Price>,
    ) -> Result<Order, EngineError> {
        let now = self.now();
        let info = self.symbols.get(&params.symbol, params.exchange, now).await?;
        let class = params.exchange.class();
        let is_futures = params.exchange.is_futures();

        self.validate_amount(&params, &info, class)?;

        if self.projection.order_count_for_user(&user, &params.symbol)
            >= info.max_orders as usize
        {
            return Err(OrderError::TooManyOrders {
                max: info.max_orders,
            }
            .into());
        }

        // Hedge mode and the effective position side recorded on the order:
        // LONG/SHORT in hedge mode, BOTH in one-way, None on spot.
        let mut order_position_side = None;
        if is_futures {
            let hedge = self.ports.hedge.get(&user).await?;
            let side = if hedge {
                match params.position_side {
                    Some(side @ (PositionSide::LONG | PositionSide::SHORT)) => side,
                    _ => return Err(AccountError::HedgeModeViolation.into()),
                }
            } else {
                PositionSide::BOTH
            };
            order_position_side = Some(side);
            self.ensure_leverage(&user, &params.symbol, side).await?;
        }

        // Effective type: marketable limits are promoted to MARKET at the
        // current price.
        let (effective_type, used_price) = match params.order_type {
            OrderType::MARKET => {
                let exec = match exec_price_override {
                    Some(price) => price,
                    None => {
                        self.symbols
                            .current_price(&params.symbol, params.exchange, now)
                            .await?
                    }
                };
                (OrderType::MARKET, exec)
            }
            OrderType::LIMIT => {
                let price = params.price.ok_or_else(|| {
                    EngineError::from(OrderError::InvalidPrice(
                        "limit order requires a price".to_string(),
                    ))
                })?;
                let current = self
                    .symbols
                    .current_price(&params.symbol, params.exchange, now)
                    .await?;
                let marketable = match params.side {
                    Side::BUY => price > current,
                    Side::SELL => price < current,
                };
                if marketable {
                    debug!(
                        symbol = %params.symbol,
                        limit = %price,
                        current = %current,
                        "promoting marketable limit to market"
                    );
                    (OrderType::MARKET, current)
                } else {
                    (OrderType::LIMIT, price)
                }
            }
        };

        let fee_perc = fee_rate(
            class,
            if effective_type == OrderType::MARKET {
                FeeRole::Taker
            } else {
                FeeRole::Maker
            },
        );

        // Existing position targeted by this order: pinned to the order's
        // side in hedge mode, the single netted position otherwise.
        let target = if is_futures {
            let selector = match order_position_side {
                Some(side @ (PositionSide::LONG | PositionSide::SHORT)) => Some(side),
                _ => None,
            };
            self.projection
                .position_for_user(&user, &params.symbol, params.exchange, selector)
        } else {
            None
        };
        let same_direction = target
            .as_ref()
            .map(|p| p.position_side == PositionSide::from_order_side(params.side));

        if is_futures && params.reduce_only && same_direction != Some(false) {
            return Err(OrderError::ReduceRejected.into());
        }

        self.check_balance(
            &user,
            &params,
            &info,
            class,
            used_price,
            target.as_ref(),
            same_direction,
        )
        .await?;

        let external_id = params
            .external_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut order = Order::new(
            user,
            external_id,
            params.symbol.clone(),
            params.exchange,
            params.side,
            effective_type,
            used_price,
            params.amount,
            fee_perc,
            params.reduce_only,
            order_position_side,
            now,
        );

        // Claim (externalId, symbol) uniqueness before any balance moves.
        self.ports.orders.insert(&order).await.map_err(|err| match err {
            types::errors::StorageError::Duplicate(_) => {
                EngineError::from(OrderError::DuplicateExternalId)
            }
            other => EngineError::from(other),
        })?;

        match effective_type {
            OrderType::MARKET => {
                if class == MarketClass::Spot {
                    self.apply_spot_market(&mut order, &info).await?;
                } else {
                    self.apply_futures_fill(&mut order, &info, used_price, params.amount)
                        .await?;
                }
                self.ports.orders.update(&order).await?;
                info!(
                    external_id = %order.external_id,
                    symbol = %order.symbol,
                    side = ?order.side,
                    price = %used_price,
                    amount = %order.amount,
                    "market order settled"
                );
                self.emit_order_event(&order).await;
                self.emit_account_event(&user).await;
            }
            OrderType::LIMIT => {
                // Spot limit orders reserve their notional up front.
                if class == MarketClass::Spot {
                    let (asset, reservation) = match order.side {
                        Side::BUY => (info.quote_asset.name.clone(), order.quote_amount),
                        Side::SELL => (info.base_asset.name.clone(), order.amount.as_decimal()),
                    };
                    self.ports
                        .wallets
                        .apply(&user, &asset, -reservation, reservation)
                        .await?;
                }
                self.projection.put_order(order.clone());
                self.watch_add(&order.symbol, order.exchange, &order.external_id)
                    .await;
                info!(
                    external_id = %order.external_id,
                    symbol = %order.symbol,
                    side = ?order.side,
                    price = %order.price,
                    amount = %order.amount,
                    "limit order booked"
                );
                self.emit_order_event(&order).await;
                self.emit_account_event(&user).await;
            }
        }

        Ok(order)
    }

    fn validate_amount(
        &self,
        params: &OrderParams,
        info: &SymbolInfo,
        class: MarketClass,
    ) -> Result<(), EngineError> {
        let min = match class {
            MarketClass::Inverse => Decimal::ONE,
            _ => info.base_asset.min_amount,
        };
        if params.amount.as_decimal() < min {
            return Err(OrderError::InvalidAmount(format!(
                "amount {} below minimum {}",
                params.amount, min
            ))
            .into());
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn check_balance(
        &self,
        user: &UserId,
        params: &OrderParams,
        info: &SymbolInfo,
        class: MarketClass,
        used_price: Price,
        target: Option<&types::position::Position>,
        same_direction: Option<bool>,
    ) -> Result<(), EngineError> {
        let (asset, required) = match class {
            MarketClass::Spot => match params.side {
                Side::BUY => (
                    info.quote_asset.name.clone(),
                    params.amount.notional(used_price),
                ),
                Side::SELL => (info.base_asset.name.clone(), params.amount.as_decimal()),
            },
            _ => {
                if params.reduce_only {
                    return Ok(());
                }
                let leverage = match target {
                    Some(pos) => pos.leverage,
                    None => {
                        let side = match params.position_side {
                            Some(side @ (PositionSide::LONG | PositionSide::SHORT)) => side,
                            _ => PositionSide::BOTH,
                        };
                        self.ensure_leverage(user, &params.symbol, side).await?.leverage
                    }
                };
                let required = match (target, same_direction) {
                    (Some(pos), Some(false)) => {
                        // Closing side: margin only for the flipped excess.
                        if params.amount.as_decimal() > pos.position_amt.as_decimal() {
                            let excess = params.amount - pos.position_amt;
                            margin_required(class, excess, used_price, leverage, info.contract_size())
                        } else {
                            Decimal::ZERO
                        }
                    }
                    _ => margin_required(
                        class,
                        params.amount,
                        used_price,
                        leverage,
                        info.contract_size(),
                    ),
                };
                (info.margin_asset().to_string(), required)
            }
        };

        if required == Decimal::ZERO {
            return Ok(());
        }
        let balance = self.balance(user, &asset).await?;
        if balance.free < required {
            return Err(AccountError::InsufficientBalance {
                asset,
                required: required.to_string(),
                available: balance.free.to_string(),
            }
            .into());
        }
        Ok(())
    }

    // ── cancelOrder ──────────────────────────────────────────────────

    /// Cancel (or expire) a live order, releasing any spot reservation.
    ///
    /// `user = None` is the internal path (liquidation expiry); external
    /// callers always pass the authenticated user.
    pub async fn cancel_order(
        &self,
        user: Option<UserId>,
        selector: OrderSelector,
        expired: bool,
    ) -> Result<Order, EngineError> {
        let (external_id, symbol) = match selector {
            OrderSelector::External {
                external_id,
                symbol,
            } => (external_id, symbol),
            OrderSelector::ById(id) => {
                let order = match self.projection.get_order_by_id(&id) {
                    Some(order) => order,
                    None => self
                        .ports
                        .orders
                        .get_by_id(&id)
                        .await?
                        .ok_or_else(|| OrderError::NotFound {
                            selector: id.to_string(),
                        })?,
                };
                (order.external_id, order.symbol)
            }
        };

        let _guard = self
            .locks
            .acquire(&locks::update_order_key(&external_id))
            .await;

        let mut order = match self.projection.get_order(&symbol, &external_id) {
            Some(order) => order,
            None => {
                // Not live: answer with the terminal status if we have it.
                let stored = self.ports.orders.get(&external_id, &symbol).await?;
                return match stored {
                    Some(order) if order.status.is_terminal() => {
                        Err(OrderError::AlreadyTerminal {
                            status: format!("{:?}", order.status),
                        }
                        .into())
                    }
                    _ => Err(OrderError::NotFound {
                        selector: format!("{}/{}", external_id, symbol),
                    }
                    .into()),
                };
            }
        };

        if let Some(user) = user {
            if order.user_id != user {
                return Err(OrderError::NotFound {
                    selector: format!("{}/{}", external_id, symbol),
                }
                .into());
            }
        }

        let now = self.now();
        order.cancel(expired, now);

        // Release the unfilled spot reservation.
        let mut released = false;
        if order.exchange.is_spot() && order.order_type == OrderType::LIMIT {
            let info = self.symbols.get(&symbol, order.exchange, now).await?;
            let (asset, residual) = match order.side {
                Side::BUY => (
                    info.quote_asset.name.clone(),
                    order.quote_amount - order.filled_quote_amount,
                ),
                Side::SELL => (
                    info.base_asset.name.clone(),
                    (order.amount - order.filled_amount).as_decimal(),
                ),
            };
            if residual > Decimal::ZERO {
                self.ports
                    .wallets
                    .apply(&order.user_id, &asset, residual, -residual)
                    .await?;
                released = true;
            }
        }

        self.ports.orders.update(&order).await?;
        self.projection.remove_order(&symbol, &external_id);
        self.watch_remove(&symbol, order.exchange, &external_id).await;

        info!(
            external_id = %order.external_id,
            symbol = %order.symbol,
            status = ?order.status,
            "order canceled"
        );
        self.emit_order_event(&order).await;
        if released {
            self.emit_account_event(&order.user_id).await;
        }
        Ok(order)
    }

    // ── Limit-order fill path ────────────────────────────────────────

    /// Fill one live limit order against a tick. Serialized per external
    /// id with cancelation; the order is re-read under the lock and may
    /// legitimately be gone.
    pub(crate) async fn fill_limit_order(
        &self,
        symbol: &str,
        external_id: &str,
        tick: &Ticker,
    ) -> Result<(), EngineError> {
        let _guard = self
            .locks
            .acquire(&locks::update_order_key(external_id))
            .await;

        let mut order = match self.projection.get_order(symbol, external_id) {
            Some(order) => order,
            None => return Ok(()),
        };
        if !order.status.is_live() {
            return Ok(());
        }

        let now = self.now();
        let info = self.symbols.get(symbol, order.exchange, now).await?;
        let class = order.exchange.class();

        // Re-check the cross against this tick.
        let (crossed, touched_price, touched_size) = match order.side {
            Side::SELL => (
                order.price <= tick.best_bid,
                tick.best_bid,
                tick.best_bid_qnt,
            ),
            Side::BUY => (
                order.price >= tick.best_ask,
                tick.best_ask,
                tick.best_ask_qnt,
            ),
        };
        if !crossed {
            return Ok(());
        }

        let remaining = order.remaining();
        let fill = if class == MarketClass::Spot {
            if touched_size.is_zero() {
                return Ok(());
            }
            let strictly_better = match order.side {
                Side::SELL => order.price < touched_price,
                Side::BUY => order.price > touched_price,
            };
            if strictly_better {
                remaining
            } else {
                remaining.min(touched_size)
            }
        } else {
            remaining
        };
        if fill.is_zero() {
            return Ok(());
        }

        if class == MarketClass::Spot {
            self.apply_spot_limit_fill(&mut order, &info, fill).await?;
        } else {
            let limit_price = order.price;
            self.apply_futures_fill(&mut order, &info, limit_price, fill)
                .await?;
        }

        self.ports.orders.update(&order).await?;
        if order.status.is_terminal() {
            self.projection.remove_order(symbol, external_id);
            self.watch_remove(symbol, order.exchange, external_id).await;
        } else {
            self.projection.put_order(order.clone());
        }

        info!(
            external_id = %order.external_id,
            symbol = %order.symbol,
            status = ?order.status,
            filled = %order.filled_amount,
            "limit order fill"
        );
        self.emit_order_event(&order).await;
        self.emit_account_event(&order.user_id).await;
        Ok(())
    }
}
