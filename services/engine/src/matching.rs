//! Per-tick matching scans
//!
//! For each (symbol, tick) in an exchange batch: liquidations first, then
//! limit-order fills. Liquidations cancel the user's reduce-only orders on
//! the symbol as EXPIRED and submit a synthetic MARKET order at the
//! pre-computed liquidation price. Nothing in this module raises to the
//! ticker pipeline — failures are logged and retried on the next tick.

use tracing::{error, info, warn};
use types::errors::{AccountError, EngineError};
use types::ids::liquidation_external_id;
use types::order::{OrderType, Side};
use types::position::{Position, PositionSide};
use types::symbol::Exchange;
use types::ticker::Ticker;

use crate::engine::Engine;
use crate::lifecycle::{OrderParams, OrderSelector};
use crate::liquidation::{long_triggered, short_triggered};
use crate::locks;

impl Engine {
    /// Liquidation scan, then limit scan, for one symbol on one exchange.
    pub(crate) async fn match_symbol(&self, symbol: &str, exchange: Exchange, tick: &Ticker) {
        self.liquidation_scan(symbol, exchange, tick).await;
        self.limit_scan(symbol, exchange, tick).await;
    }

    /// Liquidate LONG positions whose trigger reaches the best bid
    /// (ascending by liquidation price) and SHORTs whose trigger reaches
    /// the best ask (descending).
    async fn liquidation_scan(&self, symbol: &str, exchange: Exchange, tick: &Ticker) {
        let positions = self.projection.positions_for(symbol, exchange);
        if positions.is_empty() {
            return;
        }

        let mut longs: Vec<Position> = positions
            .iter()
            .filter(|p| {
                p.position_side == PositionSide::LONG
                    && long_triggered(p.liquidation_price, tick.best_bid)
            })
            .cloned()
            .collect();
        longs.sort_by(|a, b| a.liquidation_price.cmp(&b.liquidation_price));

        let mut shorts: Vec<Position> = positions
            .iter()
            .filter(|p| {
                p.position_side == PositionSide::SHORT
                    && short_triggered(p.liquidation_price, tick.best_ask)
            })
            .cloned()
            .collect();
        shorts.sort_by(|a, b| b.liquidation_price.cmp(&a.liquidation_price));

        for position in longs.into_iter().chain(shorts) {
            self.liquidate_position(position).await;
        }
    }

    /// Liquidate one position. Never raises; a failed liquidation is
    /// retried when the next tick fires the trigger again.
    async fn liquidate_position(&self, position: Position) {
        info!(
            uuid = %position.uuid,
            user = %position.user_id,
            symbol = %position.symbol,
            side = ?position.position_side,
            liquidation = %position.liquidation_price,
            "liquidation triggered"
        );

        // Expire the user's reduce-only orders on this (user, symbol).
        for order in self.projection.orders_for(&position.symbol, position.exchange) {
            if order.user_id == position.user_id && order.reduce_only {
                let selector = OrderSelector::External {
                    external_id: order.external_id.clone(),
                    symbol: order.symbol.clone(),
                };
                if let Err(err) = self.cancel_order(None, selector, true).await {
                    warn!(
                        external_id = %order.external_id,
                        %err,
                        "failed to expire reduce-only order during liquidation"
                    );
                }
            }
        }

        let hedge = match self.ports.hedge.get(&position.user_id).await {
            Ok(hedge) => hedge,
            Err(err) => {
                warn!(user = %position.user_id, %err, "hedge lookup failed, assuming one-way");
                false
            }
        };

        let params = OrderParams {
            symbol: position.symbol.clone(),
            exchange: position.exchange,
            side: match position.position_side {
                PositionSide::LONG => Side::SELL,
                _ => Side::BUY,
            },
            order_type: OrderType::MARKET,
            price: None,
            amount: position.position_amt,
            external_id: Some(liquidation_external_id()),
            reduce_only: true,
            position_side: Some(if hedge {
                position.position_side
            } else {
                PositionSide::BOTH
            }),
        };

        // Per-position CreateOrder key: the Ticker-held frame must never
        // wait on a create key it could itself hold.
        let guard = self
            .locks
            .acquire(&locks::liquidation_order_key(&position.uuid))
            .await;
        let result = self
            .submit_order(position.user_id, params, Some(position.liquidation_price))
            .await;
        drop(guard);

        match result {
            Ok(order) => {
                info!(
                    uuid = %position.uuid,
                    external_id = %order.external_id,
                    price = %position.liquidation_price,
                    "position liquidated"
                );
            }
            Err(err) => {
                error!(uuid = %position.uuid, %err, "liquidation order failed");
                if matches!(err, EngineError::Account(AccountError::UserNotFound)) {
                    self.force_close_position(position).await;
                }
            }
        }
    }

    /// Last-resort close when the owning user record is gone: mark the
    /// position CLOSED in storage and drop it from the projection.
    async fn force_close_position(&self, mut position: Position) {
        let now = self.now();
        position.close(
            position.liquidation_price,
            rust_decimal::Decimal::ZERO,
            rust_decimal::Decimal::ZERO,
            now,
        );
        if let Err(err) = self.ports.positions.update(&position).await {
            error!(uuid = %position.uuid, %err, "force-close persist failed");
        }
        self.projection.remove_position(&position.symbol, &position.uuid);
        self.watch_remove(
            &position.symbol,
            position.exchange,
            &position.uuid.to_string(),
        )
        .await;
        warn!(uuid = %position.uuid, "position force-closed without settlement");
    }

    /// Fill live limit orders crossed by the tick: SELLs at or below the
    /// best bid (ascending by price), then BUYs at or above the best ask
    /// (descending). Spot candidates additionally require quoted size on
    /// the touched side. Same-price orders process in projection iteration
    /// order, which is not part of the user-observable contract.
    async fn limit_scan(&self, symbol: &str, exchange: Exchange, tick: &Ticker) {
        let is_spot = exchange.is_spot();
        let orders = self.projection.orders_for(symbol, exchange);
        if orders.is_empty() {
            return;
        }

        let mut sells: Vec<_> = orders
            .iter()
            .filter(|o| {
                o.side == Side::SELL
                    && o.status.is_live()
                    && o.price <= tick.best_bid
                    && (!is_spot || !tick.best_bid_qnt.is_zero())
            })
            .cloned()
            .collect();
        sells.sort_by(|a, b| a.price.cmp(&b.price));

        let mut buys: Vec<_> = orders
            .iter()
            .filter(|o| {
                o.side == Side::BUY
                    && o.status.is_live()
                    && o.price >= tick.best_ask
                    && (!is_spot || !tick.best_ask_qnt.is_zero())
            })
            .cloned()
            .collect();
        buys.sort_by(|a, b| b.price.cmp(&a.price));

        for order in sells.into_iter().chain(buys) {
            if let Err(err) = self
                .fill_limit_order(symbol, &order.external_id, tick)
                .await
            {
                warn!(
                    external_id = %order.external_id,
                    symbol,
                    %err,
                    "limit fill failed"
                );
            }
        }
    }
}
