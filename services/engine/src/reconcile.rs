//! Startup reconciliation
//!
//! Rebuilds the projection and watch set from storage, recomputes the
//! locked balance every wallet row should carry from open spot orders and
//! open positions, corrects drift in place, and backfills leverage rows
//! written before sides were recorded. On healthy state the whole pass is
//! a no-op.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, warn};
use types::errors::EngineError;
use types::ids::UserId;
use types::leverage::LeverageSetting;
use types::order::Side;
use types::position::PositionSide;
use types::symbol::stream_key;

use crate::engine::Engine;

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub orders_restored: usize,
    pub positions_restored: usize,
    pub streams_subscribed: usize,
    pub wallets_corrected: usize,
    pub wallets_reset: usize,
    pub leverage_backfilled: usize,
}

impl Engine {
    /// Run the startup reconciliation pass.
    pub async fn reconcile(&self) -> Result<ReconcileReport, EngineError> {
        let now = self.now();
        let mut report = ReconcileReport::default();

        // 1. Rebuild the projection and watch set, subscribing once per
        //    stream.
        let orders = self.ports.orders.open_limit_orders().await?;
        for order in &orders {
            self.projection.put_order(order.clone());
            self.watch.add(
                &stream_key(&order.symbol, order.exchange),
                &order.external_id,
            );
        }
        report.orders_restored = orders.len();

        let positions = self.ports.positions.open_positions().await?;
        for position in &positions {
            self.projection.put_position(position.clone());
            self.watch.add(
                &stream_key(&position.symbol, position.exchange),
                position.uuid.to_string(),
            );
        }
        report.positions_restored = positions.len();

        for key in self.watch.keys() {
            let channel = format!("trade@{}", key);
            if let Err(err) = self.ports.feed.subscribe(&channel).await {
                warn!(%channel, %err, "startup subscribe failed; feed owner will retry");
            }
            report.streams_subscribed += 1;
        }

        // 2. Recompute expected locked per (user, asset): residual spot
        //    reservations plus open-position margins.
        let mut expected: HashMap<(UserId, String), Decimal> = HashMap::new();
        for order in &orders {
            if !order.exchange.is_spot() {
                continue;
            }
            let info = match self.symbols.get(&order.symbol, order.exchange, now).await {
                Ok(info) => info,
                Err(err) => {
                    warn!(symbol = %order.symbol, %err, "symbol lookup failed during reconcile");
                    continue;
                }
            };
            match order.side {
                Side::BUY => {
                    *expected
                        .entry((order.user_id, info.quote_asset.name.clone()))
                        .or_default() += order.quote_amount - order.filled_quote_amount;
                }
                Side::SELL => {
                    *expected
                        .entry((order.user_id, info.base_asset.name.clone()))
                        .or_default() += (order.amount - order.filled_amount).as_decimal();
                }
            }
        }
        for position in &positions {
            let info = match self
                .symbols
                .get(&position.symbol, position.exchange, now)
                .await
            {
                Ok(info) => info,
                Err(err) => {
                    warn!(symbol = %position.symbol, %err, "symbol lookup failed during reconcile");
                    continue;
                }
            };
            *expected
                .entry((position.user_id, info.margin_asset().to_string()))
                .or_default() += position.margin;
        }

        // 3. Correct drift between stored and expected locked balances.
        for wallet in self.ports.wallets.all().await? {
            let key = (wallet.user_id, wallet.asset.clone());
            let expected_locked = expected.get(&key).copied().unwrap_or(Decimal::ZERO);
            if wallet.locked == expected_locked {
                continue;
            }

            let mut fixed = wallet.clone();
            if expected_locked == Decimal::ZERO {
                // Orphaned lock with nothing referencing it: fold into free.
                warn!(
                    user = %wallet.user_id,
                    asset = %wallet.asset,
                    locked = %wallet.locked,
                    "orphaned locked balance reset"
                );
                fixed.free += wallet.locked.max(Decimal::ZERO);
                fixed.locked = Decimal::ZERO;
                self.ports.wallets.put(&fixed).await?;
                report.wallets_reset += 1;
            } else {
                let diff = wallet.locked - expected_locked;
                warn!(
                    user = %wallet.user_id,
                    asset = %wallet.asset,
                    stored = %wallet.locked,
                    expected = %expected_locked,
                    "locked balance drift corrected"
                );
                fixed.free += diff;
                fixed.locked = expected_locked;
                self.ports.wallets.put(&fixed).await?;
                report.wallets_corrected += 1;
            }
        }

        // 4. Backfill leverage rows missing a side.
        for row in self.ports.leverage.all().await? {
            if !row.locked || row.side.is_some() {
                continue;
            }
            let open: Vec<_> = positions
                .iter()
                .filter(|p| p.user_id == row.user_id && p.symbol == row.symbol)
                .collect();
            let hedge = self.ports.hedge.get(&row.user_id).await.unwrap_or(false);

            self.ports
                .leverage
                .remove(&row.user_id, &row.symbol, None)
                .await?;
            if hedge && open.len() == 2 {
                for side in [PositionSide::LONG, PositionSide::SHORT] {
                    self.ports
                        .leverage
                        .put(&LeverageSetting {
                            user_id: row.user_id,
                            symbol: row.symbol.clone(),
                            side: Some(side),
                            leverage: row.leverage,
                            locked: true,
                        })
                        .await?;
                }
            } else {
                let side = match open.first() {
                    Some(position) if open.len() == 1 => position.position_side,
                    _ => PositionSide::BOTH,
                };
                self.ports
                    .leverage
                    .put(&LeverageSetting {
                        user_id: row.user_id,
                        symbol: row.symbol.clone(),
                        side: Some(side),
                        leverage: row.leverage,
                        locked: true,
                    })
                    .await?;
            }
            report.leverage_backfilled += 1;
        }

        info!(
            orders = report.orders_restored,
            positions = report.positions_restored,
            streams = report.streams_subscribed,
            corrected = report.wallets_corrected,
            reset = report.wallets_reset,
            backfilled = report.leverage_backfilled,
            "reconciliation complete"
        );
        Ok(report)
    }
}
