//! Settlement: balance and position transitions
//!
//! Write order on every path: persist the order/position transition, then
//! update balances (atomic per wallet row), then emit events. Push
//! emission is best-effort and happens in the callers.
//!
//! Derivatives settlement distinguishes six cases against the user's
//! existing position: open, increase, full close, flip, reduce-only trim
//! (which collapses into a full close) and partial reduce.

use rust_decimal::Decimal;
use tracing::{debug, info};
use types::errors::{EngineError, OrderError};
use types::numeric::{Price, Quantity};
use types::order::{Order, Side};
use types::position::{Position, PositionSide};
use types::symbol::{MarketClass, SymbolInfo};

use crate::engine::Engine;
use crate::liquidation::{
    closes_entirely, derivatives_fee, liquidation_price, margin_required, realized_pnl,
};
use crate::locks;

impl Engine {
    // ── Spot ─────────────────────────────────────────────────────────

    /// Immediate settlement of a spot MARKET order at its recorded price.
    ///
    /// BUY: debit quote by `amount × price`, credit base by
    /// `amount − fee` with the fee in base units. SELL: debit base by
    /// `amount`, credit quote by `amount × price − fee` with the fee in
    /// quote units.
    pub(crate) async fn apply_spot_market(
        &self,
        order: &mut Order,
        info: &SymbolInfo,
    ) -> Result<(), EngineError> {
        let now = self.now();
        let user = order.user_id;
        let amount = order.amount;
        let price = order.price;

        match order.side {
            Side::BUY => {
                let fee = amount.as_decimal() * order.fee_perc;
                self.ports
                    .wallets
                    .apply(&user, &info.quote_asset.name, -amount.notional(price), Decimal::ZERO)
                    .await?;
                self.ports
                    .wallets
                    .apply(&user, &info.base_asset.name, amount.as_decimal() - fee, Decimal::ZERO)
                    .await?;
                order.record_fill(amount, price, fee, now);
            }
            Side::SELL => {
                let fee = amount.notional(price) * order.fee_perc;
                self.ports
                    .wallets
                    .apply(&user, &info.base_asset.name, -amount.as_decimal(), Decimal::ZERO)
                    .await?;
                self.ports
                    .wallets
                    .apply(
                        &user,
                        &info.quote_asset.name,
                        amount.notional(price) - fee,
                        Decimal::ZERO,
                    )
                    .await?;
                order.record_fill(amount, price, fee, now);
            }
        }
        Ok(())
    }

    /// Settlement of a spot LIMIT fill (partial or full) at the order
    /// price, consuming the reservation made at registration.
    pub(crate) async fn apply_spot_limit_fill(
        &self,
        order: &mut Order,
        info: &SymbolInfo,
        fill: Quantity,
    ) -> Result<(), EngineError> {
        let now = self.now();
        let user = order.user_id;
        let price = order.price;

        match order.side {
            Side::BUY => {
                let fee = fill.as_decimal() * order.fee_perc;
                self.ports
                    .wallets
                    .apply(&user, &info.quote_asset.name, Decimal::ZERO, -fill.notional(price))
                    .await?;
                self.ports
                    .wallets
                    .apply(&user, &info.base_asset.name, fill.as_decimal() - fee, Decimal::ZERO)
                    .await?;
                order.record_fill(fill, price, fee, now);
            }
            Side::SELL => {
                let fee = fill.notional(price) * order.fee_perc;
                self.ports
                    .wallets
                    .apply(&user, &info.base_asset.name, Decimal::ZERO, -fill.as_decimal())
                    .await?;
                self.ports
                    .wallets
                    .apply(
                        &user,
                        &info.quote_asset.name,
                        fill.notional(price) - fee,
                        Decimal::ZERO,
                    )
                    .await?;
                order.record_fill(fill, price, fee, now);
            }
        }
        Ok(())
    }

    // ── Derivatives ──────────────────────────────────────────────────

    /// Settlement of a derivatives fill of `fill_amount` at `fill_price`.
    ///
    /// Locates the user's position pinned to the order's position side
    /// (hedge mode) or the single netted position (one-way), then applies
    /// the matching transition. Position-touching branches hold the
    /// position's Common lock and re-read it, restarting the case analysis
    /// if it vanished across the await.
    pub(crate) async fn apply_futures_fill(
        &self,
        order: &mut Order,
        info: &SymbolInfo,
        fill_price: Price,
        fill_amount: Quantity,
    ) -> Result<(), EngineError> {
        let class = order.exchange.class();
        let contract_size = info.contract_size();
        let margin_asset = info.margin_asset().to_string();
        let user = order.user_id;
        let order_dir = PositionSide::from_order_side(order.side);
        let lev_side = order.position_side.unwrap_or(PositionSide::BOTH);
        let selector = match order.position_side {
            Some(side @ (PositionSide::LONG | PositionSide::SHORT)) => Some(side),
            _ => None,
        };

        loop {
            let snapshot = self.projection.position_for_user(
                &user,
                &order.symbol,
                order.exchange,
                selector,
            );

            let Some(snapshot) = snapshot else {
                if order.reduce_only {
                    return Err(OrderError::ReduceRejected.into());
                }
                self.open_position(
                    order,
                    info,
                    class,
                    &margin_asset,
                    order_dir,
                    lev_side,
                    fill_price,
                    fill_amount,
                )
                .await?;
                return Ok(());
            };

            let _guard = self.locks.acquire(&locks::position_key(&snapshot.uuid)).await;
            let Some(mut pos) = self.projection.get_position(&order.symbol, &snapshot.uuid)
            else {
                // Closed while we waited (e.g. liquidation); re-evaluate.
                continue;
            };

            let now = self.now();

            if pos.position_side == order_dir {
                // Same direction: grow the position at its own leverage.
                let leverage = pos.leverage;
                let added_margin =
                    margin_required(class, fill_amount, fill_price, leverage, contract_size);
                let fee =
                    derivatives_fee(class, fill_amount, fill_price, order.fee_perc, contract_size);
                let new_amt = pos.position_amt + fill_amount;
                let new_entry = Price::new(
                    (pos.position_amt.notional(pos.entry_price)
                        + fill_amount.notional(fill_price))
                        / new_amt.as_decimal(),
                )?;
                let new_liq =
                    liquidation_price(new_entry, pos.position_side, order.fee_perc, leverage)?;

                pos.increase(fill_amount, added_margin, fee, new_entry, new_liq, now);
                self.ports.positions.update(&pos).await?;
                self.ports
                    .wallets
                    .apply(&user, &margin_asset, -(added_margin + fee), added_margin)
                    .await?;
                self.projection.put_position(pos.clone());
                order.record_fill(fill_amount, fill_price, fee, now);
                debug!(uuid = %pos.uuid, amount = %pos.position_amt, "position increased");
                self.emit_position_event(&pos).await;
                return Ok(());
            }

            // Opposite direction. A reduce-only over-fill is trimmed in
            // place to the position size; the trimmed excess is never
            // charged, which leaves the order fee proportional.
            let mut fill = fill_amount;
            if order.reduce_only && fill > pos.position_amt {
                fill = pos.position_amt;
                order.clamp_amount(fill, now);
                debug!(
                    external_id = %order.external_id,
                    trimmed_to = %fill,
                    "reduce-only order trimmed to position size"
                );
            }

            if fill > pos.position_amt {
                self.flip_position(
                    order,
                    info,
                    class,
                    &margin_asset,
                    &mut pos,
                    order_dir,
                    lev_side,
                    fill_price,
                    fill,
                )
                .await?;
            } else if closes_entirely(class, pos.position_amt, fill, info.base_asset.min_amount) {
                self.close_position(
                    order,
                    class,
                    contract_size,
                    &margin_asset,
                    &mut pos,
                    lev_side,
                    fill_price,
                    fill,
                )
                .await?;
            } else {
                // Partial reduce: release margin valued at the fill price
                // and realize PnL on the reduced slice.
                let released =
                    margin_required(class, fill, fill_price, pos.leverage, contract_size);
                let fee = derivatives_fee(class, fill, fill_price, order.fee_perc, contract_size);
                let pnl = realized_pnl(
                    class,
                    pos.position_side,
                    fill,
                    pos.entry_price,
                    fill_price,
                    contract_size,
                ) - fee;

                pos.reduce(fill, released, pnl, fee, now);
                self.ports.positions.update(&pos).await?;
                self.ports
                    .wallets
                    .apply(&user, &margin_asset, released + pnl, -released)
                    .await?;
                self.projection.put_position(pos.clone());
                order.record_fill(fill, fill_price, fee, now);
                debug!(uuid = %pos.uuid, amount = %pos.position_amt, "position reduced");
                self.emit_position_event(&pos).await;
            }
            return Ok(());
        }
    }

    /// Case 1: no prior position — open one in the order's direction.
    #[allow(clippy::too_many_arguments)]
    async fn open_position(
        &self,
        order: &mut Order,
        info: &SymbolInfo,
        class: MarketClass,
        margin_asset: &str,
        order_dir: PositionSide,
        lev_side: PositionSide,
        fill_price: Price,
        fill_amount: Quantity,
    ) -> Result<(), EngineError> {
        let now = self.now();
        let user = order.user_id;
        let contract_size = info.contract_size();

        let leverage = self
            .ensure_leverage(&user, &order.symbol, lev_side)
            .await?
            .leverage;
        let margin = margin_required(class, fill_amount, fill_price, leverage, contract_size);
        let fee = derivatives_fee(class, fill_amount, fill_price, order.fee_perc, contract_size);
        let liq = liquidation_price(fill_price, order_dir, order.fee_perc, leverage)?;

        let position = Position::open(
            user,
            order.symbol.clone(),
            order.exchange,
            order_dir,
            fill_amount,
            fill_price,
            margin,
            liq,
            leverage,
            fee,
            now,
        );

        self.ports.positions.insert(&position).await?;
        self.ports
            .wallets
            .apply(&user, margin_asset, -(margin + fee), margin)
            .await?;
        self.lock_leverage(&user, &order.symbol, lev_side, leverage).await?;
        self.projection.put_position(position.clone());
        self.watch_add(&order.symbol, order.exchange, &position.uuid.to_string())
            .await;
        order.record_fill(fill_amount, fill_price, fee, now);

        info!(
            uuid = %position.uuid,
            symbol = %position.symbol,
            side = ?position.position_side,
            amount = %position.position_amt,
            entry = %position.entry_price,
            liquidation = %position.liquidation_price,
            "position opened"
        );
        self.emit_position_event(&position).await;
        Ok(())
    }

    /// Case 3 (and the tail of case 5): consume the whole position.
    #[allow(clippy::too_many_arguments)]
    async fn close_position(
        &self,
        order: &mut Order,
        class: MarketClass,
        contract_size: Decimal,
        margin_asset: &str,
        pos: &mut Position,
        lev_side: PositionSide,
        fill_price: Price,
        fill: Quantity,
    ) -> Result<(), EngineError> {
        let now = self.now();
        let user = order.user_id;

        let fee = derivatives_fee(class, fill, fill_price, order.fee_perc, contract_size);
        let pnl = realized_pnl(
            class,
            pos.position_side,
            pos.position_amt,
            pos.entry_price,
            fill_price,
            contract_size,
        ) - fee;
        let margin = pos.margin;

        pos.close(fill_price, pnl, fee, now);
        self.ports.positions.update(pos).await?;
        self.ports
            .wallets
            .apply(&user, margin_asset, margin + pnl, -margin)
            .await?;
        self.unlock_leverage(&user, &order.symbol, lev_side).await?;
        self.projection.remove_position(&order.symbol, &pos.uuid);
        self.watch_remove(&order.symbol, order.exchange, &pos.uuid.to_string())
            .await;
        order.record_fill(fill, fill_price, fee, now);

        info!(
            uuid = %pos.uuid,
            symbol = %pos.symbol,
            close_price = %fill_price,
            pnl = %pnl,
            "position closed"
        );
        self.emit_position_event(pos).await;
        Ok(())
    }

    /// Case 4: closing side exceeds the position — close the old leg and
    /// open the remainder on the opposite side. The old leg's margin is
    /// unwound at its own entry price and leverage.
    #[allow(clippy::too_many_arguments)]
    async fn flip_position(
        &self,
        order: &mut Order,
        info: &SymbolInfo,
        class: MarketClass,
        margin_asset: &str,
        pos: &mut Position,
        order_dir: PositionSide,
        lev_side: PositionSide,
        fill_price: Price,
        fill: Quantity,
    ) -> Result<(), EngineError> {
        let now = self.now();
        let user = order.user_id;
        let contract_size = info.contract_size();

        let total_fee = derivatives_fee(class, fill, fill_price, order.fee_perc, contract_size);
        let closing_fee =
            derivatives_fee(class, pos.position_amt, fill_price, order.fee_perc, contract_size);
        let diff_margin = margin_required(
            class,
            pos.position_amt,
            pos.entry_price,
            pos.leverage,
            contract_size,
        );
        let pnl = realized_pnl(
            class,
            pos.position_side,
            pos.position_amt,
            pos.entry_price,
            fill_price,
            contract_size,
        ) - closing_fee;
        let old_margin = pos.margin;
        let remainder = fill - pos.position_amt;

        pos.close(fill_price, pnl, closing_fee, now);
        self.ports.positions.update(pos).await?;
        self.ports
            .wallets
            .apply(&user, margin_asset, old_margin + pnl, -old_margin)
            .await?;
        self.unlock_leverage(&user, &order.symbol, lev_side).await?;
        self.projection.remove_position(&order.symbol, &pos.uuid);
        self.watch_remove(&order.symbol, order.exchange, &pos.uuid.to_string())
            .await;
        self.emit_position_event(pos).await;

        // Open the remainder on the opposite side at current leverage.
        let leverage = self
            .ensure_leverage(&user, &order.symbol, lev_side)
            .await?
            .leverage;
        let total_margin = margin_required(class, fill, fill_price, leverage, contract_size);
        let new_margin = total_margin - diff_margin;
        let new_fee = total_fee - closing_fee;
        let liq = liquidation_price(fill_price, order_dir, order.fee_perc, leverage)?;

        let new_pos = Position::open(
            user,
            order.symbol.clone(),
            order.exchange,
            order_dir,
            remainder,
            fill_price,
            new_margin,
            liq,
            leverage,
            new_fee,
            now,
        );
        self.ports.positions.insert(&new_pos).await?;
        self.ports
            .wallets
            .apply(&user, margin_asset, -(new_margin + new_fee), new_margin)
            .await?;
        self.lock_leverage(&user, &order.symbol, lev_side, leverage).await?;
        self.projection.put_position(new_pos.clone());
        self.watch_add(&order.symbol, order.exchange, &new_pos.uuid.to_string())
            .await;
        order.record_fill(fill, fill_price, total_fee, now);

        info!(
            closed = %pos.uuid,
            opened = %new_pos.uuid,
            symbol = %pos.symbol,
            remainder = %remainder,
            "position flipped"
        );
        self.emit_position_event(&new_pos).await;
        Ok(())
    }
}
