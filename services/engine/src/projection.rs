//! In-memory projection of open orders and positions
//!
//! Two mappings form the primary index for matching: open limit orders by
//! `(symbol → externalId → Order)` and open positions by
//! `(symbol → uuid → Position)`. Reads return defensive copies; writes
//! replace whole records. Removal happens atomically with the transition
//! to a terminal status, so terminal records never re-enter.

use dashmap::DashMap;
use std::collections::HashMap;
use types::ids::{OrderId, PositionId, UserId};
use types::order::Order;
use types::position::{Position, PositionSide};
use types::symbol::Exchange;

/// Process-local projection of live state.
pub struct Projection {
    orders: DashMap<String, HashMap<String, Order>>,
    positions: DashMap<String, HashMap<PositionId, Position>>,
}

impl Projection {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            positions: DashMap::new(),
        }
    }

    // ── Orders ───────────────────────────────────────────────────────

    /// Defensive copy of one order.
    pub fn get_order(&self, symbol: &str, external_id: &str) -> Option<Order> {
        self.orders
            .get(symbol)
            .and_then(|by_id| by_id.get(external_id).cloned())
    }

    /// Linear scan by storage id.
    pub fn get_order_by_id(&self, id: &OrderId) -> Option<Order> {
        for entry in self.orders.iter() {
            if let Some(order) = entry.value().values().find(|o| o.id == *id) {
                return Some(order.clone());
            }
        }
        None
    }

    /// Insert or replace a whole order record.
    pub fn put_order(&self, order: Order) {
        self.orders
            .entry(order.symbol.clone())
            .or_default()
            .insert(order.external_id.clone(), order);
    }

    /// Remove an order, returning the removed record.
    pub fn remove_order(&self, symbol: &str, external_id: &str) -> Option<Order> {
        let removed = self
            .orders
            .get_mut(symbol)
            .and_then(|mut by_id| by_id.remove(external_id));
        self.orders.remove_if(symbol, |_, by_id| by_id.is_empty());
        removed
    }

    /// Live orders for one symbol on one exchange.
    pub fn orders_for(&self, symbol: &str, exchange: Exchange) -> Vec<Order> {
        self.orders
            .get(symbol)
            .map(|by_id| {
                by_id
                    .values()
                    .filter(|o| o.exchange == exchange)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All live orders across symbols.
    pub fn all_orders(&self) -> Vec<Order> {
        self.orders
            .iter()
            .flat_map(|entry| entry.value().values().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Count of one user's live orders on a symbol.
    pub fn order_count_for_user(&self, user: &UserId, symbol: &str) -> usize {
        self.orders
            .get(symbol)
            .map(|by_id| by_id.values().filter(|o| o.user_id == *user).count())
            .unwrap_or(0)
    }

    // ── Positions ────────────────────────────────────────────────────

    /// Defensive copy of one position.
    pub fn get_position(&self, symbol: &str, uuid: &PositionId) -> Option<Position> {
        self.positions
            .get(symbol)
            .and_then(|by_id| by_id.get(uuid).cloned())
    }

    /// Insert or replace a whole position record.
    pub fn put_position(&self, position: Position) {
        self.positions
            .entry(position.symbol.clone())
            .or_default()
            .insert(position.uuid, position);
    }

    /// Remove a position, returning the removed record.
    pub fn remove_position(&self, symbol: &str, uuid: &PositionId) -> Option<Position> {
        let removed = self
            .positions
            .get_mut(symbol)
            .and_then(|mut by_id| by_id.remove(uuid));
        self.positions.remove_if(symbol, |_, by_id| by_id.is_empty());
        removed
    }

    /// Live positions for one symbol on one exchange.
    pub fn positions_for(&self, symbol: &str, exchange: Exchange) -> Vec<Position> {
        self.positions
            .get(symbol)
            .map(|by_id| {
                by_id
                    .values()
                    .filter(|p| p.exchange == exchange)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A user's position on (symbol, exchange), optionally pinned to a side.
    ///
    /// With `side = None` (one-way mode) the single netted position is
    /// returned regardless of direction.
    pub fn position_for_user(
        &self,
        user: &UserId,
        symbol: &str,
        exchange: Exchange,
        side: Option<PositionSide>,
    ) -> Option<Position> {
        self.positions.get(symbol).and_then(|by_id| {
            by_id
                .values()
                .find(|p| {
                    p.user_id == *user
                        && p.exchange == exchange
                        && side.map_or(true, |s| p.position_side == s)
                })
                .cloned()
        })
    }

    /// A user's live positions on a symbol across exchanges.
    pub fn positions_for_user_symbol(&self, user: &UserId, symbol: &str) -> Vec<Position> {
        self.positions
            .get(symbol)
            .map(|by_id| {
                by_id
                    .values()
                    .filter(|p| p.user_id == *user)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All live positions across symbols.
    pub fn all_positions(&self) -> Vec<Position> {
        self.positions
            .iter()
            .flat_map(|entry| entry.value().values().cloned().collect::<Vec<_>>())
            .collect()
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;
    use rust_decimal::Decimal;
    use types::numeric::{Price, Quantity};
    use types::order::{OrderType, Side};

    fn make_order(external_id: &str, symbol: &str, exchange: Exchange) -> Order {
        Order::new(
            UserId::new(),
            external_id.to_string(),
            symbol.to_string(),
            exchange,
            Side::BUY,
            OrderType::LIMIT,
            Price::from_u64(50_000),
            Quantity::from_str("0.1").unwrap(),
            Decimal::from_str("0.001").unwrap(),
            false,
            None,
            0,
        )
    }

    fn make_position(symbol: &str, exchange: Exchange) -> Position {
        Position::open(
            UserId::new(),
            symbol.to_string(),
            exchange,
            PositionSide::LONG,
            Quantity::from_str("0.01").unwrap(),
            Price::from_u64(50_000),
            Decimal::from(50),
            Price::from_u64(44_982),
            10,
            Decimal::ZERO,
            0,
        )
    }

    #[test]
    fn test_order_put_get_remove() {
        let projection = Projection::new();
        let order = make_order("a", "BTCUSDT", Exchange::Binance);
        projection.put_order(order.clone());

        let fetched = projection.get_order("BTCUSDT", "a").unwrap();
        assert_eq!(fetched, order);

        let removed = projection.remove_order("BTCUSDT", "a").unwrap();
        assert_eq!(removed.external_id, "a");
        assert!(projection.get_order("BTCUSDT", "a").is_none());
    }

    #[test]
    fn test_reads_are_defensive_copies() {
        let projection = Projection::new();
        projection.put_order(make_order("a", "BTCUSDT", Exchange::Binance));

        let mut copy = projection.get_order("BTCUSDT", "a").unwrap();
        copy.external_id = "mutated".to_string();
        assert!(projection.get_order("BTCUSDT", "a").is_some());
    }

    #[test]
    fn test_get_order_by_id() {
        let projection = Projection::new();
        let order = make_order("a", "BTCUSDT", Exchange::Binance);
        let id = order.id;
        projection.put_order(order);
        projection.put_order(make_order("b", "ETHUSDT", Exchange::Binance));

        assert_eq!(projection.get_order_by_id(&id).unwrap().external_id, "a");
        assert!(projection.get_order_by_id(&OrderId::new()).is_none());
    }

    #[test]
    fn test_orders_for_filters_exchange() {
        let projection = Projection::new();
        projection.put_order(make_order("a", "BTCUSDT", Exchange::Binance));
        projection.put_order(make_order("b", "BTCUSDT", Exchange::Kucoin));

        let binance = projection.orders_for("BTCUSDT", Exchange::Binance);
        assert_eq!(binance.len(), 1);
        assert_eq!(binance[0].external_id, "a");
    }

    #[test]
    fn test_position_for_user_side_selector() {
        let projection = Projection::new();
        let pos = make_position("BTCUSDT", Exchange::BinanceUsdm);
        let user = pos.user_id;
        projection.put_position(pos.clone());

        // Side-pinned lookup (hedge mode)
        assert!(projection
            .position_for_user(&user, "BTCUSDT", Exchange::BinanceUsdm, Some(PositionSide::LONG))
            .is_some());
        assert!(projection
            .position_for_user(&user, "BTCUSDT", Exchange::BinanceUsdm, Some(PositionSide::SHORT))
            .is_none());
        // Netted lookup (one-way mode)
        assert!(projection
            .position_for_user(&user, "BTCUSDT", Exchange::BinanceUsdm, None)
            .is_some());
    }

    #[test]
    fn test_remove_prunes_empty_symbol_entry() {
        let projection = Projection::new();
        let pos = make_position("BTCUSDT", Exchange::BinanceUsdm);
        let uuid = pos.uuid;
        projection.put_position(pos);

        projection.remove_position("BTCUSDT", &uuid);
        assert!(projection.all_positions().is_empty());
        assert!(projection.positions_for("BTCUSDT", Exchange::BinanceUsdm).is_empty());
    }

    #[test]
    fn test_order_count_for_user() {
        let projection = Projection::new();
        let order = make_order("a", "BTCUSDT", Exchange::Binance);
        let user = order.user_id;
        projection.put_order(order);
        projection.put_order(make_order("b", "BTCUSDT", Exchange::Binance));

        assert_eq!(projection.order_count_for_user(&user, "BTCUSDT"), 1);
    }
}
