//! Derivatives position types
//!
//! A position is owned by the projection while `status == New`. Positions
//! always carry a LONG or SHORT direction; `BOTH` appears only on orders
//! and leverage rows in one-way mode, where long and short net into a
//! single position per (user, symbol, exchange).

use crate::ids::{PositionId, UserId};
use crate::numeric::{Price, Quantity};
use crate::symbol::Exchange;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    LONG,
    SHORT,
    /// One-way (netted) mode marker, used on orders and leverage rows
    BOTH,
}

impl PositionSide {
    /// PnL direction: +1 for LONG, −1 for SHORT
    ///
    /// Zero for BOTH, which never appears on an open position.
    pub fn dir(&self) -> Decimal {
        match self {
            PositionSide::LONG => Decimal::ONE,
            PositionSide::SHORT => -Decimal::ONE,
            PositionSide::BOTH => Decimal::ZERO,
        }
    }

    /// The position direction opened by an order side
    pub fn from_order_side(side: crate::order::Side) -> Self {
        match side {
            crate::order::Side::BUY => PositionSide::LONG,
            crate::order::Side::SELL => PositionSide::SHORT,
        }
    }
}

/// Position status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    New,
    Closed,
}

/// Derivatives position record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub uuid: PositionId,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub symbol: String,
    pub exchange: Exchange,
    #[serde(rename = "positionSide")]
    pub position_side: PositionSide,
    #[serde(rename = "positionAmt")]
    pub position_amt: Quantity,
    #[serde(rename = "entryPrice")]
    pub entry_price: Price,
    pub margin: Decimal,
    #[serde(rename = "liquidationPrice")]
    pub liquidation_price: Price,
    pub leverage: u32,
    pub profit: Decimal,
    pub fee: Decimal,
    pub status: PositionStatus,
    #[serde(rename = "closePrice")]
    pub close_price: Option<Price>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

impl Position {
    /// Open a new position
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        user_id: UserId,
        symbol: String,
        exchange: Exchange,
        position_side: PositionSide,
        position_amt: Quantity,
        entry_price: Price,
        margin: Decimal,
        liquidation_price: Price,
        leverage: u32,
        open_fee: Decimal,
        timestamp: i64,
    ) -> Self {
        assert!(
            matches!(position_side, PositionSide::LONG | PositionSide::SHORT),
            "Open positions must be LONG or SHORT"
        );
        Self {
            uuid: PositionId::new(),
            user_id,
            symbol,
            exchange,
            position_side,
            position_amt,
            entry_price,
            margin,
            liquidation_price,
            leverage,
            profit: -open_fee,
            fee: open_fee,
            status: PositionStatus::New,
            close_price: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Invariants for a live position: positive size and margin
    pub fn check_invariant(&self) -> bool {
        match self.status {
            PositionStatus::New => {
                self.position_amt.as_decimal() > Decimal::ZERO && self.margin > Decimal::ZERO
            }
            PositionStatus::Closed => self.margin == Decimal::ZERO,
        }
    }

    /// Grow the position in its own direction (weighted entry price,
    /// recomputed liquidation price supplied by the caller).
    pub fn increase(
        &mut self,
        amount: Quantity,
        added_margin: Decimal,
        fee: Decimal,
        new_entry: Price,
        new_liquidation_price: Price,
        timestamp: i64,
    ) {
        self.position_amt = self.position_amt + amount;
        self.entry_price = new_entry;
        self.margin += added_margin;
        self.liquidation_price = new_liquidation_price;
        self.profit -= fee;
        self.fee += fee;
        self.updated_at = timestamp;
    }

    /// Shrink the position without closing it, realizing `pnl` on the
    /// reduced slice and returning `released_margin` to the caller.
    pub fn reduce(
        &mut self,
        amount: Quantity,
        released_margin: Decimal,
        pnl: Decimal,
        fee: Decimal,
        timestamp: i64,
    ) {
        self.position_amt = self.position_amt - amount;
        self.margin -= released_margin;
        self.profit += pnl;
        self.fee += fee;
        self.updated_at = timestamp;
    }

    /// Close the position at `close_price`, realizing `pnl`.
    pub fn close(&mut self, close_price: Price, pnl: Decimal, fee: Decimal, timestamp: i64) {
        self.status = PositionStatus::Closed;
        self.close_price = Some(close_price);
        self.profit += pnl;
        self.fee += fee;
        self.margin = Decimal::ZERO;
        self.updated_at = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    fn make_position() -> Position {
        Position::open(
            UserId::new(),
            "BTCUSDT".to_string(),
            Exchange::BinanceUsdm,
            PositionSide::LONG,
            Quantity::from_str("0.01").unwrap(),
            Price::from_u64(50_000),
            Decimal::from(50),
            Price::from_str("44982").unwrap(),
            10,
            Decimal::from_str("0.2").unwrap(),
            1_708_123_456_789,
        )
    }

    #[test]
    fn test_open_position() {
        let pos = make_position();
        assert_eq!(pos.status, PositionStatus::New);
        assert_eq!(pos.profit, Decimal::from_str("-0.2").unwrap());
        assert_eq!(pos.fee, Decimal::from_str("0.2").unwrap());
        assert!(pos.check_invariant());
    }

    #[test]
    #[should_panic(expected = "Open positions must be LONG or SHORT")]
    fn test_open_both_panics() {
        Position::open(
            UserId::new(),
            "BTCUSDT".to_string(),
            Exchange::BinanceUsdm,
            PositionSide::BOTH,
            Quantity::from_str("0.01").unwrap(),
            Price::from_u64(50_000),
            Decimal::from(50),
            Price::from_u64(44_982),
            10,
            Decimal::ZERO,
            0,
        );
    }

    #[test]
    fn test_direction() {
        assert_eq!(PositionSide::LONG.dir(), Decimal::ONE);
        assert_eq!(PositionSide::SHORT.dir(), -Decimal::ONE);
    }

    #[test]
    fn test_from_order_side() {
        assert_eq!(
            PositionSide::from_order_side(crate::order::Side::BUY),
            PositionSide::LONG
        );
        assert_eq!(
            PositionSide::from_order_side(crate::order::Side::SELL),
            PositionSide::SHORT
        );
    }

    #[test]
    fn test_increase() {
        let mut pos = make_position();
        pos.increase(
            Quantity::from_str("0.01").unwrap(),
            Decimal::from(52),
            Decimal::from_str("0.208").unwrap(),
            Price::from_u64(51_000),
            Price::from_str("45881.64").unwrap(),
            2,
        );
        assert_eq!(pos.position_amt.as_decimal(), Decimal::from_str("0.02").unwrap());
        assert_eq!(pos.entry_price, Price::from_u64(51_000));
        assert_eq!(pos.margin, Decimal::from(102));
        assert!(pos.check_invariant());
    }

    #[test]
    fn test_close_zeroes_margin() {
        let mut pos = make_position();
        pos.close(
            Price::from_u64(55_000),
            Decimal::from(50),
            Decimal::from_str("0.22").unwrap(),
            2,
        );
        assert_eq!(pos.status, PositionStatus::Closed);
        assert_eq!(pos.margin, Decimal::ZERO);
        assert_eq!(pos.close_price, Some(Price::from_u64(55_000)));
        assert!(pos.check_invariant());
    }

    #[test]
    fn test_reduce() {
        let mut pos = make_position();
        pos.reduce(
            Quantity::from_str("0.004").unwrap(),
            Decimal::from(20),
            Decimal::from(4),
            Decimal::from_str("0.1").unwrap(),
            2,
        );
        assert_eq!(pos.position_amt.as_decimal(), Decimal::from_str("0.006").unwrap());
        assert_eq!(pos.margin, Decimal::from(30));
        assert!(pos.check_invariant());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let pos = make_position();
        let json = serde_json::to_string(&pos).unwrap();
        let back: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(pos, back);
    }
}
