//! Order lifecycle types
//!
//! An order is uniquely identified by `(external_id, symbol)` from the
//! client's point of view and by `id` in storage. Only live LIMIT orders
//! (NEW or PARTIALLY_FILLED) are held in the in-memory projection; terminal
//! orders never re-enter it.

use crate::ids::{OrderId, UserId};
use crate::numeric::{Price, Quantity};
use crate::position::PositionSide;
use crate::symbol::Exchange;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    BUY,
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    LIMIT,
    MARKET,
}

/// Order status
///
/// ```text
///            create                fill(remaining)
/// [none] ───────────► NEW ─────────────────────────► FILLED
///                      │   partial(remaining>done)      ▲
///                      │   ──────► PARTIALLY_FILLED ────┘
///                      │                    │
///                      └──► CANCELED / EXPIRED (from NEW or PARTIALLY_FILLED)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Expired,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Expired
        )
    }

    /// Whether an order in this status is eligible for matching
    pub fn is_live(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

/// Complete order record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "externalId")]
    pub external_id: String,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub symbol: String,
    pub exchange: Exchange,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: Price,
    pub amount: Quantity,
    /// `amount × price` at submission
    #[serde(rename = "quoteAmount")]
    pub quote_amount: Decimal,
    #[serde(rename = "filledAmount")]
    pub filled_amount: Quantity,
    #[serde(rename = "filledQuoteAmount")]
    pub filled_quote_amount: Decimal,
    #[serde(rename = "avgFilledPrice")]
    pub avg_filled_price: Decimal,
    pub fee: Decimal,
    #[serde(rename = "feePerc")]
    pub fee_perc: Decimal,
    pub status: OrderStatus,
    #[serde(rename = "reduceOnly")]
    pub reduce_only: bool,
    #[serde(rename = "positionSide")]
    pub position_side: Option<PositionSide>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

impl Order {
    /// Create a new order in status NEW with no fills
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        external_id: String,
        symbol: String,
        exchange: Exchange,
        side: Side,
        order_type: OrderType,
        price: Price,
        amount: Quantity,
        fee_perc: Decimal,
        reduce_only: bool,
        position_side: Option<PositionSide>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: OrderId::new(),
            external_id,
            user_id,
            symbol,
            exchange,
            side,
            order_type,
            price,
            amount,
            quote_amount: amount.notional(price),
            filled_amount: Quantity::zero(),
            filled_quote_amount: Decimal::ZERO,
            avg_filled_price: Decimal::ZERO,
            fee: Decimal::ZERO,
            fee_perc,
            status: OrderStatus::New,
            reduce_only,
            position_side,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Unfilled remainder: `amount − filled_amount`
    pub fn remaining(&self) -> Quantity {
        self.amount - self.filled_amount
    }

    /// Check the fill invariant: `filled_amount ≤ amount`
    ///
    /// The lower bound holds by construction — quantities are never
    /// negative.
    pub fn check_invariant(&self) -> bool {
        self.filled_amount <= self.amount
    }

    /// Record a fill of `fill_amount` at `fill_price`, accumulating fee and
    /// moving to PARTIALLY_FILLED or FILLED.
    ///
    /// # Panics
    /// Panics if the fill would exceed the order amount.
    pub fn record_fill(
        &mut self,
        fill_amount: Quantity,
        fill_price: Price,
        fill_fee: Decimal,
        timestamp: i64,
    ) {
        let new_filled = self.filled_amount + fill_amount;
        assert!(new_filled <= self.amount, "Fill would exceed order amount");

        self.filled_amount = new_filled;
        self.filled_quote_amount += fill_amount.notional(fill_price);
        self.avg_filled_price = if new_filled.is_zero() {
            Decimal::ZERO
        } else {
            self.filled_quote_amount / new_filled.as_decimal()
        };
        self.fee += fill_fee;
        self.status = if self.remaining().is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = timestamp;

        assert!(self.check_invariant(), "Invariant violated after fill");
    }

    /// Cancel or expire the order.
    ///
    /// # Panics
    /// Panics if the order is already in a terminal state.
    pub fn cancel(&mut self, expired: bool, timestamp: i64) {
        assert!(!self.status.is_terminal(), "Cannot cancel terminal order");
        self.status = if expired {
            OrderStatus::Expired
        } else {
            OrderStatus::Canceled
        };
        self.updated_at = timestamp;
    }

    /// Rewrite the order total down to `new_amount` before a fill is
    /// recorded (reduce-only over-fill trim). The notional follows; the
    /// fee for the trimmed excess is simply never charged.
    pub fn clamp_amount(&mut self, new_amount: Quantity, timestamp: i64) {
        assert!(new_amount <= self.amount, "Clamp cannot grow the order");
        assert!(
            self.filled_amount <= new_amount,
            "fills exceed the clamped amount"
        );
        self.amount = new_amount;
        self.quote_amount = new_amount.notional(self.price);
        self.updated_at = timestamp;
    }
}
