//! Per-asset wallet balance rows
//!
//! Invariant: `free + locked` is the user's real holding; `locked` equals
//! the sum of spot limit-order reservations and open-position margins for
//! the corresponding asset.

use crate::ids::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance row for one (user, asset) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl Balance {
    /// Create a balance row holding `free` with nothing locked
    pub fn new(user_id: UserId, asset: impl Into<String>, free: Decimal) -> Self {
        Self {
            user_id,
            asset: asset.into(),
            free,
            locked: Decimal::ZERO,
        }
    }

    /// Check the non-negativity invariant
    pub fn check_invariant(&self) -> bool {
        self.free >= Decimal::ZERO && self.locked >= Decimal::ZERO
    }

    /// Total holding: `free + locked`
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }

    /// Move `amount` from free into locked (order reservation, margin)
    ///
    /// # Panics
    /// Panics if `amount` exceeds `free`.
    pub fn reserve(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "Reserve amount must be non-negative");
        assert!(amount <= self.free, "Insufficient free balance");
        self.free -= amount;
        self.locked += amount;
    }

    /// Move `amount` from locked back into free (cancel, margin return)
    ///
    /// # Panics
    /// Panics if `amount` exceeds `locked`.
    pub fn release(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "Release amount must be non-negative");
        assert!(amount <= self.locked, "Insufficient locked balance");
        self.locked -= amount;
        self.free += amount;
    }

    /// Apply signed deltas to free and locked in one step.
    ///
    /// Used by settlement, where a single transition both consumes a locked
    /// reservation and credits or debits free funds.
    pub fn apply(&mut self, free_delta: Decimal, locked_delta: Decimal) {
        self.free += free_delta;
        self.locked += locked_delta;
    }
}
