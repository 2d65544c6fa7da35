//! Compiled-in fee rates
//!
//! Maker rates per market class, with taker derived as a class-specific
//! multiple. Note the spot asymmetry: taker lookups on spot venues return
//! the maker rate — kept for compatibility with the upstream venue
//! simulator.

use crate::symbol::MarketClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Role of the order in the trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeRole {
    /// Resting limit order
    Maker,
    /// Market order (or marketable limit promoted to market)
    Taker,
}

/// Spot maker fee: 0.1%
pub fn spot_maker_fee() -> Decimal {
    Decimal::from_str_exact("0.001").unwrap()
}

/// Linear (USD-margined) futures maker fee: 0.02%
pub fn usdm_maker_fee() -> Decimal {
    Decimal::from_str_exact("0.0002").unwrap()
}

/// Inverse (coin-margined) futures maker fee: 0.01%
pub fn coinm_maker_fee() -> Decimal {
    Decimal::from_str_exact("0.0001").unwrap()
}

/// Fee rate for a market class and role.
///
/// Taker multiples: spot ×1 (the historical asymmetry), linear ×2,
/// inverse ×5.
pub fn fee_rate(class: MarketClass, role: FeeRole) -> Decimal {
    match (class, role) {
        (MarketClass::Spot, _) => spot_maker_fee(),
        (MarketClass::Linear, FeeRole::Maker) => usdm_maker_fee(),
        (MarketClass::Linear, FeeRole::Taker) => usdm_maker_fee() * Decimal::TWO,
        (MarketClass::Inverse, FeeRole::Maker) => coinm_maker_fee(),
        (MarketClass::Inverse, FeeRole::Taker) => coinm_maker_fee() * Decimal::from(5),
    }
}
