//! Leverage rows and hedge-mode settings
//!
//! A leverage row is keyed `(user, symbol, side)`. The row is locked while
//! any open position exists for that key; leverage cannot change while
//! locked. In one-way mode the side is `BOTH`.

use crate::ids::UserId;
use crate::position::PositionSide;
use serde::{Deserialize, Serialize};

/// Leverage row for one (user, symbol, side)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverageSetting {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub symbol: String,
    /// None on legacy rows written before sides were recorded; the startup
    /// reconciliation backfills these.
    pub side: Option<PositionSide>,
    pub leverage: u32,
    pub locked: bool,
}

impl LeverageSetting {
    /// Fresh unlocked row at 1x
    pub fn default_for(user_id: UserId, symbol: impl Into<String>, side: PositionSide) -> Self {
        Self {
            user_id,
            symbol: symbol.into(),
            side: Some(side),
            leverage: 1,
            locked: false,
        }
    }
}

/// Hedge-mode flag for a user
///
/// When on, derivatives orders must carry `positionSide ∈ {LONG, SHORT}`
/// and long/short positions live independently; when off, `BOTH` is used
/// and they net into a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgeMode {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub hedge: bool,
}
