//! Margin, fee, PnL and liquidation-price formulas
//!
//! Deterministic Decimal computations shared by settlement and the
//! liquidation scan. Linear contracts margin and settle in the quote
//! asset; inverse contracts count in contracts of `contract_size` quote
//! units and margin/settle in the base asset.

use rust_decimal::Decimal;
use types::numeric::{NumericError, Price, Quantity};
use types::position::PositionSide;
use types::symbol::MarketClass;

/// Initial margin for a derivatives fill.
///
/// Linear: `amount × price / leverage`
/// Inverse: `amount × contract_size / price / leverage`
pub fn margin_required(
    class: MarketClass,
    amount: Quantity,
    price: Price,
    leverage: u32,
    contract_size: Decimal,
) -> Decimal {
    assert!(leverage >= 1, "Leverage must be >= 1");
    let leverage = Decimal::from(leverage);
    match class {
        MarketClass::Inverse => {
            amount.as_decimal() * contract_size / price.as_decimal() / leverage
        }
        _ => amount.as_decimal() * price.as_decimal() / leverage,
    }
}

/// Fee charged on a derivatives fill, in the margin asset.
///
/// Linear: `amount × price × fee_perc` (quote asset)
/// Inverse: `(amount × contract_size / price) × fee_perc` (base asset)
pub fn derivatives_fee(
    class: MarketClass,
    amount: Quantity,
    price: Price,
    fee_perc: Decimal,
    contract_size: Decimal,
) -> Decimal {
    match class {
        MarketClass::Inverse => {
            amount.as_decimal() * contract_size / price.as_decimal() * fee_perc
        }
        _ => amount.as_decimal() * price.as_decimal() * fee_perc,
    }
}

/// Gross realized PnL (before fee) on closing `amount` of a position.
///
/// Linear: `(amount × close − amount × entry) × dir`
/// Inverse: `(amount × cs / entry − amount × cs / close) × dir`
pub fn realized_pnl(
    class: MarketClass,
    side: PositionSide,
    amount: Quantity,
    entry: Price,
    close: Price,
    contract_size: Decimal,
) -> Decimal {
    let dir = side.dir();
    let amount = amount.as_decimal();
    match class {
        MarketClass::Inverse => {
            let notional = amount * contract_size;
            (notional / entry.as_decimal() - notional / close.as_decimal()) * dir
        }
        _ => (amount * close.as_decimal() - amount * entry.as_decimal()) * dir,
    }
}

/// Liquidation price, derived once at open and again on same-direction
/// increases.
///
/// For `leverage > 1`: `entry × (1 + s/leverage) × (1 + fee_perc × s)`
/// with `s = −1` for LONG and `+1` for SHORT.
///
/// For `leverage = 1` the formula degenerates: `entry × fee_perc` for
/// LONG (a near-zero floor) and `entry / fee_perc` for SHORT. Both
/// branches stay positive for valid inputs; the `Err` arm only fires on
/// degenerate fee rates.
pub fn liquidation_price(
    entry: Price,
    side: PositionSide,
    fee_perc: Decimal,
    leverage: u32,
) -> Result<Price, NumericError> {
    assert!(leverage >= 1, "Leverage must be >= 1");
    let s = -side.dir();
    let entry = entry.as_decimal();

    let value = if leverage > 1 {
        let lev_term = Decimal::ONE + s / Decimal::from(leverage);
        let fee_term = Decimal::ONE + fee_perc * s;
        entry * lev_term * fee_term
    } else {
        match side {
            PositionSide::SHORT => entry / fee_perc,
            _ => entry * fee_perc,
        }
    };

    Price::new(value)
}

/// Liquidation trigger for a LONG: `liquidation_price ≥ bestBid`.
pub fn long_triggered(liquidation: Price, best_bid: Price) -> bool {
    liquidation >= best_bid
}

/// Liquidation trigger for a SHORT: `liquidation_price ≤ bestAsk`.
pub fn short_triggered(liquidation: Price, best_ask: Price) -> bool {
    liquidation <= best_ask
}

/// Whether closing `fill` of a position of size `position_amt` leaves a
/// remainder below the representable precision, closing it entirely.
///
/// Linear: remainder below the base asset's minimum amount.
/// Inverse: remainder below one contract.
pub fn closes_entirely(
    class: MarketClass,
    position_amt: Quantity,
    fill: Quantity,
    base_min_amount: Decimal,
) -> bool {
    if fill.as_decimal() >= position_amt.as_decimal() {
        return true;
    }
    let remainder = position_amt.as_decimal() - fill.as_decimal();
    let threshold = match class {
        MarketClass::Inverse => Decimal::ONE,
        _ => base_min_amount,
    };
    remainder < threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    fn qty(s: &str) -> Quantity {
        Quantity::from_str(s).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // ── margin_required ──

    #[test]
    fn test_linear_margin() {
        // 0.01 BTC @ 50000, 10x → 50 USDT
        let m = margin_required(
            MarketClass::Linear,
            qty("0.01"),
            Price::from_u64(50_000),
            10,
            Decimal::ZERO,
        );
        assert_eq!(m, Decimal::from(50));
    }

    #[test]
    fn test_inverse_margin() {
        // 100 contracts × 10 USD @ 50000, 10x → 0.002 BTC
        let m = margin_required(
            MarketClass::Inverse,
            qty("100"),
            Price::from_u64(50_000),
            10,
            Decimal::from(10),
        );
        assert_eq!(m, dec("0.002"));
    }

    // ── derivatives_fee ──

    #[test]
    fn test_linear_fee() {
        // 0.01 @ 50000 × 0.0004 → 0.2 USDT
        let fee = derivatives_fee(
            MarketClass::Linear,
            qty("0.01"),
            Price::from_u64(50_000),
            dec("0.0004"),
            Decimal::ZERO,
        );
        assert_eq!(fee, dec("0.2"));
    }

    #[test]
    fn test_inverse_fee() {
        // (100 × 10 / 50000) × 0.0005 → 0.00001 BTC
        let fee = derivatives_fee(
            MarketClass::Inverse,
            qty("100"),
            Price::from_u64(50_000),
            dec("0.0005"),
            Decimal::from(10),
        );
        assert_eq!(fee, dec("0.00001"));
    }

    // ── realized_pnl ──

    #[test]
    fn test_linear_pnl_long() {
        // LONG 0.01 from 50000 to 55000 → +50
        let pnl = realized_pnl(
            MarketClass::Linear,
            PositionSide::LONG,
            qty("0.01"),
            Price::from_u64(50_000),
            Price::from_u64(55_000),
            Decimal::ZERO,
        );
        assert_eq!(pnl, Decimal::from(50));
    }

    #[test]
    fn test_linear_pnl_short() {
        // SHORT 0.01 from 50000 to 55000 → −50
        let pnl = realized_pnl(
            MarketClass::Linear,
            PositionSide::SHORT,
            qty("0.01"),
            Price::from_u64(50_000),
            Price::from_u64(55_000),
            Decimal::ZERO,
        );
        assert_eq!(pnl, Decimal::from(-50));
    }

    #[test]
    fn test_inverse_pnl_long() {
        // LONG 100 contracts × 10 USD, 40000 → 50000
        // 1000/40000 − 1000/50000 = 0.025 − 0.02 = 0.005 BTC
        let pnl = realized_pnl(
            MarketClass::Inverse,
            PositionSide::LONG,
            qty("100"),
            Price::from_u64(40_000),
            Price::from_u64(50_000),
            Decimal::from(10),
        );
        assert_eq!(pnl, dec("0.005"));
    }

    // ── liquidation_price ──

    #[test]
    fn test_liquidation_price_long_10x() {
        // 50000 × (1 − 0.1) × (1 − 0.0004) = 44982.0
        let lp = liquidation_price(Price::from_u64(50_000), PositionSide::LONG, dec("0.0004"), 10)
            .unwrap();
        assert_eq!(lp.as_decimal(), dec("44982.0000"));
    }

    #[test]
    fn test_liquidation_price_short_10x() {
        // 50000 × (1 + 0.1) × (1 + 0.0004) = 55022.0
        let lp = liquidation_price(Price::from_u64(50_000), PositionSide::SHORT, dec("0.0004"), 10)
            .unwrap();
        assert_eq!(lp.as_decimal(), dec("55022.0000"));
    }

    #[test]
    fn test_liquidation_price_leverage_one() {
        let long = liquidation_price(Price::from_u64(50_000), PositionSide::LONG, dec("0.0004"), 1)
            .unwrap();
        assert_eq!(long.as_decimal(), Decimal::from(20));

        let short =
            liquidation_price(Price::from_u64(50_000), PositionSide::SHORT, dec("0.0004"), 1)
                .unwrap();
        assert_eq!(short.as_decimal(), Decimal::from(125_000_000));
    }

    // ── triggers ──

    #[test]
    fn test_triggers() {
        assert!(long_triggered(Price::from_u64(44_982), Price::from_u64(44_980)));
        assert!(!long_triggered(Price::from_u64(44_982), Price::from_u64(45_000)));
        assert!(short_triggered(Price::from_u64(55_022), Price::from_u64(55_030)));
        assert!(!short_triggered(Price::from_u64(55_022), Price::from_u64(55_000)));
    }

    // ── closes_entirely ──

    #[test]
    fn test_close_threshold_linear() {
        let min = dec("0.001");
        // Remainder 0.0005 < 0.001 → full close
        assert!(closes_entirely(MarketClass::Linear, qty("0.01"), qty("0.0095"), min));
        // Remainder 0.002 ≥ 0.001 → partial
        assert!(!closes_entirely(MarketClass::Linear, qty("0.01"), qty("0.008"), min));
        // Exact consume
        assert!(closes_entirely(MarketClass::Linear, qty("0.01"), qty("0.01"), min));
    }

    #[test]
    fn test_close_threshold_inverse() {
        // Remainder 0.5 contracts < 1 → full close
        assert!(closes_entirely(
            MarketClass::Inverse,
            qty("10"),
            qty("9.5"),
            Decimal::ZERO
        ));
        assert!(!closes_entirely(
            MarketClass::Inverse,
            qty("10"),
            qty("8"),
            Decimal::ZERO
        ));
    }
}
