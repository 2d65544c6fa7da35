//! End-to-end scenarios against the in-memory reference ports.

use std::sync::Arc;

use engine::memory::MemoryEnv;
use engine::ports::{LeverageStore, OrderStore, PositionStore, WalletStore};
use engine::{Engine, EngineConfig, OrderParams, OrderSelector};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use types::errors::{AccountError, EngineError, OrderError};
use types::numeric::{Price, Quantity};
use types::order::{OrderStatus, OrderType, Side};
use types::position::{PositionSide, PositionStatus};
use types::symbol::{BaseAsset, Exchange, QuoteAsset, SymbolInfo};
use types::ticker::Ticker;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn qty(s: &str) -> Quantity {
    Quantity::from_str(s).unwrap()
}

fn price(s: &str) -> Price {
    Price::from_str(s).unwrap()
}

fn btc_symbol(exchange: Exchange) -> SymbolInfo {
    SymbolInfo {
        pair: "BTCUSDT".to_string(),
        exchange,
        base_asset: BaseAsset {
            name: "BTC".to_string(),
            min_amount: dec("0.0001"),
            step: dec("0.0001"),
        },
        quote_asset: QuoteAsset {
            name: "USDT".to_string(),
            // Contract size for the inverse venue.
            min_amount: Decimal::from(10),
        },
        price_asset_precision: 2,
        max_orders: 200,
    }
}

struct Venue {
    env: MemoryEnv,
    engine: Arc<Engine>,
}

fn venue_with(exchanges: &[Exchange]) -> Venue {
    let env = MemoryEnv::new();
    for exchange in exchanges {
        env.symbols.put_symbol(btc_symbol(*exchange));
        env.symbols
            .put_price("BTCUSDT", *exchange, Price::from_u64(50_000));
    }
    let engine = Arc::new(Engine::new(env.ports(), EngineConfig::default()));
    Venue { env, engine }
}

fn tick(exchange: Exchange, bid: &str, bid_qty: &str, ask: &str, ask_qty: &str) -> Ticker {
    Ticker {
        symbol: "BTCUSDT".to_string(),
        exchange,
        best_ask: price(ask),
        best_bid: price(bid),
        best_ask_qnt: qty(ask_qty),
        best_bid_qnt: qty(bid_qty),
        price: price(ask),
        time: chrono::Utc::now().timestamp_millis(),
        event_time: None,
    }
}

fn limit(exchange: Exchange, side: Side, amount: &str, at: &str) -> OrderParams {
    OrderParams {
        symbol: "BTCUSDT".to_string(),
        exchange,
        side,
        order_type: OrderType::LIMIT,
        price: Some(price(at)),
        amount: qty(amount),
        external_id: None,
        reduce_only: false,
        position_side: None,
    }
}

fn market(exchange: Exchange, side: Side, amount: &str) -> OrderParams {
    OrderParams {
        symbol: "BTCUSDT".to_string(),
        exchange,
        side,
        order_type: OrderType::MARKET,
        price: None,
        amount: qty(amount),
        external_id: None,
        reduce_only: false,
        position_side: None,
    }
}

async fn balance(venue: &Venue, user: &types::ids::UserId, asset: &str) -> (Decimal, Decimal) {
    venue
        .engine
        .balances_for_user(user)
        .await
        .unwrap()
        .into_iter()
        .find(|b| b.asset == asset)
        .map(|b| (b.free, b.locked))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO))
}

// ── Scenario 1 + 2: spot limit order books, then fills on a tick ─────

#[tokio::test]
async fn spot_limit_buy_reserves_then_fills() {
    let venue = venue_with(&[Exchange::Binance]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(10_000));

    let order = venue
        .engine
        .create_order("k", "s", limit(Exchange::Binance, Side::BUY, "0.1", "50000"))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.order_type, OrderType::LIMIT);

    // Reservation: 0.1 × 50000 moved from free to locked.
    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, Decimal::from(5_000));
    assert_eq!(locked, Decimal::from(5_000));
    let (btc_free, btc_locked) = balance(&venue, &user, "BTC").await;
    assert_eq!(btc_free, Decimal::ZERO);
    assert_eq!(btc_locked, Decimal::ZERO);

    // Live in the projection, watched, subscribed.
    assert!(venue.engine.watch().has("BTCUSDT@binance"));
    assert!(venue.env.feed.is_subscribed("trade@BTCUSDT@binance"));

    // Ask touches the order price with enough size.
    venue
        .engine
        .handle_tick(tick(Exchange::Binance, "49999", "0.5", "50000", "0.2"))
        .await;

    let stored = venue.env.orders.get(&order.external_id, "BTCUSDT").await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Filled);
    assert_eq!(stored.fee, dec("0.0001"));

    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, Decimal::from(5_000));
    assert_eq!(locked, Decimal::ZERO);
    let (btc_free, _) = balance(&venue, &user, "BTC").await;
    assert_eq!(btc_free, dec("0.0999"));

    // Filled order left the projection and the stream was dropped.
    assert!(venue.engine.projection().get_order("BTCUSDT", &order.external_id).is_none());
    assert!(!venue.engine.watch().has("BTCUSDT@binance"));
    assert!(!venue.env.feed.is_subscribed("trade@BTCUSDT@binance"));
}

#[tokio::test]
async fn spot_partial_fill_at_touched_size() {
    let venue = venue_with(&[Exchange::Binance]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(10_000));

    let order = venue
        .engine
        .create_order("k", "s", limit(Exchange::Binance, Side::BUY, "0.1", "50000"))
        .await
        .unwrap();

    // Only 0.04 quoted at the touch: partial fill.
    venue
        .engine
        .handle_tick(tick(Exchange::Binance, "49999", "0.5", "50000", "0.04"))
        .await;

    let live = venue
        .engine
        .projection()
        .get_order("BTCUSDT", &order.external_id)
        .unwrap();
    assert_eq!(live.status, OrderStatus::PartiallyFilled);
    assert_eq!(live.filled_amount, qty("0.04"));

    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, Decimal::from(5_000));
    assert_eq!(locked, Decimal::from(3_000)); // 5000 − 0.04 × 50000
}

// ── Cancel round-trip ────────────────────────────────────────────────

#[tokio::test]
async fn cancel_restores_reservation_and_is_terminal() {
    let venue = venue_with(&[Exchange::Binance]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(10_000));

    let order = venue
        .engine
        .create_order("k", "s", limit(Exchange::Binance, Side::BUY, "0.1", "49000"))
        .await
        .unwrap();

    let selector = OrderSelector::External {
        external_id: order.external_id.clone(),
        symbol: "BTCUSDT".to_string(),
    };
    let canceled = venue
        .engine
        .cancel_order(Some(user), selector.clone(), false)
        .await
        .unwrap();
    assert_eq!(canceled.status, OrderStatus::Canceled);

    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, Decimal::from(10_000));
    assert_eq!(locked, Decimal::ZERO);

    // Second cancel: terminal.
    let err = venue
        .engine
        .cancel_order(Some(user), selector, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Order(OrderError::AlreadyTerminal { .. })
    ));
}

// ── Marketable-limit promotion ───────────────────────────────────────

#[tokio::test]
async fn marketable_limit_executes_as_market_at_current_price() {
    let venue = venue_with(&[Exchange::Binance]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(10_000));

    // BUY above the current price (50000): promoted and executed at 50000.
    let order = venue
        .engine
        .create_order("k", "s", limit(Exchange::Binance, Side::BUY, "0.1", "51000"))
        .await
        .unwrap();
    assert_eq!(order.order_type, OrderType::MARKET);
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.price, Price::from_u64(50_000));

    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, Decimal::from(5_000));
    assert_eq!(locked, Decimal::ZERO);
    let (btc_free, _) = balance(&venue, &user, "BTC").await;
    assert_eq!(btc_free, dec("0.0999"));
}

// ── Insufficient balance / duplicate id ──────────────────────────────

#[tokio::test]
async fn insufficient_balance_leaves_no_state() {
    let venue = venue_with(&[Exchange::Binance]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(100));

    let err = venue
        .engine
        .create_order("k", "s", limit(Exchange::Binance, Side::BUY, "0.1", "50000"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Account(AccountError::InsufficientBalance { .. })
    ));
    assert!(venue.env.orders.is_empty());
    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, Decimal::from(100));
    assert_eq!(locked, Decimal::ZERO);
}

#[tokio::test]
async fn duplicate_external_id_rejected() {
    let venue = venue_with(&[Exchange::Binance]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(100_000));

    let mut params = limit(Exchange::Binance, Side::BUY, "0.1", "49000");
    params.external_id = Some("client-1".to_string());
    venue.engine.create_order("k", "s", params.clone()).await.unwrap();

    let err = venue.engine.create_order("k", "s", params).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Order(OrderError::DuplicateExternalId)
    ));
}

// ── Scenario 3 + 4: linear open then liquidation ─────────────────────

#[tokio::test]
async fn linear_market_buy_opens_position_with_liquidation_price() {
    let venue = venue_with(&[Exchange::BinanceUsdm]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(1_000));
    venue
        .engine
        .set_leverage(&user, "BTCUSDT", None, 10)
        .await
        .unwrap();

    let order = venue
        .engine
        .create_order("k", "s", market(Exchange::BinanceUsdm, Side::BUY, "0.01"))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.fee, dec("0.2")); // 50000 × 0.01 × 0.0004

    let positions = venue.engine.positions_for_user(&user).await.unwrap();
    assert_eq!(positions.len(), 1);
    let pos = &positions[0];
    assert_eq!(pos.position_side, PositionSide::LONG);
    assert_eq!(pos.position_amt, qty("0.01"));
    assert_eq!(pos.entry_price, Price::from_u64(50_000));
    assert_eq!(pos.margin, Decimal::from(50));
    assert_eq!(pos.leverage, 10);
    assert_eq!(pos.liquidation_price.as_decimal(), dec("44982"));

    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, dec("949.8"));
    assert_eq!(locked, Decimal::from(50));

    // Leverage row is locked while the position is open.
    let err = venue
        .engine
        .set_leverage(&user, "BTCUSDT", None, 20)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Account(AccountError::LeverageLocked { .. })
    ));
}

#[tokio::test]
async fn long_liquidates_when_bid_reaches_trigger() {
    let venue = venue_with(&[Exchange::BinanceUsdm]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(1_000));
    venue
        .engine
        .set_leverage(&user, "BTCUSDT", None, 10)
        .await
        .unwrap();
    venue
        .engine
        .create_order("k", "s", market(Exchange::BinanceUsdm, Side::BUY, "0.01"))
        .await
        .unwrap();
    let uuid = venue.engine.positions_for_user(&user).await.unwrap()[0].uuid;
    assert!(venue.env.feed.is_subscribed("trade@BTCUSDT@binanceUsdm"));

    // Bid drops through the liquidation price (44982).
    venue
        .engine
        .handle_tick(tick(Exchange::BinanceUsdm, "44980", "1", "44981", "1"))
        .await;

    let closed = venue.env.positions.get(&uuid).await.unwrap().unwrap();
    assert_eq!(closed.status, PositionStatus::Closed);
    assert_eq!(closed.close_price, Some(Price::from_u64(44_982)));

    // Margin returned with realized loss applied:
    // fee = 0.01 × 44982 × 0.0004 = 0.179928
    // pnl = (44982 − 50000) × 0.01 − 0.179928 = −50.359928
    // free = 949.8 + 50 − 50.359928 = 949.440072
    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, dec("949.440072"));
    assert_eq!(locked, Decimal::ZERO);

    // Watch-set entry and subscription are gone; leverage unlocked.
    assert!(!venue.engine.watch().has("BTCUSDT@binanceUsdm"));
    assert!(!venue.env.feed.is_subscribed("trade@BTCUSDT@binanceUsdm"));
    let row = venue
        .env
        .leverage
        .get(&user, "BTCUSDT", Some(PositionSide::BOTH))
        .await
        .unwrap()
        .unwrap();
    assert!(!row.locked);

    // The synthetic liquidation order is on record.
    let orders = venue.engine.orders_for_user(&user).await.unwrap();
    assert!(orders
        .iter()
        .any(|o| o.external_id.starts_with("liquidation_") && o.status == OrderStatus::Filled));
}

// ── Scenario 5: hedge mode reduce-only close ─────────────────────────

#[tokio::test]
async fn hedge_reduce_only_limit_closes_long() {
    let venue = venue_with(&[Exchange::BinanceUsdm]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(1_000));
    venue.engine.set_hedge(&user, true).await.unwrap();
    venue
        .engine
        .set_leverage(&user, "BTCUSDT", Some(PositionSide::LONG), 10)
        .await
        .unwrap();

    // Open LONG 0.01 at 50000.
    let mut open = market(Exchange::BinanceUsdm, Side::BUY, "0.01");
    open.position_side = Some(PositionSide::LONG);
    venue.engine.create_order("k", "s", open).await.unwrap();
    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, dec("949.8"));
    assert_eq!(locked, Decimal::from(50));

    // Reduce-only LIMIT SELL 0.01 @ 55000: books with no reservation.
    let mut close = limit(Exchange::BinanceUsdm, Side::SELL, "0.01", "55000");
    close.reduce_only = true;
    close.position_side = Some(PositionSide::LONG);
    let order = venue.engine.create_order("k", "s", close).await.unwrap();
    assert_eq!(order.status, OrderStatus::New);
    let (_, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(locked, Decimal::from(50)); // margin only, no new reservation

    // Bid reaches 55000: order fills, position closes, leverage unlocks.
    venue
        .engine
        .handle_tick(tick(Exchange::BinanceUsdm, "55000", "1", "55001", "1"))
        .await;

    let stored = venue
        .env
        .orders
        .get(&order.external_id, "BTCUSDT")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Filled);

    let positions = venue.engine.positions_for_user(&user).await.unwrap();
    assert!(positions.is_empty());

    // fee = 0.01 × 55000 × 0.0002 (maker) = 0.11
    // pnl = (55000 − 50000) × 0.01 − 0.11 = 49.89
    // free = 949.8 + 50 + 49.89 = 1049.69
    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, dec("1049.69"));
    assert_eq!(locked, Decimal::ZERO);

    let row = venue
        .env
        .leverage
        .get(&user, "BTCUSDT", Some(PositionSide::LONG))
        .await
        .unwrap()
        .unwrap();
    assert!(!row.locked);
}

#[tokio::test]
async fn hedge_mode_requires_position_side() {
    let venue = venue_with(&[Exchange::BinanceUsdm]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(1_000));
    venue.engine.set_hedge(&user, true).await.unwrap();

    let err = venue
        .engine
        .create_order("k", "s", market(Exchange::BinanceUsdm, Side::BUY, "0.01"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Account(AccountError::HedgeModeViolation)
    ));
}

// ── Reduce-only rules ────────────────────────────────────────────────

#[tokio::test]
async fn reduce_only_without_position_rejected() {
    let venue = venue_with(&[Exchange::BinanceUsdm]);
    let _ = venue.env.credentials.add_user("k", "s");

    let mut params = market(Exchange::BinanceUsdm, Side::SELL, "0.01");
    params.reduce_only = true;
    let err = venue.engine.create_order("k", "s", params).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Order(OrderError::ReduceRejected)
    ));
}

#[tokio::test]
async fn reduce_only_overfill_is_trimmed() {
    let venue = venue_with(&[Exchange::BinanceUsdm]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(1_000));
    venue
        .engine
        .set_leverage(&user, "BTCUSDT", None, 10)
        .await
        .unwrap();
    venue
        .engine
        .create_order("k", "s", market(Exchange::BinanceUsdm, Side::BUY, "0.01"))
        .await
        .unwrap();

    // Reduce-only SELL 0.02 against LONG 0.01: trimmed in place.
    let mut params = market(Exchange::BinanceUsdm, Side::SELL, "0.02");
    params.reduce_only = true;
    let order = venue.engine.create_order("k", "s", params).await.unwrap();
    assert_eq!(order.amount, qty("0.01"));
    assert_eq!(order.filled_amount, qty("0.01"));
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.fee, dec("0.2")); // fee on the trimmed size only

    assert!(venue.engine.positions_for_user(&user).await.unwrap().is_empty());
}

// ── Flip: closing side larger than the position ──────────────────────

#[tokio::test]
async fn oversized_close_flips_position() {
    let venue = venue_with(&[Exchange::BinanceUsdm]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(1_000));
    venue
        .engine
        .set_leverage(&user, "BTCUSDT", None, 10)
        .await
        .unwrap();
    venue
        .engine
        .create_order("k", "s", market(Exchange::BinanceUsdm, Side::BUY, "0.01"))
        .await
        .unwrap();

    venue
        .engine
        .create_order("k", "s", market(Exchange::BinanceUsdm, Side::SELL, "0.03"))
        .await
        .unwrap();

    let positions = venue.engine.positions_for_user(&user).await.unwrap();
    assert_eq!(positions.len(), 1);
    let pos = &positions[0];
    assert_eq!(pos.position_side, PositionSide::SHORT);
    assert_eq!(pos.position_amt, qty("0.02"));
    assert_eq!(pos.entry_price, Price::from_u64(50_000));
    // Total margin 150 minus the unwound leg's 50.
    assert_eq!(pos.margin, Decimal::from(100));

    let (_, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(locked, Decimal::from(100));
}

// ── Partial reduce ───────────────────────────────────────────────────

#[tokio::test]
async fn partial_reduce_releases_margin_and_realizes_pnl() {
    let venue = venue_with(&[Exchange::BinanceUsdm]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(1_000));
    venue
        .engine
        .set_leverage(&user, "BTCUSDT", None, 10)
        .await
        .unwrap();
    venue
        .engine
        .create_order("k", "s", market(Exchange::BinanceUsdm, Side::BUY, "0.02"))
        .await
        .unwrap();

    venue
        .engine
        .create_order("k", "s", market(Exchange::BinanceUsdm, Side::SELL, "0.01"))
        .await
        .unwrap();

    let positions = venue.engine.positions_for_user(&user).await.unwrap();
    assert_eq!(positions.len(), 1);
    let pos = &positions[0];
    assert_eq!(pos.position_side, PositionSide::LONG);
    assert_eq!(pos.position_amt, qty("0.01"));
    assert_eq!(pos.margin, Decimal::from(50));

    let (_, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(locked, Decimal::from(50));
}

// ── Inverse contracts ────────────────────────────────────────────────

#[tokio::test]
async fn inverse_margin_and_fee_settle_in_base() {
    let venue = venue_with(&[Exchange::BinanceCoinm]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "BTC", Decimal::ONE);
    venue
        .engine
        .set_leverage(&user, "BTCUSDT", None, 10)
        .await
        .unwrap();

    // 100 contracts × 10 USD at 50000.
    venue
        .engine
        .create_order("k", "s", market(Exchange::BinanceCoinm, Side::BUY, "100"))
        .await
        .unwrap();

    let positions = venue.engine.positions_for_user(&user).await.unwrap();
    let pos = &positions[0];
    // margin = 100 × 10 / 50000 / 10 = 0.002 BTC
    assert_eq!(pos.margin, dec("0.002"));

    // fee = (100 × 10 / 50000) × 0.0005 = 0.00001 BTC
    let (free, locked) = balance(&venue, &user, "BTC").await;
    assert_eq!(locked, dec("0.002"));
    assert_eq!(free, Decimal::ONE - dec("0.002") - dec("0.00001"));
}

// ── Scenario 6: watch set across two users ───────────────────────────

#[tokio::test]
async fn subscription_survives_until_last_holder_cancels() {
    let venue = venue_with(&[Exchange::Binance]);
    let user_a = venue.env.credentials.add_user("ka", "sa");
    let user_b = venue.env.credentials.add_user("kb", "sb");
    venue.env.wallets.seed(user_a, "USDT", Decimal::from(10_000));
    venue.env.wallets.seed(user_b, "USDT", Decimal::from(10_000));

    let order_a = venue
        .engine
        .create_order("ka", "sa", limit(Exchange::Binance, Side::BUY, "0.1", "49000"))
        .await
        .unwrap();
    let order_b = venue
        .engine
        .create_order("kb", "sb", limit(Exchange::Binance, Side::BUY, "0.1", "48000"))
        .await
        .unwrap();
    assert!(venue.env.feed.is_subscribed("trade@BTCUSDT@binance"));

    venue
        .engine
        .cancel_order(
            Some(user_a),
            OrderSelector::External {
                external_id: order_a.external_id,
                symbol: "BTCUSDT".to_string(),
            },
            false,
        )
        .await
        .unwrap();
    // B's order still holds the stream.
    assert!(venue.engine.watch().has("BTCUSDT@binance"));
    assert!(venue.env.feed.is_subscribed("trade@BTCUSDT@binance"));

    venue
        .engine
        .cancel_order(
            Some(user_b),
            OrderSelector::External {
                external_id: order_b.external_id,
                symbol: "BTCUSDT".to_string(),
            },
            false,
        )
        .await
        .unwrap();
    assert!(!venue.engine.watch().has("BTCUSDT@binance"));
    assert!(!venue.env.feed.is_subscribed("trade@BTCUSDT@binance"));
}

// ── Tick replay is a no-op ───────────────────────────────────────────

#[tokio::test]
async fn identical_tick_signature_is_dropped() {
    let venue = venue_with(&[Exchange::Binance]);

    let first = tick(Exchange::Binance, "49000", "1", "49001", "1");
    let mut replay = first.clone();
    replay.time += 500;

    venue.engine.handle_tick(first).await;
    venue.engine.handle_tick(replay).await;

    assert_eq!(venue.engine.intake().accepted(), 1);
    assert_eq!(venue.engine.intake().dropped_duplicate(), 1);
}

// ── Reconciliation ───────────────────────────────────────────────────

#[tokio::test]
async fn reconcile_rebuilds_projection_after_restart() {
    let venue = venue_with(&[Exchange::Binance, Exchange::BinanceUsdm]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(10_000));
    venue
        .engine
        .set_leverage(&user, "BTCUSDT", None, 10)
        .await
        .unwrap();

    venue
        .engine
        .create_order("k", "s", limit(Exchange::Binance, Side::BUY, "0.1", "49000"))
        .await
        .unwrap();
    venue
        .engine
        .create_order("k", "s", market(Exchange::BinanceUsdm, Side::BUY, "0.01"))
        .await
        .unwrap();

    // Fresh process over the same stores.
    let restarted = Engine::new(venue.env.ports(), EngineConfig::default());
    let report = restarted.reconcile().await.unwrap();
    assert_eq!(report.orders_restored, 1);
    assert_eq!(report.positions_restored, 1);
    assert_eq!(report.streams_subscribed, 2);
    // Healthy state: nothing to repair.
    assert_eq!(report.wallets_corrected, 0);
    assert_eq!(report.wallets_reset, 0);

    assert!(restarted.watch().has("BTCUSDT@binance"));
    assert!(restarted.watch().has("BTCUSDT@binanceUsdm"));
    assert_eq!(restarted.open_orders_for_user(&user).len(), 1);
}

#[tokio::test]
async fn reconcile_corrects_locked_drift() {
    let venue = venue_with(&[Exchange::Binance]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(10_000));

    venue
        .engine
        .create_order("k", "s", limit(Exchange::Binance, Side::BUY, "0.1", "49000"))
        .await
        .unwrap();

    // Corrupt the wallet: locked drifted up by 100.
    venue
        .env
        .wallets
        .apply(&user, "USDT", Decimal::ZERO, Decimal::from(100))
        .await
        .unwrap();

    let restarted = Engine::new(venue.env.ports(), EngineConfig::default());
    let report = restarted.reconcile().await.unwrap();
    assert_eq!(report.wallets_corrected, 1);

    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(locked, Decimal::from(4_900)); // 0.1 × 49000
    assert_eq!(free + locked, Decimal::from(10_100));
}

#[tokio::test]
async fn reconcile_resets_orphaned_locked_balance() {
    let venue = venue_with(&[Exchange::Binance]);
    let user = venue.env.credentials.add_user("k", "s");
    venue.env.wallets.seed(user, "USDT", Decimal::from(1_000));
    venue
        .env
        .wallets
        .apply(&user, "USDT", Decimal::from(-200), Decimal::from(200))
        .await
        .unwrap();

    let restarted = Engine::new(venue.env.ports(), EngineConfig::default());
    let report = restarted.reconcile().await.unwrap();
    assert_eq!(report.wallets_reset, 1);

    let (free, locked) = balance(&venue, &user, "USDT").await;
    assert_eq!(free, Decimal::from(1_000));
    assert_eq!(locked, Decimal::ZERO);
}
