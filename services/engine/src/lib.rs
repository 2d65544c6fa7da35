//! Matching and settlement engine
//!
//! The stateful core of the paper trading venue. Consumes top-of-book
//! ticks, fires limit-order fills, applies spot and derivatives
//! balance/position transitions per (user, symbol), manages leverage
//! locking and liquidation, and keeps the in-memory projection of open
//! orders and positions consistent with durable storage.
//!
//! All durable truth lives behind the ports in [`ports`]; the projection,
//! watch set and caches are process-local and rebuilt at startup by
//! [`Engine::reconcile`].
//!
//! # Modules
//! - `engine`: orchestrator owning all process-local state
//! - `ports`: traits for storage, credentials, feed, push, symbol service
//! - `memory`: in-memory reference implementations of every port
//! - `locks`: named-lock manager (CreateOrder / UpdateOrder / Ticker / Common)
//! - `projection`: open orders and positions by symbol
//! - `watch`: symbol@exchange watch set driving subscriptions
//! - `symbols`: symbol-info and latest-price caches
//! - `intake`: ticker filters (monotonicity, freshness, signature dedup)
//! - `matching`: per-tick liquidation and limit-order scans
//! - `lifecycle`: create / cancel / fill order state machine
//! - `settlement`: spot and derivatives balance/position transitions
//! - `liquidation`: margin, fee, PnL and liquidation-price formulas
//! - `reconcile`: startup rebuild and balance-drift repair
//! - `events`: client push-event payloads

pub mod engine;
pub mod events;
pub mod intake;
pub mod lifecycle;
pub mod liquidation;
pub mod locks;
pub mod matching;
pub mod memory;
pub mod ports;
pub mod projection;
pub mod reconcile;
pub mod settlement;
pub mod symbols;
pub mod watch;

pub use engine::{Engine, EngineConfig, EnginePorts};
pub use lifecycle::{OrderParams, OrderSelector};
pub use reconcile::ReconcileReport;
