//! Market-data plumbing for the venue simulator
//!
//! Owns the two connections to the outside market-data world:
//!
//! - `subscriber`: a background task holding the pub/sub connection to the
//!   tick aggregator, with subscribe/unsubscribe driven by the engine's
//!   watch set and automatic reconnection.
//! - `client`: the HTTP client for the symbol/market-data service
//!   (`exchange`, `exchange/all`, `latestPrice`), implementing the
//!   engine's `SymbolService` port.
//! - `codec`: channel naming and payload decoding shared by both.

pub mod client;
pub mod codec;
pub mod subscriber;

pub use client::MarketDataClient;
pub use subscriber::{spawn_subscriber, FeedConfig, FeedHandle};
