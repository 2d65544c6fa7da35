mod auth;
mod error;
mod handlers;
mod models;
mod rate_limit;
mod router;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use engine::memory::MemoryEnv;
use engine::{Engine, EngineConfig};
use market_feed::{spawn_subscriber, FeedConfig, MarketDataClient};
use router::create_router;
use rust_decimal::Decimal;
use state::AppState;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();
    tracing::info!("starting paper venue gateway");

    // In-memory backing stores; durable backends plug in behind the same
    // ports.
    let env = MemoryEnv::new();

    let demo_key = std::env::var("VENUE_DEMO_KEY").unwrap_or_else(|_| "demo-key".to_string());
    let demo_secret =
        std::env::var("VENUE_DEMO_SECRET").unwrap_or_else(|_| "demo-secret".to_string());
    let demo_user = env.credentials.add_user(&demo_key, &demo_secret);
    env.wallets.seed(demo_user, "USDT", Decimal::from(100_000));
    tracing::info!(%demo_user, "seeded demo account with 100000 USDT");

    let mut ports = env.ports();

    // External symbol/market-data service, when configured.
    if let Ok(url) = std::env::var("MARKET_DATA_URL") {
        tracing::info!(%url, "using external market-data service");
        ports.symbols = Arc::new(MarketDataClient::new(url));
    }

    // Live tick feed over redis pub/sub, when configured.
    let mut tick_rx = None;
    if let Ok(redis_url) = std::env::var("REDIS_URL") {
        tracing::info!(%redis_url, "connecting market-data feed");
        let (tx, rx) = mpsc::channel(1024);
        let (handle, _task) = spawn_subscriber(
            FeedConfig {
                redis_url,
                ..FeedConfig::default()
            },
            tx,
        );
        ports.feed = Arc::new(handle);
        tick_rx = Some(rx);
    }

    let engine = Arc::new(Engine::new(ports, EngineConfig::default()));

    // Rebuild the projection and repair balance drift before serving.
    let report = engine.reconcile().await?;
    tracing::info!(?report, "startup reconciliation done");

    // Pump decoded ticks into the engine.
    if let Some(mut rx) = tick_rx {
        let engine = engine.clone();
        tokio::spawn(async move {
            while let Some(tick) = rx.recv().await {
                engine.handle_tick(tick).await;
            }
            tracing::warn!("tick feed closed");
        });
    }

    let app = create_router(AppState::new(engine));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
