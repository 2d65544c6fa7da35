//! Pub/sub subscriber task
//!
//! A single background task owns the redis pub/sub connection and its
//! subscription lifecycle. The engine drives subscribe/unsubscribe through
//! a [`FeedHandle`] (the `FeedControl` port); decoded ticks flow out over
//! an mpsc channel.
//!
//! Reconnection: 3-second attempts, capped at 1000. After a reconnect the
//! full desired channel set is replayed; if replay keeps failing after 15
//! attempts a fresh client is forced.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use engine::ports::FeedControl;
use types::errors::FeedError;
use types::ticker::Ticker;

use crate::codec;

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub redis_url: String,
    /// Delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Reconnect attempts before giving up entirely.
    pub max_reconnect_attempts: u32,
    /// Resubscribe attempts after a reconnect before forcing a new client.
    pub max_resubscribe_attempts: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: 1000,
            max_resubscribe_attempts: 15,
        }
    }
}

/// Subscription change requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    Subscribe(String),
    Unsubscribe(String),
}

/// Cloneable control handle implementing the `FeedControl` port.
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
}

#[async_trait]
impl FeedControl for FeedHandle {
    async fn subscribe(&self, channel: &str) -> Result<(), FeedError> {
        self.commands
            .send(FeedCommand::Subscribe(channel.to_string()))
            .await
            .map_err(|_| FeedError::Disconnected("subscriber task stopped".to_string()))
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), FeedError> {
        self.commands
            .send(FeedCommand::Unsubscribe(channel.to_string()))
            .await
            .map_err(|_| FeedError::Disconnected("subscriber task stopped".to_string()))
    }
}

/// Spawn the subscriber task. Decoded ticks arrive on `ticks`.
pub fn spawn_subscriber(
    config: FeedConfig,
    ticks: mpsc::Sender<Ticker>,
) -> (FeedHandle, tokio::task::JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(256);
    let task = tokio::spawn(subscriber_loop(config, commands_rx, ticks));
    (
        FeedHandle {
            commands: commands_tx,
        },
        task,
    )
}

fn apply_command(desired: &mut BTreeSet<String>, command: &FeedCommand) {
    match command {
        FeedCommand::Subscribe(channel) => {
            desired.insert(channel.clone());
        }
        FeedCommand::Unsubscribe(channel) => {
            desired.remove(channel);
        }
    }
}

async fn resubscribe_all(
    pubsub: &mut redis::aio::PubSub,
    channels: &BTreeSet<String>,
) -> redis::RedisResult<()> {
    for channel in channels {
        pubsub.subscribe(channel.as_str()).await?;
    }
    Ok(())
}

async fn handle_message(msg: &redis::Msg, ticks: &mpsc::Sender<Ticker>) {
    let channel = msg.get_channel_name();
    if codec::parse_trade_channel(channel).is_none() {
        debug!(channel, "ignoring message on non-trade channel");
        return;
    }
    let payload: String = match msg.get_payload() {
        Ok(payload) => payload,
        Err(err) => {
            warn!(channel, %err, "unreadable pub/sub payload");
            return;
        }
    };
    match codec::decode_ticker(&payload) {
        Ok(tick) => {
            if ticks.send(tick).await.is_err() {
                warn!("tick consumer dropped");
            }
        }
        Err(err) => warn!(channel, %err, "undecodable tick payload"),
    }
}

async fn subscriber_loop(
    config: FeedConfig,
    mut commands: mpsc::Receiver<FeedCommand>,
    ticks: mpsc::Sender<Ticker>,
) {
    let mut desired: BTreeSet<String> = BTreeSet::new();
    let mut attempts: u32 = 0;

    'connect: loop {
        if attempts >= config.max_reconnect_attempts {
            error!(attempts, "pub/sub reconnect budget exhausted, stopping feed");
            return;
        }
        attempts += 1;

        // Fold in any changes requested while disconnected.
        while let Ok(command) = commands.try_recv() {
            apply_command(&mut desired, &command);
        }

        let client = match redis::Client::open(config.redis_url.as_str()) {
            Ok(client) => client,
            Err(err) => {
                error!(%err, "invalid redis url");
                return;
            }
        };
        let mut pubsub = match client.get_async_connection().await {
            Ok(connection) => connection.into_pubsub(),
            Err(err) => {
                warn!(attempt = attempts, %err, "pub/sub connect failed");
                tokio::time::sleep(config.reconnect_delay).await;
                continue 'connect;
            }
        };

        // Replay the full desired set on this connection.
        let mut replayed = false;
        for attempt in 1..=config.max_resubscribe_attempts {
            match resubscribe_all(&mut pubsub, &desired).await {
                Ok(()) => {
                    replayed = true;
                    break;
                }
                Err(err) => {
                    warn!(attempt, %err, "resubscribe failed");
                    tokio::time::sleep(config.reconnect_delay).await;
                }
            }
        }
        if !replayed {
            warn!("resubscribe attempts exhausted, forcing a fresh client");
            continue 'connect;
        }

        attempts = 0;
        info!(channels = desired.len(), "market-data feed connected");

        loop {
            enum Step {
                Message(Option<redis::Msg>),
                Command(Option<FeedCommand>),
            }

            // The message stream mutably borrows the pubsub connection, so
            // it lives only for one select round; subscription changes use
            // the connection afterwards.
            let step = {
                let mut stream = pubsub.on_message();
                tokio::select! {
                    msg = stream.next() => Step::Message(msg),
                    command = commands.recv() => Step::Command(command),
                }
            };

            match step {
                Step::Message(Some(msg)) => handle_message(&msg, &ticks).await,
                Step::Message(None) => {
                    warn!("pub/sub stream ended, reconnecting");
                    tokio::time::sleep(config.reconnect_delay).await;
                    continue 'connect;
                }
                Step::Command(Some(command)) => {
                    let result = match &command {
                        FeedCommand::Subscribe(channel) if !desired.contains(channel) => {
                            pubsub.subscribe(channel.as_str()).await
                        }
                        FeedCommand::Unsubscribe(channel) if desired.contains(channel) => {
                            pubsub.unsubscribe(channel.as_str()).await
                        }
                        _ => Ok(()),
                    };
                    apply_command(&mut desired, &command);
                    if let Err(err) = result {
                        warn!(%err, "subscription change failed, reconnecting");
                        tokio::time::sleep(config.reconnect_delay).await;
                        continue 'connect;
                    }
                }
                Step::Command(None) => {
                    info!("all feed handles dropped, stopping subscriber");
                    return;
                }
            }
        }
    }
}
