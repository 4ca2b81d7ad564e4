// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis pub/sub broker.
//!
//! Connection is lazy: nothing talks to Redis until `connect`. Channels
//! are namespaced with a key prefix so multiple deployments can share
//! one Redis. Messages are JSON strings; payloads that fail to parse
//! are logged and dropped. The subscriber task resubscribes with
//! exponential backoff when the pub/sub stream drops.

use crate::broker::{BrokerError, BrokerMessage, MessageBroker};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

const RECONNECT_BACKOFF_INITIAL: Duration = Duration::from_millis(200);
const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RedisBrokerConfig {
    pub url: String,
    /// Key namespace prepended to every channel (`<prefix>:<channel>`).
    pub channel_prefix: String,
}

impl Default for RedisBrokerConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            channel_prefix: "switchboard".to_string(),
        }
    }
}

enum SubCommand {
    Subscribe(String, mpsc::UnboundedSender<BrokerMessage>),
    Unsubscribe(String),
}

struct Connected {
    publisher: ConnectionManager,
    commands: mpsc::UnboundedSender<SubCommand>,
    task: tokio::task::JoinHandle<()>,
}

pub struct RedisBroker {
    config: RedisBrokerConfig,
    state: Mutex<Option<Connected>>,
}

impl RedisBroker {
    pub fn new(config: RedisBrokerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
        }
    }

    fn prefixed(&self, channel: &str) -> String {
        if self.config.channel_prefix.is_empty() {
            channel.to_string()
        } else {
            format!("{}:{}", self.config.channel_prefix, channel)
        }
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        if self.is_connected() {
            return Ok(());
        }
        let client = redis::Client::open(self.config.url.as_str())
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        let publisher = client
            .get_connection_manager()
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        let (commands, rx) = mpsc::unbounded_channel();
        let prefix = self.config.channel_prefix.clone();
        let task = tokio::spawn(subscriber_loop(client, prefix, rx));

        *self.state.lock() = Some(Connected {
            publisher,
            commands,
            task,
        });
        tracing::info!(url = %self.config.url, "redis broker connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        if let Some(connected) = self.state.lock().take() {
            connected.task.abort();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().is_some()
    }

    async fn publish(&self, channel: &str, payload: Value) -> Result<(), BrokerError> {
        let mut publisher = {
            let state = self.state.lock();
            let connected = state.as_ref().ok_or(BrokerError::NotConnected)?;
            connected.publisher.clone()
        };
        let message =
            serde_json::to_string(&payload).map_err(|e| BrokerError::Publish(e.to_string()))?;
        let _: () = publisher
            .publish(self.prefixed(channel), message)
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
        tx: mpsc::UnboundedSender<BrokerMessage>,
    ) -> Result<(), BrokerError> {
        let state = self.state.lock();
        let connected = state.as_ref().ok_or(BrokerError::NotConnected)?;
        connected
            .commands
            .send(SubCommand::Subscribe(channel.to_string(), tx))
            .map_err(|e| BrokerError::Subscribe(e.to_string()))
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        let state = self.state.lock();
        let connected = state.as_ref().ok_or(BrokerError::NotConnected)?;
        connected
            .commands
            .send(SubCommand::Unsubscribe(channel.to_string()))
            .map_err(|e| BrokerError::Subscribe(e.to_string()))
    }
}

fn prefixed_name(prefix: &str, channel: &str) -> String {
    if prefix.is_empty() {
        channel.to_string()
    } else {
        format!("{prefix}:{channel}")
    }
}

fn strip_prefix<'a>(prefix: &str, channel: &'a str) -> &'a str {
    if prefix.is_empty() {
        return channel;
    }
    channel
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(channel)
}

/// Owns the pub/sub connection: applies subscription commands, fans
/// incoming messages out to local subscribers, reconnects with backoff
/// when the stream drops.
async fn subscriber_loop(
    client: redis::Client,
    prefix: String,
    mut rx: mpsc::UnboundedReceiver<SubCommand>,
) {
    let mut subscribers: HashMap<String, Vec<mpsc::UnboundedSender<BrokerMessage>>> =
        HashMap::new();
    let mut backoff = RECONNECT_BACKOFF_INITIAL;

    'reconnect: loop {
        let pubsub = match client.get_async_pubsub().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, delay_ms = backoff.as_millis() as u64, "pubsub connect failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(RECONNECT_BACKOFF_MAX);
                continue;
            }
        };
        backoff = RECONNECT_BACKOFF_INITIAL;
        let (mut sink, mut stream) = pubsub.split();

        // Re-establish existing subscriptions after a reconnect.
        for channel in subscribers.keys() {
            if let Err(e) = sink.subscribe(prefixed_name(&prefix, channel)).await {
                tracing::warn!(%channel, error = %e, "resubscribe failed");
            }
        }

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(SubCommand::Subscribe(channel, tx)) => {
                        let wire_channel = prefixed_name(&prefix, &channel);
                        subscribers.entry(channel).or_default().push(tx);
                        if let Err(e) = sink.subscribe(&wire_channel).await {
                            tracing::warn!(channel = %wire_channel, error = %e, "subscribe failed");
                        }
                    }
                    Some(SubCommand::Unsubscribe(channel)) => {
                        subscribers.remove(&channel);
                        let wire_channel = prefixed_name(&prefix, &channel);
                        if let Err(e) = sink.unsubscribe(&wire_channel).await {
                            tracing::warn!(channel = %wire_channel, error = %e, "unsubscribe failed");
                        }
                    }
                    None => return,
                },
                message = stream.next() => match message {
                    Some(message) => {
                        let channel = strip_prefix(&prefix, message.get_channel_name()).to_string();
                        let raw: String = match message.get_payload() {
                            Ok(raw) => raw,
                            Err(e) => {
                                tracing::warn!(%channel, error = %e, "non-text payload dropped");
                                continue;
                            }
                        };
                        let payload: Value = match serde_json::from_str(&raw) {
                            Ok(v) => v,
                            Err(e) => {
                                tracing::warn!(%channel, error = %e, "malformed message dropped");
                                continue;
                            }
                        };
                        if let Some(senders) = subscribers.get_mut(&channel) {
                            senders.retain(|tx| {
                                tx.send(BrokerMessage {
                                    channel: channel.clone(),
                                    payload: payload.clone(),
                                })
                                .is_ok()
                            });
                        }
                    }
                    None => {
                        tracing::warn!("pubsub stream ended, reconnecting");
                        continue 'reconnect;
                    }
                },
            }
        }
    }
}
