// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The broker abstraction.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// A message delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    pub channel: String,
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker is not connected")]
    NotConnected,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

/// Pub/sub abstraction shared by all runtimes of a registry.
///
/// Subscribers hand over an mpsc sender; the broker pushes matching
/// messages into it and the subscriber drains on its own task. Publish
/// is fire-and-forget: once the backend accepted the message the call
/// succeeds, delivery is at-least-once.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn connect(&self) -> Result<(), BrokerError>;

    async fn disconnect(&self) -> Result<(), BrokerError>;

    fn is_connected(&self) -> bool;

    async fn publish(&self, channel: &str, payload: Value) -> Result<(), BrokerError>;

    async fn subscribe(
        &self,
        channel: &str,
        tx: mpsc::UnboundedSender<BrokerMessage>,
    ) -> Result<(), BrokerError>;

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError>;

    /// True when publisher and subscribers share one process, enabling
    /// the registry's direct-dispatch fast path.
    fn is_local(&self) -> bool {
        false
    }
}
