// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory broker: a channel → subscribers table.
//!
//! Dispatch is still asynchronous — `publish` only enqueues onto the
//! subscribers' mpsc channels, mimicking network semantics so callers
//! never observe a subscriber's effects synchronously.

use crate::broker::{BrokerError, BrokerMessage, MessageBroker};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct MemoryBroker {
    connected: AtomicBool,
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<BrokerMessage>>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers
            .lock()
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.connected.store(false, Ordering::Release);
        self.subscribers.lock().clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn publish(&self, channel: &str, payload: Value) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        let mut subscribers = self.subscribers.lock();
        if let Some(senders) = subscribers.get_mut(channel) {
            senders.retain(|tx| {
                tx.send(BrokerMessage {
                    channel: channel.to_string(),
                    payload: payload.clone(),
                })
                .is_ok()
            });
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
        tx: mpsc::UnboundedSender<BrokerMessage>,
    ) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        self.subscribers
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        self.subscribers.lock().remove(channel);
        Ok(())
    }

    fn is_local(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
