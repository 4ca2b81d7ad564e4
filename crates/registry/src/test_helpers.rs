// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for registry and broadcaster tests.

use async_trait::async_trait;
use sb_broker::{BrokerError, BrokerMessage, MemoryBroker, MessageBroker};
use sb_core::{
    CascadingRule, Component, EntryMachineMode, FakeClock, MachineBuilder, MatchingRule,
    StateBuilder, StateKind, TransitionBuilder,
};
use sb_engine::{Runtime, RuntimeOptions, TimerWheelConfig};
use sb_store::{MemoryEventStore, MemorySnapshotStore, PersistenceConfig, PersistenceManager};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Build a runtime over fresh in-memory stores.
pub(crate) fn runtime_with(component: Component, clock: FakeClock) -> Runtime<FakeClock> {
    let persistence = Arc::new(PersistenceManager::new(
        Arc::new(MemoryEventStore::new()),
        Arc::new(MemorySnapshotStore::new()),
        PersistenceConfig::default(),
    ));
    let options = RuntimeOptions::new(clock)
        .wheel(TimerWheelConfig {
            tick_ms: 10,
            wheel_size: 512,
        })
        .persistence(persistence);
    match Runtime::new(component, options) {
        Ok(r) => r,
        Err(e) => panic!("runtime construction failed: {e}"),
    }
}

/// Orders component whose `Confirmed` state cascades a RESERVE into the
/// `inventory` component.
pub(crate) fn orders_component() -> Component {
    let machine = MachineBuilder::new("Order", "Pending")
        .state(StateBuilder::new("Pending", StateKind::Entry).build())
        .state(
            StateBuilder::new("Confirmed", StateKind::Regular)
                .cascade(
                    CascadingRule::new("Stock", "Available", "RESERVE")
                        .to_component("inventory")
                        .matching(MatchingRule::new("productId", "Id"))
                        .payload(json!({
                            "productId": "{{ProductId}}",
                            "qty": "{{Quantity}}",
                        })),
                )
                .build(),
        )
        .transition(TransitionBuilder::new("Pending", "Confirmed", "CONFIRM").build())
        .build();
    match Component::builder("orders")
        .entry_machine("Order", EntryMachineMode::Multiple)
        .auto_create_entry_point(false)
        .machine(machine)
        .build()
    {
        Ok(c) => c,
        Err(e) => panic!("fixture invalid: {e}"),
    }
}

/// Inventory component with a rule-routed RESERVE transition.
pub(crate) fn inventory_component() -> Component {
    let machine = MachineBuilder::new("Stock", "Available")
        .state(StateBuilder::new("Available", StateKind::Entry).build())
        .state(StateBuilder::new("Reserved", StateKind::Regular).build())
        .transition(
            TransitionBuilder::new("Available", "Reserved", "RESERVE")
                .matching(MatchingRule::new("productId", "Id"))
                .build(),
        )
        .build();
    match Component::builder("inventory").machine(machine).build() {
        Ok(c) => c,
        Err(e) => panic!("fixture invalid: {e}"),
    }
}

/// Poll a condition with a bounded timeout instead of a fixed sleep.
pub(crate) async fn wait_until<F, Fut>(what: &str, mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if cond().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Subscribe a plain receiver to a broker channel.
pub(crate) async fn observe(
    broker: &dyn MessageBroker,
    channel: &str,
) -> mpsc::UnboundedReceiver<BrokerMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    if let Err(e) = broker.subscribe(channel, tx).await {
        panic!("subscribe failed: {e}");
    }
    rx
}

/// An in-memory broker that denies the same-process fast path, forcing
/// traffic through the published-envelope route.
pub(crate) struct NonLocalBroker(pub MemoryBroker);

impl NonLocalBroker {
    pub(crate) fn new() -> Self {
        Self(MemoryBroker::new())
    }
}

#[async_trait]
impl MessageBroker for NonLocalBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        self.0.connect().await
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.0.disconnect().await
    }

    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    async fn publish(&self, channel: &str, payload: Value) -> Result<(), BrokerError> {
        self.0.publish(channel, payload).await
    }

    async fn subscribe(
        &self,
        channel: &str,
        tx: mpsc::UnboundedSender<BrokerMessage>,
    ) -> Result<(), BrokerError> {
        self.0.subscribe(channel, tx).await
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        self.0.unsubscribe(channel).await
    }

    fn is_local(&self) -> bool {
        false
    }
}
