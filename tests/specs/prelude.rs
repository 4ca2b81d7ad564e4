// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared setup for the end-to-end specs.

use sb_core::{
    CascadingRule, Component, EntryMachineMode, FakeClock, MachineBuilder, MatchingRule,
    StateBuilder, StateKind, TransitionBuilder,
};
use sb_engine::{Runtime, RuntimeOptions, TimerWheelConfig};
use sb_store::{MemoryEventStore, MemorySnapshotStore, PersistenceConfig, PersistenceManager};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub struct Stores {
    pub events: Arc<MemoryEventStore>,
    pub snapshots: Arc<MemorySnapshotStore>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            events: Arc::new(MemoryEventStore::new()),
            snapshots: Arc::new(MemorySnapshotStore::new()),
        }
    }
}

/// A runtime over the given stores, snapshotting every transition.
pub fn runtime(component: Component, clock: FakeClock, stores: &Stores) -> Runtime<FakeClock> {
    let persistence = Arc::new(PersistenceManager::new(
        stores.events.clone(),
        stores.snapshots.clone(),
        PersistenceConfig {
            snapshot_interval: 1,
        },
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

/// Orders component cascading reservations into the inventory component.
pub fn orders_component() -> Component {
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
        .transition(
            TransitionBuilder::new("Pending", "Confirmed", "CONFIRM")
                .matching(MatchingRule::new("orderId", "Id"))
                .build(),
        )
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
pub fn inventory_component() -> Component {
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
pub async fn wait_until<F, Fut>(what: &str, mut cond: F)
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
