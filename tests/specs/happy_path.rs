// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single order instance walked through its whole lifecycle.

use super::prelude::*;
use sb_core::test_support::order_component;
use sb_core::{FakeClock, MachineEvent};
use serde_json::json;

#[tokio::test]
async fn order_walks_pending_to_delivered_and_disposes() {
    let stores = Stores::new();
    let rt = runtime(order_component(), FakeClock::new(), &stores);

    let id = rt.create_instance("Order", json!({"Id": 1})).await.unwrap();
    for event in ["CONFIRM", "SHIP", "DELIVER"] {
        let outcome = rt.send_event(id, event, json!({})).await.unwrap();
        assert!(outcome.transitioned(), "{event} should transition");
    }
    rt.quiesce().await;

    // Disposed on reaching the final state.
    assert!(rt.instance(id).await.is_none());
    assert!(rt.instances().await.is_empty());

    // Four persisted events with contiguous before/after states.
    let history = rt.instance_history(id).await.unwrap();
    assert_eq!(history.len(), 4);
    let visited: Vec<&str> = history.iter().map(|e| e.state_after.as_str()).collect();
    assert_eq!(visited, ["Pending", "Confirmed", "Shipped", "Delivered"]);
    for pair in history.windows(2) {
        assert_eq!(pair[0].state_after, pair[1].state_before);
        assert!(pair[0].persisted_at < pair[1].persisted_at);
    }
}

#[tokio::test]
async fn simulation_previews_the_same_path_without_side_effects() {
    let stores = Stores::new();
    let rt = runtime(order_component(), FakeClock::new(), &stores);

    let events: Vec<MachineEvent> = ["CONFIRM", "SHIP", "DELIVER"]
        .iter()
        .map(|t| MachineEvent::new(*t, json!({}), 0))
        .collect();
    let sim = rt.simulate_path("Order", &events).await.unwrap();
    assert!(sim.ok);
    assert_eq!(sim.path, ["Pending", "Confirmed", "Shipped", "Delivered"]);

    assert!(rt.instances().await.is_empty());
    assert!(stores.events.is_empty());
}
