// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-component routing through a registry and duplicate-tolerant
//! delivery under at-least-once semantics.

use super::prelude::*;
use sb_broker::{MemoryBroker, MessageBroker};
use sb_core::{FakeClock, PropertyFilter};
use sb_registry::ComponentRegistry;
use sb_wire::{channel, CommandMessage};
use serde_json::json;
use std::sync::Arc;

struct Cluster {
    registry: ComponentRegistry<FakeClock>,
    orders: sb_engine::Runtime<FakeClock>,
    inventory: sb_engine::Runtime<FakeClock>,
}

async fn cluster() -> Cluster {
    let clock = FakeClock::new();
    let registry = ComponentRegistry::new(Arc::new(MemoryBroker::new()));
    let orders = runtime(orders_component(), clock.clone(), &Stores::new());
    let inventory = runtime(inventory_component(), clock.clone(), &Stores::new());
    registry.register(orders.clone()).await.unwrap();
    registry.register(inventory.clone()).await.unwrap();
    Cluster {
        registry,
        orders,
        inventory,
    }
}

#[tokio::test]
async fn order_confirmation_cascades_across_components() {
    let cluster = cluster().await;
    let stock = cluster
        .inventory
        .create_instance("Stock", json!({"Id": "P1"}))
        .await
        .unwrap();
    let order = cluster
        .orders
        .create_instance("Order", json!({"Id": 1, "ProductId": "P1", "Quantity": 3}))
        .await
        .unwrap();

    cluster
        .orders
        .send_event(order, "CONFIRM", json!({"orderId": 1}))
        .await
        .unwrap();
    cluster.orders.quiesce().await;

    let inventory = cluster.inventory.clone();
    wait_until("cross-component reservation", || {
        let inventory = inventory.clone();
        async move {
            inventory
                .instance(stock)
                .await
                .map(|i| i.current_state == "Reserved")
                .unwrap_or(false)
        }
    })
    .await;

    // Causality spans the component boundary.
    let order_history = cluster.orders.instance_history(order).await.unwrap();
    let confirm = order_history
        .iter()
        .find(|e| e.event.event_type == "CONFIRM")
        .unwrap();
    let chain = cluster.registry.trace_causality(confirm.id).await;
    assert!(chain
        .iter()
        .any(|e| e.component_name == "inventory" && e.event.event_type == "RESERVE"));
}

#[tokio::test]
async fn duplicated_delivery_leaves_a_single_transition() {
    let cluster = cluster().await;
    let stock = cluster
        .inventory
        .create_instance("Stock", json!({"Id": "P1"}))
        .await
        .unwrap();

    let envelope = serde_json::to_value(CommandMessage::CrossComponentEvent {
        source_component: "orders".into(),
        target_component: "inventory".into(),
        target_machine: "Stock".into(),
        target_state: "Available".into(),
        event_type: "RESERVE".into(),
        payload: json!({"productId": "P1"}),
        matching_rules: vec![PropertyFilter::eq("Id", json!("P1"))],
        caused_by: None,
    })
    .unwrap();

    // The broker duplicates the message (at-least-once).
    let broker = cluster.registry.broker();
    let channel_name = channel::component_channel("inventory");
    broker.publish(&channel_name, envelope.clone()).await.unwrap();
    broker.publish(&channel_name, envelope).await.unwrap();

    let inventory = cluster.inventory.clone();
    wait_until("reservation", || {
        let inventory = inventory.clone();
        async move {
            inventory
                .instance(stock)
                .await
                .map(|i| i.current_state == "Reserved")
                .unwrap_or(false)
        }
    })
    .await;
    cluster.inventory.quiesce().await;

    // The second delivery found no applicable transition; the final
    // state matches a single-delivery run.
    let history = cluster.inventory.instance_history(stock).await.unwrap();
    let reserves = history
        .iter()
        .filter(|e| e.event.event_type == "RESERVE")
        .count();
    assert_eq!(reserves, 1);
}
