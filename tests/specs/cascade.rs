// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cascades with payload templates and the resulting causality chain.

use super::prelude::*;
use sb_core::test_support::order_inventory_component;
use sb_core::FakeClock;
use serde_json::json;

#[tokio::test]
async fn confirming_an_order_reserves_the_matching_inventory() {
    let stores = Stores::new();
    let rt = runtime(order_inventory_component(), FakeClock::new(), &stores);

    let p1 = rt
        .create_instance("Inventory", json!({"Id": "P1"}))
        .await
        .unwrap();
    let p2 = rt
        .create_instance("Inventory", json!({"Id": "P2"}))
        .await
        .unwrap();
    let order = rt
        .create_instance("Order", json!({"Id": 1, "ProductId": "P1", "Quantity": 3}))
        .await
        .unwrap();

    rt.send_event(order, "CONFIRM", json!({"orderId": 1})).await.unwrap();
    rt.quiesce().await;

    // Available → Reserved with the templated payload.
    assert_eq!(rt.instance(p1).await.unwrap().current_state, "Reserved");
    assert_eq!(rt.instance(p2).await.unwrap().current_state, "Available");

    let inventory_history = rt.instance_history(p1).await.unwrap();
    let reserve = inventory_history
        .iter()
        .find(|e| e.event.event_type == "RESERVE")
        .unwrap();
    assert_eq!(reserve.event.payload, json!({"productId": "P1", "qty": 3}));

    // The inventory event's causedBy references the order's transition.
    let order_history = rt.instance_history(order).await.unwrap();
    let confirm = order_history
        .iter()
        .find(|e| e.event.event_type == "CONFIRM")
        .unwrap();
    assert_eq!(reserve.caused_by, vec![confirm.id]);
}

#[tokio::test]
async fn causality_trace_starts_at_the_order_and_reaches_the_inventory() {
    let stores = Stores::new();
    let rt = runtime(order_inventory_component(), FakeClock::new(), &stores);

    let p1 = rt
        .create_instance("Inventory", json!({"Id": "P1"}))
        .await
        .unwrap();
    let order = rt
        .create_instance("Order", json!({"Id": 1, "ProductId": "P1", "Quantity": 2}))
        .await
        .unwrap();
    rt.send_event(order, "CONFIRM", json!({"orderId": 1})).await.unwrap();
    rt.quiesce().await;

    let order_history = rt.instance_history(order).await.unwrap();
    let confirm = order_history
        .iter()
        .find(|e| e.event.event_type == "CONFIRM")
        .unwrap();

    let chain = rt.trace_causality(confirm.id).await.unwrap();
    assert_eq!(chain[0].id, confirm.id);
    let inventory_history = rt.instance_history(p1).await.unwrap();
    let reserve = inventory_history
        .iter()
        .find(|e| e.event.event_type == "RESERVE")
        .unwrap();
    assert!(chain.iter().any(|e| e.id == reserve.id));
}
