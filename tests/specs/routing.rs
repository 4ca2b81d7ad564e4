// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property routing at scale: one broadcast, ten thousand instances,
//! exactly one receiver.

use super::prelude::*;
use sb_core::test_support::order_component;
use sb_core::FakeClock;
use serde_json::json;

#[tokio::test]
async fn broadcast_transitions_exactly_the_matching_order() {
    let stores = Stores::new();
    let rt = runtime(order_component(), FakeClock::new(), &stores);

    let mut ids = Vec::with_capacity(10_000);
    for n in 0..10_000 {
        ids.push(rt.create_instance("Order", json!({"Id": n})).await.unwrap());
    }

    let count = rt
        .broadcast_event("Order", "Pending", "CONFIRM", json!({"orderId": 5_000}))
        .await
        .unwrap();
    assert_eq!(count, 1);

    let confirmed = rt.instances_by_machine("Order").await;
    let moved: Vec<_> = confirmed
        .iter()
        .filter(|i| i.current_state == "Confirmed")
        .collect();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].view()["Id"], json!(5_000));
}

#[tokio::test]
async fn index_routing_matches_a_naive_state_scan() {
    let stores = Stores::new();
    let rt = runtime(order_component(), FakeClock::new(), &stores);

    for n in 0..200 {
        rt.create_instance("Order", json!({"Id": n % 50})).await.unwrap();
    }

    // Naive scan of the target state with the same rule.
    let expected: Vec<_> = rt
        .instances_by_machine("Order")
        .await
        .into_iter()
        .filter(|i| i.current_state == "Pending" && i.view()["Id"] == json!(7))
        .map(|i| i.id)
        .collect();

    let count = rt
        .broadcast_event("Order", "Pending", "CONFIRM", json!({"orderId": 7}))
        .await
        .unwrap();
    assert_eq!(count, expected.len());

    for id in expected {
        assert_eq!(rt.instance(id).await.unwrap().current_state, "Confirmed");
    }
}
