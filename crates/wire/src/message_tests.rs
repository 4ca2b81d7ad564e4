// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sb_core::test_support::order_component;
use serde_json::json;

#[test]
fn announce_round_trips_with_full_component_definition() {
    let message = RegistryMessage::Announce {
        runtime_id: RuntimeId::new(),
        component_name: "orders".into(),
        component: order_component(),
        host: "worker-1".into(),
        port: 7400,
    };
    let payload = serde_json::to_value(&message).unwrap();
    assert_eq!(payload["type"], "announce");
    let back: RegistryMessage = decode(&payload).unwrap();
    assert_eq!(message, back);
}

#[test]
fn cross_component_event_round_trips() {
    let message = CommandMessage::CrossComponentEvent {
        source_component: "orders".into(),
        target_component: "inventory".into(),
        target_machine: "Stock".into(),
        target_state: "Available".into(),
        event_type: "RESERVE".into(),
        payload: json!({"productId": "P1"}),
        matching_rules: vec![PropertyFilter::eq("Id", json!("P1"))],
        caused_by: Some(EventId::new()),
    };
    let payload = serde_json::to_value(&message).unwrap();
    assert_eq!(payload["type"], "cross_component_event");
    let back: CommandMessage = decode(&payload).unwrap();
    assert_eq!(message, back);
}

#[test]
fn trigger_event_payload_defaults_to_null() {
    let payload = json!({
        "type": "trigger_event",
        "component_name": "orders",
        "instance_id": InstanceId::new(),
        "event_type": "CONFIRM",
    });
    let message: CommandMessage = decode(&payload).unwrap();
    match message {
        CommandMessage::TriggerEvent { payload, .. } => assert!(payload.is_null()),
        other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn malformed_payloads_fail_to_decode() {
    let payload = json!({"type": "trigger_event", "component_name": "orders"});
    assert!(decode::<CommandMessage>(&payload).is_err());
    let payload = json!({"type": "no_such_message"});
    assert!(decode::<RegistryMessage>(&payload).is_err());
    assert!(decode::<EventMessage>(&json!("not an object")).is_err());
}

#[test]
fn query_response_round_trips() {
    let response = QueryResponse {
        runtime_id: RuntimeId::new(),
        component_name: "orders".into(),
        instances: vec![Instance::new("Order", "Pending", json!({"Id": 1}), false, 9)],
        timestamp_ms: 10,
    };
    let payload = serde_json::to_value(&response).unwrap();
    let back: QueryResponse = decode(&payload).unwrap();
    assert_eq!(response, back);
}
