// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::epoch_ms_to_utc;
use serde_json::json;

fn sample_event() -> PersistedEvent {
    PersistedEvent {
        id: EventId::new(),
        instance_id: InstanceId::new(),
        machine_name: "Order".into(),
        component_name: "orders".into(),
        event: MachineEvent::new("CONFIRM", json!({"orderId": 1}), 1_000),
        state_before: "Pending".into(),
        state_after: "Confirmed".into(),
        persisted_at: epoch_ms_to_utc(1_000),
        caused_by: Vec::new(),
        caused: Vec::new(),
        source_component: None,
        target_component: None,
    }
}

#[test]
fn machine_event_serializes_with_type_tag() {
    let event = MachineEvent::new("CONFIRM", json!({"a": 1}), 5);
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "CONFIRM");
    assert_eq!(value["timestamp"], 5);
}

#[test]
fn machine_event_payload_defaults_to_null() {
    let event: MachineEvent =
        serde_json::from_value(json!({"type": "PING", "timestamp": 1})).unwrap();
    assert_eq!(event.payload, serde_json::Value::Null);
}

#[test]
fn persisted_event_round_trip() {
    let event = sample_event();
    let json = serde_json::to_string(&event).unwrap();
    let back: PersistedEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(event, back);
}

#[test]
fn empty_causality_links_are_omitted() {
    let value = serde_json::to_value(sample_event()).unwrap();
    assert!(value.get("causedBy").is_none());
    assert!(value.get("caused").is_none());
}

#[test]
fn snapshot_round_trip() {
    let snapshot = Snapshot {
        instance: Instance::new("Order", "Pending", json!({"Id": 1}), false, 1_000),
        snapshot_at: epoch_ms_to_utc(2_000),
        last_event_id: Some(EventId::new()),
    };
    let json = serde_json::to_string(&snapshot).unwrap();
    let back: Snapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(snapshot, back);
}
