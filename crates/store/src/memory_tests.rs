// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sb_core::clock::epoch_ms_to_utc;
use sb_core::{Instance, MachineEvent};
use serde_json::json;

fn event_at(instance_id: InstanceId, ms: u64, ty: &str) -> PersistedEvent {
    PersistedEvent {
        id: EventId::new(),
        instance_id,
        machine_name: "Order".into(),
        component_name: "orders".into(),
        event: MachineEvent::new(ty, json!({}), ms),
        state_before: "A".into(),
        state_after: "B".into(),
        persisted_at: epoch_ms_to_utc(ms),
        caused_by: Vec::new(),
        caused: Vec::new(),
        source_component: None,
        target_component: None,
    }
}

#[tokio::test]
async fn append_and_query_by_instance() {
    let store = MemoryEventStore::new();
    let a = InstanceId::new();
    let b = InstanceId::new();
    store.append(event_at(a, 1, "E1")).await.unwrap();
    store.append(event_at(b, 2, "E2")).await.unwrap();
    store.append(event_at(a, 3, "E3")).await.unwrap();

    let events = store.events_for_instance(a).await.unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event.event_type.as_str()).collect();
    assert_eq!(types, ["E1", "E3"]);
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn unknown_instance_has_no_events() {
    let store = MemoryEventStore::new();
    assert!(store
        .events_for_instance(InstanceId::new())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn time_range_is_half_open() {
    let store = MemoryEventStore::new();
    let id = InstanceId::new();
    for ms in [10, 20, 30] {
        store.append(event_at(id, ms, "E")).await.unwrap();
    }
    let events = store
        .events_by_time_range(epoch_ms_to_utc(10), epoch_ms_to_utc(30))
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].persisted_at, epoch_ms_to_utc(10));
    assert_eq!(events[1].persisted_at, epoch_ms_to_utc(20));
}

#[tokio::test]
async fn caused_events_scans_back_references() {
    let store = MemoryEventStore::new();
    let id = InstanceId::new();
    let parent = event_at(id, 1, "PARENT");
    let parent_id = parent.id;
    let mut child = event_at(id, 2, "CHILD");
    child.caused_by = vec![parent_id];
    store.append(parent).await.unwrap();
    store.append(child).await.unwrap();

    let caused = store.caused_events(parent_id).await.unwrap();
    assert_eq!(caused.len(), 1);
    assert_eq!(caused[0].event.event_type, "CHILD");
}

#[tokio::test]
async fn link_caused_updates_parent() {
    let store = MemoryEventStore::new();
    let id = InstanceId::new();
    let parent = event_at(id, 1, "PARENT");
    let parent_id = parent.id;
    store.append(parent).await.unwrap();

    let child_id = EventId::new();
    assert!(store.link_caused(parent_id, child_id).await.unwrap());
    // Idempotent.
    assert!(store.link_caused(parent_id, child_id).await.unwrap());

    let stored = store.event(parent_id).await.unwrap().unwrap();
    assert_eq!(stored.caused, vec![child_id]);
}

#[tokio::test]
async fn link_caused_with_unknown_parent_is_a_noop() {
    let store = MemoryEventStore::new();
    assert!(!store
        .link_caused(EventId::new(), EventId::new())
        .await
        .unwrap());
}

#[tokio::test]
async fn snapshot_store_keeps_latest_per_instance() {
    let store = MemorySnapshotStore::new();
    let instance = Instance::new("Order", "Pending", json!({"Id": 1}), false, 100);
    let id = instance.id;

    store
        .save_snapshot(Snapshot {
            instance: instance.clone(),
            snapshot_at: epoch_ms_to_utc(100),
            last_event_id: None,
        })
        .await
        .unwrap();

    let mut later = instance;
    later.current_state = "Confirmed".into();
    store
        .save_snapshot(Snapshot {
            instance: later,
            snapshot_at: epoch_ms_to_utc(200),
            last_event_id: Some(EventId::new()),
        })
        .await
        .unwrap();

    assert_eq!(store.len(), 1);
    let stored = store.snapshot(id).await.unwrap().unwrap();
    assert_eq!(stored.instance.current_state, "Confirmed");

    store.delete_snapshot(id).await.unwrap();
    assert!(store.snapshot(id).await.unwrap().is_none());
    assert!(store.is_empty());
}
