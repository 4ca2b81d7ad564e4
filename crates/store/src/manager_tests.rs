// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::memory::{MemoryEventStore, MemorySnapshotStore};
use sb_core::clock::epoch_ms_to_utc;
use sb_core::MachineEvent;
use serde_json::json;

fn manager_with(interval: u64) -> (PersistenceManager, Arc<MemoryEventStore>, Arc<MemorySnapshotStore>) {
    let events = Arc::new(MemoryEventStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let manager = PersistenceManager::new(
        events.clone(),
        snapshots.clone(),
        PersistenceConfig {
            snapshot_interval: interval,
        },
    );
    (manager, events, snapshots)
}

fn request(instance_id: InstanceId, ty: &str, before: &str, after: &str) -> PersistRequest {
    PersistRequest {
        instance_id,
        machine_name: "Order".into(),
        component_name: "orders".into(),
        event: MachineEvent::new(ty, json!({}), 0),
        state_before: before.into(),
        state_after: after.into(),
        caused_by: None,
        source_component: None,
        target_component: None,
    }
}

#[tokio::test]
async fn persist_event_appends_and_returns_id() {
    let (manager, events, _) = manager_with(10);
    let instance_id = InstanceId::new();
    let id = manager
        .persist_event(request(instance_id, "CONFIRM", "Pending", "Confirmed"), epoch_ms_to_utc(1_000))
        .await
        .unwrap();
    let stored = events.event(id).await.unwrap().unwrap();
    assert_eq!(stored.state_before, "Pending");
    assert_eq!(stored.state_after, "Confirmed");
    assert_eq!(stored.persisted_at, epoch_ms_to_utc(1_000));
}

#[tokio::test]
async fn equal_millisecond_appends_stay_strictly_monotonic() {
    let (manager, _, _) = manager_with(10);
    let instance_id = InstanceId::new();
    let now = epoch_ms_to_utc(1_000);
    manager
        .persist_event(request(instance_id, "A", "S1", "S2"), now)
        .await
        .unwrap();
    manager
        .persist_event(request(instance_id, "B", "S2", "S3"), now)
        .await
        .unwrap();
    manager
        .persist_event(request(instance_id, "C", "S3", "S4"), now)
        .await
        .unwrap();

    let history = manager.history(instance_id).await.unwrap();
    assert_eq!(history.len(), 3);
    for pair in history.windows(2) {
        assert!(pair[0].persisted_at < pair[1].persisted_at);
        assert_eq!(pair[0].state_after, pair[1].state_before);
    }
}

#[tokio::test]
async fn causality_links_both_directions() {
    let (manager, events, _) = manager_with(10);
    let order = InstanceId::new();
    let inventory = InstanceId::new();
    let now = epoch_ms_to_utc(1_000);

    let parent = manager
        .persist_event(request(order, "CONFIRM", "Pending", "Confirmed"), now)
        .await
        .unwrap();

    let mut child_req = request(inventory, "RESERVE", "Available", "Reserved");
    child_req.caused_by = Some(parent);
    let child = manager.persist_event(child_req, now).await.unwrap();

    let stored_parent = events.event(parent).await.unwrap().unwrap();
    assert_eq!(stored_parent.caused, vec![child]);
    let stored_child = events.event(child).await.unwrap().unwrap();
    assert_eq!(stored_child.caused_by, vec![parent]);
}

#[tokio::test]
async fn trace_causality_walks_forward_and_terminates_on_cycles() {
    let (manager, events, _) = manager_with(10);
    let a = InstanceId::new();
    let b = InstanceId::new();
    let now = epoch_ms_to_utc(1_000);

    let root = manager
        .persist_event(request(a, "CONFIRM", "Pending", "Confirmed"), now)
        .await
        .unwrap();
    let mut mid_req = request(b, "RESERVE", "Available", "Reserved");
    mid_req.caused_by = Some(root);
    let mid = manager.persist_event(mid_req, now).await.unwrap();
    let mut leaf_req = request(a, "NOTIFY", "Confirmed", "Confirmed");
    leaf_req.caused_by = Some(mid);
    let leaf = manager.persist_event(leaf_req, now).await.unwrap();

    // Manufacture a cycle: root caused-by leaf.
    events.link_caused(leaf, root).await.unwrap();

    let chain = manager.trace_causality(root).await.unwrap();
    let ids: Vec<EventId> = chain.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![root, mid, leaf]);
}

#[tokio::test]
async fn trace_causality_unknown_root_errors() {
    let (manager, _, _) = manager_with(10);
    let err = manager.trace_causality(EventId::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::EventNotFound(_)));
}

#[tokio::test]
async fn snapshots_written_at_interval_multiples() {
    let (manager, _, snapshots) = manager_with(3);
    let instance = Instance::new("Order", "Pending", json!({"Id": 1}), false, 0);
    let now = epoch_ms_to_utc(1_000);

    for i in 1..=7u64 {
        let wrote = manager
            .maybe_snapshot(&instance, None, now)
            .await
            .unwrap();
        assert_eq!(wrote, i % 3 == 0, "transition {i}");
    }
    assert_eq!(snapshots.len(), 1);
}

#[tokio::test]
async fn forget_instance_clears_snapshot_and_counters() {
    let (manager, _, snapshots) = manager_with(1);
    let instance = Instance::new("Order", "Pending", json!({}), false, 0);
    manager
        .maybe_snapshot(&instance, None, epoch_ms_to_utc(1))
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);

    manager.forget_instance(instance.id).await.unwrap();
    assert!(snapshots.is_empty());
}

#[tokio::test]
async fn restore_all_returns_stored_snapshots() {
    let (manager, _, _) = manager_with(1);
    let a = Instance::new("Order", "Pending", json!({}), false, 0);
    let b = Instance::new("Order", "Confirmed", json!({}), false, 0);
    manager.snapshot_now(&a, None, epoch_ms_to_utc(1)).await.unwrap();
    manager.snapshot_now(&b, None, epoch_ms_to_utc(2)).await.unwrap();

    let restored = manager.restore_all().await.unwrap();
    assert_eq!(restored.len(), 2);
}
