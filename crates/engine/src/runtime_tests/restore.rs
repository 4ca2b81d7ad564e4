// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot restore and timeout resynchronisation after a restart.

use super::*;
use crate::method::MethodRegistry;
use sb_core::clock::epoch_ms_to_utc;
use sb_core::{Instance, Snapshot};
use sb_store::SnapshotStore;

/// Snapshot every transition so restart tests have fresh snapshots.
fn setup_interval_one(component: Component, clock: FakeClock, events: Arc<MemoryEventStore>, snapshots: Arc<MemorySnapshotStore>) -> Ctx {
    setup_full(component, MethodRegistry::new(), 1, clock, events, snapshots)
}

#[tokio::test]
async fn restore_reinstates_snapshots_and_rebuilds_indexes() {
    let clock = FakeClock::new();
    let events = Arc::new(MemoryEventStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());

    let before = setup_interval_one(order_component(), clock.clone(), events.clone(), snapshots.clone());
    let id = before.runtime.create_instance("Order", json!({"Id": 5})).await.unwrap();
    before.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap();
    let live = before.runtime.instance(id).await.unwrap();
    before.runtime.dispose().await;

    // A fresh runtime over the same stores.
    let mut after = setup_interval_one(order_component(), clock.clone(), events, snapshots);
    let report = after.runtime.restore().await.unwrap();
    assert_eq!(report.restored, 1);
    assert_eq!(report.resync, ResyncReport::default());

    // Snapshot → restore with no events in between: the instance is
    // identical to the live one.
    let restored = after.runtime.instance(id).await.unwrap();
    assert_eq!(restored, live);
    assert!(note_names(&drain(&mut after.notes)).contains(&"instance_restored"));

    // Indexes were rebuilt: routing works again.
    let count = after
        .runtime
        .broadcast_event("Order", "Confirmed", "SHIP", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(count, EngineError::NoMatchingTransition { .. }));
    after.runtime.send_event(id, "SHIP", json!({})).await.unwrap();
    assert_eq!(after.runtime.instance(id).await.unwrap().current_state, "Shipped");
}

#[tokio::test]
async fn restore_skips_snapshots_for_unknown_machines() {
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let orphan = Instance::new("Ghost", "Nowhere", json!({}), false, 0);
    snapshots
        .save_snapshot(Snapshot {
            instance: orphan,
            snapshot_at: epoch_ms_to_utc(0),
            last_event_id: None,
        })
        .await
        .unwrap();

    let mut ctx = setup_full(
        order_component(),
        MethodRegistry::new(),
        1,
        FakeClock::new(),
        Arc::new(MemoryEventStore::new()),
        snapshots,
    );
    let report = ctx.runtime.restore().await.unwrap();
    assert_eq!(report.restored, 0);
    assert!(note_names(&drain(&mut ctx.notes)).contains(&"restore_error"));
}

#[tokio::test]
async fn expired_timeout_fires_immediately_on_resync() {
    let clock = FakeClock::new();
    let events = Arc::new(MemoryEventStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());

    let before = setup_interval_one(payment_component(), clock.clone(), events.clone(), snapshots.clone());
    let id = before.runtime.create_instance("Payment", json!({"Id": 1})).await.unwrap();
    before.runtime.send_event(id, "INVOICE", json!({})).await.unwrap();
    before.runtime.dispose().await;

    // 40 minutes pass while the runtime is down; the 30-minute timeout
    // expired during the outage.
    clock.advance(Duration::from_secs(40 * 60));
    let after = setup_interval_one(payment_component(), clock.clone(), events.clone(), snapshots);
    let report = after.runtime.restore().await.unwrap();
    assert_eq!(report.resync.expired, 1);
    assert_eq!(report.resync.synced, 0);

    after.runtime.quiesce().await;
    // Expired is final: the instance transitioned and was disposed, and
    // the persisted event marks the expiry during downtime.
    assert!(after.runtime.instance(id).await.is_none());
    let history = after.runtime.instance_history(id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.state_after, "Expired");
    assert_eq!(last.event.payload["timedOut"], json!(true));
    assert_eq!(last.event.payload["expiredDuringRestart"], json!(true));
}

#[tokio::test]
async fn remaining_timeout_is_rearmed_with_the_balance() {
    let clock = FakeClock::new();
    let events = Arc::new(MemoryEventStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());

    let before = setup_interval_one(payment_component(), clock.clone(), events.clone(), snapshots.clone());
    let id = before.runtime.create_instance("Payment", json!({})).await.unwrap();
    before.runtime.send_event(id, "INVOICE", json!({})).await.unwrap();
    before.runtime.dispose().await;

    // Only 10 of the 30 minutes elapsed.
    clock.advance(Duration::from_secs(10 * 60));
    let after = setup_interval_one(payment_component(), clock.clone(), events, snapshots);
    let report = after.runtime.restore().await.unwrap();
    assert_eq!(report.resync.expired, 0);
    assert_eq!(report.resync.synced, 1);
    assert_eq!(after.runtime.wheel_task_count(), 1);

    // Resynchronising again is a no-op on task counts.
    let report = after.runtime.resynchronize_timeouts().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(after.runtime.wheel_task_count(), 1);

    assert_eq!(after.runtime.instance(id).await.unwrap().current_state, "AwaitPayment");
}

#[tokio::test]
async fn dispose_snapshots_active_instances() {
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let ctx = setup_full(
        order_component(),
        MethodRegistry::new(),
        // Interval high enough that no periodic snapshot runs.
        1000,
        FakeClock::new(),
        Arc::new(MemoryEventStore::new()),
        snapshots.clone(),
    );
    let id = ctx.runtime.create_instance("Order", json!({"Id": 1})).await.unwrap();
    ctx.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap();
    assert!(snapshots.is_empty());

    ctx.runtime.dispose().await;
    assert_eq!(snapshots.len(), 1);
    let stored = snapshots.snapshot(id).await.unwrap().unwrap();
    assert_eq!(stored.instance.current_state, "Confirmed");
}
