// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cascading-rule fan-out on state entry.

use super::*;
use sb_core::{CascadingRule, MatchingRule};

#[tokio::test]
async fn cascade_with_rules_routes_to_matching_inventory() {
    let mut ctx = setup(order_inventory_component());

    let p1 = ctx
        .runtime
        .create_instance("Inventory", json!({"Id": "P1", "stock": 10}))
        .await
        .unwrap();
    let p2 = ctx
        .runtime
        .create_instance("Inventory", json!({"Id": "P2", "stock": 5}))
        .await
        .unwrap();
    let order = ctx
        .runtime
        .create_instance("Order", json!({"Id": 1, "ProductId": "P1", "Quantity": 3}))
        .await
        .unwrap();

    ctx.runtime
        .send_event(order, "CONFIRM", json!({"orderId": 1}))
        .await
        .unwrap();
    ctx.runtime.quiesce().await;

    // Only the matching inventory instance transitioned, with the
    // template payload resolved from the order's view.
    assert_eq!(ctx.runtime.instance(p1).await.unwrap().current_state, "Reserved");
    assert_eq!(ctx.runtime.instance(p2).await.unwrap().current_state, "Available");

    let history = ctx.runtime.instance_history(p1).await.unwrap();
    let reserve = history.iter().find(|e| e.event.event_type == "RESERVE").unwrap();
    assert_eq!(reserve.event.payload, json!({"productId": "P1", "qty": 3}));

    // Causality: the inventory event is caused by the order's CONFIRM.
    let order_history = ctx.runtime.instance_history(order).await.unwrap();
    let confirm = order_history.iter().find(|e| e.event.event_type == "CONFIRM").unwrap();
    assert_eq!(reserve.caused_by, vec![confirm.id]);

    // And the forward trace starts at the order event and includes the
    // inventory event.
    let chain = ctx.runtime.trace_causality(confirm.id).await.unwrap();
    assert_eq!(chain[0].id, confirm.id);
    assert!(chain.iter().any(|e| e.id == reserve.id));

    let names = note_names(&drain(&mut ctx.notes));
    assert!(names.contains(&"cascade_completed"));
    assert!(!names.contains(&"cascade_error"));
}

#[tokio::test]
async fn cascade_without_rules_fans_out_to_the_state_bucket() {
    let source = MachineBuilder::new("Batch", "Loading")
        .state(StateBuilder::new("Loading", StateKind::Entry).build())
        .state(
            StateBuilder::new("Ready", StateKind::Regular)
                .cascade(CascadingRule::new("Worker", "Idle", "WAKE"))
                .build(),
        )
        .transition(TransitionBuilder::new("Loading", "Ready", "LOADED").build())
        .build();
    let worker = MachineBuilder::new("Worker", "Idle")
        .state(StateBuilder::new("Idle", StateKind::Entry).build())
        .state(StateBuilder::new("Busy", StateKind::Regular).build())
        .transition(TransitionBuilder::new("Idle", "Busy", "WAKE").build())
        .build();
    let component = Component::builder("batches")
        .machine(source)
        .machine(worker)
        .build()
        .unwrap();
    let mut ctx = setup(component);

    let mut workers = Vec::new();
    for _ in 0..3 {
        workers.push(ctx.runtime.create_instance("Worker", json!({})).await.unwrap());
    }
    let batch = ctx.runtime.create_instance("Batch", json!({})).await.unwrap();

    ctx.runtime.send_event(batch, "LOADED", json!({})).await.unwrap();
    ctx.runtime.quiesce().await;

    for id in workers {
        assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Busy");
    }
    let notes = drain(&mut ctx.notes);
    let completed = notes.iter().find_map(|n| match n {
        Notification::CascadeCompleted { processed, .. } => Some(*processed),
        _ => None,
    });
    assert_eq!(completed, Some(3));
}

#[tokio::test]
async fn failing_cascade_rule_is_isolated_from_the_rest() {
    // First rule targets transitions without matching rules (rejected by
    // the rule broadcast); the second rule still fans out.
    let source = MachineBuilder::new("Batch", "Loading")
        .state(StateBuilder::new("Loading", StateKind::Entry).build())
        .state(
            StateBuilder::new("Ready", StateKind::Regular)
                .cascade(
                    CascadingRule::new("Worker", "Idle", "WAKE")
                        .matching(MatchingRule::new("shard", "shard")),
                )
                .cascade(CascadingRule::new("Worker", "Idle", "WAKE"))
                .build(),
        )
        .transition(TransitionBuilder::new("Loading", "Ready", "LOADED").build())
        .build();
    // WAKE transition declares no matching rules, so the rules-mode
    // cascade cannot broadcast to it.
    let worker = MachineBuilder::new("Worker", "Idle")
        .state(StateBuilder::new("Idle", StateKind::Entry).build())
        .state(StateBuilder::new("Busy", StateKind::Regular).build())
        .transition(TransitionBuilder::new("Idle", "Busy", "WAKE").build())
        .build();
    let component = Component::builder("batches")
        .machine(source)
        .machine(worker)
        .build()
        .unwrap();
    let mut ctx = setup(component);

    let worker_id = ctx.runtime.create_instance("Worker", json!({"shard": 1})).await.unwrap();
    let batch = ctx.runtime.create_instance("Batch", json!({})).await.unwrap();
    ctx.runtime.send_event(batch, "LOADED", json!({})).await.unwrap();
    ctx.runtime.quiesce().await;

    // The rule-less cascade still delivered.
    assert_eq!(ctx.runtime.instance(worker_id).await.unwrap().current_state, "Busy");
    let names = note_names(&drain(&mut ctx.notes));
    assert!(names.contains(&"cascade_error"));
    assert!(names.contains(&"cascade_completed"));
}

#[tokio::test]
async fn cascade_on_terminal_state_still_fires() {
    // The source disposes on entering the final state; its payload was
    // resolved at commit time so the fan-out still carries it.
    let source = MachineBuilder::new("Run", "Active")
        .state(StateBuilder::new("Active", StateKind::Entry).build())
        .state(
            StateBuilder::new("Finished", StateKind::Final)
                .cascade(
                    CascadingRule::new("Archive", "Waiting", "STORE")
                        .payload(json!({"runId": "{{Id}}"})),
                )
                .build(),
        )
        .transition(TransitionBuilder::new("Active", "Finished", "END").build())
        .build();
    let archive = MachineBuilder::new("Archive", "Waiting")
        .state(StateBuilder::new("Waiting", StateKind::Entry).build())
        .state(StateBuilder::new("Stored", StateKind::Regular).build())
        .transition(TransitionBuilder::new("Waiting", "Stored", "STORE").build())
        .build();
    let component = Component::builder("runs")
        .machine(source)
        .machine(archive)
        .build()
        .unwrap();
    let ctx = setup(component);

    let archive_id = ctx.runtime.create_instance("Archive", json!({})).await.unwrap();
    let run = ctx.runtime.create_instance("Run", json!({"Id": "r-9"})).await.unwrap();
    ctx.runtime.send_event(run, "END", json!({})).await.unwrap();
    ctx.runtime.quiesce().await;

    assert!(ctx.runtime.instance(run).await.is_none());
    assert_eq!(ctx.runtime.instance(archive_id).await.unwrap().current_state, "Stored");
    let history = ctx.runtime.instance_history(archive_id).await.unwrap();
    let store = history.iter().find(|e| e.event.event_type == "STORE").unwrap();
    assert_eq!(store.event.payload, json!({"runId": "r-9"}));
}
