// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Creation, disposal, history, simulation, and entry-point semantics.

use super::*;
use sb_core::{EntryMachineMode, InstanceStatus, MachineEvent};

#[tokio::test]
async fn create_instance_unknown_machine_fails() {
    let ctx = setup(order_component());
    let err = ctx
        .runtime
        .create_instance("Ghost", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownMachine(name) if name == "Ghost"));
}

#[tokio::test]
async fn happy_path_visits_all_states_and_disposes() {
    let mut ctx = setup(order_component());
    let id = ctx.runtime.create_instance("Order", json!({"Id": 1})).await.unwrap();

    for event in ["CONFIRM", "SHIP", "DELIVER"] {
        let outcome = ctx.runtime.send_event(id, event, json!({})).await.unwrap();
        assert!(outcome.transitioned(), "{event} should transition");
    }
    ctx.runtime.quiesce().await;

    // Disposed after the final state.
    assert!(ctx.runtime.instance(id).await.is_none());
    assert!(ctx.runtime.instances().await.is_empty());
    assert_eq!(ctx.runtime.wheel_task_count(), 0);

    // Four persisted events with contiguous before/after states.
    let history = ctx.runtime.instance_history(id).await.unwrap();
    assert_eq!(history.len(), 4);
    let visited: Vec<&str> = history.iter().map(|e| e.state_after.as_str()).collect();
    assert_eq!(visited, ["Pending", "Confirmed", "Shipped", "Delivered"]);
    for pair in history.windows(2) {
        assert_eq!(pair[0].state_after, pair[1].state_before);
        assert!(pair[0].persisted_at < pair[1].persisted_at);
    }

    let notes = drain(&mut ctx.notes);
    let names = note_names(&notes);
    assert!(names.contains(&"instance_created"));
    assert!(names.contains(&"state_change"));
    assert!(names.contains(&"instance_disposed"));

    // Disposal removed the snapshot; a restore cannot resurrect it.
    assert!(ctx.snapshots.is_empty());
}

#[tokio::test]
async fn replaying_history_reaches_the_same_final_state() {
    let ctx = setup(order_component());
    let id = ctx.runtime.create_instance("Order", json!({"Id": 1})).await.unwrap();
    for event in ["CONFIRM", "SHIP", "DELIVER"] {
        ctx.runtime.send_event(id, event, json!({})).await.unwrap();
    }

    let history = ctx.runtime.instance_history(id).await.unwrap();
    // Fold the chain exactly as a replay would.
    let mut state = history[0].state_before.clone();
    for event in &history {
        assert_eq!(event.state_before, state);
        state = event.state_after.clone();
    }
    assert_eq!(state, "Delivered");
}

#[tokio::test]
async fn ignored_event_changes_nothing() {
    let mut ctx = setup(order_component());
    let id = ctx.runtime.create_instance("Order", json!({"Id": 1})).await.unwrap();
    drain(&mut ctx.notes);

    let outcome = ctx.runtime.send_event(id, "NONSENSE", json!({})).await.unwrap();
    assert_eq!(outcome, SendOutcome::Ignored);

    let notes = drain(&mut ctx.notes);
    assert_eq!(note_names(&notes), vec!["event_ignored"]);

    let instance = ctx.runtime.instance(id).await.unwrap();
    assert_eq!(instance.current_state, "Pending");
    assert_eq!(instance.status, InstanceStatus::Active);
    // Only the creation event is persisted.
    assert_eq!(ctx.runtime.instance_history(id).await.unwrap().len(), 1);
    assert_eq!(ctx.runtime.instances().await.len(), 1);
}

#[tokio::test]
async fn send_to_unknown_instance_fails() {
    let ctx = setup(order_component());
    let err = ctx
        .runtime
        .send_event(sb_core::InstanceId::new(), "CONFIRM", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownInstance(_)));
}

#[tokio::test]
async fn send_after_disposal_fails() {
    let ctx = setup(order_component());
    let id = ctx.runtime.create_instance("Order", json!({"Id": 1})).await.unwrap();
    for event in ["CONFIRM", "SHIP", "DELIVER"] {
        ctx.runtime.send_event(id, event, json!({})).await.unwrap();
    }
    let err = ctx.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownInstance(_)));
}

#[tokio::test]
async fn available_transitions_in_source_order() {
    let ctx = setup(order_component());
    let id = ctx.runtime.create_instance("Order", json!({})).await.unwrap();
    let transitions = ctx.runtime.available_transitions(id).await.unwrap();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].event, "CONFIRM");

    ctx.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap();
    let transitions = ctx.runtime.available_transitions(id).await.unwrap();
    assert_eq!(transitions[0].event, "SHIP");
}

#[tokio::test]
async fn simulate_path_walks_without_state_changes() {
    let ctx = setup(order_component());
    let events: Vec<MachineEvent> = ["CONFIRM", "SHIP", "DELIVER"]
        .iter()
        .map(|t| MachineEvent::new(*t, json!({}), 0))
        .collect();

    let sim = ctx.runtime.simulate_path("Order", &events).await.unwrap();
    assert!(sim.ok);
    assert_eq!(sim.path, ["Pending", "Confirmed", "Shipped", "Delivered"]);
    assert!(sim.error.is_none());

    // Pure: nothing was created or persisted.
    assert!(ctx.runtime.instances().await.is_empty());
    assert!(ctx.events.is_empty());
}

#[tokio::test]
async fn simulate_path_reports_dead_ends() {
    let ctx = setup(order_component());
    let events = vec![MachineEvent::new("SHIP", json!({}), 0)];
    let sim = ctx.runtime.simulate_path("Order", &events).await.unwrap();
    assert!(!sim.ok);
    assert_eq!(sim.path, ["Pending"]);
    assert!(sim.error.as_deref().unwrap_or_default().contains("SHIP"));
}

fn coordinator_component(mode: EntryMachineMode) -> Component {
    let machine = MachineBuilder::new("Coordinator", "Idle")
        .state(StateBuilder::new("Idle", StateKind::Entry).build())
        .state(StateBuilder::new("Done", StateKind::Final).build())
        .transition(TransitionBuilder::new("Idle", "Done", "FINISH").build())
        .build();
    match Component::builder("coordination")
        .entry_machine("Coordinator", mode)
        .machine(machine)
        .build()
    {
        Ok(c) => c,
        Err(e) => panic!("fixture invalid: {e}"),
    }
}

#[tokio::test]
async fn singleton_entry_instance_is_reused_and_never_disposed() {
    let mut ctx = setup(coordinator_component(EntryMachineMode::Singleton));
    let first = ctx.runtime.ensure_entry_instance().await.unwrap().unwrap();
    let second = ctx.runtime.ensure_entry_instance().await.unwrap().unwrap();
    assert_eq!(first, second);

    ctx.runtime.send_event(first, "FINISH", json!({})).await.unwrap();
    ctx.runtime.quiesce().await;

    // Retained in the table with terminal status, dropped from indexes,
    // and no disposal notification.
    let instance = ctx.runtime.instance(first).await.unwrap();
    assert_eq!(instance.status, InstanceStatus::Completed);
    assert!(instance.is_entry_point);
    let names = note_names(&drain(&mut ctx.notes));
    assert!(!names.contains(&"instance_disposed"));
}

#[tokio::test]
async fn multiple_mode_entry_instances_dispose_normally() {
    let mut ctx = setup(coordinator_component(EntryMachineMode::Multiple));
    let first = ctx.runtime.ensure_entry_instance().await.unwrap().unwrap();
    let second = ctx.runtime.ensure_entry_instance().await.unwrap().unwrap();
    assert_ne!(first, second);

    ctx.runtime.send_event(first, "FINISH", json!({})).await.unwrap();
    ctx.runtime.quiesce().await;
    assert!(ctx.runtime.instance(first).await.is_none());
    let names = note_names(&drain(&mut ctx.notes));
    assert!(names.contains(&"instance_disposed"));
}
