// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeout and auto transitions driven by the wheel.

use super::*;
use crate::engine::TimerTaskKind;
use sb_core::{Expression, Guard};

fn timed_component(timeout_ms: u64) -> Component {
    let machine = MachineBuilder::new("Job", "Running")
        .state(StateBuilder::new("Running", StateKind::Entry).build())
        .state(StateBuilder::new("Done", StateKind::Regular).build())
        .state(StateBuilder::new("Stalled", StateKind::Regular).build())
        .transition(TransitionBuilder::new("Running", "Done", "FINISH").build())
        .transition(
            TransitionBuilder::new("Running", "Stalled", "STALL_TIMEOUT")
                .timeout_ms(timeout_ms)
                .build(),
        )
        .build();
    Component::builder("jobs").machine(machine).build().unwrap()
}

#[tokio::test(start_paused = true)]
async fn timeout_fires_after_its_delay() {
    let ctx = setup(timed_component(100));
    let id = ctx.runtime.create_instance("Job", json!({})).await.unwrap();
    assert_eq!(ctx.runtime.wheel_task_count(), 1);

    advance(40).await;
    ctx.runtime.quiesce().await;
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Running");

    advance(100).await;
    ctx.runtime.quiesce().await;
    let instance = ctx.runtime.instance(id).await.unwrap();
    assert_eq!(instance.current_state, "Stalled");

    // The timeout event carries the timed-out marker.
    let history = ctx.runtime.instance_history(id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.event.event_type, "STALL_TIMEOUT");
    assert_eq!(last.event.payload["timedOut"], json!(true));
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_fires_at_the_earliest_tick() {
    let ctx = setup(timed_component(0));
    let id = ctx.runtime.create_instance("Job", json!({})).await.unwrap();

    advance(30).await;
    ctx.runtime.quiesce().await;
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Stalled");
}

#[tokio::test(start_paused = true)]
async fn leaving_the_state_cancels_its_timeout() {
    let ctx = setup(timed_component(100));
    let id = ctx.runtime.create_instance("Job", json!({})).await.unwrap();

    advance(40).await;
    ctx.runtime.send_event(id, "FINISH", json!({})).await.unwrap();

    // No wheel task keyed to the left state remains.
    {
        let engine = ctx.runtime.inner.engine.lock().await;
        assert!(engine.no_tasks_for_state(id, "Running"));
    }
    assert_eq!(ctx.runtime.wheel_task_count(), 0);

    advance(200).await;
    ctx.runtime.quiesce().await;
    let instance = ctx.runtime.instance(id).await.unwrap();
    assert_eq!(instance.current_state, "Done");
    let history = ctx.runtime.instance_history(id).await.unwrap();
    assert!(history.iter().all(|e| e.event.event_type != "STALL_TIMEOUT"));
}

#[tokio::test(start_paused = true)]
async fn auto_transition_fires_on_entry() {
    let machine = MachineBuilder::new("Pipeline", "Staged")
        .state(StateBuilder::new("Staged", StateKind::Entry).build())
        .state(StateBuilder::new("Active", StateKind::Regular).build())
        .transition(TransitionBuilder::new("Staged", "Active", "ACTIVATE").auto(0).build())
        .build();
    let component = Component::builder("pipelines").machine(machine).build().unwrap();
    let ctx = setup(component);

    let id = ctx.runtime.create_instance("Pipeline", json!({})).await.unwrap();
    advance(30).await;
    ctx.runtime.quiesce().await;
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Active");
}

#[tokio::test(start_paused = true)]
async fn guarded_auto_transition_stays_put_when_denied() {
    let machine = MachineBuilder::new("Pipeline", "Staged")
        .state(StateBuilder::new("Staged", StateKind::Entry).build())
        .state(StateBuilder::new("Active", StateKind::Regular).build())
        .transition(
            TransitionBuilder::new("Staged", "Active", "ACTIVATE")
                .auto(0)
                .guard(Guard::Expr {
                    rule: Expression::parse("context.ready === true").unwrap(),
                })
                .build(),
        )
        .build();
    let component = Component::builder("pipelines").machine(machine).build().unwrap();
    let mut ctx = setup(component);

    let id = ctx
        .runtime
        .create_instance("Pipeline", json!({"ready": false}))
        .await
        .unwrap();
    advance(30).await;
    ctx.runtime.quiesce().await;

    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Staged");
    assert!(note_names(&drain(&mut ctx.notes)).contains(&"guard_failed"));
}

#[tokio::test(start_paused = true)]
async fn fired_task_for_a_left_state_is_dropped() {
    let ctx = setup(timed_component(100));
    let id = ctx.runtime.create_instance("Job", json!({})).await.unwrap();

    // Re-arm a task for a state the instance is about to leave, then
    // leave it; the firing finds the armed state gone and drops.
    let task = TimerTask {
        instance_id: id,
        state: "Running".to_string(),
        event_type: "STALL_TIMEOUT".to_string(),
        kind: TimerTaskKind::Timeout,
    };
    ctx.runtime.inner.wheel.lock().add_timeout("orphan", 50, task);

    ctx.runtime.send_event(id, "FINISH", json!({})).await.unwrap();
    advance(500).await;
    ctx.runtime.quiesce().await;
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Done");
    let history = ctx.runtime.instance_history(id).await.unwrap();
    assert!(history.iter().all(|e| e.event.event_type != "STALL_TIMEOUT"));
}
