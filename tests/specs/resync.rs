// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart semantics: a timeout that expired during downtime fires
//! immediately after restore.

use super::prelude::*;
use sb_core::{
    Component, FakeClock, MachineBuilder, StateBuilder, StateKind, TransitionBuilder,
};
use serde_json::json;
use std::time::Duration;

fn payment_component() -> Component {
    let machine = MachineBuilder::new("Payment", "Pending")
        .state(StateBuilder::new("Pending", StateKind::Entry).build())
        .state(StateBuilder::new("AwaitPayment", StateKind::Regular).build())
        .state(StateBuilder::new("Paid", StateKind::Final).build())
        .state(StateBuilder::new("Expired", StateKind::Final).build())
        .transition(TransitionBuilder::new("Pending", "AwaitPayment", "INVOICE").build())
        .transition(TransitionBuilder::new("AwaitPayment", "Paid", "PAY").build())
        .transition(
            TransitionBuilder::new("AwaitPayment", "Expired", "PAYMENT_TIMEOUT")
                .timeout_ms(30 * 60 * 1000)
                .build(),
        )
        .build();
    match Component::builder("payments").machine(machine).build() {
        Ok(c) => c,
        Err(e) => panic!("fixture invalid: {e}"),
    }
}

#[tokio::test]
async fn timeout_expired_during_downtime_fires_on_restore() {
    let stores = Stores::new();
    let clock = FakeClock::new();

    // First life: an invoice waiting for payment, then a shutdown.
    let first = runtime(payment_component(), clock.clone(), &stores);
    let id = first.create_instance("Payment", json!({"Id": 1})).await.unwrap();
    first.send_event(id, "INVOICE", json!({})).await.unwrap();
    first.dispose().await;

    // 40 minutes pass; the 30-minute timeout expires while down.
    clock.advance(Duration::from_secs(40 * 60));

    let second = runtime(payment_component(), clock.clone(), &stores);
    let report = second.restore().await.unwrap();
    assert_eq!(report.restored, 1);
    assert_eq!(report.resync.expired, 1);
    assert_eq!(report.resync.synced, 0);

    second.quiesce().await;
    // Expired is terminal, so the instance transitioned and disposed;
    // the persisted event records the timeout during downtime.
    assert!(second.instance(id).await.is_none());
    let history = second.instance_history(id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.state_after, "Expired");
    assert_eq!(last.event.payload["timedOut"], json!(true));
    assert_eq!(last.event.payload["expiredDuringRestart"], json!(true));
}

#[tokio::test]
async fn unexpired_timeout_is_rearmed_with_its_remaining_duration() {
    let stores = Stores::new();
    let clock = FakeClock::new();

    let first = runtime(payment_component(), clock.clone(), &stores);
    let id = first.create_instance("Payment", json!({})).await.unwrap();
    first.send_event(id, "INVOICE", json!({})).await.unwrap();
    first.dispose().await;

    clock.advance(Duration::from_secs(10 * 60));

    let second = runtime(payment_component(), clock.clone(), &stores);
    let report = second.restore().await.unwrap();
    assert_eq!(report.resync.expired, 0);
    assert_eq!(report.resync.synced, 1);
    assert_eq!(second.wheel_task_count(), 1);

    // Resynchronising again is a no-op on wheel task counts.
    second.resynchronize_timeouts().await.unwrap();
    assert_eq!(second.wheel_task_count(), 1);
    assert_eq!(
        second.instance(id).await.unwrap().current_state,
        "AwaitPayment"
    );
}
