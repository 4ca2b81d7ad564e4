// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime behaviour tests: lifecycle, routing, timers, methods,
//! cascades, restore.

mod cascades;
mod lifecycle;
mod methods;
mod restore;
mod routing;
mod timers;

use super::*;
use crate::method::MethodRegistry;
use crate::wheel::TimerWheelConfig;
use sb_core::test_support::{order_component, order_inventory_component};
use sb_core::{FakeClock, MachineBuilder, StateBuilder, StateKind, TransitionBuilder};
use sb_store::{MemoryEventStore, MemorySnapshotStore, PersistenceConfig};
use serde_json::json;

pub(crate) struct Ctx {
    pub runtime: Runtime<FakeClock>,
    pub clock: FakeClock,
    pub events: Arc<MemoryEventStore>,
    pub snapshots: Arc<MemorySnapshotStore>,
    pub notes: broadcast::Receiver<Notification>,
}

/// Build a runtime over fresh in-memory stores, snapshotting every
/// `snapshot_interval` transitions.
pub(crate) fn setup_full(
    component: Component,
    methods: MethodRegistry,
    snapshot_interval: u64,
    clock: FakeClock,
    events: Arc<MemoryEventStore>,
    snapshots: Arc<MemorySnapshotStore>,
) -> Ctx {
    let persistence = Arc::new(PersistenceManager::new(
        events.clone(),
        snapshots.clone(),
        PersistenceConfig { snapshot_interval },
    ));
    let options = RuntimeOptions::new(clock.clone())
        .wheel(TimerWheelConfig {
            tick_ms: 10,
            wheel_size: 512,
        })
        .persistence(persistence)
        .methods(Arc::new(methods));
    let runtime = match Runtime::new(component, options) {
        Ok(r) => r,
        Err(e) => panic!("runtime construction failed: {e}"),
    };
    let notes = runtime.subscribe();
    Ctx {
        runtime,
        clock,
        events,
        snapshots,
        notes,
    }
}

pub(crate) fn setup_with(component: Component, methods: MethodRegistry) -> Ctx {
    setup_full(
        component,
        methods,
        10,
        FakeClock::new(),
        Arc::new(MemoryEventStore::new()),
        Arc::new(MemorySnapshotStore::new()),
    )
}

pub(crate) fn setup(component: Component) -> Ctx {
    setup_with(component, MethodRegistry::new())
}

/// Payment flow with a 30-minute timeout out of `AwaitPayment`.
pub(crate) fn payment_component() -> Component {
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

/// Drain everything currently buffered on a notification receiver.
pub(crate) fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

pub(crate) fn note_names(notes: &[Notification]) -> Vec<&'static str> {
    notes.iter().map(Notification::name).collect()
}

/// Let the virtual clock advance and background tasks drain.
pub(crate) async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
