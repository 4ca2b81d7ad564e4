// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-component runtime: public API surface, mailbox, timer driver.
//!
//! All engine state sits behind one async lock; public calls take the
//! lock, run one operation to completion, and hand any follow-up work
//! (sender operations, cascades, timer firings) to the mailbox task.
//! That preserves the one-transition-at-a-time guarantee and keeps
//! follow-ups from re-entering a transition synchronously. Tests and
//! bridges that need post-conditions await [`Runtime::quiesce`], which
//! resolves when the mailbox and ready queue are empty.

use crate::engine::{
    ExecutionEngine, FollowUp, ResyncReport, RestoreReport, SendOutcome, Simulation, TimerTask,
};
use crate::error::EngineError;
use crate::method::MethodRegistry;
use crate::router::{CrossRouter, NoopRouter};
use crate::wheel::{TimerWheel, TimerWheelConfig};
use sb_core::{
    Clock, Component, EventId, Instance, InstanceId, MachineEvent, Notification, PersistedEvent,
    PropertyFilter, SystemClock, Transition,
};
use sb_store::PersistenceManager;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use tokio_util::sync::CancellationToken;

const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Construction-time dependencies of a runtime.
pub struct RuntimeOptions<C: Clock> {
    pub clock: C,
    pub wheel: TimerWheelConfig,
    pub persistence: Option<Arc<PersistenceManager>>,
    pub methods: Arc<MethodRegistry>,
}

impl Default for RuntimeOptions<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> RuntimeOptions<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            wheel: TimerWheelConfig::default(),
            persistence: None,
            methods: Arc::new(MethodRegistry::new()),
        }
    }

    pub fn wheel(mut self, config: TimerWheelConfig) -> Self {
        self.wheel = config;
        self
    }

    pub fn persistence(mut self, manager: Arc<PersistenceManager>) -> Self {
        self.persistence = Some(manager);
        self
    }

    pub fn methods(mut self, registry: Arc<MethodRegistry>) -> Self {
        self.methods = registry;
        self
    }
}

enum Msg {
    FollowUps(Vec<FollowUp>),
    Timers(Vec<TimerTask>),
}

struct Inner<C: Clock> {
    component: Arc<Component>,
    clock: C,
    engine: Mutex<ExecutionEngine<C>>,
    wheel: Arc<parking_lot::Mutex<TimerWheel<TimerTask>>>,
    persistence: Option<Arc<PersistenceManager>>,
    notifications: broadcast::Sender<Notification>,
    router: parking_lot::RwLock<Arc<dyn CrossRouter>>,
    tx: mpsc::UnboundedSender<Msg>,
    pending: AtomicUsize,
    idle: Notify,
    cancel: CancellationToken,
}

/// A running component: the engine plus its mailbox and timer driver.
pub struct Runtime<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for Runtime<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock> Runtime<C> {
    /// Validate the component and start the runtime tasks.
    pub fn new(component: Component, options: RuntimeOptions<C>) -> Result<Self, EngineError> {
        component.validate()?;
        let component = Arc::new(component);
        let wheel = Arc::new(parking_lot::Mutex::new(TimerWheel::new(
            options.wheel.clone(),
        )));
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();

        let engine = ExecutionEngine::new(
            Arc::clone(&component),
            options.clock.clone(),
            Arc::clone(&wheel),
            options.persistence.clone(),
            Arc::clone(&options.methods),
            notifications.clone(),
        );

        let runtime = Self {
            inner: Arc::new(Inner {
                component,
                clock: options.clock,
                engine: Mutex::new(engine),
                wheel,
                persistence: options.persistence,
                notifications,
                router: parking_lot::RwLock::new(Arc::new(NoopRouter)),
                tx,
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
                cancel: CancellationToken::new(),
            }),
        };
        runtime.spawn_mailbox(rx);
        runtime.spawn_timer_driver(options.wheel.tick_ms);
        Ok(runtime)
    }

    fn spawn_mailbox(&self, mut rx: mpsc::UnboundedReceiver<Msg>) {
        let runtime = self.clone();
        tokio::spawn(async move {
            let cancel = runtime.inner.cancel.clone();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = rx.recv() => {
                        let Some(msg) = msg else { break };
                        runtime.process_msg(msg).await;
                        if runtime.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                            runtime.inner.idle.notify_waiters();
                        }
                    }
                }
            }
        });
    }

    fn spawn_timer_driver(&self, tick_ms: u64) {
        let runtime = self.clone();
        tokio::spawn(async move {
            let cancel = runtime.inner.cancel.clone();
            let mut interval = tokio::time::interval(Duration::from_millis(tick_ms.max(1)));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let due = runtime.inner.wheel.lock().tick();
                        if !due.is_empty() {
                            let tasks = due.into_iter().map(|(_, task)| task).collect();
                            runtime.enqueue(Msg::Timers(tasks));
                        }
                    }
                }
            }
        });
    }

    fn enqueue(&self, msg: Msg) {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        if self.inner.tx.send(msg).is_err() {
            // Mailbox task gone (runtime disposed); drop the work.
            if self.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                self.inner.idle.notify_waiters();
            }
        }
    }

    pub(crate) fn dispatch(&self, follow_ups: Vec<FollowUp>) {
        if follow_ups.is_empty() {
            return;
        }
        self.enqueue(Msg::FollowUps(follow_ups));
    }

    async fn process_msg(&self, msg: Msg) {
        match msg {
            Msg::FollowUps(list) => {
                for follow_up in list {
                    self.handle_follow_up(follow_up).await;
                }
            }
            Msg::Timers(tasks) => {
                for task in tasks {
                    let result = {
                        let mut engine = self.inner.engine.lock().await;
                        engine.timer_fired(task).await
                    };
                    match result {
                        Ok((_, follow_ups)) => self.dispatch(follow_ups),
                        Err(e) => tracing::debug!(error = %e, "timer delivery failed"),
                    }
                }
            }
        }
    }

    async fn handle_follow_up(&self, follow_up: FollowUp) {
        match follow_up {
            FollowUp::Deliver {
                instance_id,
                event_type,
                payload,
                caused_by,
                timed_out,
            } => {
                let event = self.event(event_type, payload);
                let result = {
                    let mut engine = self.inner.engine.lock().await;
                    engine.send_event(instance_id, event, caused_by, timed_out).await
                };
                match result {
                    Ok((_, follow_ups)) => self.dispatch(follow_ups),
                    Err(e) => {
                        tracing::debug!(instance = %instance_id, error = %e, "deferred delivery failed")
                    }
                }
            }
            FollowUp::FilteredFanOut {
                machine,
                state,
                event_type,
                payload,
                filters,
                caused_by,
            } => {
                let event = self.event(event_type, payload);
                if let Err(e) = self
                    .deliver_filtered(&machine, &state, event, filters, caused_by)
                    .await
                {
                    tracing::warn!(%machine, %state, error = %e, "fan-out failed");
                }
            }
            FollowUp::Spawn {
                machine,
                fields,
                caused_by,
            } => {
                let result = {
                    let mut engine = self.inner.engine.lock().await;
                    engine.create_instance(&machine, fields, caused_by, false).await
                };
                if let Err(e) = result {
                    tracing::warn!(%machine, error = %e, "deferred instance creation failed");
                }
            }
            FollowUp::Cascade {
                source,
                state,
                items,
                caused_by,
            } => {
                self.process_cascade(source, state, items, caused_by).await;
            }
            FollowUp::CrossSend {
                component,
                instance_id,
                event_type,
                payload,
                caused_by,
            } => {
                let event = self.event(event_type.clone(), payload);
                let router = self.router();
                if let Err(e) = router
                    .send_to_component(
                        &self.inner.component.name,
                        &component,
                        instance_id,
                        event,
                        caused_by,
                    )
                    .await
                {
                    self.emit_notification(Notification::BroadcastError {
                        machine_name: component,
                        state: String::new(),
                        event_type,
                        reason: e.to_string(),
                    });
                }
            }
            FollowUp::CrossBroadcast {
                component,
                machine,
                state,
                event_type,
                payload,
                filters,
                caused_by,
            } => {
                let event = self.event(event_type.clone(), payload);
                let router = self.router();
                if let Err(e) = router
                    .broadcast_to_component(
                        &self.inner.component.name,
                        &component,
                        &machine,
                        &state,
                        event,
                        filters,
                        caused_by,
                    )
                    .await
                {
                    self.emit_notification(Notification::BroadcastError {
                        machine_name: machine,
                        state,
                        event_type,
                        reason: e.to_string(),
                    });
                }
            }
            FollowUp::CrossCreate {
                component,
                machine,
                fields,
                caused_by,
            } => {
                let router = self.router();
                if let Err(e) = router
                    .create_instance_in_component(
                        &self.inner.component.name,
                        &component,
                        &machine,
                        fields,
                        caused_by,
                    )
                    .await
                {
                    tracing::warn!(target = %component, %machine, error = %e, "cross-component create failed");
                }
            }
        }
    }

    fn event(&self, event_type: String, payload: Value) -> MachineEvent {
        MachineEvent::new(event_type, payload, self.inner.clock.epoch_ms())
    }

    // === public API ===

    pub fn component(&self) -> Arc<Component> {
        Arc::clone(&self.inner.component)
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.clock.epoch_ms()
    }

    /// Subscribe to observable engine notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifications.subscribe()
    }

    /// Emit a notification on this runtime's channel (bridges and the
    /// registry report delivery errors here).
    pub fn emit_notification(&self, notification: Notification) {
        let _ = self.inner.notifications.send(notification);
    }

    /// Swap in a cross-component router (done by the registry).
    pub fn set_router(&self, router: Arc<dyn CrossRouter>) {
        *self.inner.router.write() = router;
    }

    pub(crate) fn router(&self) -> Arc<dyn CrossRouter> {
        Arc::clone(&self.inner.router.read())
    }

    /// Create a new instance of a machine.
    pub async fn create_instance(
        &self,
        machine: &str,
        initial_fields: Value,
    ) -> Result<InstanceId, EngineError> {
        let mut engine = self.inner.engine.lock().await;
        engine.create_instance(machine, initial_fields, None, false).await
    }

    /// Create an instance recording the event that caused it
    /// (cross-component path).
    pub async fn create_instance_caused(
        &self,
        machine: &str,
        initial_fields: Value,
        caused_by: Option<EventId>,
    ) -> Result<InstanceId, EngineError> {
        let mut engine = self.inner.engine.lock().await;
        engine.create_instance(machine, initial_fields, caused_by, false).await
    }

    /// Find or create the component's entry-point instance.
    pub async fn ensure_entry_instance(&self) -> Result<Option<InstanceId>, EngineError> {
        let mut engine = self.inner.engine.lock().await;
        engine.ensure_entry_instance().await
    }

    /// Send an event to one instance.
    pub async fn send_event(
        &self,
        instance_id: InstanceId,
        event_type: &str,
        payload: Value,
    ) -> Result<SendOutcome, EngineError> {
        let event = self.event(event_type.to_string(), payload);
        self.send_event_caused(instance_id, event, None).await
    }

    /// Send a pre-built event, recording its cause (cross-component and
    /// registry path).
    pub async fn send_event_caused(
        &self,
        instance_id: InstanceId,
        event: MachineEvent,
        caused_by: Option<EventId>,
    ) -> Result<SendOutcome, EngineError> {
        let (outcome, follow_ups) = {
            let mut engine = self.inner.engine.lock().await;
            engine.send_event(instance_id, event, caused_by, false).await?
        };
        self.dispatch(follow_ups);
        Ok(outcome)
    }

    /// Broadcast an event routed by transition matching rules. Returns
    /// the number of instances that transitioned.
    pub async fn broadcast_event(
        &self,
        machine: &str,
        state: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<usize, EngineError> {
        let event = self.event(event_type.to_string(), payload);
        self.broadcast_event_caused(machine, state, event, None).await
    }

    pub async fn broadcast_event_caused(
        &self,
        machine: &str,
        state: &str,
        event: MachineEvent,
        caused_by: Option<EventId>,
    ) -> Result<usize, EngineError> {
        let (count, follow_ups) = {
            let mut engine = self.inner.engine.lock().await;
            engine.broadcast_event(machine, state, event, caused_by).await?
        };
        self.dispatch(follow_ups);
        Ok(count)
    }

    /// Deliver to every instance of `(machine, state)` passing the
    /// filters (AND). Used by sender broadcasts and cross-component
    /// deliveries.
    pub async fn deliver_filtered(
        &self,
        machine: &str,
        state: &str,
        event: MachineEvent,
        filters: Vec<PropertyFilter>,
        caused_by: Option<EventId>,
    ) -> Result<usize, EngineError> {
        let (count, follow_ups) = {
            let mut engine = self.inner.engine.lock().await;
            engine
                .deliver_filtered(machine, state, event, &filters, caused_by)
                .await?
        };
        self.dispatch(follow_ups);
        Ok(count)
    }

    /// Simulate an event sequence without touching any state.
    pub async fn simulate_path(
        &self,
        machine: &str,
        events: &[MachineEvent],
    ) -> Result<Simulation, EngineError> {
        let engine = self.inner.engine.lock().await;
        engine.simulate_path(machine, events)
    }

    pub async fn instance(&self, id: InstanceId) -> Option<Instance> {
        let engine = self.inner.engine.lock().await;
        engine.instance(id).cloned()
    }

    pub async fn instances(&self) -> Vec<Instance> {
        let engine = self.inner.engine.lock().await;
        engine.instances.values().cloned().collect()
    }

    pub async fn instances_by_machine(&self, machine: &str) -> Vec<Instance> {
        let engine = self.inner.engine.lock().await;
        engine
            .instances
            .values()
            .filter(|i| i.machine_name == machine)
            .cloned()
            .collect()
    }

    /// Transitions leaving the instance's current state, in source order.
    pub async fn available_transitions(
        &self,
        id: InstanceId,
    ) -> Result<Vec<Transition>, EngineError> {
        let engine = self.inner.engine.lock().await;
        let instance = engine
            .instance(id)
            .ok_or(EngineError::UnknownInstance(id))?;
        let machine = engine
            .component
            .machine(&instance.machine_name)
            .ok_or_else(|| EngineError::UnknownMachine(instance.machine_name.clone()))?;
        Ok(machine
            .transitions_from(&instance.current_state)
            .cloned()
            .collect())
    }

    /// One instance's persisted history.
    pub async fn instance_history(
        &self,
        id: InstanceId,
    ) -> Result<Vec<PersistedEvent>, EngineError> {
        match &self.inner.persistence {
            Some(p) => Ok(p.history(id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Forward causality chain from an event.
    pub async fn trace_causality(
        &self,
        event_id: EventId,
    ) -> Result<Vec<PersistedEvent>, EngineError> {
        match &self.inner.persistence {
            Some(p) => Ok(p.trace_causality(event_id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Fetch one persisted event from this runtime's store.
    pub async fn persisted_event(
        &self,
        event_id: EventId,
    ) -> Result<Option<PersistedEvent>, EngineError> {
        match &self.inner.persistence {
            Some(p) => Ok(p.event_store().event(event_id).await?),
            None => Ok(None),
        }
    }

    /// Events in this runtime's store caused by the given event
    /// (registry-level causality walks across component stores).
    pub async fn events_caused_by(
        &self,
        event_id: EventId,
    ) -> Result<Vec<PersistedEvent>, EngineError> {
        match &self.inner.persistence {
            Some(p) => Ok(p.event_store().caused_events(event_id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Reinstate snapshots and resynchronise timeouts.
    pub async fn restore(&self) -> Result<RestoreReport, EngineError> {
        let (report, follow_ups) = {
            let mut engine = self.inner.engine.lock().await;
            engine.restore().await?
        };
        self.dispatch(follow_ups);
        Ok(report)
    }

    /// Recompute all pending timeout deadlines from `updated_at` and the
    /// transition definitions.
    pub async fn resynchronize_timeouts(&self) -> Result<ResyncReport, EngineError> {
        let (report, follow_ups) = {
            let mut engine = self.inner.engine.lock().await;
            engine.resynchronize_timeouts()
        };
        self.dispatch(follow_ups);
        Ok(report)
    }

    /// Number of live timer-wheel tasks.
    pub fn wheel_task_count(&self) -> usize {
        self.inner.wheel.lock().len()
    }

    /// Await the mailbox and ready queue running dry.
    pub async fn quiesce(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop the runtime: snapshot active instances, then cancel the
    /// mailbox and timer driver.
    pub async fn dispose(&self) {
        {
            let engine = self.inner.engine.lock().await;
            engine.snapshot_all().await;
        }
        self.inner.cancel.cancel();
    }

    /// True once `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

#[cfg(test)]
#[path = "runtime_tests/mod.rs"]
mod tests;
