// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-component execution engine: instance table, indexes, and the
//! transition machinery.
//!
//! The engine is a synchronous-state core driven behind the runtime's
//! async lock. Engine methods return the follow-up work a transition
//! generated (sender operations, cascades, cross-component sends); the
//! runtime dispatches those through its mailbox so nothing re-enters a
//! transition synchronously.

mod broadcast;
mod restore;
mod simulate;
mod transition;

pub use restore::{ResyncReport, RestoreReport};
pub use simulate::Simulation;

use crate::error::EngineError;
use crate::index::PropertyIndex;
use crate::method::MethodRegistry;
use crate::wheel::TimerWheel;
use parking_lot::Mutex;
use sb_core::{
    Clock, Component, EventId, Instance, InstanceId, InstanceStatus, MachineEvent, MatchingRule,
    Notification, PropertyFilter, TransitionKind,
};
use sb_store::{PersistRequest, PersistenceManager};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast as notify_broadcast;

/// Outcome of delivering one event to one instance.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// A transition executed and committed.
    Transitioned {
        event_id: EventId,
        from: String,
        to: String,
    },
    /// No applicable transition; `event_ignored` was emitted.
    Ignored,
    /// A transition was selected but its guards denied it.
    GuardDenied,
    /// A method handler failed; the instance moved to `error`.
    Errored,
}

impl SendOutcome {
    pub fn transitioned(&self) -> bool {
        matches!(self, SendOutcome::Transitioned { .. })
    }
}

/// What a scheduled timer delivers when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTaskKind {
    Timeout,
    Auto,
}

sb_core::simple_display! {
    TimerTaskKind {
        Timeout => "timeout",
        Auto => "auto",
    }
}

/// Payload of a timer-wheel task: which instance, which state it was
/// armed in, and which event to deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerTask {
    pub instance_id: InstanceId,
    pub state: String,
    pub event_type: String,
    pub kind: TimerTaskKind,
}

impl TimerTask {
    /// Wheel key: `timeout:{instance}:{state}:{event}` / `auto:...`.
    /// Keying on `(instance, state, event)` is what lets a state change
    /// cancel exactly the timers armed in the state being left.
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.kind, self.instance_id, self.state, self.event_type
        )
    }
}

/// A cascading rule with its payload template already resolved against
/// the source view (the source may be disposed before delivery).
#[derive(Debug, Clone)]
pub(crate) struct ResolvedCascade {
    pub target_component: Option<String>,
    pub target_machine: String,
    pub target_state: String,
    pub event_type: String,
    pub payload: Value,
    pub matching_rules: Vec<MatchingRule>,
}

/// Follow-up work generated by a committed transition, dispatched
/// through the runtime mailbox on a later scheduling turn.
#[derive(Debug, Clone)]
pub(crate) enum FollowUp {
    Deliver {
        instance_id: InstanceId,
        event_type: String,
        payload: Value,
        caused_by: Option<EventId>,
        timed_out: bool,
    },
    FilteredFanOut {
        machine: String,
        state: String,
        event_type: String,
        payload: Value,
        filters: Vec<PropertyFilter>,
        caused_by: Option<EventId>,
    },
    Spawn {
        machine: String,
        fields: Value,
        caused_by: Option<EventId>,
    },
    Cascade {
        source: InstanceId,
        state: String,
        items: Vec<ResolvedCascade>,
        caused_by: Option<EventId>,
    },
    CrossSend {
        component: String,
        instance_id: InstanceId,
        event_type: String,
        payload: Value,
        caused_by: Option<EventId>,
    },
    CrossBroadcast {
        component: String,
        machine: String,
        state: String,
        event_type: String,
        payload: Value,
        filters: Vec<PropertyFilter>,
        caused_by: Option<EventId>,
    },
    CrossCreate {
        component: String,
        machine: String,
        fields: Value,
        caused_by: Option<EventId>,
    },
}

pub(crate) struct ExecutionEngine<C: Clock> {
    pub(crate) component: Arc<Component>,
    pub(crate) clock: C,
    pub(crate) instances: HashMap<InstanceId, Instance>,
    pub(crate) index: PropertyIndex,
    pub(crate) wheel: Arc<Mutex<TimerWheel<TimerTask>>>,
    /// Scheduled wheel keys per instance, cancelled on state exit.
    timer_keys: HashMap<InstanceId, Vec<String>>,
    pub(crate) persistence: Option<Arc<PersistenceManager>>,
    pub(crate) methods: Arc<MethodRegistry>,
    notifications: notify_broadcast::Sender<Notification>,
}

impl<C: Clock> ExecutionEngine<C> {
    pub(crate) fn new(
        component: Arc<Component>,
        clock: C,
        wheel: Arc<Mutex<TimerWheel<TimerTask>>>,
        persistence: Option<Arc<PersistenceManager>>,
        methods: Arc<MethodRegistry>,
        notifications: notify_broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            component,
            clock,
            instances: HashMap::new(),
            index: PropertyIndex::new(),
            wheel,
            timer_keys: HashMap::new(),
            persistence,
            methods,
            notifications,
        }
    }

    /// Emit a notification to subscribers (and the log).
    pub(crate) fn notify(&self, notification: Notification) {
        tracing::debug!(kind = notification.name(), "notification");
        // No receivers is fine; bridges subscribe lazily.
        let _ = self.notifications.send(notification);
    }

    pub(crate) fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub(crate) fn require_active(&self, id: InstanceId) -> Result<&Instance, EngineError> {
        let instance = self
            .instances
            .get(&id)
            .ok_or(EngineError::UnknownInstance(id))?;
        if !instance.is_active() {
            return Err(EngineError::InstanceInactive {
                id,
                status: instance.status,
            });
        }
        Ok(instance)
    }

    /// Create a new instance in a machine's initial state: register
    /// indexes, persist the creation event, schedule initial timeouts
    /// and auto-transitions, emit `instance_created`.
    pub(crate) async fn create_instance(
        &mut self,
        machine_name: &str,
        initial_fields: Value,
        caused_by: Option<EventId>,
        is_entry_point: bool,
    ) -> Result<InstanceId, EngineError> {
        let machine = self
            .component
            .machine(machine_name)
            .ok_or_else(|| EngineError::UnknownMachine(machine_name.to_string()))?;

        let now_ms = self.clock.epoch_ms();
        let mut instance = Instance::new(
            machine_name,
            machine.initial_state.clone(),
            initial_fields,
            machine.public_member_type.is_some(),
            now_ms,
        );
        instance.is_entry_point = is_entry_point;
        let id = instance.id;

        if let Some(persistence) = &self.persistence {
            persistence
                .persist_event(
                    PersistRequest {
                        instance_id: id,
                        machine_name: machine_name.to_string(),
                        component_name: self.component.name.clone(),
                        event: MachineEvent::new("instance_created", Value::Null, now_ms),
                        state_before: machine.initial_state.clone(),
                        state_after: machine.initial_state.clone(),
                        caused_by,
                        source_component: None,
                        target_component: None,
                    },
                    self.clock.utc_now(),
                )
                .await?;
        }

        self.index.insert(&instance);
        let state = instance.current_state.clone();
        self.instances.insert(id, instance);
        self.schedule_state_tasks(id);

        tracing::info!(instance = %id, machine = machine_name, %state, "instance created");
        self.notify(Notification::InstanceCreated {
            instance_id: id,
            machine_name: machine_name.to_string(),
            state,
            is_entry_point,
        });
        Ok(id)
    }

    /// Find or create the component's entry-point instance.
    ///
    /// Singleton mode reuses the existing entry instance; multiple mode
    /// creates a fresh one per call.
    pub(crate) async fn ensure_entry_instance(
        &mut self,
    ) -> Result<Option<InstanceId>, EngineError> {
        let Some(entry_machine) = self.component.entry_machine.clone() else {
            return Ok(None);
        };
        if self.component.entry_machine_mode == sb_core::EntryMachineMode::Singleton {
            let existing = self
                .instances
                .values()
                .find(|i| i.is_entry_point && i.machine_name == entry_machine)
                .map(|i| i.id);
            if let Some(id) = existing {
                return Ok(Some(id));
            }
        }
        let id = self
            .create_instance(&entry_machine, Value::Null, None, true)
            .await?;
        Ok(Some(id))
    }

    /// Arm wheel tasks for every timeout/auto transition leaving the
    /// instance's current state.
    pub(crate) fn schedule_state_tasks(&mut self, id: InstanceId) {
        let Some(instance) = self.instances.get(&id) else {
            return;
        };
        let Some(machine) = self.component.machine(&instance.machine_name) else {
            return;
        };
        let mut keys = Vec::new();
        {
            let mut wheel = self.wheel.lock();
            for transition in machine.scheduled_from(&instance.current_state) {
                let kind = match transition.kind {
                    TransitionKind::Timeout => TimerTaskKind::Timeout,
                    TransitionKind::Auto => TimerTaskKind::Auto,
                    _ => continue,
                };
                let task = TimerTask {
                    instance_id: id,
                    state: instance.current_state.clone(),
                    event_type: transition.event.clone(),
                    kind,
                };
                let key = task.key();
                wheel.add_timeout(key.clone(), transition.timeout_ms.unwrap_or(0), task);
                keys.push(key);
            }
        }
        if !keys.is_empty() {
            self.timer_keys.entry(id).or_default().extend(keys);
        }
    }

    /// Drop every wheel task belonging to an instance. Synchronous and
    /// O(1) per task.
    pub(crate) fn cancel_instance_timers(&mut self, id: InstanceId) {
        if let Some(keys) = self.timer_keys.remove(&id) {
            let mut wheel = self.wheel.lock();
            for key in keys {
                wheel.remove_timeout(&key);
            }
        }
    }

    /// Re-arm a single scheduled transition with an explicit delay
    /// (used by timeout resynchronisation).
    pub(crate) fn schedule_task_with_delay(&mut self, task: TimerTask, delay_ms: u64) {
        let key = task.key();
        let id = task.instance_id;
        self.wheel.lock().add_timeout(key.clone(), delay_ms, task);
        let keys = self.timer_keys.entry(id).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    /// Move an instance to `error` status and drop it: out of the
    /// indexes, timers cancelled, snapshot deleted, no further events.
    pub(crate) async fn mark_error(&mut self, id: InstanceId, reason: String) {
        let Some(mut instance) = self.instances.remove(&id) else {
            return;
        };
        instance.status = InstanceStatus::Error;
        self.index.remove(&instance);
        self.cancel_instance_timers(id);
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.forget_instance(id).await {
                tracing::warn!(instance = %id, error = %e, "snapshot cleanup failed");
            }
        }
        tracing::error!(instance = %id, machine = %instance.machine_name, %reason, "instance error");
        self.notify(Notification::InstanceError {
            instance_id: id,
            machine_name: instance.machine_name.clone(),
            reason,
        });
    }

    /// Snapshot every active instance (runtime shutdown path).
    pub(crate) async fn snapshot_all(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let now = self.clock.utc_now();
        for instance in self.instances.values().filter(|i| i.is_active()) {
            if let Err(e) = persistence.snapshot_now(instance, None, now).await {
                tracing::warn!(instance = %instance.id, error = %e, "shutdown snapshot failed");
            }
        }
    }

    /// True if no wheel task remains keyed to `(instance, state)`.
    #[cfg(test)]
    pub(crate) fn no_tasks_for_state(&self, id: InstanceId, state: &str) -> bool {
        let wheel = self.wheel.lock();
        self.timer_keys
            .get(&id)
            .map(|keys| {
                keys.iter()
                    .filter(|k| wheel.contains(k))
                    .all(|k| !k.contains(&format!(":{state}:")))
            })
            .unwrap_or(true)
    }
}
