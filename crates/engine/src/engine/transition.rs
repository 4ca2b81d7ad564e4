// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event delivery: transition selection, guard evaluation, execution.

use super::{ExecutionEngine, FollowUp, ResolvedCascade, SendOutcome, TimerTask, TimerTaskKind};
use crate::error::EngineError;
use crate::method::MethodContext;
use crate::sender::{Sender, SenderOp};
use sb_core::expr::EvalScope;
use sb_core::{
    guard, Clock, EventId, InstanceId, InstanceStatus, MachineEvent, StateKind, StateMachine,
    Transition, TransitionKind,
};
use sb_store::PersistRequest;
use serde_json::{json, Value};

/// Which hook a method invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hook {
    Exit,
    Triggered,
    Entry,
}

impl<C: Clock> ExecutionEngine<C> {
    /// Deliver one event to one instance.
    pub(crate) async fn send_event(
        &mut self,
        id: InstanceId,
        event: MachineEvent,
        caused_by: Option<EventId>,
        timed_out: bool,
    ) -> Result<(SendOutcome, Vec<FollowUp>), EngineError> {
        let instance = self.require_active(id)?;
        let machine_name = instance.machine_name.clone();
        let current_state = instance.current_state.clone();
        let view = instance.view().clone();
        let machine = self
            .component
            .machine(&machine_name)
            .ok_or_else(|| EngineError::UnknownMachine(machine_name.clone()))?;

        let Some(transition) = select_transition(machine, &current_state, &event, &view) else {
            tracing::debug!(
                instance = %id,
                machine = %machine_name,
                state = %current_state,
                event = %event.event_type,
                "event ignored"
            );
            self.notify(sb_core::Notification::EventIgnored {
                instance_id: id,
                machine_name,
                state: current_state,
                event_type: event.event_type,
            });
            return Ok((SendOutcome::Ignored, Vec::new()));
        };

        let scope = EvalScope::new(&event.payload, &view);
        if !guard::evaluate_all(&transition.guards, &scope) {
            self.notify(sb_core::Notification::GuardFailed {
                instance_id: id,
                machine_name,
                state: current_state,
                event_type: event.event_type,
            });
            return Ok((SendOutcome::GuardDenied, Vec::new()));
        }

        self.execute_transition(id, transition, event, caused_by, timed_out)
            .await
    }

    /// Deliver a fired wheel task.
    ///
    /// Cancellation on state change makes a stale firing unlikely, but
    /// delivery is a mailbox turn away from the tick, so the armed state
    /// is re-checked and stale tasks are dropped silently.
    pub(crate) async fn timer_fired(
        &mut self,
        task: TimerTask,
    ) -> Result<(SendOutcome, Vec<FollowUp>), EngineError> {
        let Some(instance) = self.instances.get(&task.instance_id) else {
            return Ok((SendOutcome::Ignored, Vec::new()));
        };
        if !instance.is_active() || instance.current_state != task.state {
            tracing::debug!(instance = %task.instance_id, key = %task.key(), "stale timer dropped");
            return Ok((SendOutcome::Ignored, Vec::new()));
        }
        let (payload, timed_out) = match task.kind {
            TimerTaskKind::Timeout => (json!({"timedOut": true}), true),
            TimerTaskKind::Auto => (Value::Null, false),
        };
        let event = MachineEvent::new(task.event_type, payload, self.clock.epoch_ms());
        self.send_event(task.instance_id, event, None, timed_out)
            .await
    }

    /// Run the full execution order for a selected transition.
    async fn execute_transition(
        &mut self,
        id: InstanceId,
        transition: Transition,
        event: MachineEvent,
        caused_by: Option<EventId>,
        timed_out: bool,
    ) -> Result<(SendOutcome, Vec<FollowUp>), EngineError> {
        let internal = transition.kind == TransitionKind::Internal;
        let machine_name = {
            let Some(instance) = self.instances.get(&id) else {
                return Err(EngineError::UnknownInstance(id));
            };
            instance.machine_name.clone()
        };
        let from = transition.from.clone();
        let to = transition.to.clone();

        // (a) exit method of the state being left
        let mut exit_ops = Vec::new();
        if !internal {
            let exit_method = self
                .component
                .machine(&machine_name)
                .and_then(|m| m.state(&from))
                .and_then(|s| s.exit_method.clone());
            if let Some(method) = exit_method {
                match self.run_method(id, &method, &event, Hook::Exit).await {
                    Ok(ops) => {
                        self.apply_context_ops(id, &ops);
                        exit_ops = ops;
                    }
                    Err(reason) => {
                        self.mark_error(id, format!("exit method '{method}' failed: {reason}"))
                            .await;
                        return Ok((SendOutcome::Errored, Vec::new()));
                    }
                }
            }
        }

        // (b) triggered method, completing before the state change commits
        let mut sender_ops = Vec::new();
        if let Some(method) = &transition.triggered_method {
            match self.run_method(id, method, &event, Hook::Triggered).await {
                Ok(ops) => {
                    self.apply_context_ops(id, &ops);
                    sender_ops = ops;
                }
                Err(reason) => {
                    self.mark_error(id, format!("triggered method '{method}' failed: {reason}"))
                        .await;
                    return Ok((SendOutcome::Errored, Vec::new()));
                }
            }
        }

        // (c) persist before any externally observable mutation, so crash
        // recovery never replays a transition that was already observed
        let event_id = match &self.persistence {
            Some(persistence) => {
                let request = PersistRequest {
                    instance_id: id,
                    machine_name: machine_name.clone(),
                    component_name: self.component.name.clone(),
                    event: event.clone(),
                    state_before: from.clone(),
                    state_after: to.clone(),
                    caused_by,
                    source_component: None,
                    target_component: None,
                };
                match persistence.persist_event(request, self.clock.utc_now()).await {
                    Ok(event_id) => event_id,
                    Err(e) => {
                        // Nothing has mutated; the instance stays in
                        // state_before. Downstream work is not dispatched.
                        self.notify(sb_core::Notification::InstanceError {
                            instance_id: id,
                            machine_name,
                            reason: format!("persistence failure: {e}"),
                        });
                        return Err(EngineError::Persistence(e));
                    }
                }
            }
            None => EventId::new(),
        };

        // (d)-(g) commit: state, timestamps, indexes, timers
        let now_ms = self.clock.epoch_ms();
        let Some(instance) = self.instances.get_mut(&id) else {
            return Err(EngineError::UnknownInstance(id));
        };
        instance.current_state = to.clone();
        instance.updated_at_ms = now_ms;
        if !internal {
            self.index.change_state(&machine_name, id, &from, &to);
            self.cancel_instance_timers(id);
        }

        tracing::info!(
            instance = %id,
            machine = %machine_name,
            %from,
            %to,
            event = %event.event_type,
            "state change"
        );
        self.notify(sb_core::Notification::StateChange {
            instance_id: id,
            machine_name: machine_name.clone(),
            from: from.clone(),
            to: to.clone(),
            event_type: event.event_type.clone(),
            event_id,
            timed_out,
        });

        // (i) snapshot at interval multiples; failures are non-fatal
        if let Some(persistence) = &self.persistence {
            if let Some(instance) = self.instances.get(&id) {
                if let Err(e) = persistence
                    .maybe_snapshot(instance, Some(event_id), self.clock.utc_now())
                    .await
                {
                    tracing::warn!(instance = %id, error = %e, "snapshot failed");
                }
            }
        }

        let mut follow_ups = ops_to_follow_ups(id, exit_ops, Some(event_id));
        follow_ups.extend(ops_to_follow_ups(id, sender_ops, Some(event_id)));

        // Cascading rules of the entered state, resolved against the
        // post-transition view.
        let cascade_items = self.resolved_cascades(&machine_name, &to, id);

        // (j)/(k) terminal disposal or new-state scheduling + entry method
        let entered_terminal = self
            .component
            .machine(&machine_name)
            .and_then(|m| m.state(&to))
            .map(|s| s.kind)
            .filter(|k| k.is_terminal());

        match entered_terminal {
            Some(kind) => {
                self.dispose_terminal(id, kind).await;
            }
            None => {
                if !internal {
                    self.schedule_state_tasks(id);
                    let entry_method = self
                        .component
                        .machine(&machine_name)
                        .and_then(|m| m.state(&to))
                        .and_then(|s| s.entry_method.clone());
                    if let Some(method) = entry_method {
                        match self.run_method(id, &method, &event, Hook::Entry).await {
                            Ok(ops) => {
                                self.apply_context_ops(id, &ops);
                                follow_ups
                                    .extend(ops_to_follow_ups(id, ops, Some(event_id)));
                            }
                            Err(reason) => {
                                self.mark_error(
                                    id,
                                    format!("entry method '{method}' failed: {reason}"),
                                )
                                .await;
                                return Ok((SendOutcome::Errored, follow_ups));
                            }
                        }
                    }
                }
            }
        }

        if !cascade_items.is_empty() {
            follow_ups.push(FollowUp::Cascade {
                source: id,
                state: to.clone(),
                items: cascade_items,
                caused_by: Some(event_id),
            });
        }

        // (l) inter-machine: spawn an instance of the target machine with
        // a shallow copy of this instance's data
        if transition.kind == TransitionKind::InterMachine {
            if let Some(target_machine) = &transition.target_machine {
                let fields = self
                    .instances
                    .get(&id)
                    .map(|i| i.view().clone())
                    .unwrap_or(Value::Null);
                let target_instance = self
                    .create_instance(target_machine, fields, Some(event_id), false)
                    .await?;
                self.notify(sb_core::Notification::InterMachineTransition {
                    source_instance: id,
                    target_instance,
                    target_machine: target_machine.clone(),
                    event_type: event.event_type.clone(),
                });
            }
        }

        Ok((
            SendOutcome::Transitioned {
                event_id,
                from,
                to,
            },
            follow_ups,
        ))
    }

    /// Dispose an instance that entered a terminal state.
    ///
    /// Singleton entry-point instances stay in the table (status flips,
    /// indexes drop them, no `instance_disposed`); everything else is
    /// deleted.
    async fn dispose_terminal(&mut self, id: InstanceId, kind: StateKind) {
        let status = match kind {
            StateKind::Error => InstanceStatus::Error,
            _ => InstanceStatus::Completed,
        };
        let keep = {
            let Some(instance) = self.instances.get_mut(&id) else {
                return;
            };
            instance.status = status;
            instance.is_entry_point
                && self.component.entry_machine_mode == sb_core::EntryMachineMode::Singleton
        };

        self.cancel_instance_timers(id);
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.forget_instance(id).await {
                tracing::warn!(instance = %id, error = %e, "snapshot cleanup failed");
            }
        }

        if keep {
            if let Some(instance) = self.instances.get(&id) {
                self.index.remove(instance);
            }
            tracing::info!(instance = %id, "entry-point singleton reached terminal state, retained");
            return;
        }

        if let Some(instance) = self.instances.remove(&id) {
            self.index.remove(&instance);
            tracing::info!(
                instance = %id,
                machine = %instance.machine_name,
                state = %instance.current_state,
                status = %status,
                "instance disposed"
            );
            self.notify(sb_core::Notification::InstanceDisposed {
                instance_id: id,
                machine_name: instance.machine_name.clone(),
                final_state: instance.current_state.clone(),
                status,
            });
        }
    }

    /// Resolve the entered state's cascading rules against the current
    /// view. Resolution happens now because the source may be disposed
    /// before the fan-out is delivered.
    fn resolved_cascades(
        &self,
        machine_name: &str,
        state: &str,
        id: InstanceId,
    ) -> Vec<ResolvedCascade> {
        let Some(rules) = self
            .component
            .machine(machine_name)
            .and_then(|m| m.state(state))
            .map(|s| s.cascading_rules.as_slice())
        else {
            return Vec::new();
        };
        let Some(view) = self.instances.get(&id).map(|i| i.view()) else {
            return Vec::new();
        };
        rules
            .iter()
            .map(|rule| ResolvedCascade {
                target_component: rule.target_component.clone(),
                target_machine: rule.target_machine.clone(),
                target_state: rule.target_state.clone(),
                event_type: rule.event.clone(),
                payload: rule.resolve_payload(view),
                matching_rules: rule.matching_rules.clone(),
            })
            .collect()
    }

    /// Invoke a named method handler with a fresh sender.
    async fn run_method(
        &mut self,
        id: InstanceId,
        method_name: &str,
        event: &MachineEvent,
        hook: Hook,
    ) -> Result<Vec<SenderOp>, crate::method::TriggeredMethodError> {
        let Some(handler) = self.methods.get(method_name) else {
            tracing::warn!(instance = %id, method = method_name, "no handler registered, skipping");
            return Ok(Vec::new());
        };
        let view = self
            .instances
            .get(&id)
            .map(|i| i.view().clone())
            .unwrap_or(Value::Null);
        let sender = Sender::new(id);
        handler
            .invoke(MethodContext {
                instance_id: id,
                event,
                view: &view,
                sender: &sender,
            })
            .await?;

        let notification = match hook {
            Hook::Exit => sb_core::Notification::ExitMethod {
                instance_id: id,
                method: method_name.to_string(),
            },
            Hook::Triggered => sb_core::Notification::TriggeredMethod {
                instance_id: id,
                method: method_name.to_string(),
            },
            Hook::Entry => sb_core::Notification::EntryMethod {
                instance_id: id,
                method: method_name.to_string(),
            },
        };
        self.notify(notification);
        Ok(sender.take_ops())
    }

    /// Apply `update_context` operations in place; other operations are
    /// left for mailbox dispatch.
    fn apply_context_ops(&mut self, id: InstanceId, ops: &[SenderOp]) {
        let Some(instance) = self.instances.get_mut(&id) else {
            return;
        };
        for op in ops {
            if let SenderOp::UpdateContext { partial } = op {
                instance.merge_into_view(partial.clone());
            }
        }
    }
}

/// Transition selection for `(state, event type)`:
/// single candidate wins outright; among several, the first whose
/// specific triggering rule passes, else the first whose matching rules
/// all pass, else the first declared.
pub(super) fn select_transition(
    machine: &StateMachine,
    state: &str,
    event: &MachineEvent,
    view: &Value,
) -> Option<Transition> {
    let candidates: Vec<&Transition> = machine.candidates(state, &event.event_type).collect();
    match candidates.as_slice() {
        [] => None,
        [only] => Some((*only).clone()),
        several => {
            let scope = EvalScope::new(&event.payload, view);
            if let Some(t) = several.iter().find(|t| {
                t.specific_triggering_rule
                    .as_ref()
                    .map(|rule| rule.eval_bool(&scope))
                    .unwrap_or(false)
            }) {
                return Some((*t).clone());
            }
            if let Some(t) = several.iter().find(|t| {
                !t.matching_rules.is_empty()
                    && t.matching_rules
                        .iter()
                        .all(|rule| rule.matches(&event.payload, view))
            }) {
                return Some((*t).clone());
            }
            several.first().map(|t| (*t).clone())
        }
    }
}

/// Convert recorded sender operations into mailbox follow-ups, carrying
/// the committing transition's event id as their cause.
pub(super) fn ops_to_follow_ups(
    instance_id: InstanceId,
    ops: Vec<SenderOp>,
    caused_by: Option<EventId>,
) -> Vec<FollowUp> {
    ops.into_iter()
        .filter_map(|op| match op {
            SenderOp::UpdateContext { .. } => None, // applied in place
            SenderOp::SendTo {
                instance_id: target,
                event_type,
                payload,
            } => Some(FollowUp::Deliver {
                instance_id: target,
                event_type,
                payload,
                caused_by,
                timed_out: false,
            }),
            SenderOp::SendToSelf {
                event_type,
                payload,
            } => Some(FollowUp::Deliver {
                instance_id,
                event_type,
                payload,
                caused_by,
                timed_out: false,
            }),
            SenderOp::Broadcast {
                machine,
                state,
                event_type,
                payload,
                filters,
            } => Some(FollowUp::FilteredFanOut {
                machine,
                state,
                event_type,
                payload,
                filters,
                caused_by,
            }),
            SenderOp::CreateInstance { machine, fields } => Some(FollowUp::Spawn {
                machine,
                fields,
                caused_by,
            }),
            SenderOp::SendToComponent {
                component,
                instance_id: target,
                event_type,
                payload,
            } => Some(FollowUp::CrossSend {
                component,
                instance_id: target,
                event_type,
                payload,
                caused_by,
            }),
            SenderOp::BroadcastToComponent {
                component,
                machine,
                state,
                event_type,
                payload,
                filters,
            } => Some(FollowUp::CrossBroadcast {
                component,
                machine,
                state,
                event_type,
                payload,
                filters,
                caused_by,
            }),
            SenderOp::CreateInstanceInComponent {
                component,
                machine,
                fields,
            } => Some(FollowUp::CrossCreate {
                component,
                machine,
                fields,
                caused_by,
            }),
        })
        .collect()
}
