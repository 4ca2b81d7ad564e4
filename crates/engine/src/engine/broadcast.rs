// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-instance routing: rule broadcasts and filtered fan-out.

use super::{ExecutionEngine, FollowUp};
use crate::error::EngineError;
use sb_core::{path, Clock, EventId, InstanceId, MachineEvent, Notification, PropertyFilter};

impl<C: Clock> ExecutionEngine<C> {
    /// Broadcast an event to the instances of `(machine, state)` routed
    /// by the candidate transitions' matching rules.
    ///
    /// Requires at least one candidate transition declaring matching
    /// rules. Each instance receives the event at most once across all
    /// candidates; per-instance failures are isolated. Returns the
    /// number of instances that transitioned.
    pub(crate) async fn broadcast_event(
        &mut self,
        machine_name: &str,
        state: &str,
        event: MachineEvent,
        caused_by: Option<EventId>,
    ) -> Result<(usize, Vec<FollowUp>), EngineError> {
        let machine = self
            .component
            .machine(machine_name)
            .ok_or_else(|| EngineError::UnknownMachine(machine_name.to_string()))?;

        let rule_transitions: Vec<Vec<sb_core::MatchingRule>> = machine
            .candidates(state, &event.event_type)
            .filter(|t| !t.matching_rules.is_empty())
            .map(|t| t.matching_rules.clone())
            .collect();
        if rule_transitions.is_empty() {
            return Err(EngineError::NoMatchingTransition {
                machine: machine_name.to_string(),
                state: state.to_string(),
                event: event.event_type.clone(),
            });
        }

        let candidates = self.broadcast_candidates(machine_name, state, &rule_transitions, &event);

        let mut processed = 0usize;
        let mut follow_ups = Vec::new();
        for id in candidates {
            let Some(view) = self.instances.get(&id).map(|i| i.view().clone()) else {
                continue;
            };
            let routed = rule_transitions
                .iter()
                .any(|rules| rules.iter().all(|r| r.matches(&event.payload, &view)));
            if !routed {
                continue;
            }
            match self.send_event(id, event.clone(), caused_by, false).await {
                Ok((outcome, more)) => {
                    if outcome.transitioned() {
                        processed += 1;
                    }
                    follow_ups.extend(more);
                }
                Err(e) => {
                    tracing::warn!(instance = %id, error = %e, "broadcast delivery failed");
                    self.notify(Notification::BroadcastError {
                        machine_name: machine_name.to_string(),
                        state: state.to_string(),
                        event_type: event.event_type.clone(),
                        reason: format!("{id}: {e}"),
                    });
                }
            }
        }

        self.notify(Notification::BroadcastCompleted {
            machine_name: machine_name.to_string(),
            state: state.to_string(),
            event_type: event.event_type.clone(),
            processed,
        });
        Ok((processed, follow_ups))
    }

    /// Candidate set for a broadcast.
    ///
    /// Fast path: one candidate transition with a single equality rule
    /// on a scalar top-level property reduces to a property-index
    /// lookup. Anything else narrows through the state index and scans
    /// that bucket — O(|state bucket|), never O(all instances).
    fn broadcast_candidates(
        &self,
        machine_name: &str,
        state: &str,
        rule_transitions: &[Vec<sb_core::MatchingRule>],
        event: &MachineEvent,
    ) -> Vec<InstanceId> {
        if let [rules] = rule_transitions {
            if let [rule] = rules.as_slice() {
                if rule.is_index_friendly() {
                    let value = path::resolve_or_null(&event.payload, &rule.event_property);
                    if path::is_scalar(&value) {
                        return self
                            .index
                            .property_instances(machine_name, &rule.instance_property, &value)
                            .into_iter()
                            .filter(|id| {
                                self.instances
                                    .get(id)
                                    .map(|i| i.current_state == state)
                                    .unwrap_or(false)
                            })
                            .collect();
                    }
                }
            }
        }
        self.index.state_instances(machine_name, state)
    }

    /// Deliver an event to every instance of `(machine, state)` whose
    /// view passes all property filters. Used by sender broadcasts,
    /// rule-less cascades, and cross-component deliveries.
    pub(crate) async fn deliver_filtered(
        &mut self,
        machine_name: &str,
        state: &str,
        event: MachineEvent,
        filters: &[PropertyFilter],
        caused_by: Option<EventId>,
    ) -> Result<(usize, Vec<FollowUp>), EngineError> {
        if self.component.machine(machine_name).is_none() {
            return Err(EngineError::UnknownMachine(machine_name.to_string()));
        }

        let candidates = self.index.state_instances(machine_name, state);
        let mut processed = 0usize;
        let mut follow_ups = Vec::new();
        for id in candidates {
            let Some(view) = self.instances.get(&id).map(|i| i.view().clone()) else {
                continue;
            };
            if !sb_core::rules::filters_match(filters, &view) {
                continue;
            }
            match self.send_event(id, event.clone(), caused_by, false).await {
                Ok((outcome, more)) => {
                    if outcome.transitioned() {
                        processed += 1;
                    }
                    follow_ups.extend(more);
                }
                Err(e) => {
                    tracing::warn!(instance = %id, error = %e, "fan-out delivery failed");
                    self.notify(Notification::BroadcastError {
                        machine_name: machine_name.to_string(),
                        state: state.to_string(),
                        event_type: event.event_type.clone(),
                        reason: format!("{id}: {e}"),
                    });
                }
            }
        }
        Ok((processed, follow_ups))
    }
}
