// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart semantics: snapshot restore and timeout resynchronisation.

use super::{ExecutionEngine, FollowUp, TimerTask, TimerTaskKind};
use crate::error::EngineError;
use sb_core::expr::EvalScope;
use sb_core::{guard, Clock, Notification, TransitionKind};
use serde_json::{json, Value};

/// Counters returned by timeout resynchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResyncReport {
    /// Timers re-armed with their remaining duration.
    pub synced: usize,
    /// Timeouts that expired while the runtime was down and were
    /// delivered immediately.
    pub expired: usize,
}

/// Result of a restore pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreReport {
    pub restored: usize,
    pub resync: ResyncReport,
}

impl<C: Clock> ExecutionEngine<C> {
    /// Reinstate every stored snapshot, rebuild indexes, then
    /// resynchronise timeouts.
    pub(crate) async fn restore(
        &mut self,
    ) -> Result<(RestoreReport, Vec<FollowUp>), EngineError> {
        let Some(persistence) = self.persistence.clone() else {
            return Ok((RestoreReport::default(), Vec::new()));
        };

        let mut restored = 0usize;
        for snapshot in persistence.restore_all().await? {
            let instance = snapshot.instance;
            if self.component.machine(&instance.machine_name).is_none() {
                tracing::warn!(
                    instance = %instance.id,
                    machine = %instance.machine_name,
                    "snapshot references unknown machine, skipping"
                );
                self.notify(Notification::RestoreError {
                    instance_id: Some(instance.id),
                    reason: format!("unknown machine '{}'", instance.machine_name),
                });
                continue;
            }
            if self.instances.contains_key(&instance.id) {
                continue;
            }
            let id = instance.id;
            let machine_name = instance.machine_name.clone();
            let state = instance.current_state.clone();
            if instance.is_active() {
                self.index.insert(&instance);
            }
            self.instances.insert(id, instance);
            restored += 1;
            tracing::info!(instance = %id, machine = %machine_name, %state, "instance restored");
            self.notify(Notification::InstanceRestored {
                instance_id: id,
                machine_name,
                state,
            });
        }

        let (resync, follow_ups) = self.resynchronize_timeouts();
        Ok((
            RestoreReport { restored, resync },
            follow_ups,
        ))
    }

    /// Recompute every pending timeout/auto deadline from the instance's
    /// `updated_at_ms` and the transition definitions.
    ///
    /// Timeouts whose deadline passed while the runtime was down are
    /// delivered immediately with a payload marking the expiry during
    /// restart; the rest are re-armed with their remaining duration.
    /// Re-arming is idempotent (wheel keys dedupe), so running this
    /// right after `restore()` leaves task counts unchanged modulo the
    /// expired deliveries.
    pub(crate) fn resynchronize_timeouts(&mut self) -> (ResyncReport, Vec<FollowUp>) {
        let now_ms = self.clock.epoch_ms();
        let mut report = ResyncReport::default();
        let mut follow_ups = Vec::new();
        let mut to_schedule: Vec<(TimerTask, u64)> = Vec::new();

        for instance in self.instances.values().filter(|i| i.is_active()) {
            let Some(machine) = self.component.machine(&instance.machine_name) else {
                continue;
            };
            let elapsed = now_ms.saturating_sub(instance.updated_at_ms);
            for transition in machine.scheduled_from(&instance.current_state) {
                match transition.kind {
                    TransitionKind::Timeout => {
                        let Some(timeout_ms) = transition.timeout_ms else {
                            self.notify(Notification::TimeoutResyncError {
                                instance_id: instance.id,
                                state: instance.current_state.clone(),
                                event_type: transition.event.clone(),
                                reason: "timeout transition without duration".to_string(),
                            });
                            continue;
                        };
                        if elapsed >= timeout_ms {
                            follow_ups.push(FollowUp::Deliver {
                                instance_id: instance.id,
                                event_type: transition.event.clone(),
                                payload: json!({
                                    "timedOut": true,
                                    "expiredDuringRestart": true,
                                }),
                                caused_by: None,
                                timed_out: true,
                            });
                            report.expired += 1;
                        } else {
                            to_schedule.push((
                                TimerTask {
                                    instance_id: instance.id,
                                    state: instance.current_state.clone(),
                                    event_type: transition.event.clone(),
                                    kind: TimerTaskKind::Timeout,
                                },
                                timeout_ms - elapsed,
                            ));
                            report.synced += 1;
                        }
                    }
                    TransitionKind::Auto => {
                        let payload = Value::Null;
                        let scope = EvalScope::new(&payload, instance.view());
                        if !guard::evaluate_all(&transition.guards, &scope) {
                            continue;
                        }
                        let delay = transition
                            .timeout_ms
                            .unwrap_or(0)
                            .saturating_sub(elapsed);
                        to_schedule.push((
                            TimerTask {
                                instance_id: instance.id,
                                state: instance.current_state.clone(),
                                event_type: transition.event.clone(),
                                kind: TimerTaskKind::Auto,
                            },
                            delay,
                        ));
                        report.synced += 1;
                    }
                    _ => {}
                }
            }
        }

        for (task, delay) in to_schedule {
            self.schedule_task_with_delay(task, delay);
        }
        (report, follow_ups)
    }
}
