// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cascading-rule fan-out.
//!
//! Runs on the mailbox turn after the entering transition committed, so
//! the triggering state change is already persisted before any cascade
//! event is emitted. Delivery per rule:
//!
//! - same component, with matching rules → the engine's rule broadcast
//!   on the target machine/state;
//! - same component, without rules → fan-out over the state bucket;
//! - different component → the cross-component router, with the rules
//!   resolved against the cascade payload.
//!
//! Per-target failures are isolated: a failing rule emits
//! `cascade_error` and the remaining rules still run.

use crate::engine::ResolvedCascade;
use crate::runtime::Runtime;
use sb_core::{Clock, EventId, InstanceId, Notification, PropertyFilter};

impl<C: Clock> Runtime<C> {
    pub(crate) async fn process_cascade(
        &self,
        source: InstanceId,
        state: String,
        items: Vec<ResolvedCascade>,
        caused_by: Option<EventId>,
    ) {
        let component_name = self.component().name.clone();
        let mut processed = 0usize;

        for item in items {
            let event = sb_core::MachineEvent::new(
                item.event_type.clone(),
                item.payload.clone(),
                self.now_ms(),
            );
            let is_cross = item
                .target_component
                .as_deref()
                .map(|target| target != component_name)
                .unwrap_or(false);

            let result = if is_cross {
                let target = item.target_component.clone().unwrap_or_default();
                let filters: Vec<PropertyFilter> = item
                    .matching_rules
                    .iter()
                    .map(|rule| rule.resolve(&event.payload))
                    .collect();
                self.router()
                    .broadcast_to_component(
                        &component_name,
                        &target,
                        &item.target_machine,
                        &item.target_state,
                        event.clone(),
                        filters,
                        caused_by,
                    )
                    .await
                    .map_err(|e| e.to_string())
            } else if !item.matching_rules.is_empty() {
                self.broadcast_event_caused(
                    &item.target_machine,
                    &item.target_state,
                    event.clone(),
                    caused_by,
                )
                .await
                .map_err(|e| e.to_string())
            } else {
                self.deliver_filtered(
                    &item.target_machine,
                    &item.target_state,
                    event.clone(),
                    Vec::new(),
                    caused_by,
                )
                .await
                .map_err(|e| e.to_string())
            };

            match result {
                Ok(count) => processed += count,
                Err(reason) => {
                    tracing::warn!(
                        source = %source,
                        target_machine = %item.target_machine,
                        event = %item.event_type,
                        %reason,
                        "cascade rule failed"
                    );
                    self.emit_notification(Notification::CascadeError {
                        instance_id: source,
                        state: state.clone(),
                        event_type: item.event_type.clone(),
                        failed_targets: Vec::new(),
                        reason,
                    });
                }
            }
        }

        self.emit_notification(Notification::CascadeCompleted {
            instance_id: source,
            state,
            processed,
        });
    }
}
