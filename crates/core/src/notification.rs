// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observable engine notifications.
//!
//! Emitted on the runtime's broadcast channel after the corresponding
//! effect has committed; bridges (registry broadcasters, metrics
//! exporters) consume these. Serializes with `{"type": "name", ...}`.

use crate::id::{EventId, InstanceId};
use crate::instance::InstanceStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    InstanceCreated {
        instance_id: InstanceId,
        machine_name: String,
        state: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_entry_point: bool,
    },

    StateChange {
        instance_id: InstanceId,
        machine_name: String,
        from: String,
        to: String,
        event_type: String,
        event_id: EventId,
        /// Set when the transition was a timeout firing.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        timed_out: bool,
    },

    GuardFailed {
        instance_id: InstanceId,
        machine_name: String,
        state: String,
        event_type: String,
    },

    EventIgnored {
        instance_id: InstanceId,
        machine_name: String,
        state: String,
        event_type: String,
    },

    InstanceDisposed {
        instance_id: InstanceId,
        machine_name: String,
        final_state: String,
        status: InstanceStatus,
    },

    InstanceError {
        instance_id: InstanceId,
        machine_name: String,
        reason: String,
    },

    BroadcastError {
        machine_name: String,
        state: String,
        event_type: String,
        reason: String,
    },

    BroadcastCompleted {
        machine_name: String,
        state: String,
        event_type: String,
        processed: usize,
    },

    CascadeCompleted {
        instance_id: InstanceId,
        state: String,
        processed: usize,
    },

    CascadeError {
        instance_id: InstanceId,
        state: String,
        event_type: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        failed_targets: Vec<InstanceId>,
        reason: String,
    },

    TriggeredMethod {
        instance_id: InstanceId,
        method: String,
    },

    InterMachineTransition {
        source_instance: InstanceId,
        target_instance: InstanceId,
        target_machine: String,
        event_type: String,
    },

    EntryMethod {
        instance_id: InstanceId,
        method: String,
    },

    ExitMethod {
        instance_id: InstanceId,
        method: String,
    },

    InstanceRestored {
        instance_id: InstanceId,
        machine_name: String,
        state: String,
    },

    RestoreError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_id: Option<InstanceId>,
        reason: String,
    },

    TimeoutResyncError {
        instance_id: InstanceId,
        state: String,
        event_type: String,
        reason: String,
    },
}

impl Notification {
    /// Notification name for log spans.
    pub fn name(&self) -> &'static str {
        match self {
            Notification::InstanceCreated { .. } => "instance_created",
            Notification::StateChange { .. } => "state_change",
            Notification::GuardFailed { .. } => "guard_failed",
            Notification::EventIgnored { .. } => "event_ignored",
            Notification::InstanceDisposed { .. } => "instance_disposed",
            Notification::InstanceError { .. } => "instance_error",
            Notification::BroadcastError { .. } => "broadcast_error",
            Notification::BroadcastCompleted { .. } => "broadcast_completed",
            Notification::CascadeCompleted { .. } => "cascade_completed",
            Notification::CascadeError { .. } => "cascade_error",
            Notification::TriggeredMethod { .. } => "triggered_method",
            Notification::InterMachineTransition { .. } => "inter_machine_transition",
            Notification::EntryMethod { .. } => "entry_method",
            Notification::ExitMethod { .. } => "exit_method",
            Notification::InstanceRestored { .. } => "instance_restored",
            Notification::RestoreError { .. } => "restore_error",
            Notification::TimeoutResyncError { .. } => "timeout_resync_error",
        }
    }
}

#[cfg(test)]
#[path = "notification_tests.rs"]
mod tests;
