// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine events, persisted events, and snapshots.

use crate::id::{EventId, InstanceId};
use crate::instance::Instance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event delivered to (or emitted by) a state-machine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

impl MachineEvent {
    pub fn new(event_type: impl Into<String>, payload: Value, timestamp_ms: u64) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp_ms,
        }
    }
}

/// One recorded transition in an instance's event-sourced history.
///
/// Events for one instance form a strictly monotonic chain in
/// `persisted_at`, and `state_before`/`state_after` equal the actual
/// pre/post states. `caused_by`/`caused` link causality across
/// transitions, including across components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEvent {
    pub id: EventId,
    pub instance_id: InstanceId,
    pub machine_name: String,
    pub component_name: String,
    pub event: MachineEvent,
    pub state_before: String,
    pub state_after: String,
    pub persisted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caused_by: Vec<EventId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caused: Vec<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_component: Option<String>,
}

/// A periodic full copy of an instance enabling fast restore.
///
/// Pending-timeout deadlines are never stored: resynchronisation always
/// recomputes them from the instance's `updated_at_ms` and the machine's
/// transition definitions, so a snapshot can never carry a stale
/// remaining-duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub instance: Instance,
    pub snapshot_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<EventId>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
