// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker message envelopes.

use sb_core::{Component, EventId, Instance, InstanceId, InstanceStatus, PropertyFilter, RuntimeId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decode an envelope from a raw broker payload.
pub fn decode<T: DeserializeOwned>(payload: &Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(payload.clone())
}

/// Registry lifecycle traffic (`fsm:registry:*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryMessage {
    /// A runtime announcing itself (on connect, and again when someone
    /// asks `query_instances`, so late subscribers discover it).
    Announce {
        runtime_id: RuntimeId,
        component_name: String,
        component: Component,
        host: String,
        port: u16,
    },
    Heartbeat {
        runtime_id: RuntimeId,
        component_name: String,
        timestamp_ms: u64,
    },
    Shutdown {
        runtime_id: RuntimeId,
        component_name: String,
    },
    Discover,
}

/// Engine events bridged onto `fsm:events:*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventMessage {
    StateChange {
        component_name: String,
        machine_name: String,
        instance_id: InstanceId,
        from: String,
        to: String,
        event_type: String,
        timestamp_ms: u64,
    },
    InstanceCreated {
        component_name: String,
        machine_name: String,
        instance_id: InstanceId,
        state: String,
        timestamp_ms: u64,
    },
    InstanceCompleted {
        component_name: String,
        machine_name: String,
        instance_id: InstanceId,
        final_state: String,
        status: InstanceStatus,
        timestamp_ms: u64,
    },
    TimeoutTriggered {
        component_name: String,
        machine_name: String,
        instance_id: InstanceId,
        from: String,
        to: String,
        event_type: String,
        timestamp_ms: u64,
    },
}

/// Commands consumed by runtime broadcasters (`fsm:commands:*`) and
/// component-scoped channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandMessage {
    TriggerEvent {
        component_name: String,
        instance_id: InstanceId,
        event_type: String,
        #[serde(default)]
        payload: Value,
    },
    CreateInstance {
        component_name: String,
        machine_name: String,
        #[serde(default)]
        initial_fields: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caused_by: Option<EventId>,
    },
    /// Cross-component delivery. Matching rules arrive with their event
    /// side already resolved; commands without rules are rejected —
    /// never broadcast to every instance.
    CrossComponentEvent {
        source_component: String,
        target_component: String,
        target_machine: String,
        target_state: String,
        event_type: String,
        #[serde(default)]
        payload: Value,
        #[serde(default)]
        matching_rules: Vec<PropertyFilter>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caused_by: Option<EventId>,
    },
    QueryInstances {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        component_name: Option<String>,
    },
}

/// Reply to `query_instances` on `fsm:responses:query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub runtime_id: RuntimeId,
    pub component_name: String,
    pub instances: Vec<Instance>,
    pub timestamp_ms: u64,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
