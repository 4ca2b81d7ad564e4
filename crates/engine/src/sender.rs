// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The capability object handed to method handlers.
//!
//! A `Sender` records operations; it never executes them. The engine
//! collects the recorded operations after the handler returns and
//! dispatches them through the runtime mailbox, preserving the
//! one-transition-at-a-time guarantee — a handler can never recurse
//! synchronously into the engine.

use parking_lot::Mutex;
use sb_core::{InstanceId, PropertyFilter};
use serde_json::Value;

/// One deferred operation recorded by a sender.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SenderOp {
    SendTo {
        instance_id: InstanceId,
        event_type: String,
        payload: Value,
    },
    SendToSelf {
        event_type: String,
        payload: Value,
    },
    Broadcast {
        machine: String,
        state: String,
        event_type: String,
        payload: Value,
        filters: Vec<PropertyFilter>,
    },
    CreateInstance {
        machine: String,
        fields: Value,
    },
    UpdateContext {
        partial: Value,
    },
    SendToComponent {
        component: String,
        instance_id: InstanceId,
        event_type: String,
        payload: Value,
    },
    BroadcastToComponent {
        component: String,
        machine: String,
        state: String,
        event_type: String,
        payload: Value,
        filters: Vec<PropertyFilter>,
    },
    CreateInstanceInComponent {
        component: String,
        machine: String,
        fields: Value,
    },
}

/// Capability object constructed per method invocation.
pub struct Sender {
    instance_id: InstanceId,
    ops: Mutex<Vec<SenderOp>>,
}

impl Sender {
    pub(crate) fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            ops: Mutex::new(Vec::new()),
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Send an event to a specific instance in this component.
    pub fn send_to(&self, instance_id: InstanceId, event_type: impl Into<String>, payload: Value) {
        self.ops.lock().push(SenderOp::SendTo {
            instance_id,
            event_type: event_type.into(),
            payload,
        });
    }

    /// Send an event back to the instance this handler runs for.
    pub fn send_to_self(&self, event_type: impl Into<String>, payload: Value) {
        self.ops.lock().push(SenderOp::SendToSelf {
            event_type: event_type.into(),
            payload,
        });
    }

    /// Broadcast to every instance of `machine` in `state`, optionally
    /// narrowed by property filters (AND).
    pub fn broadcast(
        &self,
        machine: impl Into<String>,
        state: impl Into<String>,
        event_type: impl Into<String>,
        payload: Value,
        filters: Vec<PropertyFilter>,
    ) {
        self.ops.lock().push(SenderOp::Broadcast {
            machine: machine.into(),
            state: state.into(),
            event_type: event_type.into(),
            payload,
            filters,
        });
    }

    /// Create a new instance in this component.
    pub fn create_instance(&self, machine: impl Into<String>, fields: Value) {
        self.ops.lock().push(SenderOp::CreateInstance {
            machine: machine.into(),
            fields,
        });
    }

    /// Shallow-merge a partial object into this instance's public
    /// member / context.
    ///
    /// The property index is not updated for these writes: matching
    /// rules must not depend on fields mutated after creation.
    pub fn update_context(&self, partial: Value) {
        self.ops.lock().push(SenderOp::UpdateContext { partial });
    }

    /// Send an event to an instance of another registered component.
    pub fn send_to_component(
        &self,
        component: impl Into<String>,
        instance_id: InstanceId,
        event_type: impl Into<String>,
        payload: Value,
    ) {
        self.ops.lock().push(SenderOp::SendToComponent {
            component: component.into(),
            instance_id,
            event_type: event_type.into(),
            payload,
        });
    }

    /// Broadcast into another registered component.
    pub fn broadcast_to_component(
        &self,
        component: impl Into<String>,
        machine: impl Into<String>,
        state: impl Into<String>,
        event_type: impl Into<String>,
        payload: Value,
        filters: Vec<PropertyFilter>,
    ) {
        self.ops.lock().push(SenderOp::BroadcastToComponent {
            component: component.into(),
            machine: machine.into(),
            state: state.into(),
            event_type: event_type.into(),
            payload,
            filters,
        });
    }

    /// Create an instance in another registered component.
    pub fn create_instance_in_component(
        &self,
        component: impl Into<String>,
        machine: impl Into<String>,
        fields: Value,
    ) {
        self.ops.lock().push(SenderOp::CreateInstanceInComponent {
            component: component.into(),
            machine: machine.into(),
            fields,
        });
    }

    pub(crate) fn take_ops(&self) -> Vec<SenderOp> {
        std::mem::take(&mut self.ops.lock())
    }
}

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;
