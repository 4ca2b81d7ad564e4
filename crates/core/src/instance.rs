// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live state-machine instances.

use crate::id::InstanceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Instance lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    Completed,
    Error,
}

impl InstanceStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, InstanceStatus::Active)
    }
}

crate::simple_display! {
    InstanceStatus {
        Active => "active",
        Completed => "completed",
        Error => "error",
    }
}

/// Instance data: a legacy context bag, or a split public/internal pair
/// when the machine declares a `public_member_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum InstanceData {
    Context { context: Value },
    Split {
        public_member: Value,
        internal_member: Value,
    },
}

impl InstanceData {
    /// The business-visible view: the public member when split, else the
    /// context bag.
    pub fn view(&self) -> &Value {
        match self {
            InstanceData::Context { context } => context,
            InstanceData::Split { public_member, .. } => public_member,
        }
    }

    fn view_mut(&mut self) -> &mut Value {
        match self {
            InstanceData::Context { context } => context,
            InstanceData::Split { public_member, .. } => public_member,
        }
    }
}

/// A live execution of a state machine with its own identity and data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: InstanceId,
    pub machine_name: String,
    pub current_state: String,
    pub data: InstanceData,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub status: InstanceStatus,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_entry_point: bool,
}

impl Instance {
    /// Create a fresh instance in the machine's initial state.
    ///
    /// `initial_fields` becomes the public member when the machine has a
    /// `public_member_type`, else the context bag.
    pub fn new(
        machine_name: impl Into<String>,
        initial_state: impl Into<String>,
        initial_fields: Value,
        split_member: bool,
        now_ms: u64,
    ) -> Self {
        let data = if split_member {
            InstanceData::Split {
                public_member: normalize_fields(initial_fields),
                internal_member: Value::Object(serde_json::Map::new()),
            }
        } else {
            InstanceData::Context {
                context: normalize_fields(initial_fields),
            }
        };
        Self {
            id: InstanceId::new(),
            machine_name: machine_name.into(),
            current_state: initial_state.into(),
            data,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            status: InstanceStatus::Active,
            is_entry_point: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// The business-visible data tree.
    pub fn view(&self) -> &Value {
        self.data.view()
    }

    /// Shallow-merge a partial object into the view.
    ///
    /// Top-level fields of `partial` replace fields of the view; a
    /// non-object view is replaced wholesale. The property index does
    /// not observe these writes (see `Sender::update_context`).
    pub fn merge_into_view(&mut self, partial: Value) {
        let target = self.data.view_mut();
        match (target, partial) {
            (Value::Object(existing), Value::Object(updates)) => {
                for (k, v) in updates {
                    existing.insert(k, v);
                }
            }
            (target, partial) => *target = partial,
        }
    }
}

/// Coerce non-object initial fields to an empty object so top-level
/// property indexing always has a map to walk.
fn normalize_fields(fields: Value) -> Value {
    match fields {
        Value::Object(map) => Value::Object(map),
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
