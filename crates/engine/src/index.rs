// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hash indexes over active instances.
//!
//! Three multimaps, writeable only by the engine:
//! - machine name → instance ids
//! - (machine, state) → instance ids
//! - (machine, property, stringified value) → instance ids
//!
//! The property index is populated from the top-level fields of the
//! instance view at creation time and is deliberately not updated when
//! `Sender::update_context` mutates a field: matching-rule targets are
//! set at creation and treated as immutable.
//!
//! A single equality rule on a scalar top-level property answers a
//! broadcast with one set lookup; any other rule shape narrows through
//! the state index and filters candidates linearly — O(|state bucket|),
//! never O(all instances).

use sb_core::{path, Instance, InstanceId};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct PropertyIndex {
    by_machine: HashMap<String, HashSet<InstanceId>>,
    by_state: HashMap<(String, String), HashSet<InstanceId>>,
    by_property: HashMap<(String, String, String), HashSet<InstanceId>>,
}

impl PropertyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly created (or restored) active instance.
    pub fn insert(&mut self, instance: &Instance) {
        let machine = instance.machine_name.clone();
        self.by_machine
            .entry(machine.clone())
            .or_default()
            .insert(instance.id);
        self.by_state
            .entry((machine.clone(), instance.current_state.clone()))
            .or_default()
            .insert(instance.id);
        if let Value::Object(fields) = instance.view() {
            for (prop, value) in fields {
                self.by_property
                    .entry((machine.clone(), prop.clone(), path::index_key(value)))
                    .or_default()
                    .insert(instance.id);
            }
        }
    }

    /// Move an instance between state buckets. Property entries are
    /// untouched: state transitions do not mutate context fields.
    pub fn change_state(&mut self, machine: &str, id: InstanceId, from: &str, to: &str) {
        if let Some(bucket) = self
            .by_state
            .get_mut(&(machine.to_string(), from.to_string()))
        {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.by_state.remove(&(machine.to_string(), from.to_string()));
            }
        }
        self.by_state
            .entry((machine.to_string(), to.to_string()))
            .or_default()
            .insert(id);
    }

    /// Drop an instance from all three indexes.
    pub fn remove(&mut self, instance: &Instance) {
        let machine = &instance.machine_name;
        if let Some(bucket) = self.by_machine.get_mut(machine) {
            bucket.remove(&instance.id);
            if bucket.is_empty() {
                self.by_machine.remove(machine);
            }
        }
        let state_key = (machine.clone(), instance.current_state.clone());
        if let Some(bucket) = self.by_state.get_mut(&state_key) {
            bucket.remove(&instance.id);
            if bucket.is_empty() {
                self.by_state.remove(&state_key);
            }
        }
        if let Value::Object(fields) = instance.view() {
            for (prop, value) in fields {
                let key = (machine.clone(), prop.clone(), path::index_key(value));
                if let Some(bucket) = self.by_property.get_mut(&key) {
                    bucket.remove(&instance.id);
                    if bucket.is_empty() {
                        self.by_property.remove(&key);
                    }
                }
            }
        }
    }

    /// Active instances of a machine.
    pub fn machine_instances(&self, machine: &str) -> impl Iterator<Item = InstanceId> + '_ {
        self.by_machine
            .get(machine)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Active instances of a machine currently in `state`.
    pub fn state_instances(&self, machine: &str, state: &str) -> Vec<InstanceId> {
        self.by_state
            .get(&(machine.to_string(), state.to_string()))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Fast path: instances whose top-level `property` equals `value`.
    pub fn property_instances(
        &self,
        machine: &str,
        property: &str,
        value: &Value,
    ) -> Vec<InstanceId> {
        self.by_property
            .get(&(
                machine.to_string(),
                property.to_string(),
                path::index_key(value),
            ))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn machine_count(&self, machine: &str) -> usize {
        self.by_machine.get(machine).map(HashSet::len).unwrap_or(0)
    }

    pub fn state_count(&self, machine: &str, state: &str) -> usize {
        self.by_state
            .get(&(machine.to_string(), state.to_string()))
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// True if the id appears in no index (used by disposal tests).
    pub fn is_fully_removed(&self, id: InstanceId) -> bool {
        !self.by_machine.values().any(|s| s.contains(&id))
            && !self.by_state.values().any(|s| s.contains(&id))
            && !self.by_property.values().any(|s| s.contains(&id))
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
