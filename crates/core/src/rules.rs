// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Matching rules, resolved property filters, and cascading rules.
//!
//! A matching rule routes an event to the instances whose property
//! relates to the event's property (`instance_value ⨀ event_value`).
//! A property filter is the same predicate with the event side already
//! resolved to a concrete value, which is the only form that crosses
//! component boundaries.

use crate::expr::CompareOp;
use crate::path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Routes an event to instances by relating an event property to an
/// instance property. The operator defaults to strict equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingRule {
    pub event_property: String,
    pub instance_property: String,
    #[serde(default)]
    pub operator: CompareOp,
}

impl MatchingRule {
    pub fn new(event_property: impl Into<String>, instance_property: impl Into<String>) -> Self {
        Self {
            event_property: event_property.into(),
            instance_property: instance_property.into(),
            operator: CompareOp::Eq,
        }
    }

    pub fn with_operator(mut self, operator: CompareOp) -> Self {
        self.operator = operator;
        self
    }

    /// Evaluate `instance_value ⨀ event_value` for one instance view.
    pub fn matches(&self, event_payload: &Value, view: &Value) -> bool {
        let event_value = path::resolve_or_null(event_payload, &self.event_property);
        let instance_value = path::resolve_or_null(view, &self.instance_property);
        self.operator.apply(&instance_value, &event_value)
    }

    /// Resolve the event side against a payload, producing the form that
    /// can be applied without the originating event.
    pub fn resolve(&self, event_payload: &Value) -> PropertyFilter {
        PropertyFilter {
            instance_property: self.instance_property.clone(),
            operator: self.operator,
            value: path::resolve_or_null(event_payload, &self.event_property),
        }
    }

    /// True when this rule can be answered by a property-index lookup:
    /// strict equality on a top-level instance property.
    pub fn is_index_friendly(&self) -> bool {
        self.operator == CompareOp::Eq && !self.instance_property.contains('.')
    }
}

/// A matching rule with the event side resolved to a concrete value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilter {
    pub instance_property: String,
    #[serde(default)]
    pub operator: CompareOp,
    pub value: Value,
}

impl PropertyFilter {
    pub fn eq(instance_property: impl Into<String>, value: Value) -> Self {
        Self {
            instance_property: instance_property.into(),
            operator: CompareOp::Eq,
            value,
        }
    }

    pub fn matches(&self, view: &Value) -> bool {
        let instance_value = path::resolve_or_null(view, &self.instance_property);
        self.operator.apply(&instance_value, &self.value)
    }
}

/// Evaluate a filter list with AND semantics. Empty lists pass.
pub fn filters_match(filters: &[PropertyFilter], view: &Value) -> bool {
    filters.iter().all(|f| f.matches(view))
}

/// Declarative fan-out fired when an instance enters a state.
///
/// The payload template may reference the source instance's view with
/// `"{{dotted.path}}"` string values; resolution happens when the
/// entering transition commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadingRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_component: Option<String>,
    pub target_machine: String,
    pub target_state: String,
    pub event: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matching_rules: Vec<MatchingRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl CascadingRule {
    pub fn new(
        target_machine: impl Into<String>,
        target_state: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            target_component: None,
            target_machine: target_machine.into(),
            target_state: target_state.into(),
            event: event.into(),
            matching_rules: Vec::new(),
            payload: None,
        }
    }

    pub fn to_component(mut self, component: impl Into<String>) -> Self {
        self.target_component = Some(component.into());
        self
    }

    pub fn matching(mut self, rule: MatchingRule) -> Self {
        self.matching_rules.push(rule);
        self
    }

    pub fn payload(mut self, template: Value) -> Self {
        self.payload = Some(template);
        self
    }

    /// Build the concrete cascade payload for a given source view.
    pub fn resolve_payload(&self, source_view: &Value) -> Value {
        match &self.payload {
            Some(template) => path::resolve_template(template, source_view),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
