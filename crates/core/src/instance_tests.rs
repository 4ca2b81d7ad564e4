// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn context_instance_view_is_the_bag() {
    let instance = Instance::new("Order", "Pending", json!({"Id": 1}), false, 1000);
    assert_eq!(instance.view(), &json!({"Id": 1}));
    assert_eq!(instance.current_state, "Pending");
    assert!(instance.is_active());
    assert!(!instance.is_entry_point);
}

#[test]
fn split_instance_view_is_the_public_member() {
    let instance = Instance::new("Order", "Pending", json!({"Id": 1}), true, 1000);
    assert_eq!(instance.view(), &json!({"Id": 1}));
    match &instance.data {
        InstanceData::Split { internal_member, .. } => {
            assert_eq!(internal_member, &json!({}));
        }
        InstanceData::Context { .. } => panic!("expected split data"),
    }
}

#[test]
fn null_initial_fields_become_empty_object() {
    let instance = Instance::new("M", "S", serde_json::Value::Null, false, 0);
    assert_eq!(instance.view(), &json!({}));
}

#[test]
fn merge_into_view_is_shallow() {
    let mut instance = Instance::new(
        "M",
        "S",
        json!({"a": 1, "nested": {"x": 1}}),
        false,
        0,
    );
    instance.merge_into_view(json!({"b": 2, "nested": {"y": 2}}));
    assert_eq!(
        instance.view(),
        &json!({"a": 1, "b": 2, "nested": {"y": 2}})
    );
}

#[test]
fn instance_serde_round_trip() {
    let mut instance = Instance::new("Order", "Pending", json!({"Id": 9}), true, 42);
    instance.is_entry_point = true;
    let json = serde_json::to_string(&instance).unwrap();
    let back: Instance = serde_json::from_str(&json).unwrap();
    assert_eq!(instance, back);
}

#[test]
fn status_display() {
    assert_eq!(InstanceStatus::Active.to_string(), "active");
    assert_eq!(InstanceStatus::Completed.to_string(), "completed");
    assert_eq!(InstanceStatus::Error.to_string(), "error");
}
