// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn ids_are_unique() {
    let a = InstanceId::new();
    let b = InstanceId::new();
    assert_ne!(a, b);
}

#[test]
fn id_round_trips_through_string() {
    let id = EventId::new();
    let parsed = EventId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn id_round_trips_through_serde() {
    let id = RuntimeId::new();
    let json = serde_json::to_string(&id).unwrap();
    // Transparent serialization: a bare string.
    assert!(json.starts_with('"'));
    let back: RuntimeId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
}

#[test]
fn parse_rejects_garbage() {
    assert!(InstanceId::parse("not-a-uuid").is_err());
}
