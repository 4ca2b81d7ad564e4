// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn serializes_with_snake_case_type_tag() {
    let note = Notification::StateChange {
        instance_id: InstanceId::new(),
        machine_name: "Order".into(),
        from: "Pending".into(),
        to: "Confirmed".into(),
        event_type: "CONFIRM".into(),
        event_id: EventId::new(),
        timed_out: false,
    };
    let value = serde_json::to_value(&note).unwrap();
    assert_eq!(value["type"], "state_change");
    // Elided when false.
    assert!(value.get("timed_out").is_none());
}

#[test]
fn name_matches_serde_tag() {
    let notes = [
        Notification::EventIgnored {
            instance_id: InstanceId::new(),
            machine_name: "M".into(),
            state: "S".into(),
            event_type: "E".into(),
        },
        Notification::CascadeCompleted {
            instance_id: InstanceId::new(),
            state: "S".into(),
            processed: 3,
        },
        Notification::RestoreError {
            instance_id: None,
            reason: "boom".into(),
        },
    ];
    for note in notes {
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["type"], note.name());
    }
}

#[test]
fn round_trip() {
    let note = Notification::InstanceDisposed {
        instance_id: InstanceId::new(),
        machine_name: "Order".into(),
        final_state: "Delivered".into(),
        status: InstanceStatus::Completed,
    };
    let json = serde_json::to_string(&note).unwrap();
    let back: Notification = serde_json::from_str(&json).unwrap();
    assert_eq!(note, back);
}
