// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{order_component, order_inventory_component};

#[test]
fn fixture_components_validate() {
    assert!(order_component().validate().is_ok());
    assert!(order_inventory_component().validate().is_ok());
}

#[test]
fn candidates_preserve_source_order() {
    let machine = MachineBuilder::new("M", "A")
        .state(StateBuilder::new("A", StateKind::Entry).build())
        .state(StateBuilder::new("B", StateKind::Regular).build())
        .state(StateBuilder::new("C", StateKind::Regular).build())
        .transition(TransitionBuilder::new("A", "B", "GO").build())
        .transition(TransitionBuilder::new("A", "C", "GO").build())
        .build();
    let targets: Vec<&str> = machine.candidates("A", "GO").map(|t| t.to.as_str()).collect();
    assert_eq!(targets, ["B", "C"]);
}

#[test]
fn scheduled_from_selects_timeout_and_auto() {
    let machine = MachineBuilder::new("M", "A")
        .state(StateBuilder::new("A", StateKind::Entry).build())
        .state(StateBuilder::new("B", StateKind::Regular).build())
        .transition(TransitionBuilder::new("A", "B", "TICK").timeout_ms(500).build())
        .transition(TransitionBuilder::new("A", "B", "AUTO").auto(0).build())
        .transition(TransitionBuilder::new("A", "B", "GO").build())
        .build();
    assert_eq!(machine.scheduled_from("A").count(), 2);
}

#[test]
fn validate_rejects_unknown_initial_state() {
    let machine = MachineBuilder::new("M", "Nowhere")
        .state(StateBuilder::new("A", StateKind::Entry).build())
        .build();
    let err = Component::builder("c").machine(machine).build().unwrap_err();
    assert!(matches!(err, DefinitionError::UnknownInitialState { .. }));
}

#[test]
fn validate_rejects_undeclared_transition_endpoint() {
    let machine = MachineBuilder::new("M", "A")
        .state(StateBuilder::new("A", StateKind::Entry).build())
        .transition(TransitionBuilder::new("A", "Ghost", "GO").build())
        .build();
    let err = Component::builder("c").machine(machine).build().unwrap_err();
    assert!(matches!(err, DefinitionError::UnknownTransitionState { .. }));
}

#[test]
fn validate_rejects_timeout_without_duration() {
    let mut transition = TransitionBuilder::new("A", "B", "EXPIRE").build();
    transition.kind = TransitionKind::Timeout;
    let machine = MachineBuilder::new("M", "A")
        .state(StateBuilder::new("A", StateKind::Entry).build())
        .state(StateBuilder::new("B", StateKind::Regular).build())
        .transition(transition)
        .build();
    let err = Component::builder("c").machine(machine).build().unwrap_err();
    assert!(matches!(err, DefinitionError::TimeoutWithoutDuration { .. }));
}

#[test]
fn validate_rejects_unknown_inter_machine_target() {
    let machine = MachineBuilder::new("M", "A")
        .state(StateBuilder::new("A", StateKind::Entry).build())
        .state(StateBuilder::new("B", StateKind::Regular).build())
        .transition(
            TransitionBuilder::new("A", "B", "SPAWN")
                .target_machine("Ghost")
                .build(),
        )
        .build();
    let err = Component::builder("c").machine(machine).build().unwrap_err();
    assert!(matches!(err, DefinitionError::UnknownTargetMachine { .. }));
}

#[test]
fn validate_rejects_unknown_entry_machine() {
    let machine = MachineBuilder::new("M", "A")
        .state(StateBuilder::new("A", StateKind::Entry).build())
        .build();
    let err = Component::builder("c")
        .entry_machine("Ghost", EntryMachineMode::Singleton)
        .machine(machine)
        .build()
        .unwrap_err();
    assert!(matches!(err, DefinitionError::UnknownEntryMachine { .. }));
}

#[test]
fn validate_rejects_internal_transition_that_moves() {
    let mut transition = TransitionBuilder::new("A", "B", "NOTE").build();
    transition.kind = TransitionKind::Internal;
    let machine = MachineBuilder::new("M", "A")
        .state(StateBuilder::new("A", StateKind::Entry).build())
        .state(StateBuilder::new("B", StateKind::Regular).build())
        .transition(transition)
        .build();
    let err = Component::builder("c").machine(machine).build().unwrap_err();
    assert!(matches!(err, DefinitionError::InternalChangesState { .. }));
}

#[test]
fn component_serde_round_trip() {
    let component = order_inventory_component();
    let json = serde_json::to_string(&component).unwrap();
    let back: Component = serde_json::from_str(&json).unwrap();
    assert_eq!(component, back);
}

#[test]
fn document_field_names_are_camel_case() {
    let component = order_component();
    let value = serde_json::to_value(&component).unwrap();
    assert!(value.get("stateMachines").is_some());
    let machine = &value["stateMachines"]["Order"];
    assert!(machine.get("initialState").is_some());
    let confirm = &machine["transitions"][0];
    assert_eq!(confirm["matchingRules"][0]["eventProperty"], "orderId");
}

#[test]
fn terminal_states() {
    assert!(StateKind::Final.is_terminal());
    assert!(StateKind::Error.is_terminal());
    assert!(!StateKind::Entry.is_terminal());
    assert!(!StateKind::Regular.is_terminal());
}
