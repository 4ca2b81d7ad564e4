// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixture components shared by tests across the workspace.

use crate::component::{
    Component, EntryMachineMode, MachineBuilder, StateBuilder, StateKind, TransitionBuilder,
};
use crate::rules::{CascadingRule, MatchingRule};
use serde_json::json;

/// Order machine: Pending(entry) --CONFIRM--> Confirmed --SHIP--> Shipped
/// --DELIVER--> Delivered(final). The CONFIRM transition routes by
/// `orderId` against the instance's `Id`.
pub fn order_machine() -> crate::component::StateMachine {
    MachineBuilder::new("Order", "Pending")
        .state(StateBuilder::new("Pending", StateKind::Entry).build())
        .state(StateBuilder::new("Confirmed", StateKind::Regular).build())
        .state(StateBuilder::new("Shipped", StateKind::Regular).build())
        .state(StateBuilder::new("Delivered", StateKind::Final).build())
        .transition(
            TransitionBuilder::new("Pending", "Confirmed", "CONFIRM")
                .matching(MatchingRule::new("orderId", "Id"))
                .build(),
        )
        .transition(TransitionBuilder::new("Confirmed", "Shipped", "SHIP").build())
        .transition(TransitionBuilder::new("Shipped", "Delivered", "DELIVER").build())
        .build()
}

/// A component holding just the order machine.
pub fn order_component() -> Component {
    match Component::builder("orders")
        .entry_machine("Order", EntryMachineMode::Multiple)
        .auto_create_entry_point(false)
        .machine(order_machine())
        .build()
    {
        Ok(c) => c,
        Err(e) => unreachable!("fixture component invalid: {e}"),
    }
}

/// Orders + inventory: entering `Confirmed` cascades a RESERVE event to
/// inventory instances matched by `productId` against their `Id`, with a
/// templated payload drawn from the order's view.
pub fn order_inventory_component() -> Component {
    let order = {
        let mut machine = order_machine();
        if let Some(state) = machine.states.get_mut("Confirmed") {
            state.cascading_rules.push(
                CascadingRule::new("Inventory", "Available", "RESERVE")
                    .matching(MatchingRule::new("productId", "Id"))
                    .payload(json!({
                        "productId": "{{ProductId}}",
                        "qty": "{{Quantity}}",
                    })),
            );
        }
        machine
    };
    let inventory = MachineBuilder::new("Inventory", "Available")
        .state(StateBuilder::new("Available", StateKind::Entry).build())
        .state(StateBuilder::new("Reserved", StateKind::Regular).build())
        .state(StateBuilder::new("Exhausted", StateKind::Final).build())
        .transition(
            TransitionBuilder::new("Available", "Reserved", "RESERVE")
                .matching(MatchingRule::new("productId", "Id"))
                .build(),
        )
        .transition(TransitionBuilder::new("Reserved", "Exhausted", "DEPLETE").build())
        .build();
    match Component::builder("commerce")
        .entry_machine("Order", EntryMachineMode::Multiple)
        .auto_create_entry_point(false)
        .machine(order)
        .machine(inventory)
        .build()
    {
        Ok(c) => c,
        Err(e) => unreachable!("fixture component invalid: {e}"),
    }
}
