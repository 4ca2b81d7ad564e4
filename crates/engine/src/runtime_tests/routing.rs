// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property routing: broadcasts, transition selection, guards.

use super::*;
use sb_core::{Expression, Guard, MatchingRule};

#[tokio::test]
async fn broadcast_reaches_exactly_the_matching_instance() {
    let ctx = setup(order_component());
    let mut ids = Vec::new();
    for n in 0..50 {
        ids.push(
            ctx.runtime
                .create_instance("Order", json!({"Id": n}))
                .await
                .unwrap(),
        );
    }

    let count = ctx
        .runtime
        .broadcast_event("Order", "Pending", "CONFIRM", json!({"orderId": 37}))
        .await
        .unwrap();
    assert_eq!(count, 1);

    for (n, id) in ids.iter().enumerate() {
        let state = ctx.runtime.instance(*id).await.unwrap().current_state;
        if n == 37 {
            assert_eq!(state, "Confirmed");
        } else {
            assert_eq!(state, "Pending");
        }
    }
}

#[tokio::test]
async fn broadcast_without_rule_transitions_is_rejected() {
    let ctx = setup(order_component());
    ctx.runtime.create_instance("Order", json!({"Id": 1})).await.unwrap();
    // SHIP out of Confirmed declares no matching rules.
    let err = ctx
        .runtime
        .broadcast_event("Order", "Confirmed", "SHIP", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoMatchingTransition { .. }));
}

#[tokio::test]
async fn broadcast_on_nested_property_scans_the_state_bucket() {
    let machine = MachineBuilder::new("Shipment", "Open")
        .state(StateBuilder::new("Open", StateKind::Entry).build())
        .state(StateBuilder::new("Routed", StateKind::Regular).build())
        .transition(
            TransitionBuilder::new("Open", "Routed", "ROUTE")
                .matching(MatchingRule::new("hub", "meta.hub"))
                .build(),
        )
        .build();
    let component = Component::builder("logistics").machine(machine).build().unwrap();
    let ctx = setup(component);

    let east = ctx
        .runtime
        .create_instance("Shipment", json!({"meta": {"hub": "east"}}))
        .await
        .unwrap();
    let west = ctx
        .runtime
        .create_instance("Shipment", json!({"meta": {"hub": "west"}}))
        .await
        .unwrap();

    let count = ctx
        .runtime
        .broadcast_event("Shipment", "Open", "ROUTE", json!({"hub": "west"}))
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(ctx.runtime.instance(west).await.unwrap().current_state, "Routed");
    assert_eq!(ctx.runtime.instance(east).await.unwrap().current_state, "Open");
}

/// Duplicate delivery after the instance moved on is a no-op: the
/// second broadcast finds no instance in the pre-transition state.
#[tokio::test]
async fn duplicate_broadcast_is_idempotent() {
    let mut ctx = setup(order_component());
    let id = ctx.runtime.create_instance("Order", json!({"Id": 9})).await.unwrap();

    let first = ctx
        .runtime
        .broadcast_event("Order", "Pending", "CONFIRM", json!({"orderId": 9}))
        .await
        .unwrap();
    assert_eq!(first, 1);

    let second = ctx
        .runtime
        .broadcast_event("Order", "Pending", "CONFIRM", json!({"orderId": 9}))
        .await
        .unwrap();
    assert_eq!(second, 0);

    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Confirmed");
    drain(&mut ctx.notes);
}

fn fork_component(
    first: Option<Expression>,
    second: Option<Expression>,
    second_rules: Vec<MatchingRule>,
) -> Component {
    let mut left = TransitionBuilder::new("Start", "Left", "GO").build();
    left.specific_triggering_rule = first;
    let mut right = TransitionBuilder::new("Start", "Right", "GO").build();
    right.specific_triggering_rule = second;
    right.matching_rules = second_rules;

    let machine = MachineBuilder::new("Fork", "Start")
        .state(StateBuilder::new("Start", StateKind::Entry).build())
        .state(StateBuilder::new("Left", StateKind::Regular).build())
        .state(StateBuilder::new("Right", StateKind::Regular).build())
        .transition(left)
        .transition(right)
        .build();
    Component::builder("forks").machine(machine).build().unwrap()
}

#[tokio::test]
async fn specific_triggering_rule_selects_among_candidates() {
    let ctx = setup(fork_component(
        Some(Expression::parse("event.side === 'left'").unwrap()),
        Some(Expression::parse("event.side === 'right'").unwrap()),
        Vec::new(),
    ));
    let id = ctx.runtime.create_instance("Fork", json!({})).await.unwrap();
    ctx.runtime
        .send_event(id, "GO", json!({"side": "right"}))
        .await
        .unwrap();
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Right");
}

#[tokio::test]
async fn matching_rules_select_when_no_triggering_rule_passes() {
    let ctx = setup(fork_component(
        None,
        None,
        vec![MatchingRule::new("key", "Id")],
    ));
    let id = ctx.runtime.create_instance("Fork", json!({"Id": 5})).await.unwrap();
    ctx.runtime.send_event(id, "GO", json!({"key": 5})).await.unwrap();
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Right");
}

#[tokio::test]
async fn selection_falls_back_to_source_order() {
    let ctx = setup(fork_component(None, None, Vec::new()));
    let id = ctx.runtime.create_instance("Fork", json!({})).await.unwrap();
    ctx.runtime.send_event(id, "GO", json!({})).await.unwrap();
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Left");
}

#[tokio::test]
async fn guard_denial_emits_guard_failed_and_keeps_state() {
    let machine = MachineBuilder::new("Gate", "Closed")
        .state(StateBuilder::new("Closed", StateKind::Entry).build())
        .state(StateBuilder::new("Open", StateKind::Regular).build())
        .transition(
            TransitionBuilder::new("Closed", "Open", "OPEN")
                .guard(Guard::Expr {
                    rule: Expression::parse("event.code === context.code").unwrap(),
                })
                .build(),
        )
        .build();
    let component = Component::builder("gates").machine(machine).build().unwrap();
    let mut ctx = setup(component);

    let id = ctx
        .runtime
        .create_instance("Gate", json!({"code": "sesame"}))
        .await
        .unwrap();
    drain(&mut ctx.notes);

    let outcome = ctx
        .runtime
        .send_event(id, "OPEN", json!({"code": "wrong"}))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::GuardDenied);
    assert_eq!(note_names(&drain(&mut ctx.notes)), vec!["guard_failed"]);
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Closed");

    let outcome = ctx
        .runtime
        .send_event(id, "OPEN", json!({"code": "sesame"}))
        .await
        .unwrap();
    assert!(outcome.transitioned());
}

/// Matching-rule targets are set at creation and treated as immutable:
/// the property index does not observe `update_context`, so an instance
/// whose routed field was mutated becomes unreachable by that rule.
#[tokio::test]
async fn index_is_not_updated_for_context_mutations() {
    let methods = MethodRegistry::new().register_fn("rename", |ctx| {
        ctx.sender.update_context(json!({"Id": 999}));
        Ok(())
    });
    let machine = MachineBuilder::new("Tag", "Fresh")
        .state(StateBuilder::new("Fresh", StateKind::Entry).build())
        .state(StateBuilder::new("Renamed", StateKind::Regular).build())
        .state(StateBuilder::new("Claimed", StateKind::Regular).build())
        .transition(
            TransitionBuilder::new("Fresh", "Renamed", "RENAME")
                .triggered_method("rename")
                .build(),
        )
        .transition(
            TransitionBuilder::new("Renamed", "Claimed", "CLAIM")
                .matching(MatchingRule::new("tagId", "Id"))
                .build(),
        )
        .build();
    let component = Component::builder("tags").machine(machine).build().unwrap();
    let ctx = setup_with(component, methods);

    let id = ctx.runtime.create_instance("Tag", json!({"Id": 1})).await.unwrap();
    ctx.runtime.send_event(id, "RENAME", json!({})).await.unwrap();
    ctx.runtime.quiesce().await;
    assert_eq!(ctx.runtime.instance(id).await.unwrap().view()["Id"], json!(999));

    // Old value: the index still holds it, but the live view no longer
    // satisfies the rule. New value: the index never learned it.
    let by_old = ctx
        .runtime
        .broadcast_event("Tag", "Renamed", "CLAIM", json!({"tagId": 1}))
        .await
        .unwrap();
    let by_new = ctx
        .runtime
        .broadcast_event("Tag", "Renamed", "CLAIM", json!({"tagId": 999}))
        .await
        .unwrap();
    assert_eq!((by_old, by_new), (0, 0));
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Renamed");
}
