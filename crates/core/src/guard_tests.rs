// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn has_property_checks_payload_keys() {
    let event = json!({"orderId": 5, "nested": {"flag": true}});
    let context = json!({});
    let scope = EvalScope::new(&event, &context);
    assert!(Guard::HasProperty { key: "orderId".into() }.evaluate(&scope));
    assert!(Guard::HasProperty { key: "nested.flag".into() }.evaluate(&scope));
    assert!(!Guard::HasProperty { key: "missing".into() }.evaluate(&scope));
}

#[test]
fn contains_checks_substring() {
    let event = json!({"sku": "WIDGET-42"});
    let context = json!({});
    let scope = EvalScope::new(&event, &context);
    let guard = Guard::Contains {
        path: "sku".into(),
        needle: "WIDGET".into(),
    };
    assert!(guard.evaluate(&scope));
    let guard = Guard::Contains {
        path: "sku".into(),
        needle: "GADGET".into(),
    };
    assert!(!guard.evaluate(&scope));
}

#[test]
fn contains_on_missing_path_denies() {
    let scope_event = json!({});
    let context = json!({});
    let scope = EvalScope::new(&scope_event, &context);
    let guard = Guard::Contains {
        path: "nope".into(),
        needle: "x".into(),
    };
    assert!(!guard.evaluate(&scope));
}

#[test]
fn expr_guard_reads_both_roots() {
    let event = json!({"amount": 20});
    let context = json!({"limit": 15});
    let scope = EvalScope::new(&event, &context);
    let guard = Guard::Expr {
        rule: Expression::parse("event.amount > context.limit").unwrap(),
    };
    assert!(guard.evaluate(&scope));
}

#[test]
fn evaluate_all_is_logical_and() {
    let event = json!({"a": 1});
    let context = json!({});
    let scope = EvalScope::new(&event, &context);
    let pass = Guard::HasProperty { key: "a".into() };
    let deny = Guard::HasProperty { key: "b".into() };
    assert!(evaluate_all(&[], &scope));
    assert!(evaluate_all(&[pass.clone()], &scope));
    assert!(!evaluate_all(&[pass, deny], &scope));
}

#[test]
fn guard_serde_round_trip() {
    let guard = Guard::Expr {
        rule: Expression::parse("a === 1").unwrap(),
    };
    let json = serde_json::to_string(&guard).unwrap();
    let back: Guard = serde_json::from_str(&json).unwrap();
    assert_eq!(guard, back);
}
