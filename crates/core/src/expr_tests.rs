// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn eval(source: &str, event: &Value, context: &Value) -> Value {
    let expr = Expression::parse(source).unwrap();
    expr.eval(&EvalScope::new(event, context))
}

fn eval_bool(source: &str, event: &Value, context: &Value) -> bool {
    let expr = Expression::parse(source).unwrap();
    expr.eval_bool(&EvalScope::new(event, context))
}

#[yare::parameterized(
    eq_true = { "status === 'ready'", true },
    eq_false = { "status === 'done'", false },
    ne = { "status !== 'done'", true },
    gt = { "amount > 10", true },
    lt = { "amount < 10", false },
    ge_boundary = { "amount >= 12", true },
    le = { "amount <= 12", true },
    contains_str = { "status contains 'ea'", true },
    in_array = { "status in tags", true },
)]
fn comparison_operators(source: &str, expected: bool) {
    let event = json!({"status": "ready", "amount": 12, "tags": ["ready", "new"]});
    assert_eq!(eval_bool(source, &event, &json!({})), expected);
}

#[test]
fn event_and_context_roots() {
    let event = json!({"orderId": 7});
    let context = json!({"Id": 7, "state": "open"});
    assert!(eval_bool(
        "event.orderId === context.Id",
        &event,
        &context
    ));
    assert!(eval_bool("instance.state === 'open'", &event, &context));
}

#[test]
fn bare_paths_read_the_event_payload() {
    let event = json!({"kind": "priority"});
    assert!(eval_bool("kind === 'priority'", &event, &json!({})));
}

#[test]
fn boolean_combinators() {
    let event = json!({"a": 1, "b": 0});
    assert!(eval_bool("a === 1 && b === 0", &event, &json!({})));
    assert!(eval_bool("a === 2 || b === 0", &event, &json!({})));
    assert!(eval_bool("!(a === 2)", &event, &json!({})));
    // Keyword spellings are accepted too.
    assert!(eval_bool("a === 1 AND not (b === 1)", &event, &json!({})));
    assert!(eval_bool("a === 2 or b === 0", &event, &json!({})));
}

#[test]
fn and_binds_tighter_than_or() {
    let event = json!({});
    // false && false || true  ==  (false && false) || true
    assert!(eval_bool("false && false || true", &event, &json!({})));
}

#[test]
fn missing_paths_are_null_and_falsy() {
    assert_eq!(eval("nope.deep", &json!({}), &json!({})), Value::Null);
    assert!(!eval_bool("nope.deep", &json!({}), &json!({})));
    assert!(eval_bool("nope === null", &json!({}), &json!({})));
}

#[test]
fn numeric_coercion_in_equality() {
    let event = json!({"n": 5});
    assert!(eval_bool("n === 5.0", &event, &json!({})));
}

#[test]
fn mismatched_types_never_order() {
    let event = json!({"s": "abc"});
    assert!(!eval_bool("s > 5", &event, &json!({})));
    assert!(!eval_bool("s < 5", &event, &json!({})));
}

#[test]
fn string_ordering_is_lexicographic() {
    let event = json!({"a": "apple", "b": "banana"});
    assert!(eval_bool("a < b", &event, &json!({})));
}

#[test]
fn literals() {
    let scope_event = json!({});
    assert_eq!(eval("'hello'", &scope_event, &json!({})), json!("hello"));
    assert_eq!(eval("\"hi\"", &scope_event, &json!({})), json!("hi"));
    assert_eq!(eval("true", &scope_event, &json!({})), json!(true));
    assert_eq!(eval("null", &scope_event, &json!({})), Value::Null);
    assert_eq!(eval("-2.5", &scope_event, &json!({})), json!(-2.5));
}

#[test]
fn string_escapes() {
    assert_eq!(
        eval(r"'it\'s'", &json!({}), &json!({})),
        json!("it's")
    );
}

#[yare::parameterized(
    lone_equals = { "a = b" },
    double_equals = { "a == b" },
    bang_equals_missing_char = { "a !== " },
    unterminated = { "a === 'oops" },
    trailing = { "a === 1 b" },
    empty = { "" },
    bad_char = { "a === #" },
    unclosed_paren = { "(a === 1" },
)]
fn parse_errors(source: &str) {
    assert!(Expression::parse(source).is_err(), "{source:?} should fail");
}

#[test]
fn serde_round_trip_preserves_source() {
    let expr = Expression::parse("event.a === context.b && x > 1").unwrap();
    let json = serde_json::to_string(&expr).unwrap();
    let back: Expression = serde_json::from_str(&json).unwrap();
    assert_eq!(expr, back);
    assert_eq!(back.source(), "event.a === context.b && x > 1");
}

#[test]
fn deserialize_rejects_invalid_grammar() {
    let result: Result<Expression, _> = serde_json::from_str("\"a === \"");
    assert!(result.is_err());
}

#[test]
fn compare_op_parse_and_symbol_round_trip() {
    for op in [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Gt,
        CompareOp::Lt,
        CompareOp::Ge,
        CompareOp::Le,
        CompareOp::Contains,
        CompareOp::In,
    ] {
        assert_eq!(CompareOp::parse(op.symbol()), Some(op));
    }
    assert_eq!(CompareOp::parse("=="), None);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any parsed expression survives a serialize/deserialize cycle.
        #[test]
        fn serde_round_trip(path in "[a-z][a-z0-9_]{0,8}(\\.[a-z][a-z0-9_]{0,8}){0,3}",
                            num in -1000i32..1000) {
            let source = format!("{path} >= {num}");
            let expr = Expression::parse(&source).unwrap();
            let json = serde_json::to_string(&expr).unwrap();
            let back: Expression = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(expr, back);
        }

        /// Evaluation is total: no panic for arbitrary scalar payloads.
        #[test]
        fn eval_is_total(n in proptest::num::f64::NORMAL) {
            let event = json!({"n": n});
            let expr = Expression::parse("n > 0 && n contains '1' || !n").unwrap();
            let _ = expr.eval_bool(&EvalScope::new(&event, &json!({})));
        }
    }
}
