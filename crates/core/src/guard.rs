// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative transition guards.

use crate::expr::{truthy, EvalScope, Expression};
use serde::{Deserialize, Serialize};

/// A declarative guard evaluated purely over `(event, instance view)`.
///
/// All guards on a transition must pass (logical AND). A guard that
/// cannot be evaluated denies the transition; it never fails the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Guard {
    /// The event payload carries the given key (dotted paths allowed).
    HasProperty { key: String },
    /// The value at `path` contains `needle` as a substring.
    Contains { path: String, needle: String },
    /// An expression in the restricted grammar.
    Expr { rule: Expression },
}

impl Guard {
    /// Evaluate this guard under the scope's path-root rules.
    pub fn evaluate(&self, scope: &EvalScope<'_>) -> bool {
        match self {
            Guard::HasProperty { key } => !scope.resolve(key).is_null(),
            Guard::Contains { path, needle } => match scope.resolve(path) {
                serde_json::Value::String(s) => s.contains(needle.as_str()),
                other => truthy(&other) && other.to_string().contains(needle.as_str()),
            },
            Guard::Expr { rule } => rule.eval_bool(scope),
        }
    }
}

/// Evaluate a guard list with AND semantics. Empty lists pass.
pub fn evaluate_all(guards: &[Guard], scope: &EvalScope<'_>) -> bool {
    guards.iter().all(|g| g.evaluate(scope))
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
