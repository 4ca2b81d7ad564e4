// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Triggered-method dispatch.
//!
//! Components declare entry/exit/triggered methods by name; hosts
//! register handlers for those names here. A declared method with no
//! registered handler is logged and skipped — only a handler that runs
//! and fails moves the instance to `error`.

use crate::sender::Sender;
use async_trait::async_trait;
use sb_core::{InstanceId, MachineEvent};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by a user-supplied method handler.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TriggeredMethodError(pub String);

impl From<String> for TriggeredMethodError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

impl From<&str> for TriggeredMethodError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

/// Everything a method handler sees: the triggering event, a read view
/// of the instance data, and a [`Sender`] capability for side effects.
pub struct MethodContext<'a> {
    pub instance_id: InstanceId,
    pub event: &'a MachineEvent,
    pub view: &'a Value,
    pub sender: &'a Sender,
}

/// A user-supplied hook invoked during a transition.
///
/// The handler must complete (or fail) before the state change commits;
/// anything it wants to happen afterwards goes through the sender,
/// which defers to the next scheduling turn.
#[async_trait]
pub trait TriggeredMethod: Send + Sync {
    async fn invoke(&self, ctx: MethodContext<'_>) -> Result<(), TriggeredMethodError>;
}

struct SyncMethod<F>(F);

#[async_trait]
impl<F> TriggeredMethod for SyncMethod<F>
where
    F: Fn(MethodContext<'_>) -> Result<(), TriggeredMethodError> + Send + Sync,
{
    async fn invoke(&self, ctx: MethodContext<'_>) -> Result<(), TriggeredMethodError> {
        (self.0)(ctx)
    }
}

/// Name → handler table, fixed at runtime construction.
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn TriggeredMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        method: Arc<dyn TriggeredMethod>,
    ) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    /// Register a synchronous handler from a closure.
    pub fn register_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(MethodContext<'_>) -> Result<(), TriggeredMethodError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(SyncMethod(f)))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TriggeredMethod>> {
        self.methods.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
