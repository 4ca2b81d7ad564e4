// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seam between a runtime and cross-component routing.
//!
//! A standalone runtime carries a [`NoopRouter`]; registering with a
//! `ComponentRegistry` swaps in a real router that delivers through the
//! shared broker (or directly, for local targets on an in-memory
//! broker).

use async_trait::async_trait;
use sb_core::{EventId, InstanceId, MachineEvent, PropertyFilter};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("delivery error: {0}")]
    Delivery(String),
}

/// Cross-component delivery operations, invoked from the runtime's
/// mailbox turn (never inside a transition).
#[async_trait]
pub trait CrossRouter: Send + Sync {
    /// Deliver an event to one instance of another component.
    async fn send_to_component(
        &self,
        source: &str,
        target: &str,
        instance_id: InstanceId,
        event: MachineEvent,
        caused_by: Option<EventId>,
    ) -> Result<(), RouterError>;

    /// Broadcast into another component's `(machine, state)` bucket,
    /// narrowed by resolved property filters (AND). Returns the
    /// processed count when the target is local, `0` when the message
    /// went over the wire.
    async fn broadcast_to_component(
        &self,
        source: &str,
        target: &str,
        machine: &str,
        state: &str,
        event: MachineEvent,
        filters: Vec<PropertyFilter>,
        caused_by: Option<EventId>,
    ) -> Result<usize, RouterError>;

    /// Create an instance in another component.
    async fn create_instance_in_component(
        &self,
        source: &str,
        target: &str,
        machine: &str,
        fields: Value,
        caused_by: Option<EventId>,
    ) -> Result<(), RouterError>;
}

/// Router used before a runtime joins a registry: every cross-component
/// operation fails with `UnknownComponent`.
#[derive(Debug, Default)]
pub struct NoopRouter;

#[async_trait]
impl CrossRouter for NoopRouter {
    async fn send_to_component(
        &self,
        _source: &str,
        target: &str,
        _instance_id: InstanceId,
        _event: MachineEvent,
        _caused_by: Option<EventId>,
    ) -> Result<(), RouterError> {
        Err(RouterError::UnknownComponent(target.to_string()))
    }

    async fn broadcast_to_component(
        &self,
        _source: &str,
        target: &str,
        _machine: &str,
        _state: &str,
        _event: MachineEvent,
        _filters: Vec<PropertyFilter>,
        _caused_by: Option<EventId>,
    ) -> Result<usize, RouterError> {
        Err(RouterError::UnknownComponent(target.to_string()))
    }

    async fn create_instance_in_component(
        &self,
        _source: &str,
        target: &str,
        _machine: &str,
        _fields: Value,
        _caused_by: Option<EventId>,
    ) -> Result<(), RouterError> {
        Err(RouterError::UnknownComponent(target.to_string()))
    }
}
