// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The registry-backed cross-component router installed on every
//! registered runtime.

use crate::registry::{ComponentRegistry, RegistryInner};
use async_trait::async_trait;
use sb_core::{Clock, EventId, InstanceId, MachineEvent, PropertyFilter};
use sb_engine::{CrossRouter, RouterError};
use serde_json::Value;
use std::sync::Weak;

pub(crate) struct RegistryRouter<C: Clock> {
    inner: Weak<RegistryInner<C>>,
}

impl<C: Clock> RegistryRouter<C> {
    pub(crate) fn new(inner: Weak<RegistryInner<C>>) -> Self {
        Self { inner }
    }

    fn registry(&self) -> Result<ComponentRegistry<C>, RouterError> {
        self.inner
            .upgrade()
            .map(ComponentRegistry::from_inner)
            .ok_or_else(|| RouterError::Delivery("registry dropped".to_string()))
    }
}

#[async_trait]
impl<C: Clock> CrossRouter for RegistryRouter<C> {
    async fn send_to_component(
        &self,
        _source: &str,
        target: &str,
        instance_id: InstanceId,
        event: MachineEvent,
        caused_by: Option<EventId>,
    ) -> Result<(), RouterError> {
        self.registry()?
            .send_to_component(target, instance_id, event, caused_by)
            .await
            .map_err(|e| RouterError::Delivery(e.to_string()))
    }

    async fn broadcast_to_component(
        &self,
        source: &str,
        target: &str,
        machine: &str,
        state: &str,
        event: MachineEvent,
        filters: Vec<PropertyFilter>,
        caused_by: Option<EventId>,
    ) -> Result<usize, RouterError> {
        self.registry()?
            .broadcast_to_component(target, machine, state, event, filters, Some(source), caused_by)
            .await
            .map_err(|e| RouterError::Delivery(e.to_string()))
    }

    async fn create_instance_in_component(
        &self,
        _source: &str,
        target: &str,
        machine: &str,
        fields: Value,
        caused_by: Option<EventId>,
    ) -> Result<(), RouterError> {
        self.registry()?
            .create_instance_in_component(target, machine, fields, caused_by)
            .await
            .map_err(|e| RouterError::Delivery(e.to_string()))
    }
}
