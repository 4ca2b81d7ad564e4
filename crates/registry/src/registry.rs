// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The component registry: N runtimes, one broker.
//!
//! Registering a component subscribes its `xcomponent:<name>` channel
//! and wires the runtime's cross-component router to this registry.
//! Cross-component sends use a direct fast path when the broker is
//! in-memory and the target is local (returning the processed count);
//! otherwise they publish an envelope and return 0 — the count is not
//! observable across processes, and side effects are eventually
//! consistent.

use crate::error::RegistryError;
use crate::router::RegistryRouter;
use parking_lot::RwLock;
use sb_broker::{BrokerMessage, MessageBroker};
use sb_core::{Clock, EventId, MachineEvent, Notification, PersistedEvent, PropertyFilter};
use sb_engine::Runtime;
use sb_wire::channel;
use sb_wire::{decode, CommandMessage};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

struct Registered<C: Clock> {
    runtime: Runtime<C>,
    consumer: tokio::task::JoinHandle<()>,
}

pub(crate) struct RegistryInner<C: Clock> {
    pub(crate) broker: Arc<dyn MessageBroker>,
    pub(crate) runtimes: RwLock<HashMap<String, Registered<C>>>,
}

/// Registry of components sharing one broker.
pub struct ComponentRegistry<C: Clock> {
    inner: Arc<RegistryInner<C>>,
}

impl<C: Clock> Clone for ComponentRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock> ComponentRegistry<C> {
    pub(crate) fn from_inner(inner: Arc<RegistryInner<C>>) -> Self {
        Self { inner }
    }

    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                broker,
                runtimes: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn broker(&self) -> Arc<dyn MessageBroker> {
        Arc::clone(&self.inner.broker)
    }

    /// Register a runtime: subscribe its component channel, install the
    /// cross-component router, start the channel consumer.
    pub async fn register(&self, runtime: Runtime<C>) -> Result<(), RegistryError> {
        let name = runtime.component().name.clone();
        if self.inner.runtimes.read().contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.inner.broker.connect().await?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .broker
            .subscribe(&channel::component_channel(&name), tx)
            .await?;
        let consumer = tokio::spawn(consume_component_channel(runtime.clone(), rx));

        runtime.set_router(Arc::new(RegistryRouter::new(Arc::downgrade(&self.inner))));
        self.inner.runtimes.write().insert(
            name.clone(),
            Registered { runtime, consumer },
        );
        tracing::info!(component = %name, "component registered");
        Ok(())
    }

    /// Unregister a component: dispose its runtime, stop the consumer,
    /// drop the channel subscription.
    pub async fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        let registered = self
            .inner
            .runtimes
            .write()
            .remove(name)
            .ok_or_else(|| RegistryError::UnknownComponent(name.to_string()))?;
        self.inner
            .broker
            .unsubscribe(&channel::component_channel(name))
            .await?;
        registered.runtime.dispose().await;
        registered.consumer.abort();
        tracing::info!(component = %name, "component unregistered");
        Ok(())
    }

    pub fn runtime(&self, name: &str) -> Option<Runtime<C>> {
        self.inner.runtimes.read().get(name).map(|r| r.runtime.clone())
    }

    pub fn component_names(&self) -> Vec<String> {
        self.inner.runtimes.read().keys().cloned().collect()
    }

    /// Send an event to one instance of a component.
    pub async fn send_to_component(
        &self,
        target: &str,
        instance_id: sb_core::InstanceId,
        event: MachineEvent,
        caused_by: Option<EventId>,
    ) -> Result<(), RegistryError> {
        if self.inner.broker.is_local() {
            if let Some(runtime) = self.runtime(target) {
                runtime.send_event_caused(instance_id, event, caused_by).await?;
                return Ok(());
            }
        }
        let envelope = CommandMessage::TriggerEvent {
            component_name: target.to_string(),
            instance_id,
            event_type: event.event_type,
            payload: event.payload,
        };
        self.publish_command(target, &envelope).await
    }

    /// Broadcast into a component's `(machine, state)` bucket, narrowed
    /// by resolved filters (AND).
    ///
    /// Local target on an in-memory broker: delivered directly, returns
    /// the processed count. Otherwise: published, returns 0.
    #[allow(clippy::too_many_arguments)]
    pub async fn broadcast_to_component(
        &self,
        target: &str,
        machine: &str,
        state: &str,
        event: MachineEvent,
        filters: Vec<PropertyFilter>,
        source_component: Option<&str>,
        caused_by: Option<EventId>,
    ) -> Result<usize, RegistryError> {
        if self.inner.broker.is_local() {
            if let Some(runtime) = self.runtime(target) {
                let count = runtime
                    .deliver_filtered(machine, state, event, filters, caused_by)
                    .await?;
                return Ok(count);
            }
        }
        let envelope = CommandMessage::CrossComponentEvent {
            source_component: source_component.unwrap_or_default().to_string(),
            target_component: target.to_string(),
            target_machine: machine.to_string(),
            target_state: state.to_string(),
            event_type: event.event_type,
            payload: event.payload,
            matching_rules: filters,
            caused_by,
        };
        self.publish_command(target, &envelope).await?;
        Ok(0)
    }

    /// Create an instance in a component.
    pub async fn create_instance_in_component(
        &self,
        target: &str,
        machine: &str,
        initial_fields: Value,
        caused_by: Option<EventId>,
    ) -> Result<(), RegistryError> {
        if self.inner.broker.is_local() {
            if let Some(runtime) = self.runtime(target) {
                runtime
                    .create_instance_caused(machine, initial_fields, caused_by)
                    .await?;
                return Ok(());
            }
        }
        let envelope = CommandMessage::CreateInstance {
            component_name: target.to_string(),
            machine_name: machine.to_string(),
            initial_fields,
            caused_by,
        };
        self.publish_command(target, &envelope).await
    }

    /// Broadcast to every local runtime. Per-runtime failures emit
    /// `broadcast_error` on that runtime and iteration continues.
    pub async fn broadcast_to_all(
        &self,
        machine: &str,
        state: &str,
        event: MachineEvent,
    ) -> usize {
        let runtimes: Vec<Runtime<C>> = self
            .inner
            .runtimes
            .read()
            .values()
            .map(|r| r.runtime.clone())
            .collect();

        let mut total = 0usize;
        for runtime in runtimes {
            match runtime
                .deliver_filtered(machine, state, event.clone(), Vec::new(), None)
                .await
            {
                Ok(count) => total += count,
                Err(e) => {
                    tracing::warn!(
                        component = %runtime.component().name,
                        error = %e,
                        "broadcast_to_all delivery failed"
                    );
                    runtime.emit_notification(Notification::BroadcastError {
                        machine_name: machine.to_string(),
                        state: state.to_string(),
                        event_type: event.event_type.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        total
    }

    /// Cross-component causality: walk forward from the root event
    /// across every registered runtime's store (following recorded
    /// `caused` links and `caused_by` back-references), dedupe, sort by
    /// `persisted_at`.
    pub async fn trace_causality(&self, root: EventId) -> Vec<PersistedEvent> {
        let runtimes: Vec<Runtime<C>> = self
            .inner
            .runtimes
            .read()
            .values()
            .map(|r| r.runtime.clone())
            .collect();

        let mut seen: HashSet<EventId> = HashSet::new();
        let mut chain: Vec<PersistedEvent> = Vec::new();
        let mut frontier = vec![root];
        while let Some(id) = frontier.pop() {
            if !seen.insert(id) {
                continue;
            }
            for runtime in &runtimes {
                if let Ok(Some(event)) = runtime.persisted_event(id).await {
                    frontier.extend(event.caused.iter().copied());
                    if chain.iter().all(|e| e.id != event.id) {
                        chain.push(event);
                    }
                }
                // An event's consequences may live in a different
                // component's store than the event itself.
                if let Ok(children) = runtime.events_caused_by(id).await {
                    frontier.extend(children.into_iter().map(|e| e.id));
                }
            }
        }
        chain.sort_by_key(|e| e.persisted_at);
        chain
    }

    async fn publish_command(
        &self,
        target: &str,
        envelope: &CommandMessage,
    ) -> Result<(), RegistryError> {
        let payload = serde_json::to_value(envelope)
            .map_err(|e| RegistryError::Broker(sb_broker::BrokerError::Publish(e.to_string())))?;
        self.inner
            .broker
            .publish(&channel::component_channel(target), payload)
            .await?;
        Ok(())
    }
}

/// Consume a component's channel: decode commands, dispatch to the
/// runtime. Malformed messages are logged and dropped.
async fn consume_component_channel<C: Clock>(
    runtime: Runtime<C>,
    mut rx: mpsc::UnboundedReceiver<BrokerMessage>,
) {
    while let Some(message) = rx.recv().await {
        let command: CommandMessage = match decode(&message.payload) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(channel = %message.channel, error = %e, "malformed message dropped");
                continue;
            }
        };
        match command {
            CommandMessage::TriggerEvent {
                instance_id,
                event_type,
                payload,
                ..
            } => {
                let event = MachineEvent::new(event_type, payload, runtime.now_ms());
                if let Err(e) = runtime.send_event_caused(instance_id, event, None).await {
                    tracing::debug!(instance = %instance_id, error = %e, "trigger_event failed");
                }
            }
            CommandMessage::CreateInstance {
                machine_name,
                initial_fields,
                caused_by,
                ..
            } => {
                if let Err(e) = runtime
                    .create_instance_caused(&machine_name, initial_fields, caused_by)
                    .await
                {
                    tracing::warn!(machine = %machine_name, error = %e, "create_instance failed");
                }
            }
            CommandMessage::CrossComponentEvent {
                target_machine,
                target_state,
                event_type,
                payload,
                matching_rules,
                caused_by,
                ..
            } => {
                let event = MachineEvent::new(event_type, payload, runtime.now_ms());
                if let Err(e) = runtime
                    .deliver_filtered(
                        &target_machine,
                        &target_state,
                        event,
                        matching_rules,
                        caused_by,
                    )
                    .await
                {
                    tracing::warn!(machine = %target_machine, error = %e, "cross-component delivery failed");
                }
            }
            CommandMessage::QueryInstances { .. } => {
                // Answered by runtime broadcasters, not the registry.
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
