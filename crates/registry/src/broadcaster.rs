// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridges one runtime to a shared broker.
//!
//! On connect: announce the runtime, start the heartbeat, subscribe the
//! command channels, bridge engine notifications onto the `fsm:events:*`
//! channels, and (for singleton entry machines, unless configured off)
//! auto-create the entry-point instance. Commands are translated back
//! into runtime calls; cross-component events require resolved matching
//! rules and are rejected otherwise — an unfiltered command never
//! broadcasts to every instance.

use crate::error::RegistryError;
use sb_broker::{BrokerMessage, MessageBroker};
use sb_core::{Clock, EntryMachineMode, MachineEvent, Notification, RuntimeId};
use sb_engine::Runtime;
use sb_wire::channel;
use sb_wire::{decode, CommandMessage, EventMessage, QueryResponse, RegistryMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    pub host: String,
    pub port: u16,
    pub heartbeat_interval: Duration,
    /// Override for entry-point auto-creation. `None` follows the
    /// component (`auto_create_entry_point`, default for singleton
    /// mode).
    pub auto_create_entry_point: Option<bool>,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 0,
            heartbeat_interval: Duration::from_secs(30),
            auto_create_entry_point: None,
        }
    }
}

/// Bridge between one runtime and a shared broker.
pub struct RuntimeBroadcaster<C: Clock> {
    runtime_id: RuntimeId,
    runtime: Runtime<C>,
    broker: Arc<dyn MessageBroker>,
    config: BroadcasterConfig,
    cancel: CancellationToken,
}

impl<C: Clock> RuntimeBroadcaster<C> {
    pub fn new(
        runtime: Runtime<C>,
        broker: Arc<dyn MessageBroker>,
        config: BroadcasterConfig,
    ) -> Self {
        Self {
            runtime_id: RuntimeId::new(),
            runtime,
            broker,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn runtime_id(&self) -> RuntimeId {
        self.runtime_id
    }

    /// Connect to the broker: announce, heartbeat, command
    /// subscriptions, event bridging, entry-point auto-creation.
    pub async fn connect(&self) -> Result<(), RegistryError> {
        self.broker.connect().await?;
        self.announce().await?;

        if self.should_auto_create_entry() {
            self.runtime.ensure_entry_instance().await?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for command_channel in [
            channel::COMMANDS_TRIGGER_EVENT,
            channel::COMMANDS_CREATE_INSTANCE,
            channel::COMMANDS_CROSS_COMPONENT_EVENT,
            channel::COMMANDS_QUERY_INSTANCES,
            channel::REGISTRY_DISCOVER,
        ] {
            self.broker.subscribe(command_channel, tx.clone()).await?;
        }

        self.spawn_command_consumer(rx);
        self.spawn_event_bridge(self.runtime.subscribe());
        self.spawn_heartbeat();
        tracing::info!(
            runtime = %self.runtime_id,
            component = %self.runtime.component().name,
            "broadcaster connected"
        );
        Ok(())
    }

    /// Publish the shutdown message, stop background tasks, disconnect.
    pub async fn shutdown(&self) -> Result<(), RegistryError> {
        let message = RegistryMessage::Shutdown {
            runtime_id: self.runtime_id,
            component_name: self.runtime.component().name.clone(),
        };
        self.publish(channel::REGISTRY_SHUTDOWN, &message).await?;
        self.cancel.cancel();
        self.broker.disconnect().await?;
        Ok(())
    }

    fn should_auto_create_entry(&self) -> bool {
        let component = self.runtime.component();
        if component.entry_machine.is_none() {
            return false;
        }
        match self.config.auto_create_entry_point {
            Some(auto) => auto,
            None => {
                component.auto_create_entry_point
                    && component.entry_machine_mode == EntryMachineMode::Singleton
            }
        }
    }

    async fn announce(&self) -> Result<(), RegistryError> {
        let component = self.runtime.component();
        let message = RegistryMessage::Announce {
            runtime_id: self.runtime_id,
            component_name: component.name.clone(),
            component: (*component).clone(),
            host: self.config.host.clone(),
            port: self.config.port,
        };
        self.publish(channel::REGISTRY_ANNOUNCE, &message).await
    }

    async fn publish<T: serde::Serialize>(
        &self,
        target_channel: &str,
        message: &T,
    ) -> Result<(), RegistryError> {
        let payload = serde_json::to_value(message)
            .map_err(|e| RegistryError::Broker(sb_broker::BrokerError::Publish(e.to_string())))?;
        self.broker.publish(target_channel, payload).await?;
        Ok(())
    }

    fn spawn_heartbeat(&self) {
        let broker = Arc::clone(&self.broker);
        let runtime = self.runtime.clone();
        let runtime_id = self.runtime_id;
        let interval = self.config.heartbeat_interval;
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick duplicates the announce.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let message = RegistryMessage::Heartbeat {
                            runtime_id,
                            component_name: runtime.component().name.clone(),
                            timestamp_ms: runtime.now_ms(),
                        };
                        let Ok(payload) = serde_json::to_value(&message) else {
                            continue;
                        };
                        if let Err(e) = broker.publish(channel::REGISTRY_HEARTBEAT, payload).await {
                            tracing::warn!(error = %e, "heartbeat publish failed");
                        }
                    }
                }
            }
        });
    }

    /// Translate engine notifications into `fsm:events:*` messages.
    fn spawn_event_bridge(&self, mut notifications: broadcast::Receiver<Notification>) {
        let broker = Arc::clone(&self.broker);
        let runtime = self.runtime.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let component_name = runtime.component().name.clone();
            loop {
                let notification = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = notifications.recv() => match received {
                        Ok(n) => n,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event bridge lagged, notifications dropped");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };

                let now = runtime.now_ms();
                let outgoing: Vec<(&str, EventMessage)> = match &notification {
                    Notification::StateChange {
                        instance_id,
                        machine_name,
                        from,
                        to,
                        event_type,
                        timed_out,
                        ..
                    } => {
                        let mut out = vec![(
                            channel::EVENTS_STATE_CHANGE,
                            EventMessage::StateChange {
                                component_name: component_name.clone(),
                                machine_name: machine_name.clone(),
                                instance_id: *instance_id,
                                from: from.clone(),
                                to: to.clone(),
                                event_type: event_type.clone(),
                                timestamp_ms: now,
                            },
                        )];
                        if *timed_out {
                            out.push((
                                channel::EVENTS_TIMEOUT_TRIGGERED,
                                EventMessage::TimeoutTriggered {
                                    component_name: component_name.clone(),
                                    machine_name: machine_name.clone(),
                                    instance_id: *instance_id,
                                    from: from.clone(),
                                    to: to.clone(),
                                    event_type: event_type.clone(),
                                    timestamp_ms: now,
                                },
                            ));
                        }
                        out
                    }
                    Notification::InstanceCreated {
                        instance_id,
                        machine_name,
                        state,
                        ..
                    } => vec![(
                        channel::EVENTS_INSTANCE_CREATED,
                        EventMessage::InstanceCreated {
                            component_name: component_name.clone(),
                            machine_name: machine_name.clone(),
                            instance_id: *instance_id,
                            state: state.clone(),
                            timestamp_ms: now,
                        },
                    )],
                    Notification::InstanceDisposed {
                        instance_id,
                        machine_name,
                        final_state,
                        status,
                    } => vec![(
                        channel::EVENTS_INSTANCE_COMPLETED,
                        EventMessage::InstanceCompleted {
                            component_name: component_name.clone(),
                            machine_name: machine_name.clone(),
                            instance_id: *instance_id,
                            final_state: final_state.clone(),
                            status: *status,
                            timestamp_ms: now,
                        },
                    )],
                    _ => Vec::new(),
                };

                for (event_channel, message) in outgoing {
                    let Ok(payload) = serde_json::to_value(&message) else {
                        continue;
                    };
                    if let Err(e) = broker.publish(event_channel, payload).await {
                        tracing::warn!(channel = event_channel, error = %e, "event publish failed");
                    }
                }
            }
        });
    }

    fn spawn_command_consumer(&self, mut rx: mpsc::UnboundedReceiver<BrokerMessage>) {
        let broker = Arc::clone(&self.broker);
        let runtime = self.runtime.clone();
        let runtime_id = self.runtime_id;
        let config = self.config.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Some(m) => m,
                        None => break,
                    },
                };
                handle_command(&broker, &runtime, runtime_id, &config, message).await;
            }
        });
    }
}

async fn handle_command<C: Clock>(
    broker: &Arc<dyn MessageBroker>,
    runtime: &Runtime<C>,
    runtime_id: RuntimeId,
    config: &BroadcasterConfig,
    message: BrokerMessage,
) {
    let component_name = runtime.component().name.clone();

    if message.channel == channel::REGISTRY_DISCOVER {
        re_announce(broker, runtime, runtime_id, config).await;
        return;
    }

    let command: CommandMessage = match decode(&message.payload) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(channel = %message.channel, error = %e, "malformed command dropped");
            return;
        }
    };

    match command {
        CommandMessage::TriggerEvent {
            component_name: target,
            instance_id,
            event_type,
            payload,
        } => {
            if target != component_name {
                return;
            }
            let event = MachineEvent::new(event_type, payload, runtime.now_ms());
            if let Err(e) = runtime.send_event_caused(instance_id, event, None).await {
                tracing::debug!(instance = %instance_id, error = %e, "trigger_event failed");
            }
        }
        CommandMessage::CreateInstance {
            component_name: target,
            machine_name,
            initial_fields,
            caused_by,
        } => {
            if target != component_name {
                return;
            }
            if let Err(e) = runtime
                .create_instance_caused(&machine_name, initial_fields, caused_by)
                .await
            {
                tracing::warn!(machine = %machine_name, error = %e, "create_instance failed");
            }
        }
        CommandMessage::CrossComponentEvent {
            target_component,
            target_machine,
            target_state,
            event_type,
            payload,
            matching_rules,
            caused_by,
            ..
        } => {
            if target_component != component_name {
                return;
            }
            // Never broadcast an unfiltered cross-component event to
            // every instance.
            if matching_rules.is_empty() {
                tracing::warn!(
                    machine = %target_machine,
                    event = %event_type,
                    "cross_component_event without matching rules rejected"
                );
                return;
            }
            let event = MachineEvent::new(event_type, payload, runtime.now_ms());
            if let Err(e) = runtime
                .deliver_filtered(&target_machine, &target_state, event, matching_rules, caused_by)
                .await
            {
                tracing::warn!(machine = %target_machine, error = %e, "cross-component delivery failed");
            }
        }
        CommandMessage::QueryInstances {
            component_name: target,
        } => {
            if let Some(target) = target {
                if target != component_name {
                    return;
                }
            }
            // Re-announce so late-starting subscribers discover this
            // runtime, then publish the instance list.
            re_announce(broker, runtime, runtime_id, config).await;
            let response = QueryResponse {
                runtime_id,
                component_name,
                instances: runtime.instances().await,
                timestamp_ms: runtime.now_ms(),
            };
            let Ok(payload) = serde_json::to_value(&response) else {
                return;
            };
            if let Err(e) = broker.publish(channel::RESPONSES_QUERY, payload).await {
                tracing::warn!(error = %e, "query response publish failed");
            }
        }
    }
}

async fn re_announce<C: Clock>(
    broker: &Arc<dyn MessageBroker>,
    runtime: &Runtime<C>,
    runtime_id: RuntimeId,
    config: &BroadcasterConfig,
) {
    let component = runtime.component();
    let message = RegistryMessage::Announce {
        runtime_id,
        component_name: component.name.clone(),
        component: (*component).clone(),
        host: config.host.clone(),
        port: config.port,
    };
    let Ok(payload) = serde_json::to_value(&message) else {
        return;
    };
    if let Err(e) = broker.publish(channel::REGISTRY_ANNOUNCE, payload).await {
        tracing::warn!(error = %e, "announce publish failed");
    }
}

#[cfg(test)]
#[path = "broadcaster_tests.rs"]
mod tests;
