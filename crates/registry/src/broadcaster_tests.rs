// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{inventory_component, observe, runtime_with, wait_until};
use sb_broker::MemoryBroker;
use sb_core::{
    EntryMachineMode, FakeClock, MachineBuilder, PropertyFilter, StateBuilder, StateKind,
    TransitionBuilder,
};
use sb_wire::channel as ch;
use serde_json::json;

fn entry_component() -> sb_core::Component {
    let machine = MachineBuilder::new("Coordinator", "Idle")
        .state(StateBuilder::new("Idle", StateKind::Entry).build())
        .state(StateBuilder::new("Done", StateKind::Final).build())
        .transition(TransitionBuilder::new("Idle", "Done", "FINISH").build())
        .build();
    match sb_core::Component::builder("coordination")
        .entry_machine("Coordinator", EntryMachineMode::Singleton)
        .machine(machine)
        .build()
    {
        Ok(c) => c,
        Err(e) => panic!("fixture invalid: {e}"),
    }
}

struct Bridge {
    broadcaster: RuntimeBroadcaster<FakeClock>,
    runtime: Runtime<FakeClock>,
    broker: Arc<MemoryBroker>,
}

async fn bridge(component: sb_core::Component, config: BroadcasterConfig) -> Bridge {
    let broker = Arc::new(MemoryBroker::new());
    broker.connect().await.unwrap();
    let runtime = runtime_with(component, FakeClock::new());
    let broadcaster = RuntimeBroadcaster::new(runtime.clone(), broker.clone(), config);
    Bridge {
        broadcaster,
        runtime,
        broker,
    }
}

#[tokio::test]
async fn connect_announces_and_auto_creates_the_entry_instance() {
    let bridge = bridge(entry_component(), BroadcasterConfig::default()).await;
    let mut announces = observe(bridge.broker.as_ref(), ch::REGISTRY_ANNOUNCE).await;

    bridge.broadcaster.connect().await.unwrap();

    let message = announces.recv().await.unwrap();
    let decoded: RegistryMessage = decode(&message.payload).unwrap();
    match decoded {
        RegistryMessage::Announce {
            runtime_id,
            component_name,
            component,
            ..
        } => {
            assert_eq!(runtime_id, bridge.broadcaster.runtime_id());
            assert_eq!(component_name, "coordination");
            assert!(component.state_machines.contains_key("Coordinator"));
        }
        other => panic!("expected announce, got {other:?}"),
    }

    // Singleton entry point auto-created.
    let instances = bridge.runtime.instances_by_machine("Coordinator").await;
    assert_eq!(instances.len(), 1);
    assert!(instances[0].is_entry_point);
}

#[tokio::test]
async fn auto_create_can_be_overridden_off() {
    let bridge = bridge(
        entry_component(),
        BroadcasterConfig {
            auto_create_entry_point: Some(false),
            ..BroadcasterConfig::default()
        },
    )
    .await;
    bridge.broadcaster.connect().await.unwrap();
    assert!(bridge.runtime.instances().await.is_empty());
}

#[tokio::test]
async fn trigger_event_command_drives_the_runtime() {
    let bridge = bridge(inventory_component(), BroadcasterConfig::default()).await;
    bridge.broadcaster.connect().await.unwrap();
    let stock = bridge
        .runtime
        .create_instance("Stock", json!({"Id": "P1"}))
        .await
        .unwrap();

    let command = serde_json::to_value(CommandMessage::TriggerEvent {
        component_name: "inventory".into(),
        instance_id: stock,
        event_type: "RESERVE".into(),
        payload: json!({"productId": "P1"}),
    })
    .unwrap();
    bridge
        .broker
        .publish(ch::COMMANDS_TRIGGER_EVENT, command)
        .await
        .unwrap();

    let runtime = bridge.runtime.clone();
    wait_until("triggered reservation", || {
        let runtime = runtime.clone();
        async move {
            runtime
                .instance(stock)
                .await
                .map(|i| i.current_state == "Reserved")
                .unwrap_or(false)
        }
    })
    .await;
}

#[tokio::test]
async fn commands_for_other_components_are_ignored() {
    let bridge = bridge(inventory_component(), BroadcasterConfig::default()).await;
    bridge.broadcaster.connect().await.unwrap();
    let stock = bridge
        .runtime
        .create_instance("Stock", json!({"Id": "P1"}))
        .await
        .unwrap();

    let command = serde_json::to_value(CommandMessage::TriggerEvent {
        component_name: "someone_else".into(),
        instance_id: stock,
        event_type: "RESERVE".into(),
        payload: json!({}),
    })
    .unwrap();
    bridge
        .broker
        .publish(ch::COMMANDS_TRIGGER_EVENT, command)
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(
        bridge.runtime.instance(stock).await.unwrap().current_state,
        "Available"
    );
}

#[tokio::test]
async fn cross_component_event_without_rules_is_rejected() {
    let bridge = bridge(inventory_component(), BroadcasterConfig::default()).await;
    bridge.broadcaster.connect().await.unwrap();
    let stock = bridge
        .runtime
        .create_instance("Stock", json!({"Id": "P1"}))
        .await
        .unwrap();

    let unfiltered = serde_json::to_value(CommandMessage::CrossComponentEvent {
        source_component: "orders".into(),
        target_component: "inventory".into(),
        target_machine: "Stock".into(),
        target_state: "Available".into(),
        event_type: "RESERVE".into(),
        payload: json!({"productId": "P1"}),
        matching_rules: Vec::new(),
        caused_by: None,
    })
    .unwrap();
    bridge
        .broker
        .publish(ch::COMMANDS_CROSS_COMPONENT_EVENT, unfiltered)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(
        bridge.runtime.instance(stock).await.unwrap().current_state,
        "Available"
    );

    // With resolved rules the same command is applied.
    let filtered = serde_json::to_value(CommandMessage::CrossComponentEvent {
        source_component: "orders".into(),
        target_component: "inventory".into(),
        target_machine: "Stock".into(),
        target_state: "Available".into(),
        event_type: "RESERVE".into(),
        payload: json!({"productId": "P1"}),
        matching_rules: vec![PropertyFilter::eq("Id", json!("P1"))],
        caused_by: None,
    })
    .unwrap();
    bridge
        .broker
        .publish(ch::COMMANDS_CROSS_COMPONENT_EVENT, filtered)
        .await
        .unwrap();

    let runtime = bridge.runtime.clone();
    wait_until("filtered reservation", || {
        let runtime = runtime.clone();
        async move {
            runtime
                .instance(stock)
                .await
                .map(|i| i.current_state == "Reserved")
                .unwrap_or(false)
        }
    })
    .await;
}

#[tokio::test]
async fn query_instances_reannounces_and_publishes_the_list() {
    let bridge = bridge(inventory_component(), BroadcasterConfig::default()).await;
    bridge.broadcaster.connect().await.unwrap();
    bridge
        .runtime
        .create_instance("Stock", json!({"Id": "P1"}))
        .await
        .unwrap();

    let mut announces = observe(bridge.broker.as_ref(), ch::REGISTRY_ANNOUNCE).await;
    let mut responses = observe(bridge.broker.as_ref(), ch::RESPONSES_QUERY).await;

    let query = serde_json::to_value(CommandMessage::QueryInstances {
        component_name: None,
    })
    .unwrap();
    bridge
        .broker
        .publish(ch::COMMANDS_QUERY_INSTANCES, query)
        .await
        .unwrap();

    // Late subscribers get a fresh announce, then the instance list.
    let announce = announces.recv().await.unwrap();
    assert!(decode::<RegistryMessage>(&announce.payload).is_ok());

    let response = responses.recv().await.unwrap();
    let decoded: QueryResponse = decode(&response.payload).unwrap();
    assert_eq!(decoded.component_name, "inventory");
    assert_eq!(decoded.instances.len(), 1);
    assert_eq!(decoded.runtime_id, bridge.broadcaster.runtime_id());
}

#[tokio::test]
async fn state_changes_are_bridged_to_event_channels() {
    let bridge = bridge(inventory_component(), BroadcasterConfig::default()).await;
    bridge.broadcaster.connect().await.unwrap();

    let mut created = observe(bridge.broker.as_ref(), ch::EVENTS_INSTANCE_CREATED).await;
    let mut changes = observe(bridge.broker.as_ref(), ch::EVENTS_STATE_CHANGE).await;

    let stock = bridge
        .runtime
        .create_instance("Stock", json!({"Id": "P1"}))
        .await
        .unwrap();
    bridge
        .runtime
        .send_event(stock, "RESERVE", json!({"productId": "P1"}))
        .await
        .unwrap();

    let message = created.recv().await.unwrap();
    match decode::<EventMessage>(&message.payload).unwrap() {
        EventMessage::InstanceCreated {
            instance_id, state, ..
        } => {
            assert_eq!(instance_id, stock);
            assert_eq!(state, "Available");
        }
        other => panic!("expected instance_created, got {other:?}"),
    }

    let message = changes.recv().await.unwrap();
    match decode::<EventMessage>(&message.payload).unwrap() {
        EventMessage::StateChange { from, to, .. } => {
            assert_eq!(from, "Available");
            assert_eq!(to, "Reserved");
        }
        other => panic!("expected state_change, got {other:?}"),
    }
}

#[tokio::test]
async fn heartbeat_is_published_on_the_configured_interval() {
    let bridge = bridge(
        inventory_component(),
        BroadcasterConfig {
            heartbeat_interval: std::time::Duration::from_millis(20),
            ..BroadcasterConfig::default()
        },
    )
    .await;
    let mut heartbeats = observe(bridge.broker.as_ref(), ch::REGISTRY_HEARTBEAT).await;
    bridge.broadcaster.connect().await.unwrap();

    let message = heartbeats.recv().await.unwrap();
    match decode::<RegistryMessage>(&message.payload).unwrap() {
        RegistryMessage::Heartbeat { component_name, .. } => {
            assert_eq!(component_name, "inventory");
        }
        other => panic!("expected heartbeat, got {other:?}"),
    }
}

#[tokio::test]
async fn discover_triggers_a_reannounce() {
    let bridge = bridge(inventory_component(), BroadcasterConfig::default()).await;
    bridge.broadcaster.connect().await.unwrap();
    let mut announces = observe(bridge.broker.as_ref(), ch::REGISTRY_ANNOUNCE).await;

    let discover = serde_json::to_value(RegistryMessage::Discover).unwrap();
    bridge
        .broker
        .publish(ch::REGISTRY_DISCOVER, discover)
        .await
        .unwrap();

    let message = announces.recv().await.unwrap();
    assert!(matches!(
        decode::<RegistryMessage>(&message.payload).unwrap(),
        RegistryMessage::Announce { .. }
    ));
}

#[tokio::test]
async fn shutdown_publishes_and_disconnects() {
    let bridge = bridge(inventory_component(), BroadcasterConfig::default()).await;
    bridge.broadcaster.connect().await.unwrap();
    let mut shutdowns = observe(bridge.broker.as_ref(), ch::REGISTRY_SHUTDOWN).await;

    bridge.broadcaster.shutdown().await.unwrap();

    let message = shutdowns.recv().await.unwrap();
    assert!(matches!(
        decode::<RegistryMessage>(&message.payload).unwrap(),
        RegistryMessage::Shutdown { .. }
    ));
    assert!(!bridge.broker.is_connected());
}
