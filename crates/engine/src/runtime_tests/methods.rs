// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Triggered methods, senders, and hook ordering.

use super::*;
use parking_lot::Mutex as PlMutex;
use sb_core::PropertyFilter;

#[tokio::test]
async fn triggered_method_sees_event_and_view() {
    let seen: Arc<PlMutex<Vec<(String, serde_json::Value)>>> = Arc::new(PlMutex::new(Vec::new()));
    let record = seen.clone();
    let methods = MethodRegistry::new().register_fn("confirm", move |ctx| {
        record
            .lock()
            .push((ctx.event.event_type.clone(), ctx.view.clone()));
        Ok(())
    });

    let mut component = order_component();
    if let Some(machine) = component.state_machines.get_mut("Order") {
        machine.transitions[0].triggered_method = Some("confirm".to_string());
    }
    let mut ctx = setup_with(component, methods);

    let id = ctx.runtime.create_instance("Order", json!({"Id": 7})).await.unwrap();
    ctx.runtime
        .send_event(id, "CONFIRM", json!({"orderId": 7}))
        .await
        .unwrap();
    ctx.runtime.quiesce().await;

    let calls = seen.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "CONFIRM");
    assert_eq!(calls[0].1["Id"], json!(7));
    assert!(note_names(&drain(&mut ctx.notes)).contains(&"triggered_method"));
}

#[tokio::test]
async fn update_context_merges_before_commit() {
    let methods = MethodRegistry::new().register_fn("stamp", |ctx| {
        ctx.sender.update_context(json!({"confirmedBy": "ops"}));
        Ok(())
    });
    let mut component = order_component();
    if let Some(machine) = component.state_machines.get_mut("Order") {
        machine.transitions[0].triggered_method = Some("stamp".to_string());
    }
    let ctx = setup_with(component, methods);

    let id = ctx.runtime.create_instance("Order", json!({"Id": 1})).await.unwrap();
    ctx.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap();

    let instance = ctx.runtime.instance(id).await.unwrap();
    assert_eq!(instance.view()["confirmedBy"], json!("ops"));
    assert_eq!(instance.view()["Id"], json!(1));
}

#[tokio::test]
async fn send_to_self_is_deferred_and_causally_linked() {
    // confirm → (sender) SHIP → (sender) nothing; the SHIP delivery must
    // happen on a later turn and record the CONFIRM event as its cause.
    let methods = MethodRegistry::new().register_fn("chain", |ctx| {
        ctx.sender.send_to_self("SHIP", json!({}));
        Ok(())
    });
    let mut component = order_component();
    if let Some(machine) = component.state_machines.get_mut("Order") {
        machine.transitions[0].triggered_method = Some("chain".to_string());
    }
    let ctx = setup_with(component, methods);

    let id = ctx.runtime.create_instance("Order", json!({"Id": 1})).await.unwrap();
    ctx.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap();

    // Before quiescing, the state change from the deferred send may not
    // have landed; afterwards it must have.
    ctx.runtime.quiesce().await;
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Shipped");

    let history = ctx.runtime.instance_history(id).await.unwrap();
    let confirm = history.iter().find(|e| e.event.event_type == "CONFIRM").unwrap();
    let ship = history.iter().find(|e| e.event.event_type == "SHIP").unwrap();
    assert_eq!(ship.caused_by, vec![confirm.id]);
    assert!(confirm.caused.contains(&ship.id));
}

#[tokio::test]
async fn sender_creates_instances_and_broadcasts_with_filters() {
    let methods = MethodRegistry::new().register_fn("fanout", |ctx| {
        ctx.sender.create_instance("Order", json!({"Id": 100}));
        ctx.sender.broadcast(
            "Order",
            "Pending",
            "CONFIRM",
            json!({"orderId": 2}),
            vec![PropertyFilter::eq("Id", json!(2))],
        );
        Ok(())
    });
    let mut component = order_component();
    if let Some(machine) = component.state_machines.get_mut("Order") {
        machine.transitions[0].triggered_method = Some("fanout".to_string());
    }
    let ctx = setup_with(component, methods);

    let trigger = ctx.runtime.create_instance("Order", json!({"Id": 1})).await.unwrap();
    let target = ctx.runtime.create_instance("Order", json!({"Id": 2})).await.unwrap();
    let bystander = ctx.runtime.create_instance("Order", json!({"Id": 3})).await.unwrap();

    ctx.runtime.send_event(trigger, "CONFIRM", json!({"orderId": 1})).await.unwrap();
    ctx.runtime.quiesce().await;

    assert_eq!(ctx.runtime.instances_by_machine("Order").await.len(), 4);
    assert_eq!(ctx.runtime.instance(target).await.unwrap().current_state, "Confirmed");
    assert_eq!(ctx.runtime.instance(bystander).await.unwrap().current_state, "Pending");
}

#[tokio::test]
async fn failing_triggered_method_moves_instance_to_error() {
    let methods = MethodRegistry::new()
        .register_fn("explode", |_ctx| Err("payment backend unreachable".into()));
    let mut component = order_component();
    if let Some(machine) = component.state_machines.get_mut("Order") {
        machine.transitions[0].triggered_method = Some("explode".to_string());
    }
    let mut ctx = setup_with(component, methods);

    let id = ctx.runtime.create_instance("Order", json!({"Id": 1})).await.unwrap();
    drain(&mut ctx.notes);

    let outcome = ctx.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap();
    assert_eq!(outcome, SendOutcome::Errored);

    // Dropped: no further events are delivered to it.
    assert!(ctx.runtime.instance(id).await.is_none());
    let names = note_names(&drain(&mut ctx.notes));
    assert!(names.contains(&"instance_error"));
    assert!(!names.contains(&"state_change"));
    let err = ctx.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownInstance(_)));
}

#[tokio::test]
async fn entry_and_exit_hooks_run_around_the_transition() {
    let order: Arc<PlMutex<Vec<&'static str>>> = Arc::new(PlMutex::new(Vec::new()));
    let (exit_log, entry_log, method_log) = (order.clone(), order.clone(), order.clone());
    let methods = MethodRegistry::new()
        .register_fn("on_exit", move |_| {
            exit_log.lock().push("exit");
            Ok(())
        })
        .register_fn("on_entry", move |_| {
            entry_log.lock().push("entry");
            Ok(())
        })
        .register_fn("on_confirm", move |_| {
            method_log.lock().push("triggered");
            Ok(())
        });

    let mut component = order_component();
    if let Some(machine) = component.state_machines.get_mut("Order") {
        if let Some(state) = machine.states.get_mut("Pending") {
            state.exit_method = Some("on_exit".to_string());
        }
        if let Some(state) = machine.states.get_mut("Confirmed") {
            state.entry_method = Some("on_entry".to_string());
        }
        machine.transitions[0].triggered_method = Some("on_confirm".to_string());
    }
    let mut ctx = setup_with(component, methods);

    let id = ctx.runtime.create_instance("Order", json!({})).await.unwrap();
    ctx.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap();
    ctx.runtime.quiesce().await;

    assert_eq!(*order.lock(), vec!["exit", "triggered", "entry"]);
    let names = note_names(&drain(&mut ctx.notes));
    assert!(names.contains(&"exit_method"));
    assert!(names.contains(&"entry_method"));
}

#[tokio::test]
async fn missing_handler_is_skipped() {
    let mut component = order_component();
    if let Some(machine) = component.state_machines.get_mut("Order") {
        machine.transitions[0].triggered_method = Some("unregistered".to_string());
    }
    let ctx = setup(component);

    let id = ctx.runtime.create_instance("Order", json!({})).await.unwrap();
    let outcome = ctx.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap();
    assert!(outcome.transitioned());
}

#[tokio::test(start_paused = true)]
async fn internal_transition_keeps_state_and_deadlines() {
    let methods = MethodRegistry::new().register_fn("note", |ctx| {
        ctx.sender.update_context(json!({"noted": true}));
        Ok(())
    });
    let mut internal = TransitionBuilder::new("Running", "Running", "NOTE")
        .triggered_method("note")
        .build();
    internal.kind = sb_core::TransitionKind::Internal;

    let machine = MachineBuilder::new("Job", "Running")
        .state(StateBuilder::new("Running", StateKind::Entry).build())
        .state(StateBuilder::new("Stalled", StateKind::Regular).build())
        .transition(
            TransitionBuilder::new("Running", "Stalled", "STALL_TIMEOUT")
                .timeout_ms(100)
                .build(),
        )
        .transition(internal)
        .build();
    let component = Component::builder("jobs").machine(machine).build().unwrap();
    let ctx = setup_with(component, methods);

    let id = ctx.runtime.create_instance("Job", json!({})).await.unwrap();
    advance(50).await;

    // The internal transition neither leaves the state nor resets the
    // pending timeout deadline.
    ctx.runtime.send_event(id, "NOTE", json!({})).await.unwrap();
    let instance = ctx.runtime.instance(id).await.unwrap();
    assert_eq!(instance.current_state, "Running");
    assert_eq!(instance.view()["noted"], json!(true));
    assert_eq!(ctx.runtime.wheel_task_count(), 1);

    advance(80).await;
    ctx.runtime.quiesce().await;
    assert_eq!(ctx.runtime.instance(id).await.unwrap().current_state, "Stalled");

    // The internal hop is persisted with from == to.
    let history = ctx.runtime.instance_history(id).await.unwrap();
    let note = history.iter().find(|e| e.event.event_type == "NOTE").unwrap();
    assert_eq!(note.state_before, note.state_after);
}

#[tokio::test]
async fn inter_machine_transition_spawns_target_with_copied_context() {
    let mut spawn = TransitionBuilder::new("Pending", "Confirmed", "CONFIRM").build();
    spawn.kind = sb_core::TransitionKind::InterMachine;
    spawn.target_machine = Some("Invoice".to_string());

    let order = MachineBuilder::new("Order", "Pending")
        .state(StateBuilder::new("Pending", StateKind::Entry).build())
        .state(StateBuilder::new("Confirmed", StateKind::Regular).build())
        .transition(spawn)
        .build();
    let invoice = MachineBuilder::new("Invoice", "Draft")
        .state(StateBuilder::new("Draft", StateKind::Entry).build())
        .state(StateBuilder::new("Sent", StateKind::Regular).build())
        .transition(TransitionBuilder::new("Draft", "Sent", "SEND").build())
        .build();
    let component = Component::builder("billing")
        .machine(order)
        .machine(invoice)
        .build()
        .unwrap();
    let mut ctx = setup(component);

    let id = ctx
        .runtime
        .create_instance("Order", json!({"Id": 4, "total": 99}))
        .await
        .unwrap();
    ctx.runtime.send_event(id, "CONFIRM", json!({})).await.unwrap();
    ctx.runtime.quiesce().await;

    let invoices = ctx.runtime.instances_by_machine("Invoice").await;
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].current_state, "Draft");
    assert_eq!(invoices[0].view()["Id"], json!(4));
    assert_eq!(invoices[0].view()["total"], json!(99));

    let names = note_names(&drain(&mut ctx.notes));
    assert!(names.contains(&"inter_machine_transition"));

    // The spawned instance's creation is caused by the order's event.
    let order_history = ctx.runtime.instance_history(id).await.unwrap();
    let confirm = order_history.iter().find(|e| e.event.event_type == "CONFIRM").unwrap();
    let invoice_history = ctx.runtime.instance_history(invoices[0].id).await.unwrap();
    assert_eq!(invoice_history[0].caused_by, vec![confirm.id]);
}
