// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Component documents: named bundles of state machines defined as data.
//!
//! A component is immutable after load. Machines, states, and transitions
//! keep their document order (`IndexMap` / `Vec`) because source order is
//! semantic: the transition tie-break picks the first declared candidate.
//!
//! Parsing a textual document into this tree is someone else's problem;
//! hosts either deserialize a tree or assemble one with the builders.

use crate::error::DefinitionError;
use crate::expr::Expression;
use crate::guard::Guard;
use crate::rules::{CascadingRule, MatchingRule};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How the component's entry machine is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMachineMode {
    /// One long-lived entry instance, auto-created, never disposed.
    #[default]
    Singleton,
    /// Entry instances are created on demand and dispose normally.
    Multiple,
}

/// State classification. `Final` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Entry,
    Regular,
    Final,
    Error,
}

impl StateKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StateKind::Final | StateKind::Error)
    }
}

crate::simple_display! {
    StateKind {
        Entry => "entry",
        Regular => "regular",
        Final => "final",
        Error => "error",
    }
}

/// Transition classification — a closed enumeration, dispatched flatly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    #[default]
    Regular,
    /// Fires on its own after an optional delay when the source state is
    /// entered, provided guards pass.
    Auto,
    /// Fires when `timeout_ms` elapses without the instance leaving the
    /// source state.
    Timeout,
    /// On execution, additionally spawns an instance of `target_machine`
    /// with a shallow copy of the source context.
    InterMachine,
    /// Keeps `from == to`; runs the triggered method and persists, but
    /// skips exit/entry methods and timer churn.
    Internal,
    /// Selected like `Regular`; documents that the event is expected
    /// from a Sender rather than an external caller.
    Triggerable,
}

crate::simple_display! {
    TransitionKind {
        Regular => "regular",
        Auto => "auto",
        Timeout => "timeout",
        InterMachine => "inter_machine",
        Internal => "internal",
        Triggerable => "triggerable",
    }
}

/// A declared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_method: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cascading_rules: Vec<CascadingRule>,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

/// A declared transition edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub event: String,
    #[serde(rename = "type", default)]
    pub kind: TransitionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_method: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guards: Vec<Guard>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matching_rules: Vec<MatchingRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_triggering_rule: Option<Expression>,
}

/// A named state machine with its initial state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachine {
    pub name: String,
    pub initial_state: String,
    /// When set, instances separate a business-visible public member
    /// from an internal context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_member_type: Option<String>,
    pub states: IndexMap<String, State>,
    pub transitions: Vec<Transition>,
}

impl StateMachine {
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// Transitions leaving `state`, in source order.
    pub fn transitions_from<'a>(
        &'a self,
        state: &'a str,
    ) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.from == state)
    }

    /// Candidate transitions for `(state, event type)`, in source order.
    pub fn candidates<'a>(
        &'a self,
        state: &'a str,
        event_type: &'a str,
    ) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions_from(state)
            .filter(move |t| t.event == event_type)
    }

    /// Timeout and auto transitions leaving `state`.
    pub fn scheduled_from<'a>(
        &'a self,
        state: &'a str,
    ) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions_from(state)
            .filter(|t| matches!(t.kind, TransitionKind::Timeout | TransitionKind::Auto))
    }
}

/// An immutable component document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_machine: Option<String>,
    #[serde(default)]
    pub entry_machine_mode: EntryMachineMode,
    #[serde(default = "default_auto_create")]
    pub auto_create_entry_point: bool,
    pub state_machines: IndexMap<String, StateMachine>,
}

fn default_auto_create() -> bool {
    true
}

impl Component {
    pub fn machine(&self, name: &str) -> Option<&StateMachine> {
        self.state_machines.get(name)
    }

    /// Validate internal consistency of the document.
    ///
    /// Checks that every machine's initial state is declared, every
    /// transition endpoint is declared, timeout transitions carry a
    /// duration, inter-machine transitions name an existing machine,
    /// and the entry machine (if any) exists.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.state_machines.is_empty() {
            return Err(DefinitionError::NoMachines {
                component: self.name.clone(),
            });
        }
        if let Some(entry) = &self.entry_machine {
            if !self.state_machines.contains_key(entry) {
                return Err(DefinitionError::UnknownEntryMachine {
                    component: self.name.clone(),
                    machine: entry.clone(),
                });
            }
        }
        for machine in self.state_machines.values() {
            if !machine.states.contains_key(&machine.initial_state) {
                return Err(DefinitionError::UnknownInitialState {
                    machine: machine.name.clone(),
                    state: machine.initial_state.clone(),
                });
            }
            for transition in &machine.transitions {
                for endpoint in [&transition.from, &transition.to] {
                    if !machine.states.contains_key(endpoint) {
                        return Err(DefinitionError::UnknownTransitionState {
                            machine: machine.name.clone(),
                            event: transition.event.clone(),
                            state: endpoint.clone(),
                        });
                    }
                }
                if transition.kind == TransitionKind::Timeout && transition.timeout_ms.is_none() {
                    return Err(DefinitionError::TimeoutWithoutDuration {
                        machine: machine.name.clone(),
                        from: transition.from.clone(),
                        event: transition.event.clone(),
                    });
                }
                if transition.kind == TransitionKind::InterMachine {
                    match &transition.target_machine {
                        Some(target) if self.state_machines.contains_key(target) => {}
                        Some(target) => {
                            return Err(DefinitionError::UnknownTargetMachine {
                                machine: machine.name.clone(),
                                target: target.clone(),
                            })
                        }
                        None => {
                            return Err(DefinitionError::InterMachineWithoutTarget {
                                machine: machine.name.clone(),
                                from: transition.from.clone(),
                                event: transition.event.clone(),
                            })
                        }
                    }
                }
                if transition.kind == TransitionKind::Internal && transition.from != transition.to
                {
                    return Err(DefinitionError::InternalChangesState {
                        machine: machine.name.clone(),
                        from: transition.from.clone(),
                        to: transition.to.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn builder(name: impl Into<String>) -> ComponentBuilder {
        ComponentBuilder::new(name)
    }
}

/// Fluent builder for assembling a component tree in code.
pub struct ComponentBuilder {
    component: Component,
}

impl ComponentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            component: Component {
                name: name.into(),
                version: "1.0".to_string(),
                entry_machine: None,
                entry_machine_mode: EntryMachineMode::Singleton,
                auto_create_entry_point: true,
                state_machines: IndexMap::new(),
            },
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.component.version = version.into();
        self
    }

    pub fn entry_machine(mut self, machine: impl Into<String>, mode: EntryMachineMode) -> Self {
        self.component.entry_machine = Some(machine.into());
        self.component.entry_machine_mode = mode;
        self
    }

    pub fn auto_create_entry_point(mut self, auto: bool) -> Self {
        self.component.auto_create_entry_point = auto;
        self
    }

    pub fn machine(mut self, machine: StateMachine) -> Self {
        self.component
            .state_machines
            .insert(machine.name.clone(), machine);
        self
    }

    /// Finish and validate the document.
    pub fn build(self) -> Result<Component, DefinitionError> {
        self.component.validate()?;
        Ok(self.component)
    }
}

/// Fluent builder for a state machine.
pub struct MachineBuilder {
    machine: StateMachine,
}

impl MachineBuilder {
    pub fn new(name: impl Into<String>, initial_state: impl Into<String>) -> Self {
        Self {
            machine: StateMachine {
                name: name.into(),
                initial_state: initial_state.into(),
                public_member_type: None,
                states: IndexMap::new(),
                transitions: Vec::new(),
            },
        }
    }

    pub fn public_member_type(mut self, ty: impl Into<String>) -> Self {
        self.machine.public_member_type = Some(ty.into());
        self
    }

    pub fn state(mut self, state: State) -> Self {
        self.machine.states.insert(state.name.clone(), state);
        self
    }

    pub fn transition(mut self, transition: Transition) -> Self {
        self.machine.transitions.push(transition);
        self
    }

    pub fn build(self) -> StateMachine {
        self.machine
    }
}

/// Fluent builder for a state.
pub struct StateBuilder {
    state: State,
}

impl StateBuilder {
    pub fn new(name: impl Into<String>, kind: StateKind) -> Self {
        Self {
            state: State {
                name: name.into(),
                kind,
                entry_method: None,
                exit_method: None,
                cascading_rules: Vec::new(),
            },
        }
    }

    pub fn entry_method(mut self, method: impl Into<String>) -> Self {
        self.state.entry_method = Some(method.into());
        self
    }

    pub fn exit_method(mut self, method: impl Into<String>) -> Self {
        self.state.exit_method = Some(method.into());
        self
    }

    pub fn cascade(mut self, rule: CascadingRule) -> Self {
        self.state.cascading_rules.push(rule);
        self
    }

    pub fn build(self) -> State {
        self.state
    }
}

/// Fluent builder for a transition.
pub struct TransitionBuilder {
    transition: Transition,
}

impl TransitionBuilder {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            transition: Transition {
                from: from.into(),
                to: to.into(),
                event: event.into(),
                kind: TransitionKind::Regular,
                timeout_ms: None,
                target_machine: None,
                triggered_method: None,
                guards: Vec::new(),
                matching_rules: Vec::new(),
                specific_triggering_rule: None,
            },
        }
    }

    pub fn kind(mut self, kind: TransitionKind) -> Self {
        self.transition.kind = kind;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.transition.kind = TransitionKind::Timeout;
        self.transition.timeout_ms = Some(ms);
        self
    }

    pub fn auto(mut self, delay_ms: u64) -> Self {
        self.transition.kind = TransitionKind::Auto;
        self.transition.timeout_ms = Some(delay_ms);
        self
    }

    pub fn target_machine(mut self, machine: impl Into<String>) -> Self {
        self.transition.kind = TransitionKind::InterMachine;
        self.transition.target_machine = Some(machine.into());
        self
    }

    pub fn triggered_method(mut self, method: impl Into<String>) -> Self {
        self.transition.triggered_method = Some(method.into());
        self
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.transition.guards.push(guard);
        self
    }

    pub fn matching(mut self, rule: MatchingRule) -> Self {
        self.transition.matching_rules.push(rule);
        self
    }

    pub fn triggering_rule(mut self, rule: Expression) -> Self {
        self.transition.specific_triggering_rule = Some(rule);
        self
    }

    pub fn build(self) -> Transition {
        self.transition
    }
}

#[cfg(test)]
#[path = "component_tests.rs"]
mod tests;
