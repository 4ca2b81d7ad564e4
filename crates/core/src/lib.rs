// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-core: data model and evaluation primitives for the Switchboard
//! FSM runtime.
//!
//! Components, state machines, transitions, guards, matching and cascading
//! rules are plain data consumed as in-memory trees. This crate also holds
//! the restricted expression grammar, dotted property paths, payload
//! templates, machine events, persisted events and snapshots, the
//! observable notification vocabulary, and the clock abstraction the rest
//! of the workspace builds on.

pub mod macros;

pub mod clock;
pub mod component;
pub mod error;
pub mod event;
pub mod expr;
pub mod guard;
pub mod id;
pub mod instance;
pub mod notification;
pub mod path;
pub mod rules;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use component::{
    Component, ComponentBuilder, EntryMachineMode, MachineBuilder, State, StateBuilder, StateKind,
    StateMachine, Transition, TransitionBuilder, TransitionKind,
};
pub use error::DefinitionError;
pub use event::{MachineEvent, PersistedEvent, Snapshot};
pub use expr::{CompareOp, EvalScope, ExprError, Expression};
pub use guard::Guard;
pub use id::{EventId, InstanceId, RuntimeId};
pub use instance::{Instance, InstanceData, InstanceStatus};
pub use notification::Notification;
pub use rules::{CascadingRule, MatchingRule, PropertyFilter};
