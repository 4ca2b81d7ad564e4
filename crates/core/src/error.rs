// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Component-document validation errors.

use thiserror::Error;

/// Errors found while validating a component tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("component '{component}' declares no state machines")]
    NoMachines { component: String },

    #[error("component '{component}' names unknown entry machine '{machine}'")]
    UnknownEntryMachine { component: String, machine: String },

    #[error("machine '{machine}' names unknown initial state '{state}'")]
    UnknownInitialState { machine: String, state: String },

    #[error("machine '{machine}' transition on '{event}' references undeclared state '{state}'")]
    UnknownTransitionState {
        machine: String,
        event: String,
        state: String,
    },

    #[error("machine '{machine}' timeout transition from '{from}' on '{event}' has no timeout_ms")]
    TimeoutWithoutDuration {
        machine: String,
        from: String,
        event: String,
    },

    #[error("machine '{machine}' inter-machine transition names unknown machine '{target}'")]
    UnknownTargetMachine { machine: String, target: String },

    #[error("machine '{machine}' inter-machine transition from '{from}' on '{event}' has no target machine")]
    InterMachineWithoutTarget {
        machine: String,
        from: String,
        event: String,
    },

    #[error("machine '{machine}' internal transition changes state ('{from}' -> '{to}')")]
    InternalChangesState {
        machine: String,
        from: String,
        to: String,
    },
}
