// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level errors.
//!
//! These are the failures surfaced to the initiating API caller; the
//! engine never mutates state before returning one. Guard denials and
//! triggered-method failures are not errors to the caller — they emit
//! `guard_failed` / `instance_error` notifications instead.

use sb_core::{DefinitionError, InstanceId, InstanceStatus};
use sb_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown machine: {0}")]
    UnknownMachine(String),

    #[error("unknown instance: {0}")]
    UnknownInstance(InstanceId),

    #[error("instance {id} is not active (status: {status})")]
    InstanceInactive {
        id: InstanceId,
        status: InstanceStatus,
    },

    #[error("no transition with matching rules from {machine}.{state} on '{event}'")]
    NoMatchingTransition {
        machine: String,
        state: String,
        event: String,
    },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}
