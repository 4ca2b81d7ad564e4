// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-store: event-sourced persistence for the Switchboard runtime.
//!
//! Every transition is recorded as an immutable [`sb_core::PersistedEvent`]
//! appended to an [`EventStore`]; periodic [`sb_core::Snapshot`]s enable
//! fast restore. The stores are abstract interfaces — the in-memory
//! implementations here are the reference; durable backends plug in
//! behind the same traits. [`PersistenceManager`] owns the write path:
//! id minting, strictly monotonic per-instance timestamps, causality
//! links, snapshot intervals, and causality tracing.

mod error;
mod manager;
mod memory;
mod store;

pub use error::StoreError;
pub use manager::{PersistRequest, PersistenceConfig, PersistenceManager};
pub use memory::{MemoryEventStore, MemorySnapshotStore};
pub use store::{EventStore, SnapshotStore};
