// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abstract persistence interfaces.
//!
//! Implementations must be safe for concurrent append/read from multiple
//! runtimes. Two reference layouts for durable backends: a sorted set per
//! instance keyed by timestamp, or a table with `(instance_id,
//! persisted_at)` indexed columns and a JSON event payload.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sb_core::{EventId, InstanceId, PersistedEvent, Snapshot};

/// Append-only store of persisted transition events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event. Events are immutable once appended.
    async fn append(&self, event: PersistedEvent) -> Result<(), StoreError>;

    /// All events for one instance, in `persisted_at` order.
    async fn events_for_instance(
        &self,
        instance_id: InstanceId,
    ) -> Result<Vec<PersistedEvent>, StoreError>;

    /// Events with `from <= persisted_at < to`, in `persisted_at` order.
    async fn events_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PersistedEvent>, StoreError>;

    /// Events whose `caused_by` references the given event.
    async fn caused_events(&self, event_id: EventId) -> Result<Vec<PersistedEvent>, StoreError>;

    /// Every event in the store, in `persisted_at` order.
    async fn all_events(&self) -> Result<Vec<PersistedEvent>, StoreError>;

    /// Fetch a single event by id.
    async fn event(&self, event_id: EventId) -> Result<Option<PersistedEvent>, StoreError>;

    /// Best-effort forward causality link: record `child` in the parent's
    /// `caused` list. Stores without an update primitive keep the default
    /// no-op — causality stays reconstructable by scanning `caused_by`.
    /// Returns whether the link was recorded.
    async fn link_caused(&self, _parent: EventId, _child: EventId) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Store of per-instance snapshots. At most one snapshot per instance is
/// retained (the latest wins).
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError>;

    async fn snapshot(&self, instance_id: InstanceId) -> Result<Option<Snapshot>, StoreError>;

    async fn all_snapshots(&self) -> Result<Vec<Snapshot>, StoreError>;

    async fn delete_snapshot(&self, instance_id: InstanceId) -> Result<(), StoreError>;
}
