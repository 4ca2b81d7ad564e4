// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reference implementations of the persistence interfaces.

use crate::error::StoreError;
use crate::store::{EventStore, SnapshotStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sb_core::{EventId, InstanceId, PersistedEvent, Snapshot};
use std::collections::HashMap;

#[derive(Default)]
struct EventLog {
    events: Vec<PersistedEvent>,
    by_id: HashMap<EventId, usize>,
    by_instance: HashMap<InstanceId, Vec<usize>>,
}

/// In-memory append-only event store.
///
/// Per-instance order is append order; the persistence manager stamps
/// strictly monotonic `persisted_at` per instance, so append order and
/// timestamp order agree.
#[derive(Default)]
pub struct MemoryEventStore {
    log: RwLock<EventLog>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.log.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.read().events.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, event: PersistedEvent) -> Result<(), StoreError> {
        let mut log = self.log.write();
        let idx = log.events.len();
        log.by_id.insert(event.id, idx);
        log.by_instance.entry(event.instance_id).or_default().push(idx);
        log.events.push(event);
        Ok(())
    }

    async fn events_for_instance(
        &self,
        instance_id: InstanceId,
    ) -> Result<Vec<PersistedEvent>, StoreError> {
        let log = self.log.read();
        Ok(log
            .by_instance
            .get(&instance_id)
            .map(|indexes| {
                indexes
                    .iter()
                    .filter_map(|&i| log.events.get(i).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn events_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PersistedEvent>, StoreError> {
        let log = self.log.read();
        let mut events: Vec<PersistedEvent> = log
            .events
            .iter()
            .filter(|e| e.persisted_at >= from && e.persisted_at < to)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.persisted_at);
        Ok(events)
    }

    async fn caused_events(&self, event_id: EventId) -> Result<Vec<PersistedEvent>, StoreError> {
        let log = self.log.read();
        Ok(log
            .events
            .iter()
            .filter(|e| e.caused_by.contains(&event_id))
            .cloned()
            .collect())
    }

    async fn all_events(&self) -> Result<Vec<PersistedEvent>, StoreError> {
        let log = self.log.read();
        let mut events = log.events.clone();
        events.sort_by_key(|e| e.persisted_at);
        Ok(events)
    }

    async fn event(&self, event_id: EventId) -> Result<Option<PersistedEvent>, StoreError> {
        let log = self.log.read();
        Ok(log.by_id.get(&event_id).and_then(|&i| log.events.get(i).cloned()))
    }

    async fn link_caused(&self, parent: EventId, child: EventId) -> Result<bool, StoreError> {
        let mut log = self.log.write();
        let Some(&idx) = log.by_id.get(&parent) else {
            return Ok(false);
        };
        if let Some(event) = log.events.get_mut(idx) {
            if !event.caused.contains(&child) {
                event.caused.push(child);
            }
            return Ok(true);
        }
        Ok(false)
    }
}

/// In-memory snapshot store keeping the latest snapshot per instance.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<InstanceId, Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        self.snapshots.write().insert(snapshot.instance.id, snapshot);
        Ok(())
    }

    async fn snapshot(&self, instance_id: InstanceId) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.snapshots.read().get(&instance_id).cloned())
    }

    async fn all_snapshots(&self) -> Result<Vec<Snapshot>, StoreError> {
        let mut all: Vec<Snapshot> = self.snapshots.read().values().cloned().collect();
        all.sort_by_key(|s| s.snapshot_at);
        Ok(all)
    }

    async fn delete_snapshot(&self, instance_id: InstanceId) -> Result<(), StoreError> {
        self.snapshots.write().remove(&instance_id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
