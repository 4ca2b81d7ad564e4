// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence write path: id minting, causality, snapshot intervals.

use crate::error::StoreError;
use crate::store::{EventStore, SnapshotStore};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use sb_core::{EventId, Instance, InstanceId, MachineEvent, PersistedEvent, Snapshot};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Persistence tuning knobs.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// A snapshot is written every `snapshot_interval` transitions per
    /// instance.
    pub snapshot_interval: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 10,
        }
    }
}

/// Everything the engine knows about one transition at persist time.
#[derive(Debug, Clone)]
pub struct PersistRequest {
    pub instance_id: InstanceId,
    pub machine_name: String,
    pub component_name: String,
    pub event: MachineEvent,
    pub state_before: String,
    pub state_after: String,
    /// The event that caused this one (set for cascades, sender ops,
    /// and cross-component deliveries).
    pub caused_by: Option<EventId>,
    pub source_component: Option<String>,
    pub target_component: Option<String>,
}

#[derive(Default)]
struct ManagerState {
    transition_counts: HashMap<InstanceId, u64>,
    last_persisted: HashMap<InstanceId, DateTime<Utc>>,
}

/// Orchestrates event appends with causality and interval snapshots.
pub struct PersistenceManager {
    events: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    config: PersistenceConfig,
    state: Mutex<ManagerState>,
}

impl PersistenceManager {
    pub fn new(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        config: PersistenceConfig,
    ) -> Self {
        Self {
            events,
            snapshots,
            config,
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn event_store(&self) -> Arc<dyn EventStore> {
        Arc::clone(&self.events)
    }

    /// Append one transition event.
    ///
    /// Mints the event id, stamps `persisted_at` strictly monotonically
    /// per instance (equal-millisecond appends are bumped forward 1 ms),
    /// and back-links the parent's `caused` list best-effort. Returns the
    /// new id so the caller can thread it as the cause of downstream
    /// sends.
    pub async fn persist_event(
        &self,
        request: PersistRequest,
        now: DateTime<Utc>,
    ) -> Result<EventId, StoreError> {
        let persisted_at = {
            let mut state = self.state.lock();
            let stamp = match state.last_persisted.get(&request.instance_id) {
                Some(last) if *last >= now => *last + Duration::milliseconds(1),
                _ => now,
            };
            state.last_persisted.insert(request.instance_id, stamp);
            stamp
        };

        let id = EventId::new();
        let caused_by: Vec<EventId> = request.caused_by.into_iter().collect();
        let event = PersistedEvent {
            id,
            instance_id: request.instance_id,
            machine_name: request.machine_name,
            component_name: request.component_name,
            event: request.event,
            state_before: request.state_before,
            state_after: request.state_after,
            persisted_at,
            caused_by: caused_by.clone(),
            caused: Vec::new(),
            source_component: request.source_component,
            target_component: request.target_component,
        };
        self.events.append(event).await?;

        for parent in caused_by {
            match self.events.link_caused(parent, id).await {
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(%parent, child = %id, error = %e, "caused-link update failed")
                }
            }
        }
        Ok(id)
    }

    /// Count a transition; at multiples of the snapshot interval, write a
    /// snapshot. Returns whether one was written.
    ///
    /// Snapshot failures are the caller's to log as non-fatal.
    pub async fn maybe_snapshot(
        &self,
        instance: &Instance,
        last_event_id: Option<EventId>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let due = {
            let mut state = self.state.lock();
            let count = state.transition_counts.entry(instance.id).or_insert(0);
            *count += 1;
            self.config.snapshot_interval > 0 && *count % self.config.snapshot_interval == 0
        };
        if !due {
            return Ok(false);
        }
        self.snapshot_now(instance, last_event_id, now).await?;
        Ok(true)
    }

    /// Write a snapshot unconditionally.
    pub async fn snapshot_now(
        &self,
        instance: &Instance,
        last_event_id: Option<EventId>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.snapshots
            .save_snapshot(Snapshot {
                instance: instance.clone(),
                snapshot_at: now,
                last_event_id,
            })
            .await
    }

    /// Drop per-instance bookkeeping and the stored snapshot when an
    /// instance is disposed, so a restore cannot resurrect it.
    pub async fn forget_instance(&self, instance_id: InstanceId) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock();
            state.transition_counts.remove(&instance_id);
            state.last_persisted.remove(&instance_id);
        }
        self.snapshots.delete_snapshot(instance_id).await
    }

    /// All stored snapshots, for engine restore.
    pub async fn restore_all(&self) -> Result<Vec<Snapshot>, StoreError> {
        self.snapshots.all_snapshots().await
    }

    /// One instance's full persisted history in `persisted_at` order.
    pub async fn history(&self, instance_id: InstanceId) -> Result<Vec<PersistedEvent>, StoreError> {
        self.events.events_for_instance(instance_id).await
    }

    /// Forward causality traversal from a root event.
    ///
    /// Breadth-first over the `caused_by` back-references (which every
    /// store can answer), so it works whether or not the backend records
    /// forward `caused` links. Cycle-safe via a visited set; the root is
    /// the first element of the chain.
    pub async fn trace_causality(
        &self,
        root: EventId,
    ) -> Result<Vec<PersistedEvent>, StoreError> {
        let root_event = self
            .events
            .event(root)
            .await?
            .ok_or(StoreError::EventNotFound(root))?;

        let mut chain = vec![root_event];
        let mut visited: HashSet<EventId> = HashSet::from([root]);
        let mut queue: VecDeque<EventId> = VecDeque::from([root]);

        while let Some(current) = queue.pop_front() {
            for child in self.events.caused_events(current).await? {
                if visited.insert(child.id) {
                    queue.push_back(child.id);
                    chain.push(child);
                }
            }
        }
        Ok(chain)
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
