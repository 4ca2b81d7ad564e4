// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single ticking timer wheel servicing all pending timeouts.
//!
//! A circular array of buckets indexed by tick; scheduling and
//! cancellation are O(1) regardless of how many tasks are outstanding.
//! Precision is one tick — deliberately coarser than native single-shot
//! timers. Tasks whose delay exceeds one lap stay keyed to their bucket
//! and are skipped until their expiry tick arrives.
//!
//! The wheel itself is passive: [`TimerWheel::tick`] advances one tick
//! and returns the due payloads; the runtime drives it from an interval
//! task and delivers payloads through its mailbox, catching per-task
//! errors so a failing callback can never stop the wheel.

use std::collections::HashMap;

/// Wheel geometry.
#[derive(Debug, Clone)]
pub struct TimerWheelConfig {
    /// Milliseconds per tick.
    pub tick_ms: u64,
    /// Number of buckets. The default covers one minute per lap.
    pub wheel_size: usize,
}

impl Default for TimerWheelConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            wheel_size: 1200,
        }
    }
}

#[derive(Debug)]
struct WheelTask<T> {
    expiry_tick: u64,
    payload: T,
}

/// A timer wheel holding payloads of type `T` keyed by task id.
#[derive(Debug)]
pub struct TimerWheel<T> {
    tick_ms: u64,
    current_tick: u64,
    buckets: Vec<Vec<String>>,
    tasks: HashMap<String, WheelTask<T>>,
}

impl<T> TimerWheel<T> {
    pub fn new(config: TimerWheelConfig) -> Self {
        Self {
            tick_ms: config.tick_ms.max(1),
            current_tick: 0,
            buckets: vec![Vec::new(); config.wheel_size.max(1)],
            tasks: HashMap::new(),
        }
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// Schedule a task. An existing task with the same id is cancelled
    /// first. A zero delay fires at the earliest possible tick.
    pub fn add_timeout(&mut self, task_id: impl Into<String>, delay_ms: u64, payload: T) {
        let task_id = task_id.into();
        self.remove_timeout(&task_id);

        let ticks = delay_ms.div_ceil(self.tick_ms).max(1);
        let expiry_tick = self.current_tick + ticks;
        let bucket = (expiry_tick % self.buckets.len() as u64) as usize;
        self.buckets[bucket].push(task_id.clone());
        self.tasks.insert(
            task_id,
            WheelTask {
                expiry_tick,
                payload,
            },
        );
    }

    /// Cancel a task. O(1): the bucket entry becomes a dead key that is
    /// dropped when its bucket is next scanned.
    pub fn remove_timeout(&mut self, task_id: &str) -> Option<T> {
        self.tasks.remove(task_id).map(|t| t.payload)
    }

    /// Advance one tick and collect due tasks.
    ///
    /// The current bucket is drained; entries whose expiry has not yet
    /// arrived (multi-lap tasks) are re-bucketed for their expiry tick,
    /// dead keys from cancellations are dropped.
    pub fn tick(&mut self) -> Vec<(String, T)> {
        self.current_tick += 1;
        let bucket = (self.current_tick % self.buckets.len() as u64) as usize;
        let entries = std::mem::take(&mut self.buckets[bucket]);

        let mut due = Vec::new();
        for task_id in entries {
            let Some(task) = self.tasks.get(&task_id) else {
                // Cancelled; drop the dead key.
                continue;
            };
            if task.expiry_tick <= self.current_tick {
                if let Some(task) = self.tasks.remove(&task_id) {
                    due.push((task_id, task.payload));
                }
            } else {
                let lap_bucket = (task.expiry_tick % self.buckets.len() as u64) as usize;
                self.buckets[lap_bucket].push(task_id);
            }
        }
        due
    }

    /// Advance the wheel by `elapsed_ms`, collecting everything that
    /// comes due along the way.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<(String, T)> {
        let ticks = elapsed_ms / self.tick_ms;
        let mut due = Vec::new();
        for _ in 0..ticks {
            due.extend(self.tick());
        }
        due
    }
}

#[cfg(test)]
#[path = "wheel_tests.rs"]
mod tests;
