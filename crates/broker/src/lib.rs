// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-broker: pub/sub transport for cross-runtime coordination.
//!
//! A [`MessageBroker`] carries JSON payloads between runtimes. Delivery
//! always lands on an mpsc channel consumed on a later scheduling turn —
//! asynchronous dispatch everywhere, including in-memory, so a
//! subscriber can never re-enter the publisher synchronously. Semantics
//! are at-least-once for distributed backends; recipients tolerate
//! duplicates.
//!
//! Two implementations: [`MemoryBroker`] for same-process registries
//! (with a local fast path flag) and [`RedisBroker`] over Redis pub/sub.

mod broker;
mod memory;
mod redis_broker;

pub use broker::{BrokerError, BrokerMessage, MessageBroker};
pub use memory::MemoryBroker;
pub use redis_broker::{RedisBroker, RedisBrokerConfig};
