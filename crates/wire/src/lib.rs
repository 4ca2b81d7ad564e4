// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-wire: channel names and JSON envelopes for broker traffic.
//!
//! Everything that crosses a broker is one of these envelopes,
//! serialized as a tagged JSON object. Consumers deserialize with
//! [`decode`]; payloads that fail to decode are the caller's to log
//! and drop.

pub mod channel;
mod message;

pub use message::{decode, CommandMessage, EventMessage, QueryResponse, RegistryMessage};
