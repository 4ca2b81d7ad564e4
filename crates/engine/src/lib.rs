// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-engine: the per-component execution engine of the Switchboard
//! runtime.
//!
//! A [`Runtime`] owns one component's instances: it routes events,
//! selects and executes transitions, evaluates guards, dispatches
//! triggered methods (handing them a [`Sender`] capability), schedules
//! timeout and auto transitions on a single [`TimerWheel`], fans out
//! cascading rules, persists every transition through `sb-store`, and
//! restores instances (resynchronising timeouts) after a restart.
//!
//! Concurrency model: all transitions serialise behind one async lock,
//! and every piece of follow-up work (sender operations, cascades,
//! timer firings) goes through the runtime mailbox, so at most one
//! transition executes per instance at any time and follow-ups never
//! re-enter a transition synchronously. `Runtime::quiesce` awaits the
//! mailbox running dry.

mod cascade;
mod engine;
mod error;
pub mod index;
mod method;
mod router;
mod runtime;
mod sender;
pub mod wheel;

pub use engine::{
    ResyncReport, RestoreReport, SendOutcome, Simulation, TimerTask, TimerTaskKind,
};
pub use error::EngineError;
pub use index::PropertyIndex;
pub use method::{MethodContext, MethodRegistry, TriggeredMethod, TriggeredMethodError};
pub use router::{CrossRouter, NoopRouter, RouterError};
pub use runtime::{Runtime, RuntimeOptions};
pub use sender::Sender;
pub use wheel::{TimerWheel, TimerWheelConfig};
