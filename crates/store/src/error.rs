// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence-layer errors.

use sb_core::EventId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure (connection loss, write error, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}
