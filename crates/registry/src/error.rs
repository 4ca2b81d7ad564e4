// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry-level errors.

use sb_broker::BrokerError;
use sb_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    #[error("component already registered: {0}")]
    AlreadyRegistered(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
