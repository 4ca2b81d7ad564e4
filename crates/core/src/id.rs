// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UUID-backed identifier newtypes.
//!
//! Instances, persisted events, and runtimes are identified by random
//! UUIDs. The newtypes keep the id spaces apart at the type level while
//! serializing transparently as strings.

/// Define a newtype ID wrapper around a [`uuid::Uuid`].
///
/// Generates `new()` for random v4 generation, `parse()` for strings,
/// `as_uuid()`, plus `Display`, `Default`, and transparent serde.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generate a new random id.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Parse an id from its canonical string form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(uuid::Uuid::parse_str(s)?))
            }

            pub fn from_uuid(id: uuid::Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_uuid_id! {
    /// Unique identifier for a live state-machine instance.
    pub struct InstanceId;
}

define_uuid_id! {
    /// Unique identifier for a persisted event.
    pub struct EventId;
}

define_uuid_id! {
    /// Unique identifier for a runtime process (used by registry
    /// announcements and heartbeats).
    pub struct RuntimeId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
