// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bind record: the persisted credential state for one tenant

use crate::name::{ConsumerId, TenantName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Generated login secret. Redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The plaintext secret
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// One row of the credential store.
///
/// A record exists for a tenant exactly while at least one consumer holds a
/// bind. The password is assigned when the record is created and never
/// changes for the record's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindRecord {
    pub tenant: TenantName,
    pub username: String,
    pub password: Password,
    pub consumers: BTreeSet<ConsumerId>,
    pub created_at: DateTime<Utc>,
}

impl BindRecord {
    /// Record for a first bind, holding a single consumer
    pub fn new(
        tenant: TenantName,
        username: impl Into<String>,
        password: Password,
        consumer: ConsumerId,
    ) -> Self {
        Self {
            tenant,
            username: username.into(),
            password,
            consumers: BTreeSet::from([consumer]),
            created_at: Utc::now(),
        }
    }

    /// Add a consumer. Returns false when it was already bound.
    pub fn add_consumer(&mut self, consumer: ConsumerId) -> bool {
        self.consumers.insert(consumer)
    }

    /// Remove a consumer. Returns false when it was not bound.
    pub fn remove_consumer(&mut self, consumer: &ConsumerId) -> bool {
        self.consumers.remove(consumer)
    }

    pub fn has_consumer(&self, consumer: &ConsumerId) -> bool {
        self.consumers.contains(consumer)
    }

    /// Number of outstanding binds
    pub fn references(&self) -> usize {
        self.consumers.len()
    }

    /// True once the last consumer has been released
    pub fn is_drained(&self) -> bool {
        self.consumers.is_empty()
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
