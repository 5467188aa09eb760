// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logins whose revocation failed after their record was deleted
//!
//! Such a login is gone from the store but still live in the engine. The
//! backlog remembers it until a sweep revokes it or the tenant is bound
//! again (which takes the login over with a fresh password).

use cb_core::TenantName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A login still waiting to be revoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRevocation {
    pub username: String,
    pub attempts: u32,
    pub last_error: String,
    pub queued_at: DateTime<Utc>,
}

/// Outcome of one sweep over the backlog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Logins revoked (or found already gone)
    pub revoked: usize,
    /// Entries dropped because the tenant was bound again
    pub superseded: usize,
    /// Entries still pending after the sweep
    pub remaining: usize,
}

#[derive(Default)]
pub struct RevocationBacklog {
    entries: Mutex<BTreeMap<TenantName, PendingRevocation>>,
}

impl RevocationBacklog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `username` for revocation, or bump its attempt count
    pub fn push(&self, tenant: TenantName, username: &str, error: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(tenant).or_insert_with(|| PendingRevocation {
            username: username.to_string(),
            attempts: 0,
            last_error: String::new(),
            queued_at: Utc::now(),
        });
        entry.attempts += 1;
        entry.last_error = error.to_string();
    }

    /// Load an entry journaled by an earlier run, keeping any live one
    pub fn restore(&self, tenant: TenantName, username: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.entry(tenant).or_insert_with(|| PendingRevocation {
            username: username.to_string(),
            attempts: 0,
            last_error: "queued before restart".to_string(),
            queued_at: Utc::now(),
        });
    }

    /// Forget the tenant's pending revocation. Returns whether one existed.
    pub fn discard(&self, tenant: &TenantName) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(tenant).is_some()
    }

    pub fn get(&self, tenant: &TenantName) -> Option<PendingRevocation> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(tenant).cloned()
    }

    /// Current entries, ordered by tenant
    pub fn snapshot(&self) -> Vec<(TenantName, PendingRevocation)> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|(tenant, pending)| (tenant.clone(), pending.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
