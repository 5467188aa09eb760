// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-tenant lock registry
//!
//! Every bind, unbind and removal for a tenant runs while holding that
//! tenant's lock, which makes the read-decide-write sequence against the
//! credential store atomic. Locks for different tenants are independent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock acquisition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("timed out after {timeout:?} waiting for lock on '{key}'")]
    Timeout { key: String, timeout: Duration },
}

/// Registry of per-key async mutexes.
///
/// The map itself sits behind a short-lived std mutex that only guards
/// lookup and insertion, so contention on one key never blocks another.
#[derive(Default)]
pub struct TenantLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Proof that the caller holds a tenant's lock
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct TenantGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl TenantGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock explicitly
    pub fn release(self) {
        tracing::trace!(key = %self.key, "lock released");
    }
}

impl std::fmt::Debug for TenantGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantGuard").field("key", &self.key).finish()
    }
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Wait until no other context holds `key`, then take it
    pub async fn acquire(&self, key: &str) -> TenantGuard {
        let guard = self.entry(key).lock_owned().await;
        tracing::trace!(key, "lock acquired");
        TenantGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`
    pub async fn acquire_timeout(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<TenantGuard, LockError> {
        match tokio::time::timeout(timeout, self.acquire(key)).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(key, ?timeout, "lock acquisition timed out");
                Err(LockError::Timeout {
                    key: key.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Take `key` only if it is free right now
    pub fn try_acquire(&self, key: &str) -> Option<TenantGuard> {
        let guard = self.entry(key).try_lock_owned().ok()?;
        Some(TenantGuard {
            key: key.to_string(),
            _guard: guard,
        })
    }

    /// Number of keys with a lock allocated
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop locks nobody holds or waits on. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let before = locks.len();
        // Holders and waiters each own a clone; a count of 1 is the map's own.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
