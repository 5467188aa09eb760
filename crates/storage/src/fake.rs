// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake credential store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::store::{CredentialStore, Mutation, RecordFilter, StateStore, StoreError};
use async_trait::async_trait;
use cb_core::{BindRecord, TenantName};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Store operation a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreFailOn {
    FindOne,
    Insert,
    Update,
    Remove,
    RemoveAll,
    List,
    QueueRevocation,
    ClearRevocation,
}

/// Fake store: an in-memory `StateStore` plus failure injection
#[derive(Clone)]
pub struct FakeStore {
    inner: StateStore,
    failures: Arc<Mutex<HashSet<StoreFailOn>>>,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self {
            inner: StateStore::in_memory(),
            failures: Arc::default(),
        }
    }
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `op` fail with `StoreError::Unavailable` until cleared
    pub fn fail(&self, op: StoreFailOn) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(op);
    }

    pub fn clear_failure(&self, op: StoreFailOn) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&op);
    }

    /// The backing store, for asserting on contents
    pub fn inner(&self) -> &StateStore {
        &self.inner
    }

    fn injected(&self, op: StoreFailOn) -> Result<(), StoreError> {
        let failing = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&op);
        if failing {
            return Err(StoreError::Unavailable(format!("injected {:?} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FakeStore {
    async fn find_one(&self, filter: &RecordFilter) -> Result<BindRecord, StoreError> {
        self.injected(StoreFailOn::FindOne)?;
        self.inner.find_one(filter).await
    }

    async fn insert(&self, record: BindRecord) -> Result<(), StoreError> {
        self.injected(StoreFailOn::Insert)?;
        self.inner.insert(record).await
    }

    async fn update(&self, filter: &RecordFilter, mutation: Mutation) -> Result<(), StoreError> {
        self.injected(StoreFailOn::Update)?;
        self.inner.update(filter, mutation).await
    }

    async fn remove(&self, filter: &RecordFilter) -> Result<(), StoreError> {
        self.injected(StoreFailOn::Remove)?;
        self.inner.remove(filter).await
    }

    async fn remove_all(&self, tenant: &TenantName) -> Result<usize, StoreError> {
        self.injected(StoreFailOn::RemoveAll)?;
        self.inner.remove_all(tenant).await
    }

    async fn list(&self) -> Result<Vec<BindRecord>, StoreError> {
        self.injected(StoreFailOn::List)?;
        self.inner.list().await
    }

    async fn queue_revocation(
        &self,
        tenant: &TenantName,
        username: &str,
    ) -> Result<(), StoreError> {
        self.injected(StoreFailOn::QueueRevocation)?;
        self.inner.queue_revocation(tenant, username).await
    }

    async fn clear_revocation(&self, tenant: &TenantName) -> Result<bool, StoreError> {
        self.injected(StoreFailOn::ClearRevocation)?;
        self.inner.clear_revocation(tenant).await
    }

    async fn pending_revocations(&self) -> Result<Vec<(TenantName, String)>, StoreError> {
        self.inner.pending_revocations().await
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
