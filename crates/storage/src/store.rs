// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential store interface and its WAL-backed implementation

use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use async_trait::async_trait;
use cb_core::{BindRecord, ConsumerId, Operation, TenantName};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from credential store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no bind record matches {0}")]
    NotFound(String),
    #[error("bind record already exists for tenant '{0}'")]
    DuplicateKey(String),
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Selects a single record by tenant, optionally requiring a bound consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub tenant: TenantName,
    pub consumer: Option<ConsumerId>,
}

impl RecordFilter {
    pub fn tenant(tenant: TenantName) -> Self {
        Self {
            tenant,
            consumer: None,
        }
    }

    pub fn with_consumer(mut self, consumer: ConsumerId) -> Self {
        self.consumer = Some(consumer);
        self
    }

    pub fn matches(&self, record: &BindRecord) -> bool {
        record.tenant == self.tenant
            && self
                .consumer
                .as_ref()
                .is_none_or(|c| record.has_consumer(c))
    }
}

impl std::fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.consumer {
            Some(c) => write!(f, "tenant '{}' with consumer '{}'", self.tenant, c),
            None => write!(f, "tenant '{}'", self.tenant),
        }
    }
}

/// In-place change to an existing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Add a consumer to the set (no-op when already present)
    AddConsumer(ConsumerId),
    /// Remove a consumer from the set
    RemoveConsumer(ConsumerId),
}

/// Persistent table of bind records.
///
/// All operations touch a single record. Callers serialize same-tenant
/// access through the tenant lock, so no multi-record transactions exist.
#[async_trait]
pub trait CredentialStore: Clone + Send + Sync + 'static {
    /// Fetch the record matching `filter`
    async fn find_one(&self, filter: &RecordFilter) -> Result<BindRecord, StoreError>;

    /// Insert a new record; fails if the tenant already has one
    async fn insert(&self, record: BindRecord) -> Result<(), StoreError>;

    /// Apply `mutation` to the record matching `filter`
    async fn update(&self, filter: &RecordFilter, mutation: Mutation) -> Result<(), StoreError>;

    /// Delete the record matching `filter`
    async fn remove(&self, filter: &RecordFilter) -> Result<(), StoreError>;

    /// Delete every record for `tenant`, returning how many were removed
    async fn remove_all(&self, tenant: &TenantName) -> Result<usize, StoreError>;

    /// All records, ordered by tenant
    async fn list(&self) -> Result<Vec<BindRecord>, StoreError>;

    /// Remember that `username` must still be revoked for `tenant`
    async fn queue_revocation(&self, tenant: &TenantName, username: &str)
        -> Result<(), StoreError>;

    /// Forget the tenant's queued revocation. Returns whether one existed.
    async fn clear_revocation(&self, tenant: &TenantName) -> Result<bool, StoreError>;

    /// Queued revocations as `(tenant, username)`, ordered by tenant
    async fn pending_revocations(&self) -> Result<Vec<(TenantName, String)>, StoreError>;
}

/// Store backed by in-memory state, optionally journaled to a WAL.
///
/// Every mutation is appended to the WAL before it is applied, so state
/// rebuilt by replay never runs ahead of what was acknowledged.
#[derive(Clone)]
pub struct StateStore {
    state: Arc<Mutex<MaterializedState>>,
    wal: Option<Arc<Mutex<Wal>>>,
}

impl StateStore {
    /// Volatile store for tests and development
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(Mutex::new(MaterializedState::default())),
            wal: None,
        }
    }

    /// Open the WAL at `path`, rebuilding state from its contents
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let ops = Wal::replay(path)?;
        let state = MaterializedState::from_ops(&ops);
        let wal = Wal::open(path)?;

        tracing::info!(
            path = %path.display(),
            operations = ops.len(),
            records = state.records.len(),
            pending_revocations = state.revocations.len(),
            "credential store loaded"
        );

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            wal: Some(Arc::new(Mutex::new(wal))),
        })
    }

    /// Rewrite the WAL so it holds one insert per live record
    pub fn compact(&self) -> Result<(), StoreError> {
        let Some(wal) = &self.wal else {
            return Ok(());
        };
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let ops = state.to_ops();
        wal.lock()
            .unwrap_or_else(|e| e.into_inner())
            .rewrite(&ops)?;
        tracing::info!(operations = ops.len(), "WAL compacted");
        Ok(())
    }

    /// Journal then apply. Caller holds the state lock.
    fn commit(&self, state: &mut MaterializedState, op: Operation) -> Result<(), StoreError> {
        if let Some(wal) = &self.wal {
            wal.lock().unwrap_or_else(|e| e.into_inner()).append(&op)?;
        }
        state.apply(&op);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for StateStore {
    async fn find_one(&self, filter: &RecordFilter) -> Result<BindRecord, StoreError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .get(&filter.tenant)
            .filter(|record| filter.matches(record))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(filter.to_string()))
    }

    async fn insert(&self, record: BindRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.get(&record.tenant).is_some() {
            return Err(StoreError::DuplicateKey(record.tenant.to_string()));
        }
        self.commit(&mut state, Operation::RecordInsert { record })
    }

    async fn update(&self, filter: &RecordFilter, mutation: Mutation) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let record = state
            .get(&filter.tenant)
            .filter(|record| filter.matches(record))
            .ok_or_else(|| StoreError::NotFound(filter.to_string()))?;

        let op = match mutation {
            Mutation::AddConsumer(consumer) => {
                if record.has_consumer(&consumer) {
                    return Ok(());
                }
                Operation::ConsumerAdd {
                    tenant: filter.tenant.clone(),
                    consumer,
                }
            }
            Mutation::RemoveConsumer(consumer) => {
                if !record.has_consumer(&consumer) {
                    return Err(StoreError::NotFound(
                        RecordFilter::tenant(filter.tenant.clone())
                            .with_consumer(consumer)
                            .to_string(),
                    ));
                }
                Operation::ConsumerRemove {
                    tenant: filter.tenant.clone(),
                    consumer,
                }
            }
        };
        self.commit(&mut state, op)
    }

    async fn remove(&self, filter: &RecordFilter) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.get(&filter.tenant).is_some_and(|r| filter.matches(r)) {
            return Err(StoreError::NotFound(filter.to_string()));
        }
        self.commit(
            &mut state,
            Operation::RecordDelete {
                tenant: filter.tenant.clone(),
            },
        )
    }

    async fn remove_all(&self, tenant: &TenantName) -> Result<usize, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.get(tenant).is_none() {
            return Ok(0);
        }
        self.commit(
            &mut state,
            Operation::RecordDelete {
                tenant: tenant.clone(),
            },
        )?;
        Ok(1)
    }

    async fn list(&self) -> Result<Vec<BindRecord>, StoreError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<_> = state.records.values().cloned().collect();
        records.sort_by(|a, b| a.tenant.cmp(&b.tenant));
        Ok(records)
    }

    async fn queue_revocation(
        &self,
        tenant: &TenantName,
        username: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.revocations.get(tenant).is_some_and(|u| u == username) {
            return Ok(());
        }
        self.commit(
            &mut state,
            Operation::RevocationQueued {
                tenant: tenant.clone(),
                username: username.to_string(),
            },
        )
    }

    async fn clear_revocation(&self, tenant: &TenantName) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.revocations.contains_key(tenant) {
            return Ok(false);
        }
        self.commit(
            &mut state,
            Operation::RevocationCleared {
                tenant: tenant.clone(),
            },
        )?;
        Ok(true)
    }

    async fn pending_revocations(&self) -> Result<Vec<(TenantName, String)>, StoreError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .revocations
            .iter()
            .map(|(tenant, username)| (tenant.clone(), username.clone()))
            .collect())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
