// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use cb_core::{BindRecord, Operation, TenantName};
use std::collections::{BTreeMap, HashMap};

/// Bind records built from WAL operations
#[derive(Debug, Default, Clone)]
pub struct MaterializedState {
    pub records: HashMap<TenantName, BindRecord>,
    /// Usernames awaiting revocation, by tenant
    pub revocations: BTreeMap<TenantName, String>,
}

impl MaterializedState {
    /// Rebuild state from a sequence of operations
    pub fn from_ops(ops: &[Operation]) -> Self {
        let mut state = Self::default();
        for op in ops {
            state.apply(op);
        }
        state
    }

    pub fn get(&self, tenant: &TenantName) -> Option<&BindRecord> {
        self.records.get(tenant)
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::RecordInsert { record } => {
                self.records.insert(record.tenant.clone(), record.clone());
            }

            Operation::ConsumerAdd { tenant, consumer } => {
                if let Some(record) = self.records.get_mut(tenant) {
                    record.add_consumer(consumer.clone());
                }
            }

            Operation::ConsumerRemove { tenant, consumer } => {
                if let Some(record) = self.records.get_mut(tenant) {
                    record.remove_consumer(consumer);
                }
            }

            Operation::RecordDelete { tenant } => {
                self.records.remove(tenant);
            }

            Operation::RevocationQueued { tenant, username } => {
                self.revocations.insert(tenant.clone(), username.clone());
            }

            Operation::RevocationCleared { tenant } => {
                self.revocations.remove(tenant);
            }
        }
    }

    /// Minimal operation list that reproduces this state
    pub fn to_ops(&self) -> Vec<Operation> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.tenant.cmp(&b.tenant));
        let queued = self
            .revocations
            .iter()
            .map(|(tenant, username)| Operation::RevocationQueued {
                tenant: tenant.clone(),
                username: username.clone(),
            });
        records
            .into_iter()
            .map(|record| Operation::RecordInsert { record })
            .chain(queued)
            .collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
