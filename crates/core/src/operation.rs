// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations for the write-ahead log

use crate::name::{ConsumerId, TenantName};
use crate::record::BindRecord;
use serde::{Deserialize, Serialize};

/// Mutations of the credential store, persisted to the WAL before being applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create the record for a tenant's first bind
    RecordInsert { record: BindRecord },

    /// Add a consumer to an existing record
    ConsumerAdd {
        tenant: TenantName,
        consumer: ConsumerId,
    },

    /// Remove a consumer from an existing record
    ConsumerRemove {
        tenant: TenantName,
        consumer: ConsumerId,
    },

    /// Delete a tenant's record
    RecordDelete { tenant: TenantName },

    /// A login outlived its record and still has to be revoked
    RevocationQueued { tenant: TenantName, username: String },

    /// The queued login was revoked or taken over by a new bind
    RevocationCleared { tenant: TenantName },
}

impl Operation {
    /// Tenant the operation applies to
    pub fn tenant(&self) -> &TenantName {
        match self {
            Operation::RecordInsert { record } => &record.tenant,
            Operation::ConsumerAdd { tenant, .. }
            | Operation::ConsumerRemove { tenant, .. }
            | Operation::RecordDelete { tenant }
            | Operation::RevocationQueued { tenant, .. }
            | Operation::RevocationCleared { tenant } => tenant,
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
