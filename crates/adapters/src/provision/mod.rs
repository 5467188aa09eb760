// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Login provisioning against the target database engine

mod memory;
mod postgres;

pub use memory::MemoryProvisioner;
pub use postgres::{PgConnector, PostgresProvisioner};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FailOn, FakeProvisioner, ProvisionCall};

use async_trait::async_trait;
use cb_core::Password;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from provisioning operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("engine rejected operation: {0}")]
    Rejected(String),
    #[error("engine connection failed: {0}")]
    Connection(String),
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

/// Access granted to a provisioned login on its database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    #[default]
    ReadWrite,
    ReadOnly,
}

/// Administrative interface of the database engine.
///
/// `create_login` is an upsert: a retry after a partial failure updates the
/// existing login instead of failing.
#[async_trait]
pub trait Provisioner: Clone + Send + Sync + 'static {
    /// Create or update `username` on `database`, creating the database if needed
    async fn create_login(
        &self,
        database: &str,
        username: &str,
        password: &Password,
        permission: Permission,
    ) -> Result<(), ProvisionError>;

    /// Drop `username`; `NotFound` when it does not exist
    async fn revoke_login(&self, database: &str, username: &str) -> Result<(), ProvisionError>;

    /// Create `database` if it does not exist
    async fn create_database(&self, database: &str) -> Result<(), ProvisionError>;

    /// Drop `database` and its data if it exists
    async fn drop_database(&self, database: &str) -> Result<(), ProvisionError>;

    /// Whether `username` can currently log in to `database`
    async fn login_exists(&self, database: &str, username: &str) -> Result<bool, ProvisionError>;

    /// Liveness probe of the administrative connection
    async fn ping(&self) -> Result<(), ProvisionError>;
}
