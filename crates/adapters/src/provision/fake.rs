// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake provisioner for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{MemoryProvisioner, Permission, ProvisionError, Provisioner};
use async_trait::async_trait;
use cb_core::Password;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded provisioner call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionCall {
    CreateLogin {
        database: String,
        username: String,
        password: Password,
        permission: Permission,
    },
    RevokeLogin {
        database: String,
        username: String,
    },
    CreateDatabase {
        database: String,
    },
    DropDatabase {
        database: String,
    },
    LoginExists {
        database: String,
        username: String,
    },
    Ping,
}

/// Operation a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    CreateLogin,
    RevokeLogin,
    CreateDatabase,
    DropDatabase,
    LoginExists,
    Ping,
}

/// Fake provisioner: a memory engine plus call recording and failure injection
#[derive(Clone, Default)]
pub struct FakeProvisioner {
    engine: MemoryProvisioner,
    calls: Arc<Mutex<Vec<ProvisionCall>>>,
    failures: Arc<Mutex<HashMap<FailOn, ProvisionError>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl FakeProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ProvisionCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Count of `create_login` calls
    pub fn create_login_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProvisionCall::CreateLogin { .. }))
            .count()
    }

    /// Count of `revoke_login` calls
    pub fn revoke_login_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProvisionCall::RevokeLogin { .. }))
            .count()
    }

    /// Make every call to `op` fail with `error` until cleared
    pub fn fail(&self, op: FailOn, error: ProvisionError) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(op, error);
    }

    /// Stop injecting failures into `op`
    pub fn clear_failure(&self, op: FailOn) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&op);
    }

    /// Delay every `create_login` call, widening race windows in tests
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    /// The underlying engine, for asserting on logins
    pub fn engine(&self) -> &MemoryProvisioner {
        &self.engine
    }

    fn record(&self, call: ProvisionCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn injected(&self, op: FailOn) -> Result<(), ProvisionError> {
        match self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&op)
        {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn create_login(
        &self,
        database: &str,
        username: &str,
        password: &Password,
        permission: Permission,
    ) -> Result<(), ProvisionError> {
        self.record(ProvisionCall::CreateLogin {
            database: database.to_string(),
            username: username.to_string(),
            password: password.clone(),
            permission,
        });

        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.injected(FailOn::CreateLogin)?;
        self.engine
            .create_login(database, username, password, permission)
            .await
    }

    async fn revoke_login(&self, database: &str, username: &str) -> Result<(), ProvisionError> {
        self.record(ProvisionCall::RevokeLogin {
            database: database.to_string(),
            username: username.to_string(),
        });
        self.injected(FailOn::RevokeLogin)?;
        self.engine.revoke_login(database, username).await
    }

    async fn create_database(&self, database: &str) -> Result<(), ProvisionError> {
        self.record(ProvisionCall::CreateDatabase {
            database: database.to_string(),
        });
        self.injected(FailOn::CreateDatabase)?;
        self.engine.create_database(database).await
    }

    async fn drop_database(&self, database: &str) -> Result<(), ProvisionError> {
        self.record(ProvisionCall::DropDatabase {
            database: database.to_string(),
        });
        self.injected(FailOn::DropDatabase)?;
        self.engine.drop_database(database).await
    }

    async fn login_exists(&self, database: &str, username: &str) -> Result<bool, ProvisionError> {
        self.record(ProvisionCall::LoginExists {
            database: database.to_string(),
            username: username.to_string(),
        });
        self.injected(FailOn::LoginExists)?;
        self.engine.login_exists(database, username).await
    }

    async fn ping(&self) -> Result<(), ProvisionError> {
        self.record(ProvisionCall::Ping);
        self.injected(FailOn::Ping)?;
        self.engine.ping().await
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
