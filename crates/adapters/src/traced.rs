// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced provisioner wrapper for consistent observability
//!
//! Passwords never reach the log; only their length is recorded.

use crate::provision::{Permission, ProvisionError, Provisioner};
use async_trait::async_trait;
use cb_core::Password;
use tracing::Instrument;

/// Wrapper that adds tracing to any Provisioner
#[derive(Clone)]
pub struct TracedProvisioner<P> {
    inner: P,
}

impl<P> TracedProvisioner<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

fn log_outcome<T>(result: &Result<T, ProvisionError>, start: std::time::Instant, done: &str) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(_) => tracing::info!(elapsed_ms, "{done}"),
        Err(ProvisionError::NotFound(what)) => {
            tracing::warn!(elapsed_ms, what = %what, "not found")
        }
        Err(e) => tracing::error!(elapsed_ms, error = %e, "failed"),
    }
}

#[async_trait]
impl<P: Provisioner> Provisioner for TracedProvisioner<P> {
    async fn create_login(
        &self,
        database: &str,
        username: &str,
        password: &Password,
        permission: Permission,
    ) -> Result<(), ProvisionError> {
        let span = tracing::info_span!("provision.create_login", database, username);
        async {
            tracing::info!(
                ?permission,
                password_len = password.expose().len(),
                "creating login"
            );
            let start = std::time::Instant::now();
            let result = self
                .inner
                .create_login(database, username, password, permission)
                .await;
            log_outcome(&result, start, "login created");
            result
        }
        .instrument(span)
        .await
    }

    async fn revoke_login(&self, database: &str, username: &str) -> Result<(), ProvisionError> {
        let span = tracing::info_span!("provision.revoke_login", database, username);
        async {
            tracing::info!("revoking login");
            let start = std::time::Instant::now();
            let result = self.inner.revoke_login(database, username).await;
            log_outcome(&result, start, "login revoked");
            result
        }
        .instrument(span)
        .await
    }

    async fn create_database(&self, database: &str) -> Result<(), ProvisionError> {
        let span = tracing::info_span!("provision.create_database", database);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.create_database(database).await;
            log_outcome(&result, start, "database ready");
            result
        }
        .instrument(span)
        .await
    }

    async fn drop_database(&self, database: &str) -> Result<(), ProvisionError> {
        let span = tracing::info_span!("provision.drop_database", database);
        async {
            tracing::info!("dropping database");
            let start = std::time::Instant::now();
            let result = self.inner.drop_database(database).await;
            log_outcome(&result, start, "database dropped");
            result
        }
        .instrument(span)
        .await
    }

    async fn login_exists(&self, database: &str, username: &str) -> Result<bool, ProvisionError> {
        let result = self.inner.login_exists(database, username).await;
        if let Err(e) = &result {
            tracing::error!(database, username, error = %e, "login lookup failed");
        }
        result
    }

    async fn ping(&self) -> Result<(), ProvisionError> {
        let result = self.inner.ping().await;
        match &result {
            Ok(()) => tracing::debug!("engine ping ok"),
            Err(e) => tracing::warn!(error = %e, "engine ping failed"),
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
