// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bind orchestrator
//!
//! Every operation that touches a tenant runs its whole
//! read-decide-write sequence under that tenant's lock, so the store and the
//! engine never observe an interleaving of two requests for the same tenant.
//! Requests for different tenants never wait on each other.

use crate::error::BrokerError;
use crate::reconcile::{PendingRevocation, RevocationBacklog, SweepReport};
use cb_adapters::{Permission, ProvisionError, Provisioner};
use cb_core::{
    BindRecord, ConnectionDescriptor, ConsumerId, SecretGen, TenantGuard, TenantLocks, TenantName,
};
use cb_storage::{CredentialStore, Mutation, RecordFilter, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

/// Broker settings
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Tenant names that can never be bound
    pub reserved: BTreeSet<String>,
    /// URL scheme of the connection string
    pub scheme: String,
    /// Public host list handed to consumers
    pub hosts: Vec<String>,
    pub replica_set: Option<String>,
    pub permission: Permission,
    pub lock_timeout: Duration,
    pub provision_timeout: Duration,
}

impl BrokerConfig {
    /// Longest a single request can take before every bound expires.
    ///
    /// `bind` with a failed insert and `remove` each wait for the tenant
    /// lock and then make two provisioner calls.
    pub fn max_request_time(&self) -> Duration {
        self.lock_timeout + self.provision_timeout * 2
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            reserved: ["admin", "postgres", "template0", "template1"]
                .into_iter()
                .map(String::from)
                .collect(),
            scheme: "postgres".to_string(),
            hosts: vec!["127.0.0.1:5432".to_string()],
            replica_set: None,
            permission: Permission::ReadWrite,
            lock_timeout: Duration::from_secs(30),
            provision_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a successful unbind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnbindOutcome {
    /// Other consumers still hold the credential
    Released { remaining: usize },
    /// Last consumer left; the login was revoked
    Revoked,
    /// Last consumer left but the engine refused the revocation.
    /// The login is queued for the next sweep.
    RevokeFailed { error: String },
}

/// A tenant as seen by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantStatus {
    pub tenant: String,
    pub bound: bool,
    pub consumers: Vec<String>,
    pub login_exists: bool,
    pub pending_revocation: Option<PendingRevocation>,
}

/// Broker health report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub bound_tenants: usize,
    pub lock_entries: usize,
    pub revocation_backlog: usize,
    pub tenant: Option<TenantStatus>,
}

/// Orchestrates binds against a store, an engine and a secret source
pub struct Broker<S, P, G> {
    store: S,
    provisioner: P,
    secrets: G,
    locks: TenantLocks,
    backlog: RevocationBacklog,
    config: BrokerConfig,
}

impl<S, P, G> Broker<S, P, G>
where
    S: CredentialStore,
    P: Provisioner,
    G: SecretGen,
{
    pub fn new(store: S, provisioner: P, secrets: G, config: BrokerConfig) -> Self {
        Self {
            store,
            provisioner,
            secrets,
            locks: TenantLocks::new(),
            backlog: RevocationBacklog::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn backlog(&self) -> &RevocationBacklog {
        &self.backlog
    }

    /// Reserve a tenant: reject reserved names and make sure its database exists
    pub async fn create(&self, tenant: &str) -> Result<(), BrokerError> {
        let tenant = self.admit(tenant)?;
        let _guard = self.lock(&tenant).await?;

        self.provision("create_database", self.provisioner.create_database(tenant.as_str()))
            .await?;
        tracing::info!(tenant = %tenant, "tenant created");
        Ok(())
    }

    /// Provision or reuse the tenant's credential for `consumer`
    pub async fn bind(
        &self,
        tenant: &str,
        consumer: &str,
    ) -> Result<ConnectionDescriptor, BrokerError> {
        let tenant = self.admit(tenant)?;
        let consumer = ConsumerId::new(consumer)?;
        let _guard = self.lock(&tenant).await?;

        let filter = RecordFilter::tenant(tenant.clone());
        match self.store.find_one(&filter).await {
            Ok(record) => {
                let added = !record.has_consumer(&consumer);
                if added {
                    self.store
                        .update(&filter, Mutation::AddConsumer(consumer.clone()))
                        .await?;
                }
                tracing::info!(tenant = %tenant, consumer = %consumer, added, "bind reused credential");
                Ok(self.describe(&record))
            }
            Err(StoreError::NotFound(_)) => self.provision_first(tenant, consumer).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn provision_first(
        &self,
        tenant: TenantName,
        consumer: ConsumerId,
    ) -> Result<ConnectionDescriptor, BrokerError> {
        let username = tenant.as_str().to_string();
        let password = self.secrets.generate();

        self.provision(
            "create_login",
            self.provisioner.create_login(
                tenant.as_str(),
                &username,
                &password,
                self.config.permission,
            ),
        )
        .await?;

        let record = BindRecord::new(tenant.clone(), username, password, consumer.clone());
        if let Err(e) = self.store.insert(record.clone()).await {
            // The login exists but nothing references it; take it back down.
            tracing::error!(tenant = %tenant, error = %e, "persisting record failed");
            if let Err(revoke) = self
                .provision(
                    "revoke_login",
                    self.provisioner
                        .revoke_login(tenant.as_str(), &record.username),
                )
                .await
            {
                self.queue_revocation(&tenant, &record.username, &revoke)
                    .await;
            }
            return Err(e.into());
        }

        // A fresh login supersedes any stale one awaiting revocation
        if self.clear_revocation(&tenant).await {
            tracing::info!(tenant = %tenant, "pending revocation superseded by bind");
        }
        tracing::info!(tenant = %tenant, consumer = %consumer, "bind provisioned credential");
        Ok(self.describe(&record))
    }

    /// Release `consumer`'s claim; revoke the login when it was the last one
    pub async fn unbind(&self, tenant: &str, consumer: &str) -> Result<UnbindOutcome, BrokerError> {
        let tenant = TenantName::new(tenant)?;
        let consumer = ConsumerId::new(consumer)?;
        let _guard = self.lock(&tenant).await?;

        let filter = RecordFilter::tenant(tenant.clone()).with_consumer(consumer.clone());
        let record = self.store.find_one(&filter).await?;

        if record.references() > 1 {
            self.store
                .update(&filter, Mutation::RemoveConsumer(consumer.clone()))
                .await?;
            let remaining = record.references() - 1;
            tracing::info!(tenant = %tenant, consumer = %consumer, remaining, "unbind released");
            return Ok(UnbindOutcome::Released { remaining });
        }

        // Journal the intent first so a crash past this point still revokes
        self.store
            .queue_revocation(&tenant, &record.username)
            .await?;
        self.store.remove(&RecordFilter::tenant(tenant.clone())).await?;

        let revoked = self
            .provision(
                "revoke_login",
                self.provisioner
                    .revoke_login(tenant.as_str(), &record.username),
            )
            .await;
        match revoked {
            Ok(()) | Err(ProvisionError::NotFound(_)) => {
                self.clear_revocation(&tenant).await;
                tracing::info!(tenant = %tenant, consumer = %consumer, "unbind revoked login");
                Ok(UnbindOutcome::Revoked)
            }
            Err(e) => {
                tracing::error!(
                    tenant = %tenant,
                    username = %record.username,
                    error = %e,
                    "record deleted but login still live; queued for revocation"
                );
                self.queue_revocation(&tenant, &record.username, &e).await;
                Ok(UnbindOutcome::RevokeFailed {
                    error: e.to_string(),
                })
            }
        }
    }

    /// Tear the tenant down regardless of outstanding binds.
    ///
    /// The database is dropped before the login so the role owns nothing
    /// when it goes. Returns the number of records purged.
    pub async fn remove(&self, tenant: &str) -> Result<usize, BrokerError> {
        let tenant = self.admit(tenant)?;
        let _guard = self.lock(&tenant).await?;

        let username = match self.store.find_one(&RecordFilter::tenant(tenant.clone())).await {
            Ok(record) => record.username,
            Err(StoreError::NotFound(_)) => tenant.as_str().to_string(),
            Err(e) => return Err(e.into()),
        };
        self.store.queue_revocation(&tenant, &username).await?;
        let purged = self.store.remove_all(&tenant).await?;

        let dropped = self
            .provision(
                "drop_database",
                self.provisioner.drop_database(tenant.as_str()),
            )
            .await;

        match self
            .provision(
                "revoke_login",
                self.provisioner.revoke_login(tenant.as_str(), &username),
            )
            .await
        {
            Ok(()) | Err(ProvisionError::NotFound(_)) => {
                self.clear_revocation(&tenant).await;
            }
            Err(e) => {
                tracing::error!(tenant = %tenant, error = %e, "revoke during remove failed");
                self.queue_revocation(&tenant, &username, &e).await;
            }
        }

        dropped?;
        tracing::info!(tenant = %tenant, purged, "tenant removed");
        Ok(purged)
    }

    /// Probe the engine and report broker state, optionally for one tenant
    pub async fn status(&self, tenant: Option<&str>) -> Result<StatusReport, BrokerError> {
        let tenant = tenant.map(TenantName::new).transpose()?;
        self.provision("ping", self.provisioner.ping()).await?;

        let records = self.store.list().await?;
        let tenant = match tenant {
            Some(tenant) => Some(self.tenant_status(tenant, &records).await?),
            None => None,
        };

        Ok(StatusReport {
            bound_tenants: records.len(),
            lock_entries: self.locks.len(),
            revocation_backlog: self.backlog.len(),
            tenant,
        })
    }

    async fn tenant_status(
        &self,
        tenant: TenantName,
        records: &[BindRecord],
    ) -> Result<TenantStatus, BrokerError> {
        let record = records.iter().find(|r| r.tenant == tenant);
        let username = record.map_or(tenant.as_str(), |r| r.username.as_str());
        let login_exists = self
            .provision(
                "login_exists",
                self.provisioner.login_exists(tenant.as_str(), username),
            )
            .await?;

        Ok(TenantStatus {
            tenant: tenant.to_string(),
            bound: record.is_some(),
            consumers: record
                .map(|r| r.consumers.iter().map(|c| c.to_string()).collect())
                .unwrap_or_default(),
            login_exists,
            pending_revocation: self.backlog.get(&tenant),
        })
    }

    /// Retry queued revocations
    pub async fn sweep_revocations(&self) -> Result<SweepReport, BrokerError> {
        let mut report = SweepReport::default();

        for (tenant, pending) in self.backlog.snapshot() {
            let _guard = self.lock(&tenant).await?;

            match self.store.find_one(&RecordFilter::tenant(tenant.clone())).await {
                Ok(_) => {
                    self.clear_revocation(&tenant).await;
                    report.superseded += 1;
                    continue;
                }
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }

            let result = self
                .provision(
                    "revoke_login",
                    self.provisioner
                        .revoke_login(tenant.as_str(), &pending.username),
                )
                .await;
            match result {
                Ok(()) | Err(ProvisionError::NotFound(_)) => {
                    self.clear_revocation(&tenant).await;
                    report.revoked += 1;
                    tracing::info!(tenant = %tenant, "pending revocation completed");
                }
                Err(e) => {
                    tracing::warn!(tenant = %tenant, error = %e, "pending revocation failed again");
                    self.queue_revocation(&tenant, &pending.username, &e).await;
                }
            }
        }

        report.remaining = self.backlog.len();
        Ok(report)
    }

    /// Drop idle entries from the lock registry
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }

    /// Reload revocations journaled by a previous run into the backlog
    pub async fn restore_backlog(&self) -> Result<usize, StoreError> {
        let pending = self.store.pending_revocations().await?;
        for (tenant, username) in &pending {
            self.backlog.restore(tenant.clone(), username);
        }
        if !pending.is_empty() {
            tracing::info!(pending = pending.len(), "restored pending revocations");
        }
        Ok(pending.len())
    }

    async fn queue_revocation(&self, tenant: &TenantName, username: &str, error: &ProvisionError) {
        self.backlog.push(tenant.clone(), username, &error.to_string());
        if let Err(e) = self.store.queue_revocation(tenant, username).await {
            tracing::error!(
                tenant = %tenant,
                username,
                error = %e,
                "pending revocation not journaled; it is lost on restart"
            );
        }
    }

    /// Drop the tenant's pending revocation. Returns whether one existed.
    async fn clear_revocation(&self, tenant: &TenantName) -> bool {
        let queued = self.backlog.discard(tenant);
        match self.store.clear_revocation(tenant).await {
            Ok(journaled) => queued || journaled,
            Err(e) => {
                // A stale entry is harmless: the sweep skips bound tenants
                tracing::warn!(tenant = %tenant, error = %e, "clearing journaled revocation failed");
                queued
            }
        }
    }

    /// Validate a tenant name and reject reserved ones
    fn admit(&self, tenant: &str) -> Result<TenantName, BrokerError> {
        let tenant = TenantName::new(tenant)?;
        if self.config.reserved.contains(tenant.as_str()) {
            tracing::warn!(tenant = %tenant, "rejected reserved tenant name");
            return Err(BrokerError::ReservedName(tenant.to_string()));
        }
        Ok(tenant)
    }

    async fn lock(&self, tenant: &TenantName) -> Result<TenantGuard, BrokerError> {
        Ok(self
            .locks
            .acquire_timeout(tenant.as_str(), self.config.lock_timeout)
            .await?)
    }

    /// Bound a provisioner call by the configured timeout
    async fn provision<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, ProvisionError>>,
    ) -> Result<T, ProvisionError> {
        let timeout = self.config.provision_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProvisionError::Timeout { operation, timeout }),
        }
    }

    fn describe(&self, record: &BindRecord) -> ConnectionDescriptor {
        ConnectionDescriptor {
            scheme: self.config.scheme.clone(),
            hosts: self.config.hosts.clone(),
            username: record.username.clone(),
            password: record.password.clone(),
            database: record.tenant.to_string(),
            replica_set: self.config.replica_set.clone(),
        }
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
