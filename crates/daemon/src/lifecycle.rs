// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use cb_adapters::{
    MemoryProvisioner, Permission, PostgresProvisioner, ProvisionError, Provisioner,
    TracedProvisioner,
};
use cb_core::{Password, RandomSecretGen};
use cb_engine::Broker;
use cb_storage::{CredentialStore, StateStore, StoreError};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::{Config, EngineKind};

/// Broker with the concrete types the daemon runs
pub type DaemonBroker = Broker<StateStore, TracedProvisioner<EngineProvisioner>, RandomSecretGen>;

/// The engine selected by configuration
#[derive(Clone)]
pub enum EngineProvisioner {
    Postgres(PostgresProvisioner),
    Memory(MemoryProvisioner),
}

impl EngineProvisioner {
    pub fn from_config(config: &Config) -> Self {
        match config.engine.kind {
            EngineKind::Postgres => EngineProvisioner::Postgres(PostgresProvisioner::new(
                config.engine.admin_url.clone(),
                config.engine.connect_timeout,
            )),
            EngineKind::Memory => EngineProvisioner::Memory(MemoryProvisioner::new()),
        }
    }
}

#[async_trait]
impl Provisioner for EngineProvisioner {
    async fn create_login(
        &self,
        database: &str,
        username: &str,
        password: &Password,
        permission: Permission,
    ) -> Result<(), ProvisionError> {
        match self {
            Self::Postgres(p) => p.create_login(database, username, password, permission).await,
            Self::Memory(p) => p.create_login(database, username, password, permission).await,
        }
    }

    async fn revoke_login(&self, database: &str, username: &str) -> Result<(), ProvisionError> {
        match self {
            Self::Postgres(p) => p.revoke_login(database, username).await,
            Self::Memory(p) => p.revoke_login(database, username).await,
        }
    }

    async fn create_database(&self, database: &str) -> Result<(), ProvisionError> {
        match self {
            Self::Postgres(p) => p.create_database(database).await,
            Self::Memory(p) => p.create_database(database).await,
        }
    }

    async fn drop_database(&self, database: &str) -> Result<(), ProvisionError> {
        match self {
            Self::Postgres(p) => p.drop_database(database).await,
            Self::Memory(p) => p.drop_database(database).await,
        }
    }

    async fn login_exists(&self, database: &str, username: &str) -> Result<bool, ProvisionError> {
        match self {
            Self::Postgres(p) => p.login_exists(database, username).await,
            Self::Memory(p) => p.login_exists(database, username).await,
        }
    }

    async fn ping(&self) -> Result<(), ProvisionError> {
        match self {
            Self::Postgres(p) => p.ping().await,
            Self::Memory(p) => p.ping().await,
        }
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    pub broker: Arc<DaemonBroker>,
    /// When daemon started
    pub start_time: Instant,
    /// Running maintenance pass, if any
    maintenance: Option<JoinHandle<()>>,
}

impl DaemonState {
    /// Start a maintenance pass in the background unless one is still
    /// running. Returns whether a pass was started.
    pub fn spawn_maintenance(&mut self) -> bool {
        if self.maintenance.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("previous maintenance pass still running; skipping tick");
            return false;
        }
        let broker = Arc::clone(&self.broker);
        self.maintenance = Some(tokio::spawn(async move { maintain(&broker).await }));
        true
    }

    /// Wait for the running maintenance pass to finish
    pub async fn finish_maintenance(&mut self) {
        if let Some(handle) = self.maintenance.take() {
            if let Err(e) = handle.await {
                error!("maintenance task failed: {}", e);
            }
        }
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        self.finish_maintenance().await;

        let pending = self.broker.backlog().len();
        if pending > 0 {
            warn!(pending, "exiting with unrevoked logins; they are retried on next start");
        }

        // Remove socket file
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Retry queued revocations and drop idle tenant locks
pub async fn maintain(broker: &DaemonBroker) {
    if !broker.backlog().is_empty() {
        match broker.sweep_revocations().await {
            Ok(report) => info!(
                revoked = report.revoked,
                superseded = report.superseded,
                remaining = report.remaining,
                "revocation sweep finished"
            ),
            Err(e) => warn!(error = %e, "revocation sweep failed"),
        }
    }
    let pruned = broker.prune_locks();
    if pruned > 0 {
        debug!(pruned, "pruned idle tenant locks");
    }
}

/// Wait for every in-flight connection task.
///
/// Each task serves one request whose engine calls are bounded by the broker
/// timeouts, so this finishes.
pub async fn drain_connections(connections: &mut JoinSet<()>) {
    if !connections.is_empty() {
        info!(in_flight = connections.len(), "waiting for in-flight requests");
    }
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            error!("connection task failed: {}", e);
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(std::path::PathBuf, std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // Another daemon owns these files
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory (needed for socket, lock, etc.)
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents races
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Load records from the WAL, then fold it down to one insert per record
    if let Some(parent) = config.wal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = StateStore::open(&config.wal_path)?;
    store.compact()?;
    let records = store.list().await?;
    info!("Loaded state: {} bound tenants", records.len());

    // 4. Set up the engine (wrapped with tracing for observability)
    let engine = EngineProvisioner::from_config(config);
    let provisioner = TracedProvisioner::new(engine);
    if let Err(e) = provisioner.ping().await {
        // The pool reconnects on demand, so an unreachable engine is not fatal
        warn!(error = %e, "engine not reachable at startup");
    }

    let broker = Broker::new(store, provisioner, RandomSecretGen, config.broker_config());
    broker.restore_backlog().await?;

    // 5. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!(
        engine = ?config.engine.kind,
        hosts = ?config.broker.public_hosts,
        "Daemon started"
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        broker: Arc::new(broker),
        start_time: Instant::now(),
        maintenance: None,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
