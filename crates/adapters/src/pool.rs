// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared administrative connection with health-checked leases
//!
//! One connection is shared by every caller. Each `acquire()` probes it; a
//! failed probe replaces it. Replacement is serialized behind a write lock
//! and keyed by generation, so when many callers see the same dead
//! connection exactly one reconnects and the rest reuse its result.

use async_trait::async_trait;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from establishing the administrative connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
}

/// Opens and health-checks connections to the engine
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Send + Sync + 'static;

    async fn connect(&self) -> Result<Self::Conn, PoolError>;

    /// True when `conn` is still usable
    async fn probe(&self, conn: &Self::Conn) -> bool;
}

struct Slot<T> {
    conn: Arc<T>,
    generation: u64,
}

/// Connection handed to a caller. Released on drop.
pub struct Lease<T> {
    conn: Arc<T>,
    generation: u64,
}

impl<T> Lease<T> {
    /// Generation of the connection this lease refers to
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.conn
    }
}

/// Process-wide administrative connection
pub struct AdminPool<C: Connector> {
    connector: C,
    current: RwLock<Option<Slot<C::Conn>>>,
    connect_timeout: Duration,
    connects: AtomicU64,
}

impl<C: Connector> AdminPool<C> {
    /// Create a pool; the first connection is opened lazily
    pub fn new(connector: C, connect_timeout: Duration) -> Self {
        Self {
            connector,
            current: RwLock::new(None),
            connect_timeout,
            connects: AtomicU64::new(0),
        }
    }

    /// Number of connections opened so far
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Lease a connection that passed its health probe
    pub async fn acquire(&self) -> Result<Lease<C::Conn>, PoolError> {
        let snapshot = {
            let current = self.current.read().await;
            current.as_ref().map(|slot| Lease {
                conn: Arc::clone(&slot.conn),
                generation: slot.generation,
            })
        };

        match snapshot {
            Some(lease) if self.connector.probe(&lease.conn).await => Ok(lease),
            Some(lease) => {
                tracing::warn!(generation = lease.generation, "admin connection failed probe");
                self.replace(Some(lease.generation)).await
            }
            None => self.replace(None).await,
        }
    }

    /// Swap in a fresh connection unless someone already replaced `stale`
    async fn replace(&self, stale: Option<u64>) -> Result<Lease<C::Conn>, PoolError> {
        let mut current = self.current.write().await;

        if let Some(slot) = current.as_ref() {
            if Some(slot.generation) != stale {
                return Ok(Lease {
                    conn: Arc::clone(&slot.conn),
                    generation: slot.generation,
                });
            }
        }

        let conn = tokio::time::timeout(self.connect_timeout, self.connector.connect())
            .await
            .map_err(|_| PoolError::Timeout(self.connect_timeout))??;

        let generation = current.as_ref().map_or(1, |slot| slot.generation + 1);
        let conn = Arc::new(conn);
        *current = Some(Slot {
            conn: Arc::clone(&conn),
            generation,
        });
        self.connects.fetch_add(1, Ordering::SeqCst);
        tracing::info!(generation, "admin connection established");

        Ok(Lease { conn, generation })
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
