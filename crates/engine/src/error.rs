// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the bind orchestrator

use cb_adapters::ProvisionError;
use cb_core::{LockError, NameError};
use cb_storage::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who is at fault for a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The request itself was wrong; retrying it unchanged will fail again
    Client,
    /// The broker or one of its backends failed
    Server,
}

/// Errors that can occur while handling a broker operation
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("tenant name '{0}' is reserved")]
    ReservedName(String),
    #[error(transparent)]
    InvalidArgument(#[from] NameError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate record: {0}")]
    DuplicateKey(String),
    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
    #[error("store failed: {0}")]
    Store(StoreError),
    #[error(transparent)]
    LockTimeout(#[from] LockError),
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::ReservedName(_)
            | BrokerError::InvalidArgument(_)
            | BrokerError::NotFound(_) => ErrorKind::Client,
            BrokerError::DuplicateKey(_)
            | BrokerError::Provision(_)
            | BrokerError::Store(_)
            | BrokerError::LockTimeout(_) => ErrorKind::Server,
        }
    }
}

impl From<StoreError> for BrokerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => BrokerError::NotFound(what),
            StoreError::DuplicateKey(what) => BrokerError::DuplicateKey(what),
            other => BrokerError::Store(other),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
