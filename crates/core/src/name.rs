// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validated names for tenants and consumers

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest tenant name accepted (database identifier limit)
pub const MAX_TENANT_LEN: usize = 63;

/// Longest consumer identifier accepted (hostname limit)
pub const MAX_CONSUMER_LEN: usize = 255;

/// Errors from name validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {kind} '{name}': {reason}")]
    Invalid {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },
}

/// Name of the logical database a bind record is scoped to
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantName(String);

impl TenantName {
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        let invalid = |reason| NameError::Invalid {
            kind: "tenant",
            name: name.clone(),
            reason,
        };

        let Some(first) = name.chars().next() else {
            return Err(NameError::Missing("tenant"));
        };
        if name.len() > MAX_TENANT_LEN {
            return Err(invalid("longer than 63 bytes"));
        }
        if !first.is_ascii_alphabetic() {
            return Err(invalid("must start with a letter"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("only letters, digits, '_' and '-' are allowed"));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TenantName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantName> for String {
    fn from(name: TenantName) -> Self {
        name.0
    }
}

/// Identifies the application instance holding a bind (usually a unit host)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConsumerId(String);

impl ConsumerId {
    pub fn new(id: impl Into<String>) -> Result<Self, NameError> {
        let id = id.into();
        if id.is_empty() {
            return Err(NameError::Missing("consumer"));
        }
        if id.len() > MAX_CONSUMER_LEN {
            return Err(NameError::Invalid {
                kind: "consumer",
                name: id,
                reason: "longer than 255 bytes",
            });
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(NameError::Invalid {
                kind: "consumer",
                name: id,
                reason: "must not contain whitespace",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ConsumerId {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConsumerId> for String {
    fn from(id: ConsumerId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[path = "name_tests.rs"]
mod tests;
