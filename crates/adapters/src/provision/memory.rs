// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process database engine for development and black-box specs
//!
//! Mirrors the server-side model: roles are cluster-wide and outlive the
//! databases they were granted. Revoking a login while its database exists
//! only disables it, since the role still owns that database.

use super::{Permission, ProvisionError, Provisioner};
use async_trait::async_trait;
use cb_core::Password;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct Role {
    password: Option<Password>,
    can_login: bool,
    grants: BTreeMap<String, Permission>,
}

#[derive(Default)]
struct Cluster {
    databases: BTreeSet<String>,
    roles: HashMap<String, Role>,
}

impl Cluster {
    /// Role able to log in to `database`
    fn login(&self, database: &str, username: &str) -> Option<&Role> {
        if !self.databases.contains(database) {
            return None;
        }
        self.roles
            .get(username)
            .filter(|role| role.can_login && role.grants.contains_key(database))
    }
}

/// Engine that keeps databases and roles in memory
#[derive(Clone, Default)]
pub struct MemoryProvisioner {
    cluster: Arc<Mutex<Cluster>>,
}

impl MemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    fn cluster(&self) -> MutexGuard<'_, Cluster> {
        self.cluster.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether `username`/`password` would be accepted by `database`
    pub fn authenticate(&self, database: &str, username: &str, password: &str) -> bool {
        self.cluster()
            .login(database, username)
            .and_then(|role| role.password.as_ref())
            .is_some_and(|stored| stored.expose() == password)
    }

    /// Permission a live login holds on `database`
    pub fn permission(&self, database: &str, username: &str) -> Option<Permission> {
        let cluster = self.cluster();
        cluster
            .login(database, username)
            .and_then(|role| role.grants.get(database).copied())
    }

    /// Names of existing databases, sorted
    pub fn databases(&self) -> Vec<String> {
        self.cluster().databases.iter().cloned().collect()
    }

    /// Roles still allowed to log in
    pub fn login_count(&self) -> usize {
        self.cluster().roles.values().filter(|r| r.can_login).count()
    }

    /// Whether the role exists at all, enabled or not
    pub fn role_exists(&self, username: &str) -> bool {
        self.cluster().roles.contains_key(username)
    }
}

#[async_trait]
impl Provisioner for MemoryProvisioner {
    async fn create_login(
        &self,
        database: &str,
        username: &str,
        password: &Password,
        permission: Permission,
    ) -> Result<(), ProvisionError> {
        let mut cluster = self.cluster();
        cluster.databases.insert(database.to_string());
        let role = cluster
            .roles
            .entry(username.to_string())
            .or_insert_with(|| Role {
                password: None,
                can_login: false,
                grants: BTreeMap::new(),
            });
        role.password = Some(password.clone());
        role.can_login = true;
        role.grants.insert(database.to_string(), permission);
        Ok(())
    }

    async fn revoke_login(&self, database: &str, username: &str) -> Result<(), ProvisionError> {
        let mut cluster = self.cluster();
        if cluster.databases.contains(database) {
            let role = cluster
                .roles
                .get_mut(username)
                .ok_or_else(|| ProvisionError::NotFound(format!("role '{}'", username)))?;
            role.can_login = false;
            role.password = None;
            return Ok(());
        }
        cluster
            .roles
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| ProvisionError::NotFound(format!("role '{}'", username)))
    }

    async fn create_database(&self, database: &str) -> Result<(), ProvisionError> {
        self.cluster().databases.insert(database.to_string());
        Ok(())
    }

    async fn drop_database(&self, database: &str) -> Result<(), ProvisionError> {
        let mut cluster = self.cluster();
        cluster.databases.remove(database);
        for role in cluster.roles.values_mut() {
            role.grants.remove(database);
        }
        Ok(())
    }

    async fn login_exists(&self, database: &str, username: &str) -> Result<bool, ProvisionError> {
        Ok(self.cluster().login(database, username).is_some())
    }

    async fn ping(&self) -> Result<(), ProvisionError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
