// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PostgreSQL engine adapter
//!
//! Logins are cluster roles named after the tenant; each tenant gets one
//! database of the same name. A read-write role owns its database, a
//! read-only role gets `SELECT` inside the `public` schema. Roles live as long
//! as their database: revoking a login while the database exists disables
//! it, and the role is dropped once the database is gone.
//!
//! DDL cannot take bind parameters, so names and passwords are quoted here
//! before being spliced into statements.

use super::{Permission, ProvisionError, Provisioner};
use crate::pool::{AdminPool, Connector, PoolError};
use async_trait::async_trait;
use cb_core::Password;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Opens administrative connections from a `postgres://` URL
pub struct PgConnector {
    url: String,
}

impl PgConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Conn = Mutex<PgConnection>;

    async fn connect(&self) -> Result<Self::Conn, PoolError> {
        let conn = PgConnection::connect(&self.url)
            .await
            .map_err(|e| PoolError::Connect(e.to_string()))?;
        Ok(Mutex::new(conn))
    }

    async fn probe(&self, conn: &Self::Conn) -> bool {
        conn.lock().await.ping().await.is_ok()
    }
}

impl From<PoolError> for ProvisionError {
    fn from(e: PoolError) -> Self {
        ProvisionError::Connection(e.to_string())
    }
}

/// Provisioner backed by a live PostgreSQL cluster
#[derive(Clone)]
pub struct PostgresProvisioner {
    url: String,
    pool: Arc<AdminPool<PgConnector>>,
}

impl PostgresProvisioner {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        let url = url.into();
        Self {
            pool: Arc::new(AdminPool::new(PgConnector::new(url.clone()), connect_timeout)),
            url,
        }
    }

    /// Run a statement that returns no rows
    async fn execute(&self, sql: &str) -> Result<(), ProvisionError> {
        let lease = self.pool.acquire().await?;
        let mut conn = lease.lock().await;
        sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    /// Run a single-value boolean query with one text parameter
    async fn check(&self, sql: &str, arg: &str) -> Result<bool, ProvisionError> {
        let lease = self.pool.acquire().await?;
        let mut conn = lease.lock().await;
        sqlx::query_scalar::<_, bool>(sql)
            .bind(arg)
            .fetch_one(&mut *conn)
            .await
            .map_err(map_sqlx)
    }

    /// Run statements inside `database` over a one-off connection.
    ///
    /// Schema grants only reach objects of the database they run in, so they
    /// cannot go through the admin pool.
    async fn execute_in(&self, database: &str, statements: &[String]) -> Result<(), ProvisionError> {
        let options = PgConnectOptions::from_str(&self.url)
            .map_err(map_sqlx)?
            .database(database);
        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(map_sqlx)?;
        for sql in statements {
            if let Err(e) = sqlx::query(sql).execute(&mut conn).await {
                let _ = conn.close().await;
                return Err(map_sqlx(e));
            }
        }
        conn.close().await.map_err(map_sqlx)
    }

    async fn database_exists(&self, database: &str) -> Result<bool, ProvisionError> {
        self.check(
            "SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)",
            database,
        )
        .await
    }

    /// Whether the role exists, enabled or not
    async fn role_exists(&self, username: &str) -> Result<bool, ProvisionError> {
        self.check(
            "SELECT EXISTS(SELECT 1 FROM pg_roles WHERE rolname = $1)",
            username,
        )
        .await
    }

    async fn can_login(&self, username: &str) -> Result<bool, ProvisionError> {
        self.check(
            "SELECT EXISTS(SELECT 1 FROM pg_roles WHERE rolname = $1 AND rolcanlogin)",
            username,
        )
        .await
    }

    /// Close every session the role still holds
    async fn terminate_sessions(&self, username: &str) -> Result<(), ProvisionError> {
        let lease = self.pool.acquire().await?;
        let mut conn = lease.lock().await;
        sqlx::query("SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE usename = $1")
            .bind(username)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl Provisioner for PostgresProvisioner {
    async fn create_login(
        &self,
        database: &str,
        username: &str,
        password: &Password,
        permission: Permission,
    ) -> Result<(), ProvisionError> {
        self.create_database(database).await?;

        let exists = self.role_exists(username).await?;
        self.execute(&upsert_role(username, password, exists)).await?;
        for sql in database_grants(database, username, permission) {
            self.execute(&sql).await?;
        }
        let schema = schema_grants(username, permission);
        if !schema.is_empty() {
            self.execute_in(database, &schema).await?;
        }
        Ok(())
    }

    async fn revoke_login(&self, database: &str, username: &str) -> Result<(), ProvisionError> {
        if !self.role_exists(username).await? {
            return Err(ProvisionError::NotFound(format!("role {username}")));
        }
        if self.database_exists(database).await? {
            self.execute(&disable_role(username)).await?;
            return self.terminate_sessions(username).await;
        }
        for sql in drop_role(username) {
            self.execute(&sql).await?;
        }
        Ok(())
    }

    async fn create_database(&self, database: &str) -> Result<(), ProvisionError> {
        if self.database_exists(database).await? {
            return Ok(());
        }
        self.execute(&format!("CREATE DATABASE {}", quote_ident(database)))
            .await
    }

    async fn drop_database(&self, database: &str) -> Result<(), ProvisionError> {
        self.execute(&format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE)",
            quote_ident(database)
        ))
        .await
    }

    async fn login_exists(&self, database: &str, username: &str) -> Result<bool, ProvisionError> {
        if !self.can_login(username).await? || !self.database_exists(database).await? {
            return Ok(false);
        }
        let lease = self.pool.acquire().await?;
        let mut conn = lease.lock().await;
        sqlx::query_scalar::<_, bool>("SELECT has_database_privilege($1, $2, 'CONNECT')")
            .bind(username)
            .bind(database)
            .fetch_one(&mut *conn)
            .await
            .map_err(map_sqlx)
    }

    async fn ping(&self) -> Result<(), ProvisionError> {
        self.execute("SELECT 1").await
    }
}

fn upsert_role(username: &str, password: &Password, exists: bool) -> String {
    let verb = if exists { "ALTER" } else { "CREATE" };
    format!(
        "{verb} ROLE {} WITH LOGIN PASSWORD {}",
        quote_ident(username),
        quote_literal(password.expose())
    )
}

/// Cluster-level statements giving `username` its access to `database`
fn database_grants(database: &str, username: &str, permission: Permission) -> Vec<String> {
    let (db, role) = (quote_ident(database), quote_ident(username));
    match permission {
        Permission::ReadWrite => vec![
            format!("ALTER DATABASE {db} OWNER TO {role}"),
            format!("GRANT ALL PRIVILEGES ON DATABASE {db} TO {role}"),
        ],
        Permission::ReadOnly => vec![format!("GRANT CONNECT ON DATABASE {db} TO {role}")],
    }
}

/// Statements run inside the tenant database. Owners need none.
fn schema_grants(username: &str, permission: Permission) -> Vec<String> {
    let role = quote_ident(username);
    match permission {
        Permission::ReadWrite => Vec::new(),
        Permission::ReadOnly => vec![
            format!("GRANT USAGE ON SCHEMA public TO {role}"),
            format!("GRANT SELECT ON ALL TABLES IN SCHEMA public TO {role}"),
            format!("ALTER DEFAULT PRIVILEGES IN SCHEMA public GRANT SELECT ON TABLES TO {role}"),
        ],
    }
}

fn disable_role(username: &str) -> String {
    format!("ALTER ROLE {} WITH NOLOGIN PASSWORD NULL", quote_ident(username))
}

fn drop_role(username: &str) -> Vec<String> {
    let role = quote_ident(username);
    vec![format!("DROP OWNED BY {role}"), format!("DROP ROLE {role}")]
}

/// Quote an identifier for inclusion in a statement
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal for inclusion in a statement
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn map_sqlx(e: sqlx::Error) -> ProvisionError {
    match e {
        sqlx::Error::Database(db) => ProvisionError::Rejected(db.message().to_string()),
        sqlx::Error::RowNotFound => ProvisionError::NotFound("row".to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => ProvisionError::Connection(e.to_string()),
        other => ProvisionError::Rejected(other.to_string()),
    }
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod tests;
