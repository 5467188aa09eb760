// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: optional TOML file, then environment overrides.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cb_adapters::Permission;
use cb_engine::BrokerConfig;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the config file
pub const ENV_CONFIG: &str = "CB_CONFIG";
pub const ENV_STATE_DIR: &str = "CB_STATE_DIR";
pub const ENV_SOCKET_PATH: &str = "CB_SOCKET_PATH";
pub const ENV_PUBLIC_HOSTS: &str = "CB_PUBLIC_HOSTS";
pub const ENV_REPLICA_SET: &str = "CB_REPLICA_SET";
pub const ENV_ADMIN_URL: &str = "CB_ADMIN_URL";
pub const ENV_ENGINE: &str = "CB_ENGINE";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("could not determine state directory")]
    NoStateDir,

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
}

/// Which engine the daemon provisions against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Postgres,
    /// In-process engine; nothing survives a restart
    Memory,
}

impl std::str::FromStr for EngineKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(EngineKind::Postgres),
            "memory" => Ok(EngineKind::Memory),
            _ => Err(()),
        }
    }
}

/// `[broker]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerSection {
    pub reserved: Vec<String>,
    pub scheme: String,
    pub public_hosts: Vec<String>,
    pub replica_set: Option<String>,
    pub permission: Permission,
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub provision_timeout: Duration,
}

impl Default for BrokerSection {
    fn default() -> Self {
        let defaults = BrokerConfig::default();
        Self {
            reserved: defaults.reserved.into_iter().collect(),
            scheme: defaults.scheme,
            public_hosts: defaults.hosts,
            replica_set: defaults.replica_set,
            permission: defaults.permission,
            lock_timeout: defaults.lock_timeout,
            provision_timeout: defaults.provision_timeout,
        }
    }
}

/// `[engine]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub kind: EngineKind,
    pub admin_url: String,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            kind: EngineKind::Postgres,
            admin_url: "postgres://postgres@127.0.0.1:5432/postgres".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// `[maintenance]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaintenanceSection {
    /// How often queued revocations are retried and idle locks pruned
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for MaintenanceSection {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Config file contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub state_dir: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    pub broker: BrokerSection,
    pub engine: EngineSection,
    pub maintenance: MaintenanceSection,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Fully resolved daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the record WAL
    pub wal_path: PathBuf,
    pub broker: BrokerSection,
    pub engine: EngineSection,
    pub maintenance: MaintenanceSection,
}

impl Config {
    /// Load from `path` (or `$CB_CONFIG`) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(ENV_CONFIG).map(PathBuf::from));
        let file = match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::Read(path.clone(), e))?;
                FileConfig::parse(&content)?
            }
            None => FileConfig::default(),
        };
        Self::resolve(file, |var| std::env::var(var).ok())
    }

    /// Apply environment overrides from `env` on top of `file`
    pub fn resolve(
        mut file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(hosts) = env(ENV_PUBLIC_HOSTS) {
            file.broker.public_hosts = split_list(&hosts);
            if file.broker.public_hosts.is_empty() {
                return Err(ConfigError::InvalidEnv {
                    var: ENV_PUBLIC_HOSTS,
                    value: hosts,
                });
            }
        }
        if let Some(rs) = env(ENV_REPLICA_SET) {
            file.broker.replica_set = Some(rs).filter(|s| !s.is_empty());
        }
        if let Some(url) = env(ENV_ADMIN_URL) {
            file.engine.admin_url = url;
        }
        if let Some(kind) = env(ENV_ENGINE) {
            file.engine.kind = kind.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_ENGINE,
                value: kind.clone(),
            })?;
        }

        for (field, value) in [
            ("broker.lock_timeout", file.broker.lock_timeout),
            ("broker.provision_timeout", file.broker.provision_timeout),
            ("engine.connect_timeout", file.engine.connect_timeout),
            ("maintenance.sweep_interval", file.maintenance.sweep_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }

        let state_dir = match env(ENV_STATE_DIR).map(PathBuf::from).or(file.state_dir) {
            Some(dir) => dir,
            None => default_state_dir(&env)?,
        };
        let socket_path = env(ENV_SOCKET_PATH)
            .map(PathBuf::from)
            .or(file.socket_path)
            .unwrap_or_else(|| state_dir.join("cbd.sock"));

        Ok(Self {
            socket_path,
            lock_path: state_dir.join("cbd.pid"),
            log_path: state_dir.join("cbd.log"),
            wal_path: state_dir.join("wal").join("records.wal"),
            state_dir,
            broker: file.broker,
            engine: file.engine,
            maintenance: file.maintenance,
        })
    }

    /// Settings handed to the broker.
    ///
    /// The database the admin URL connects to is always reserved.
    pub fn broker_config(&self) -> BrokerConfig {
        let mut reserved = self.broker.reserved.iter().cloned().collect::<BTreeSet<_>>();
        if let Some(database) = admin_database(&self.engine.admin_url) {
            reserved.insert(database);
        }
        BrokerConfig {
            reserved,
            scheme: self.broker.scheme.clone(),
            hosts: self.broker.public_hosts.clone(),
            replica_set: self.broker.replica_set.clone(),
            permission: self.broker.permission,
            lock_timeout: self.broker.lock_timeout,
            provision_timeout: self.broker.provision_timeout,
        }
    }
}

/// Socket path the CLI should use, without loading a config file
pub fn socket_path_from_env() -> Result<PathBuf, ConfigError> {
    Config::resolve(FileConfig::default(), |var| std::env::var(var).ok())
        .map(|config| config.socket_path)
}

/// Database named in a `postgres://user@host/db?opts` URL
fn admin_database(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let (_, path) = rest.split_once('/')?;
    let name = path.split(['?', '#']).next().unwrap_or_default();
    (!name.is_empty()).then(|| name.to_string())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `$XDG_STATE_HOME/cb`, falling back to the platform state directory
fn default_state_dir(env: &impl Fn(&str) -> Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(xdg) = env("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("cb"));
    }
    if let Some(dir) = dirs::state_dir() {
        return Ok(dir.join("cb"));
    }
    let home = env("HOME").ok_or(ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/cb"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
