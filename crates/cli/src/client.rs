// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use cb_daemon::config::Config;
use cb_daemon::protocol::{self, ProtocolError};
use cb_daemon::{Request, Response};
use cb_engine::{BrokerConfig, ErrorKind, StatusReport, UnbindOutcome};
use thiserror::Error;
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Slack on top of the daemon's worst case for framing and scheduling
const IPC_MARGIN: Duration = Duration::from_secs(5);

/// Timeout for one request/response exchange.
///
/// `CB_TIMEOUT_IPC_MS` wins. Otherwise the daemon's longest request under the
/// shared config, plus a margin, so the daemon reports its own timeouts
/// before the client gives up.
pub fn timeout_ipc() -> Duration {
    let broker = Config::load(None)
        .map(|config| config.broker_config())
        .unwrap_or_default();
    resolve_timeout_ipc(parse_duration_ms("CB_TIMEOUT_IPC_MS"), &broker)
}

fn resolve_timeout_ipc(overridden: Option<Duration>, broker: &BrokerConfig) -> Duration {
    overridden.unwrap_or_else(|| broker.max_request_time() + IPC_MARGIN)
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running (no socket at {0})")]
    DaemonNotRunning(PathBuf),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{message}")]
    Rejected { kind: ErrorKind, message: String },

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to an existing daemon
    pub fn connect(socket_path: PathBuf) -> Result<Self, ClientError> {
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(socket_path));
        }
        Ok(Self { socket_path })
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let timeout = timeout_ipc();
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(&request)?;
        tokio::time::timeout(timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes = tokio::time::timeout(timeout, protocol::read_message(&mut reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        match protocol::decode(&response_bytes)? {
            Response::Error { kind, message } => Err(ClientError::Rejected { kind, message }),
            response => Ok(response),
        }
    }

    pub async fn hello(&self) -> Result<String, ClientError> {
        let request = Request::Hello {
            version: protocol::PROTOCOL_VERSION.to_string(),
        };
        match self.send(request).await? {
            Response::Hello { version } => Ok(version),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(Request::Ping).await? {
            Response::Pong => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn create(&self, tenant: &str) -> Result<(), ClientError> {
        let request = Request::Create {
            tenant: tenant.to_string(),
        };
        match self.send(request).await? {
            Response::Created { .. } => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Bind `consumer` to `tenant`, returning the connection settings
    pub async fn bind(
        &self,
        tenant: &str,
        consumer: &str,
    ) -> Result<BTreeMap<String, String>, ClientError> {
        let request = Request::Bind {
            tenant: tenant.to_string(),
            consumer: consumer.to_string(),
        };
        match self.send(request).await? {
            Response::Bound { env } => Ok(env),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn unbind(&self, tenant: &str, consumer: &str) -> Result<UnbindOutcome, ClientError> {
        let request = Request::Unbind {
            tenant: tenant.to_string(),
            consumer: consumer.to_string(),
        };
        match self.send(request).await? {
            Response::Unbound { outcome } => Ok(outcome),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Remove `tenant`, returning how many records were purged
    pub async fn remove(&self, tenant: &str) -> Result<usize, ClientError> {
        let request = Request::Remove {
            tenant: tenant.to_string(),
        };
        match self.send(request).await? {
            Response::Removed { purged, .. } => Ok(purged),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn status(&self, tenant: Option<&str>) -> Result<(u64, StatusReport), ClientError> {
        let request = Request::Status {
            tenant: tenant.map(String::from),
        };
        match self.send(request).await? {
            Response::Status {
                uptime_secs,
                report,
            } => Ok((uptime_secs, report)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::ShuttingDown => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
