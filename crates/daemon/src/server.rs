// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::sync::Arc;
use std::time::Instant;

use cb_adapters::Provisioner;
use cb_core::SecretGen;
use cb_engine::{Broker, BrokerError};
use cb_storage::CredentialStore;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// What a connection task needs from the daemon
pub struct ServerContext<S, P, G> {
    pub broker: Arc<Broker<S, P, G>>,
    pub start_time: Instant,
    /// Signals the main loop to shut down
    pub shutdown: mpsc::Sender<()>,
}

impl<S, P, G> Clone for ServerContext<S, P, G> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            start_time: self.start_time,
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Handle a single client connection
pub async fn handle_connection<St, S, P, G>(
    ctx: ServerContext<S, P, G>,
    stream: St,
) -> Result<(), ServerError>
where
    St: AsyncRead + AsyncWrite + Unpin,
    S: CredentialStore,
    P: Provisioner,
    G: SecretGen,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    // Read request with timeout
    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    let response = handle_request(&ctx, request).await;

    // Bound responses carry secrets; log only the variant
    debug!(
        "Sending response: {}",
        match &response {
            Response::Bound { .. } => "Bound",
            Response::Error { .. } => "Error",
            _ => "Ok",
        }
    );

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
pub async fn handle_request<S, P, G>(ctx: &ServerContext<S, P, G>, request: Request) -> Response
where
    S: CredentialStore,
    P: Provisioner,
    G: SecretGen,
{
    let broker = &ctx.broker;
    let result = match request {
        Request::Ping => Ok(Response::Pong),

        Request::Hello { version: _ } => Ok(Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        }),

        Request::Create { tenant } => broker
            .create(&tenant)
            .await
            .map(|()| Response::Created { tenant }),

        Request::Bind { tenant, consumer } => broker
            .bind(&tenant, &consumer)
            .await
            .map(|desc| Response::Bound { env: desc.to_env() }),

        Request::Unbind { tenant, consumer } => broker
            .unbind(&tenant, &consumer)
            .await
            .map(|outcome| Response::Unbound { outcome }),

        Request::Remove { tenant } => broker
            .remove(&tenant)
            .await
            .map(|purged| Response::Removed { tenant, purged }),

        Request::Status { tenant } => {
            broker
                .status(tenant.as_deref())
                .await
                .map(|report| Response::Status {
                    uptime_secs: ctx.start_time.elapsed().as_secs(),
                    report,
                })
        }

        Request::Shutdown => {
            // A full channel means shutdown is already pending
            let _ = ctx.shutdown.try_send(());
            Ok(Response::ShuttingDown)
        }
    };

    result.unwrap_or_else(error_response)
}

fn error_response(e: BrokerError) -> Response {
    Response::Error {
        kind: e.kind(),
        message: e.to_string(),
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
