// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for daemon client behavior.

use super::*;
use tempfile::tempdir;
use tokio::net::UnixListener;

/// Serve one connection, replying with `response` regardless of the request
async fn serve_once(listener: UnixListener, response: Response) -> Request {
    let (stream, _) = listener.accept().await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    let request = protocol::read_request(&mut reader, protocol::DEFAULT_TIMEOUT)
        .await
        .unwrap();
    protocol::write_response(&mut writer, &response, protocol::DEFAULT_TIMEOUT)
        .await
        .unwrap();
    request
}

#[test]
fn connect_without_socket_is_not_running() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("cbd.sock");

    let result = DaemonClient::connect(socket.clone());

    assert!(matches!(result, Err(ClientError::DaemonNotRunning(path)) if path == socket));
}

#[tokio::test]
async fn bind_sends_request_and_returns_env() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("cbd.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let env = BTreeMap::from([("DATABASE_USER".to_string(), "app1".to_string())]);
    let server = tokio::spawn(serve_once(listener, Response::Bound { env: env.clone() }));

    let client = DaemonClient::connect(socket).unwrap();
    let got = client.bind("app1", "host-a").await.unwrap();

    assert_eq!(got, env);
    assert_eq!(
        server.await.unwrap(),
        Request::Bind {
            tenant: "app1".to_string(),
            consumer: "host-a".to_string()
        }
    );
}

#[tokio::test]
async fn error_response_becomes_rejected() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("cbd.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    tokio::spawn(serve_once(
        listener,
        Response::Error {
            kind: ErrorKind::Client,
            message: "not found: app1".to_string(),
        },
    ));

    let client = DaemonClient::connect(socket).unwrap();
    let result = client.unbind("app1", "host-a").await;

    assert!(matches!(
        result,
        Err(ClientError::Rejected { kind: ErrorKind::Client, ref message }) if message == "not found: app1"
    ));
}

#[tokio::test]
async fn mismatched_response_is_unexpected() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("cbd.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    tokio::spawn(serve_once(listener, Response::Pong));

    let client = DaemonClient::connect(socket).unwrap();
    let result = client.remove("app1").await;

    assert!(matches!(result, Err(ClientError::UnexpectedResponse)));
}

#[test]
fn ipc_timeout_outlasts_slowest_request() {
    let broker = BrokerConfig {
        lock_timeout: Duration::from_secs(30),
        provision_timeout: Duration::from_secs(30),
        ..BrokerConfig::default()
    };

    let timeout = resolve_timeout_ipc(None, &broker);

    // remove: lock wait, then drop_database, then revoke_login
    assert!(timeout > Duration::from_secs(90), "{timeout:?}");
}

#[test]
fn ipc_timeout_follows_broker_settings() {
    let broker = BrokerConfig {
        lock_timeout: Duration::from_secs(1),
        provision_timeout: Duration::from_secs(2),
        ..BrokerConfig::default()
    };
    assert_eq!(
        resolve_timeout_ipc(None, &broker),
        Duration::from_secs(5) + IPC_MARGIN
    );
}

#[test]
fn ipc_timeout_override_wins() {
    let broker = BrokerConfig::default();
    assert_eq!(
        resolve_timeout_ipc(Some(Duration::from_millis(250)), &broker),
        Duration::from_millis(250)
    );
}
