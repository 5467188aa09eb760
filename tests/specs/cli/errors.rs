//! CLI error reporting

use crate::prelude::*;

#[test]
fn commands_fail_when_daemon_not_running() {
    let dir = tempfile::TempDir::new().unwrap();
    CliBuilder::new(dir.path().join("cbd.sock"))
        .args(&["ping"])
        .fails()
        .stderr_has("Daemon not running");
}

#[test]
fn rejected_request_prints_reason() {
    let daemon = Daemon::start();
    daemon
        .cb()
        .args(&["bind", "postgres", "host-a"])
        .fails()
        .stderr_has("reserved");
}

#[test]
fn explicit_socket_flag_wins_over_env() {
    let daemon = Daemon::start();
    let socket = daemon.socket_path();
    CliBuilder::new("/nonexistent/cbd.sock".into())
        .args(&["--socket", socket.to_str().unwrap(), "ping"])
        .passes()
        .stdout_has("is running");
}
