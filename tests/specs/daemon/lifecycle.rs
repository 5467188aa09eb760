//! Daemon startup and shutdown

use crate::prelude::*;

#[test]
fn daemon_answers_ping() {
    let daemon = Daemon::start();
    daemon.cb().args(&["ping"]).passes().stdout_has("is running");
}

#[test]
fn startup_writes_marker_and_pid() {
    let daemon = Daemon::start();
    assert!(daemon.log().contains("--- cbd: starting (pid: "));
    let pid = std::fs::read_to_string(daemon.state_path().join("cbd.pid")).unwrap();
    assert!(pid.trim().parse::<u32>().is_ok(), "pid file: {pid:?}");
}

#[test]
fn second_daemon_is_refused() {
    let daemon = Daemon::start();
    let output = daemon.cbd_command().output().unwrap();
    assert!(!output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("READY"));

    // The first daemon keeps its socket
    daemon.cb().args(&["ping"]).passes();
}

#[test]
fn shutdown_removes_socket_and_pid() {
    let mut daemon = Daemon::start();
    daemon.cb().args(&["shutdown"]).passes().stdout_has("stopping");
    assert!(daemon.wait_exit(), "daemon did not exit");
    assert!(!daemon.socket_path().exists());
    assert!(!daemon.state_path().join("cbd.pid").exists());
}

#[test]
fn invalid_engine_env_fails_startup() {
    let daemon = Daemon::start();
    let output = daemon
        .cbd_command()
        .env("CB_ENGINE", "mongo")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("CB_ENGINE"));
}
