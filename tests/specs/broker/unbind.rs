//! Releasing consumers

use crate::prelude::*;

#[test]
fn unbind_one_of_two_consumers_keeps_login() {
    let daemon = Daemon::start();
    daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    daemon.cb().args(&["bind", "app1", "host-b"]).passes();

    daemon
        .cb()
        .args(&["unbind", "app1", "host-a"])
        .passes()
        .stdout_has("1 remaining");
    daemon
        .cb()
        .args(&["status", "app1"])
        .passes()
        .stdout_has("login: present")
        .stdout_has("consumers: host-b");
}

#[test]
fn unbind_last_consumer_revokes_login() {
    let daemon = Daemon::start();
    daemon.cb().args(&["bind", "app1", "host-a"]).passes();

    daemon
        .cb()
        .args(&["unbind", "app1", "host-a"])
        .passes()
        .stdout_has("login revoked");
    daemon
        .cb()
        .args(&["status", "app1"])
        .passes()
        .stdout_has("bound: false")
        .stdout_has("login: absent");
}

#[test]
fn unbind_unknown_consumer_is_not_found() {
    let daemon = Daemon::start();
    daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    daemon
        .cb()
        .args(&["unbind", "app1", "host-z"])
        .fails()
        .stderr_has("not found");
}

#[test]
fn second_unbind_is_not_found() {
    let daemon = Daemon::start();
    daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    daemon.cb().args(&["unbind", "app1", "host-a"]).passes();
    daemon
        .cb()
        .args(&["unbind", "app1", "host-a"])
        .fails()
        .stderr_has("not found");
}

#[test]
fn rebind_after_revoke_issues_new_password() {
    let daemon = Daemon::start();
    let first = daemon.cb().args(&["bind", "app1", "host-a"]).passes().env_lines();
    daemon.cb().args(&["unbind", "app1", "host-a"]).passes();
    let second = daemon.cb().args(&["bind", "app1", "host-a"]).passes().env_lines();
    assert_ne!(first["DATABASE_PASSWORD"], second["DATABASE_PASSWORD"]);
}
