//! Records survive a daemon restart

use crate::prelude::*;
use similar_asserts::assert_eq;

#[test]
fn bound_credentials_survive_restart() {
    let mut daemon = Daemon::start();
    let first = daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    let first = first.env_lines();

    daemon.restart();

    let second = daemon.cb().args(&["bind", "app1", "host-b"]).passes();
    let second = second.env_lines();
    assert_eq!(first["DATABASE_PASSWORD"], second["DATABASE_PASSWORD"]);

    daemon
        .cb()
        .args(&["status", "app1"])
        .passes()
        .stdout_has("consumers: host-a, host-b");
}

#[test]
fn unbound_tenant_stays_unbound_after_restart() {
    let mut daemon = Daemon::start();
    daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    daemon.cb().args(&["unbind", "app1", "host-a"]).passes();

    daemon.restart();

    daemon
        .cb()
        .args(&["status"])
        .passes()
        .stdout_has("bound tenants: 0");
}
