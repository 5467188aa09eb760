//! Broker status reporting

use crate::prelude::*;

#[test]
fn status_on_fresh_daemon() {
    let daemon = Daemon::start();
    daemon
        .cb()
        .args(&["status"])
        .passes()
        .stdout_has("engine: ok")
        .stdout_has("bound tenants: 0")
        .stdout_has("revocation backlog: 0")
        .stdout_lacks("tenant:");
}

#[test]
fn status_counts_bound_tenants() {
    let daemon = Daemon::start();
    daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    daemon.cb().args(&["bind", "app2", "host-a"]).passes();
    daemon
        .cb()
        .args(&["status"])
        .passes()
        .stdout_has("bound tenants: 2");
}

#[test]
fn status_for_tenant_lists_consumers() {
    let daemon = Daemon::start();
    daemon.cb().args(&["bind", "app1", "host-b"]).passes();
    daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    daemon
        .cb()
        .args(&["status", "app1"])
        .passes()
        .stdout_has("tenant: app1")
        .stdout_has("bound: true")
        .stdout_has("consumers: host-a, host-b");
}
