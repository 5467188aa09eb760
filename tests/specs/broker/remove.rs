//! Tearing tenants down

use crate::prelude::*;

#[test]
fn remove_purges_all_consumers() {
    let daemon = Daemon::start();
    daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    daemon.cb().args(&["bind", "app1", "host-b"]).passes();

    daemon
        .cb()
        .args(&["remove", "app1"])
        .passes()
        .stdout_has("Removed app1 (1 records purged)");
    daemon
        .cb()
        .args(&["status", "app1"])
        .passes()
        .stdout_has("bound: false")
        .stdout_has("login: absent")
        .stdout_lacks("consumers:");
}

#[test]
fn remove_unbound_tenant_succeeds() {
    let daemon = Daemon::start();
    daemon
        .cb()
        .args(&["remove", "app9"])
        .passes()
        .stdout_has("0 records purged");
}

#[test]
fn remove_reserved_tenant_is_rejected() {
    let daemon = Daemon::start();
    daemon
        .cb()
        .args(&["remove", "postgres"])
        .fails()
        .stderr_has("reserved");
}

#[test]
fn other_tenants_survive_remove() {
    let daemon = Daemon::start();
    daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    daemon.cb().args(&["bind", "app2", "host-a"]).passes();
    daemon.cb().args(&["remove", "app1"]).passes();
    daemon
        .cb()
        .args(&["status", "app2"])
        .passes()
        .stdout_has("bound: true")
        .stdout_has("login: present");
}
