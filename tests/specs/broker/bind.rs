//! Binding consumers to tenants

use crate::prelude::*;
use similar_asserts::assert_eq;

#[test]
fn bind_prints_connection_settings() {
    let daemon = Daemon::start();
    let run = daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    let env = run.env_lines();

    assert_eq!(env["DATABASE_USER"], "app1");
    assert_eq!(env["DATABASE_NAME"], "app1");
    assert_eq!(env["DATABASE_HOSTS"], "127.0.0.1:5432");
    assert!(!env["DATABASE_PASSWORD"].is_empty());
    assert_eq!(
        env["DATABASE_URL"],
        format!(
            "postgres://app1:{}@127.0.0.1:5432/app1",
            env["DATABASE_PASSWORD"]
        )
    );
    assert!(!env.contains_key("DATABASE_REPLICA_SET"));
}

#[test]
fn second_consumer_gets_same_credentials() {
    let daemon = Daemon::start();
    let a = daemon.cb().args(&["bind", "app1", "host-a"]).passes().env_lines();
    let b = daemon.cb().args(&["bind", "app1", "host-b"]).passes().env_lines();
    assert_eq!(a, b);
}

#[test]
fn rebinding_same_consumer_is_idempotent() {
    let daemon = Daemon::start();
    let a = daemon.cb().args(&["bind", "app1", "host-a"]).passes().env_lines();
    let b = daemon.cb().args(&["bind", "app1", "host-a"]).passes().env_lines();
    assert_eq!(a, b);

    daemon
        .cb()
        .args(&["status", "app1"])
        .passes()
        .stdout_has("consumers: host-a\n");
}

#[test]
fn tenants_get_distinct_passwords() {
    let daemon = Daemon::start();
    let a = daemon.cb().args(&["bind", "app1", "host-a"]).passes().env_lines();
    let b = daemon.cb().args(&["bind", "app2", "host-a"]).passes().env_lines();
    assert_ne!(a["DATABASE_PASSWORD"], b["DATABASE_PASSWORD"]);
    assert_eq!(b["DATABASE_USER"], "app2");
}

#[test]
fn bind_json_output() {
    let daemon = Daemon::start();
    let json = daemon
        .cb()
        .args(&["bind", "app1", "host-a", "--json"])
        .passes()
        .json();
    assert_eq!(json["DATABASE_NAME"], "app1");
    assert!(json["DATABASE_PASSWORD"].as_str().is_some());
}

#[test]
fn public_hosts_and_replica_set_come_from_env() {
    let daemon = Daemon::start_with(&[
        ("CB_PUBLIC_HOSTS", "db1:5432,db2:5432"),
        ("CB_REPLICA_SET", "rs0"),
    ]);
    let env = daemon.cb().args(&["bind", "app1", "host-a"]).passes().env_lines();
    assert_eq!(env["DATABASE_HOSTS"], "db1:5432,db2:5432");
    assert_eq!(env["DATABASE_REPLICA_SET"], "rs0");
    assert!(env["DATABASE_URL"].ends_with("@db1:5432,db2:5432/app1?replicaSet=rs0"));
}

#[test]
fn reserved_tenant_is_rejected() {
    let daemon = Daemon::start();
    daemon
        .cb()
        .args(&["bind", "admin", "host-a"])
        .fails()
        .stderr_has("tenant name 'admin' is reserved");
}

#[test]
fn empty_tenant_is_rejected() {
    let daemon = Daemon::start();
    daemon
        .cb()
        .args(&["bind", "", "host-a"])
        .fails()
        .stderr_has("missing tenant");
}

#[test]
fn create_reserves_tenant_before_bind() {
    let daemon = Daemon::start();
    daemon.cb().args(&["create", "app1"]).passes().stdout_has("Created app1");
    daemon.cb().args(&["bind", "app1", "host-a"]).passes();
    daemon.cb().args(&["create", "admin"]).fails().stderr_has("reserved");
}
