// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor {
        scheme: "postgres".to_string(),
        hosts: vec!["db1:5432".to_string(), "db2:5432".to_string()],
        username: "app1".to_string(),
        password: Password::new("pw"),
        database: "app1".to_string(),
        replica_set: None,
    }
}

#[test]
fn connection_string_joins_hosts() {
    assert_eq!(
        descriptor().connection_string(),
        "postgres://app1:pw@db1:5432,db2:5432/app1"
    );
}

#[test]
fn connection_string_with_replica_set() {
    let mut d = descriptor();
    d.replica_set = Some("rs0".to_string());
    assert_eq!(
        d.connection_string(),
        "postgres://app1:pw@db1:5432,db2:5432/app1?replicaSet=rs0"
    );
}

#[test]
fn env_omits_replica_set_when_unset() {
    let env = descriptor().to_env();
    assert_eq!(env.len(), 5);
    assert_eq!(env[ENV_USER], "app1");
    assert_eq!(env[ENV_PASSWORD], "pw");
    assert_eq!(env[ENV_NAME], "app1");
    assert_eq!(env[ENV_HOSTS], "db1:5432,db2:5432");
    assert!(!env.contains_key(ENV_REPLICA_SET));
}

#[test]
fn env_includes_replica_set_when_set() {
    let mut d = descriptor();
    d.replica_set = Some("rs0".to_string());
    let env = d.to_env();
    assert_eq!(env[ENV_REPLICA_SET], "rs0");
    assert!(env[ENV_URL].ends_with("?replicaSet=rs0"));
}
