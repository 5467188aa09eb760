// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cb_core::{ConsumerId, Password};

fn tenant(name: &str) -> TenantName {
    TenantName::new(name).unwrap()
}

fn consumer(id: &str) -> ConsumerId {
    ConsumerId::new(id).unwrap()
}

fn insert(name: &str, first: &str) -> Operation {
    Operation::RecordInsert {
        record: BindRecord::new(tenant(name), name, Password::new("pw"), consumer(first)),
    }
}

#[test]
fn apply_record_insert() {
    let mut state = MaterializedState::default();
    state.apply(&insert("app1", "host-a"));

    let record = state.get(&tenant("app1")).unwrap();
    assert_eq!(record.username, "app1");
    assert!(record.has_consumer(&consumer("host-a")));
}

#[test]
fn apply_consumer_lifecycle() {
    let mut state = MaterializedState::default();
    state.apply(&insert("app1", "host-a"));
    state.apply(&Operation::ConsumerAdd {
        tenant: tenant("app1"),
        consumer: consumer("host-b"),
    });
    assert_eq!(state.get(&tenant("app1")).unwrap().references(), 2);

    state.apply(&Operation::ConsumerRemove {
        tenant: tenant("app1"),
        consumer: consumer("host-a"),
    });
    let record = state.get(&tenant("app1")).unwrap();
    assert_eq!(
        record.consumers.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
        vec!["host-b"]
    );
}

#[test]
fn apply_record_delete() {
    let mut state = MaterializedState::default();
    state.apply(&insert("app1", "host-a"));
    state.apply(&Operation::RecordDelete {
        tenant: tenant("app1"),
    });

    assert!(state.records.is_empty());
}

#[test]
fn consumer_ops_for_missing_tenant_are_ignored() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::ConsumerAdd {
        tenant: tenant("ghost"),
        consumer: consumer("host-a"),
    });
    assert!(state.records.is_empty());
}

#[test]
fn to_ops_reproduces_state() {
    let mut state = MaterializedState::default();
    state.apply(&insert("app2", "host-a"));
    state.apply(&insert("app1", "host-b"));
    state.apply(&Operation::ConsumerAdd {
        tenant: tenant("app1"),
        consumer: consumer("host-c"),
    });

    let rebuilt = MaterializedState::from_ops(&state.to_ops());
    assert_eq!(rebuilt.records, state.records);
}

#[test]
fn revocation_queue_is_tracked_apart_from_records() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::RevocationQueued {
        tenant: tenant("app1"),
        username: "app1".to_string(),
    });
    assert!(state.records.is_empty());
    assert_eq!(state.revocations.get(&tenant("app1")).unwrap(), "app1");

    state.apply(&Operation::RevocationCleared {
        tenant: tenant("app1"),
    });
    assert!(state.revocations.is_empty());
}

#[test]
fn to_ops_keeps_queued_revocations() {
    let mut state = MaterializedState::default();
    state.apply(&insert("app1", "host-a"));
    state.apply(&Operation::RevocationQueued {
        tenant: tenant("app2"),
        username: "app2".to_string(),
    });

    let rebuilt = MaterializedState::from_ops(&state.to_ops());
    assert_eq!(rebuilt.records, state.records);
    assert_eq!(rebuilt.revocations, state.revocations);
}
