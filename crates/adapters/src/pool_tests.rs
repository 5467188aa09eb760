// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

/// Connection whose health can be toggled by the test
struct FakeConn {
    id: u64,
    healthy: AtomicBool,
}

#[derive(Clone, Default)]
struct FakeConnector {
    opened: Arc<Mutex<Vec<Arc<FakeConn>>>>,
    refuse: Arc<AtomicBool>,
    connect_delay: Option<Duration>,
}

impl FakeConnector {
    fn kill_all(&self) {
        for conn in self.opened.lock().unwrap().iter() {
            conn.healthy.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Conn = Arc<FakeConn>;

    async fn connect(&self) -> Result<Self::Conn, PoolError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(PoolError::Connect("connection refused".to_string()));
        }
        let mut opened = self.opened.lock().unwrap();
        let conn = Arc::new(FakeConn {
            id: opened.len() as u64 + 1,
            healthy: AtomicBool::new(true),
        });
        opened.push(Arc::clone(&conn));
        Ok(conn)
    }

    async fn probe(&self, conn: &Self::Conn) -> bool {
        conn.healthy.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn first_acquire_connects_lazily() {
    let pool = AdminPool::new(FakeConnector::default(), Duration::from_secs(1));
    assert_eq!(pool.connects(), 0);

    let lease = pool.acquire().await.unwrap();
    assert_eq!(lease.generation(), 1);
    assert_eq!(lease.id, 1);
    assert_eq!(pool.connects(), 1);
}

#[tokio::test]
async fn healthy_connection_is_reused() {
    let pool = AdminPool::new(FakeConnector::default(), Duration::from_secs(1));
    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(pool.connects(), 1);
}

#[tokio::test]
async fn failed_probe_replaces_connection() {
    let connector = FakeConnector::default();
    let pool = AdminPool::new(connector.clone(), Duration::from_secs(1));
    pool.acquire().await.unwrap();

    connector.kill_all();
    let lease = pool.acquire().await.unwrap();

    assert_eq!(lease.generation(), 2);
    assert_eq!(lease.id, 2);
    assert!(lease.healthy.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_reconnect_once() {
    let connector = FakeConnector {
        connect_delay: Some(Duration::from_millis(20)),
        ..Default::default()
    };
    let pool = Arc::new(AdminPool::new(connector.clone(), Duration::from_secs(1)));
    pool.acquire().await.unwrap();
    connector.kill_all();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        tasks.push(tokio::spawn(async move {
            pool.acquire().await.unwrap().generation()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), 2);
    }
    assert_eq!(pool.connects(), 2);
}

#[tokio::test]
async fn connect_error_is_reported_and_retried_later() {
    let connector = FakeConnector::default();
    connector.refuse.store(true, Ordering::SeqCst);
    let pool = AdminPool::new(connector.clone(), Duration::from_secs(1));

    let result = pool.acquire().await;
    assert!(matches!(result, Err(PoolError::Connect(_))));

    connector.refuse.store(false, Ordering::SeqCst);
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test]
async fn slow_connect_times_out() {
    let connector = FakeConnector {
        connect_delay: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let pool = AdminPool::new(connector, Duration::from_millis(10));

    let result = pool.acquire().await;
    assert_eq!(result.err(), Some(PoolError::Timeout(Duration::from_millis(10))));
}
