//! Counter and index convenience tests against the in-memory connector.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;

use mongo_pool::{IndexSpec, Pool, PoolConfig, PoolError};
use mongo_pool_testing::MockConnector;

async fn open_pool(connector: &MockConnector, size: usize) -> Pool<MockConnector> {
    Pool::with_connector(PoolConfig::new().pool_size(size), connector.clone())
        .await
        .expect("Failed to open pool")
}

// =============================================================================
// Sequences
// =============================================================================

#[tokio::test]
async fn test_seeding_twice_then_counting_from_one() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 2).await;

    pool.ensure_counter("test", "counters", "test").await.unwrap();
    pool.ensure_counter("test", "counters", "test").await.unwrap();

    let mut values = Vec::new();
    for _ in 0..3 {
        values.push(pool.next_seq("test", "counters", "test").await.unwrap());
    }
    assert_eq!(values, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_reseeding_keeps_current_value() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 1).await;

    pool.ensure_counter("test", "counters", "orders").await.unwrap();
    assert_eq!(pool.next_seq("test", "counters", "orders").await.unwrap(), 1);

    pool.ensure_counter("test", "counters", "orders").await.unwrap();
    assert_eq!(pool.next_seq("test", "counters", "orders").await.unwrap(), 2);
    assert_eq!(connector.counter("test", "counters", "orders"), Some(2));
}

#[tokio::test]
async fn test_counters_are_independent() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 2).await;

    pool.ensure_counter("test", "counters", "a").await.unwrap();
    pool.ensure_counter("test", "counters", "b").await.unwrap();
    pool.ensure_counter("other", "counters", "a").await.unwrap();

    assert_eq!(pool.next_seq("test", "counters", "a").await.unwrap(), 1);
    assert_eq!(pool.next_seq("test", "counters", "a").await.unwrap(), 2);
    assert_eq!(pool.next_seq("test", "counters", "b").await.unwrap(), 1);
    assert_eq!(pool.next_seq("other", "counters", "a").await.unwrap(), 1);
}

#[tokio::test]
async fn test_next_seq_requires_seed() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 1).await;

    let err = pool.next_seq("test", "counters", "missing").await.unwrap_err();
    assert!(matches!(err, PoolError::CounterNotFound { ref id, .. } if id == "missing"));
    assert!(err.is_store());
    assert_eq!(pool.use_counts(), vec![0]);
}

#[tokio::test]
async fn test_removed_counter_is_not_found() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 1).await;

    pool.ensure_counter("test", "counters", "gone").await.unwrap();
    assert_eq!(pool.next_seq("test", "counters", "gone").await.unwrap(), 1);

    connector.remove_counter("test", "counters", "gone");
    let err = pool.next_seq("test", "counters", "gone").await.unwrap_err();
    assert!(matches!(err, PoolError::CounterNotFound { ref id, .. } if id == "gone"));

    // Seeding again restarts the sequence.
    pool.ensure_counter("test", "counters", "gone").await.unwrap();
    assert_eq!(pool.next_seq("test", "counters", "gone").await.unwrap(), 1);
}

#[tokio::test]
async fn test_store_failure_propagates_and_releases() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 1).await;
    pool.ensure_counter("test", "counters", "x").await.unwrap();

    // The only client is busy, so the next borrow shares it without a probe.
    let held = pool.acquire().await.unwrap();
    connector.sever(held.id());

    let err = pool.next_seq("test", "counters", "x").await.unwrap_err();
    assert!(matches!(err, PoolError::Store { operation: "next_seq", .. }));
    assert_eq!(held.use_count(), 1, "failed operation must return its borrow");

    let err = pool.ensure_counter("test", "counters", "y").await.unwrap_err();
    assert!(matches!(err, PoolError::Store { operation: "ensure_counter", .. }));
    assert_eq!(connector.counter("test", "counters", "y"), None);
}

#[tokio::test]
async fn test_unreachable_store_reports_connectivity() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 2).await;

    connector.sever_all();
    connector.refuse_connects(true);

    let err = pool.ensure_counter("test", "counters", "z").await.unwrap_err();
    assert!(err.is_connectivity());
    assert_eq!(pool.use_counts(), vec![0, 0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_next_seq_never_repeats() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 3).await;
    pool.ensure_counter("test", "counters", "shared").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..10 {
                seen.push(pool.next_seq("test", "counters", "shared").await.unwrap());
            }
            seen
        }));
    }

    let mut all = HashSet::new();
    for handle in handles {
        for value in handle.await.expect("Task panicked") {
            assert!(all.insert(value), "value {value} handed out twice");
        }
    }
    assert_eq!(all, (1..=100).collect::<HashSet<i64>>());
}

// =============================================================================
// Indexes
// =============================================================================

#[tokio::test]
async fn test_ensure_index_is_sparse_ascending_and_ordered() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 1).await;

    pool.ensure_index("test", "users", &["last", "first"], false)
        .await
        .unwrap();

    let indexes = connector.indexes("test", "users");
    assert_eq!(indexes, vec![IndexSpec::new(["last", "first"], false)]);
    assert!(indexes[0].sparse());
    assert_eq!(indexes[0].default_name(), "last_1_first_1");
}

#[tokio::test]
async fn test_ensure_index_twice_is_idempotent() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 2).await;

    pool.ensure_unique_index("test", "counters", &["key1"]).await.unwrap();
    pool.ensure_unique_index("test", "counters", &["key1"]).await.unwrap();

    assert_eq!(
        connector.indexes("test", "counters"),
        vec![IndexSpec::new(["key1"], true)]
    );
}

#[tokio::test]
async fn test_conflicting_index_definition_is_an_error() {
    let connector = MockConnector::new();
    let pool = open_pool(&connector, 1).await;

    pool.ensure_index("test", "users", &["email"], false).await.unwrap();
    let err = pool
        .ensure_unique_index("test", "users", &["email"])
        .await
        .unwrap_err();

    assert!(matches!(err, PoolError::Store { operation: "ensure_index", .. }));
    assert!(err.to_string().contains("different options"));
    assert_eq!(pool.use_counts(), vec![0]);
}
