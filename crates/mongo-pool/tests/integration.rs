//! Pool integration tests.
//!
//! These tests require a running MongoDB instance. They are ignored by default
//! and can be run with:
//!
//! ```bash
//! # Point the tests at a server (defaults to localhost)
//! export MONGODB_URI=mongodb://localhost:27017
//!
//! # Run integration tests
//! cargo test -p mongo-pool --test integration -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use mongodb::bson::{Document, doc};
use mongo_pool::{Pool, PoolConfig, PoolError};

/// Helper to get test configuration from environment variables.
fn get_test_config(pool_size: usize) -> PoolConfig {
    PoolConfig::from_env()
        .pool_size(pool_size)
        .connect_timeout(Duration::from_secs(5))
}

/// Database name unique to this test process.
fn test_db(name: &str) -> String {
    format!("mongo_pool_{name}_{}", std::process::id())
}

async fn drop_db(pool: &Pool, db: &str) {
    let client = pool.acquire().await.expect("Failed to acquire");
    client.database(db).drop().await.expect("Failed to drop database");
}

// =============================================================================
// Basic Pool Tests
// =============================================================================

#[tokio::test]
#[ignore = "Requires MongoDB"]
async fn test_pool_open_and_close() {
    let pool = Pool::open(get_test_config(5))
        .await
        .expect("Failed to open pool");

    assert!(!pool.is_closed());
    let status = pool.status();
    assert_eq!(status.size, 5);
    assert_eq!(status.in_use, 0);

    pool.close().await;
    assert!(pool.is_closed());
    assert!(matches!(pool.acquire().await, Err(PoolError::PoolClosed)));
}

#[tokio::test]
#[ignore = "Requires MongoDB"]
async fn test_acquired_client_talks_to_server() {
    let pool = Pool::open(get_test_config(2))
        .await
        .expect("Failed to open pool");

    {
        let client = pool.acquire().await.expect("Failed to acquire");
        let reply = client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .expect("Ping failed");
        assert!(reply.contains_key("ok"));
        assert_eq!(pool.status().in_use, 1);
    }

    assert_eq!(pool.status().in_use, 0);
    assert_eq!(pool.metrics().probes_failed, 0);
    pool.close().await;
}

// =============================================================================
// Counters
// =============================================================================

#[tokio::test]
#[ignore = "Requires MongoDB"]
async fn test_counter_sequence() {
    let pool = Pool::open(get_test_config(4))
        .await
        .expect("Failed to open pool");
    let db = test_db("counter");

    pool.ensure_counter(&db, "counters", "test").await.unwrap();
    pool.ensure_counter(&db, "counters", "test").await.unwrap();

    let mut values = Vec::new();
    for _ in 0..3 {
        values.push(pool.next_seq(&db, "counters", "test").await.unwrap());
    }
    assert_eq!(values, vec![1, 2, 3]);

    let err = pool.next_seq(&db, "counters", "missing").await.unwrap_err();
    assert!(matches!(err, PoolError::CounterNotFound { .. }));

    drop_db(&pool, &db).await;
    pool.close().await;
}

#[tokio::test]
#[ignore = "Requires MongoDB"]
async fn test_concurrent_counter_values_are_unique() {
    let pool = Arc::new(
        Pool::open(get_test_config(4))
            .await
            .expect("Failed to open pool"),
    );
    let db = test_db("concurrent");
    pool.ensure_counter(&db, "counters", "shared").await.unwrap();

    let success_count = Arc::new(AtomicU32::new(0));
    let mut handles = Vec::new();
    for _ in 0..20 {
        let pool = Arc::clone(&pool);
        let db = db.clone();
        let success_count = Arc::clone(&success_count);
        handles.push(tokio::spawn(async move {
            let value = pool.next_seq(&db, "counters", "shared").await.unwrap();
            success_count.fetch_add(1, Ordering::Relaxed);
            value
        }));
    }

    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.expect("Task panicked"));
    }
    values.sort_unstable();

    assert_eq!(success_count.load(Ordering::Relaxed), 20);
    assert_eq!(values, (1..=20).collect::<Vec<i64>>());

    drop_db(&pool, &db).await;
    pool.close().await;
}

// =============================================================================
// Indexes
// =============================================================================

#[tokio::test]
#[ignore = "Requires MongoDB"]
async fn test_unique_sparse_index() {
    let pool = Pool::open(get_test_config(2))
        .await
        .expect("Failed to open pool");
    let db = test_db("index");

    pool.ensure_unique_index(&db, "items", &["key1"]).await.unwrap();
    pool.ensure_unique_index(&db, "items", &["key1"]).await.unwrap();

    {
        let client = pool.acquire().await.unwrap();
        let items = client.database(&db).collection::<Document>("items");
        items.insert_one(doc! { "key1": "a" }).await.unwrap();
        // Sparse: documents without the field do not collide.
        items.insert_one(doc! { "other": 1 }).await.unwrap();
        items.insert_one(doc! { "other": 2 }).await.unwrap();
        let err = items.insert_one(doc! { "key1": "a" }).await.unwrap_err();
        assert!(mongo_pool::mongo::is_duplicate_key(&err));
    }

    let err = pool
        .ensure_index(&db, "items", &["key1"], false)
        .await
        .unwrap_err();
    assert!(err.is_store());

    drop_db(&pool, &db).await;
    pool.close().await;
}
