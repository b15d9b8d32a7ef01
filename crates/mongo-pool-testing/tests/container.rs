//! End-to-end tests against a MongoDB container.
//!
//! Requires Docker:
//!
//! ```bash
//! cargo test -p mongo-pool-testing --test container -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mongo_pool::{Pool, PoolConfig};
use mongo_pool_testing::container::MONGO_PORT;
use mongo_pool_testing::{MongoContainer, TestFixture};
use testcontainers::runners::AsyncRunner;

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_pool_against_container() {
    let container = MongoContainer::default()
        .start()
        .await
        .expect("Failed to start MongoDB container");
    let port = container
        .get_host_port_ipv4(MONGO_PORT)
        .await
        .expect("Failed to resolve mapped port");

    let config = PoolConfig::new()
        .address(MongoContainer::uri("127.0.0.1", port))
        .pool_size(3);
    let pool = Pool::open(config).await.expect("Failed to open pool");
    let fixture = TestFixture::new("container").with_collection("counters");

    pool.ensure_counter(&fixture.namespace, "counters", "ids")
        .await
        .unwrap();
    assert_eq!(pool.next_seq(&fixture.namespace, "counters", "ids").await.unwrap(), 1);
    assert_eq!(pool.next_seq(&fixture.namespace, "counters", "ids").await.unwrap(), 2);

    pool.ensure_unique_index(&fixture.namespace, "counters", &["key1"])
        .await
        .unwrap();

    {
        let client = pool.acquire().await.unwrap();
        fixture.drop_database(&client).await.unwrap();
    }

    pool.close().await;
    assert_eq!(pool.metrics().outstanding(), 0);
}
