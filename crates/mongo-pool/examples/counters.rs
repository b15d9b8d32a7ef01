//! Counter and index example.
//!
//! Seeds a counter, draws three values from it, and ensures a unique index.
//!
//! # Running
//!
//! ```bash
//! export MONGODB_URI=mongodb://localhost:27017
//!
//! cargo run --example counters
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use mongo_pool::{Pool, PoolConfig};
use mongodb::bson::doc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = PoolConfig::from_env().pool_size(10);
    println!("Opening pool of {} clients to {}", config.pool_size, config.address);
    let pool = Pool::open(config).await?;

    // Start from a clean counter.
    {
        let client = pool.acquire().await?;
        client
            .database("test")
            .collection::<mongodb::bson::Document>("counters")
            .delete_one(doc! { "_id": "test" })
            .await?;
    }

    // Auto increment
    pool.ensure_counter("test", "counters", "test").await?;
    for _ in 0..3 {
        let id = pool.next_seq("test", "counters", "test").await?;
        println!("{id}");
    }

    // Index
    pool.ensure_unique_index("test", "counters", &["key1"]).await?;

    let status = pool.status();
    println!(
        "Status: {}/{} clients in use ({:.1}% utilization)",
        status.in_use,
        status.size,
        status.utilization()
    );
    let metrics = pool.metrics();
    println!(
        "Metrics: {} acquires, {} probes ({} failed), {} reconnects",
        metrics.acquires, metrics.probes, metrics.probes_failed, metrics.reconnects
    );

    pool.close().await;
    Ok(())
}
