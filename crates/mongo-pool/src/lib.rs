//! # mongo-pool
//!
//! Fixed-size pool of MongoDB clients with least-loaded selection.
//!
//! Every pooled client carries a count of the borrowers currently using it.
//! The pool keeps its clients in an array-backed min-heap keyed on that
//! count, so `acquire` always hands out the least busy client. A client is
//! health-checked only when it is fully idle at the moment it is picked, and
//! is reconnected in place if the check fails.
//!
//! ## Features
//!
//! - Least-loaded client selection in O(log n)
//! - Scoped borrows: the guard releases on drop
//! - Lazy liveness probe (`ping`) and in-place reconnect
//! - Atomic counters (`ensure_counter` / `next_seq`)
//! - Idempotent sparse index creation (`ensure_index`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use mongo_pool::Pool;
//!
//! let pool = Pool::connect("mongodb://localhost:27017", 10).await?;
//!
//! pool.ensure_counter("test", "counters", "orders").await?;
//! let id = pool.next_seq("test", "counters", "orders").await?;
//!
//! {
//!     let client = pool.acquire().await?;
//!     let names = client.list_database_names().await?;
//!     // client returned to the pool here
//! }
//!
//! pool.close().await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
mod heap;
mod index;
pub mod lifecycle;
pub mod metrics;
pub mod mongo;
pub mod pool;
mod sequence;

pub use config::PoolConfig;
pub use error::{DriverError, PoolError, Result};
pub use lifecycle::{Connector, IndexSpec, SeedOutcome, Session};
pub use metrics::PoolMetrics;
pub use mongo::MongoConnector;
pub use pool::{Pool, PoolStatus, PooledConnection};
