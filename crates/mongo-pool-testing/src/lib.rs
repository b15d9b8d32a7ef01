//! # mongo-pool-testing
//!
//! Test infrastructure for mongo-pool.
//!
//! ## Features
//!
//! - In-memory connector for unit tests (no MongoDB required)
//! - Fault injection: refused connects, severed sessions, index conflicts
//! - MongoDB container management via testcontainers
//! - Collection naming fixtures for tests against a real server
//!
//! ## Mock Example
//!
//! ```rust,ignore
//! use mongo_pool::{Pool, PoolConfig};
//! use mongo_pool_testing::MockConnector;
//!
//! #[tokio::test]
//! async fn test_with_mock() {
//!     let connector = MockConnector::new();
//!     let pool = Pool::with_connector(PoolConfig::new().pool_size(4), connector.clone())
//!         .await
//!         .unwrap();
//!
//!     connector.sever_all();
//!     let conn = pool.acquire().await.unwrap(); // reconnected transparently
//!     assert_eq!(connector.stats().connects, 5);
//! }
//! ```
//!
//! ## Container Example
//!
//! ```rust,ignore
//! use mongo_pool_testing::MongoContainer;
//! use testcontainers::runners::AsyncRunner;
//!
//! #[tokio::test]
//! async fn test_with_real_server() {
//!     let container = MongoContainer::default().start().await.unwrap();
//!     let port = container.get_host_port_ipv4(27017).await.unwrap();
//!     let uri = MongoContainer::uri("127.0.0.1", port);
//!     // Open a pool against uri...
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod container;
pub mod fixtures;
pub mod mock;

pub use container::MongoContainer;
pub use fixtures::TestFixture;
pub use mock::{MockConnector, MockConnectorBuilder, MockError, MockSession, MockStats};

