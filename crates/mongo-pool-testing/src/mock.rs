//! In-memory connector for unit testing.
//!
//! [`MockConnector`] implements the pool's [`Connector`] seam without a
//! MongoDB server. Its sessions share one in-memory store holding counters
//! and index definitions, so the pool's counter and index conveniences behave
//! as they would against a real deployment.
//!
//! ## Fault Injection
//!
//! - Refuse connects, either all of them or after a budget is used up
//! - Sever sessions, making their pings and store operations fail
//! - Conflicting index definitions are rejected like the server does
//!
//! ## Example
//!
//! ```rust,ignore
//! use mongo_pool_testing::MockConnector;
//!
//! let connector = MockConnector::builder()
//!     .with_address("mongodb://mock:27017")
//!     .with_connect_budget(3)
//!     .build();
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mongo_pool::{Connector, DriverError, IndexSpec, SeedOutcome, Session};
use parking_lot::Mutex;
use thiserror::Error;

/// Default address reported by the mock connector.
pub const MOCK_ADDRESS: &str = "mongodb://mock.invalid:27017";

/// Error type for mock operations.
#[derive(Debug, Error)]
pub enum MockError {
    /// The connector is refusing connections.
    #[error("connection refused by mock server")]
    ConnectRefused,

    /// The session was shut down.
    #[error("session {0} is disconnected")]
    Disconnected(u64),

    /// The session lost its connection to the server.
    #[error("session {0} is unreachable")]
    Unreachable(u64),

    /// An index with the same keys and different options exists.
    #[error("index {name} already exists with different options")]
    IndexConflict {
        /// Index name.
        name: String,
    },
}

impl From<MockError> for DriverError {
    fn from(err: MockError) -> Self {
        DriverError::backend(err.to_string())
    }
}

/// Snapshot of connector activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Sessions successfully opened.
    pub connects: u64,
    /// Connect attempts that were refused.
    pub connects_refused: u64,
    /// Sessions shut down.
    pub disconnects: u64,
    /// Pings received.
    pub pings: u64,
    /// Pings that failed.
    pub pings_failed: u64,
}

type CounterKey = (String, String, String);
type CollectionKey = (String, String);

#[derive(Debug, Default)]
struct Store {
    counters: HashMap<CounterKey, i64>,
    indexes: HashMap<CollectionKey, Vec<IndexSpec>>,
}

#[derive(Debug)]
struct SessionState {
    id: u64,
    reachable: AtomicBool,
    disconnected: AtomicBool,
}

#[derive(Debug)]
struct Shared {
    address: String,
    latency: Duration,
    /// Remaining successful connects, `None` for unlimited.
    connect_budget: Mutex<Option<u64>>,
    next_id: AtomicU64,
    sessions: Mutex<Vec<Arc<SessionState>>>,
    store: Mutex<Store>,
    connects: AtomicU64,
    connects_refused: AtomicU64,
    disconnects: AtomicU64,
    pings: AtomicU64,
    pings_failed: AtomicU64,
}

/// Builder for [`MockConnector`].
#[derive(Debug, Clone)]
pub struct MockConnectorBuilder {
    address: String,
    latency: Duration,
    connect_budget: Option<u64>,
}

impl Default for MockConnectorBuilder {
    fn default() -> Self {
        Self {
            address: MOCK_ADDRESS.to_string(),
            latency: Duration::ZERO,
            connect_budget: None,
        }
    }
}

impl MockConnectorBuilder {
    /// Set the reported address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Delay every ping and store operation by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Allow only `budget` successful connects; later ones are refused.
    #[must_use]
    pub fn with_connect_budget(mut self, budget: u64) -> Self {
        self.connect_budget = Some(budget);
        self
    }

    /// Build the connector.
    #[must_use]
    pub fn build(self) -> MockConnector {
        MockConnector {
            shared: Arc::new(Shared {
                address: self.address,
                latency: self.latency,
                connect_budget: Mutex::new(self.connect_budget),
                next_id: AtomicU64::new(1),
                sessions: Mutex::new(Vec::new()),
                store: Mutex::new(Store::default()),
                connects: AtomicU64::new(0),
                connects_refused: AtomicU64::new(0),
                disconnects: AtomicU64::new(0),
                pings: AtomicU64::new(0),
                pings_failed: AtomicU64::new(0),
            }),
        }
    }
}

/// In-memory connector. Clones share state, so a test can keep one clone
/// to steer faults while the pool owns another.
#[derive(Debug, Clone)]
pub struct MockConnector {
    shared: Arc<Shared>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// Create a connector that accepts every connect.
    #[must_use]
    pub fn new() -> Self {
        MockConnectorBuilder::default().build()
    }

    /// Create a builder.
    #[must_use]
    pub fn builder() -> MockConnectorBuilder {
        MockConnectorBuilder::default()
    }

    /// Refuse (`true`) or accept (`false`) all further connects.
    pub fn refuse_connects(&self, refuse: bool) {
        *self.shared.connect_budget.lock() = if refuse { Some(0) } else { None };
    }

    /// Sever one session. Its pings and store operations fail from now on.
    pub fn sever(&self, session_id: u64) {
        for session in self.shared.sessions.lock().iter() {
            if session.id == session_id {
                session.reachable.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Sever every session opened so far.
    pub fn sever_all(&self) {
        for session in self.shared.sessions.lock().iter() {
            session.reachable.store(false, Ordering::SeqCst);
        }
    }

    /// Ids of sessions that are not disconnected.
    #[must_use]
    pub fn open_sessions(&self) -> Vec<u64> {
        self.shared
            .sessions
            .lock()
            .iter()
            .filter(|s| !s.disconnected.load(Ordering::SeqCst))
            .map(|s| s.id)
            .collect()
    }

    /// Current value of a counter, if it exists.
    #[must_use]
    pub fn counter(&self, namespace: &str, collection: &str, id: &str) -> Option<i64> {
        self.shared
            .store
            .lock()
            .counters
            .get(&(namespace.into(), collection.into(), id.into()))
            .copied()
    }

    /// Remove a counter from the store.
    pub fn remove_counter(&self, namespace: &str, collection: &str, id: &str) {
        self.shared
            .store
            .lock()
            .counters
            .remove(&(namespace.into(), collection.into(), id.into()));
    }

    /// Indexes defined on a collection, in creation order.
    #[must_use]
    pub fn indexes(&self, namespace: &str, collection: &str) -> Vec<IndexSpec> {
        self.shared
            .store
            .lock()
            .indexes
            .get(&(namespace.into(), collection.into()))
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of connector activity.
    #[must_use]
    pub fn stats(&self) -> MockStats {
        let shared = &self.shared;
        MockStats {
            connects: shared.connects.load(Ordering::SeqCst),
            connects_refused: shared.connects_refused.load(Ordering::SeqCst),
            disconnects: shared.disconnects.load(Ordering::SeqCst),
            pings: shared.pings.load(Ordering::SeqCst),
            pings_failed: shared.pings_failed.load(Ordering::SeqCst),
        }
    }

    fn take_connect_permit(&self) -> bool {
        let mut budget = self.shared.connect_budget.lock();
        match budget.as_mut() {
            None => true,
            Some(0) => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self) -> Result<MockSession, DriverError> {
        if !self.take_connect_permit() {
            self.shared.connects_refused.fetch_add(1, Ordering::SeqCst);
            return Err(MockError::ConnectRefused.into());
        }

        let state = Arc::new(SessionState {
            id: self.shared.next_id.fetch_add(1, Ordering::SeqCst),
            reachable: AtomicBool::new(true),
            disconnected: AtomicBool::new(false),
        });
        self.shared.sessions.lock().push(Arc::clone(&state));
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(session = state.id, "mock session opened");

        Ok(MockSession {
            state,
            shared: Arc::clone(&self.shared),
        })
    }

    fn address(&self) -> &str {
        &self.shared.address
    }
}

/// A session opened by [`MockConnector`].
#[derive(Debug)]
pub struct MockSession {
    state: Arc<SessionState>,
    shared: Arc<Shared>,
}

impl MockSession {
    /// Unique id of this session.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Whether this session has been shut down.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.state.disconnected.load(Ordering::SeqCst)
    }

    async fn round_trip(&self) -> Result<(), MockError> {
        if !self.shared.latency.is_zero() {
            tokio::time::sleep(self.shared.latency).await;
        }
        if self.state.disconnected.load(Ordering::SeqCst) {
            return Err(MockError::Disconnected(self.state.id));
        }
        if !self.state.reachable.load(Ordering::SeqCst) {
            return Err(MockError::Unreachable(self.state.id));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MockSession {
    async fn ping(&self) -> Result<(), DriverError> {
        self.shared.pings.fetch_add(1, Ordering::SeqCst);
        let result = self.round_trip().await;
        if result.is_err() {
            self.shared.pings_failed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(result?)
    }

    async fn disconnect(&self) {
        if !self.state.disconnected.swap(true, Ordering::SeqCst) {
            self.shared.disconnects.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(session = self.state.id, "mock session closed");
        }
    }

    async fn insert_counter(
        &self,
        namespace: &str,
        collection: &str,
        id: &str,
    ) -> Result<SeedOutcome, DriverError> {
        self.round_trip().await?;
        let mut store = self.shared.store.lock();
        let key = (namespace.to_string(), collection.to_string(), id.to_string());
        if store.counters.contains_key(&key) {
            return Ok(SeedOutcome::AlreadyExists);
        }
        store.counters.insert(key, 0);
        Ok(SeedOutcome::Inserted)
    }

    async fn increment_counter(
        &self,
        namespace: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<i64>, DriverError> {
        self.round_trip().await?;
        let mut store = self.shared.store.lock();
        let key = (namespace.to_string(), collection.to_string(), id.to_string());
        Ok(store.counters.get_mut(&key).map(|seq| {
            *seq += 1;
            *seq
        }))
    }

    async fn create_index(
        &self,
        namespace: &str,
        collection: &str,
        index: &IndexSpec,
    ) -> Result<(), DriverError> {
        self.round_trip().await?;
        let mut store = self.shared.store.lock();
        let indexes = store
            .indexes
            .entry((namespace.to_string(), collection.to_string()))
            .or_default();
        match indexes.iter().find(|existing| existing.fields == index.fields) {
            Some(existing) if existing == index => Ok(()),
            Some(_) => Err(MockError::IndexConflict {
                name: index.default_name(),
            }
            .into()),
            None => {
                indexes.push(index.clone());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_budget() {
        let connector = MockConnector::builder().with_connect_budget(2).build();
        assert!(connector.connect().await.is_ok());
        assert!(connector.connect().await.is_ok());
        assert!(connector.connect().await.is_err());

        let stats = connector.stats();
        assert_eq!(stats.connects, 2);
        assert_eq!(stats.connects_refused, 1);
    }

    #[tokio::test]
    async fn test_severed_session_fails_ping() {
        let connector = MockConnector::new();
        let session = connector.connect().await.unwrap();
        assert!(session.ping().await.is_ok());

        connector.sever(session.id());
        let err = session.ping().await.unwrap_err();
        assert!(err.to_string().contains("unreachable"));
        assert_eq!(connector.stats().pings_failed, 1);
    }

    #[tokio::test]
    async fn test_disconnect_is_counted_once() {
        let connector = MockConnector::new();
        let session = connector.connect().await.unwrap();
        session.disconnect().await;
        session.disconnect().await;

        assert!(session.is_disconnected());
        assert_eq!(connector.stats().disconnects, 1);
        assert!(connector.open_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_index_conflict() {
        let connector = MockConnector::new();
        let session = connector.connect().await.unwrap();
        let plain = IndexSpec::new(["key1"], false);
        let unique = IndexSpec::new(["key1"], true);

        session.create_index("test", "c", &plain).await.unwrap();
        session.create_index("test", "c", &plain).await.unwrap();
        assert!(session.create_index("test", "c", &unique).await.is_err());
        assert_eq!(connector.indexes("test", "c"), vec![plain]);
    }
}
