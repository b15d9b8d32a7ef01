//! Client lifecycle management.
//!
//! This module defines the seam between the pool and the driver: how a
//! pooled client is established, probed, shut down, and how the one-shot
//! store operations used by the pool's conveniences are issued.
//!
//! [`MongoConnector`](crate::MongoConnector) implements these traits on top
//! of the official `mongodb` driver.

use async_trait::async_trait;

use crate::error::DriverError;

/// Establishes new clients for the pool.
///
/// The pool calls [`connect`](Connector::connect) once per slot while it is
/// being opened, and again whenever an idle client fails its liveness probe.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Client type produced by this connector.
    type Session: Session;

    /// Open a new client using the pool's construction parameters.
    async fn connect(&self) -> Result<Self::Session, DriverError>;

    /// Address the clients connect to, for diagnostics.
    fn address(&self) -> &str;
}

/// A live client held by one pool slot.
///
/// A session may be shared by several borrowers at once; implementations
/// must be safe for concurrent use.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Cheap round trip verifying the client is still usable.
    async fn ping(&self) -> Result<(), DriverError>;

    /// Close the client. Failures are not reported.
    async fn disconnect(&self);

    /// Insert the counter document `{_id: id, seq: 0}`.
    async fn insert_counter(
        &self,
        namespace: &str,
        collection: &str,
        id: &str,
    ) -> Result<SeedOutcome, DriverError>;

    /// Atomically increment the counter's `seq` and return the new value.
    ///
    /// Returns `Ok(None)` when no counter with that identity exists.
    async fn increment_counter(
        &self,
        namespace: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<i64>, DriverError>;

    /// Create an index. Re-creating an identical index succeeds.
    async fn create_index(
        &self,
        namespace: &str,
        collection: &str,
        index: &IndexSpec,
    ) -> Result<(), DriverError>;
}

/// Result of seeding a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The counter document was created.
    Inserted,
    /// A counter with the same identity was already present.
    AlreadyExists,
}

/// Definition of an ascending, sparse index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Indexed fields, in key order.
    pub fields: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

impl IndexSpec {
    /// Create an index definition over `fields`.
    pub fn new<I, S>(fields: I, unique: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            unique,
        }
    }

    /// Sparse indexes skip documents that lack the indexed fields.
    ///
    /// Every index created by the pool is sparse.
    #[must_use]
    pub fn sparse(&self) -> bool {
        true
    }

    /// Name the server would derive for this index, e.g. `a_1_b_1`.
    #[must_use]
    pub fn default_name(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{f}_1"))
            .collect::<Vec<_>>()
            .join("_")
    }
}
