//! Test fixture utilities.

use std::sync::atomic::{AtomicU64, Ordering};

static FIXTURE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Test database fixture.
///
/// Every fixture gets its own database name so tests running against the
/// same server do not see each other's counters or indexes.
#[derive(Debug, Clone)]
pub struct TestFixture {
    /// Database name.
    pub namespace: String,
    /// Collections used by this fixture.
    pub collections: Vec<String>,
}

impl TestFixture {
    /// Create a fixture with a database name derived from `prefix`.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        let seq = FIXTURE_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            namespace: format!("{prefix}_{}_{seq}", std::process::id()),
            collections: Vec::new(),
        }
    }

    /// Add a collection to the fixture.
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collections.push(collection.into());
        self
    }

    /// Drop the fixture's database.
    pub async fn drop_database(&self, client: &mongodb::Client) -> mongodb::error::Result<()> {
        client.database(&self.namespace).drop().await
    }
}
