//! Atomic counters stored as `{_id, seq}` documents.

use crate::error::{PoolError, Result};
use crate::lifecycle::{Connector, SeedOutcome, Session};
use crate::pool::Pool;

impl<C: Connector> Pool<C> {
    /// Create the counter `id` in `namespace.collection` with `seq: 0`.
    ///
    /// Seeding a counter that already exists succeeds and leaves its value
    /// untouched.
    pub async fn ensure_counter(&self, namespace: &str, collection: &str, id: &str) -> Result<()> {
        let conn = self.acquire().await?;
        let outcome = conn
            .insert_counter(namespace, collection, id)
            .await
            .map_err(|e| PoolError::store("ensure_counter", namespace, collection, e))?;

        if outcome == SeedOutcome::AlreadyExists {
            tracing::debug!(namespace, collection, id, "counter already seeded");
        }
        Ok(())
    }

    /// Atomically increment the counter `id` and return its new value.
    ///
    /// The increment is a single `findOneAndUpdate` on the server, so
    /// concurrent callers never observe the same value. The counter must have
    /// been created with [`ensure_counter`](Pool::ensure_counter) first.
    pub async fn next_seq(&self, namespace: &str, collection: &str, id: &str) -> Result<i64> {
        let conn = self.acquire().await?;
        conn.increment_counter(namespace, collection, id)
            .await
            .map_err(|e| PoolError::store("next_seq", namespace, collection, e))?
            .ok_or_else(|| PoolError::CounterNotFound {
                namespace: namespace.to_string(),
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }
}
