//! Index assurance.

use crate::error::{PoolError, Result};
use crate::lifecycle::{Connector, IndexSpec, Session};
use crate::pool::Pool;

impl<C: Connector> Pool<C> {
    /// Ensure an ascending, sparse index over `fields` exists.
    ///
    /// Creating an index identical to an existing one succeeds. An index
    /// with the same keys but different options is rejected by the server
    /// and returned as [`PoolError::Store`].
    pub async fn ensure_index(
        &self,
        namespace: &str,
        collection: &str,
        fields: &[&str],
        unique: bool,
    ) -> Result<()> {
        let index = IndexSpec::new(fields.iter().copied(), unique);
        let conn = self.acquire().await?;
        conn.create_index(namespace, collection, &index)
            .await
            .map_err(|e| PoolError::store("ensure_index", namespace, collection, e))?;

        tracing::debug!(
            namespace,
            collection,
            index = %index.default_name(),
            unique,
            "index ensured"
        );
        Ok(())
    }

    /// Ensure a unique, ascending, sparse index over `fields` exists.
    pub async fn ensure_unique_index(
        &self,
        namespace: &str,
        collection: &str,
        fields: &[&str],
    ) -> Result<()> {
        self.ensure_index(namespace, collection, fields, true).await
    }
}
