//! Pool error types.

use thiserror::Error;

/// Errors reported by a [`Connector`](crate::Connector) or
/// [`Session`](crate::Session).
#[derive(Debug, Error)]
pub enum DriverError {
    /// The MongoDB driver returned an error.
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

impl DriverError {
    /// Create a backend error from a message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A client could not be established while filling the pool.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Address the pool was opened with.
        address: String,
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// The idle client failed its liveness probe and could not be replaced.
    #[error("reconnect to {address} failed: {source}")]
    Reconnect {
        /// Address the pool was opened with.
        address: String,
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// A store operation failed.
    #[error("{operation} on {namespace}.{collection} failed: {source}")]
    Store {
        /// Operation name.
        operation: &'static str,
        /// Database name.
        namespace: String,
        /// Collection name.
        collection: String,
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// `next_seq` was called for a counter that was never seeded.
    #[error("counter {id:?} not found in {namespace}.{collection}")]
    CounterNotFound {
        /// Database name.
        namespace: String,
        /// Collection name.
        collection: String,
        /// Counter identity.
        id: String,
    },

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}

impl PoolError {
    /// Check if this error is a connectivity failure.
    ///
    /// Connectivity failures leave the pool consistent; callers that want to
    /// retry should do so at their own layer.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Reconnect { .. } | Self::PoolClosed
        )
    }

    /// Check if this error came from a store operation.
    #[must_use]
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::CounterNotFound { .. })
    }

    pub(crate) fn store(
        operation: &'static str,
        namespace: &str,
        collection: &str,
        source: DriverError,
    ) -> Self {
        Self::Store {
            operation,
            namespace: namespace.to_string(),
            collection: collection.to_string(),
            source,
        }
    }
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
