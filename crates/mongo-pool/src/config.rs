//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Pool size used when the caller asks for zero clients.
pub const DEFAULT_POOL_SIZE: usize = 100;

/// Default timeout for establishing a client connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time a driver connection may stay idle before it is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default MongoDB address.
pub const DEFAULT_ADDRESS: &str = "mongodb://localhost:27017";

/// Configuration for the client pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// MongoDB connection string.
    pub address: String,

    /// Number of clients to open. Zero selects [`DEFAULT_POOL_SIZE`].
    pub pool_size: usize,

    /// Time allowed to establish a connection (initial fill and reconnect).
    pub connect_timeout: Duration,

    /// Time a driver connection can be idle before being closed.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `MONGODB_URI` and `MONGODB_POOL_SIZE`.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(uri) = std::env::var("MONGODB_URI") {
            config.address = uri;
        }
        if let Some(size) = std::env::var("MONGODB_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.pool_size = size;
        }
        config
    }

    /// Set the MongoDB connection string.
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the number of pooled clients.
    #[must_use]
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Pool size after substituting the default for zero.
    ///
    /// Logs a warning when the substitution happens.
    #[must_use]
    pub fn effective_pool_size(&self) -> usize {
        if self.pool_size == 0 {
            tracing::warn!(
                pool_size = DEFAULT_POOL_SIZE,
                "invalid pool size 0, reset to default"
            );
            DEFAULT_POOL_SIZE
        } else {
            self.pool_size
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.address.trim().is_empty() {
            return Err(PoolError::Configuration("address must not be empty".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(PoolError::Configuration(
                "connect_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.pool_size, 100);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_config_builder_methods() {
        let config = PoolConfig::new()
            .address("mongodb://db.internal:27018")
            .pool_size(8)
            .connect_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(60));

        assert_eq!(config.address, "mongodb://db.internal:27018");
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_pool_size_uses_default() {
        let config = PoolConfig::new().pool_size(0);
        assert_eq!(config.effective_pool_size(), DEFAULT_POOL_SIZE);

        let config = PoolConfig::new().pool_size(3);
        assert_eq!(config.effective_pool_size(), 3);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(PoolConfig::new().validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_address() {
        let result = PoolConfig::new().address("  ").validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("address must not be empty")
        );
    }

    #[test]
    fn test_config_validation_zero_connect_timeout() {
        let result = PoolConfig::new()
            .connect_timeout(Duration::ZERO)
            .validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("connect_timeout must be greater than 0")
        );
    }
}
