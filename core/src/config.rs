//! Configuration for the projection cache.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{ProjectionError, Result};
use crate::keys::{DEFAULT_INDEX_KEY, DEFAULT_KEY_PREFIX, KeySpace};
use std::env;
use std::time::Duration;

/// Default per-call backend timeout.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default backend connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Projection cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionCacheConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Prefix of primary keys (`product:`)
    pub key_prefix: String,
    /// Key of the "all IDs" index set (`products:all`)
    pub index_key: String,
    /// Timeout applied to every backend call
    pub operation_timeout: Duration,
    /// Timeout for establishing the backend connection
    pub connect_timeout: Duration,
}

impl Default for ProjectionCacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            index_key: DEFAULT_INDEX_KEY.to_string(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ProjectionCacheConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `REDIS_URL` | `redis://localhost:6379` |
    /// | `PROJECTION_KEY_PREFIX` | `product:` |
    /// | `PROJECTION_INDEX_KEY` | `products:all` |
    /// | `PROJECTION_OPERATION_TIMEOUT_MS` | `2000` |
    /// | `REDIS_CONNECT_TIMEOUT` (seconds) | `5` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unparseable numbers fall back to their defaults.
    ///
    /// # Example
    ///
    /// ```
    /// use product_projection_core::ProjectionCacheConfig;
    /// use std::time::Duration;
    ///
    /// let config = ProjectionCacheConfig::from_lookup(|key| match key {
    ///     "PROJECTION_OPERATION_TIMEOUT_MS" => Some("250".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.operation_timeout, Duration::from_millis(250));
    /// assert_eq!(config.index_key, "products:all");
    /// ```
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix: lookup("PROJECTION_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            index_key: lookup("PROJECTION_INDEX_KEY").unwrap_or(defaults.index_key),
            operation_timeout: lookup("PROJECTION_OPERATION_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.operation_timeout, Duration::from_millis),
            connect_timeout: lookup("REDIS_CONNECT_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.connect_timeout, Duration::from_secs),
        }
    }

    /// Check the configuration for values the repository cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Config`] if the prefix or index key is empty,
    /// if the index key falls inside the primary key space, or if a timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.is_empty() {
            return Err(ProjectionError::Config("key prefix must not be empty".into()));
        }
        if self.index_key.is_empty() {
            return Err(ProjectionError::Config("index key must not be empty".into()));
        }
        // A scan of the primary key space would otherwise pick up the index set
        if self.index_key.starts_with(&self.key_prefix) {
            return Err(ProjectionError::Config(format!(
                "index key '{}' must not start with key prefix '{}'",
                self.index_key, self.key_prefix
            )));
        }
        if self.operation_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ProjectionError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// Key space described by this configuration.
    #[must_use]
    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(self.key_prefix.clone(), self.index_key.clone())
    }
}

impl From<&ProjectionCacheConfig> for KeySpace {
    fn from(config: &ProjectionCacheConfig) -> Self {
        config.key_space()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = ProjectionCacheConfig::from_lookup(|_| None);
        assert_eq!(config, ProjectionCacheConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.key_space(), KeySpace::default());
    }

    #[test]
    fn test_overrides() {
        let config = ProjectionCacheConfig::from_lookup(lookup_from(&[
            ("REDIS_URL", "redis://cache:6380/2"),
            ("PROJECTION_KEY_PREFIX", "shop:product:"),
            ("PROJECTION_INDEX_KEY", "shop:products:all"),
            ("PROJECTION_OPERATION_TIMEOUT_MS", "150"),
            ("REDIS_CONNECT_TIMEOUT", "1"),
        ]));

        assert_eq!(config.redis_url, "redis://cache:6380/2");
        assert_eq!(config.operation_timeout, Duration::from_millis(150));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(
            KeySpace::from(&config).primary_key(crate::ProductId::new(1)),
            "shop:product:1"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let config = ProjectionCacheConfig::from_lookup(lookup_from(&[
            ("PROJECTION_OPERATION_TIMEOUT_MS", "soon"),
            ("REDIS_CONNECT_TIMEOUT", "-1"),
        ]));
        assert_eq!(config.operation_timeout, DEFAULT_OPERATION_TIMEOUT);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_validate_rejects_overlapping_index_key() {
        let config = ProjectionCacheConfig {
            index_key: "product:all".to_string(),
            ..ProjectionCacheConfig::default()
        };
        assert!(matches!(config.validate(), Err(ProjectionError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ProjectionCacheConfig {
            operation_timeout: Duration::ZERO,
            ..ProjectionCacheConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
