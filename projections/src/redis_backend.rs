//! Redis implementation of [`KeyValueBackend`].
//!
//! # Architecture
//!
//! Projections are stored in Redis with:
//! - **Primary key**: `product:{id}` (String) → encoded `ProductProjection`
//! - **Index**: `products:all` (Set) → every cached product ID
//!
//! All commands go through a [`ConnectionManager`], a multiplexed connection
//! that reconnects on failure. Cloning the backend clones the manager, so one
//! backend can be shared by every request handler.

use product_projection_core::config::DEFAULT_CONNECT_TIMEOUT;
use product_projection_core::{KeyValueBackend, ProjectionCacheConfig, ProjectionError, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::fmt;
use std::time::Duration;

/// Keys requested per SCAN iteration.
const SCAN_COUNT: usize = 500;

/// Redis-backed key-value storage for the projection cache.
///
/// # Example
///
/// ```no_run
/// use product_projection_redis::RedisKeyValueBackend;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = RedisKeyValueBackend::builder()
///     .url("redis://127.0.0.1:6379")
///     .connect_timeout(Duration::from_secs(2))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisKeyValueBackend {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisKeyValueBackend {
    /// Connect with the default connect timeout.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Config`] for a malformed URL and
    /// [`ProjectionError::BackendUnavailable`] if Redis cannot be reached.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::builder().url(redis_url).build().await
    }

    /// Connect using the cache configuration.
    ///
    /// # Errors
    ///
    /// Same as [`RedisKeyValueBackend::new`].
    pub async fn from_config(config: &ProjectionCacheConfig) -> Result<Self> {
        Self::builder()
            .url(config.redis_url.clone())
            .connect_timeout(config.connect_timeout)
            .build()
            .await
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_connection_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    /// Create a builder for custom connection settings.
    #[must_use]
    pub fn builder() -> RedisKeyValueBackendBuilder {
        RedisKeyValueBackendBuilder::default()
    }

    fn connection(&self) -> ConnectionManager {
        self.conn_manager.clone()
    }
}

impl fmt::Debug for RedisKeyValueBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisKeyValueBackend").finish_non_exhaustive()
    }
}

/// Builder for [`RedisKeyValueBackend`].
#[derive(Debug, Clone, Default)]
pub struct RedisKeyValueBackendBuilder {
    url: Option<String>,
    connect_timeout: Option<Duration>,
}

impl RedisKeyValueBackendBuilder {
    /// Set the Redis connection URL (required).
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set how long to wait for the initial connection (default: 5 seconds).
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// - [`ProjectionError::Config`] if no URL is set or the URL is malformed
    /// - [`ProjectionError::BackendUnavailable`] if Redis cannot be reached in time
    pub async fn build(self) -> Result<RedisKeyValueBackend> {
        let url = self
            .url
            .ok_or_else(|| ProjectionError::Config("Redis URL not configured".to_string()))?;
        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        let client = Client::open(url.as_str()).map_err(|e| {
            ProjectionError::Config(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                ProjectionError::unavailable(
                    "connect",
                    format!("no connection within {connect_timeout:?}"),
                )
            })?
            .map_err(|e| classify("connect", &e))?;

        tracing::info!(
            connect_timeout_ms = connect_timeout.as_millis(),
            "Connected projection cache to Redis"
        );

        Ok(RedisKeyValueBackend { conn_manager })
    }
}

/// Map a Redis error to the cache error taxonomy.
///
/// Connection-level failures mean the backend is unavailable; anything else is
/// Redis refusing the command.
fn classify(operation: &'static str, err: &RedisError) -> ProjectionError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        ProjectionError::unavailable(operation, err.to_string())
    } else {
        ProjectionError::Backend {
            operation,
            reason: err.to_string(),
        }
    }
}

impl KeyValueBackend for RedisKeyValueBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(|e| classify("get", &e))?;
        Ok(value)
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        // Explicit MGET so a single key still yields a one-element array
        let mut conn = self.connection();
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| classify("mget", &e))?;
        Ok(values)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.connection();
        let _: () = conn.set(key, value).await.map_err(|e| classify("set", &e))?;
        Ok(())
    }

    async fn multi_set(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection();
        let _: () = conn.mset(entries).await.map_err(|e| classify("mset", &e))?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection();
        let _: () = conn.del(keys).await.map_err(|e| classify("del", &e))?;
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection();
        let _: () = conn
            .sadd(key, members)
            .await
            .map_err(|e| classify("sadd", &e))?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection();
        let _: () = conn
            .srem(key, members)
            .await
            .map_err(|e| classify("srem", &e))?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection();
        let members: Vec<String> = conn
            .smembers(key)
            .await
            .map_err(|e| classify("smembers", &e))?;
        Ok(members)
    }

    async fn set_cardinality(&self, key: &str) -> Result<usize> {
        let mut conn = self.connection();
        let count: usize = conn.scard(key).await.map_err(|e| classify("scard", &e))?;
        Ok(count)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| classify("scan", &e))?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}
