//! Redis backend for the product projection cache.
//!
//! # Overview
//!
//! [`RedisKeyValueBackend`] implements
//! [`KeyValueBackend`](product_projection_core::KeyValueBackend) on top of a
//! multiplexed Redis connection:
//!
//! ```text
//! HTTP handlers ──┐
//!                 ├──▶ ProductProjectionRepository ──▶ RedisKeyValueBackend ──▶ Redis
//! Population  ────┘        (encode, key space)          (ConnectionManager)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use product_projection_core::{ProductProjection, ProductProjectionRepository, ProjectionCacheConfig};
//! use product_projection_redis::connect;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProjectionCacheConfig::from_env();
//! let repository = connect(&config).await?;
//!
//! repository.save(&ProductProjection::new(105_069, "Widget")).await?;
//! assert!(repository.find(105_069).await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod redis_backend;

pub use redis_backend::{RedisKeyValueBackend, RedisKeyValueBackendBuilder};

use product_projection_core::{ProductProjectionRepository, ProjectionCacheConfig, Result};

/// Validate the configuration, connect to Redis and build a repository.
///
/// Also registers the cache metric descriptions with the installed recorder.
///
/// # Errors
///
/// Returns [`ProjectionError::Config`](product_projection_core::ProjectionError::Config)
/// for invalid configuration and
/// [`ProjectionError::BackendUnavailable`](product_projection_core::ProjectionError::BackendUnavailable)
/// if Redis cannot be reached.
pub async fn connect(
    config: &ProjectionCacheConfig,
) -> Result<ProductProjectionRepository<RedisKeyValueBackend>> {
    config.validate()?;
    product_projection_core::metrics::describe_metrics();
    let backend = RedisKeyValueBackend::from_config(config).await?;
    ProductProjectionRepository::from_config(backend, config)
}
