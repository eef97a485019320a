//! # Product Projection Core
//!
//! Read-optimized product cache over a key-value backend.
//!
//! A population process writes denormalized product snapshots; the HTTP
//! boundary reads them back one at a time or all at once. Each snapshot lives
//! under its own primary key, and a set of all cached IDs makes bulk reads
//! possible without scanning the key space.
//!
//! ## Core Concepts
//!
//! - **[`ProductProjection`]**: the cached record, opaque to the store
//! - **[`ProjectionCodec`]**: versioned binary encoding of records
//! - **[`KeySpace`]**: `product:<id>` primary keys and the `products:all` index
//! - **[`KeyValueBackend`]**: the storage primitives the cache needs (Redis in production)
//! - **[`ProductProjectionRepository`]**: find, find-all, save, delete, clear and reconcile
//!
//! ## Example
//!
//! ```ignore
//! use product_projection_core::{ProductProjection, ProjectionCacheConfig};
//! use product_projection_redis::connect;
//!
//! let config = ProjectionCacheConfig::from_env();
//! let repository = connect(&config).await?;
//!
//! repository.save(&ProductProjection::new(105_069, "Widget")).await?;
//!
//! match repository.find(105_069).await {
//!     Ok(Some(product)) => println!("{}", product.name),
//!     Ok(None) => println!("not cached"),
//!     Err(e) if e.is_unavailable() => println!("cache degraded: {e}"),
//!     Err(e) => println!("error: {e}"),
//! }
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod projection;
pub mod repository;

// Re-export main types for convenience
pub use backend::KeyValueBackend;
pub use codec::ProjectionCodec;
pub use config::ProjectionCacheConfig;
pub use error::{ProjectionError, Result};
pub use keys::KeySpace;
pub use projection::{ProductId, ProductProjection};
pub use repository::{CorruptRecord, FindAllReport, ProductProjectionRepository, ReconcileReport};
