//! Key-value backend abstraction.
//!
//! The repository only needs a small set of primitives with per-key
//! atomicity: string get/set, batched get/set/delete, and set membership.
//! Redis provides all of them natively; the in-memory backend in the testing
//! crate provides them for deterministic tests.
//!
//! Implementations must be safe for concurrent use (`Send + Sync`, usually
//! `Clone` over a shared connection) since the repository serializes nothing.

use crate::error::Result;
use std::future::Future;

/// Storage primitives consumed by [`crate::ProductProjectionRepository`].
///
/// Every method is a single backend round-trip. Errors must distinguish an
/// unreachable backend ([`crate::ProjectionError::BackendUnavailable`]) from
/// a rejected command ([`crate::ProjectionError::Backend`]); an absent key is
/// never an error.
///
/// # Example
///
/// ```ignore
/// let backend = RedisKeyValueBackend::new("redis://127.0.0.1:6379").await?;
/// backend.set("product:1", &bytes).await?;
/// let data = backend.get("product:1").await?;
/// ```
pub trait KeyValueBackend: Send + Sync {
    /// Read one string value.
    ///
    /// # Returns
    ///
    /// - `Some(bytes)` if the key exists
    /// - `None` if it does not
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the read.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Read many string values in one round-trip.
    ///
    /// The result has exactly one entry per requested key, in request order,
    /// with `None` for absent keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the read.
    fn multi_get(
        &self,
        keys: &[String],
    ) -> impl Future<Output = Result<Vec<Option<Vec<u8>>>>> + Send;

    /// Write one string value, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set(&self, key: &str, value: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Write many string values in one round-trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn multi_set(&self, entries: &[(String, Vec<u8>)]) -> impl Future<Output = Result<()>> + Send;

    /// Delete keys of any type in one round-trip. Absent keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, keys: &[String]) -> impl Future<Output = Result<()>> + Send;

    /// Add members to a set, creating it if needed. Existing members are kept once.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_add(&self, key: &str, members: &[String]) -> impl Future<Output = Result<()>> + Send;

    /// Remove members from a set. Absent members are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_remove(&self, key: &str, members: &[String])
    -> impl Future<Output = Result<()>> + Send;

    /// All members of a set, in backend order. An absent set is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn set_members(&self, key: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Number of members in a set. An absent set has zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn set_cardinality(&self, key: &str) -> impl Future<Output = Result<usize>> + Send;

    /// Keys matching a glob pattern of the form `prefix*`.
    ///
    /// Used only by maintenance passes; may take several round-trips.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn scan_keys(&self, pattern: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}
