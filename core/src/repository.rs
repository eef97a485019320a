//! The product projection repository.
//!
//! # Overview
//!
//! [`ProductProjectionRepository`] keeps two structures in the backend:
//!
//! ```text
//! product:<id>   →  encoded ProductProjection   (primary entries)
//! products:all   →  { "<id>", "<id>", ... }      (index set)
//! ```
//!
//! Writes touch both with two independent backend calls, so the structures
//! can drift apart when a call fails or a process dies in between:
//!
//! - `save` writes the primary entry first, then the index member. A failure
//!   in between leaves a record that `find` serves but `find_all` omits.
//! - `delete` removes the primary entry first, then the index member. A
//!   failure in between leaves a dangling member that `find_all` skips.
//!
//! Reads tolerate drift instead of failing on it, and [`reconcile`] repairs it
//! on demand.
//!
//! # Concurrency
//!
//! The repository holds no mutable state and takes no locks. Concurrent
//! callers rely on the backend's per-key atomicity: two saves of the same ID
//! are last-write-wins, and a save racing a delete may end either way.
//!
//! # Timeouts
//!
//! Every backend call runs under the repository's operation timeout and fails
//! with [`ProjectionError::Timeout`] when it expires. Nothing is retried.
//!
//! [`reconcile`]: ProductProjectionRepository::reconcile

use crate::backend::KeyValueBackend;
use crate::codec::ProjectionCodec;
use crate::config::{DEFAULT_OPERATION_TIMEOUT, ProjectionCacheConfig};
use crate::error::{ProjectionError, Result};
use crate::keys::KeySpace;
use crate::metrics::CacheMetrics;
use crate::projection::{ProductId, ProductProjection};
use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

/// A stored record that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptRecord {
    /// ID taken from the index member
    pub id: ProductId,
    /// Backend key of the record
    pub key: String,
    /// Decoder failure
    pub reason: String,
}

/// Outcome of a bulk read, including what had to be skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindAllReport {
    /// Decoded projections, in backend index order
    pub projections: Vec<ProductProjection>,
    /// Number of index members read
    pub indexed: usize,
    /// Indexed IDs with no primary entry (drift)
    pub missing: Vec<ProductId>,
    /// Records that failed to decode
    pub corrupt: Vec<CorruptRecord>,
}

impl FindAllReport {
    /// Whether every indexed ID produced a projection.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.corrupt.is_empty() && self.projections.len() == self.indexed
    }
}

/// Outcome of a [`ProductProjectionRepository::reconcile`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Index members removed because their primary entry was gone
    pub pruned: Vec<ProductId>,
    /// IDs added back to the index because their primary entry existed
    pub reindexed: Vec<ProductId>,
    /// Index members removed because they are not canonical product IDs
    pub invalid: Vec<String>,
}

impl ReconcileReport {
    /// Whether the pass found nothing to repair.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.pruned.is_empty() && self.reindexed.is_empty() && self.invalid.is_empty()
    }
}

/// Read-optimized product cache over a key-value backend.
///
/// # Example
///
/// ```ignore
/// use product_projection_core::{ProductProjection, ProductProjectionRepository};
/// use product_projection_redis::RedisKeyValueBackend;
///
/// let backend = RedisKeyValueBackend::new("redis://127.0.0.1:6379").await?;
/// let repository = ProductProjectionRepository::new(backend);
///
/// repository.save(&ProductProjection::new(105_069, "Widget")).await?;
/// let widget = repository.find(105_069).await?;
/// let everything = repository.find_all().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductProjectionRepository<B> {
    backend: B,
    keys: KeySpace,
    operation_timeout: Duration,
}

impl<B: KeyValueBackend> ProductProjectionRepository<B> {
    /// Create a repository with the default key layout and timeout.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_key_space(backend, KeySpace::default())
    }

    /// Create a repository with a custom key layout.
    #[must_use]
    pub const fn with_key_space(backend: B, keys: KeySpace) -> Self {
        Self {
            backend,
            keys,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Create a repository from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Config`] if the configuration is invalid.
    pub fn from_config(backend: B, config: &ProjectionCacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_key_space(backend, config.key_space())
            .with_operation_timeout(config.operation_timeout))
    }

    /// Use a different timeout for every backend call made through this handle.
    ///
    /// Clone the repository first to scope a timeout to one caller:
    ///
    /// ```ignore
    /// let fast = repository.clone().with_operation_timeout(Duration::from_millis(50));
    /// fast.find(7).await?;
    /// ```
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Per-call backend timeout.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Key layout in use.
    #[must_use]
    pub const fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    /// Underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Look up one projection by ID.
    ///
    /// Does not consult the index: a record missing from the index is still
    /// found, and a dangling index member yields `None`. An empty stored value
    /// counts as absent.
    ///
    /// # Errors
    ///
    /// - [`ProjectionError::BackendUnavailable`] / [`ProjectionError::Timeout`] if the backend is degraded
    /// - [`ProjectionError::Decode`] if the stored record is corrupt or belongs to another ID
    pub async fn find(&self, id: impl Into<ProductId>) -> Result<Option<ProductProjection>> {
        self.observe("find", self.fetch_one(id.into())).await
    }

    /// Read every indexed projection.
    ///
    /// Order follows the backend's set iteration and must be treated as
    /// unordered. Indexed IDs without a primary entry are skipped, as are
    /// corrupt records (logged and counted); use
    /// [`find_all_with_report`](Self::find_all_with_report) to see them.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::BackendUnavailable`] / [`ProjectionError::Timeout`]
    /// if the backend is degraded.
    pub async fn find_all(&self) -> Result<Vec<ProductProjection>> {
        Ok(self.find_all_with_report().await?.projections)
    }

    /// Read every indexed projection and report what was skipped.
    ///
    /// One index read, then (only if the index is non-empty) one batched
    /// multi-get of all derived primary keys.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::BackendUnavailable`] / [`ProjectionError::Timeout`]
    /// if the backend is degraded, or [`ProjectionError::Backend`] if the
    /// multi-get answer does not match the request.
    pub async fn find_all_with_report(&self) -> Result<FindAllReport> {
        self.observe("find_all", self.fetch_all()).await
    }

    /// Store a projection, replacing any previous record with the same ID.
    ///
    /// Writes the primary entry, then adds the ID to the index. If the second
    /// call fails the record is still served by `find` but omitted from
    /// `find_all` until a later save or [`reconcile`](Self::reconcile).
    ///
    /// # Errors
    ///
    /// - [`ProjectionError::Encode`] if the projection cannot be encoded (nothing is written)
    /// - [`ProjectionError::BackendUnavailable`] / [`ProjectionError::Timeout`] if the backend is degraded
    pub async fn save(&self, projection: &ProductProjection) -> Result<()> {
        self.observe("save", self.write_one(projection)).await
    }

    /// Store many projections with two batched calls.
    ///
    /// Every projection is encoded before anything is written. Then all
    /// primary entries are written in one call and all IDs are added to the
    /// index in a second call; drift semantics match [`save`](Self::save).
    /// An empty slice makes no backend calls.
    ///
    /// # Errors
    ///
    /// Same as [`save`](Self::save).
    pub async fn save_many(&self, projections: &[ProductProjection]) -> Result<()> {
        if projections.is_empty() {
            return Ok(());
        }
        self.observe("save_many", self.write_many(projections)).await
    }

    /// Remove a projection and its index membership.
    ///
    /// Deleting an ID that was never cached is a no-op. If the primary entry
    /// is removed but the index update fails, the ID stays indexed and is
    /// skipped by `find_all`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::BackendUnavailable`] / [`ProjectionError::Timeout`]
    /// if the backend is degraded.
    pub async fn delete(&self, id: impl Into<ProductId>) -> Result<()> {
        self.observe("delete", self.remove_one(id.into())).await
    }

    /// Remove every indexed projection and the index itself.
    ///
    /// Primary keys are derived from the raw index members, so entries are
    /// removed even for members that are not valid IDs. Primary entries that
    /// were never indexed are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::BackendUnavailable`] / [`ProjectionError::Timeout`]
    /// if the backend is degraded. Work done before the failure is not undone.
    pub async fn clear(&self) -> Result<()> {
        self.observe("clear", self.remove_all()).await
    }

    /// Current index membership.
    ///
    /// Members that are not canonical IDs are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::BackendUnavailable`] / [`ProjectionError::Timeout`]
    /// if the backend is degraded.
    pub async fn ids(&self) -> Result<Vec<ProductId>> {
        self.observe("ids", self.indexed_ids()).await
    }

    /// Number of index members.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::BackendUnavailable`] / [`ProjectionError::Timeout`]
    /// if the backend is degraded.
    pub async fn count(&self) -> Result<usize> {
        self.observe(
            "count",
            self.call("scard", self.backend.set_cardinality(self.keys.index_key())),
        )
        .await
    }

    /// Repair drift between the index and the primary entries.
    ///
    /// A maintenance pass, never run implicitly:
    /// 1. Indexed IDs whose primary entry is absent or empty are removed from
    ///    the index, along with members that are not canonical IDs.
    /// 2. Non-empty primary entries found by scanning the key space but
    ///    missing from the index are added back.
    ///
    /// Both steps use the same presence rule as `find_all`, so a second pass
    /// over an undisturbed store finds nothing to repair.
    ///
    /// The pass is not atomic. A save or delete racing it can be undone in the
    /// index (never in the primary entries); run it when writers are quiet.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::BackendUnavailable`] / [`ProjectionError::Timeout`]
    /// if the backend is degraded. Repairs applied before the failure stay.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.observe("reconcile", self.repair_index()).await
    }

    async fn fetch_one(&self, id: ProductId) -> Result<Option<ProductProjection>> {
        let key = self.keys.primary_key(id);
        let data = self.call("get", self.backend.get(&key)).await?;

        let Some(bytes) = data.filter(|bytes| !bytes.is_empty()) else {
            CacheMetrics::record_lookup(false);
            tracing::debug!(product_id = %id, "Projection cache miss");
            return Ok(None);
        };

        let projection = decode_for(id, &key, &bytes).inspect_err(|e| {
            CacheMetrics::record_corrupt(1);
            tracing::warn!(product_id = %id, key = %key, error = %e, "Corrupt projection record");
        })?;

        CacheMetrics::record_lookup(true);
        tracing::debug!(product_id = %id, "Projection cache hit");
        Ok(Some(projection))
    }

    async fn fetch_all(&self) -> Result<FindAllReport> {
        let ids = self.indexed_ids().await?;
        if ids.is_empty() {
            tracing::debug!("Projection index is empty");
            return Ok(FindAllReport::default());
        }

        let keys = self.keys.primary_keys(&ids);
        let values = self.multi_get_exact(&keys).await?;

        let mut report = FindAllReport {
            projections: Vec::with_capacity(ids.len()),
            indexed: ids.len(),
            ..FindAllReport::default()
        };

        for ((id, key), value) in ids.into_iter().zip(keys).zip(values) {
            let Some(bytes) = value.filter(|bytes| !bytes.is_empty()) else {
                report.missing.push(id);
                continue;
            };
            match decode_for(id, &key, &bytes) {
                Ok(projection) => report.projections.push(projection),
                Err(e) => {
                    tracing::warn!(product_id = %id, key = %key, error = %e, "Skipping corrupt projection record");
                    report.corrupt.push(CorruptRecord {
                        id,
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        CacheMetrics::record_drift(report.missing.len());
        CacheMetrics::record_corrupt(report.corrupt.len());
        if !report.missing.is_empty() {
            tracing::warn!(
                missing = report.missing.len(),
                indexed = report.indexed,
                "Index members without primary record"
            );
        }

        tracing::debug!(
            count = report.projections.len(),
            indexed = report.indexed,
            "Read all projections"
        );
        Ok(report)
    }

    async fn write_one(&self, projection: &ProductProjection) -> Result<()> {
        let id = projection.id;
        let bytes = ProjectionCodec::encode(projection)?;
        let key = self.keys.primary_key(id);

        self.call("set", self.backend.set(&key, &bytes)).await?;
        self.call(
            "sadd",
            self.backend.set_add(self.keys.index_key(), &[id.to_string()]),
        )
        .await?;

        tracing::debug!(product_id = %id, bytes = bytes.len(), "Saved projection");
        Ok(())
    }

    async fn write_many(&self, projections: &[ProductProjection]) -> Result<()> {
        let mut entries = Vec::with_capacity(projections.len());
        let mut members = Vec::with_capacity(projections.len());
        for projection in projections {
            entries.push((
                self.keys.primary_key(projection.id),
                ProjectionCodec::encode(projection)?,
            ));
            members.push(projection.id.to_string());
        }

        self.call("mset", self.backend.multi_set(&entries)).await?;
        self.call("sadd", self.backend.set_add(self.keys.index_key(), &members))
            .await?;

        tracing::debug!(count = projections.len(), "Saved projections");
        Ok(())
    }

    async fn remove_one(&self, id: ProductId) -> Result<()> {
        let key = self.keys.primary_key(id);

        self.call("del", self.backend.delete(&[key])).await?;
        self.call(
            "srem",
            self.backend.set_remove(self.keys.index_key(), &[id.to_string()]),
        )
        .await?;

        tracing::debug!(product_id = %id, "Deleted projection");
        Ok(())
    }

    async fn remove_all(&self) -> Result<()> {
        let members = self
            .call("smembers", self.backend.set_members(self.keys.index_key()))
            .await?;

        if !members.is_empty() {
            let keys: Vec<String> = members
                .iter()
                .map(|member| self.keys.primary_key_for_member(member))
                .collect();
            self.call("del", self.backend.delete(&keys)).await?;
        }

        self.call(
            "del",
            self.backend.delete(&[self.keys.index_key().to_string()]),
        )
        .await?;

        tracing::info!(cleared = members.len(), "Cleared projection cache");
        Ok(())
    }

    async fn repair_index(&self) -> Result<ReconcileReport> {
        let members = self
            .call("smembers", self.backend.set_members(self.keys.index_key()))
            .await?;

        let mut report = ReconcileReport::default();
        let mut ids = Vec::with_capacity(members.len());
        for member in members {
            match ProductId::parse(&member) {
                Some(id) => ids.push(id),
                None => report.invalid.push(member),
            }
        }
        report.invalid.sort_unstable();

        if !ids.is_empty() {
            let values = self.multi_get_exact(&self.keys.primary_keys(&ids)).await?;
            report.pruned = ids
                .iter()
                .zip(values)
                .filter(|(_, value)| !is_present(value.as_deref()))
                .map(|(id, _)| *id)
                .collect();
        }

        let indexed: HashSet<ProductId> = ids.iter().copied().collect();
        let scanned = self
            .call("scan", self.backend.scan_keys(&self.keys.scan_pattern()))
            .await?;
        let mut candidates: Vec<ProductId> = scanned
            .iter()
            .filter_map(|key| self.keys.id_from_primary_key(key))
            .filter(|id| !indexed.contains(id))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        // Same presence rule as the prune step, or the next pass undoes this one
        if !candidates.is_empty() {
            let values = self
                .multi_get_exact(&self.keys.primary_keys(&candidates))
                .await?;
            report.reindexed = candidates
                .into_iter()
                .zip(values)
                .filter(|(_, value)| is_present(value.as_deref()))
                .map(|(id, _)| id)
                .collect();
        }

        // Canonical IDs render back to the exact member string
        let stale: Vec<String> = report
            .pruned
            .iter()
            .map(ToString::to_string)
            .chain(report.invalid.iter().cloned())
            .collect();
        if !stale.is_empty() {
            self.call("srem", self.backend.set_remove(self.keys.index_key(), &stale))
                .await?;
        }
        if !report.reindexed.is_empty() {
            let members: Vec<String> = report.reindexed.iter().map(ToString::to_string).collect();
            self.call("sadd", self.backend.set_add(self.keys.index_key(), &members))
                .await?;
        }

        tracing::info!(
            pruned = report.pruned.len(),
            invalid = report.invalid.len(),
            reindexed = report.reindexed.len(),
            "Reconciled projection index"
        );
        Ok(report)
    }

    async fn indexed_ids(&self) -> Result<Vec<ProductId>> {
        let members = self
            .call("smembers", self.backend.set_members(self.keys.index_key()))
            .await?;

        Ok(members
            .iter()
            .filter_map(|member| {
                let id = ProductId::parse(member);
                if id.is_none() {
                    tracing::warn!(member = %member, "Ignoring non-numeric index member");
                }
                id
            })
            .collect())
    }

    async fn multi_get_exact(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let values = self.call("mget", self.backend.multi_get(keys)).await?;
        if values.len() != keys.len() {
            return Err(ProjectionError::Backend {
                operation: "mget",
                reason: format!("requested {} keys, got {} values", keys.len(), values.len()),
            });
        }
        Ok(values)
    }

    /// Run one backend call under the operation timeout.
    async fn call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.operation_timeout, call)
            .await
            .map_err(|_| ProjectionError::Timeout {
                operation,
                timeout: self.operation_timeout,
            })?
    }

    /// Record duration and failures of a repository operation.
    async fn observe<T>(
        &self,
        operation: &'static str,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = work.await;
        CacheMetrics::record_duration(operation, started.elapsed());

        if let Err(e) = &result {
            CacheMetrics::record_error(operation);
            tracing::warn!(operation, error = %e, "Projection cache operation failed");
        }
        result
    }
}

/// Whether a stored value counts as a record; an empty value does not.
fn is_present(value: Option<&[u8]>) -> bool {
    value.is_some_and(|bytes| !bytes.is_empty())
}

/// Decode a record and check it belongs to the ID it was stored under.
fn decode_for(id: ProductId, key: &str, bytes: &[u8]) -> Result<ProductProjection> {
    let projection = ProjectionCodec::decode_keyed(key, bytes)?;
    if projection.id != id {
        return Err(ProjectionError::Decode {
            key: key.to_string(),
            reason: format!("record belongs to product {}", projection.id),
        });
    }
    Ok(projection)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_for_rejects_foreign_record() {
        let bytes = ProjectionCodec::encode(&ProductProjection::new(6, "Other")).unwrap();
        let err = decode_for(ProductId::new(5), "product:5", &bytes).unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("belongs to product 6"));
    }

    #[test]
    fn test_report_completeness() {
        let mut report = FindAllReport {
            projections: vec![ProductProjection::new(1, "A")],
            indexed: 1,
            ..FindAllReport::default()
        };
        assert!(report.is_complete());

        report.indexed = 2;
        report.missing.push(ProductId::new(2));
        assert!(!report.is_complete());
        assert!(ReconcileReport::default().is_clean());
    }
}
