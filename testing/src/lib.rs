//! # Product Projection Testing
//!
//! Testing utilities for the product projection cache.
//!
//! This crate provides:
//! - [`InMemoryKeyValueBackend`]: a deterministic backend with failure and latency injection
//! - Fixtures for building projections
//! - Property-based testing strategies
//! - Test logging setup
//!
//! ## Example
//!
//! ```ignore
//! use product_projection_testing::{InMemoryKeyValueBackend, fixtures};
//! use product_projection_core::ProductProjectionRepository;
//!
//! #[tokio::test]
//! async fn test_widget_round_trip() {
//!     let backend = InMemoryKeyValueBackend::new();
//!     let repository = ProductProjectionRepository::new(backend.clone());
//!
//!     repository.save(&fixtures::widget()).await.unwrap();
//!
//!     assert_eq!(repository.find(105_069).await.unwrap(), Some(fixtures::widget()));
//! }
//! ```

pub mod projection_mocks;

/// Projection fixtures for tests.
pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use product_projection_core::{ProductId, ProductProjection};

    /// Product ID used by the load-test scenarios.
    pub const WIDGET_ID: i64 = 105_069;

    /// Fixed timestamp for deterministic records (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn fixed_timestamp() -> DateTime<Utc> {
        Utc.timestamp_opt(1_735_689_600, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// `{id: 105069, name: "Widget"}`
    #[must_use]
    pub fn widget() -> ProductProjection {
        ProductProjection::new(WIDGET_ID, "Widget")
    }

    /// A fully populated projection for `id`.
    #[must_use]
    pub fn product(id: i64) -> ProductProjection {
        ProductProjection::new(id, format!("Product {id}"))
            .with_sku(format!("SKU-{id:06}"))
            .with_description(format!("Description of product {id}"))
            .with_price(id.saturating_mul(100), "EUR")
            .with_attribute("source", "fixture")
            .with_updated_at(fixed_timestamp())
    }

    /// Projections for every ID in `ids`.
    #[must_use]
    pub fn products(ids: impl IntoIterator<Item = i64>) -> Vec<ProductProjection> {
        ids.into_iter().map(product).collect()
    }

    /// Sorted IDs of a batch of projections, for order-independent assertions.
    #[must_use]
    pub fn sorted_ids(projections: &[ProductProjection]) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = projections.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids
    }
}

/// Property-based testing strategies using proptest.
pub mod properties {
    use proptest::collection::{btree_map, hash_set};
    use proptest::option;
    use proptest::prelude::*;
    use product_projection_core::{ProductId, ProductProjection};

    /// Any product ID, including zero and negative values.
    pub fn arb_product_id() -> impl Strategy<Value = ProductId> {
        any::<i64>().prop_map(ProductId::new)
    }

    /// Arbitrary projections with every optional field exercised.
    pub fn arb_projection() -> impl Strategy<Value = ProductProjection> {
        (
            arb_product_id(),
            ".{0,40}",
            option::of("[A-Z0-9-]{1,12}"),
            option::of(".{0,200}"),
            option::of(any::<i64>()),
            option::of("[A-Z]{3}"),
            btree_map("[a-z_]{1,12}", ".{0,24}", 0..8),
            option::of(0i64..4_102_444_800),
        )
            .prop_map(
                |(id, name, sku, description, price_cents, currency, attributes, updated)| {
                    ProductProjection {
                        id,
                        name,
                        sku,
                        description,
                        price_cents,
                        currency,
                        attributes,
                        updated_at: updated
                            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0)),
                    }
                },
            )
    }

    /// Up to `max` projections with distinct IDs.
    pub fn arb_projections(max: usize) -> impl Strategy<Value = Vec<ProductProjection>> {
        (hash_set(any::<i64>(), 0..=max), arb_projection()).prop_map(|(ids, template)| {
            ids.into_iter()
                .map(|id| ProductProjection {
                    id: ProductId::new(id),
                    name: format!("{} #{id}", template.name),
                    ..template.clone()
                })
                .collect()
        })
    }
}

/// Install a test log subscriber once.
///
/// Honours `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use projection_mocks::{BackendCall, InMemoryKeyValueBackend};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_timestamp() {
        assert_eq!(
            fixtures::fixed_timestamp().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_fixture_products_are_distinct() {
        let batch = fixtures::products([3, 1, 2]);
        assert_eq!(batch.len(), 3);
        assert_eq!(
            fixtures::sorted_ids(&batch),
            vec![1.into(), 2.into(), 3.into()]
        );
        assert_ne!(batch[0], batch[1]);
    }
}
