//! Integration tests for [`RedisKeyValueBackend`] with a real Redis instance.
//!
//! These tests use testcontainers to spin up Redis and validate:
//! - Save/find round-trip through real `SET`/`GET`
//! - Bulk reads through `SMEMBERS` + `MGET`
//! - Drift tolerance when primary keys vanish out-of-band
//! - Concurrent writers on one ID
//! - Index reconciliation over `SCAN`
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they require
//! Docker to be running (for testcontainers).
//!
//! To run explicitly:
//! ```bash
//! cargo test -p product-projection-redis --test redis_integration_tests -- --ignored
//! ```
//!
//! # Panics
//!
//! These tests use `expect()` for setup failures, which is acceptable in test code.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use product_projection_core::{
    KeySpace, KeyValueBackend, ProductId, ProductProjection, ProductProjectionRepository,
};
use product_projection_redis::RedisKeyValueBackend;
use product_projection_testing::{fixtures, init_test_tracing};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::redis::{REDIS_PORT, Redis};

static NAMESPACE: AtomicUsize = AtomicUsize::new(0);

/// Helper to start a Redis container and connect a backend to it.
///
/// Returns both the container (to keep it alive) and the backend.
///
/// # Panics
/// Panics if container setup fails (test environment issue).
async fn setup_redis() -> (ContainerAsync<Redis>, RedisKeyValueBackend) {
    init_test_tracing();

    let container = Redis::default()
        .start()
        .await
        .expect("Failed to start redis container");
    let port = container
        .get_host_port_ipv4(REDIS_PORT)
        .await
        .expect("Failed to get redis port");
    let url = format!("redis://127.0.0.1:{port}");

    // Wait for redis to accept connections
    let mut retries = 0;
    loop {
        if let Ok(backend) = RedisKeyValueBackend::builder()
            .url(url.as_str())
            .connect_timeout(Duration::from_secs(1))
            .build()
            .await
        {
            return (container, backend);
        }

        assert!(retries < 30, "Failed to connect after {retries} retries");
        retries += 1;
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// Repository with a key space no other test touches.
fn isolated_repository(
    backend: &RedisKeyValueBackend,
) -> ProductProjectionRepository<RedisKeyValueBackend> {
    let n = NAMESPACE.fetch_add(1, Ordering::SeqCst);
    ProductProjectionRepository::with_key_space(
        backend.clone(),
        KeySpace::new(format!("t{n}:product:"), format!("t{n}:products:all")),
    )
}

#[tokio::test]
#[ignore]
async fn test_save_and_find_round_trip() {
    let (_container, backend) = setup_redis().await;
    let repository = isolated_repository(&backend);

    repository.save(&fixtures::widget()).await.unwrap();
    repository.save(&fixtures::product(42)).await.unwrap();

    assert_eq!(
        repository.find(fixtures::WIDGET_ID).await.unwrap(),
        Some(fixtures::widget())
    );
    assert_eq!(repository.find(42).await.unwrap(), Some(fixtures::product(42)));
    assert_eq!(repository.find(43).await.unwrap(), None);
}

#[tokio::test]
#[ignore]
async fn test_find_all_and_delete() {
    let (_container, backend) = setup_redis().await;
    let repository = isolated_repository(&backend);

    assert!(repository.find_all().await.unwrap().is_empty());

    repository.save(&fixtures::product(1)).await.unwrap();
    repository.save(&fixtures::product(2)).await.unwrap();
    repository.delete(1).await.unwrap();

    assert_eq!(repository.find_all().await.unwrap(), vec![fixtures::product(2)]);
    assert_eq!(repository.count().await.unwrap(), 1);
}

#[tokio::test]
#[ignore]
async fn test_save_many_and_clear() {
    let (_container, backend) = setup_redis().await;
    let repository = isolated_repository(&backend);
    let other = isolated_repository(&backend);
    other.save(&fixtures::product(1)).await.unwrap();

    let saved = fixtures::products(1..=200);
    repository.save_many(&saved).await.unwrap();
    let all = repository.find_all().await.unwrap();
    assert_eq!(fixtures::sorted_ids(&all), fixtures::sorted_ids(&saved));

    repository.clear().await.unwrap();

    assert!(repository.find_all().await.unwrap().is_empty());
    assert_eq!(repository.find(100).await.unwrap(), None);
    assert_eq!(
        backend
            .scan_keys(&repository.key_space().scan_pattern())
            .await
            .unwrap(),
        Vec::<String>::new()
    );
    assert_eq!(other.find(1).await.unwrap(), Some(fixtures::product(1)));
}

#[tokio::test]
#[ignore]
async fn test_drift_is_tolerated_and_reconciled() {
    let (_container, backend) = setup_redis().await;
    let repository = isolated_repository(&backend);
    repository
        .save_many(&fixtures::products([1, 2, 3]))
        .await
        .unwrap();

    // Out-of-band writes through the raw backend
    let keys = repository.key_space().clone();
    backend
        .delete(&[keys.primary_key(ProductId::new(2))])
        .await
        .unwrap();
    backend
        .set(
            &keys.primary_key(ProductId::new(9)),
            &product_projection_core::ProjectionCodec::encode(&fixtures::product(9)).unwrap(),
        )
        .await
        .unwrap();

    let report = repository.find_all_with_report().await.unwrap();
    assert_eq!(report.missing, vec![ProductId::new(2)]);
    assert_eq!(report.projections.len(), 2);
    assert_eq!(repository.find(9).await.unwrap(), Some(fixtures::product(9)));

    let reconciled = repository.reconcile().await.unwrap();
    assert_eq!(reconciled.pruned, vec![ProductId::new(2)]);
    assert_eq!(reconciled.reindexed, vec![ProductId::new(9)]);
    assert!(repository.find_all_with_report().await.unwrap().is_complete());
}

#[tokio::test]
#[ignore]
async fn test_corrupt_record_is_skipped() {
    let (_container, backend) = setup_redis().await;
    let repository = isolated_repository(&backend);
    repository
        .save_many(&fixtures::products([1, 2]))
        .await
        .unwrap();
    backend
        .set(
            &repository.key_space().primary_key(ProductId::new(1)),
            b"a:1:{i:0;s:3:\"php\";}",
        )
        .await
        .unwrap();

    assert!(repository.find(1).await.unwrap_err().is_decode());
    let report = repository.find_all_with_report().await.unwrap();
    assert_eq!(report.projections, vec![fixtures::product(2)]);
    assert_eq!(report.corrupt.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_saves_are_last_write_wins() {
    let (_container, backend) = setup_redis().await;
    let repository = isolated_repository(&backend);
    let a = ProductProjection::new(7, "a");
    let b = ProductProjection::new(7, "b").with_description("b".repeat(4096));

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let repository = repository.clone();
            let projection = if i % 2 == 0 { a.clone() } else { b.clone() };
            tokio::spawn(async move { repository.save(&projection).await })
        })
        .collect();
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let found = repository.find(7).await.unwrap().unwrap();
    assert!(found == a || found == b);
    assert_eq!(repository.count().await.unwrap(), 1);
}
