//! Property-based tests for the repository
//!
//! Each case runs against a fresh in-memory backend.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use product_projection_core::{ProductProjection, ProductProjectionRepository};
use product_projection_testing::InMemoryKeyValueBackend;
use product_projection_testing::properties::{arb_product_id, arb_projection, arb_projections};
use proptest::prelude::*;
use std::collections::HashSet;

fn repository() -> (
    InMemoryKeyValueBackend,
    ProductProjectionRepository<InMemoryKeyValueBackend>,
) {
    let backend = InMemoryKeyValueBackend::new();
    (backend.clone(), ProductProjectionRepository::new(backend))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn save_then_find_round_trips(projection in arb_projection()) {
        let (_backend, repository) = repository();
        let found = tokio_test::block_on(async {
            repository.save(&projection).await.unwrap();
            repository.find(projection.id).await.unwrap()
        });
        prop_assert_eq!(found, Some(projection));
    }

    #[test]
    fn repeated_saves_index_once(projection in arb_projection(), times in 1usize..5) {
        let (_backend, repository) = repository();
        let all = tokio_test::block_on(async {
            for _ in 0..times {
                repository.save(&projection).await.unwrap();
            }
            repository.find_all().await.unwrap()
        });
        prop_assert_eq!(all, vec![projection]);
    }

    #[test]
    fn clear_forgets_every_saved_id(projections in arb_projections(20)) {
        let (backend, repository) = repository();
        tokio_test::block_on(async {
            for projection in &projections {
                repository.save(projection).await.unwrap();
            }
            repository.clear().await.unwrap();

            assert!(repository.find_all().await.unwrap().is_empty());
            for projection in &projections {
                assert_eq!(repository.find(projection.id).await.unwrap(), None);
            }
        });
        prop_assert!(backend.is_empty());
    }

    #[test]
    fn find_all_never_exceeds_index(
        projections in arb_projections(20),
        dropped in proptest::collection::vec(any::<prop::sample::Index>(), 0..5),
    ) {
        let (backend, repository) = repository();
        let (listed, indexed, drifted) = tokio_test::block_on(async {
            repository.save_many(&projections).await.unwrap();

            let mut drifted = HashSet::new();
            if !projections.is_empty() {
                for index in &dropped {
                    let id = index.get(&projections).id;
                    backend.remove_raw(&format!("product:{id}"));
                    drifted.insert(id);
                }
            }

            let listed = repository.find_all().await.unwrap();
            let indexed = repository.count().await.unwrap();
            (listed, indexed, drifted)
        });

        prop_assert!(listed.len() <= indexed);
        prop_assert_eq!(listed.len() + drifted.len(), indexed);
        prop_assert!(listed.iter().all(|p| !drifted.contains(&p.id)));
    }

    #[test]
    fn delete_removes_from_both_structures(
        projections in arb_projections(10),
        victim in arb_product_id(),
    ) {
        let (_backend, repository) = repository();
        let (found, listed) = tokio_test::block_on(async {
            repository.save_many(&projections).await.unwrap();
            repository.save(&ProductProjection::new(victim, "victim")).await.unwrap();
            repository.delete(victim).await.unwrap();
            (
                repository.find(victim).await.unwrap(),
                repository.find_all().await.unwrap(),
            )
        });

        prop_assert_eq!(found, None);
        prop_assert!(listed.iter().all(|p| p.id != victim));
    }
}
