//! Keyword and vector search through the facade.

mod common;

use std::collections::HashSet;

use common::{DIM, add_category, article, harness, harness_with, ids, in_portal};
use kbase::vector::{MockEmbeddingProvider, cosine_distance};
use kbase::{DocumentOrder, DocumentStatus, Error, KbaseConfig, SearchParams};
use kbase_core::PortalId;

const TITLES: [&str; 8] = [
    "reset password",
    "change email",
    "export contacts",
    "billing invoices",
    "delete account",
    "password policy",
    "two factor login",
    "api tokens",
];

async fn seeded() -> common::Harness {
    let h = harness();
    for (i, title) in TITLES.iter().enumerate() {
        h.kb.create(article(i as i64 + 1, title)).await.unwrap();
    }
    h.kb.create(in_portal(100, 2, "reset password")).await.unwrap();
    h
}

#[tokio::test]
async fn test_keyword_search_prefix_matches_last_token() {
    let h = seeded().await;
    let params = SearchParams::new().with_portal(PortalId(1)).with_query("reset pass");
    assert_eq!(ids(&h.kb.search(&params).await.unwrap()), vec![1]);

    let partial = SearchParams::new().with_portal(PortalId(1)).with_query("passw");
    let mut found = ids(&h.kb.search(&partial).await.unwrap());
    found.sort();
    assert_eq!(found, vec![1, 6]);
}

#[tokio::test]
async fn test_keyword_search_without_portal_spans_portals() {
    let h = seeded().await;
    let mut found = ids(&h.kb.search(&SearchParams::new().with_query("reset")).await.unwrap());
    found.sort();
    assert_eq!(found, vec![1, 100]);
}

#[tokio::test]
async fn test_keyword_search_applies_filters() {
    let h = harness();
    let en = add_category(&h.store, 1, "security", "en").await;
    let de = add_category(&h.store, 2, "security", "de").await;
    h.kb.create(
        article(1, "Password reset")
            .with_category(en)
            .with_status(DocumentStatus::Published),
    )
    .await
    .unwrap();
    h.kb.create(article(2, "Password zurücksetzen").with_category(de))
        .await
        .unwrap();
    h.kb.create(article(3, "Password rules")).await.unwrap();

    let base = SearchParams::new().with_portal(PortalId(1)).with_query("password");
    let mut all = ids(&h.kb.search(&base).await.unwrap());
    all.sort();
    assert_eq!(all, vec![1, 2, 3]);

    let german = base.clone().with_locale("de");
    assert_eq!(ids(&h.kb.search(&german).await.unwrap()), vec![2]);

    let published = base.clone().with_category_slug("security").with_status(DocumentStatus::Published);
    assert_eq!(ids(&h.kb.search(&published).await.unwrap()), vec![1]);
}

#[tokio::test]
async fn test_browse_orders_by_position() {
    let h = seeded().await;
    let params = SearchParams::new()
        .with_portal(PortalId(1))
        .with_order(DocumentOrder::Position)
        .with_limit(3);
    assert_eq!(ids(&h.kb.search(&params).await.unwrap()), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_vector_search_ranks_closest_term_first() {
    let h = seeded().await;
    let params = SearchParams::new()
        .with_portal(PortalId(1))
        .with_query("reset password");

    let found = h.kb.vector_search(&params).await.unwrap();
    assert_eq!(found[0].id.0, 1);
}

#[tokio::test]
async fn test_vector_search_returns_at_most_five_in_distance_order() {
    let h = seeded().await;
    let query = "password help";
    let params = SearchParams::new().with_portal(PortalId(1)).with_query(query);

    let found = h.kb.vector_search(&params).await.unwrap();
    assert!(found.len() <= 5);
    assert_eq!(found.len(), 5);

    let candidates: HashSet<i64> = (1..=8).collect();
    assert!(found.iter().all(|d| candidates.contains(&d.id.0)));

    let embedder = MockEmbeddingProvider::new(DIM);
    let q = embedder.embedding_for(query);
    let distances: Vec<f32> = found
        .iter()
        .map(|d| cosine_distance(&q, &embedder.embedding_for(&d.title.to_lowercase())))
        .collect();
    assert!(
        distances.windows(2).all(|w| w[0] <= w[1] + 1e-6),
        "distances not sorted: {distances:?}"
    );
}

#[tokio::test]
async fn test_vector_search_never_leaves_candidates() {
    let h = seeded().await;
    let params = SearchParams::new()
        .with_portal(PortalId(2))
        .with_query("reset password");
    assert_eq!(ids(&h.kb.vector_search(&params).await.unwrap()), vec![100]);

    let empty = SearchParams::new()
        .with_portal(PortalId(3))
        .with_query("reset password");
    assert!(h.kb.vector_search(&empty).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_vector_search_without_query_is_rejected() {
    let h = seeded().await;
    let err = h
        .kb
        .vector_search(&SearchParams::new().with_query("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_vector_limit_is_configurable() {
    let mut config = KbaseConfig::default();
    config.search.vector_limit = 2;
    let h = harness_with(config);
    for (i, title) in TITLES.iter().enumerate() {
        h.kb.create(article(i as i64 + 1, title)).await.unwrap();
    }

    let found = h
        .kb
        .vector_search(&SearchParams::new().with_query("api"))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
}
