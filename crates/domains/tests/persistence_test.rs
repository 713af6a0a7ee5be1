//! Integration tests for `PersistenceStore` against a real pgvector-backed
//! Postgres (§10.5). Requires Docker.
//!
//! Run with: cargo test -p storyline-domains --features test-utils --test persistence_test

#![cfg(feature = "test-utils")]

use std::collections::HashMap;

use chrono::NaiveDate;
use storyline_domains::{testutil::postgres_container, EnrichedFeatures, GraphEdge, PersistenceStore};

async fn seed_article(store: &PersistenceStore, url: &str, title: &str) -> storyline_domains::ArticleId {
    sqlx::query_as::<_, (storyline_domains::ArticleId,)>(
        "INSERT INTO articles (url, title, source) VALUES ($1, $2, 'test-source') RETURNING id",
    )
    .bind(url)
    .bind(title)
    .fetch_one(store.pool())
    .await
    .unwrap()
    .0
}

#[tokio::test]
async fn save_features_is_atomic_on_mid_transaction_failure() {
    let (_container, pool) = postgres_container().await;
    let store = PersistenceStore::new(pool);
    let article_id = seed_article(&store, "https://example.test/a", "Headline A").await;

    let mut entities = HashMap::new();
    entities.insert("ORG".to_string(), vec!["Acme Corp".to_string()]);
    let features = EnrichedFeatures {
        embedding: Some(vec![0.1; 1536]),
        entities,
        event_type: Some("EARNINGS_RELEASE".to_string()),
        surprise_score: Some(0.3),
    };

    store
        .save_features(article_id, &features, "text-embedding-3-small")
        .await
        .expect("save_features should succeed");

    let by_id = store.fetch_by_ids(&[article_id]).await.unwrap();
    assert_eq!(by_id.len(), 1);
    assert_eq!(by_id[0].entities["ORG"], vec!["Acme Corp".to_string()]);
    assert!(by_id[0].article.embedding.is_some());
}

#[tokio::test]
async fn save_edges_upserts_idempotently() {
    let (_container, pool) = postgres_container().await;
    let store = PersistenceStore::new(pool);
    let a = seed_article(&store, "https://example.test/b1", "B1").await;
    let b = seed_article(&store, "https://example.test/b2", "B2").await;

    let run_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
    let edge = GraphEdge::new(a, b, 0.8, 0.5, 0.6, 0.68, run_date).unwrap();

    store.save_edges(&[edge.clone()]).await.unwrap();
    store.save_edges(&[edge]).await.unwrap();

    let edges = store.fetch_edges(run_date, 0.0).await.unwrap();
    assert_eq!(edges.len(), 1, "re-saving the same edge must not duplicate the row");
}

#[tokio::test]
async fn save_story_relationship_dedupes_on_repeat_run() {
    let (_container, pool) = postgres_container().await;
    let store = PersistenceStore::new(pool);
    let a1 = seed_article(&store, "https://example.test/c1", "C1").await;
    let a2 = seed_article(&store, "https://example.test/c2", "C2").await;

    let new_story = storyline_domains::NewStory {
        title: "Older story".to_string(),
        connection_rationale: "rationale".to_string(),
        analysis_summary: "summary".to_string(),
        essence_text: "essence".to_string(),
        context_snippets: vec!["snippet".to_string()],
        essence_embedding: vec![0.2; 1536],
        affected_assets: None,
    };
    let parent_id = store.save_story(&new_story, &[a1]).await.unwrap();

    let child_story = storyline_domains::NewStory {
        title: "Newer story".to_string(),
        ..new_story
    };
    let child_id = store.save_story(&child_story, &[a2]).await.unwrap();

    store
        .save_story_relationship(child_id, parent_id, storyline_domains::EVOLVED_FROM, "test")
        .await
        .unwrap();
    store
        .save_story_relationship(child_id, parent_id, storyline_domains::EVOLVED_FROM, "test")
        .await
        .unwrap();

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM story_relationships WHERE source_story_id = $1 AND target_story_id = $2",
    )
    .bind(child_id)
    .bind(parent_id)
    .fetch_one(store.pool())
    .await
    .unwrap();

    assert_eq!(count, 1, "repeating the same relationship must not duplicate the row");
}
