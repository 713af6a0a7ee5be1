//! `PersistenceStore` (C6): the single facade over all durable state (§4.6).
//! Every other component reaches the database only through this type — no
//! component holds a bare `PgPool` of its own.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use pgvector::Vector;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::articles::models::article::ArticleRow;
use crate::articles::Article;
use crate::edges::GraphEdge;
use crate::entities::{ArticleEntity, Entity};
use crate::events::EconomicEvent;
use crate::ids::{ArticleId, StoryId};
use crate::processing::{ProcessingLog, ProcessingStatus};
use crate::stories::{NewStory, SimilarStory, Story, StoryArticleLink, StoryRelationship};
use storyline_core::PersistenceError;

/// Enriched features produced by the Phase 1 pipeline (C1-C5) for one
/// article, ready to be committed atomically by `save_features`.
#[derive(Debug, Clone, Default)]
pub struct EnrichedFeatures {
    pub embedding: Option<Vec<f32>>,
    /// entity_type -> names
    pub entities: HashMap<String, Vec<String>>,
    pub event_type: Option<String>,
    pub surprise_score: Option<f64>,
}

impl EnrichedFeatures {
    pub fn has_any_signal(&self) -> bool {
        self.embedding.is_some() || !self.entities.is_empty()
    }
}

/// An article together with its joined entities, as returned by
/// `fetch_unprocessed` / `fetch_processed` / `fetch_by_ids` (§4.6).
#[derive(Debug, Clone)]
pub struct ArticleWithEntities {
    pub article: Article,
    pub entities: HashMap<String, Vec<String>>,
}

pub struct PersistenceStore {
    pool: PgPool,
}

impl PersistenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Articles with no log row, or `status = pending` (§4.6).
    pub async fn fetch_unprocessed(&self, limit: i64) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT a.id, a.url, a.title, a.source, a.publication_time, a.fetched_time, a.embedding
            FROM articles a
            LEFT JOIN processing_log pl ON pl.article_id = a.id
            WHERE pl.article_id IS NULL OR pl.status = 'pending'
            ORDER BY a.fetched_time ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Articles with `status = success` and a non-null embedding, joined with
    /// their entities (§4.6).
    pub async fn fetch_processed(&self, limit: i64) -> Result<Vec<ArticleWithEntities>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT a.id, a.url, a.title, a.source, a.publication_time, a.fetched_time, a.embedding
            FROM articles a
            JOIN processing_log pl ON pl.article_id = a.id
            WHERE pl.status = 'success' AND a.embedding IS NOT NULL
            ORDER BY a.fetched_time ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.join_entities(rows.into_iter().map(Into::into).collect())
            .await
    }

    /// Articles joined with their entities as a single aggregate row (§4.6).
    pub async fn fetch_by_ids(&self, ids: &[ArticleId]) -> Result<Vec<ArticleWithEntities>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let raw_ids: Vec<i64> = ids.iter().map(|id| id.into_inner()).collect();
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, url, title, source, publication_time, fetched_time, embedding
            FROM articles WHERE id = ANY($1)
            "#,
        )
        .bind(&raw_ids)
        .fetch_all(&self.pool)
        .await?;

        self.join_entities(rows.into_iter().map(Into::into).collect())
            .await
    }

    async fn join_entities(&self, articles: Vec<Article>) -> Result<Vec<ArticleWithEntities>> {
        let mut out = Vec::with_capacity(articles.len());
        for article in articles {
            let entities = ArticleEntity::names_by_type(article.id, &self.pool).await?;
            out.push(ArticleWithEntities { article, entities });
        }
        Ok(out)
    }

    /// Single transaction: upsert entities, upsert article<->entity links,
    /// upsert processing log, update article embedding. Rolls back atomically
    /// on any error, then attempts a best-effort out-of-transaction log write
    /// marking the article `failed` (§4.6, §8).
    pub async fn save_features(
        &self,
        article_id: ArticleId,
        features: &EnrichedFeatures,
        model_version: &str,
    ) -> Result<(), PersistenceError> {
        let result = self.save_features_tx(article_id, features, model_version).await;

        if let Err(ref err) = result {
            let truncated = crate::processing::models::processing_log::truncate_error_message(
                &err.to_string(),
                500,
            );
            let log = ProcessingLog {
                article_id,
                status: ProcessingStatus::Failed,
                embedding_model_version: Some(model_version.to_string()),
                event_type: None,
                surprise_score: None,
                error_message: Some(truncated),
            };
            // Best-effort: a failure here must not mask the original error.
            if let Err(log_err) = log.upsert(&self.pool).await {
                tracing::warn!(article_id = %article_id, error = %log_err, "failed to write failure log after rollback");
            }
        }

        result
    }

    async fn save_features_tx(
        &self,
        article_id: ArticleId,
        features: &EnrichedFeatures,
        model_version: &str,
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await.map_err(PersistenceError::from_sqlx)?;

        for (entity_type, names) in &features.entities {
            for name in names {
                let entity_row: (crate::ids::EntityId,) = sqlx::query_as(
                    r#"
                    INSERT INTO entities (name, entity_type)
                    VALUES ($1, $2)
                    ON CONFLICT (name, entity_type) DO UPDATE SET name = EXCLUDED.name
                    RETURNING id
                    "#,
                )
                .bind(name)
                .bind(entity_type)
                .fetch_one(&mut *tx)
                .await
                .map_err(PersistenceError::from_sqlx)?;

                sqlx::query(
                    r#"
                    INSERT INTO article_entities (article_id, entity_id)
                    VALUES ($1, $2)
                    ON CONFLICT (article_id, entity_id) DO NOTHING
                    "#,
                )
                .bind(article_id)
                .bind(entity_row.0)
                .execute(&mut *tx)
                .await
                .map_err(PersistenceError::from_sqlx)?;
            }
        }

        if let Some(embedding) = &features.embedding {
            sqlx::query("UPDATE articles SET embedding = $1 WHERE id = $2")
                .bind(Vector::from(embedding.clone()))
                .bind(article_id)
                .execute(&mut *tx)
                .await
                .map_err(PersistenceError::from_sqlx)?;
        }

        let status = if features.embedding.is_some() && !features.entities.is_empty() {
            ProcessingStatus::Success
        } else if features.has_any_signal() {
            ProcessingStatus::Partial
        } else {
            ProcessingStatus::Failed
        };

        sqlx::query(
            r#"
            INSERT INTO processing_log
                (article_id, status, embedding_model_version, event_type, surprise_score, error_message)
            VALUES ($1, $2, $3, $4, $5, NULL)
            ON CONFLICT (article_id) DO UPDATE SET
                status = EXCLUDED.status,
                embedding_model_version = EXCLUDED.embedding_model_version,
                event_type = EXCLUDED.event_type,
                surprise_score = EXCLUDED.surprise_score,
                error_message = NULL
            "#,
        )
        .bind(article_id)
        .bind(status.as_str())
        .bind(model_version)
        .bind(&features.event_type)
        .bind(features.surprise_score)
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::from_sqlx)?;

        tx.commit().await.map_err(PersistenceError::from_sqlx)?;
        Ok(())
    }

    /// Bulk upsert on `(source, target, run_date)` (§4.6, §4.7 step 3).
    pub async fn save_edges(&self, edges: &[GraphEdge]) -> Result<()> {
        GraphEdge::save_all(edges, &self.pool).await
    }

    /// Rows whose `total_score >= min_total` for `run_date` (§4.6, §4.8 step 1).
    pub async fn fetch_edges(&self, run_date: NaiveDate, min_total: f64) -> Result<Vec<GraphEdge>> {
        GraphEdge::fetch_for_run_date(run_date, min_total, &self.pool).await
    }

    /// Insert a story, returning its id, then upsert article links (§4.6).
    pub async fn save_story(
        &self,
        new_story: &NewStory,
        article_ids: &[ArticleId],
    ) -> Result<StoryId> {
        Story::save(new_story, article_ids, &self.pool).await
    }

    /// Single-row insert; on unique conflict, no-op (§4.6, §8 S4).
    pub async fn save_story_relationship(
        &self,
        source_story_id: StoryId,
        target_story_id: StoryId,
        relationship_type: &str,
        created_by: &str,
    ) -> Result<()> {
        StoryRelationship::save(
            source_story_id,
            target_story_id,
            relationship_type,
            created_by,
            &self.pool,
        )
        .await
    }

    /// The `k` active stories nearest `vector` by cosine distance (§4.6, §4.12).
    pub async fn fetch_similar_stories(
        &self,
        vector: &[f32],
        k: i64,
        window_days: Option<i64>,
    ) -> Result<Vec<SimilarStory>> {
        Story::fetch_similar(vector, k, window_days, &self.pool).await
    }

    pub async fn fetch_story(&self, id: StoryId) -> Result<Story> {
        Story::find_by_id(id, &self.pool).await
    }

    pub async fn article_ids_for_story(&self, id: StoryId) -> Result<Vec<ArticleId>> {
        StoryArticleLink::article_ids_for_story(id, &self.pool).await
    }

    /// Events in range matching any keyword (§4.6 `find_events`, §4.5).
    pub async fn find_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        keywords: &[String],
    ) -> Result<Vec<EconomicEvent>> {
        EconomicEvent::find_in_range(start, end, keywords, &self.pool).await
    }

    /// Bulk upsert on `(event_name, country, event_time)` (§4.6 `save_events`).
    pub async fn save_events(&self, events: &[EconomicEvent]) -> Result<()> {
        EconomicEvent::save_all(events, &self.pool).await
    }

    /// Find-or-create an entity by `(name, type)` (§3).
    pub async fn upsert_entity(&self, name: &str, entity_type: &str) -> Result<Entity> {
        Entity::upsert(name, entity_type, &self.pool).await
    }
}
