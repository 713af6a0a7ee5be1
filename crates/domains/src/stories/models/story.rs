use anyhow::Result;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::ids::{ArticleId, StoryId};

/// A validated, enriched, synthesized narrative (§3). Never mutated in-place
/// by the core except `last_update_time` on revisit; `is_active` is owned by
/// an external deactivation policy that this crate only reads (§9).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub connection_rationale: String,
    pub analysis_summary: String,
    pub essence_text: String,
    #[sqlx(skip)]
    pub context_snippets: Vec<String>,
    #[sqlx(skip)]
    pub essence_embedding: Vec<f32>,
    #[sqlx(skip)]
    pub affected_assets: Option<Vec<String>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
}

/// Fields required to insert a new story; produced by the Orchestrator at the
/// end of a successful per-cluster path (§4.15 step h).
#[derive(Debug, Clone)]
pub struct NewStory {
    pub title: String,
    pub connection_rationale: String,
    pub analysis_summary: String,
    pub essence_text: String,
    pub context_snippets: Vec<String>,
    pub essence_embedding: Vec<f32>,
    pub affected_assets: Option<Vec<String>>,
}

/// Row shape returned by `fetch_similar_stories` / `HistoricalRetriever` (§4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarStory {
    pub story_id: StoryId,
    pub title: String,
    pub essence_text: String,
    pub distance: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct StoryRow {
    id: StoryId,
    title: String,
    connection_rationale: String,
    analysis_summary: String,
    essence_text: String,
    context_snippets: serde_json::Value,
    essence_embedding: Vector,
    affected_assets: Option<serde_json::Value>,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_update_time: DateTime<Utc>,
}

impl TryFrom<StoryRow> for Story {
    type Error = anyhow::Error;

    fn try_from(row: StoryRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            connection_rationale: row.connection_rationale,
            analysis_summary: row.analysis_summary,
            essence_text: row.essence_text,
            context_snippets: serde_json::from_value(row.context_snippets)?,
            essence_embedding: row.essence_embedding.to_vec(),
            affected_assets: row
                .affected_assets
                .map(serde_json::from_value)
                .transpose()?,
            is_active: row.is_active,
            created_at: row.created_at,
            last_update_time: row.last_update_time,
        })
    }
}

impl Story {
    /// Insert a new story and link the cluster's articles to it in one
    /// transaction, returning the assigned id (§4.6 `save_story`).
    pub async fn save(
        new: &NewStory,
        article_ids: &[ArticleId],
        pool: &PgPool,
    ) -> Result<StoryId> {
        let mut tx = pool.begin().await?;

        let (id,): (StoryId,) = sqlx::query_as(
            r#"
            INSERT INTO stories
                (title, connection_rationale, analysis_summary, essence_text,
                 context_snippets, essence_embedding, affected_assets, is_active, created_at, last_update_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, true, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(&new.title)
        .bind(&new.connection_rationale)
        .bind(&new.analysis_summary)
        .bind(&new.essence_text)
        .bind(serde_json::to_value(&new.context_snippets)?)
        .bind(Vector::from(new.essence_embedding.clone()))
        .bind(
            new.affected_assets
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .fetch_one(&mut *tx)
        .await?;

        for article_id in article_ids {
            sqlx::query(
                r#"
                INSERT INTO story_article_links (story_id, article_id)
                VALUES ($1, $2)
                ON CONFLICT (story_id, article_id) DO NOTHING
                "#,
            )
            .bind(id)
            .bind(*article_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Active stories within `window_days` of now, nearest-first by cosine
    /// distance to `vector`, limited to `k` (§4.6 `fetch_similar_stories`, §4.12).
    pub async fn fetch_similar(
        vector: &[f32],
        k: i64,
        window_days: Option<i64>,
        pool: &PgPool,
    ) -> Result<Vec<SimilarStory>> {
        let embedding = Vector::from(vector.to_vec());
        let rows: Vec<(StoryId, String, String, f64)> = if let Some(days) = window_days {
            sqlx::query_as(
                r#"
                SELECT id, title, essence_text, (essence_embedding <=> $1)::float8 AS distance
                FROM stories
                WHERE is_active = true
                  AND last_update_time >= NOW() - ($3 || ' days')::INTERVAL
                ORDER BY essence_embedding <=> $1
                LIMIT $2
                "#,
            )
            .bind(&embedding)
            .bind(k)
            .bind(days)
            .fetch_all(pool)
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT id, title, essence_text, (essence_embedding <=> $1)::float8 AS distance
                FROM stories
                WHERE is_active = true
                ORDER BY essence_embedding <=> $1
                LIMIT $2
                "#,
            )
            .bind(&embedding)
            .bind(k)
            .fetch_all(pool)
            .await?
        };

        Ok(rows
            .into_iter()
            .map(|(story_id, title, essence_text, distance)| SimilarStory {
                story_id,
                title,
                essence_text,
                distance,
            })
            .collect())
    }

    pub async fn find_by_id(id: StoryId, pool: &PgPool) -> Result<Self> {
        let row = sqlx::query_as::<_, StoryRow>(
            r#"
            SELECT id, title, connection_rationale, analysis_summary, essence_text,
                   context_snippets, essence_embedding, affected_assets, is_active, created_at, last_update_time
            FROM stories WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;
        row.try_into()
    }
}
