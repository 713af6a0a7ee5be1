use anyhow::Result;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::ids::ArticleId;

/// One ingested financial-news item, identified by URL (§3).
///
/// `full_text` is transient: it is populated by `FeatureExtractor` while a
/// worker holds the article in memory, but the core does not require it to be
/// persisted — only `embedding` is written back.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: ArticleId,
    pub url: String,
    pub title: String,
    pub source: String,
    pub publication_time: Option<DateTime<Utc>>,
    pub fetched_time: DateTime<Utc>,
    #[sqlx(skip)]
    pub embedding: Option<Vec<f32>>,
    #[sqlx(skip)]
    pub full_text: Option<String>,
}

/// Raw row shape as stored — `embedding` comes back as a `pgvector::Vector`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ArticleRow {
    pub id: ArticleId,
    pub url: String,
    pub title: String,
    pub source: String,
    pub publication_time: Option<DateTime<Utc>>,
    pub fetched_time: DateTime<Utc>,
    pub embedding: Option<Vector>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            title: row.title,
            source: row.source,
            publication_time: row.publication_time,
            fetched_time: row.fetched_time,
            embedding: row.embedding.map(|v| v.to_vec()),
            full_text: None,
        }
    }
}

impl Article {
    pub async fn find_by_id(id: ArticleId, pool: &PgPool) -> Result<Self> {
        let row = sqlx::query_as::<_, ArticleRow>(
            r#"SELECT id, url, title, source, publication_time, fetched_time, embedding
               FROM articles WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(row.into())
    }

    pub async fn set_embedding(id: ArticleId, embedding: &[f32], pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE articles SET embedding = $1 WHERE id = $2")
            .bind(Vector::from(embedding.to_vec()))
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
