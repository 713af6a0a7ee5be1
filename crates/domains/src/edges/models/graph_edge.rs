use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::ids::ArticleId;

/// A thresholded interaction between two articles (§3). `source_article_id`
/// is always the smaller id — callers must canonicalize before constructing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GraphEdge {
    pub source_article_id: ArticleId,
    pub target_article_id: ArticleId,
    pub semantic_score: f64,
    pub entity_score: f64,
    pub temporal_score: f64,
    pub total_score: f64,
    pub run_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl GraphEdge {
    /// Build a canonically-oriented edge from a scored pair, ordering ids so
    /// `source < target` regardless of scoring order (§3, §5).
    pub fn new(
        a: ArticleId,
        b: ArticleId,
        semantic_score: f64,
        entity_score: f64,
        temporal_score: f64,
        total_score: f64,
        run_date: NaiveDate,
    ) -> Result<Self> {
        if a == b {
            bail!("cannot build an edge between an article and itself");
        }
        let (source, target) = if a.into_inner() < b.into_inner() {
            (a, b)
        } else {
            (b, a)
        };
        Ok(Self {
            source_article_id: source,
            target_article_id: target,
            semantic_score,
            entity_score,
            temporal_score,
            total_score,
            run_date,
            updated_at: Utc::now(),
        })
    }

    /// Bulk upsert on `(source, target, run_date)` (§4.6); idempotent (§8).
    pub async fn save_all(edges: &[GraphEdge], pool: &PgPool) -> Result<()> {
        if edges.is_empty() {
            return Ok(());
        }
        let mut tx = pool.begin().await?;
        for edge in edges {
            sqlx::query(
                r#"
                INSERT INTO graph_edges
                    (source_article_id, target_article_id, semantic_score, entity_score, temporal_score, total_score, run_date, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
                ON CONFLICT (source_article_id, target_article_id, run_date) DO UPDATE SET
                    semantic_score = EXCLUDED.semantic_score,
                    entity_score = EXCLUDED.entity_score,
                    temporal_score = EXCLUDED.temporal_score,
                    total_score = EXCLUDED.total_score,
                    updated_at = NOW()
                "#,
            )
            .bind(edge.source_article_id)
            .bind(edge.target_article_id)
            .bind(edge.semantic_score)
            .bind(edge.entity_score)
            .bind(edge.temporal_score)
            .bind(edge.total_score)
            .bind(edge.run_date)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn fetch_for_run_date(
        run_date: NaiveDate,
        min_total: f64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT source_article_id, target_article_id, semantic_score, entity_score, temporal_score, total_score, run_date, updated_at
            FROM graph_edges
            WHERE run_date = $1 AND total_score >= $2
            "#,
        )
        .bind(run_date)
        .bind(min_total)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn canonicalizes_regardless_of_input_order() {
        let e1 = GraphEdge::new(ArticleId(7), ArticleId(3), 0.8, 0.3, 0.6, 0.6, today()).unwrap();
        let e2 = GraphEdge::new(ArticleId(3), ArticleId(7), 0.8, 0.3, 0.6, 0.6, today()).unwrap();
        assert_eq!(e1.source_article_id, ArticleId(3));
        assert_eq!(e1.target_article_id, ArticleId(7));
        assert_eq!(e1.source_article_id, e2.source_article_id);
        assert_eq!(e1.target_article_id, e2.target_article_id);
    }

    #[test]
    fn rejects_self_edges() {
        assert!(GraphEdge::new(ArticleId(1), ArticleId(1), 0.0, 0.0, 0.0, 0.0, today()).is_err());
    }
}
