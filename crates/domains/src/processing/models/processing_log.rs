use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::ids::ArticleId;

/// §3 ProcessingLog.status. `partial` requires at least one of entities or
/// embedding to have been produced; `failed` requires neither, or a thrown error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Success,
    Partial,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Success => "success",
            ProcessingStatus::Partial => "partial",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "pending" => ProcessingStatus::Pending,
            "success" => ProcessingStatus::Success,
            "partial" => ProcessingStatus::Partial,
            "failed" => ProcessingStatus::Failed,
            other => anyhow::bail!("unknown processing status: {other}"),
        })
    }
}

/// Per-article processing state; upserted by `article_id` (unique).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLog {
    pub article_id: ArticleId,
    pub status: ProcessingStatus,
    pub embedding_model_version: Option<String>,
    pub event_type: Option<String>,
    pub surprise_score: Option<f64>,
    pub error_message: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProcessingLogRow {
    article_id: ArticleId,
    status: String,
    embedding_model_version: Option<String>,
    event_type: Option<String>,
    surprise_score: Option<f64>,
    error_message: Option<String>,
}

impl TryFrom<ProcessingLogRow> for ProcessingLog {
    type Error = anyhow::Error;

    fn try_from(row: ProcessingLogRow) -> Result<Self> {
        Ok(Self {
            article_id: row.article_id,
            status: row.status.parse()?,
            embedding_model_version: row.embedding_model_version,
            event_type: row.event_type,
            surprise_score: row.surprise_score,
            error_message: row.error_message,
        })
    }
}

/// Truncate an error message to a bounded length before persisting it
/// (§7 kind 2: "truncated `error_message`").
pub fn truncate_error_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    message.chars().take(max_chars).collect()
}

impl ProcessingLog {
    pub async fn find_by_article_id(
        article_id: ArticleId,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, ProcessingLogRow>(
            r#"
            SELECT article_id, status, embedding_model_version, event_type, surprise_score, error_message
            FROM processing_log WHERE article_id = $1
            "#,
        )
        .bind(article_id)
        .fetch_optional(pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Upsert by `article_id` (§4.6).
    pub async fn upsert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processing_log
                (article_id, status, embedding_model_version, event_type, surprise_score, error_message)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (article_id) DO UPDATE SET
                status = EXCLUDED.status,
                embedding_model_version = EXCLUDED.embedding_model_version,
                event_type = EXCLUDED.event_type,
                surprise_score = EXCLUDED.surprise_score,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(self.article_id)
        .bind(self.status.as_str())
        .bind(&self.embedding_model_version)
        .bind(&self.event_type)
        .bind(self.surprise_score)
        .bind(&self.error_message)
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_error_messages() {
        let msg = "x".repeat(1000);
        let truncated = truncate_error_message(&msg, 200);
        assert_eq!(truncated.chars().count(), 200);
    }

    #[test]
    fn leaves_short_messages_untouched() {
        assert_eq!(truncate_error_message("short", 200), "short");
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in ["pending", "success", "partial", "failed"] {
            let status: ProcessingStatus = s.parse().unwrap();
            assert_eq!(status.as_str(), s);
        }
    }
}
