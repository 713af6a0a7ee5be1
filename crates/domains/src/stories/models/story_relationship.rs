use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::ids::StoryId;

/// Typed directed edge between stories; unique on
/// `(source_story_id, target_story_id, relationship_type)` (§3). Stories form
/// a DAG via `EVOLVED_FROM` from newer to older — the uniqueness constraint
/// plus monotonic ids makes cycles structurally impossible (§9).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoryRelationship {
    pub source_story_id: StoryId,
    pub target_story_id: StoryId,
    pub relationship_type: String,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

pub const EVOLVED_FROM: &str = "EVOLVED_FROM";

impl StoryRelationship {
    /// Single-row insert; on unique conflict, no-op (§4.6). Running the same
    /// cluster twice must not create a duplicate row (§8 S4).
    pub async fn save(
        source_story_id: StoryId,
        target_story_id: StoryId,
        relationship_type: &str,
        created_by: &str,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO story_relationships
                (source_story_id, target_story_id, relationship_type, is_active, created_by, created_at)
            VALUES ($1, $2, $3, true, $4, NOW())
            ON CONFLICT (source_story_id, target_story_id, relationship_type) DO NOTHING
            "#,
        )
        .bind(source_story_id)
        .bind(target_story_id)
        .bind(relationship_type)
        .bind(created_by)
        .execute(pool)
        .await?;
        Ok(())
    }
}
