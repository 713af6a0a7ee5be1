use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::ids::{ArticleId, StoryId};

/// Articles attributed to a story; unique on `(story_id, article_id)` (§3).
///
/// The uniqueness constraint only prevents duplicate links *within* a story —
/// it does not prevent the same article appearing under more than one story
/// over time. Per §9's recorded decision this is permitted by the schema
/// (an article may legitimately belong to more than one story as narratives
/// evolve) and is not treated as a defect.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoryArticleLink {
    pub story_id: StoryId,
    pub article_id: ArticleId,
}

impl StoryArticleLink {
    pub async fn article_ids_for_story(story_id: StoryId, pool: &PgPool) -> Result<Vec<ArticleId>> {
        let rows: Vec<(ArticleId,)> =
            sqlx::query_as("SELECT article_id FROM story_article_links WHERE story_id = $1")
                .bind(story_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
