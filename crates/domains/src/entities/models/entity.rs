use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::ids::EntityId;

/// A named entity extracted from article text (organization, person, place,
/// monetary, …). `(name, entity_type)` is unique; upserts collapse duplicates (§3).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub entity_type: String,
    pub canonical_id: Option<EntityId>,
}

impl Entity {
    pub async fn find_by_name_and_type(
        name: &str,
        entity_type: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, name, entity_type, canonical_id FROM entities WHERE name = $1 AND entity_type = $2",
        )
        .bind(name)
        .bind(entity_type)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Upsert on `(name, entity_type)`, returning the (possibly pre-existing) row.
    pub async fn upsert(name: &str, entity_type: &str, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO entities (name, entity_type)
            VALUES ($1, $2)
            ON CONFLICT (name, entity_type) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, entity_type, canonical_id
            "#,
        )
        .bind(name)
        .bind(entity_type)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}

/// Many-to-many link between an article and an entity it mentions.
/// Unique on `(article_id, entity_id)` (§3).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArticleEntity {
    pub article_id: crate::ids::ArticleId,
    pub entity_id: EntityId,
}

impl ArticleEntity {
    pub async fn upsert(
        article_id: crate::ids::ArticleId,
        entity_id: EntityId,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO article_entities (article_id, entity_id)
            VALUES ($1, $2)
            ON CONFLICT (article_id, entity_id) DO NOTHING
            "#,
        )
        .bind(article_id)
        .bind(entity_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Names of every entity linked to `article_id`, grouped by type, for
    /// `InteractionScorer`'s entity-overlap term and `ClusterValidator`'s prompt.
    pub async fn names_by_type(
        article_id: crate::ids::ArticleId,
        pool: &PgPool,
    ) -> Result<std::collections::HashMap<String, Vec<String>>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT e.entity_type, e.name
            FROM article_entities ae
            JOIN entities e ON e.id = ae.entity_id
            WHERE ae.article_id = $1
            "#,
        )
        .bind(article_id)
        .fetch_all(pool)
        .await?;

        let mut by_type: std::collections::HashMap<String, Vec<String>> = Default::default();
        for (entity_type, name) in rows {
            by_type.entry(entity_type).or_default().push(name);
        }
        Ok(by_type)
    }
}
