use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::ids::EventId;

/// External macro event used for surprise scoring (§3, §4.5). Unique on
/// `(event_name, country, event_time)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EconomicEvent {
    pub id: EventId,
    pub event_name: String,
    pub country: String,
    pub event_time: DateTime<Utc>,
    pub actual_value: Option<f64>,
    pub forecast_value: Option<f64>,
    pub previous_value: Option<f64>,
    pub impact: Option<String>,
    pub unit: Option<String>,
}

impl EconomicEvent {
    /// Bulk upsert on `(event_name, country, event_time)` (§4.6 `save_events`).
    pub async fn save_all(events: &[EconomicEvent], pool: &PgPool) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut tx = pool.begin().await?;
        for event in events {
            sqlx::query(
                r#"
                INSERT INTO economic_events
                    (event_name, country, event_time, actual_value, forecast_value, previous_value, impact, unit)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (event_name, country, event_time) DO UPDATE SET
                    actual_value = EXCLUDED.actual_value,
                    forecast_value = EXCLUDED.forecast_value,
                    previous_value = EXCLUDED.previous_value,
                    impact = EXCLUDED.impact,
                    unit = EXCLUDED.unit
                "#,
            )
            .bind(&event.event_name)
            .bind(&event.country)
            .bind(event.event_time)
            .bind(event.actual_value)
            .bind(event.forecast_value)
            .bind(event.previous_value)
            .bind(&event.impact)
            .bind(&event.unit)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Events in `[start, end]` whose `event_name` case-insensitively contains
    /// any of `keywords` (§4.6 `find_events`, §4.5 step 2).
    pub async fn find_in_range(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        keywords: &[String],
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        if keywords.is_empty() {
            return Ok(vec![]);
        }
        let patterns: Vec<String> = keywords.iter().map(|k| format!("%{}%", k)).collect();
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, event_name, country, event_time, actual_value, forecast_value, previous_value, impact, unit
            FROM economic_events
            WHERE event_time BETWEEN $1 AND $2
              AND event_name ILIKE ANY($3)
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(&patterns)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
