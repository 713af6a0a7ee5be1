use anyhow::Result;

/// Application configuration loaded once from the environment.
///
/// Constructed exactly once in the binary entrypoint (§10.1) and passed by
/// value/`Arc` into the dependency container; nothing downstream re-reads
/// the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,

    // LLM
    pub openai_api_key: String,
    pub anthropic_api_key: Option<String>,
    pub llm_model: String,
    pub embedding_model_name: String,

    // NER
    pub ner_model_name: String,

    // C7 InteractionScorer
    pub semantic_weight: f64,
    pub entity_weight: f64,
    pub temporal_weight: f64,
    pub interaction_threshold: f64,
    pub k_neighbors: usize,

    // Phase 1
    pub max_workers: usize,
    pub news_batch_size: i64,

    // C13 StoryTracker
    pub historical_window_days: i64,

    // Phase 2b
    pub max_clusters: Option<usize>,

    // Downstream submission
    pub downstream_submit_url: Option<String>,

    // Timeouts (seconds)
    pub article_fetch_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub db_timeout_secs: u64,

    // Retry / backoff
    pub retry_max_attempts: u32,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            db_min_connections: env_parse("DB_MIN_CONNECTIONS", 1),

            openai_api_key: std::env::var("OPENAI_API_KEY")?,
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            embedding_model_name: std::env::var("EMBEDDING_MODEL_NAME")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),

            ner_model_name: std::env::var("NER_MODEL_NAME")
                .unwrap_or_else(|_| "en_core_web_trf".to_string()),

            semantic_weight: env_parse("SEMANTIC_WEIGHT", 0.50),
            entity_weight: env_parse("ENTITY_WEIGHT", 0.30),
            temporal_weight: env_parse("TEMPORAL_WEIGHT", 0.20),
            interaction_threshold: env_parse("INTERACTION_THRESHOLD", 0.65),
            k_neighbors: env_parse("K_NEIGHBORS", 10),

            max_workers: env_parse("MAX_WORKERS", 5),
            news_batch_size: env_parse("NEWS_BATCH_SIZE", 100),

            historical_window_days: env_parse("HISTORICAL_WINDOW_DAYS", 14),

            max_clusters: std::env::var("MAX_CLUSTERS")
                .ok()
                .and_then(|s| s.parse().ok()),

            downstream_submit_url: std::env::var("DOWNSTREAM_SUBMIT_URL").ok(),

            article_fetch_timeout_secs: env_parse("ARTICLE_FETCH_TIMEOUT_SECS", 10),
            llm_timeout_secs: env_parse("LLM_TIMEOUT_SECS", 30),
            db_timeout_secs: env_parse("DB_TIMEOUT_SECS", 30),

            retry_max_attempts: env_parse("RETRY_MAX_ATTEMPTS", 3),
            retry_initial_backoff_ms: env_parse("RETRY_INITIAL_BACKOFF_MS", 2_000),
            retry_max_backoff_ms: env_parse("RETRY_MAX_BACKOFF_MS", 10_000),
        })
    }
}

/// Parse an optional env var, falling back to `default` on absence *or*
/// malformed input — a bad override degrades gracefully rather than crashing.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_malformed_value() {
        std::env::set_var("TEST_ENV_PARSE_BOGUS", "not-a-number");
        let v: f64 = env_parse("TEST_ENV_PARSE_BOGUS", 0.65);
        assert_eq!(v, 0.65);
        std::env::remove_var("TEST_ENV_PARSE_BOGUS");
    }

    #[test]
    fn env_parse_falls_back_on_absence() {
        std::env::remove_var("TEST_ENV_PARSE_MISSING");
        let v: usize = env_parse("TEST_ENV_PARSE_MISSING", 10);
        assert_eq!(v, 10);
    }
}
