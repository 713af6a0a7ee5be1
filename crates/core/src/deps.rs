use crate::config::AppConfig;
use ai_client::{Claude, EmbedAgent, OpenAi};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// Dyn-compatible embedding trait so components can be generic over the
/// embedding provider without taking a hard dependency on `ai_client`.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Dyn-compatible named-entity-recognition trait (§4.1, `ner_model_name`
/// config selects the backend per §6). NER model downloads and vocabulary
/// files are out of scope for this core (§1) — this is the seam a real
/// backend plugs into; `storyline-pipeline` ships a lightweight heuristic
/// implementation so the pipeline runs end-to-end without one.
#[async_trait]
pub trait NerService: Send + Sync {
    /// Returns entities grouped by type -> ordered, deduped names.
    async fn extract_entities(
        &self,
        text: &str,
    ) -> Result<std::collections::HashMap<String, Vec<String>>>;
}

pub struct OpenAiEmbeddingService {
    pub ai: Arc<OpenAi>,
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.ai.embed(text.to_string()).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.ai.embed_batch(texts.to_vec()).await
    }
}

/// Central dependency container passed to every component and to the
/// orchestrator. Constructed once in the binary entrypoint.
#[derive(Clone)]
pub struct Deps {
    pub db_pool: PgPool,
    pub http_client: reqwest::Client,
    pub ai: Arc<OpenAi>,
    pub claude: Option<Arc<Claude>>,
    pub embedding_service: Arc<dyn EmbeddingService>,
    pub ner_service: Arc<dyn NerService>,
    pub config: AppConfig,
}

impl Deps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: PgPool,
        http_client: reqwest::Client,
        ai: Arc<OpenAi>,
        claude: Option<Arc<Claude>>,
        embedding_service: Arc<dyn EmbeddingService>,
        ner_service: Arc<dyn NerService>,
        config: AppConfig,
    ) -> Self {
        Self {
            db_pool,
            http_client,
            ai,
            claude,
            embedding_service,
            ner_service,
            config,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db_pool
    }
}
