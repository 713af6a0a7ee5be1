use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::{Claude, OpenAi};
use storyline_core::{AppConfig, Deps, OpenAiEmbeddingService};
use storyline_domains::PersistenceStore;
use storyline_pipeline::asset_mapper::AssetMapper;
use storyline_pipeline::event_classifier::EventClassifier;
use storyline_pipeline::{HeuristicNerService, Orchestrator, PromptStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("storyline=info".parse()?))
        .init();

    info!("storyline scout starting...");

    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;

    let ai = Arc::new(
        OpenAi::new(config.openai_api_key.clone(), config.llm_model.clone())
            .with_embedding_model(config.embedding_model_name.clone()),
    );
    let claude = config
        .anthropic_api_key
        .clone()
        .map(|key| Arc::new(Claude::new(key, "claude-3-5-sonnet-20241022")));

    let embedding_service = Arc::new(OpenAiEmbeddingService { ai: ai.clone() });
    let ner_service = Arc::new(HeuristicNerService);

    let deps = Arc::new(Deps::new(
        pool.clone(),
        reqwest::Client::new(),
        ai,
        claude,
        embedding_service,
        ner_service,
        config,
    ));

    let store = PersistenceStore::new(pool);

    let crate_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let event_rules_path = std::env::var("EVENT_RULES_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| crate_root.join("rules/event_rules.json"));
    let asset_rules_path = std::env::var("ASSET_RULES_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| crate_root.join("rules/asset_rules.json"));
    let prompts_dir = std::env::var("PROMPTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| crate_root.join("prompts"));

    let event_classifier = EventClassifier::from_json_file(&event_rules_path)?;
    let asset_mapper = AssetMapper::from_json_file(&asset_rules_path)?;
    let prompts = PromptStore::load_from_dir(&prompts_dir)?;

    let orchestrator = Orchestrator::new(deps, store, event_classifier, asset_mapper, prompts);

    let counters = orchestrator.run().await?;
    info!(?counters, "storyline scout run complete");

    Ok(())
}
