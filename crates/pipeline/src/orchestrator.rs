//! C15 Orchestrator (§4.15): the state machine that drives one pipeline
//! invocation through Phase 1 (feature enrichment) → Phase 2a (scoring) →
//! Phase 2b (clustering) → Phase 3 (per-cluster validation, enrichment,
//! tracking, and synthesis), in that strict order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use storyline_core::Deps;
use storyline_domains::{ArticleId, EnrichedFeatures, NewStory, PersistenceStore};

use crate::asset_filter::{AssetFilter, FilteredAsset};
use crate::asset_mapper::AssetMapper;
use crate::downstream_submitter::{AnalyzedStory, DownstreamSubmitter, SubmissionPayload};
use crate::event_classifier::EventClassifier;
use crate::feature_extractor::FeatureExtractor;
use crate::graph_clusterer::GraphClusterer;
use crate::historical_retriever::HistoricalRetriever;
use crate::interaction_scorer::{InteractionScorer, ScoringWeights};
use crate::memory_processor::MemoryProcessor;
use crate::prompts::PromptStore;
use crate::story_enricher::StoryEnricher;
use crate::story_tracker::{ContinuityDecision, StoryTracker};
use crate::surprise_score::SurpriseScorer;
use crate::synthesizer::{SalientArticle, Synthesizer};

use crate::cluster_validator::ClusterValidator;

/// Per-article results Phase 1 carries forward in memory for Phase 3 to
/// consume — neither is a persisted article column (§3 keeps assets on
/// `Story` only; event_type lives on `ProcessingLog`, not re-fetched here).
#[derive(Debug, Clone, Default)]
struct Phase1Carryover {
    filtered_assets: HashMap<ArticleId, Vec<FilteredAsset>>,
    event_types: HashMap<ArticleId, String>,
}

/// Aggregate counters returned at the end of a run (§4.15, §7).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PipelineCounters {
    pub articles_processed: u64,
    pub articles_failed: u64,
    pub edges_persisted: u64,
    pub clusters_found: u64,
    pub clusters_validated: u64,
    pub stories_created: u64,
    pub stories_continued: u64,
}

pub struct Orchestrator {
    deps: Arc<Deps>,
    store: PersistenceStore,
    event_classifier: EventClassifier,
    asset_mapper: AssetMapper,
    prompts: PromptStore,
}

impl Orchestrator {
    pub fn new(
        deps: Arc<Deps>,
        store: PersistenceStore,
        event_classifier: EventClassifier,
        asset_mapper: AssetMapper,
        prompts: PromptStore,
    ) -> Self {
        Self {
            deps,
            store,
            event_classifier,
            asset_mapper,
            prompts,
        }
    }

    pub async fn run(&self) -> anyhow::Result<PipelineCounters> {
        let mut counters = PipelineCounters::default();

        let carryover = self.run_phase1(&mut counters).await;
        let processed_ids = self.run_phase2a(&mut counters).await?;
        let clusters = self.run_phase2b(&mut counters).await?;
        let (analyzed_stories, grouped_ids) =
            self.run_phase3(&clusters, &carryover, &mut counters).await;

        let ungrouped_news_ids = processed_ids
            .into_iter()
            .filter(|id| !grouped_ids.contains(id))
            .map(|id| id.into_inner().to_string())
            .collect();

        let submitter = DownstreamSubmitter::new(
            self.deps.http_client.clone(),
            self.deps.config.downstream_submit_url.clone(),
        );
        submitter
            .submit(&SubmissionPayload {
                analyzed_stories,
                ungrouped_news_ids,
            })
            .await;

        tracing::info!(?counters, "pipeline run complete");
        Ok(counters)
    }

    /// Phase 1: bounded worker pool running C1 → C2 → C3 → C4 → C5 →
    /// `save_features` per article. Returns the in-memory, non-persisted
    /// carryover Phase 3 uses to build `Story::affected_assets` and the §6
    /// downstream payload's `main_categories` (§3 notes assets live on the
    /// story, not the article; event_type lives on `ProcessingLog`).
    async fn run_phase1(&self, counters: &mut PipelineCounters) -> Phase1Carryover {
        let config = &self.deps.config;
        let articles = match self.store.fetch_unprocessed(config.news_batch_size).await {
            Ok(a) => a,
            Err(err) => {
                tracing::error!(error = %err, "phase 1: failed to fetch unprocessed articles");
                return Phase1Carryover::default();
            }
        };

        let extractor = FeatureExtractor::new(
            self.deps.ner_service.clone(),
            self.deps.embedding_service.clone(),
            Duration::from_secs(config.article_fetch_timeout_secs),
        );
        let asset_filter = AssetFilter::new(&self.deps.ai, &self.prompts, &config.llm_model);
        let surprise_scorer = SurpriseScorer::new(&self.store);

        let results = futures::stream::iter(articles)
            .map(|article| {
                let extractor = &extractor;
                let asset_filter = &asset_filter;
                let surprise_scorer = &surprise_scorer;
                async move {
                    let article_id = article.id;
                    let extracted = extractor.extract(&article.url).await;

                    let text = extracted.full_text.clone().unwrap_or_default();
                    let classification = self.event_classifier.classify(&text, &extracted.entities);
                    let candidate_assets = self.asset_mapper.map_assets(&extracted.entities);
                    let filtered = asset_filter.filter(&text, &candidate_assets).await;

                    let event_type = classification.map(|c| c.event_type);
                    let surprise_score = match surprise_scorer
                        .score(event_type.as_deref(), article.publication_time)
                        .await
                    {
                        Ok(score) => score,
                        Err(err) => {
                            tracing::warn!(article_id = %article_id, error = %err, "surprise score failed");
                            None
                        }
                    };

                    let features = EnrichedFeatures {
                        embedding: extracted.embedding,
                        entities: extracted.entities,
                        event_type: event_type.clone(),
                        surprise_score,
                    };

                    let save_result = self
                        .store
                        .save_features(article_id, &features, &config.embedding_model_name)
                        .await;

                    (article_id, save_result.is_ok(), filtered, event_type)
                }
            })
            .buffer_unordered(config.max_workers)
            .collect::<Vec<_>>()
            .await;

        let mut carryover = Phase1Carryover::default();
        for (article_id, succeeded, filtered, event_type) in results {
            if succeeded {
                counters.articles_processed += 1;
            } else {
                counters.articles_failed += 1;
            }
            if !filtered.is_empty() {
                carryover.filtered_assets.insert(article_id, filtered);
            }
            if let Some(event_type) = event_type {
                carryover.event_types.insert(article_id, event_type);
            }
        }

        carryover
    }

    /// Phase 2a: fetch processed articles, run C7, persist edges. Returns the
    /// ids of the processed articles considered for clustering, so the caller
    /// can derive `ungrouped_news_ids` for the §6 downstream payload.
    async fn run_phase2a(&self, counters: &mut PipelineCounters) -> anyhow::Result<Vec<ArticleId>> {
        let config = &self.deps.config;
        let articles = self.store.fetch_processed(config.news_batch_size).await?;
        let processed_ids: Vec<ArticleId> = articles.iter().map(|a| a.article.id).collect();

        let weights = ScoringWeights {
            semantic: config.semantic_weight,
            entity: config.entity_weight,
            temporal: config.temporal_weight,
        };
        let scorer = InteractionScorer::new(weights, config.interaction_threshold, config.k_neighbors);
        let run_date = Utc::now().date_naive();
        let edges = scorer.score(&articles, run_date)?;

        counters.edges_persisted = edges.len() as u64;
        self.store.save_edges(&edges).await?;
        Ok(processed_ids)
    }

    /// Phase 2b: load today's thresholded edges, cluster, optionally truncate.
    async fn run_phase2b(&self, counters: &mut PipelineCounters) -> anyhow::Result<Vec<Vec<ArticleId>>> {
        let config = &self.deps.config;
        let run_date = Utc::now().date_naive();
        let edges = self.store.fetch_edges(run_date, config.interaction_threshold).await?;

        let mut clusters = GraphClusterer::cluster(&edges);
        if let Some(max_clusters) = config.max_clusters {
            clusters.truncate(max_clusters);
        }

        counters.clusters_found = clusters.len() as u64;
        Ok(clusters)
    }

    /// Phase 3: sequential per-cluster validation, enrichment, continuity
    /// tracking, synthesis, and memory derivation. A failure at any step
    /// skips the cluster and continues (§4.15). Returns the stories surfaced
    /// to the downstream payload and the set of article ids attributed to
    /// one, for `ungrouped_news_ids` bookkeeping (§6).
    async fn run_phase3(
        &self,
        clusters: &[Vec<ArticleId>],
        carryover: &Phase1Carryover,
        counters: &mut PipelineCounters,
    ) -> (Vec<AnalyzedStory>, std::collections::HashSet<ArticleId>) {
        let config = &self.deps.config;
        let model = &config.llm_model;

        let validator = ClusterValidator::new(&self.deps.ai, &self.prompts, model, config);
        let enricher = StoryEnricher::new(&self.deps.ai, &self.prompts, model, config);
        let retriever = HistoricalRetriever::new(&self.store);
        let tracker = StoryTracker::new(
            &self.deps.ai,
            &self.prompts,
            model,
            config,
            &retriever,
            config.historical_window_days,
        );
        let synthesizer = Synthesizer::new(&self.deps.ai, &self.prompts, model, config);
        let memory_processor =
            MemoryProcessor::new(&self.deps.ai, &self.prompts, model, config, &self.deps.embedding_service);

        let mut analyzed_stories = Vec::new();
        let mut grouped_ids = std::collections::HashSet::new();

        for cluster in clusters {
            match self
                .process_cluster(
                    cluster,
                    carryover,
                    &validator,
                    &enricher,
                    &tracker,
                    &retriever,
                    &synthesizer,
                    &memory_processor,
                    counters,
                )
                .await
            {
                Ok(Some(story)) => {
                    grouped_ids.extend(cluster.iter().copied());
                    analyzed_stories.push(story);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, cluster_size = cluster.len(), "phase 3: cluster processing failed, skipping");
                }
            }
        }

        (analyzed_stories, grouped_ids)
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_cluster(
        &self,
        cluster: &[ArticleId],
        carryover: &Phase1Carryover,
        validator: &ClusterValidator<'_>,
        enricher: &StoryEnricher<'_>,
        tracker: &StoryTracker<'_>,
        retriever: &HistoricalRetriever<'_>,
        synthesizer: &Synthesizer<'_>,
        memory_processor: &MemoryProcessor<'_>,
        counters: &mut PipelineCounters,
    ) -> anyhow::Result<Option<AnalyzedStory>> {
        let articles = self.store.fetch_by_ids(cluster).await?;
        if articles.len() < 2 {
            return Ok(None);
        }

        let headlines: Vec<String> = articles.iter().map(|a| a.article.title.clone()).collect();
        let recurring_entities = recurring_entity_names(&articles);

        let validation = validator.validate(&headlines, &recurring_entities).await?;
        if !validation.is_story {
            return Ok(None);
        }
        counters.clusters_validated += 1;

        let enrichment = enricher.enrich(&headlines).await?;

        let embeddings: Vec<Vec<f32>> = articles
            .iter()
            .filter_map(|a| a.article.embedding.clone())
            .collect();

        let continuity = tracker
            .track(&embeddings, &enrichment.label, &enrichment.rationale)
            .await?;

        let parent_id = match continuity {
            ContinuityDecision::Continuation { parent_story_id } => Some(parent_story_id),
            ContinuityDecision::NewStory => None,
        };

        let historical_context = if embeddings.len() >= 2 {
            let representative = mean_vector(&embeddings);
            let similar = retriever.retrieve(&representative, 3, None).await.unwrap_or_default();
            if similar.is_empty() {
                self.render_parent_context(parent_id).await
            } else {
                render_historical_context(&similar)
            }
        } else {
            self.render_parent_context(parent_id).await
        };

        let salient: Vec<SalientArticle> = articles
            .iter()
            .map(|a| SalientArticle {
                title: &a.article.title,
                source: &a.article.source,
                publication_time: a.article.publication_time,
            })
            .collect();

        let analysis_summary = synthesizer
            .synthesize(
                &enrichment.label,
                &enrichment.rationale,
                &salient,
                &historical_context,
                "(no macro calendar context configured)",
            )
            .await?;

        let memory = memory_processor.process(&analysis_summary).await?;

        let affected_assets = aggregate_affected_assets(cluster, &carryover.filtered_assets);
        let main_categories = recurring_event_categories(cluster, &carryover.event_types);

        let new_story = NewStory {
            title: enrichment.label.clone(),
            connection_rationale: enrichment.rationale,
            analysis_summary: analysis_summary.clone(),
            essence_text: memory.story_essence,
            context_snippets: memory.context_snippets,
            essence_embedding: memory.essence_embedding,
            affected_assets,
        };

        let article_ids: Vec<ArticleId> = articles.iter().map(|a| a.article.id).collect();
        let story_id = self.store.save_story(&new_story, &article_ids).await?;
        counters.stories_created += 1;

        if let Some(parent_id) = parent_id {
            self.store
                .save_story_relationship(
                    story_id,
                    storyline_domains::StoryId::new(parent_id),
                    storyline_domains::EVOLVED_FROM,
                    "orchestrator",
                )
                .await?;
            counters.stories_continued += 1;
        }

        Ok(Some(AnalyzedStory {
            story_title: enrichment.label,
            related_news_ids: article_ids.iter().map(|id| id.into_inner().to_string()).collect(),
            analysis_summary,
            main_categories,
        }))
    }

    /// When C12's direct retrieval yields nothing, C13's continuation verdict
    /// (if any) still gets priority for `historical_context` over an empty
    /// section (§4.15 step e).
    async fn render_parent_context(&self, parent_id: Option<i64>) -> String {
        match parent_id {
            Some(id) => match self.store.fetch_story(storyline_domains::StoryId::new(id)).await {
                Ok(story) => format!("- {} (continuation parent): {}", story.title, story.essence_text),
                Err(_) => "(none)".to_string(),
            },
            None => "(none)".to_string(),
        }
    }
}

fn mean_vector(vectors: &[Vec<f32>]) -> Vec<f32> {
    let dim = vectors[0].len();
    let mut sum = vec![0.0_f32; dim];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    sum.into_iter().map(|x| x / n).collect()
}

/// Entity names (lowercased) appearing in >= 2 of the cluster's articles,
/// across all entity types (§4.9).
fn recurring_entity_names(articles: &[storyline_domains::ArticleWithEntities]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for article in articles {
        let mut seen_in_article = std::collections::HashSet::new();
        for names in article.entities.values() {
            for name in names {
                if seen_in_article.insert(name.to_lowercase()) {
                    *counts.entry(name.to_lowercase()).or_insert(0) += 1;
                }
            }
        }
    }
    let mut names: Vec<String> = counts.into_iter().filter(|(_, n)| *n >= 2).map(|(name, _)| name).collect();
    names.sort();
    names
}

fn render_historical_context(similar: &[storyline_domains::SimilarStory]) -> String {
    if similar.is_empty() {
        return "(none)".to_string();
    }
    similar
        .iter()
        .map(|s| format!("- {} (distance {:.3}): {}", s.title, s.distance, s.essence_text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn aggregate_affected_assets(
    cluster: &[ArticleId],
    filtered_assets: &HashMap<ArticleId, Vec<FilteredAsset>>,
) -> Option<Vec<String>> {
    let mut assets: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for article_id in cluster {
        if let Some(filtered) = filtered_assets.get(article_id) {
            assets.extend(filtered.iter().map(|f| f.asset.clone()));
        }
    }
    if assets.is_empty() {
        None
    } else {
        Some(assets.into_iter().collect())
    }
}

/// Distinct `event_type` values (§4.2's fixed rule-table enum) classified
/// across the cluster's member articles, sorted for deterministic output
/// (§6 `main_categories`).
fn recurring_event_categories(
    cluster: &[ArticleId],
    event_types: &HashMap<ArticleId, String>,
) -> Vec<String> {
    let mut categories: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for article_id in cluster {
        if let Some(event_type) = event_types.get(article_id) {
            categories.insert(event_type.clone());
        }
    }
    categories.into_iter().collect()
}
