//! C11 MemoryProcessor (§4.11): derives a story's rolling memory — a bounded
//! summary, a retrieval-oriented essence sentence, and a handful of context
//! snippets — then embeds the essence for future similarity search.

use std::sync::Arc;

use ai_client::OpenAi;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use storyline_core::{retry_with_config, AppConfig, EmbeddingService, LlmCallError};

use crate::prompts::PromptStore;

/// Upper bound on `rolling_summary` (§4.11 step 1).
const ROLLING_SUMMARY_WORD_LIMIT: usize = 100;

/// Acceptable `context_snippets` count (§4.11 step 1): fewer than the floor
/// is accepted with a warning, more than the ceiling is truncated.
const CONTEXT_SNIPPETS_FLOOR: usize = 3;
const CONTEXT_SNIPPETS_CEILING: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct MemoryResponse {
    rolling_summary: String,
    story_essence: String,
    context_snippets: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StoryMemory {
    pub rolling_summary: String,
    pub story_essence: String,
    pub context_snippets: Vec<String>,
    pub essence_embedding: Vec<f32>,
}

pub struct MemoryProcessor<'a> {
    ai: &'a OpenAi,
    prompts: &'a PromptStore,
    model: &'a str,
    config: &'a AppConfig,
    embedding_service: &'a Arc<dyn EmbeddingService>,
}

impl<'a> MemoryProcessor<'a> {
    pub fn new(
        ai: &'a OpenAi,
        prompts: &'a PromptStore,
        model: &'a str,
        config: &'a AppConfig,
        embedding_service: &'a Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            ai,
            prompts,
            model,
            config,
            embedding_service,
        }
    }

    pub async fn process(&self, analysis_summary: &str) -> Result<StoryMemory, LlmCallError> {
        let prompt = self
            .prompts
            .render("memory/v1.0", &[("analysis_summary", analysis_summary)])
            .map_err(LlmCallError::Transport)?;

        let response: MemoryResponse = retry_with_config(self.config, || async {
            self.ai
                .extract::<MemoryResponse>(
                    self.model,
                    "You are maintaining a rolling memory of an ongoing financial-news story.",
                    prompt.clone(),
                )
                .await
                .map_err(LlmCallError::Transport)
        })
        .await?;

        let rolling_summary = truncate_to_word_limit(&response.rolling_summary, ROLLING_SUMMARY_WORD_LIMIT);

        let mut context_snippets = response.context_snippets;
        if context_snippets.len() > CONTEXT_SNIPPETS_CEILING {
            context_snippets.truncate(CONTEXT_SNIPPETS_CEILING);
        } else if context_snippets.len() < CONTEXT_SNIPPETS_FLOOR {
            tracing::warn!(
                count = context_snippets.len(),
                floor = CONTEXT_SNIPPETS_FLOOR,
                "memory processor: fewer context snippets than the preferred floor, accepting anyway"
            );
        }

        let essence_embedding = self
            .embedding_service
            .embed(&response.story_essence)
            .await
            .map_err(LlmCallError::Transport)?;

        Ok(StoryMemory {
            rolling_summary,
            story_essence: response.story_essence,
            context_snippets,
            essence_embedding,
        })
    }
}

fn truncate_to_word_limit(text: &str, limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= limit {
        text.to_string()
    } else {
        words[..limit].join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_short_summary_untouched() {
        let text = "three word summary";
        assert_eq!(truncate_to_word_limit(text, 100), text);
    }

    #[test]
    fn truncates_over_limit_summary() {
        let words: Vec<String> = (0..150).map(|i| i.to_string()).collect();
        let text = words.join(" ");
        let truncated = truncate_to_word_limit(&text, ROLLING_SUMMARY_WORD_LIMIT);
        assert_eq!(truncated.split_whitespace().count(), ROLLING_SUMMARY_WORD_LIMIT);
    }
}
