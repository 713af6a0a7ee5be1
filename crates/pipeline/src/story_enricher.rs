//! C10 StoryEnricher (§4.10): turns a validated cluster into a human-legible
//! label and rationale via two sequential LLM calls. Either call failing
//! aborts the cluster — there is no partial-enrichment state.

use ai_client::OpenAi;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use storyline_core::{retry_with_config, AppConfig, LlmCallError};

use crate::prompts::PromptStore;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct LabelResponse {
    label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct RationaleResponse {
    rationale: String,
}

#[derive(Debug, Clone)]
pub struct StoryEnrichment {
    pub label: String,
    pub rationale: String,
}

pub struct StoryEnricher<'a> {
    ai: &'a OpenAi,
    prompts: &'a PromptStore,
    model: &'a str,
    config: &'a AppConfig,
}

impl<'a> StoryEnricher<'a> {
    pub fn new(ai: &'a OpenAi, prompts: &'a PromptStore, model: &'a str, config: &'a AppConfig) -> Self {
        Self { ai, prompts, model, config }
    }

    /// Step 1 labels the cluster from its headlines; step 2 explains the
    /// connection given that label. Both run under the shared retry policy;
    /// a failure in either aborts the cluster (§4.10).
    pub async fn enrich(&self, headlines: &[String]) -> Result<StoryEnrichment, LlmCallError> {
        let joined = headlines.join("\n");

        let label_prompt = self
            .prompts
            .render("labeling/v1.0", &[("headlines", &joined)])
            .map_err(LlmCallError::Transport)?;

        let label_response: LabelResponse = retry_with_config(self.config, || async {
            self.ai
                .extract::<LabelResponse>(
                    self.model,
                    "You are a financial-news analyst producing a concise story label.",
                    label_prompt.clone(),
                )
                .await
                .map_err(LlmCallError::Transport)
        })
        .await?;

        let rationale_prompt = self
            .prompts
            .render(
                "rationale/v1.0",
                &[("label", &label_response.label), ("headlines", &joined)],
            )
            .map_err(LlmCallError::Transport)?;

        let rationale_response: RationaleResponse = retry_with_config(self.config, || async {
            self.ai
                .extract::<RationaleResponse>(
                    self.model,
                    "You are a financial-news analyst explaining a story's connective thread.",
                    rationale_prompt.clone(),
                )
                .await
                .map_err(LlmCallError::Transport)
        })
        .await?;

        Ok(StoryEnrichment {
            label: label_response.label,
            rationale: rationale_response.rationale,
        })
    }
}
