//! C14 Synthesizer (§4.14): produces the human-facing markdown report for a
//! validated, enriched, tracked story.

use ai_client::OpenAi;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use storyline_core::{retry_with_config, AppConfig, LlmCallError};

use crate::prompts::PromptStore;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct SynthesisResponse {
    report_markdown: String,
}

/// One article contributing to the cluster's narrative (§4.14 step 1).
pub struct SalientArticle<'a> {
    pub title: &'a str,
    pub source: &'a str,
    pub publication_time: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct Synthesizer<'a> {
    ai: &'a OpenAi,
    prompts: &'a PromptStore,
    model: &'a str,
    config: &'a AppConfig,
}

impl<'a> Synthesizer<'a> {
    pub fn new(ai: &'a OpenAi, prompts: &'a PromptStore, model: &'a str, config: &'a AppConfig) -> Self {
        Self { ai, prompts, model, config }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn synthesize(
        &self,
        label: &str,
        rationale: &str,
        articles: &[SalientArticle<'_>],
        historical_context: &str,
        macro_context: &str,
    ) -> Result<String, LlmCallError> {
        let salient_snippets = render_salient_snippets(articles);

        let prompt = self
            .prompts
            .render(
                "synthesis/v1.0",
                &[
                    ("label", label),
                    ("rationale", rationale),
                    ("salient_snippets", &salient_snippets),
                    ("historical_context", historical_context),
                    ("macro_context", macro_context),
                ],
            )
            .map_err(LlmCallError::Transport)?;

        let response: SynthesisResponse = retry_with_config(self.config, || async {
            self.ai
                .extract::<SynthesisResponse>(
                    self.model,
                    "You are a strategic-signal analyst writing a markdown report.",
                    prompt.clone(),
                )
                .await
                .map_err(LlmCallError::Transport)
        })
        .await?;

        Ok(response.report_markdown)
    }
}

/// `title — source (publication_time)`, one per line, `publication_time`
/// rendered as `unknown` when absent (§4.14 step 1).
fn render_salient_snippets(articles: &[SalientArticle<'_>]) -> String {
    articles
        .iter()
        .map(|a| {
            let when = a
                .publication_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            format!("{} — {} ({})", a.title, a.source, when)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_snippet_with_known_time() {
        let articles = vec![SalientArticle {
            title: "ECB hikes rates",
            source: "Reuters",
            publication_time: None,
        }];
        let rendered = render_salient_snippets(&articles);
        assert_eq!(rendered, "ECB hikes rates — Reuters (unknown)");
    }

    #[test]
    fn renders_multiple_snippets_one_per_line() {
        let articles = vec![
            SalientArticle { title: "A", source: "S1", publication_time: None },
            SalientArticle { title: "B", source: "S2", publication_time: None },
        ];
        let rendered = render_salient_snippets(&articles);
        assert_eq!(rendered.lines().count(), 2);
    }
}
