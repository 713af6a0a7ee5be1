//! C4 AssetFilter (§4.4): LLM-reduces candidate assets to those truly
//! implicated by the article, with per-asset polarity. No retries on parse
//! failure within the call — the orchestrator owns cross-component retry.

use ai_client::OpenAi;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::prompts::PromptStore;

/// Maximum characters of article text sent to the LLM (§4.4).
const ARTICLE_TEXT_CHAR_LIMIT: usize = 6_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssetImpact {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FilteredAsset {
    pub asset: String,
    pub reason: String,
    pub impact: AssetImpact,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct AssetFilterResponse {
    assets: Vec<FilteredAsset>,
}

pub struct AssetFilter<'a> {
    ai: &'a OpenAi,
    prompts: &'a PromptStore,
    model: &'a str,
}

impl<'a> AssetFilter<'a> {
    pub fn new(ai: &'a OpenAi, prompts: &'a PromptStore, model: &'a str) -> Self {
        Self { ai, prompts, model }
    }

    /// On any schema violation or transport error, yield an empty list (§4.4,
    /// §7 kind 3) rather than propagating — the caller treats this as a
    /// `partial` signal, not a `failed` one.
    pub async fn filter(
        &self,
        article_text: &str,
        candidate_assets: &[String],
    ) -> Vec<FilteredAsset> {
        if candidate_assets.is_empty() {
            return Vec::new();
        }

        let truncated = ai_client_truncate(article_text, ARTICLE_TEXT_CHAR_LIMIT);
        let candidates = candidate_assets.join(", ");

        let prompt = match self.prompts.render(
            "asset_filter/v1.0",
            &[("candidates", &candidates), ("article_text", &truncated)],
        ) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(error = %err, "asset filter: failed to render prompt");
                return Vec::new();
            }
        };

        let result: anyhow::Result<AssetFilterResponse> = self
            .ai
            .extract(self.model, "You are a precise financial-markets analyst.", prompt)
            .await;

        match result {
            Ok(response) => response
                .assets
                .into_iter()
                .filter(|a| candidate_assets.contains(&a.asset))
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "asset filter: LLM call failed or returned invalid schema");
                Vec::new()
            }
        }
    }
}

fn ai_client_truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_char_limit() {
        let text = "x".repeat(10_000);
        let truncated = ai_client_truncate(&text, ARTICLE_TEXT_CHAR_LIMIT);
        assert_eq!(truncated.len(), ARTICLE_TEXT_CHAR_LIMIT);
    }

    #[test]
    fn leaves_short_text_untouched() {
        assert_eq!(ai_client_truncate("short", 100), "short");
    }
}
