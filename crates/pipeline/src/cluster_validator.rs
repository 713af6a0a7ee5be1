//! C9 ClusterValidator (§4.9): the gate between a raw graph cluster and the
//! rest of the story pipeline — an LLM judges whether the cluster actually
//! represents one coherent story before any enrichment work is spent on it.

use ai_client::OpenAi;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use storyline_core::{retry_with_config, AppConfig, LlmCallError};

use crate::prompts::PromptStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SignalStrength {
    Strong,
    Medium,
    Weak,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClusterValidation {
    pub is_story: bool,
    /// Populated only when `is_story` is true (§4.9); left `None` for a
    /// rejected cluster.
    pub signal_strength: Option<SignalStrength>,
    pub confidence_score: Option<f64>,
    pub reasoning: Option<String>,
}

impl ClusterValidation {
    /// A `true` verdict must carry its supporting fields — an LLM that says
    /// yes but omits them has produced a malformed response (§4.9).
    fn is_well_formed(&self) -> bool {
        if self.is_story {
            self.signal_strength.is_some() && self.confidence_score.is_some() && self.reasoning.is_some()
        } else {
            true
        }
    }
}

pub struct ClusterValidator<'a> {
    ai: &'a OpenAi,
    prompts: &'a PromptStore,
    model: &'a str,
    config: &'a AppConfig,
}

impl<'a> ClusterValidator<'a> {
    pub fn new(ai: &'a OpenAi, prompts: &'a PromptStore, model: &'a str, config: &'a AppConfig) -> Self {
        Self { ai, prompts, model, config }
    }

    /// Retries the whole call up to the configured attempt budget on either a
    /// transport error or a malformed `true` verdict (§4.9, §5).
    pub async fn validate(
        &self,
        headlines: &[String],
        recurring_entities: &[String],
    ) -> Result<ClusterValidation, LlmCallError> {
        let headlines_block = headlines.iter().map(|h| format!("- {h}")).collect::<Vec<_>>().join("\n");
        let entities_block = if recurring_entities.is_empty() {
            "(none)".to_string()
        } else {
            recurring_entities.join(", ")
        };

        let prompt = self
            .prompts
            .render(
                "cluster_validation/v1.0",
                &[
                    ("headlines", &headlines_block),
                    ("recurring_entities", &entities_block),
                ],
            )
            .map_err(LlmCallError::Transport)?;

        retry_with_config(self.config, || async {
            let result: ClusterValidation = self
                .ai
                .extract(
                    self.model,
                    "You are a rigorous financial-news story validator.",
                    prompt.clone(),
                )
                .await
                .map_err(LlmCallError::Transport)?;

            if !result.is_well_formed() {
                return Err(LlmCallError::SchemaViolation(
                    "is_story=true without signal_strength/confidence_score/reasoning".to_string(),
                ));
            }

            Ok(result)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_positive_verdict() {
        let v = ClusterValidation {
            is_story: true,
            signal_strength: Some(SignalStrength::Strong),
            confidence_score: Some(0.7),
            reasoning: Some("coherent narrative".to_string()),
        };
        assert!(v.is_well_formed());
    }

    #[test]
    fn positive_verdict_missing_fields_is_malformed() {
        let v = ClusterValidation {
            is_story: true,
            signal_strength: None,
            confidence_score: Some(0.7),
            reasoning: Some("x".to_string()),
        };
        assert!(!v.is_well_formed());
    }

    #[test]
    fn negative_verdict_never_malformed() {
        let v = ClusterValidation {
            is_story: false,
            signal_strength: None,
            confidence_score: None,
            reasoning: None,
        };
        assert!(v.is_well_formed());
    }
}
