//! C13 StoryTracker (§4.13): decides whether a newly-enriched cluster is the
//! continuation of an existing active story rather than a brand-new one.

use ai_client::OpenAi;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use storyline_core::{retry_with_config, AppConfig, LlmCallError};
use storyline_domains::SimilarStory;

use crate::historical_retriever::HistoricalRetriever;
use crate::prompts::PromptStore;

/// Candidates offered to the continuity LLM call (§4.13 step 3).
const CANDIDATE_COUNT: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct ContinuityResponse {
    is_continuation: bool,
    parent_story_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContinuityDecision {
    NewStory,
    Continuation { parent_story_id: i64 },
}

pub struct StoryTracker<'a> {
    ai: &'a OpenAi,
    prompts: &'a PromptStore,
    model: &'a str,
    config: &'a AppConfig,
    retriever: &'a HistoricalRetriever<'a>,
    historical_window_days: i64,
}

impl<'a> StoryTracker<'a> {
    pub fn new(
        ai: &'a OpenAi,
        prompts: &'a PromptStore,
        model: &'a str,
        config: &'a AppConfig,
        retriever: &'a HistoricalRetriever<'a>,
        historical_window_days: i64,
    ) -> Self {
        Self {
            ai,
            prompts,
            model,
            config,
            retriever,
            historical_window_days,
        }
    }

    /// `cluster_embeddings` are the per-article embeddings of the articles in
    /// the candidate cluster. With fewer than two embeddings there is no
    /// reliable representative vector, so tracking is skipped and the cluster
    /// is treated as a new story (§4.13 step 1).
    pub async fn track(
        &self,
        cluster_embeddings: &[Vec<f32>],
        label: &str,
        rationale: &str,
    ) -> Result<ContinuityDecision, LlmCallError> {
        if cluster_embeddings.len() < 2 {
            return Ok(ContinuityDecision::NewStory);
        }

        let representative = mean_vector(cluster_embeddings);

        let candidates = self
            .retriever
            .retrieve(
                &representative,
                CANDIDATE_COUNT,
                Some(self.historical_window_days),
            )
            .await
            .map_err(LlmCallError::Transport)?;

        if candidates.is_empty() {
            return Ok(ContinuityDecision::NewStory);
        }

        let candidate_block = render_candidates(&candidates);
        let prompt = self
            .prompts
            .render(
                "continuity/v1.0",
                &[
                    ("label", label),
                    ("rationale", rationale),
                    ("candidate_stories", &candidate_block),
                ],
            )
            .map_err(LlmCallError::Transport)?;

        let response: ContinuityResponse = retry_with_config(self.config, || async {
            self.ai
                .extract::<ContinuityResponse>(
                    self.model,
                    "You are tracking the continuity of financial-news stories over time.",
                    prompt.clone(),
                )
                .await
                .map_err(LlmCallError::Transport)
        })
        .await?;

        Ok(resolve_decision(response, &candidates))
    }
}

/// A continuation verdict is only honored if `parent_story_id` names one of
/// the offered candidates (§4.13 step 4) — otherwise the LLM has
/// hallucinated an id and the cluster is treated as a new story.
fn resolve_decision(response: ContinuityResponse, candidates: &[SimilarStory]) -> ContinuityDecision {
    if !response.is_continuation {
        return ContinuityDecision::NewStory;
    }

    match response.parent_story_id {
        Some(id) if candidates.iter().any(|c| c.story_id.into_inner() == id) => {
            ContinuityDecision::Continuation { parent_story_id: id }
        }
        _ => ContinuityDecision::NewStory,
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

fn render_candidates(candidates: &[SimilarStory]) -> String {
    candidates
        .iter()
        .map(|c| format!("- id={} title=\"{}\" essence=\"{}\"", c.story_id, c.title, c.essence_text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_domains::StoryId;

    #[test]
    fn mean_vector_averages_componentwise() {
        let v = mean_vector(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(v, vec![2.0, 3.0]);
    }

    fn candidate(id: i64) -> SimilarStory {
        SimilarStory {
            story_id: StoryId::new(id),
            title: "title".to_string(),
            essence_text: "essence".to_string(),
            distance: 0.1,
        }
    }

    #[test]
    fn rejects_continuation_pointing_outside_candidates() {
        let response = ContinuityResponse {
            is_continuation: true,
            parent_story_id: Some(999),
        };
        let decision = resolve_decision(response, &[candidate(1), candidate(2)]);
        assert_eq!(decision, ContinuityDecision::NewStory);
    }

    #[test]
    fn accepts_continuation_matching_a_candidate() {
        let response = ContinuityResponse {
            is_continuation: true,
            parent_story_id: Some(2),
        };
        let decision = resolve_decision(response, &[candidate(1), candidate(2)]);
        assert_eq!(decision, ContinuityDecision::Continuation { parent_story_id: 2 });
    }

    #[test]
    fn false_verdict_is_always_new_story() {
        let response = ContinuityResponse {
            is_continuation: false,
            parent_story_id: Some(1),
        };
        let decision = resolve_decision(response, &[candidate(1)]);
        assert_eq!(decision, ContinuityDecision::NewStory);
    }
}
