//! Downstream submission (§6 EXTERNAL INTERFACES): POSTs the aggregate
//! per-run payload to the application server once a batch completes.
//! Success is HTTP 2xx; non-2xx responses and transport errors are logged,
//! not retried, from the core.

use serde::Serialize;

/// One validated, synthesized story as surfaced to the application server.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedStory {
    pub story_title: String,
    pub related_news_ids: Vec<String>,
    /// Markdown; the synthesis prompt is instructed to end it with a
    /// not-investment-advice disclaimer (§4.14).
    pub analysis_summary: String,
    /// Drawn from the same fixed `event_type` enum C2's rule table emits.
    pub main_categories: Vec<String>,
}

/// The full per-run aggregate payload (§6).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmissionPayload {
    pub analyzed_stories: Vec<AnalyzedStory>,
    pub ungrouped_news_ids: Vec<String>,
}

impl SubmissionPayload {
    pub fn is_empty(&self) -> bool {
        self.analyzed_stories.is_empty() && self.ungrouped_news_ids.is_empty()
    }
}

pub struct DownstreamSubmitter {
    http_client: reqwest::Client,
    url: Option<String>,
}

impl DownstreamSubmitter {
    pub fn new(http_client: reqwest::Client, url: Option<String>) -> Self {
        Self { http_client, url }
    }

    /// POSTs `payload` as JSON to `downstream_submit_url`. A missing URL is
    /// not an error — submission is simply skipped. Never propagates a
    /// failure to the caller; the orchestrator's run must complete either way.
    pub async fn submit(&self, payload: &SubmissionPayload) {
        let Some(url) = &self.url else {
            tracing::debug!("downstream submission skipped: no URL configured");
            return;
        };

        if payload.is_empty() {
            tracing::debug!("downstream submission skipped: nothing to report");
            return;
        }

        match self.http_client.post(url).json(payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(status = %response.status(), "downstream submission accepted");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "downstream submission rejected, not retrying");
            }
            Err(err) => {
                tracing::warn!(error = %err, "downstream submission failed, not retrying");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_empty() {
        assert!(SubmissionPayload::default().is_empty());
    }

    #[test]
    fn payload_with_ungrouped_ids_is_not_empty() {
        let payload = SubmissionPayload {
            analyzed_stories: vec![],
            ungrouped_news_ids: vec!["1".to_string()],
        };
        assert!(!payload.is_empty());
    }
}
