//! C1 FeatureExtractor (§4.1): fetches article text from a URL, extracts
//! named entities, and produces a dense semantic embedding. Never throws out
//! on a subcomponent failure — it always returns whatever partial result it
//! managed to produce, and the caller records the rest in the processing log.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use scraper::{Html, Selector};
use storyline_core::{EmbeddingService, ExtractionError, NerService};

/// Minimum usable content length (§4.1, §8 boundary behavior).
pub const MIN_TEXT_CHARS: usize = 150;

/// Whitespace-token budget for embedding input truncation (§4.1).
const EMBEDDING_TOKEN_BUDGET: usize = 256;

const TRUNCATION_SENTINEL: &str = " ... ";

const FIXED_USER_AGENT: &str =
    "StorylineFeatureExtractor/1.0 (+https://example.invalid/bot)";

/// Partial or complete output of one article's feature extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractedFeatures {
    pub full_text: Option<String>,
    pub entities: HashMap<String, Vec<String>>,
    pub embedding: Option<Vec<f32>>,
}

impl ExtractedFeatures {
    pub fn is_empty(&self) -> bool {
        self.full_text.is_none() && self.entities.is_empty() && self.embedding.is_none()
    }
}

pub struct FeatureExtractor {
    http_client: reqwest::Client,
    ner_service: Arc<dyn NerService>,
    embedding_service: Arc<dyn EmbeddingService>,
    fetch_timeout: Duration,
}

impl FeatureExtractor {
    pub fn new(
        ner_service: Arc<dyn NerService>,
        embedding_service: Arc<dyn EmbeddingService>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            ner_service,
            embedding_service,
            fetch_timeout,
        }
    }

    /// Run the full C1 contract: `{full_text, entities, embedding}` or a
    /// partial result. Never returns `Err` — subcomponent failures degrade
    /// the output instead of aborting (§4.1, §7 kind 2).
    pub async fn extract(&self, url: &str) -> ExtractedFeatures {
        let full_text = match self.fetch_text(url).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "feature extraction: text fetch failed");
                return ExtractedFeatures::default();
            }
        };

        let entities = match self.ner_service.extract_entities(&full_text).await {
            Ok(raw) => dedupe_and_filter_entities(raw),
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "feature extraction: NER failed");
                HashMap::new()
            }
        };

        let embedding_input = truncate_for_embedding(&full_text, EMBEDDING_TOKEN_BUDGET);
        let embedding = match self.embedding_service.embed(&embedding_input).await {
            Ok(vector) => Some(vector),
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "feature extraction: embedding failed");
                None
            }
        };

        ExtractedFeatures {
            full_text: Some(full_text),
            entities,
            embedding,
        }
    }

    async fn fetch_text(&self, url: &str) -> Result<String, ExtractionError> {
        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::USER_AGENT, FIXED_USER_AGENT)
            .timeout(self.fetch_timeout)
            .send()
            .await?;

        let html = response.text().await?;
        let text = extract_visible_text(&html);

        if printable_char_count(&text) < MIN_TEXT_CHARS {
            return Err(ExtractionError::TooShort {
                chars: printable_char_count(&text),
                floor: MIN_TEXT_CHARS,
            });
        }

        Ok(text)
    }
}

/// Strip markup down to the visible body text.
fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").expect("static selector parses");
    let scope = document
        .select(&body_selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| document.root_element().text().collect::<Vec<_>>().join(" "));

    scope.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn printable_char_count(text: &str) -> usize {
    text.chars().filter(|c| !c.is_control()).count()
}

/// Dedupe within each entity type and drop mentions whose trimmed length is
/// <= 2 (§4.1).
fn dedupe_and_filter_entities(
    raw: HashMap<String, Vec<String>>,
) -> HashMap<String, Vec<String>> {
    raw.into_iter()
        .map(|(entity_type, names)| {
            let mut seen = std::collections::HashSet::new();
            let deduped: Vec<String> = names
                .into_iter()
                .filter(|name| name.trim().len() > 2)
                .filter(|name| seen.insert(name.to_lowercase()))
                .collect();
            (entity_type, deduped)
        })
        .filter(|(_, names)| !names.is_empty())
        .collect()
}

/// For texts exceeding the model token budget `B`, construct a truncated
/// input by concatenating the first `floor(B/2)` and last `ceil(B/2)`
/// whitespace tokens with a sentinel in between, preserving lead/tail signal
/// (§4.1).
fn truncate_for_embedding(text: &str, token_budget: usize) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() <= token_budget {
        return text.to_string();
    }

    let head_len = token_budget / 2;
    let tail_len = token_budget - head_len;
    let head = tokens[..head_len].join(" ");
    let tail = tokens[tokens.len() - tail_len..].join(" ");
    format!("{head}{TRUNCATION_SENTINEL}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_within_budget() {
        let text = "one two three";
        assert_eq!(truncate_for_embedding(text, 10), text);
    }

    #[test]
    fn truncates_preserving_head_and_tail() {
        let tokens: Vec<String> = (0..300).map(|i| i.to_string()).collect();
        let text = tokens.join(" ");
        let truncated = truncate_for_embedding(&text, 256);
        assert!(truncated.starts_with("0 1 2"));
        assert!(truncated.ends_with("298 299"));
        assert!(truncated.contains(TRUNCATION_SENTINEL.trim()));
    }

    #[test]
    fn dedupes_within_type_case_insensitively() {
        let mut raw = HashMap::new();
        raw.insert(
            "organization".to_string(),
            vec!["ECB".to_string(), "ecb".to_string(), "Eurozone".to_string()],
        );
        let result = dedupe_and_filter_entities(raw);
        assert_eq!(result.get("organization").unwrap().len(), 2);
    }

    #[test]
    fn drops_short_mentions() {
        let mut raw = HashMap::new();
        raw.insert(
            "organization".to_string(),
            vec!["EU".to_string(), "ECB".to_string()],
        );
        let result = dedupe_and_filter_entities(raw);
        assert_eq!(result.get("organization").unwrap(), &vec!["ECB".to_string()]);
    }

    #[test]
    fn drops_types_left_entirely_empty() {
        let mut raw = HashMap::new();
        raw.insert("organization".to_string(), vec!["EU".to_string()]);
        let result = dedupe_and_filter_entities(raw);
        assert!(result.is_empty());
    }
}
