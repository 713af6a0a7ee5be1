//! Heuristic `NerService` (§1, §6): `storyline-core` defines the seam a real
//! model plugs into via `NER_MODEL_NAME`; this is the regex-based fallback
//! that lets the pipeline run end-to-end without one.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use storyline_core::NerService;

static ORG_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][A-Za-z&.]*(?:\s+[A-Z][A-Za-z&.]*)*\s+(?:Inc|Corp|Corporation|Co|Ltd|LLC|Group|Holdings|Bank|PLC)\.?)\b")
        .unwrap()
});

static CAPITALIZED_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,3})\b").unwrap());

static TICKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([A-Z]{1,5})\b").unwrap());

const STOP_PHRASES: &[&str] = &["The", "This", "That", "These", "Those", "In", "On", "At", "According To"];

/// A single-pass, dependency-free heuristic: capitalized multi-word runs
/// become `ORG` candidates, company-suffix phrases become `ORG` too, and
/// `$TICKER`-style tokens become `TICKER`. No `PERSON`/`GPE` distinction is
/// attempted — real NER backends plug in via the trait for that.
pub struct HeuristicNerService;

#[async_trait]
impl NerService for HeuristicNerService {
    async fn extract_entities(&self, text: &str) -> anyhow::Result<HashMap<String, Vec<String>>> {
        let mut orgs: Vec<String> = Vec::new();
        let mut tickers: Vec<String> = Vec::new();

        for cap in ORG_SUFFIX.captures_iter(text) {
            orgs.push(cap[1].trim().to_string());
        }
        for cap in CAPITALIZED_RUN.captures_iter(text) {
            let candidate = cap[1].trim().to_string();
            if !STOP_PHRASES.iter().any(|stop| candidate.starts_with(stop)) {
                orgs.push(candidate);
            }
        }
        for cap in TICKER.captures_iter(text) {
            tickers.push(cap[1].to_string());
        }

        let mut entities = HashMap::new();
        if !orgs.is_empty() {
            entities.insert("ORG".to_string(), dedup_sorted(orgs));
        }
        if !tickers.is_empty() {
            entities.insert("TICKER".to_string(), dedup_sorted(tickers));
        }
        Ok(entities)
    }
}

fn dedup_sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_company_suffix_and_ticker() {
        let svc = HeuristicNerService;
        let entities = svc
            .extract_entities("Acme Corp reported earnings; shares of $ACME rallied.")
            .await
            .unwrap();
        assert!(entities["ORG"].iter().any(|n| n.contains("Acme Corp")));
        assert_eq!(entities["TICKER"], vec!["ACME".to_string()]);
    }

    #[tokio::test]
    async fn empty_text_yields_no_entities() {
        let svc = HeuristicNerService;
        let entities = svc.extract_entities("").await.unwrap();
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn sentence_leading_capital_is_not_a_false_org() {
        let svc = HeuristicNerService;
        let entities = svc.extract_entities("The Federal Reserve raised rates today.").await.unwrap();
        let orgs = entities.get("ORG").cloned().unwrap_or_default();
        assert!(!orgs.iter().any(|n| n.starts_with("The")));
    }
}
