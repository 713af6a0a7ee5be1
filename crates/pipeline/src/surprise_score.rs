//! C5 SurpriseScore (§4.5): quantifies how far an economic release diverged
//! from consensus expectations, as a pure numeric signal alongside the LLM
//! features.

use chrono::{DateTime, Duration, Utc};
use storyline_domains::PersistenceStore;

/// Window searched on either side of the article's publication time (§4.5
/// step 2).
const SEARCH_WINDOW_DAYS: i64 = 2;

const STOPWORDS: &[&str] = &["data", "report", "announcement"];

/// Synonym expansion so `event_type` keywords like `interest_rate_decision`
/// match economic-calendar event names like "Fed Funds Rate" (§4.5 step 1).
const SYNONYMS: &[(&str, &[&str])] = &[
    ("inflation", &["cpi", "consumer price", "inflation"]),
    ("gdp", &["gdp", "gross domestic", "economic growth"]),
    (
        "employment",
        &["nonfarm", "unemployment", "job", "employment"],
    ),
    ("interest", &["rate", "interest", "fed", "central bank"]),
];

pub struct SurpriseScorer<'a> {
    store: &'a PersistenceStore,
}

impl<'a> SurpriseScorer<'a> {
    pub fn new(store: &'a PersistenceStore) -> Self {
        Self { store }
    }

    /// Returns `None` when `event_type` is absent, yields no keywords, or no
    /// matching economic event is found within the search window (§4.5 step
    /// 4, treated as "no signal" rather than an error).
    pub async fn score(
        &self,
        event_type: Option<&str>,
        publication_time: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Option<f64>> {
        let Some(event_type) = event_type else {
            return Ok(None);
        };
        let Some(pub_time) = publication_time else {
            return Ok(None);
        };

        let keywords = expand_keywords(event_type);
        if keywords.is_empty() {
            return Ok(None);
        }

        let start = pub_time - Duration::days(SEARCH_WINDOW_DAYS);
        let end = pub_time + Duration::days(SEARCH_WINDOW_DAYS);
        let candidates = self.store.find_events(start, end, &keywords).await?;

        let nearest = candidates
            .into_iter()
            .min_by_key(|ev| (ev.event_time - pub_time).num_seconds().abs());

        let Some(event) = nearest else {
            return Ok(None);
        };

        let (Some(actual), Some(forecast)) = (event.actual_value, event.forecast_value) else {
            return Ok(None);
        };

        Ok(Some(surprise(actual, forecast)))
    }
}

/// `min(1.0, |actual - forecast| / max(|forecast|, 1e-3))` (§4.5 step 4).
fn surprise(actual: f64, forecast: f64) -> f64 {
    let denom = forecast.abs().max(1e-3);
    ((actual - forecast).abs() / denom).min(1.0)
}

/// Splits `event_type` on non-alphanumeric separators, lowercases, drops
/// stopwords, then expands each remaining token through `SYNONYMS` (§4.5 step
/// 1). A token with no synonym entry is kept as-is.
fn expand_keywords(event_type: &str) -> Vec<String> {
    let mut keywords = Vec::new();
    for token in event_type.split(|c: char| !c.is_alphanumeric()) {
        let token = token.to_lowercase();
        if token.is_empty() || STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        match SYNONYMS.iter().find(|(key, _)| *key == token) {
            Some((_, synonyms)) => {
                for syn in *synonyms {
                    keywords.push(syn.to_string());
                }
            }
            None => keywords.push(token),
        }
    }
    keywords.sort();
    keywords.dedup();
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surprise_is_zero_on_exact_match() {
        assert_eq!(surprise(2.5, 2.5), 0.0);
    }

    #[test]
    fn surprise_is_capped_at_one() {
        assert_eq!(surprise(100.0, 1.0), 1.0);
    }

    #[test]
    fn surprise_guards_against_near_zero_forecast() {
        let s = surprise(0.01, 0.0);
        assert!(s <= 1.0 && s > 0.0);
    }

    #[test]
    fn expands_known_event_types() {
        let keywords = expand_keywords("interest_rate_decision");
        assert!(keywords.contains(&"fed".to_string()));
        assert!(keywords.contains(&"rate".to_string()));
        assert!(keywords.contains(&"decision".to_string()));
    }

    #[test]
    fn drops_stopwords() {
        let keywords = expand_keywords("gdp_data_report");
        assert!(!keywords.iter().any(|k| k == "data" || k == "report"));
        assert!(keywords.contains(&"gdp".to_string()));
    }

    #[test]
    fn unknown_tokens_pass_through() {
        let keywords = expand_keywords("housing_starts");
        assert!(keywords.contains(&"housing".to_string()));
        assert!(keywords.contains(&"starts".to_string()));
    }
}
