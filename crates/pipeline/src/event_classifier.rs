//! C2 EventClassifier (§4.2): maps text + entities to at most one event-type
//! tag using priority-ranked rules, loaded once at startup from a rule table
//! (§6 "File inputs").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One classification rule. Lower `priority` wins when multiple rules match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRule {
    pub event_type: String,
    pub priority: u32,
    pub keywords: Vec<String>,
    /// entity_type -> required entity names (case-insensitive).
    #[serde(default)]
    pub entity_requirements: HashMap<String, Vec<String>>,
    pub description: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventClassification {
    pub event_type: String,
    pub priority: u32,
    pub description: String,
    pub rationale: String,
}

pub struct EventClassifier {
    rules: Vec<EventRule>,
}

impl EventClassifier {
    pub fn new(rules: Vec<EventRule>) -> Self {
        Self { rules }
    }

    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let rules: Vec<EventRule> = serde_json::from_str(&raw)?;
        Ok(Self::new(rules))
    }

    /// Classify `text` given its extracted entities, grouped by type ->
    /// names. Ties break deterministically by rule list order (§4.2).
    pub fn classify(
        &self,
        text: &str,
        entities: &HashMap<String, Vec<String>>,
    ) -> Option<EventClassification> {
        let lower_text = text.to_lowercase();

        let mut best: Option<&EventRule> = None;
        for rule in &self.rules {
            if !rule_matches(rule, &lower_text, entities) {
                continue;
            }
            best = match best {
                None => Some(rule),
                Some(current) if rule.priority < current.priority => Some(rule),
                Some(current) => Some(current),
            };
        }

        best.map(|rule| EventClassification {
            event_type: rule.event_type.clone(),
            priority: rule.priority,
            description: rule.description.clone(),
            rationale: rule.rationale.clone(),
        })
    }
}

fn rule_matches(
    rule: &EventRule,
    lower_text: &str,
    entities: &HashMap<String, Vec<String>>,
) -> bool {
    let keyword_hit = rule
        .keywords
        .iter()
        .any(|kw| lower_text.contains(&kw.to_lowercase()));
    if keyword_hit {
        return true;
    }

    rule.entity_requirements.iter().any(|(entity_type, required_names)| {
        let Some(found) = entities.get(entity_type) else {
            return false;
        };
        required_names.iter().any(|required| {
            found
                .iter()
                .any(|name| name.eq_ignore_ascii_case(required))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<EventRule> {
        vec![
            EventRule {
                event_type: "CENTRAL_BANK_DECISION".to_string(),
                priority: 1,
                keywords: vec!["rate decision".to_string(), "fomc".to_string()],
                entity_requirements: HashMap::new(),
                description: "Central bank rate decision".to_string(),
                rationale: "Direct monetary policy action".to_string(),
            },
            EventRule {
                event_type: "INFLATION_DATA".to_string(),
                priority: 2,
                keywords: vec!["cpi".to_string(), "inflation".to_string()],
                entity_requirements: HashMap::new(),
                description: "Inflation print".to_string(),
                rationale: "Price index release".to_string(),
            },
        ]
    }

    #[test]
    fn picks_lowest_priority_on_multi_match() {
        let classifier = EventClassifier::new(rules());
        let result = classifier
            .classify("FOMC rate decision amid rising inflation", &HashMap::new())
            .unwrap();
        assert_eq!(result.event_type, "CENTRAL_BANK_DECISION");
    }

    #[test]
    fn matches_via_entity_requirement() {
        let mut rules = rules();
        rules[1]
            .entity_requirements
            .insert("organization".to_string(), vec!["Federal Reserve".to_string()]);
        let classifier = EventClassifier::new(rules);

        let mut entities = HashMap::new();
        entities.insert(
            "organization".to_string(),
            vec!["federal reserve".to_string()],
        );
        let result = classifier.classify("no keyword hit here", &entities).unwrap();
        assert_eq!(result.event_type, "INFLATION_DATA");
    }

    #[test]
    fn no_match_returns_none() {
        let classifier = EventClassifier::new(rules());
        assert!(classifier.classify("quarterly earnings beat", &HashMap::new()).is_none());
    }
}
