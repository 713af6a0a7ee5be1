//! C3 AssetMapper (§4.3): maps extracted entities to candidate
//! financial-instrument symbols via a rules table loaded once at startup.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// `(entity_type, entity_name_synonyms[]) -> candidate_assets[]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRule {
    pub entity_type: String,
    pub synonyms: Vec<String>,
    pub assets: Vec<String>,
}

pub struct AssetMapper {
    rules: Vec<AssetRule>,
}

impl AssetMapper {
    pub fn new(rules: Vec<AssetRule>) -> Self {
        Self { rules }
    }

    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let rules: Vec<AssetRule> = serde_json::from_str(&raw)?;
        Ok(Self::new(rules))
    }

    /// Case-insensitive, containment-both-ways match; first hit per rule
    /// contributes its assets. Output is the sorted deduplicated union (§4.3).
    pub fn map_assets(&self, entities: &HashMap<String, Vec<String>>) -> Vec<String> {
        let mut candidates: BTreeSet<String> = BTreeSet::new();

        for rule in &self.rules {
            let Some(names) = entities.get(&rule.entity_type) else {
                continue;
            };
            let hit = names.iter().any(|name| {
                let lower_name = name.to_lowercase();
                rule.synonyms.iter().any(|syn| {
                    let lower_syn = syn.to_lowercase();
                    lower_name.contains(&lower_syn) || lower_syn.contains(&lower_name)
                })
            });
            if hit {
                candidates.extend(rule.assets.iter().cloned());
            }
        }

        candidates.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<AssetRule> {
        vec![
            AssetRule {
                entity_type: "organization".to_string(),
                synonyms: vec!["european central bank".to_string(), "ecb".to_string()],
                assets: vec!["EURUSD".to_string(), "FEZ".to_string()],
            },
            AssetRule {
                entity_type: "organization".to_string(),
                synonyms: vec!["federal reserve".to_string(), "fed".to_string()],
                assets: vec!["DXY".to_string(), "SPY".to_string()],
            },
        ]
    }

    #[test]
    fn matches_case_insensitively_both_ways() {
        let mapper = AssetMapper::new(rules());
        let mut entities = HashMap::new();
        entities.insert("organization".to_string(), vec!["ECB".to_string()]);
        assert_eq!(mapper.map_assets(&entities), vec!["EURUSD", "FEZ"]);
    }

    #[test]
    fn unions_and_sorts_across_rules() {
        let mapper = AssetMapper::new(rules());
        let mut entities = HashMap::new();
        entities.insert(
            "organization".to_string(),
            vec!["ECB".to_string(), "the Federal Reserve".to_string()],
        );
        assert_eq!(
            mapper.map_assets(&entities),
            vec!["DXY", "EURUSD", "FEZ", "SPY"]
        );
    }

    #[test]
    fn no_match_yields_empty() {
        let mapper = AssetMapper::new(rules());
        let mut entities = HashMap::new();
        entities.insert("organization".to_string(), vec!["Acme Corp".to_string()]);
        assert!(mapper.map_assets(&entities).is_empty());
    }
}
