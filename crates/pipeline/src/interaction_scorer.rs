//! C7 InteractionScorer (§4.7): builds a flat matrix of article embeddings,
//! indexes it for approximate nearest-neighbor candidate generation, then
//! scores and thresholds each candidate pair into a weighted interaction
//! edge. Pure/testable — no database access; the caller persists via
//! `PersistenceStore::save_edges`.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use hnsw_rs::prelude::*;
use storyline_domains::{ArticleWithEntities, GraphEdge};

#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub semantic: f64,
    pub entity: f64,
    pub temporal: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            semantic: 0.50,
            entity: 0.30,
            temporal: 0.20,
        }
    }
}

pub struct InteractionScorer {
    weights: ScoringWeights,
    threshold: f64,
    candidate_k: usize,
}

impl InteractionScorer {
    pub fn new(weights: ScoringWeights, threshold: f64, candidate_k: usize) -> Self {
        Self {
            weights,
            threshold,
            candidate_k,
        }
    }

    /// Score all articles with an embedding against their nearest neighbors,
    /// emitting one canonicalized `GraphEdge` per pair that clears
    /// `threshold` (§4.7).
    pub fn score(
        &self,
        articles: &[ArticleWithEntities],
        run_date: NaiveDate,
    ) -> anyhow::Result<Vec<GraphEdge>> {
        let embedded: Vec<&ArticleWithEntities> = articles
            .iter()
            .filter(|a| a.article.embedding.is_some())
            .collect();

        if embedded.len() < 2 {
            return Ok(Vec::new());
        }

        let candidate_pairs = self.candidate_pairs(&embedded)?;

        let mut edges = Vec::new();
        for (i, j) in candidate_pairs {
            let a = embedded[i];
            let b = embedded[j];

            let semantic = cosine_similarity(
                a.article.embedding.as_ref().unwrap(),
                b.article.embedding.as_ref().unwrap(),
            )
            .clamp(0.0, 1.0);
            let entity = jaccard_entity_overlap(&a.entities, &b.entities);
            let temporal = temporal_decay(a.article.publication_time, b.article.publication_time);

            let total = self.weights.semantic * semantic
                + self.weights.entity * entity
                + self.weights.temporal * temporal;

            if total < self.threshold {
                continue;
            }

            edges.push(GraphEdge::new(
                a.article.id,
                b.article.id,
                semantic,
                entity,
                temporal,
                total,
                run_date,
            )?);
        }

        Ok(edges)
    }

    /// Approximate-nearest-neighbor candidate generation over the embedding
    /// matrix via `hnsw_rs`, canonicalized to `(min_index, max_index)` and
    /// deduplicated (§4.7 step 1).
    fn candidate_pairs(
        &self,
        embedded: &[&ArticleWithEntities],
    ) -> anyhow::Result<Vec<(usize, usize)>> {
        let n = embedded.len();
        let max_nb_connection = 16;
        let ef_construction = 200;
        let nb_layer = (n as f32).ln().ceil().max(1.0) as usize;

        let hnsw: Hnsw<f32, DistCosine> =
            Hnsw::new(max_nb_connection, n, nb_layer, ef_construction, DistCosine {});

        let vectors: Vec<Vec<f32>> = embedded
            .iter()
            .map(|a| a.article.embedding.clone().unwrap())
            .collect();

        for (idx, vector) in vectors.iter().enumerate() {
            hnsw.insert((vector.as_slice(), idx));
        }

        let k = self.candidate_k.min(n.saturating_sub(1)).max(1);
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();

        for (idx, vector) in vectors.iter().enumerate() {
            let neighbors = hnsw.search(vector.as_slice(), k + 1, ef_construction);
            for neighbor in neighbors {
                let other = neighbor.d_id;
                if other == idx {
                    continue;
                }
                let pair = if idx < other { (idx, other) } else { (other, idx) };
                if seen.insert(pair) {
                    pairs.push(pair);
                }
            }
        }

        Ok(pairs)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

/// Jaccard overlap over the union of lowercased entity names across all
/// types (§4.7 step 2).
fn jaccard_entity_overlap(
    a: &std::collections::HashMap<String, Vec<String>>,
    b: &std::collections::HashMap<String, Vec<String>>,
) -> f64 {
    let names_a: HashSet<String> = a.values().flatten().map(|s| s.to_lowercase()).collect();
    let names_b: HashSet<String> = b.values().flatten().map(|s| s.to_lowercase()).collect();

    if names_a.is_empty() && names_b.is_empty() {
        return 0.0;
    }

    let intersection = names_a.intersection(&names_b).count();
    let union = names_a.union(&names_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// `exp(-delta_days / 7)`; `0.5` when either timestamp is missing (§4.7 step 2).
fn temporal_decay(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => {
            let delta_days = (a - b).num_seconds().abs() as f64 / 86_400.0;
            (-delta_days / 7.0).exp()
        }
        _ => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn jaccard_overlap_full_match() {
        let mut a = std::collections::HashMap::new();
        a.insert("organization".to_string(), vec!["ECB".to_string()]);
        let mut b = std::collections::HashMap::new();
        b.insert("organization".to_string(), vec!["ecb".to_string()]);
        assert_eq!(jaccard_entity_overlap(&a, &b), 1.0);
    }

    #[test]
    fn jaccard_overlap_empty_is_zero() {
        let a = std::collections::HashMap::new();
        let b = std::collections::HashMap::new();
        assert_eq!(jaccard_entity_overlap(&a, &b), 0.0);
    }

    #[test]
    fn temporal_decay_same_instant_is_one() {
        let t = Utc::now();
        assert!((temporal_decay(Some(t), Some(t)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn temporal_decay_missing_timestamp_is_half() {
        assert_eq!(temporal_decay(None, Some(Utc::now())), 0.5);
    }

    #[test]
    fn weights_default_sums_to_one() {
        let w = ScoringWeights::default();
        assert!((w.semantic + w.entity + w.temporal - 1.0).abs() < 1e-9);
    }
}
