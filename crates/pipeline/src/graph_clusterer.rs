//! C8 GraphClusterer (§4.8): groups scored interaction edges into candidate
//! story clusters via modularity-driven community detection over the
//! interaction graph for one run date.

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use storyline_domains::{ArticleId, GraphEdge};

/// Minimum community size to be emitted as a cluster (§4.8 step 3).
const MIN_CLUSTER_SIZE: usize = 2;

/// Local-moving passes run until no node relocation improves modularity, or
/// this cap is hit, whichever comes first.
const MAX_PASSES: usize = 50;

pub struct GraphClusterer;

impl GraphClusterer {
    /// Builds the weighted undirected interaction graph from `edges` and
    /// returns clusters of size >= 2, ordered by descending size then
    /// ascending minimum article id (§4.8).
    pub fn cluster(edges: &[GraphEdge]) -> Vec<Vec<ArticleId>> {
        if edges.is_empty() {
            return Vec::new();
        }

        let (graph, index_of) = build_graph(edges);
        let communities = louvain_lite(&graph);

        let mut by_community: HashMap<usize, Vec<ArticleId>> = HashMap::new();
        for (article_id, node) in &index_of {
            let community = communities[node.index()];
            by_community.entry(community).or_default().push(*article_id);
        }

        let mut clusters: Vec<Vec<ArticleId>> = by_community
            .into_values()
            .filter(|members| members.len() >= MIN_CLUSTER_SIZE)
            .map(|mut members| {
                members.sort_by_key(|id| id.into_inner());
                members
            })
            .collect();

        clusters.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| a[0].into_inner().cmp(&b[0].into_inner()))
        });

        clusters
    }
}

fn build_graph(
    edges: &[GraphEdge],
) -> (UnGraph<ArticleId, f64>, HashMap<ArticleId, NodeIndex>) {
    let mut graph = UnGraph::<ArticleId, f64>::new_undirected();
    let mut index_of: HashMap<ArticleId, NodeIndex> = HashMap::new();

    for edge in edges {
        let a = *index_of
            .entry(edge.source_article_id)
            .or_insert_with(|| graph.add_node(edge.source_article_id));
        let b = *index_of
            .entry(edge.target_article_id)
            .or_insert_with(|| graph.add_node(edge.target_article_id));
        graph.add_edge(a, b, edge.total_score);
    }

    (graph, index_of)
}

/// A single-level greedy local-moving modularity optimization in the spirit
/// of Louvain, without the multi-level community-aggregation phase: repeatedly
/// relocates each node to whichever neighboring community maximizes
/// modularity gain until a full pass produces no change. Adequate at the
/// node counts a daily interaction graph produces.
fn louvain_lite(graph: &UnGraph<ArticleId, f64>) -> Vec<usize> {
    let n = graph.node_count();
    let mut community: Vec<usize> = (0..n).collect();

    let adjacency: Vec<Vec<(usize, f64)>> = (0..n)
        .map(|i| {
            graph
                .edges(NodeIndex::new(i))
                .map(|e| {
                    let other = if e.source().index() == i {
                        e.target().index()
                    } else {
                        e.source().index()
                    };
                    (other, *e.weight())
                })
                .collect()
        })
        .collect();

    let degree: Vec<f64> = adjacency
        .iter()
        .map(|neighbors| neighbors.iter().map(|(_, w)| w).sum())
        .collect();

    let total_weight: f64 = degree.iter().sum::<f64>() / 2.0;
    if total_weight <= 0.0 {
        return community;
    }

    for _ in 0..MAX_PASSES {
        let mut changed = false;

        for node in 0..n {
            let current_community = community[node];

            let mut weight_by_community: HashMap<usize, f64> = HashMap::new();
            for (neighbor, weight) in &adjacency[node] {
                *weight_by_community.entry(community[*neighbor]).or_insert(0.0) += weight;
            }

            let community_degree = |target: usize, exclude_node: usize| -> f64 {
                (0..n)
                    .filter(|&i| i != exclude_node && community[i] == target)
                    .map(|i| degree[i])
                    .sum()
            };

            let mut best_community = current_community;
            let mut best_gain = 0.0_f64;

            for (&candidate, &k_in) in &weight_by_community {
                if candidate == current_community {
                    continue;
                }
                let sigma_tot = community_degree(candidate, node);
                let gain = k_in - sigma_tot * degree[node] / (2.0 * total_weight);
                if gain > best_gain {
                    best_gain = gain;
                    best_community = candidate;
                }
            }

            if best_community != current_community {
                community[node] = best_community;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    renumber(&community)
}

/// Relabels community ids to a dense `0..k` range for stable grouping.
fn renumber(community: &[usize]) -> Vec<usize> {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    community
        .iter()
        .map(|&c| {
            let next = mapping.len();
            *mapping.entry(c).or_insert(next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn edge(a: i64, b: i64, score: f64) -> GraphEdge {
        GraphEdge::new(
            ArticleId::new(a),
            ArticleId::new(b),
            score,
            score,
            score,
            score,
            today(),
        )
        .unwrap()
    }

    #[test]
    fn empty_edges_yield_no_clusters() {
        assert!(GraphClusterer::cluster(&[]).is_empty());
    }

    #[test]
    fn two_tightly_linked_triangles_separate_into_two_clusters() {
        let edges = vec![
            edge(1, 2, 0.9),
            edge(2, 3, 0.9),
            edge(1, 3, 0.9),
            edge(4, 5, 0.9),
            edge(5, 6, 0.9),
            edge(4, 6, 0.9),
            edge(3, 4, 0.1),
        ];
        let clusters = GraphClusterer::cluster(&edges);
        assert_eq!(clusters.len(), 2);
        for cluster in &clusters {
            assert_eq!(cluster.len(), 3);
        }
    }

    #[test]
    fn singleton_components_are_dropped() {
        let edges = vec![edge(1, 2, 0.9)];
        let clusters = GraphClusterer::cluster(&edges);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
    }

    #[test]
    fn clusters_are_ordered_by_descending_size_then_min_id() {
        let edges = vec![
            edge(10, 11, 0.9),
            edge(11, 12, 0.9),
            edge(1, 2, 0.9),
            edge(2, 3, 0.9),
            edge(3, 4, 0.9),
        ];
        let clusters = GraphClusterer::cluster(&edges);
        assert!(clusters[0].len() >= clusters[1].len());
    }
}
