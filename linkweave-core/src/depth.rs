//! Depth reconciliation: recomputes every node's distance tier from the seed
//! set over an already-built graph.
//!
//! Two policies exist and they disagree on purpose:
//!
//! | Policy | Traversal | Unreached nodes |
//! |--------|-----------|-----------------|
//! | [`ForwardBfs`] | outgoing edges from all seeds at once | orphan depth |
//! | [`NearestSeed`] | per seed: outgoing first, incoming if no forward path; min over seeds, capped | orphan depth |
//!
//! `NearestSeed` counts "links to a seed" as closeness, `ForwardBfs` does not.

use crate::config::DepthConfig;
use crate::graph::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepthPolicyKind {
    #[default]
    ForwardBfs,
    NearestSeed,
}

impl DepthPolicyKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "forward-bfs" | "forward" | "a" => Some(DepthPolicyKind::ForwardBfs),
            "nearest-seed" | "nearest" | "b" => Some(DepthPolicyKind::NearestSeed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DepthPolicyKind::ForwardBfs => "forward-bfs",
            DepthPolicyKind::NearestSeed => "nearest-seed",
        }
    }
}

/// A pure mapping from (graph, seeds) to one depth per node position.
pub trait DepthPolicy: Send + Sync {
    fn kind(&self) -> DepthPolicyKind;
    fn assign(&self, graph: &GraphStore, seeds: &[String]) -> Vec<u32>;
}

/// Multi-source BFS along outgoing edges with every seed at depth 0.
#[derive(Debug, Clone)]
pub struct ForwardBfs {
    pub orphan_depth: u32,
}

/// Nearest-seed distance, forward direction preferred per seed, capped at
/// `max_display_depth`.
#[derive(Debug, Clone)]
pub struct NearestSeed {
    pub orphan_depth: u32,
    pub max_display_depth: u32,
}

fn seed_positions(graph: &GraphStore, seeds: &[String]) -> Vec<usize> {
    let mut positions: Vec<usize> = seeds.iter().filter_map(|s| graph.position(s)).collect();
    positions.dedup();
    positions
}

/// Hop distance from `sources` over `adjacency`; `None` when unreachable.
fn bfs(adjacency: &[Vec<usize>], sources: &[usize]) -> Vec<Option<u32>> {
    let mut dist = vec![None; adjacency.len()];
    let mut queue = VecDeque::new();
    for &s in sources {
        if dist[s].is_none() {
            dist[s] = Some(0);
            queue.push_back(s);
        }
    }
    while let Some(v) = queue.pop_front() {
        let next = dist[v].unwrap_or(0) + 1;
        for &w in &adjacency[v] {
            if dist[w].is_none() {
                dist[w] = Some(next);
                queue.push_back(w);
            }
        }
    }
    dist
}

impl DepthPolicy for ForwardBfs {
    fn kind(&self) -> DepthPolicyKind {
        DepthPolicyKind::ForwardBfs
    }

    fn assign(&self, graph: &GraphStore, seeds: &[String]) -> Vec<u32> {
        let sources = seed_positions(graph, seeds);
        bfs(&graph.out_adjacency(), &sources)
            .into_iter()
            .map(|d| d.unwrap_or(self.orphan_depth))
            .collect()
    }
}

impl DepthPolicy for NearestSeed {
    fn kind(&self) -> DepthPolicyKind {
        DepthPolicyKind::NearestSeed
    }

    fn assign(&self, graph: &GraphStore, seeds: &[String]) -> Vec<u32> {
        let forward = graph.out_adjacency();
        let backward = graph.in_adjacency();
        let mut best: Vec<Option<u32>> = vec![None; graph.node_count()];

        for s in seed_positions(graph, seeds) {
            let fwd = bfs(&forward, &[s]);
            let rev = bfs(&backward, &[s]);
            for (v, slot) in best.iter_mut().enumerate() {
                let Some(d) = fwd[v].or(rev[v]) else {
                    continue;
                };
                *slot = Some(slot.map_or(d, |b| b.min(d)));
            }
        }

        best.into_iter()
            .map(|d| match d {
                Some(d) => d.min(self.max_display_depth),
                None => self.orphan_depth,
            })
            .collect()
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub policy: DepthPolicyKind,
    pub changed: usize,
    pub before: BTreeMap<u32, usize>,
    pub after: BTreeMap<u32, usize>,
}

pub struct DepthReconciler {
    policy: Box<dyn DepthPolicy>,
    seeds: Vec<String>,
}

impl DepthReconciler {
    pub fn new(policy: Box<dyn DepthPolicy>, seeds: Vec<String>) -> Self {
        Self { policy, seeds }
    }

    pub fn from_config(config: &DepthConfig, seeds: Vec<String>) -> Self {
        let policy: Box<dyn DepthPolicy> = match config.policy {
            DepthPolicyKind::ForwardBfs => Box::new(ForwardBfs {
                orphan_depth: config.orphan_depth,
            }),
            DepthPolicyKind::NearestSeed => Box::new(NearestSeed {
                orphan_depth: config.orphan_depth,
                max_display_depth: config.max_display_depth,
            }),
        };
        Self::new(policy, seeds)
    }

    pub fn policy(&self) -> DepthPolicyKind {
        self.policy.kind()
    }

    /// Depth per topic identifier, without touching the graph.
    pub fn compute(&self, graph: &GraphStore) -> BTreeMap<String, u32> {
        graph
            .ids()
            .zip(self.policy.assign(graph, &self.seeds))
            .map(|(id, d)| (id.to_string(), d))
            .collect()
    }

    /// Overwrites every node's depth with the policy's assignment.
    pub fn apply(&self, graph: &mut GraphStore) -> ReconcileReport {
        let before = depth_distribution(graph);
        let depths = self.policy.assign(graph, &self.seeds);

        let mut changed = 0;
        for (pos, depth) in depths.into_iter().enumerate() {
            if let Some(record) = graph.record_at_mut(pos)
                && record.depth != depth
            {
                record.depth = depth;
                changed += 1;
            }
        }

        let after = depth_distribution(graph);
        info!(
            "Reconciled depths with {} policy: {} of {} nodes changed",
            self.policy.kind().as_str(),
            changed,
            graph.node_count()
        );

        ReconcileReport {
            policy: self.policy.kind(),
            changed,
            before,
            after,
        }
    }
}

pub fn depth_distribution(graph: &GraphStore) -> BTreeMap<u32, usize> {
    let mut dist = BTreeMap::new();
    for (_, record) in graph.nodes() {
        *dist.entry(record.depth).or_insert(0) += 1;
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeRecord;

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> GraphStore {
        let mut store = GraphStore::new();
        for id in ids {
            store.insert_node(id, NodeRecord::at_depth(9));
        }
        for (s, t) in edges {
            store.add_edge(s, t);
        }
        store
    }

    fn seeds(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn forward() -> DepthReconciler {
        DepthReconciler::from_config(&DepthConfig::default(), seeds(&["seed"]))
    }

    fn nearest(seed_ids: &[&str]) -> DepthReconciler {
        let config = DepthConfig {
            policy: DepthPolicyKind::NearestSeed,
            ..DepthConfig::default()
        };
        DepthReconciler::from_config(&config, seeds(seed_ids))
    }

    #[test]
    fn test_forward_chain_and_idempotence() {
        let mut store = graph(&["seed", "m", "n"], &[("seed", "m"), ("m", "n")]);
        let reconciler = forward();

        let report = reconciler.apply(&mut store);
        assert_eq!(report.changed, 3);
        let first = reconciler.compute(&store);
        assert_eq!(first["seed"], 0);
        assert_eq!(first["m"], 1);
        assert_eq!(first["n"], 2);

        let again = reconciler.apply(&mut store);
        assert_eq!(again.changed, 0);
        assert_eq!(reconciler.compute(&store), first);
    }

    #[test]
    fn test_forward_ignores_incoming_edges() {
        let store = graph(&["seed", "fan"], &[("fan", "seed")]);
        let depths = forward().compute(&store);
        assert_eq!(depths["seed"], 0);
        assert_eq!(depths["fan"], 3);
    }

    #[test]
    fn test_forward_merged_frontier() {
        let store = graph(
            &["s1", "s2", "a", "b"],
            &[("s1", "a"), ("a", "b"), ("s2", "b"), ("s1", "s2")],
        );
        let reconciler =
            DepthReconciler::from_config(&DepthConfig::default(), seeds(&["s1", "s2"]));
        let depths = reconciler.compute(&store);
        assert_eq!(depths["s1"], 0);
        assert_eq!(depths["s2"], 0);
        assert_eq!(depths["a"], 1);
        assert_eq!(depths["b"], 1);
    }

    #[test]
    fn test_nearest_counts_incoming_links() {
        let store = graph(&["seed", "fan", "far"], &[("fan", "seed"), ("far", "fan")]);
        let depths = nearest(&["seed"]).compute(&store);
        assert_eq!(depths["seed"], 0);
        assert_eq!(depths["fan"], 1);
        assert_eq!(depths["far"], 2);
    }

    #[test]
    fn test_nearest_prefers_forward_path_per_seed() {
        // Forward seed -> a -> b -> x exists (3 hops) even though x -> seed is 1 hop back.
        let store = graph(
            &["seed", "a", "b", "x"],
            &[("seed", "a"), ("a", "b"), ("b", "x"), ("x", "seed")],
        );
        let config = DepthConfig {
            policy: DepthPolicyKind::NearestSeed,
            max_display_depth: 10,
            ..DepthConfig::default()
        };
        let depths = DepthReconciler::from_config(&config, seeds(&["seed"])).compute(&store);
        assert_eq!(depths["x"], 3);
    }

    #[test]
    fn test_nearest_takes_minimum_over_seeds_and_clamps() {
        let store = graph(
            &["s1", "s2", "a", "b", "c", "lonely"],
            &[("s1", "a"), ("a", "b"), ("b", "c"), ("c", "s2")],
        );
        let depths = nearest(&["s1", "s2"]).compute(&store);
        assert_eq!(depths["s1"], 0);
        assert_eq!(depths["s2"], 0);
        assert_eq!(depths["a"], 1);
        // s1 -> b is 2 hops forward; s2 reaches b backwards in 2 as well.
        assert_eq!(depths["b"], 2);
        // 3 hops from s1, 1 hop back from s2.
        assert_eq!(depths["c"], 1);
        assert_eq!(depths["lonely"], 3);
    }

    #[test]
    fn test_nearest_is_idempotent() {
        let mut store = graph(
            &["seed", "a", "b", "c", "d", "back", "far", "lonely"],
            &[
                ("seed", "a"),
                ("a", "b"),
                ("b", "c"),
                ("c", "d"),
                ("back", "seed"),
                ("far", "back"),
            ],
        );
        let reconciler = nearest(&["seed"]);

        let report = reconciler.apply(&mut store);
        assert_eq!(report.policy, DepthPolicyKind::NearestSeed);
        assert_eq!(report.changed, 8);
        let first = reconciler.compute(&store);
        assert_eq!(first["seed"], 0);
        assert_eq!(first["a"], 1);
        assert_eq!(first["b"], 2);
        assert_eq!(first["c"], 2);
        assert_eq!(first["d"], 2);
        assert_eq!(first["back"], 1);
        assert_eq!(first["far"], 2);
        assert_eq!(first["lonely"], 3);

        let again = reconciler.apply(&mut store);
        assert_eq!(again.changed, 0);
        assert_eq!(again.before, again.after);
        assert_eq!(reconciler.compute(&store), first);
    }

    #[test]
    fn test_nearest_clamps_long_chains() {
        let store = graph(
            &["seed", "a", "b", "c", "d"],
            &[("seed", "a"), ("a", "b"), ("b", "c"), ("c", "d")],
        );
        let b_depths = nearest(&["seed"]).compute(&store);
        assert_eq!(b_depths["c"], 2);
        assert_eq!(b_depths["d"], 2);

        let a_depths = forward().compute(&store);
        assert_eq!(a_depths["c"], 3);
        assert_eq!(a_depths["d"], 4);
    }

    #[test]
    fn test_seeds_missing_from_graph_are_ignored() {
        let store = graph(&["a"], &[]);
        let depths = forward().compute(&store);
        assert_eq!(depths["a"], 3);
        let depths = nearest(&["seed"]).compute(&store);
        assert_eq!(depths["a"], 3);
    }

    #[test]
    fn test_every_seed_at_zero_under_both_policies() {
        let store = graph(&["s1", "s2", "x"], &[("s1", "s2"), ("x", "s1")]);
        for reconciler in [
            DepthReconciler::from_config(&DepthConfig::default(), seeds(&["s1", "s2"])),
            nearest(&["s1", "s2"]),
        ] {
            let depths = reconciler.compute(&store);
            assert_eq!(depths["s1"], 0);
            assert_eq!(depths["s2"], 0);
        }
    }

    #[test]
    fn test_report_distributions() {
        let mut store = graph(&["seed", "m"], &[("seed", "m")]);
        let report = forward().apply(&mut store);
        assert_eq!(report.policy, DepthPolicyKind::ForwardBfs);
        assert_eq!(report.before.get(&9), Some(&2));
        assert_eq!(report.after.get(&0), Some(&1));
        assert_eq!(report.after.get(&1), Some(&1));
    }

    #[test]
    fn test_policy_kind_from_str() {
        assert_eq!(DepthPolicyKind::from_str("forward-bfs"), Some(DepthPolicyKind::ForwardBfs));
        assert_eq!(DepthPolicyKind::from_str("B"), Some(DepthPolicyKind::NearestSeed));
        assert_eq!(DepthPolicyKind::from_str("sideways"), None);
        assert_eq!(DepthPolicyKind::NearestSeed.as_str(), "nearest-seed");
    }
}
