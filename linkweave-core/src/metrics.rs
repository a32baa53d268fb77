//! Link-structure metrics: degree counts, degree centrality, PageRank and
//! pivot-sampled betweenness centrality.
//!
//! The pass runs once over a frozen graph and overwrites every node's
//! [`NodeMetrics`]. A failing PageRank degrades to an in-degree proxy and a
//! failing betweenness degrades to zero; neither aborts the pass.

use crate::config::MetricsConfig;
use crate::error::MetricsError;
use crate::graph::{GraphStore, NodeMetrics};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PageRankResult {
    pub scores: Vec<f64>,
    pub iterations: usize,
}

/// What the metrics pass did, including any degraded metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsReport {
    pub nodes: usize,
    pub pagerank_iterations: Option<usize>,
    pub pagerank_fallback: Option<MetricsError>,
    pub betweenness_pivots: usize,
    pub betweenness_fallback: Option<MetricsError>,
    pub duration_ms: u64,
}

/// `degree / (N - 1)`; zero everywhere when there is at most one node.
pub fn degree_centrality(degrees: &[usize]) -> Vec<f64> {
    let n = degrees.len();
    if n <= 1 {
        return vec![0.0; n];
    }
    let scale = 1.0 / (n - 1) as f64;
    degrees.iter().map(|&d| d as f64 * scale).collect()
}

/// PageRank via power iteration over successor lists.
///
/// Rank held by nodes without successors is spread evenly over all nodes each
/// iteration, so the scores keep summing to one. Convergence is the L1 norm of
/// the change between iterations falling below `config.tolerance`.
pub fn pagerank(
    successors: &[Vec<usize>],
    config: &MetricsConfig,
) -> Result<PageRankResult, MetricsError> {
    let n = successors.len();
    if n == 0 {
        return Ok(PageRankResult {
            scores: Vec::new(),
            iterations: 0,
        });
    }

    let d = config.damping;
    let nf = n as f64;
    let base = (1.0 - d) / nf;

    let mut scores = vec![1.0 / nf; n];
    let mut next = vec![0.0_f64; n];

    for iteration in 1..=config.max_iterations {
        let dangling: f64 = successors
            .iter()
            .zip(scores.iter())
            .filter(|(out, _)| out.is_empty())
            .map(|(_, s)| s)
            .sum();

        let teleport = base + d * dangling / nf;
        next.iter_mut().for_each(|s| *s = teleport);

        for (u, out) in successors.iter().enumerate() {
            if out.is_empty() {
                continue;
            }
            let share = d * scores[u] / out.len() as f64;
            for &v in out {
                next[v] += share;
            }
        }

        let diff: f64 = scores
            .iter()
            .zip(next.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();

        std::mem::swap(&mut scores, &mut next);

        if !diff.is_finite() || scores.iter().any(|s| !s.is_finite()) {
            return Err(MetricsError::NonFinite("pagerank"));
        }
        if diff < config.tolerance {
            return Ok(PageRankResult {
                scores,
                iterations: iteration,
            });
        }
    }

    Err(MetricsError::NonConvergence {
        iterations: config.max_iterations,
    })
}

/// Fallback importance score: `in_degree / max(in_degree)`, or zero for every
/// node when nothing has inbound links.
pub fn pagerank_proxy(in_degrees: &[usize]) -> Vec<f64> {
    let max = in_degrees.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return vec![0.0; in_degrees.len()];
    }
    in_degrees
        .iter()
        .map(|&d| d as f64 / max as f64)
        .collect()
}

/// Normalized betweenness centrality of an undirected graph, estimated from
/// `min(pivots, N)` source nodes drawn with a seeded RNG (Brandes'
/// accumulation). When every node is a source the result is exact.
pub fn approximate_betweenness(
    neighbors: &[Vec<usize>],
    pivots: usize,
    seed: u64,
) -> Result<Vec<f64>, MetricsError> {
    let n = neighbors.len();
    let mut bc = vec![0.0_f64; n];
    if n == 0 {
        return Ok(bc);
    }

    let k = pivots.min(n);
    let sources: Vec<usize> = if k < n {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        indices.truncate(k);
        indices
    } else {
        (0..n).collect()
    };

    let mut stack: Vec<usize> = Vec::with_capacity(n);
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0_f64; n];
    let mut dist = vec![-1_i64; n];
    let mut delta = vec![0.0_f64; n];
    let mut queue = VecDeque::new();

    for &s in &sources {
        stack.clear();
        preds.iter_mut().for_each(Vec::clear);
        sigma.iter_mut().for_each(|x| *x = 0.0);
        dist.iter_mut().for_each(|x| *x = -1);
        delta.iter_mut().for_each(|x| *x = 0.0);

        sigma[s] = 1.0;
        dist[s] = 0;
        queue.push_back(s);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &neighbors[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
            }
            if w != s {
                bc[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = n as f64 / (k as f64 * ((n - 1) * (n - 2)) as f64);
        bc.iter_mut().for_each(|b| *b *= scale);
    }

    if bc.iter().any(|b| !b.is_finite()) {
        return Err(MetricsError::NonFinite("betweenness"));
    }
    Ok(bc)
}

pub struct MetricsEngine {
    config: MetricsConfig,
}

impl MetricsEngine {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Computes all metrics and writes them onto every node.
    pub fn compute(&self, graph: &mut GraphStore) -> MetricsReport {
        let start = Instant::now();
        let n = graph.node_count();
        info!("Calculating graph metrics for {} nodes", n);

        let successors = graph.out_adjacency();
        let in_degrees: Vec<usize> = graph.in_adjacency().iter().map(Vec::len).collect();
        let out_degrees: Vec<usize> = successors.iter().map(Vec::len).collect();
        let degrees: Vec<usize> = in_degrees
            .iter()
            .zip(out_degrees.iter())
            .map(|(i, o)| i + o)
            .collect();
        let centrality = degree_centrality(&degrees);

        let mut report = MetricsReport {
            nodes: n,
            ..MetricsReport::default()
        };

        let pagerank = match pagerank(&successors, &self.config) {
            Ok(result) => {
                info!("  PageRank converged after {} iterations", result.iterations);
                report.pagerank_iterations = Some(result.iterations);
                result.scores
            }
            Err(e) => {
                warn!("  PageRank calculation failed: {}; using in-degree as fallback", e);
                report.pagerank_fallback = Some(e);
                pagerank_proxy(&in_degrees)
            }
        };

        report.betweenness_pivots = self.config.betweenness_pivots.min(n);
        let betweenness = match approximate_betweenness(
            &graph.undirected_adjacency(),
            self.config.betweenness_pivots,
            self.config.pivot_seed,
        ) {
            Ok(scores) => {
                info!(
                    "  Betweenness centrality estimated from {} pivots",
                    report.betweenness_pivots
                );
                scores
            }
            Err(e) => {
                warn!("  Betweenness calculation failed: {}; using zero", e);
                report.betweenness_fallback = Some(e);
                vec![0.0; n]
            }
        };

        for pos in 0..n {
            if let Some(record) = graph.record_at_mut(pos) {
                record.metrics = NodeMetrics {
                    degree_centrality: centrality[pos],
                    in_degree: in_degrees[pos],
                    out_degree: out_degrees[pos],
                    betweenness: betweenness[pos],
                    pagerank: pagerank[pos],
                };
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!("Metrics calculated in {} ms", report.duration_ms);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeRecord;

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> GraphStore {
        let mut store = GraphStore::new();
        for id in ids {
            store.insert_node(id, NodeRecord::default());
        }
        for (s, t) in edges {
            store.add_edge(s, t);
        }
        store
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_single_isolated_node() {
        let mut store = graph(&["A"], &[]);
        let report = MetricsEngine::new(MetricsConfig::default()).compute(&mut store);

        let m = &store.node("A").unwrap().metrics;
        assert!(close(m.pagerank, 1.0));
        assert_eq!(m.degree_centrality, 0.0);
        assert_eq!(m.betweenness, 0.0);
        assert!(report.pagerank_fallback.is_none());
    }

    #[test]
    fn test_pagerank_sums_to_one_with_dangling_nodes() {
        let store = graph(
            &["A", "B", "C", "D"],
            &[("A", "B"), ("A", "C"), ("B", "C"), ("C", "A")],
        );
        let result = pagerank(&store.out_adjacency(), &MetricsConfig::default()).unwrap();
        let total: f64 = result.scores.iter().sum();
        assert!(close(total, 1.0), "sum was {}", total);
        // D has no inbound links: it only receives teleport and dangling mass.
        assert!(result.scores[3] < result.scores[2]);
    }

    #[test]
    fn test_pagerank_symmetric_cycle_is_uniform() {
        let store = graph(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("C", "A")]);
        let result = pagerank(&store.out_adjacency(), &MetricsConfig::default()).unwrap();
        for s in &result.scores {
            assert!(close(*s, 1.0 / 3.0));
        }
    }

    #[test]
    fn test_pagerank_two_node_chain() {
        // B is dangling: solving the fixed point gives A = 1/2.85, B = 1.85/2.85.
        let store = graph(&["A", "B"], &[("A", "B")]);
        let result = pagerank(&store.out_adjacency(), &MetricsConfig::default()).unwrap();
        assert!(close(result.scores[0], 1.0 / 2.85));
        assert!(close(result.scores[1], 1.85 / 2.85));
    }

    #[test]
    fn test_pagerank_non_convergence_reported() {
        let store = graph(&["A", "B"], &[("A", "B")]);
        let config = MetricsConfig {
            max_iterations: 1,
            tolerance: 1e-12,
            ..MetricsConfig::default()
        };
        assert_eq!(
            pagerank(&store.out_adjacency(), &config),
            Err(MetricsError::NonConvergence { iterations: 1 })
        );
    }

    #[test]
    fn test_engine_falls_back_to_in_degree_proxy() {
        let mut store = graph(&["A", "B", "C"], &[("A", "B"), ("C", "B"), ("B", "A")]);
        let config = MetricsConfig {
            max_iterations: 1,
            tolerance: 1e-12,
            ..MetricsConfig::default()
        };
        let report = MetricsEngine::new(config).compute(&mut store);

        assert!(matches!(
            report.pagerank_fallback,
            Some(MetricsError::NonConvergence { .. })
        ));
        assert_eq!(store.node("B").unwrap().metrics.pagerank, 1.0);
        assert_eq!(store.node("A").unwrap().metrics.pagerank, 0.5);
        assert_eq!(store.node("C").unwrap().metrics.pagerank, 0.0);
        // Other metrics are still computed.
        assert_eq!(store.node("B").unwrap().metrics.in_degree, 2);
    }

    #[test]
    fn test_pagerank_proxy_without_edges() {
        assert_eq!(pagerank_proxy(&[0, 0, 0]), vec![0.0, 0.0, 0.0]);
        assert!(pagerank_proxy(&[]).is_empty());
    }

    #[test]
    fn test_degree_metrics() {
        let mut store = graph(&["A", "B", "C"], &[("A", "B"), ("A", "C"), ("C", "B")]);
        MetricsEngine::new(MetricsConfig::default()).compute(&mut store);

        let a = &store.node("A").unwrap().metrics;
        assert_eq!((a.in_degree, a.out_degree), (0, 2));
        assert!(close(a.degree_centrality, 1.0));
        let b = &store.node("B").unwrap().metrics;
        assert_eq!((b.in_degree, b.out_degree), (2, 0));
        let c = &store.node("C").unwrap().metrics;
        assert!(close(c.degree_centrality, 1.0));
    }

    #[test]
    fn test_degree_centrality_monotonic_in_degree() {
        let degrees = [0, 3, 1, 7, 3];
        let centrality = degree_centrality(&degrees);
        for i in 0..degrees.len() {
            for j in 0..degrees.len() {
                if degrees[i] < degrees[j] {
                    assert!(centrality[i] < centrality[j]);
                }
                if degrees[i] == degrees[j] {
                    assert_eq!(centrality[i], centrality[j]);
                }
            }
        }
    }

    #[test]
    fn test_betweenness_path_graph_exact() {
        // a - b - c, direction ignored
        let store = graph(&["a", "b", "c"], &[("a", "b"), ("c", "b")]);
        let bc = approximate_betweenness(&store.undirected_adjacency(), 100, 42).unwrap();
        assert!(close(bc[0], 0.0));
        assert!(close(bc[1], 1.0));
        assert!(close(bc[2], 0.0));
    }

    #[test]
    fn test_betweenness_sampled_star() {
        let mut ids: Vec<String> = vec!["hub".to_string()];
        ids.extend((0..150).map(|i| format!("leaf{}", i)));
        let mut store = GraphStore::new();
        for id in &ids {
            store.insert_node(id, NodeRecord::default());
        }
        for id in &ids[1..] {
            store.add_edge(id, "hub");
        }

        let adj = store.undirected_adjacency();
        let first = approximate_betweenness(&adj, 100, 7).unwrap();
        let second = approximate_betweenness(&adj, 100, 7).unwrap();
        assert_eq!(first, second);
        assert!((first[0] - 1.0).abs() < 0.01, "hub was {}", first[0]);
        assert!(first[1..].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_empty_graph() {
        let mut store = GraphStore::new();
        let report = MetricsEngine::new(MetricsConfig::default()).compute(&mut store);
        assert_eq!(report.nodes, 0);
        assert_eq!(report.pagerank_iterations, Some(0));
    }
}
