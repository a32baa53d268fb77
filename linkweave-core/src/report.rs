// Stage summaries rendered from an in-memory graph

use crate::depth::depth_distribution;
use crate::graph::{GraphStore, NodeRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    InDegree,
    PageRank,
    Betweenness,
}

impl RankMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankMetric::InDegree => "in-degree",
            RankMetric::PageRank => "PageRank",
            RankMetric::Betweenness => "betweenness",
        }
    }

    fn value(&self, record: &NodeRecord) -> f64 {
        match self {
            RankMetric::InDegree => record.metrics.in_degree as f64,
            RankMetric::PageRank => record.metrics.pagerank,
            RankMetric::Betweenness => record.metrics.betweenness,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNode {
    pub id: String,
    pub value: f64,
}

/// The `n` highest-scoring nodes for `metric`. Ties keep insertion order.
pub fn top_by(graph: &GraphStore, metric: RankMetric, n: usize) -> Vec<RankedNode> {
    let mut ranked: Vec<RankedNode> = graph
        .nodes()
        .map(|(id, record)| RankedNode {
            id: id.to_string(),
            value: metric.value(record),
        })
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked.truncate(n);
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub metric: RankMetric,
    pub entries: Vec<RankedNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub depth_distribution: BTreeMap<u32, usize>,
    /// Node count per in-degree, taken from live adjacency rather than the
    /// stored metric so it is valid before a metrics pass.
    pub in_degree_distribution: BTreeMap<usize, usize>,
    pub isolated: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub leaderboards: Vec<Leaderboard>,
}

impl GraphSummary {
    pub fn from_graph(graph: &GraphStore) -> Self {
        let mut in_degree_distribution = BTreeMap::new();
        let mut isolated = 0;

        for (id, _) in graph.nodes() {
            let in_degree = graph.in_degree(id).unwrap_or(0);
            *in_degree_distribution.entry(in_degree).or_insert(0) += 1;
            if graph.degree(id) == Some(0) {
                isolated += 1;
            }
        }

        Self {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            depth_distribution: depth_distribution(graph),
            in_degree_distribution,
            isolated,
            leaderboards: Vec::new(),
        }
    }

    pub fn with_leaderboards(mut self, graph: &GraphStore, metrics: &[RankMetric], n: usize) -> Self {
        self.leaderboards = metrics
            .iter()
            .map(|&metric| Leaderboard {
                metric,
                entries: top_by(graph, metric, n),
            })
            .collect();
        self
    }
}

pub fn generate_text_summary(title: &str, summary: &GraphSummary) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str(&format!("{}\n", title.to_uppercase()));
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Nodes:        {}\n", summary.nodes));
    report.push_str(&format!("Edges:        {}\n", summary.edges));
    report.push_str(&format!("Isolated:     {}\n", summary.isolated));
    report.push('\n');

    report.push_str("Depth distribution:\n");
    for (depth, count) in &summary.depth_distribution {
        report.push_str(&format!("  Depth {}: {} nodes\n", depth, count));
    }
    report.push('\n');

    report.push_str("In-degree distribution:\n");
    for (degree, count) in &summary.in_degree_distribution {
        report.push_str(&format!("  {:>4} in-links: {} nodes\n", degree, count));
    }

    for board in &summary.leaderboards {
        report.push('\n');
        report.push_str(&format!("Top {} by {}:\n", board.entries.len(), board.metric.as_str()));
        for (idx, entry) in board.entries.iter().enumerate() {
            let value = match board.metric {
                RankMetric::InDegree => format!("{}", entry.value as usize),
                _ => format!("{:.4}", entry.value),
            };
            report.push_str(&format!("  {:>2}. {}: {}\n", idx + 1, entry.id, value));
        }
    }

    report.push('\n');
    report
}

pub fn generate_json_summary(summary: &GraphSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}
