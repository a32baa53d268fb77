//! Directed topic graph: typed node records keyed by topic identifier, plus
//! unweighted, de-duplicated edges.
//!
//! Node positions are stable for the lifetime of a store because nodes are
//! never removed; analytics passes use them as dense indices.

use linkweave_fetch::PageMetadata;
use linkweave_fetch::page::truncate_chars;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SHORT_SUMMARY_CHARS: usize = 300;
pub const CONTENT_PREVIEW_CHARS: usize = 500;

/// Computed link-structure metrics. All zero until a metrics pass runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub degree_centrality: f64,
    pub in_degree: usize,
    pub out_degree: usize,
    pub betweenness: f64,
    pub pagerank: f64,
}

/// Attribute record of one topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub depth: u32,
    pub summary: String,
    pub short_summary: String,
    pub url: String,
    pub content_preview: String,
    pub categories: Vec<String>,
    pub sections: Vec<String>,
    pub images: Vec<String>,
    pub references: Vec<String>,
    pub content_length: usize,
    pub word_count: usize,
    pub metrics: NodeMetrics,
}

impl NodeRecord {
    /// Builds the record for a freshly fetched page. When `rich` is false the
    /// categories, sections and images are left empty.
    pub fn from_page(page: &PageMetadata, depth: u32, rich: bool) -> Self {
        let (categories, sections, images) = if rich {
            (
                page.categories.clone(),
                page.sections.clone(),
                page.images.clone(),
            )
        } else {
            (Vec::new(), Vec::new(), Vec::new())
        };

        Self {
            depth,
            summary: page.summary.clone(),
            short_summary: format!("{}...", truncate_chars(&page.summary, SHORT_SUMMARY_CHARS)),
            url: page.url.clone(),
            content_preview: truncate_chars(&page.content, CONTENT_PREVIEW_CHARS),
            categories,
            sections,
            images,
            references: page.references.iter().take(5).cloned().collect(),
            content_length: page.content_length,
            word_count: page.word_count,
            metrics: NodeMetrics::default(),
        }
    }

    pub fn at_depth(depth: u32) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
struct TopicNode {
    id: String,
    record: NodeRecord,
}

/// Owned directed graph with an identifier index.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    graph: DiGraph<TopicNode, ()>,
    index: HashMap<String, NodeIndex>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, or replaces the whole record of an existing one.
    /// Returns true when the identifier was new.
    pub fn insert_node(&mut self, id: &str, record: NodeRecord) -> bool {
        if let Some(&idx) = self.index.get(id) {
            self.graph[idx].record = record;
            return false;
        }
        let idx = self.graph.add_node(TopicNode {
            id: id.to_string(),
            record,
        });
        self.index.insert(id.to_string(), idx);
        true
    }

    /// Adds `source -> target` when both endpoints exist and the edge is not
    /// already present. Never creates nodes. Returns true when an edge was added.
    pub fn add_edge(&mut self, source: &str, target: &str) -> bool {
        let (Some(&s), Some(&t)) = (self.index.get(source), self.index.get(target)) else {
            return false;
        };
        if self.graph.contains_edge(s, t) {
            return false;
        }
        self.graph.add_edge(s, t, ());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(&s), Some(&t)) => self.graph.contains_edge(s, t),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node(&self, id: &str) -> Option<&NodeRecord> {
        self.index.get(id).map(|&idx| &self.graph[idx].record)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeRecord> {
        let idx = *self.index.get(id)?;
        Some(&mut self.graph[idx].record)
    }

    pub fn in_degree(&self, id: &str) -> Option<usize> {
        let idx = *self.index.get(id)?;
        Some(self.graph.edges_directed(idx, Direction::Incoming).count())
    }

    pub fn out_degree(&self, id: &str) -> Option<usize> {
        let idx = *self.index.get(id)?;
        Some(self.graph.edges_directed(idx, Direction::Outgoing).count())
    }

    /// In-degree plus out-degree; a self-reference counts twice.
    pub fn degree(&self, id: &str) -> Option<usize> {
        Some(self.in_degree(id)? + self.out_degree(id)?)
    }

    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Outgoing)
    }

    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: &str, dir: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<(usize, &str)> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| (n.index(), self.graph[n].id.as_str()))
            .collect();
        // petgraph walks newest-first; report in insertion order instead.
        out.sort_by_key(|(pos, _)| *pos);
        out.into_iter().map(|(_, id)| id).collect()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &NodeRecord)> {
        self.graph
            .node_indices()
            .map(move |idx| (self.graph[idx].id.as_str(), &self.graph[idx].record))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.graph
            .node_indices()
            .map(move |idx| self.graph[idx].id.as_str())
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].id.as_str(),
                self.graph[e.target()].id.as_str(),
            )
        })
    }

    /// Dense position of a node, equal to its insertion order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).map(|idx| idx.index())
    }

    pub fn id_at(&self, position: usize) -> Option<&str> {
        self.graph
            .node_weight(NodeIndex::new(position))
            .map(|n| n.id.as_str())
    }

    pub fn record_at_mut(&mut self, position: usize) -> Option<&mut NodeRecord> {
        self.graph
            .node_weight_mut(NodeIndex::new(position))
            .map(|n| &mut n.record)
    }

    /// Successor positions for every node, each list sorted and de-duplicated.
    pub fn out_adjacency(&self) -> Vec<Vec<usize>> {
        self.adjacency(Direction::Outgoing)
    }

    /// Predecessor positions for every node, each list sorted and de-duplicated.
    pub fn in_adjacency(&self) -> Vec<Vec<usize>> {
        self.adjacency(Direction::Incoming)
    }

    fn adjacency(&self, dir: Direction) -> Vec<Vec<usize>> {
        self.graph
            .node_indices()
            .map(|idx| {
                let mut list: Vec<usize> = self
                    .graph
                    .neighbors_directed(idx, dir)
                    .map(|n| n.index())
                    .collect();
                list.sort_unstable();
                list.dedup();
                list
            })
            .collect()
    }

    /// Neighbor positions ignoring direction, without self-references.
    pub fn undirected_adjacency(&self) -> Vec<Vec<usize>> {
        self.graph
            .node_indices()
            .map(|idx| {
                let mut list: Vec<usize> = self
                    .graph
                    .neighbors_undirected(idx)
                    .map(|n| n.index())
                    .filter(|&n| n != idx.index())
                    .collect();
                list.sort_unstable();
                list.dedup();
                list
            })
            .collect()
    }
}
