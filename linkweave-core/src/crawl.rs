use crate::config::CrawlConfig;
use crate::graph::{GraphStore, NodeRecord};
use crate::relevance::{RelevanceFilter, is_structural_reference};
use linkweave_fetch::page::truncate_chars;
use linkweave_fetch::{FetchErrorKind, PageFetcher};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-topic failure messages are cut to this many characters in logs.
const FAILURE_MESSAGE_CHARS: usize = 100;

/// Progress events emitted while the frontier is drained.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlProgress {
    Processing {
        topic: String,
        depth: u32,
        nodes: usize,
        queued: usize,
    },
    Skipped {
        topic: String,
        kind: FetchErrorKind,
    },
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(CrawlProgress) + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub fetched: usize,
    pub failed: usize,
    /// Queue entries dropped because the topic was already visited.
    pub discarded: usize,
    pub edges_added: usize,
    /// Entries still queued when the node cap stopped the run.
    pub abandoned: usize,
}

pub struct CrawlOutcome {
    pub graph: GraphStore,
    pub stats: CrawlStats,
}

/// Bounded breadth-first crawler. Drains a FIFO frontier of (topic, depth)
/// pairs one fetch at a time and grows a fresh [`GraphStore`].
///
/// An edge `topic -> reference` is only added when `reference` is already a
/// node at the moment `topic` is processed; forward references to topics that
/// are still queued are not materialized.
pub struct FrontierScheduler<F> {
    fetcher: F,
    filter: RelevanceFilter,
    config: CrawlConfig,
    progress_callback: Option<CrawlProgressCallback>,
}

impl<F: PageFetcher> FrontierScheduler<F> {
    pub fn new(fetcher: F, filter: RelevanceFilter, config: CrawlConfig) -> Self {
        Self {
            fetcher,
            filter,
            config,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: CrawlProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    fn report(&self, event: CrawlProgress) {
        if let Some(ref callback) = self.progress_callback {
            callback(event);
        }
    }

    pub async fn crawl<S: AsRef<str>>(&self, seeds: &[S]) -> CrawlOutcome {
        let max_depth = self.config.max_depth;
        let max_nodes = self.config.max_nodes;
        info!(
            "Starting crawl with {} seed topics (max depth {}, max nodes {})",
            seeds.len(),
            max_depth,
            max_nodes
        );

        let mut graph = GraphStore::new();
        let mut stats = CrawlStats::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, u32)> = seeds
            .iter()
            .map(|s| (s.as_ref().to_string(), 0))
            .collect();

        while graph.node_count() < max_nodes {
            let Some((topic, depth)) = queue.pop_front() else {
                break;
            };

            if visited.contains(&topic) || depth > max_depth {
                stats.discarded += 1;
                continue;
            }
            // Marked before fetching so a failing topic is never requested twice.
            visited.insert(topic.clone());

            debug!(
                "Processing: {} (depth {}, nodes: {})",
                topic,
                depth,
                graph.node_count()
            );
            self.report(CrawlProgress::Processing {
                topic: topic.clone(),
                depth,
                nodes: graph.node_count(),
                queued: queue.len(),
            });

            let page = match self.fetcher.fetch(&topic).await {
                Ok(page) => page,
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        "Skipping {}: {}",
                        topic,
                        truncate_chars(&e.to_string(), FAILURE_MESSAGE_CHARS)
                    );
                    self.report(CrawlProgress::Skipped {
                        topic,
                        kind: e.kind(),
                    });
                    continue;
                }
            };
            stats.fetched += 1;

            let rich = depth < self.config.min_lean_depth;
            graph.insert_node(&topic, NodeRecord::from_page(&page, depth, rich));

            if depth < max_depth {
                if graph.node_count() >= max_nodes {
                    continue;
                }
                for reference in self.select_references(&page.links) {
                    if !visited.contains(&reference) {
                        queue.push_back((reference.clone(), depth + 1));
                    }
                    if graph.contains(&reference) && graph.add_edge(&topic, &reference) {
                        stats.edges_added += 1;
                    }
                }
            } else {
                for reference in page.links.iter().take(self.config.leaf_reference_prefix) {
                    if graph.add_edge(&topic, reference) {
                        stats.edges_added += 1;
                    }
                }
            }
        }

        if graph.node_count() >= max_nodes && !queue.is_empty() {
            stats.abandoned = queue.len();
            info!(
                "Node cap of {} reached, abandoning {} queued topics",
                max_nodes,
                queue.len()
            );
        }

        info!(
            "Crawl complete: {} nodes, {} edges ({} fetched, {} failed)",
            graph.node_count(),
            graph.edge_count(),
            stats.fetched,
            stats.failed
        );

        CrawlOutcome { graph, stats }
    }

    /// Leading references that are content pages and pass the relevance
    /// filter, capped at `max_kept_references`.
    fn select_references(&self, links: &[String]) -> Vec<String> {
        links
            .iter()
            .take(self.config.reference_prefix)
            .filter(|link| {
                if is_structural_reference(link) {
                    debug!("  -> {} is a navigation page, skipping", link);
                    return false;
                }
                self.filter.is_relevant(link, None)
            })
            .take(self.config.max_kept_references)
            .cloned()
            .collect()
    }
}
