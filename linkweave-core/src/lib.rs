pub mod config;
pub mod crawl;
pub mod depth;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod persist;
pub mod relevance;
pub mod report;

pub use config::LinkweaveConfig;
pub use crawl::{CrawlOutcome, CrawlProgress, CrawlStats, FrontierScheduler};
pub use depth::{DepthPolicy, DepthPolicyKind, DepthReconciler, ForwardBfs, NearestSeed};
pub use error::{ConfigError, MetricsError, PersistenceError};
pub use graph::{GraphStore, NodeMetrics, NodeRecord};
pub use metrics::{MetricsEngine, MetricsReport};
pub use relevance::RelevanceFilter;
pub use report::{GraphSummary, RankMetric};
