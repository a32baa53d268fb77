use crate::depth::DepthPolicyKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Bundled configuration with the engineering seed topics and keyword set.
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkweaveConfig {
    pub seeds: Vec<String>,
    pub keywords: Vec<String>,
    pub crawl: CrawlConfig,
    pub fetcher: FetcherConfig,
    pub metrics: MetricsConfig,
    pub depth: DepthConfig,
    pub output: OutputConfig,
}

/// Bounds of one crawl run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub max_depth: u32,
    pub max_nodes: usize,
    /// How many leading references of a page are considered for expansion.
    pub reference_prefix: usize,
    /// How many relevant references are kept per page.
    pub max_kept_references: usize,
    /// How many leading references are checked for edges on the last tier.
    pub leaf_reference_prefix: usize,
    /// Nodes at or beyond this depth are stored without categories, sections
    /// and images.
    pub min_lean_depth: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_nodes: 1000,
            reference_prefix: 15,
            max_kept_references: 10,
            leaf_reference_prefix: 10,
            min_lean_depth: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub delay_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            endpoint: linkweave_fetch::wikipedia::DEFAULT_ENDPOINT.to_string(),
            user_agent: linkweave_fetch::wikipedia::DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub damping: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub betweenness_pivots: usize,
    pub pivot_seed: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-6,
            max_iterations: 200,
            betweenness_pivots: 100,
            pivot_seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    pub policy: DepthPolicyKind,
    pub orphan_depth: u32,
    pub max_display_depth: u32,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            policy: DepthPolicyKind::ForwardBfs,
            orphan_depth: 3,
            max_display_depth: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub json: PathBuf,
    pub snapshot: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: PathBuf::from("knowledge_graph.json"),
            snapshot: PathBuf::from("knowledge_graph.db"),
        }
    }
}

impl LinkweaveConfig {
    /// The bundled default configuration.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawl.max_nodes == 0 {
            return Err(ConfigError::Invalid("crawl.max_nodes must be at least 1".into()));
        }
        if !(self.metrics.damping > 0.0 && self.metrics.damping < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "metrics.damping must lie in (0, 1), got {}",
                self.metrics.damping
            )));
        }
        if self.metrics.tolerance.is_nan() || self.metrics.tolerance <= 0.0 {
            return Err(ConfigError::Invalid("metrics.tolerance must be positive".into()));
        }
        if self.metrics.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "metrics.max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_config_parses() {
        let config = LinkweaveConfig::bundled().unwrap();
        assert_eq!(config.seeds.len(), 27);
        assert_eq!(config.seeds[0], "Engineering");
        assert!(config.keywords.iter().any(|k| k == "machine learning"));
        assert_eq!(config.crawl, CrawlConfig::default());
        assert_eq!(config.metrics, MetricsConfig::default());
        assert_eq!(config.depth, DepthConfig::default());
        assert_eq!(config.fetcher, FetcherConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = LinkweaveConfig::from_toml_str(
            r#"
            seeds = ["Robotics"]
            keywords = ["robot"]

            [crawl]
            max_nodes = 5

            [depth]
            policy = "nearest-seed"
            "#,
        )
        .unwrap();

        assert_eq!(config.seeds, vec!["Robotics"]);
        assert_eq!(config.crawl.max_nodes, 5);
        assert_eq!(config.crawl.max_depth, 2);
        assert_eq!(config.depth.policy, DepthPolicyKind::NearestSeed);
        assert_eq!(config.depth.orphan_depth, 3);
        assert_eq!(config.output.json, PathBuf::from("knowledge_graph.json"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            LinkweaveConfig::from_toml_str("[crawl]\nmax_nodes = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            LinkweaveConfig::from_toml_str("[metrics]\ndamping = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            LinkweaveConfig::from_toml_str("[metrics]\nmax_iterations = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            LinkweaveConfig::from_toml_str("seeds = [unclosed"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = LinkweaveConfig::load(Path::new("/nonexistent/linkweave.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
