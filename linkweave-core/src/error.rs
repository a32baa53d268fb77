use std::path::PathBuf;
use thiserror::Error;

/// A metric computation that could not produce a trustworthy result. Callers
/// degrade to a fallback score instead of aborting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("power iteration did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("{0} produced a non-finite value")]
    NonFinite(&'static str),
}

/// Failure writing or reading a persisted artifact. Fatal for the stage.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to move artifact into place: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Snapshot is malformed: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
