//! Error types for rule checking, reporting and the exporter.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for promcheck
#[derive(Error, Debug)]
pub enum Error {
    /// PromQL expression could not be parsed
    #[error("promql parse error: {0}")]
    Parse(String),

    /// Backend query failed (network, HTTP status or API error)
    #[error("failed to query metrics: {0}")]
    Probe(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A report was dumped without any recorded section
    #[error("nothing to report")]
    EmptyReport,

    /// Rule file could not be read or parsed
    #[error("failed to load rule file {}: {message}", .path.display())]
    RuleFile { path: PathBuf, message: String },

    /// Live rule listing failed
    #[error("failed to receive rules from prometheus instance: {0}")]
    RuleSource(String),

    /// Metric creation or registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Report rendering failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Exporter HTTP server failure
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
