//! Error types for Usage Pulse

use thiserror::Error;

/// Errors that can occur at the engine's boundaries.
///
/// The aggregators themselves never fail on bad data; these errors come from
/// parsing sources, loading configuration, validating run parameters and
/// writing result tables.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse source data: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Failed to render configuration: {0}")]
    ConfigRenderError(#[from] toml::ser::Error),

    #[error("Invalid run parameters: {0}")]
    InvalidRunParams(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),
}
