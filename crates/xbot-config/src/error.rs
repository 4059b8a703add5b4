//! Error types for config loading and validation.

use thiserror::Error;

/// Errors returned while loading, overriding or validating config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A config file is not valid JSON5.
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The merged document does not match the config model.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A field in a layer is malformed or unknown.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// An environment override could not be applied.
    #[error("invalid environment override {name}: {message}")]
    InvalidEnv { name: String, message: String },
    /// Cross-field validation failed on the effective config.
    #[error("invalid config: {0}")]
    Invalid(String),
}
