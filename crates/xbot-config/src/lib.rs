//! Configuration models and layered config loading.
//!
//! This crate owns the xbot config schema, validation, layer merging and
//! environment overrides used by the gateway binary.

mod env;
mod error;
mod loader;
mod model;

/// Environment variable names recognized by the override pass.
pub use env::{
    ENV_IMAGE_API_KEY, ENV_MESSAGE_STORAGE, ENV_MONGO_URI, ENV_OPENAI_API_KEY, ENV_PORT,
    ENV_S3_ACCESS_KEY, ENV_S3_SECRET_KEY,
};
/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
/// Configuration schema models.
pub use model::*;
