//! Configuration schema for xbot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use xbot_archive::ScanPolicy;

/// Root config for the xbot gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct XbotConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl XbotConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> XbotConfigBuilder {
        XbotConfigBuilder::new()
    }

    /// Models tried, in order, for history summaries.
    ///
    /// Falls back to the default text model when no list is configured.
    pub fn summary_models(&self) -> Vec<String> {
        let models: Vec<String> = self
            .ai
            .summary_models
            .iter()
            .map(|model| model.trim())
            .filter(|model| !model.is_empty())
            .map(str::to_string)
            .collect();
        if models.is_empty() {
            vec![self.ai.text.model.clone()]
        } else {
            models
        }
    }
}

/// Builder for assembling an `XbotConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct XbotConfigBuilder {
    config: XbotConfig,
}

impl XbotConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: XbotConfig::default(),
        }
    }

    /// Replace the HTTP server settings.
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Replace the storage settings.
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Replace the generation settings.
    pub fn ai(mut self, ai: AiConfig) -> Self {
        self.config.ai = ai;
        self
    }

    /// Replace the history command settings.
    pub fn history(mut self, history: HistoryConfig) -> Self {
        self.config.history = history;
        self
    }

    /// Finalize and return the built `XbotConfig`.
    pub fn build(self) -> XbotConfig {
        self.config
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_server_address")]
    pub address: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Public base URL the platform delivers webhooks to.
    #[serde(default)]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            port: default_server_port(),
            host: String::new(),
        }
    }
}

fn default_server_address() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

/// Message archive and keyed store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// `mongodb`, `s3`, `auto` or empty (auto).
    #[serde(default)]
    pub message_storage: String,
    #[serde(default)]
    pub mongo: MongoConfig,
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub local: LocalStorageConfig,
    #[serde(default = "default_object_window_days")]
    pub object_window_days: u32,
    #[serde(default)]
    pub scan_policy: ScanPolicy,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Upper bound on a single archive call; 0 disables the bound.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            message_storage: String::new(),
            mongo: MongoConfig::default(),
            s3: S3Config::default(),
            local: LocalStorageConfig::default(),
            object_window_days: default_object_window_days(),
            scan_policy: ScanPolicy::default(),
            fetch_concurrency: default_fetch_concurrency(),
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}

impl StorageConfig {
    /// Archive call bound, if enabled.
    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_secs > 0).then(|| Duration::from_secs(self.operation_timeout_secs))
    }
}

fn default_object_window_days() -> u32 {
    7
}

fn default_fetch_concurrency() -> usize {
    8
}

fn default_operation_timeout_secs() -> u64 {
    10
}

/// MongoDB connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MongoConfig {
    #[serde(default)]
    pub uri: String,
    #[serde(default = "default_mongo_database")]
    pub database: String,
    #[serde(default = "default_server_selection_timeout_secs")]
    pub server_selection_timeout_secs: u64,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            database: default_mongo_database(),
            server_selection_timeout_secs: default_server_selection_timeout_secs(),
        }
    }
}

impl MongoConfig {
    /// Whether a connection string is configured.
    pub fn is_configured(&self) -> bool {
        !self.uri.trim().is_empty()
    }
}

fn default_mongo_database() -> String {
    "xbot".to_string()
}

fn default_server_selection_timeout_secs() -> u64 {
    5
}

/// S3-compatible object store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3Config {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    #[serde(default)]
    pub allow_http: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            region: default_s3_region(),
            allow_http: false,
        }
    }
}

impl S3Config {
    /// Whether an endpoint is configured.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

/// Local data directory used when no remote store is configured.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LocalStorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Text and image generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiConfig {
    #[serde(default)]
    pub text: TextModelConfig,
    /// Candidate models for summaries, tried in order.
    #[serde(default)]
    pub summary_models: Vec<String>,
    #[serde(default)]
    pub image: ImageModelConfig,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            text: TextModelConfig::default(),
            summary_models: Vec::new(),
            image: ImageModelConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AiConfig {
    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextModelConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_text_model")]
    pub model: String,
}

impl Default for TextModelConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: default_text_model(),
        }
    }
}

fn default_text_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Image generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageModelConfig {
    #[serde(default = "default_image_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
}

impl Default for ImageModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_image_endpoint(),
            api_key: String::new(),
            model: String::new(),
        }
    }
}

impl ImageModelConfig {
    /// Whether image generation can be offered.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

fn default_image_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

/// History command settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryConfig {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            leaderboard_limit: default_leaderboard_limit(),
        }
    }
}

fn default_max_records() -> usize {
    xbot_archive::DEFAULT_MAX_RECORDS
}

fn default_leaderboard_limit() -> usize {
    10
}
