//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `CHRONOS_*` environment variable overrides.

use crate::indexer::{FlushPolicy, DEFAULT_FLUSH_THRESHOLD};
use crate::query::DEFAULT_SCAN_CONCURRENCY;
use crate::storage::{
    BackendConfig, RemoteConfig, SegmentCompression, SegmentKeyGenerator, StorageResult,
    DEFAULT_SEGMENT_PREFIX,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how segments are written
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub compression: SegmentCompression,

    #[serde(default = "default_segment_prefix")]
    pub segment_prefix: String,

    /// Appended to segment keys so several writers can share one store
    #[serde(default)]
    pub instance_id: Option<String>,
}

fn default_segment_prefix() -> String {
    DEFAULT_SEGMENT_PREFIX.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            compression: SegmentCompression::default(),
            segment_prefix: default_segment_prefix(),
            instance_id: None,
        }
    }
}

impl StorageConfig {
    /// Key generator for this writer
    pub fn key_generator(&self) -> StorageResult<SegmentKeyGenerator> {
        SegmentKeyGenerator::new(
            self.segment_prefix.clone(),
            self.instance_id.clone(),
            self.compression,
        )
    }
}

/// Indexing loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    #[serde(default = "default_true")]
    pub flush_on_shutdown: bool,

    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_flush_threshold() -> usize {
    DEFAULT_FLUSH_THRESHOLD
}

fn default_true() -> bool {
    true
}

fn default_bus_capacity() -> usize {
    1024
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            flush_threshold: default_flush_threshold(),
            flush_on_shutdown: default_true(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl IndexerConfig {
    pub fn policy(&self) -> StorageResult<FlushPolicy> {
        FlushPolicy::new(self.flush_threshold)
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Segments fetched and decoded at once per search
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,

    /// Maximum ingest body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_scan_concurrency() -> usize {
    DEFAULT_SCAN_CONCURRENCY
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1 MB
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            scan_concurrency: default_scan_concurrency(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Standard config file locations, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("chronos").join("config.toml")),
            Some(PathBuf::from("/etc/chronos/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load the first of `paths` that exists, or defaults plus environment
    /// overrides when none does. Returns the file that was used.
    ///
    /// A file that exists but cannot be read or parsed is an error, never a
    /// silent fallback to defaults.
    pub fn load_first(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match paths.iter().find(|path| path.exists()) {
            Some(path) => {
                let config = Self::load_with_env(path)?;
                tracing::info!("Loaded config from {:?}", path);
                Ok((config, Some(path.clone())))
            }
            None => {
                tracing::info!("Using default config with environment overrides");
                Ok((Self::from_env(), None))
            }
        }
    }

    /// Load from default locations or environment
    pub fn load_default() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_first(&Self::default_paths())
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any `CHRONOS_*` lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(data_dir) = lookup("CHRONOS_DATA_DIR") {
            self.storage.backend = BackendConfig::local(data_dir);
        }
        if let Some(endpoint) = lookup("CHRONOS_REMOTE_ENDPOINT") {
            let bucket = match &self.storage.backend {
                BackendConfig::Remote(remote) => remote.bucket.clone(),
                BackendConfig::Local { .. } => RemoteConfig::default_bucket(),
            };
            self.storage.backend = BackendConfig::Remote(RemoteConfig::new(endpoint, bucket));
        }
        if let BackendConfig::Remote(remote) = &mut self.storage.backend {
            if let Some(bucket) = lookup("CHRONOS_BUCKET") {
                remote.bucket = bucket;
            }
            if let Some(token) = lookup("CHRONOS_BEARER_TOKEN") {
                remote.bearer_token = Some(token);
            }
        }
        if let Some(compression) = lookup("CHRONOS_COMPRESSION") {
            match compression.to_ascii_lowercase().as_str() {
                "gzip" => self.storage.compression = SegmentCompression::Gzip,
                "lz4" => self.storage.compression = SegmentCompression::Lz4,
                other => tracing::warn!("Ignoring unknown CHRONOS_COMPRESSION value {:?}", other),
            }
        }
        if let Some(instance_id) = lookup("CHRONOS_INSTANCE_ID") {
            self.storage.instance_id = Some(instance_id).filter(|id| !id.is_empty());
        }

        // Indexer overrides
        if let Some(threshold) = lookup("CHRONOS_FLUSH_THRESHOLD") {
            if let Ok(t) = threshold.parse() {
                self.indexer.flush_threshold = t;
            }
        }

        // API overrides
        if let Some(host) = lookup("CHRONOS_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("CHRONOS_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }
        if let Some(concurrency) = lookup("CHRONOS_SCAN_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.api.scan_concurrency = c;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("CHRONOS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("CHRONOS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indexer.flush_threshold == 0 {
            return Err(ConfigError::Invalid(
                "indexer.flush_threshold must be greater than zero".into(),
            ));
        }
        if self.indexer.bus_capacity == 0 {
            return Err(ConfigError::Invalid(
                "indexer.bus_capacity must be greater than zero".into(),
            ));
        }
        if self.api.scan_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "api.scan_concurrency must be greater than zero".into(),
            ));
        }
        if let BackendConfig::Remote(remote) = &self.storage.backend {
            if remote.endpoint.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage.backend.endpoint must not be empty".into(),
                ));
            }
            if remote.bucket.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage.backend.bucket must not be empty".into(),
                ));
            }
        }
        self.storage
            .key_generator()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Chronos Configuration
#
# Environment variables override these settings:
# - CHRONOS_DATA_DIR          (switches to the local backend)
# - CHRONOS_REMOTE_ENDPOINT   (switches to the remote backend)
# - CHRONOS_BUCKET
# - CHRONOS_BEARER_TOKEN
# - CHRONOS_COMPRESSION
# - CHRONOS_INSTANCE_ID
# - CHRONOS_FLUSH_THRESHOLD
# - CHRONOS_API_HOST
# - CHRONOS_API_PORT
# - CHRONOS_SCAN_CONCURRENCY
# - CHRONOS_LOG_LEVEL
# - CHRONOS_LOG_FORMAT

[storage]
# Segment compression: gzip (.json.gz) or lz4 (.json.lz4)
compression = "gzip"

# Segment keys look like <prefix>_<nanos>[-<instance_id>].<suffix>
segment_prefix = "segment"

# Set a distinct value per writer when several indexers share one store
# instance_id = "indexer-1"

[storage.backend]
# Local directory
type = "local"
data_dir = "data"

# Or an object store reachable over HTTP
# type = "remote"
# endpoint = "http://localhost:9000"
# bucket = "chronos-segments"
# bearer_token = ""
# request_timeout_ms = 30000

[indexer]
# Rows buffered before a segment is written
flush_threshold = 100

# Write buffered rows when the service stops
flush_on_shutdown = true

# In-process bus queue size
bus_capacity = 1024

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8082

# Segments fetched and decoded in parallel per search
scan_concurrency = 4

# Maximum ingest request body (bytes)
max_body_size = 1048576

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
