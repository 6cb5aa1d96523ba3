//! SocialConnect Configuration System
//!
//! TOML-based configuration with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::{ConfigLoader, CONFIG_ENV};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mongodb: MongoConfig,
    pub connections: ConnectionsConfig,
}

/// MongoDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    /// Server selection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "socialconnect".to_string(),
            connect_timeout_ms: 5000,
        }
    }
}

/// Connection store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionsConfig {
    /// Collection holding one document per user connection
    pub collection: String,
    /// Create the required indexes when the store starts
    pub ensure_indexes: bool,
    /// Registered provider ids, in display order
    pub providers: Vec<String>,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            collection: "userConnections".to_string(),
            ensure_indexes: true,
            providers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the standard locations with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Reject configurations the store cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mongodb.uri.trim().is_empty() {
            return Err(ConfigError::ValidationError("mongodb.uri must not be empty".to_string()));
        }
        if self.mongodb.database.trim().is_empty() {
            return Err(ConfigError::ValidationError("mongodb.database must not be empty".to_string()));
        }
        if self.connections.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError("connections.collection must not be empty".to_string()));
        }
        if let Some(blank) = self.connections.providers.iter().find(|p| p.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "connections.providers contains a blank provider id: {:?}",
                blank
            )));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# SocialConnect Configuration
# Environment variables (SOCIALCONNECT_*) override these settings

[mongodb]
uri = "mongodb://localhost:27017"
database = "socialconnect"
connect_timeout_ms = 5000

[connections]
collection = "userConnections"
ensure_indexes = true
providers = ["facebook", "twitter"]
"#
        .to_string()
    }
}
