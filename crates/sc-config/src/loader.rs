//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "socialconnect.toml",
    "config.toml",
    "./config/socialconnect.toml",
    "/etc/socialconnect/config.toml",
];

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "SOCIALCONNECT_CONFIG";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) but reads overrides through `lookup`
    /// instead of the process environment.
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.find_config_file(&lookup)? {
            Some(path) => {
                info!(?path, "Loading configuration from file");
                AppConfig::from_file(&path)?
            }
            None => AppConfig::default(),
        };

        apply_overrides(&mut config, &lookup);
        config.validate()?;

        Ok(config)
    }

    /// A file named explicitly (by path or `SOCIALCONNECT_CONFIG`) must
    /// exist; only the standard search paths are optional.
    fn find_config_file<F>(&self, lookup: &F) -> Result<Option<PathBuf>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let named = self
            .config_path
            .clone()
            .or_else(|| lookup(CONFIG_ENV).map(PathBuf::from));

        if let Some(path) = named {
            if !path.exists() {
                return Err(ConfigError::NotFound(path));
            }
            return Ok(Some(path));
        }

        Ok(CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists()))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_overrides<F>(config: &mut AppConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    // MongoDB
    if let Some(val) = lookup("SOCIALCONNECT_MONGODB_URI") {
        config.mongodb.uri = val;
    }
    if let Some(val) = lookup("SOCIALCONNECT_MONGODB_DATABASE") {
        config.mongodb.database = val;
    }
    if let Some(val) = lookup("SOCIALCONNECT_MONGODB_CONNECT_TIMEOUT_MS") {
        match val.parse() {
            Ok(ms) => config.mongodb.connect_timeout_ms = ms,
            Err(_) => warn!(value = %val, "Ignoring invalid SOCIALCONNECT_MONGODB_CONNECT_TIMEOUT_MS"),
        }
    }

    // Connections
    if let Some(val) = lookup("SOCIALCONNECT_COLLECTION") {
        config.connections.collection = val;
    }
    if let Some(val) = lookup("SOCIALCONNECT_ENSURE_INDEXES") {
        match val.parse() {
            Ok(flag) => config.connections.ensure_indexes = flag,
            Err(_) => warn!(value = %val, "Ignoring invalid SOCIALCONNECT_ENSURE_INDEXES"),
        }
    }
    if let Some(val) = lookup("SOCIALCONNECT_PROVIDERS") {
        config.connections.providers = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
