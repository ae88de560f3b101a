//! Configuration for Startline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Flow engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database path
    pub path: Option<PathBuf>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

/// Flow engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the external flow execution engine
    #[serde(default = "default_engine_url")]
    pub url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_engine_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            timeout_ms: default_engine_timeout_ms(),
        }
    }
}

fn default_engine_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_engine_timeout_ms() -> u64 {
    5000
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/startline/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
path = "/data/startline.db"
max_connections = 8

[engine]
url = "http://engine.internal:8090"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.engine.url, "http://engine.internal:8090");
        assert_eq!(config.engine.timeout_ms, 5000);
        assert_eq!(config.logging.level, "info");
    }
}
