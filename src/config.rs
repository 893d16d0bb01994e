//! Configuration for the messaging client and local state store
//!
//! Loaded from a TOML file. Every section and field has a default, so an
//! empty file (or no file at all) yields a configuration that targets a
//! local emulator on `localhost:8681`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub pull: PullSection,
    #[serde(default)]
    pub storage: StorageSection,
}

/// Broker endpoint section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker endpoint as `host:port` (an `http://` or `https://` prefix is accepted)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Deadline for a single broker round trip in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl BrokerSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Pull loop section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullSection {
    /// Maximum messages requested per pull round trip
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Retry budget for transient failures of one pull request, in seconds
    #[serde(default = "default_retry_deadline")]
    pub retry_deadline_secs: u64,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for PullSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            retry_deadline_secs: default_retry_deadline(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Local state store section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSection {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_endpoint() -> String {
    "localhost:8681".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_batch_size() -> u32 {
    100
}

fn default_retry_deadline() -> u64 {
    10
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".storage.json")
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid broker endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConsoleConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ConsoleConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and the endpoint format
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::transport::rest::connection::base_url(&self.broker.endpoint)?;

        if self.broker.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.pull.batch_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "pull.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.pull.retry_deadline_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "pull.retry_deadline_secs must be greater than zero".to_string(),
            ));
        }
        if self.pull.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidConfig(format!(
                "pull.backoff_multiplier must be at least 1.0, got {}",
                self.pull.backoff_multiplier
            )));
        }
        if self.pull.initial_backoff_ms > self.pull.max_backoff_ms {
            return Err(ConfigError::InvalidConfig(format!(
                "pull.initial_backoff_ms ({}) exceeds pull.max_backoff_ms ({})",
                self.pull.initial_backoff_ms, self.pull.max_backoff_ms
            )));
        }

        Ok(())
    }

    /// Replace the configured endpoint, validating the new value
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Result<Self, ConfigError> {
        let endpoint = endpoint.into();
        crate::transport::rest::connection::base_url(&endpoint)?;
        self.broker.endpoint = endpoint;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[broker]
endpoint = "pubsub-emulator:8085"
request_timeout_secs = 5

[pull]
batch_size = 50
retry_deadline_secs = 1
initial_backoff_ms = 10
max_backoff_ms = 200
backoff_multiplier = 1.5

[storage]
path = "/tmp/console-state.json"
"#;

        let config: ConsoleConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.broker.endpoint, "pubsub-emulator:8085");
        assert_eq!(config.broker.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.pull.batch_size, 50);
        assert_eq!(config.pull.retry_deadline_secs, 1);
        assert_eq!(config.pull.backoff_multiplier, 1.5);
        assert_eq!(
            config.storage.path,
            PathBuf::from("/tmp/console-state.json")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ConsoleConfig = toml::from_str("").unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.broker.endpoint, "localhost:8681");
        assert_eq!(config.pull.batch_size, 100);
        assert_eq!(config.storage.path, PathBuf::from(".storage.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: ConsoleConfig = toml::from_str("[pull]\nbatch_size = 7\n").unwrap();
        assert_eq!(config.pull.batch_size, 7);
        assert_eq!(config.pull.retry_deadline_secs, 10);
        assert_eq!(config.broker, BrokerSection::default());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = ConsoleConfig::default();
        config.pull.batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_backoff_bounds_rejected() {
        let mut config = ConsoleConfig::default();
        config.pull.initial_backoff_ms = 5000;
        assert!(config.validate().is_err());

        let mut config = ConsoleConfig::default();
        config.pull.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_without_port_rejected() {
        let mut config = ConsoleConfig::default();
        config.broker.endpoint = "localhost".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_with_endpoint_override() {
        let config = ConsoleConfig::default()
            .with_endpoint("127.0.0.1:9090")
            .unwrap();
        assert_eq!(config.broker.endpoint, "127.0.0.1:9090");

        assert!(ConsoleConfig::default().with_endpoint("not a host").is_err());
    }
}
