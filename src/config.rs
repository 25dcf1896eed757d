//! # Configuration Management Module
//!
//! Persistent application settings stored in platform-appropriate locations.
//! Handles loading, saving, and providing defaults for configuration options.
//!
//! ## Settings
//! - Acquisition backend base URL, poll interval, display window size
//! - Time-series sink (InfluxDB) connection and batching parameters
//! - ML-ingestion endpoint and API key
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/enose-telemetry/config.toml
//! - Linux: ~/.config/enose-telemetry/config.toml
//! - Windows: %APPDATA%\enose-telemetry\config.toml
//!
//! ## Why TOML
//! Human-readable format allows manual editing if needed. Serde provides
//! automatic serialization/deserialization.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Time-series sink connection settings.
///
/// Forwarding is disabled when `token` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub measurement: String,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "https://us-east-1-1.aws.cloud2.influxdata.com".to_string(),
            token: String::new(),
            org: String::new(),
            bucket: "enose".to_string(),
            measurement: "enose".to_string(),
            batch_size: 10_000,
            flush_interval_ms: 250,
        }
    }
}

/// ML-ingestion upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub url: String,
    pub api_key: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            url: "https://ingestion.edgeimpulse.com/api/training/files".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the acquisition backend
    pub backend_url: String,
    /// Poll tick interval; also the unit of the derived time axis
    pub poll_interval_ms: u64,
    /// Sliding window capacity per channel
    pub max_points_display: usize,
    /// Per-request timeout for backend calls
    pub request_timeout_ms: u64,
    pub influx: InfluxConfig,
    pub ingestion: IngestionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            poll_interval_ms: 250,
            max_points_display: 1500,
            request_timeout_ms: 2000,
            influx: InfluxConfig::default(),
            ingestion: IngestionConfig::default(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("enose-telemetry").join("config.toml")
    }

    /// Load config from file, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                let config = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, create default
                let config = Self::default();
                config.save()?; // Save default config
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(&path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Poll interval expressed in seconds, for time axis derivation
    pub fn poll_interval_secs(&self) -> f64 {
        self.poll_interval_ms as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend_url, "http://127.0.0.1:8000");
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.max_points_display, 1500);
        assert!((config.poll_interval_secs() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            backend_url: "http://10.0.0.2:9000".to_string(),
            ..Config::default()
        };

        let toml_str = toml::to_string(&config).expect("Failed to serialize");
        assert!(toml_str.contains("backend_url = \"http://10.0.0.2:9000\""));
        assert!(toml_str.contains("poll_interval_ms = 250"));
    }

    #[test]
    fn test_config_deserialization_with_partial_file() {
        // Fields omitted from the file fall back to defaults
        let toml_str = r#"
            backend_url = "http://192.168.1.5:8000"

            [influx]
            bucket = "lab42"
        "#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.backend_url, "http://192.168.1.5:8000");
        assert_eq!(config.influx.bucket, "lab42");
        assert_eq!(config.max_points_display, 1500);
        assert_eq!(config.influx.batch_size, 10_000);
    }

    #[test]
    fn test_default_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize");
        let back: Config = toml::from_str(&toml_str).expect("Failed to deserialize");
        assert_eq!(back.backend_url, config.backend_url);
        assert_eq!(back.influx.measurement, config.influx.measurement);
        assert_eq!(back.ingestion.url, config.ingestion.url);
    }
}
