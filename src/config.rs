//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - SourceConfig: Where readings come from and how often to poll.
//!     - ServerConfig: Dashboard bind address.
//!     - AggregationConfig: Which clock decides the calendar day of a reading.
//!     - LoggingConfig: Log level and whether every reading is logged.
//!
//! ==============================================================================

use crate::domain::DayBoundary;

use serde::Deserialize;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// realtime database root, e.g. https://my-project.firebaseio.com
    pub url: String,
    /// node the sensor pushes its records under
    pub path: String,
    /// database secret or id token, appended as `auth=`
    pub auth: Option<String>,
    /// number of most recent records replayed into the history feed
    pub history_window: u32,
    pub poll_interval_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            path: "greenhouse/data_v2".to_string(),
            auth: None,
            history_window: 300,
            poll_interval_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AggregationConfig {
    pub day_boundary: DayBoundary,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_readings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_readings: false }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    /// Parse configuration from toml text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: HostConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("host.toml"),
            std::path::PathBuf::from("..").join("config").join("host.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "loaded configuration");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to load configuration");
                    }
                }
            }
        }

        tracing::warn!("no config file found - using defaults");
        Self::default()
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        let source = if self.source.url.is_empty() { "<unset>" } else { self.source.url.as_str() };
        tracing::info!(
            source = source,
            path = %self.source.path,
            window = self.source.history_window,
            poll_seconds = self.source.poll_interval_seconds,
            bind = %self.server.bind,
            day_boundary = ?self.aggregation.day_boundary,
            log_level = %self.logging.level,
            "host configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = HostConfig::parse("").unwrap();

        assert_eq!(config.source.path, "greenhouse/data_v2");
        assert_eq!(config.source.history_window, 300);
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.aggregation.day_boundary, DayBoundary::Utc);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = HostConfig::parse(
            r#"
            [source]
            url = "https://greenhouse.firebaseio.com"
            history_window = 50

            [aggregation]
            day_boundary = "local"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.url, "https://greenhouse.firebaseio.com");
        assert_eq!(config.source.history_window, 50);
        assert_eq!(config.source.poll_interval_seconds, 30);
        assert_eq!(config.aggregation.day_boundary, DayBoundary::Local);
    }

    #[test]
    fn unknown_boundary_is_an_error() {
        assert!(HostConfig::parse("[aggregation]\nday_boundary = \"mars\"").is_err());
    }
}
