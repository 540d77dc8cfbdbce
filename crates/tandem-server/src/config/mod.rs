//! Server configuration.
//!
//! This module provides configuration management for the `tandemd` daemon.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tandem_common::config::CoordinatorConfig;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log level (error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prompt shown by the interactive shell.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Shell history file. No history is kept when unset.
    #[serde(default)]
    pub history_file: Option<PathBuf>,

    /// Whether to run the TTL reaper in the background.
    #[serde(default = "default_reaper_enabled")]
    pub reaper_enabled: bool,

    /// Coordinator tuning.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_prompt() -> String {
    "tandem> ".to_string()
}

fn default_reaper_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prompt: default_prompt(),
            history_file: None,
            reaper_enabled: default_reaper_enabled(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks that the configuration can start a coordinator.
    pub fn validate(&self) -> Result<()> {
        self.coordinator
            .validate()
            .map_err(|msg| anyhow::anyhow!("Invalid coordinator config: {msg}"))
    }

    /// Creates a builder for configuration.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

/// Builder for server configuration.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Sets the shell prompt.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = prompt.into();
        self
    }

    /// Sets the history file.
    pub fn history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.history_file = Some(path.into());
        self
    }

    /// Enables or disables the background reaper.
    pub fn reaper_enabled(mut self, enabled: bool) -> Self {
        self.config.reaper_enabled = enabled;
        self
    }

    /// Sets the transaction TTL in milliseconds.
    pub fn txn_ttl_ms(mut self, ms: u64) -> Self {
        self.config.coordinator.txn_ttl_ms = ms;
        self
    }

    /// Sets the reaper interval in milliseconds.
    pub fn reaper_interval_ms(mut self, ms: u64) -> Self {
        self.config.coordinator.reaper_interval_ms = ms;
        self
    }

    /// Enables or disables deadlock detection.
    pub fn deadlock_detection(mut self, enabled: bool) -> Self {
        self.config.coordinator.deadlock_detection = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.prompt, "tandem> ");
        assert!(config.reaper_enabled);
        assert_eq!(config.coordinator.txn_ttl_ms, 25_000);
        assert_eq!(config.coordinator.reaper_interval_ms, 3_500);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder()
            .log_level("debug")
            .txn_ttl_ms(1_000)
            .reaper_interval_ms(100)
            .deadlock_detection(false)
            .reaper_enabled(false)
            .build();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.coordinator.txn_ttl_ms, 1_000);
        assert_eq!(config.coordinator.reaper_interval_ms, 100);
        assert!(!config.coordinator.deadlock_detection);
        assert!(!config.reaper_enabled);
    }

    #[test]
    fn test_to_toml() {
        let config = ServerConfig::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("log_level"));
        assert!(toml.contains("[coordinator]"));
        assert!(toml.contains("txn_ttl_ms"));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tandemd.toml");

        let config = ServerConfig::builder()
            .prompt("tm> ")
            .history_file("/tmp/tandem-history")
            .txn_ttl_ms(9_000)
            .build();
        config.save(&path).unwrap();

        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tandemd.toml");
        std::fs::write(&path, "log_level = \"warn\"\n\n[coordinator]\ntxn_ttl_ms = 500\n").unwrap();

        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.log_level, "warn");
        assert_eq!(loaded.coordinator.txn_ttl_ms, 500);
        assert_eq!(loaded.coordinator.reaper_interval_ms, 3_500);
        assert!(loaded.reaper_enabled);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tandemd.toml");
        std::fs::write(&path, "[coordinator]\ntxn_ttl_ms = 0\n").unwrap();
        assert!(ServerConfig::from_file(&path).is_err());

        assert!(ServerConfig::from_file(&temp_dir.path().join("missing.toml")).is_err());
    }
}
