//! Configuration loading and management
//!
//! Configuration lives in a JSON file under the platform config directory
//! and is created with defaults on first run. All knobs an operator may
//! want to touch are here; nothing is read from the environment except the
//! log filter override.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

/// Hard defaults used on first run and for missing sections.
pub mod defaults {
    pub const BIND_ADDR: &str = "127.0.0.1:8085";
    pub const API_TOKEN: &str = "change-me";

    pub const DATABASE_URL: &str = "sqlite://data/cdn_image_replace.db";
    pub const DB_MAX_CONNECTIONS: u32 = 5;

    pub const TRANSFORM_ENDPOINT: &str = "https://images.example.com/cdn-cgi/image";
    pub const TRANSFORM_WIDTH: u32 = 2500;
    pub const TRANSFORM_HEIGHT: u32 = 2500;
    pub const TRANSFORM_FIT: &str = "pad";
    pub const TRANSFORM_BACKGROUND: &str = "white";
    pub const TRANSFORM_QUALITY: u8 = 100;
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const USER_AGENT: &str = concat!("cdn-image-replace/", env!("CARGO_PKG_VERSION"));

    pub const PUBLIC_BASE_URL: &str = "https://shop.example.com/media";
    pub const STORAGE_ROOT: &str = "./media";

    pub const BATCH_SIZE: u32 = 300;
    pub const SCHEDULE_INTERVAL_SECS: u64 = 120;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_OUTPUT: bool = false;
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control-surface HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Shared secret required as a bearer token on control endpoints.
    pub api_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: defaults::BIND_ADDR.to_string(),
            api_token: defaults::API_TOKEN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

/// Parameters of the CDN transformation request. They are fixed per
/// deployment; every item in a run is transformed the same way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    pub endpoint_base: String,
    pub width: u32,
    pub height: u32,
    pub fit: String,
    pub background: String,
    pub quality: u8,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            endpoint_base: defaults::TRANSFORM_ENDPOINT.to_string(),
            width: defaults::TRANSFORM_WIDTH,
            height: defaults::TRANSFORM_HEIGHT,
            fit: defaults::TRANSFORM_FIT.to_string(),
            background: defaults::TRANSFORM_BACKGROUND.to_string(),
            quality: defaults::TRANSFORM_QUALITY,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

/// Mapping from public image URLs to the local storage tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub public_base_url: String,
    pub storage_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_base_url: defaults::PUBLIC_BASE_URL.to_string(),
            storage_root: PathBuf::from(defaults::STORAGE_ROOT),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items processed per step.
    pub batch_size: u32,
    /// Scheduler tick interval.
    pub schedule_interval_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            schedule_interval_secs: defaults::SCHEDULE_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridable via RUST_LOG.
    pub level: String,
    /// Also write a daily-rolled log file next to the executable.
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            file_output: defaults::LOG_FILE_OUTPUT,
        }
    }
}

/// Loads and saves the JSON configuration file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?
            .join("cdn-image-replace");
        Ok(Self {
            config_path: config_dir.join("config.json"),
        })
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load the configuration, creating a default file on first run.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(path = %self.config_path.display(), "Configuration file not found, creating default");
            let config = AppConfig::default();
            self.save_config(&config).await?;
            return Ok(config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read config file {}", self.config_path.display()))?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!(path = %self.config_path.display(), "Loaded configuration");
                Ok(config)
            }
            Err(e) => {
                // Keep the broken file around for inspection rather than
                // silently replacing operator edits.
                let backup = self.config_path.with_extension("json.corrupted");
                let _ = fs::copy(&self.config_path, &backup).await;
                Err(anyhow!(
                    "Config file {} is invalid ({}); backed up to {}",
                    self.config_path.display(),
                    e,
                    backup.display()
                ))
            }
        }
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .with_context(|| format!("Failed to write config file {}", self.config_path.display()))?;

        info!(path = %self.config_path.display(), "Saved configuration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_plugin_behavior() {
        let config = AppConfig::default();
        assert_eq!(config.batch.batch_size, 300);
        assert_eq!(config.batch.schedule_interval_secs, 120);
        assert_eq!(config.transform.fit, "pad");
        assert_eq!(config.transform.quality, 100);
    }

    #[tokio::test]
    async fn first_run_creates_default_file_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.json"));

        let created = manager.load_config().await.unwrap();
        assert!(manager.config_path().exists());

        let reloaded = manager.load_config().await.unwrap();
        assert_eq!(created.server.bind_addr, reloaded.server.bind_addr);
        assert_eq!(created.batch.batch_size, reloaded.batch.batch_size);
    }

    #[tokio::test]
    async fn corrupt_file_is_backed_up_and_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let manager = ConfigManager::with_path(path.clone());
        assert!(manager.load_config().await.is_err());
        assert!(path.with_extension("json.corrupted").exists());
    }
}
