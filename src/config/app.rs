//! Main application configuration
//!
//! Defaults are overlaid by an optional TOML config file, which in turn is
//! overlaid by `MM_RULES_*` environment variables.

use crate::error::MatchmakingError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub redis: RedisSettings,
    pub allocation: AllocationSettings,
    pub log: LogSettings,
    pub matchmaking: MatchmakingSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Port for the API server
    pub port: u16,
    /// Run mode; "release" switches production behaviour
    pub mode: String,
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub addr: String,
    pub password: String,
    pub db: i64,
}

/// Session allocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationSettings {
    /// Webhook URL of the external allocation service
    pub webhook_url: String,
    /// Extra attempts after the first failed allocation call
    pub max_retries: u32,
    /// Delay between allocation attempts in milliseconds
    pub retry_delay_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Interval between queue cleanup passes in seconds
    pub cleanup_interval_seconds: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            mode: "debug".to_string(),
        }
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            addr: "localhost:6379".to_string(),
            password: String::new(),
            db: 0,
        }
    }
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            webhook_url: "http://localhost:8081/allocate".to_string(),
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            cleanup_interval_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables over defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then overlay environment
    /// variables
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("failed to read config file {}", path.as_ref().display())
        })?;
        let mut config: AppConfig =
            toml::from_str(&raw).context("failed to parse config file")?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Overlay `MM_RULES_*` environment variables onto this configuration
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = env::var("MM_RULES_SERVER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| config_error(format!("invalid MM_RULES_SERVER_PORT value: {}", port)))?;
        }
        if let Ok(mode) = env::var("MM_RULES_SERVER_MODE") {
            self.server.mode = mode;
        }

        if let Ok(addr) = env::var("MM_RULES_REDIS_ADDR") {
            self.redis.addr = addr;
        }
        if let Ok(password) = env::var("MM_RULES_REDIS_PASSWORD") {
            self.redis.password = password;
        }
        if let Ok(db) = env::var("MM_RULES_REDIS_DB") {
            self.redis.db = db
                .parse()
                .map_err(|_| config_error(format!("invalid MM_RULES_REDIS_DB value: {}", db)))?;
        }

        if let Ok(url) = env::var("MM_RULES_ALLOCATION_WEBHOOK_URL") {
            self.allocation.webhook_url = url;
        }
        if let Ok(retries) = env::var("MM_RULES_ALLOCATION_MAX_RETRIES") {
            self.allocation.max_retries = retries.parse().map_err(|_| {
                config_error(format!(
                    "invalid MM_RULES_ALLOCATION_MAX_RETRIES value: {}",
                    retries
                ))
            })?;
        }
        if let Ok(delay) = env::var("MM_RULES_ALLOCATION_RETRY_DELAY_MS") {
            self.allocation.retry_delay_ms = delay.parse().map_err(|_| {
                config_error(format!(
                    "invalid MM_RULES_ALLOCATION_RETRY_DELAY_MS value: {}",
                    delay
                ))
            })?;
        }

        if let Ok(level) = env::var("MM_RULES_LOG_LEVEL") {
            self.log.level = level;
        }

        if let Ok(interval) = env::var("MM_RULES_CLEANUP_INTERVAL_SECONDS") {
            self.matchmaking.cleanup_interval_seconds = interval.parse().map_err(|_| {
                config_error(format!(
                    "invalid MM_RULES_CLEANUP_INTERVAL_SECONDS value: {}",
                    interval
                ))
            })?;
        }

        Ok(())
    }

    /// True when the service runs in production mode
    pub fn is_release(&self) -> bool {
        self.server.mode == "release"
    }

    /// Get the cleanup interval as a Duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.cleanup_interval_seconds)
    }

    /// Get the allocation retry delay as a Duration
    pub fn allocation_retry_delay(&self) -> Duration {
        Duration::from_millis(self.allocation.retry_delay_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.log.level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => {
            return Err(config_error(format!(
                "invalid log level: {}",
                config.log.level
            )))
        }
    }

    if config.server.port == 0 {
        return Err(config_error("server port cannot be 0"));
    }

    if config.redis.addr.is_empty() {
        return Err(config_error("redis address cannot be empty"));
    }

    if config.allocation.webhook_url.is_empty() {
        return Err(config_error("allocation webhook URL cannot be empty"));
    }

    if config.matchmaking.cleanup_interval_seconds == 0 {
        return Err(config_error("cleanup interval must be greater than 0"));
    }

    Ok(())
}

fn config_error(message: impl Into<String>) -> anyhow::Error {
    MatchmakingError::ConfigurationError {
        message: message.into(),
    }
    .into()
}
