//! Configuration loading, validation, and management for Appraisal.
//!
//! Loads configuration from `~/.appraisal/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.appraisal/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Review cycle and reporting configuration
    #[serde(default)]
    pub review: ReviewConfig,

    /// Audit trail configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// SQLite database file. Defaults to `~/.appraisal/appraisal.sqlite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Upper bound for any single storage call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_backend() -> String {
    "sqlite".into()
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_max_connections() -> u32 {
    4
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            timeout_ms: default_timeout_ms(),
            max_connections: default_max_connections(),
        }
    }
}

impl StorageConfig {
    /// Database path with `~/` expanded.
    pub fn database_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => expand_home(p),
            None => AppConfig::config_dir().join("appraisal.sqlite"),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Identifier of the review cycle self assessments are filed under
    #[serde(default = "default_cycle")]
    pub active_cycle: String,

    /// Decimal places averages are rounded to
    #[serde(default = "default_precision")]
    pub display_precision: u32,

    /// How many months the trend report covers by default
    #[serde(default = "default_trend_months")]
    pub trend_months: u32,
}

fn default_cycle() -> String {
    "2026-H2".into()
}
fn default_precision() -> u32 {
    1
}
fn default_trend_months() -> u32 {
    6
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            active_cycle: default_cycle(),
            display_precision: default_precision(),
            trend_months: default_trend_months(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSON-lines audit file. Defaults to `~/.appraisal/audit.jsonl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditConfig {
    pub fn log_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => expand_home(p),
            None => AppConfig::config_dir().join("audit.jsonl"),
        }
    }
}

pub use appraisal_core::limits::{MAX_PRECISION, MAX_TREND_MONTHS};

impl AppConfig {
    /// Load configuration from the default path (~/.appraisal/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides:
    /// - `APPRAISAL_BACKEND`
    /// - `APPRAISAL_DB_PATH`
    /// - `APPRAISAL_CYCLE`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if let Ok(backend) = std::env::var("APPRAISAL_BACKEND") {
            config.storage.backend = backend;
        }
        if let Ok(db_path) = std::env::var("APPRAISAL_DB_PATH") {
            config.storage.path = Some(db_path);
        }
        if let Ok(cycle) = std::env::var("APPRAISAL_CYCLE") {
            config.review.active_cycle = cycle;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".appraisal")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.storage.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "storage.backend must be \"sqlite\" or \"memory\" (got \"{other}\")"
                )));
            }
        }

        if self.storage.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "storage.timeout_ms must be > 0".into(),
            ));
        }

        if self.storage.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "storage.max_connections must be > 0".into(),
            ));
        }

        if self.review.active_cycle.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "review.active_cycle must not be empty".into(),
            ));
        }

        if self.review.display_precision > MAX_PRECISION {
            return Err(ConfigError::ValidationError(format!(
                "review.display_precision must be between 0 and {MAX_PRECISION}"
            )));
        }

        if !(1..=MAX_TREND_MONTHS).contains(&self.review.trend_months) {
            return Err(ConfigError::ValidationError(format!(
                "review.trend_months must be between 1 and {MAX_TREND_MONTHS}"
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs_home().join(rest),
        None => PathBuf::from(path),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
