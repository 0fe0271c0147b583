//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/syslogdb/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/syslogdb/` (~/.config/syslogdb/)
//! - Data: `$XDG_DATA_HOME/syslogdb/` (~/.local/share/syslogdb/)
//! - State/Logs: `$XDG_STATE_HOME/syslogdb/` (~/.local/state/syslogdb/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Storage settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How dimension surrogate keys are resolved
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyResolution {
    /// One `INSERT .. ON CONFLICT .. RETURNING` statement per dimension
    #[default]
    Atomic,
    /// Lookup, insert when absent, lookup again. Racy under concurrent
    /// ingestion of a brand-new natural key.
    LookupThenInsert,
}

/// Storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Database file (defaults to the XDG data directory)
    pub path: Option<PathBuf>,

    /// Maximum number of concurrent connections
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long a connection waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Dimension key resolution strategy
    #[serde(default)]
    pub key_resolution: KeyResolution,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            key_resolution: KeyResolution::default(),
        }
    }
}

impl DatabaseConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::Configuration(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured database path, or the XDG default
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(Config::database_path)
    }
}

fn default_pool_size() -> usize {
    10
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read config file {:?}: {}", path, e))
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Configuration(format!("failed to parse config: {}", e)))?;

        config.database.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/syslogdb/config.toml` (~/.config/syslogdb/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("syslogdb").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("syslogdb")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("syslogdb")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/syslogdb/messages.db` (~/.local/share/syslogdb/messages.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("messages.db")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("syslogdb.log")
    }
}
