//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/beacon/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/beacon/` (~/.config/beacon/)
//! - Data: `$XDG_DATA_HOME/beacon/` (~/.local/share/beacon/)
//! - State/Logs: `$XDG_STATE_HOME/beacon/` (~/.local/state/beacon/)

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
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Durable storage configuration
    #[serde(default)]
    pub storage: StoreConfig,

    /// Queue limits and flush thresholds
    #[serde(default)]
    pub queue: QueueConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Durable storage configuration
///
/// Each store handle owns one primary namespace (events, pending requests and
/// analytics scalars) and one push namespace for messaging state.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Override for the SQLite database location
    pub database_path: Option<PathBuf>,

    /// Primary namespace holding the event and request queues
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Namespace for push messaging state
    #[serde(default = "default_push_namespace")]
    pub push_namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            namespace: default_namespace(),
            push_namespace: default_push_namespace(),
        }
    }
}

impl StoreConfig {
    /// Validate namespace names, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::Config(
                "storage.namespace must not be empty".to_string(),
            ));
        }
        if self.push_namespace.trim().is_empty() {
            return Err(Error::Config(
                "storage.push_namespace must not be empty".to_string(),
            ));
        }
        if self.namespace == self.push_namespace {
            return Err(Error::Config(
                "storage.push_namespace must differ from storage.namespace".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the configured database path, or the XDG default
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(Config::database_path)
    }
}

fn default_namespace() -> String {
    "BEACON_STORE".to_string()
}

fn default_push_namespace() -> String {
    "beacon.messaging".to_string()
}

/// Queue limits and flush thresholds
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Number of queued events at which a flush is due
    #[serde(default = "default_event_queue_threshold")]
    pub event_queue_threshold: usize,

    /// Maximum number of pending requests kept; oldest are dropped first (0 = unlimited)
    #[serde(default = "default_max_pending_requests")]
    pub max_pending_requests: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            event_queue_threshold: default_event_queue_threshold(),
            max_pending_requests: default_max_pending_requests(),
        }
    }
}

impl QueueConfig {
    /// Validate thresholds, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.event_queue_threshold == 0 || self.event_queue_threshold > 10_000 {
            return Err(Error::Config(
                "queue.event_queue_threshold must be between 1 and 10000".to_string(),
            ));
        }
        Ok(())
    }

    /// Request capacity, or `None` when unlimited
    pub fn request_capacity(&self) -> Option<usize> {
        match self.max_pending_requests {
            0 => None,
            n => Some(n),
        }
    }
}

fn default_event_queue_threshold() -> usize {
    10
}

fn default_max_pending_requests() -> usize {
    1000
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
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
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;

        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.queue.validate()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/beacon/config.toml` (~/.config/beacon/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("beacon").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/beacon/` (~/.local/share/beacon/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("beacon")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/beacon/` (~/.local/state/beacon/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("beacon")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/beacon/beacon.db` (~/.local/share/beacon/beacon.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("beacon.db")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("beacon.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.namespace, "BEACON_STORE");
        assert_eq!(config.storage.push_namespace, "beacon.messaging");
        assert_eq!(config.queue.event_queue_threshold, 10);
        assert_eq!(config.queue.max_pending_requests, 1000);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[storage]
database_path = "/tmp/beacon-test.db"
namespace = "APP_STORE"

[queue]
event_queue_threshold = 25
max_pending_requests = 0

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(
            config.storage.resolved_database_path(),
            PathBuf::from("/tmp/beacon-test.db")
        );
        assert_eq!(config.storage.namespace, "APP_STORE");
        assert_eq!(config.storage.push_namespace, "beacon.messaging");
        assert_eq!(config.queue.event_queue_threshold, 25);
        assert_eq!(config.queue.request_capacity(), None);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.max_files, 5);
    }

    #[test]
    fn test_store_config_validation() {
        let config = StoreConfig {
            namespace: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            namespace: "shared".to_string(),
            push_namespace: "shared".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_queue_config_validation() {
        let config = QueueConfig {
            event_queue_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(QueueConfig::default().request_capacity(), Some(1000));
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[queue]\nevent_queue_threshold = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
