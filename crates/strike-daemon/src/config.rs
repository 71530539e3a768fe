//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strike_types::{Address, DEFAULT_LOCK_WINDOW_SECS};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Oracle identity used when no persisted state exists yet.
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Finalization watcher settings.
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Oracle configuration.
///
/// Only consulted on first start. Once a state row exists in the database
/// it is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Owner address, hex with optional `0x`. Empty = zero address.
    #[serde(default)]
    pub owner: String,
    /// Oracle address, hex with optional `0x`. Empty = zero address.
    #[serde(default)]
    pub address: String,
    /// Seconds a submitted price stays pending.
    #[serde(default = "default_lock_window")]
    pub lock_window_secs: u64,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Seconds between polls of the persisted oracle.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Event bus capacity per subscriber.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Event types written to the log. Empty = all.
    #[serde(default)]
    pub log_event_types: Vec<String>,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_lock_window() -> u64 {
    DEFAULT_LOCK_WINDOW_SECS
}

fn default_poll_interval() -> u64 {
    5
}

fn default_event_buffer() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            address: String::new(),
            lock_window_secs: default_lock_window(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            event_buffer: default_event_buffer(),
            log_event_types: Vec::new(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl OracleConfig {
    /// Parsed owner address.
    pub fn owner(&self) -> anyhow::Result<Address> {
        parse_address(&self.owner)
    }

    /// Parsed oracle address.
    pub fn address(&self) -> anyhow::Result<Address> {
        parse_address(&self.address)
    }
}

fn parse_address(value: &str) -> anyhow::Result<Address> {
    if value.is_empty() {
        return Ok(Address::ZERO);
    }
    Ok(value.parse()?)
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("STRIKE_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Strike")
        }
        #[cfg(target_os = "windows")]
        {
            dirs_fallback("Strike")
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            dirs_fallback(".strike")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/strike"))
}
