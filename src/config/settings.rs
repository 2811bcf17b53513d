//! Runtime configuration with a TOML overlay.
//!
//! Defaults cover everything; a config file only needs the values it wants
//! to change:
//!
//! ```toml
//! [relay]
//! hook-poll-interval-ms = 250
//! hook-poll-max-attempts = 20
//! event-log-capacity = 500
//!
//! [store]
//! path = "/tmp/statewire-store.json"
//!
//! [log]
//! filter = "statewire=debug"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Interval between hook detection attempts in the content relay.
pub const DEFAULT_HOOK_POLL_INTERVAL_MS: u64 = 500;
/// Number of hook detection attempts after the immediate check.
pub const DEFAULT_HOOK_POLL_MAX_ATTEMPTS: u32 = 10;
/// Maximum number of entries kept in the panel's event log.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 1000;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between hook detection attempts
    pub hook_poll_interval: Duration,
    /// Number of hook detection attempts after the immediate check
    pub hook_poll_max_attempts: u32,
    /// Bound on the panel connector's event log
    pub event_log_capacity: usize,
    /// Snapshot path for the key-value store (None = in-memory only)
    pub store_path: Option<PathBuf>,
    /// Default tracing filter used by the binary
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hook_poll_interval: Duration::from_millis(DEFAULT_HOOK_POLL_INTERVAL_MS),
            hook_poll_max_attempts: DEFAULT_HOOK_POLL_MAX_ATTEMPTS,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            store_path: None,
            log_filter: "statewire=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TomlConfig {
    relay: Option<TomlRelayConfig>,
    store: Option<TomlStoreConfig>,
    log: Option<TomlLogConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TomlRelayConfig {
    hook_poll_interval_ms: Option<u64>,
    hook_poll_max_attempts: Option<u32>,
    event_log_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TomlStoreConfig {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TomlLogConfig {
    filter: Option<String>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for a
    /// missing file and for any value the file does not set.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML contents, overlaying defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let overlay: TomlConfig = toml::from_str(contents)?;
        let mut config = Self::default();

        if let Some(relay) = overlay.relay {
            if let Some(ms) = relay.hook_poll_interval_ms {
                config.hook_poll_interval = Duration::from_millis(ms);
            }
            if let Some(attempts) = relay.hook_poll_max_attempts {
                config.hook_poll_max_attempts = attempts;
            }
            if let Some(capacity) = relay.event_log_capacity {
                config.event_log_capacity = capacity;
            }
        }
        if let Some(store) = overlay.store {
            if let Some(path) = store.path {
                config.store_path = Some(path);
            }
        }
        if let Some(log) = overlay.log {
            if let Some(filter) = log.filter {
                config.log_filter = filter;
            }
        }

        Ok(config)
    }
}
