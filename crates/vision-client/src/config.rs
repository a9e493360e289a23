//! TOML-based client configuration.
//!
//! Every field has a serde default so a partial file — or no file at all —
//! yields a working configuration pointed at the device's standard
//! access-point address.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use vision_core::protocol::messages::DEFAULT_DEVICE_ADDR;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Client behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Device control-channel address (`host:port`).
    #[serde(default = "default_device_addr")]
    pub device_addr: String,
    /// Deadline for TCP connect plus session handshake, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Per-request deadline for ordinary operations, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Per-request deadline for SD-card-bound operations (listing, delete,
    /// format), in milliseconds.
    #[serde(default = "default_slow_request_timeout_ms")]
    pub slow_request_timeout_ms: u64,
    /// Interval between app-status heartbeats while connected, in seconds.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Capacity of the observer fan-out queue.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Whether to consult the reachability collaborator before dialing.
    #[serde(default)]
    pub check_reachability: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_device_addr() -> String {
    DEFAULT_DEVICE_ADDR.to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_slow_request_timeout_ms() -> u64 {
    10_000
}
fn default_heartbeat_interval_secs() -> u64 {
    30
}
fn default_event_channel_capacity() -> usize {
    128
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_addr: default_device_addr(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            slow_request_timeout_ms: default_slow_request_timeout_ms(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            check_reachability: false,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn slow_request_timeout(&self) -> Duration {
        Duration::from_millis(self.slow_request_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Loads a [`ClientConfig`] from `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: ClientConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
