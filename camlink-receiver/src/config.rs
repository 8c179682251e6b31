//! Receiver configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use camlink_core::{DEFAULT_PORT, MAX_FRAME_SIZE, ServerConfig};

/// Top-level configuration for the receiver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Listener settings.
    pub network: NetworkConfig,
    /// Dataset recording.
    pub recording: RecordingConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind.
    pub bind_addr: String,
    /// TCP port.
    pub port: u16,
    /// Seconds a client has to send its camera id.
    pub handshake_timeout_secs: u64,
    /// Largest accepted frame in bytes.
    pub max_frame_size: usize,
}

/// Dataset recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Write received frames to disk.
    pub enabled: bool,
    /// Dataset root; each run gets a timestamped subdirectory.
    pub output_dir: PathBuf,
    /// Free-form task instruction stored with the recording.
    pub task_description: String,
    /// Task category stored with the recording.
    pub task_type: String,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
    /// Seconds between per-camera statistics lines (0 disables).
    pub stats_interval_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            handshake_timeout_secs: 5,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: PathBuf::from("datasets/my_dataset_v1"),
            task_description: String::new(),
            task_type: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            stats_interval_secs: 5,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ReceiverConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Convert listener settings into a `ServerConfig`.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.network.bind_addr.clone(),
            port: self.network.port,
            handshake_timeout: Duration::from_secs(self.network.handshake_timeout_secs.max(1)),
            max_frame_size: self.network.max_frame_size.clamp(1, MAX_FRAME_SIZE),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
