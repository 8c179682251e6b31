//! Configuration for the sender.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use camlink_core::{CameraIdentity, DEFAULT_PORT, DEFAULT_QUALITY, DEFAULT_TARGET_FPS, SessionConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Receiver address.
    pub network: NetworkConfig,
    /// Camera and frame settings.
    pub camera: CameraConfig,
    /// Writer lane behaviour.
    pub session: SessionSettings,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Receiver IP or host name.
    pub server_ip: String,
    /// Receiver TCP port.
    pub server_port: u16,
    /// Connect timeout in milliseconds (0 = no timeout).
    pub connect_timeout_ms: u64,
}

/// Camera and frame settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Which camera this device streams.
    pub identity: CameraIdentity,
    /// Analysis width delivered by the frame source.
    pub width: u32,
    /// Analysis height delivered by the frame source.
    pub height: u32,
    /// Native capture cadence of the frame source.
    pub source_fps: u32,
    /// Forwarded frames per second.
    pub target_fps: u32,
    /// JPEG quality (1..=100).
    pub jpeg_quality: u8,
}

/// Writer lane behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Encoded frames allowed to wait for the socket.
    pub queue_depth: usize,
    /// Treat the first write error as fatal for the session.
    pub fail_on_write_error: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_ip: "192.168.1.100".into(),
            server_port: DEFAULT_PORT,
            connect_timeout_ms: 5000,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            identity: CameraIdentity::High,
            width: 640,
            height: 480,
            source_fps: 60,
            target_fps: DEFAULT_TARGET_FPS,
            jpeg_quality: DEFAULT_QUALITY,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            queue_depth: 8,
            fail_on_write_error: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SenderConfig {
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

    /// Build the core session configuration.
    pub fn to_session_config(&self) -> SessionConfig {
        let mut cfg = SessionConfig::new(self.network.server_ip.clone(), self.camera.identity)
            .with_port(self.network.server_port);
        cfg.quality = self.camera.jpeg_quality.clamp(1, 100);
        cfg.queue_depth = self.session.queue_depth.max(1);
        cfg.connect_timeout = match self.network.connect_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        cfg.fail_on_write_error = self.session.fail_on_write_error;
        cfg
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = SenderConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("server_ip"));
        assert!(text.contains("identity = \"high\""));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: SenderConfig = toml::from_str(
            r#"
            [network]
            server_ip = "10.0.0.7"

            [camera]
            identity = "left_wrist"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.network.server_ip, "10.0.0.7");
        assert_eq!(cfg.network.server_port, 8888);
        assert_eq!(cfg.camera.identity, CameraIdentity::LeftWrist);
        assert_eq!(cfg.camera.target_fps, 30);
    }

    #[test]
    fn to_session_config_maps_fields() {
        let mut cfg = SenderConfig::default();
        cfg.network.connect_timeout_ms = 0;
        cfg.camera.jpeg_quality = 0;
        cfg.session.queue_depth = 0;

        let session = cfg.to_session_config();
        assert_eq!(session.port, 8888);
        assert_eq!(session.quality, 1);
        assert_eq!(session.queue_depth, 1);
        assert!(session.connect_timeout.is_none());
    }
}
