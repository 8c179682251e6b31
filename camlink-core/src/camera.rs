//! Camera identity carried in the connection handshake.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CamlinkError;

// ── CameraIdentity ───────────────────────────────────────────────

/// Which robot camera a connection carries.
///
/// The numeric value is the single handshake byte written before any
/// frame data. Chosen before connect and fixed for the lifetime of a
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CameraIdentity {
    /// Overhead camera.
    #[default]
    High = 0,
    /// Camera mounted on the left wrist.
    LeftWrist = 1,
}

impl CameraIdentity {
    /// All known cameras, in handshake order.
    pub const ALL: [CameraIdentity; 2] = [CameraIdentity::High, CameraIdentity::LeftWrist];

    /// The handshake byte.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Protocol-facing name (`CAM_HIGH`, `CAM_LEFT_WRIST`).
    pub const fn name(self) -> &'static str {
        match self {
            CameraIdentity::High => "CAM_HIGH",
            CameraIdentity::LeftWrist => "CAM_LEFT_WRIST",
        }
    }

    /// Lowercase name used for recording directories.
    pub const fn dir_name(self) -> &'static str {
        match self {
            CameraIdentity::High => "cam_high",
            CameraIdentity::LeftWrist => "cam_left_wrist",
        }
    }
}

impl TryFrom<u8> for CameraIdentity {
    type Error = CamlinkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CameraIdentity::High),
            1 => Ok(CameraIdentity::LeftWrist),
            other => Err(CamlinkError::UnknownCamera(other)),
        }
    }
}

impl From<CameraIdentity> for u8 {
    fn from(camera: CameraIdentity) -> Self {
        camera.as_byte()
    }
}

impl fmt::Display for CameraIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CameraIdentity {
    type Err = CamlinkError;

    /// Accepts the protocol name, the snake_case name or the numeric id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "high" | "cam_high" => Ok(CameraIdentity::High),
            "1" | "left_wrist" | "cam_left_wrist" => Ok(CameraIdentity::LeftWrist),
            other => Err(CamlinkError::Other(format!("unknown camera: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_bytes() {
        assert_eq!(CameraIdentity::High.as_byte(), 0);
        assert_eq!(CameraIdentity::LeftWrist.as_byte(), 1);
        assert_eq!(u8::from(CameraIdentity::LeftWrist), 1);
    }

    #[test]
    fn try_from_rejects_unknown() {
        assert_eq!(CameraIdentity::try_from(1).unwrap(), CameraIdentity::LeftWrist);
        assert!(matches!(
            CameraIdentity::try_from(2),
            Err(CamlinkError::UnknownCamera(2))
        ));
    }

    #[test]
    fn parse_names() {
        assert_eq!("CAM_HIGH".parse::<CameraIdentity>().unwrap(), CameraIdentity::High);
        assert_eq!("left_wrist".parse::<CameraIdentity>().unwrap(), CameraIdentity::LeftWrist);
        assert_eq!("1".parse::<CameraIdentity>().unwrap(), CameraIdentity::LeftWrist);
        assert!("cam_right".parse::<CameraIdentity>().is_err());
    }

    #[test]
    fn display_uses_protocol_name() {
        assert_eq!(CameraIdentity::LeftWrist.to_string(), "CAM_LEFT_WRIST");
        assert_eq!(CameraIdentity::High.dir_name(), "cam_high");
    }
}
