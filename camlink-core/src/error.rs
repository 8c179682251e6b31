//! Domain-specific error types for camlink.
//!
//! Connection-lifecycle failures are [`CamlinkError`]; per-frame
//! encoding failures are the separate [`EncodeError`] so the capture
//! path can drop a frame without treating it as a session problem.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for camlink.
#[derive(Debug, Error)]
pub enum CamlinkError {
    // ── Connection Errors ────────────────────────────────────────
    /// Opening the TCP connection failed (unreachable, refused, DNS).
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The connect attempt did not complete within its deadline.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Writing to an established connection failed.
    #[error("write failed: {0}")]
    Write(std::io::Error),

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Protocol Errors ──────────────────────────────────────────
    /// The handshake byte did not name a known camera.
    #[error("unknown camera identifier: {0:#04x}")]
    UnknownCamera(u8),

    /// A frame exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The stream ended in the middle of a frame.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },

    // ── Session Errors ───────────────────────────────────────────
    /// An operation was attempted in a state that does not allow it.
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),

    /// A frame could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── EncodeError ───────────────────────────────────────────────────

/// Why a raw frame could not be turned into an [`EncodedFrame`](crate::EncodedFrame).
///
/// Never fatal to the pipeline: the frame is dropped and the error is
/// logged at debug level.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Width or height is zero.
    #[error("frame has zero dimensions ({width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },

    /// The pixel buffer holds fewer than `width * height * 4` bytes.
    #[error("pixel buffer too short: expected {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },

    /// `width * height * 4` does not fit in `usize`.
    #[error("frame dimensions overflow ({width}x{height})")]
    Overflow { width: u32, height: u32 },

    /// The JPEG encoder rejected the image.
    #[error("jpeg encoding failed: {0}")]
    Jpeg(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for CamlinkError {
    fn from(s: String) -> Self {
        CamlinkError::Other(s)
    }
}

impl From<&str> for CamlinkError {
    fn from(s: &str) -> Self {
        CamlinkError::Other(s.to_string())
    }
}

impl From<image::ImageError> for EncodeError {
    fn from(e: image::ImageError) -> Self {
        EncodeError::Jpeg(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = CamlinkError::UnknownCamera(7);
        assert!(e.to_string().contains("0x07"));

        let e = CamlinkError::FrameTooLarge {
            size: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));
    }

    #[test]
    fn from_string() {
        let e: CamlinkError = "something broke".into();
        assert!(matches!(e, CamlinkError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: CamlinkError = io_err.into();
        assert!(matches!(e, CamlinkError::Connection(_)));
    }

    #[test]
    fn encode_error_converts() {
        let e: CamlinkError = EncodeError::ShortBuffer {
            expected: 16,
            actual: 4,
        }
        .into();
        assert!(matches!(e, CamlinkError::Encode(EncodeError::ShortBuffer { .. })));
        assert!(e.to_string().contains("16"));
    }
}
