//! Lossy JPEG frame encoder.
//!
//! Turns a borrowed [`RawFrame`] into an owned [`EncodedFrame`]. The
//! RGBA input is copied into a packed RGB buffer before compression, so
//! nothing refers to the capture buffer once [`FrameEncoder::encode`]
//! returns.

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::error::EncodeError;
use crate::frame::{BYTES_PER_PIXEL, EncodedFrame, RawFrame};

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 80;

// ── FrameEncoder ─────────────────────────────────────────────────

/// JPEG encoder with a fixed quality setting.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    /// JPEG quality, 1..=100.
    quality: u8,
    /// Number of frames encoded so far.
    frame_count: u64,
}

impl FrameEncoder {
    /// Encoder at `quality` (clamped to 1..=100).
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            frame_count: 0,
        }
    }

    /// Encode one frame.
    ///
    /// Fails with [`EncodeError`] when either dimension is zero or the
    /// pixel buffer is shorter than `width * height * 4`; no output is
    /// produced in that case.
    pub fn encode(&mut self, frame: &RawFrame<'_>) -> Result<EncodedFrame, EncodeError> {
        let rgb = Self::pack_rgb(frame)?;

        let mut out = Vec::with_capacity(rgb.len() / 8);
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
            encoder.encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)?;
        }

        self.frame_count += 1;
        Ok(EncodedFrame::new(out))
    }

    /// Current quality setting.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Number of frames encoded so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    // ── Internal helpers ─────────────────────────────────────────

    /// Validate and strip alpha: RGBA rows → tightly packed RGB.
    fn pack_rgb(frame: &RawFrame<'_>) -> Result<Vec<u8>, EncodeError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(EncodeError::EmptyDimensions {
                width: frame.width,
                height: frame.height,
            });
        }

        let expected = frame.expected_len().ok_or(EncodeError::Overflow {
            width: frame.width,
            height: frame.height,
        })?;
        if frame.data.len() < expected {
            return Err(EncodeError::ShortBuffer {
                expected,
                actual: frame.data.len(),
            });
        }

        let pixels = &frame.data[..expected];
        let mut rgb = Vec::with_capacity(expected / BYTES_PER_PIXEL * 3);
        for px in pixels.chunks_exact(BYTES_PER_PIXEL) {
            rgb.extend_from_slice(&px[..3]);
        }
        Ok(rgb)
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 0x80, 0xFF]);
            }
        }
        data
    }

    #[test]
    fn encodes_valid_frame_to_jpeg() {
        let mut enc = FrameEncoder::default();
        let data = gradient(64, 48);
        let encoded = enc.encode(&RawFrame::new(64, 48, &data)).unwrap();

        assert!(!encoded.is_empty());
        // SOI / EOI markers.
        assert_eq!(&encoded.as_bytes()[..2], &[0xFF, 0xD8]);
        assert_eq!(&encoded.as_bytes()[encoded.len() - 2..], &[0xFF, 0xD9]);
        assert_eq!(enc.frame_count(), 1);
    }

    #[test]
    fn decodes_back_to_same_dimensions() {
        let mut enc = FrameEncoder::default();
        let data = gradient(32, 16);
        let encoded = enc.encode(&RawFrame::new(32, 16, &data)).unwrap();

        let img = image::load_from_memory_with_format(encoded.as_bytes(), image::ImageFormat::Jpeg)
            .unwrap();
        assert_eq!(img.width(), 32);
        assert_eq!(img.height(), 16);
    }

    #[test]
    fn short_buffer_fails_without_output() {
        let mut enc = FrameEncoder::default();
        let data = vec![0u8; 64 * 48 * 4 - 1];
        let err = enc.encode(&RawFrame::new(64, 48, &data)).unwrap_err();

        assert_eq!(
            err,
            EncodeError::ShortBuffer {
                expected: 64 * 48 * 4,
                actual: 64 * 48 * 4 - 1,
            }
        );
        assert_eq!(enc.frame_count(), 0);
    }

    #[test]
    fn zero_dimensions_fail() {
        let mut enc = FrameEncoder::default();
        let err = enc.encode(&RawFrame::new(0, 10, &[])).unwrap_err();
        assert!(matches!(err, EncodeError::EmptyDimensions { width: 0, height: 10 }));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut enc = FrameEncoder::default();
        let mut data = gradient(8, 8);
        data.extend_from_slice(&[0u8; 100]);
        assert!(enc.encode(&RawFrame::new(8, 8, &data)).is_ok());
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(FrameEncoder::new(0).quality(), 1);
        assert_eq!(FrameEncoder::new(255).quality(), 100);
        assert_eq!(FrameEncoder::default().quality(), 80);
    }
}
