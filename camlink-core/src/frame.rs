//! Frame types passed between pipeline stages.
//!
//! [`RawFrame`] borrows the capture buffer and is only valid while the
//! frame source callback runs. [`EncodedFrame`] owns its bytes and is
//! what travels through the writer lane onto the wire.

use bytes::Bytes;

/// Bytes per RGBA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

// ── RawFrame ─────────────────────────────────────────────────────

/// A raw RGBA capture borrowed from the frame source.
///
/// `data` is row-major, 4 bytes per pixel, and may be longer than
/// `width * height * 4` (trailing bytes are ignored).
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel data, owned by the caller.
    pub data: &'a [u8],
}

impl<'a> RawFrame<'a> {
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Number of bytes the pixel data must hold, or `None` on overflow.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(BYTES_PER_PIXEL)
    }
}

// ── EncodedFrame ─────────────────────────────────────────────────

/// A compressed, self-contained image ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    data: Bytes,
}

impl EncodedFrame {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Encoded byte count (the value of the length prefix).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<Vec<u8>> for EncodedFrame {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_len_for_vga() {
        let buf = [0u8; 0];
        let frame = RawFrame::new(640, 480, &buf);
        assert_eq!(frame.expected_len(), Some(640 * 480 * 4));
    }

    #[test]
    fn expected_len_overflow() {
        let buf = [0u8; 0];
        let frame = RawFrame::new(u32::MAX, u32::MAX, &buf);
        assert_eq!(frame.expected_len(), None);
    }

    #[test]
    fn encoded_frame_owns_bytes() {
        let frame = EncodedFrame::from(vec![1, 2, 3]);
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
        assert_eq!(frame.as_bytes(), &[1, 2, 3]);
        assert_eq!(frame.into_bytes(), Bytes::from_static(&[1, 2, 3]));
    }
}
