//! Length-prefixed frame codec for `tokio_util` framed I/O.
//!
//! ## Wire format
//!
//! ```text
//! handshake:  camera id   u8   (once, before any frame)
//! per frame:  length      u32  (big-endian)
//!             data        [u8; length]
//! ```
//!
//! The handshake byte is written and read outside the codec; the codec
//! only deals with the repeated frame records.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CamlinkError;
use crate::frame::EncodedFrame;

/// Size of the handshake token.
pub const HANDSHAKE_LEN: usize = 1;

/// Size of the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest frame either side will put on or accept from the wire.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

// ── FrameCodec ───────────────────────────────────────────────────

/// Encodes [`EncodedFrame`]s as `[u32 BE length][payload]` and decodes
/// them back.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Codec with a custom frame size limit (capped at `u32::MAX`).
    pub fn with_max_frame_size(max: usize) -> Self {
        Self {
            max_frame_size: max.min(u32::MAX as usize),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = EncodedFrame;
    type Error = CamlinkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
        let len = u32::from_be_bytes(prefix) as usize;

        if len > self.max_frame_size {
            return Err(CamlinkError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        if src.len() < LENGTH_PREFIX_LEN + len {
            src.reserve(LENGTH_PREFIX_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        let data = src.split_to(len).freeze();
        Ok(Some(EncodedFrame::new(data)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                let expected = if src.len() < LENGTH_PREFIX_LEN {
                    LENGTH_PREFIX_LEN
                } else {
                    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
                    prefix.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
                    LENGTH_PREFIX_LEN + u32::from_be_bytes(prefix) as usize
                };
                Err(CamlinkError::TruncatedFrame {
                    expected,
                    actual: src.len(),
                })
            }
        }
    }
}

impl Encoder<EncodedFrame> for FrameCodec {
    type Error = CamlinkError;

    fn encode(&mut self, item: EncodedFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(CamlinkError::FrameTooLarge {
                size: item.len(),
                max: self.max_frame_size,
            });
        }

        dst.reserve(LENGTH_PREFIX_LEN + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_writes_big_endian_prefix() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(EncodedFrame::from(vec![0xAA; 200]), &mut buf)
            .unwrap();

        assert_eq!(&buf[..4], &[0x00, 0x00, 0x00, 0xC8]);
        assert_eq!(buf.len(), 204);
        assert!(buf[4..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0x00, 0x03, b'a', b'b']);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"c");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.as_bytes(), b"abc");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_back_to_back_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(EncodedFrame::from(b"first".to_vec()), &mut buf).unwrap();
        codec.encode(EncodedFrame::from(Vec::new()), &mut buf).unwrap();
        codec.encode(EncodedFrame::from(b"third".to_vec()), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_bytes(), b"first");
        assert!(codec.decode(&mut buf).unwrap().unwrap().is_empty());
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_bytes(), b"third");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_rejects_oversized_length() {
        let mut codec = FrameCodec::with_max_frame_size(1024);
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x04, 0x01][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CamlinkError::FrameTooLarge { size: 1025, max: 1024 })
        ));
    }

    #[test]
    fn encode_rejects_oversized_frame() {
        let mut codec = FrameCodec::with_max_frame_size(8);
        let mut buf = BytesMut::new();
        assert!(codec.encode(EncodedFrame::from(vec![0; 9]), &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn eof_mid_frame_is_truncation() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00, 0x0A, 1, 2, 3][..]);
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(CamlinkError::TruncatedFrame { expected: 14, actual: 7 })
        ));
    }

    #[test]
    fn eof_on_clean_boundary() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }
}
