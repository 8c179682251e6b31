//! Sending half of a camera stream.
//!
//! Wraps any `AsyncWrite` with the handshake and the length-prefixed
//! [`FrameCodec`]. The session drives one of these from its writer
//! task; tests drive it against mock I/O.

use futures::SinkExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedWrite;

use crate::camera::CameraIdentity;
use crate::codec::FrameCodec;
use crate::error::CamlinkError;
use crate::frame::EncodedFrame;

// ── FrameWriter ──────────────────────────────────────────────────

/// Writes the handshake byte and then framed images to `W`.
#[derive(Debug)]
pub struct FrameWriter<W> {
    framed: FramedWrite<W, FrameCodec>,
    frames_written: u64,
    bytes_written: u64,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(io: W) -> Self {
        Self {
            framed: FramedWrite::new(io, FrameCodec::new()),
            frames_written: 0,
            bytes_written: 0,
        }
    }

    /// Write the single camera-identity byte and flush.
    ///
    /// Must be the first thing written on a fresh connection.
    pub async fn handshake(&mut self, camera: CameraIdentity) -> Result<(), CamlinkError> {
        let io = self.framed.get_mut();
        io.write_all(&[camera.as_byte()])
            .await
            .map_err(CamlinkError::Write)?;
        io.flush().await.map_err(CamlinkError::Write)?;
        self.bytes_written += 1;
        Ok(())
    }

    /// Write `[u32 BE length][payload]` and flush.
    pub async fn write_frame(&mut self, frame: EncodedFrame) -> Result<(), CamlinkError> {
        let len = frame.len();
        self.framed.send(frame).await.map_err(|e| match e {
            CamlinkError::Connection(io) => CamlinkError::Write(io),
            other => other,
        })?;
        self.frames_written += 1;
        self.bytes_written += (crate::codec::LENGTH_PREFIX_LEN + len) as u64;
        Ok(())
    }

    /// Best-effort shutdown of the underlying stream. Errors are dropped.
    pub async fn shutdown(&mut self) {
        let _ = self.framed.get_mut().shutdown().await;
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Total bytes written, handshake and prefixes included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.framed.into_inner()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn handshake_then_frames_in_order() {
        let mock = Builder::new()
            .write(&[0x01])
            .write(&[0x00, 0x00, 0x00, 0x03, b'a', b'b', b'c'])
            .write(&[0x00, 0x00, 0x00, 0x02, b'd', b'e'])
            .build();

        let mut writer = FrameWriter::new(mock);
        writer.handshake(CameraIdentity::LeftWrist).await.unwrap();
        writer.write_frame(EncodedFrame::from(b"abc".to_vec())).await.unwrap();
        writer.write_frame(EncodedFrame::from(b"de".to_vec())).await.unwrap();

        assert_eq!(writer.frames_written(), 2);
        assert_eq!(writer.bytes_written(), 1 + 7 + 6);
    }

    #[tokio::test]
    async fn write_error_is_reported_as_write() {
        let mock = Builder::new()
            .write(&[0x00])
            .write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer gone",
            ))
            .build();

        let mut writer = FrameWriter::new(mock);
        writer.handshake(CameraIdentity::High).await.unwrap();
        let err = writer
            .write_frame(EncodedFrame::from(vec![1, 2, 3]))
            .await
            .unwrap_err();

        assert!(matches!(err, CamlinkError::Write(ref e) if e.kind() == std::io::ErrorKind::BrokenPipe));
        assert_eq!(writer.frames_written(), 0);
    }
}
