//! # camlink-core
//!
//! Live camera streaming from a capture device to a PC over raw TCP.
//!
//! This crate contains:
//! - **Frames**: `RawFrame` (borrowed RGBA capture) and `EncodedFrame` (owned JPEG bytes)
//! - **RateLimiter**: last-accepted-timestamp throttle enforcing the target cadence
//! - **FrameEncoder**: RGBA → JPEG at a fixed quality
//! - **Codec**: `FrameCodec`, `[u32 BE length][payload]` framing via `tokio_util`
//! - **State**: `ConnectionState` machine for a streaming session
//! - **Network**: `Session` (sender, single writer lane) and `CameraServer` (receiver)
//! - **Pipeline**: `CapturePipeline`, the per-frame callback glue
//! - **Error**: `CamlinkError` / `EncodeError`, typed `thiserror` errors
//!
//! ```text
//! frame source ─► RateLimiter ─► FrameEncoder ─► Session ─► TCP ─► CameraServer
//! ```

pub mod camera;
pub mod codec;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod limiter;
pub mod network;
pub mod pipeline;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use camera::CameraIdentity;
pub use codec::{FrameCodec, HANDSHAKE_LEN, LENGTH_PREFIX_LEN, MAX_FRAME_SIZE};
pub use encoder::{DEFAULT_QUALITY, FrameEncoder};
pub use error::{CamlinkError, EncodeError};
pub use frame::{EncodedFrame, RawFrame};
pub use limiter::{DEFAULT_TARGET_FPS, RateLimiter};
pub use network::{
    CameraServer, DEFAULT_PORT, FrameWriter, ReceivedFrame, ServerConfig, ServerEvent, Session,
    SessionConfig, SessionEvent, SessionEvents, Submit,
};
pub use pipeline::{CapturePipeline, FrameOutcome, PipelineStats};
pub use state::ConnectionState;
