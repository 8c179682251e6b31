//! Connection Session: one TCP connection carrying one camera stream.
//!
//! The caller-facing [`Session`] never blocks on the network. `start()`
//! spawns a task that connects, writes the handshake byte and then
//! becomes the single writer lane, draining a bounded queue of encoded
//! frames in FIFO order. Lifecycle notifications (`Connected`, `Error`)
//! come back on a [`SessionEvents`] channel that the control layer
//! drains on its own context, and every state transition is published
//! on a `watch` channel.
//!
//! ```text
//! capture thread ──submit()──► [encode] ──try_send──► queue ──► writer task ──► socket
//!                                                                   │
//! control layer ◄──────────── SessionEvents / watch<ConnectionState> ┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::camera::CameraIdentity;
use crate::encoder::{DEFAULT_QUALITY, FrameEncoder};
use crate::error::CamlinkError;
use crate::frame::{EncodedFrame, RawFrame};
use crate::network::writer::FrameWriter;
use crate::state::ConnectionState;

/// Port the receiver listens on.
pub const DEFAULT_PORT: u16 = 8888;

// ── SessionConfig ────────────────────────────────────────────────

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Receiver host name or IP.
    pub host: String,
    /// Receiver TCP port.
    pub port: u16,
    /// Camera carried by this session.
    pub camera: CameraIdentity,
    /// JPEG quality for [`Session::submit`].
    pub quality: u8,
    /// Encoded frames allowed to wait for the writer before new ones
    /// are dropped.
    pub queue_depth: usize,
    /// Deadline for the TCP connect. `None` waits as long as the OS does.
    pub connect_timeout: Option<Duration>,
    /// Move to `Failed` and stop writing on the first write error.
    /// When `false` the session stays `Connected` until closed.
    pub fail_on_write_error: bool,
}

impl SessionConfig {
    /// Defaults for everything except the target and the camera.
    pub fn new(host: impl Into<String>, camera: CameraIdentity) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            camera,
            quality: DEFAULT_QUALITY,
            queue_depth: 8,
            connect_timeout: Some(Duration::from_secs(5)),
            fail_on_write_error: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `host:port`, for logging.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Events ───────────────────────────────────────────────────────

/// Lifecycle notification delivered to the control layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connected and handshake written.
    Connected,
    /// Connect failed, or a write failed mid-stream.
    Error(String),
}

/// Receiving end of a session's notifications.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    /// Handed to the writer lane.
    Queued,
    /// Session not connected; frame discarded.
    Inactive,
    /// Writer lane is backed up; frame discarded.
    QueueFull,
}

// ── Session ──────────────────────────────────────────────────────

/// Caller-facing handle of a streaming session.
///
/// Share it between the capture thread and the control layer with an
/// `Arc`; every method takes `&self`.
pub struct Session {
    config: SessionConfig,
    state: Arc<watch::Sender<ConnectionState>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    frame_tx: mpsc::Sender<EncodedFrame>,
    frame_rx: Mutex<Option<mpsc::Receiver<EncodedFrame>>>,
    /// Held across encode + enqueue so queue order matches submit order.
    encoder: Mutex<FrameEncoder>,
    cancel: CancellationToken,
    runtime: Option<Handle>,
    queued: AtomicU64,
    dropped: AtomicU64,
}

impl Session {
    /// Build an idle session and the channel its notifications arrive on.
    ///
    /// If called inside a Tokio runtime, that runtime is remembered so
    /// `start()` may later be called from any thread.
    pub fn new(config: SessionConfig) -> (Self, SessionEvents) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = mpsc::channel(config.queue_depth.max(1));
        let (state, _) = watch::channel(ConnectionState::Idle);

        let session = Self {
            encoder: Mutex::new(FrameEncoder::new(config.quality)),
            config,
            state: Arc::new(state),
            events: events_tx,
            frame_tx,
            frame_rx: Mutex::new(Some(frame_rx)),
            cancel: CancellationToken::new(),
            runtime: Handle::try_current().ok(),
            queued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        };
        (session, events_rx)
    }

    /// Begin connecting. Valid only from `Idle`.
    ///
    /// Returns immediately; the outcome arrives as a [`SessionEvent`].
    pub fn start(&self) -> Result<(), CamlinkError> {
        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| {
                CamlinkError::InvalidState("start() requires a Tokio runtime")
            })?,
        };

        let mut transition = Ok(());
        self.state.send_if_modified(|state| match state.begin_connect() {
            Ok(()) => true,
            Err(e) => {
                transition = Err(e);
                false
            }
        });
        transition?;

        let frame_rx = self
            .frame_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(CamlinkError::InvalidState("session already started"))?;

        let lane = WriterLane {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            cancel: self.cancel.clone(),
            frame_rx,
        };

        info!(
            camera = %self.config.camera,
            addr = %self.config.addr(),
            "connecting"
        );
        runtime.spawn(lane.run());
        Ok(())
    }

    /// Encode `frame` and queue it for transmission.
    ///
    /// A silent no-op unless the session is `Connected`. Never waits on
    /// the network: if the writer lane is backed up the frame is
    /// dropped. Only an encoding failure is returned as an error.
    pub fn submit(&self, frame: &RawFrame<'_>) -> Result<Submit, CamlinkError> {
        if !self.is_connected() {
            return Ok(Submit::Inactive);
        }

        let mut encoder = self.encoder.lock().unwrap_or_else(PoisonError::into_inner);
        let encoded = encoder.encode(frame)?;
        Ok(self.enqueue(encoded))
    }

    /// Queue an already-encoded frame. Same rules as [`submit`](Self::submit).
    pub fn submit_encoded(&self, frame: EncodedFrame) -> Submit {
        if !self.is_connected() {
            return Submit::Inactive;
        }

        let _order = self.encoder.lock().unwrap_or_else(PoisonError::into_inner);
        self.enqueue(frame)
    }

    /// Stop accepting frames and release the connection.
    ///
    /// Valid from any state, idempotent, and never fails. A write that
    /// is already on the wire is allowed to finish; queued frames are
    /// discarded.
    pub fn close(&self) {
        let changed = self.state.send_if_modified(|state| state.close());
        self.cancel.cancel();
        if changed {
            info!(camera = %self.config.camera, "session closed");
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Subscribe to state transitions.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn camera(&self) -> CameraIdentity {
        self.config.camera
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Frames handed to the writer lane so far.
    pub fn frames_queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Frames discarded because the writer lane was full.
    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, frame: EncodedFrame) -> Submit {
        match self.frame_tx.try_send(frame) {
            Ok(()) => {
                self.queued.fetch_add(1, Ordering::Relaxed);
                Submit::Queued
            }
            Err(mpsc::error::TrySendError::Full(frame)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(len = frame.len(), "writer lane full; frame dropped");
                Submit::QueueFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Submit::Inactive,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("addr", &self.config.addr())
            .field("camera", &self.config.camera)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

// ── WriterLane ───────────────────────────────────────────────────

/// The background half of a session: connect, handshake, write loop.
struct WriterLane {
    config: SessionConfig,
    state: Arc<watch::Sender<ConnectionState>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
    frame_rx: mpsc::Receiver<EncodedFrame>,
}

impl WriterLane {
    async fn run(mut self) {
        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(addr = %self.config.addr(), "connect abandoned: session closed");
                return;
            }
            result = self.connect() => result,
        };

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                self.fail(e.to_string());
                return;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {e}");
        }

        let mut writer = FrameWriter::new(stream);
        if let Err(e) = writer.handshake(self.config.camera).await {
            self.fail(e.to_string());
            writer.shutdown().await;
            return;
        }

        let connected = self
            .state
            .send_if_modified(|state| state.complete_connect().is_ok());
        if !connected {
            // Closed while the handshake was in flight.
            writer.shutdown().await;
            return;
        }

        info!(
            camera = %self.config.camera,
            addr = %self.config.addr(),
            "connected"
        );
        let _ = self.events.send(SessionEvent::Connected);

        self.pump(&mut writer).await;

        writer.shutdown().await;
        debug!(
            frames = writer.frames_written(),
            bytes = writer.bytes_written(),
            "writer lane finished"
        );
    }

    async fn connect(&self) -> Result<TcpStream, CamlinkError> {
        let addr = self.config.addr();
        let connect = TcpStream::connect((self.config.host.as_str(), self.config.port));

        let result = match self.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| CamlinkError::ConnectTimeout(limit))?,
            None => connect.await,
        };
        result.map_err(|source| CamlinkError::Connect { addr, source })
    }

    /// Drain the queue onto the socket until closed, failed, or the
    /// queue ends. A close cuts short a write stalled on a receiver
    /// that stopped reading.
    async fn pump<W: AsyncWrite + Unpin>(&mut self, writer: &mut FrameWriter<W>) {
        let mut failing = false;

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.frame_rx.recv() => match next {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let len = frame.len();
            let written = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(len, "close interrupted a frame write");
                    break;
                }
                written = writer.write_frame(frame) => written,
            };

            match written {
                Ok(()) => {
                    trace!(len, "frame written");
                    failing = false;
                }
                Err(e) => {
                    if !self.on_write_error(e, &mut failing) {
                        break;
                    }
                }
            }
        }
    }

    /// Apply the write-error policy. Returns `false` when the lane
    /// should stop.
    fn on_write_error(&self, e: CamlinkError, failing: &mut bool) -> bool {
        if self.cancel.is_cancelled() {
            debug!("write failed during close: {e}");
            return false;
        }
        if self.config.fail_on_write_error {
            warn!(camera = %self.config.camera, "write failed: {e}");
            self.fail(e.to_string());
            return false;
        }
        if *failing {
            debug!("write failed again: {e}");
        } else {
            warn!(camera = %self.config.camera, "write failed: {e}");
            *failing = true;
            let _ = self.events.send(SessionEvent::Error(e.to_string()));
        }
        true
    }

    /// Move to `Failed` and notify, unless the session was closed first.
    fn fail(&self, reason: String) {
        let failed = self
            .state
            .send_if_modified(|state| state.fail(reason.clone()).is_ok());
        if failed {
            warn!(camera = %self.config.camera, "session failed: {reason}");
            let _ = self.events.send(SessionEvent::Error(reason));
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
