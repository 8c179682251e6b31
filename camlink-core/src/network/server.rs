//! Receiving side of the camera protocol.
//!
//! [`CameraServer`] accepts one TCP connection per camera, reads the
//! handshake byte, then decodes length-prefixed frames and forwards
//! them as [`ServerEvent`]s. Only one live connection per camera is
//! kept: a reconnect replaces the previous one.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::camera::CameraIdentity;
use crate::codec::{FrameCodec, MAX_FRAME_SIZE};
use crate::error::CamlinkError;
use crate::frame::EncodedFrame;
use crate::network::session::DEFAULT_PORT;

// ── ServerConfig ─────────────────────────────────────────────────

/// Configuration for [`CameraServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: String,
    /// TCP port to listen on.
    pub port: u16,
    /// How long a new client has to send its handshake byte.
    pub handshake_timeout: Duration,
    /// Largest frame accepted from a client.
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            handshake_timeout: Duration::from_secs(5),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

// ── Events ───────────────────────────────────────────────────────

/// A frame read off a camera connection.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub camera: CameraIdentity,
    pub frame: EncodedFrame,
    pub received_at: Instant,
}

/// Everything the server reports to its consumer.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Handshake read; frames for `camera` will follow.
    CameraConnected { camera: CameraIdentity, peer: SocketAddr },
    /// A complete frame.
    Frame(ReceivedFrame),
    /// The connection for `camera` ended.
    CameraDisconnected { camera: CameraIdentity },
}

// ── CameraServer ─────────────────────────────────────────────────

struct ClientEntry {
    id: u64,
    cancel: CancellationToken,
}

type ClientMap = Arc<Mutex<HashMap<CameraIdentity, ClientEntry>>>;

/// TCP server receiving camera streams.
pub struct CameraServer {
    listener: TcpListener,
    config: ServerConfig,
    clients: ClientMap,
    next_id: AtomicU64,
    cancel: CancellationToken,
}

impl CameraServer {
    /// Bind the listener described by `config`.
    pub async fn bind(config: ServerConfig) -> Result<Self, CamlinkError> {
        let listener = TcpListener::bind((config.bind_addr.as_str(), config.port)).await?;
        info!("camera server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            config,
            clients: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, CamlinkError> {
        Ok(self.listener.local_addr()?)
    }

    /// A token that stops the server when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop accepting and disconnect every client.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Cameras with a live connection.
    pub fn connected_cameras(&self) -> Vec<CameraIdentity> {
        let clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cameras: Vec<_> = clients.keys().copied().collect();
        cameras.sort_by_key(|c| c.as_byte());
        cameras
    }

    /// Accept clients until stopped, forwarding their events on `events`.
    ///
    /// Returns when [`stop`](Self::stop) is called or every receiver of
    /// `events` has been dropped.
    pub async fn run(&self, events: mpsc::Sender<ServerEvent>) -> Result<(), CamlinkError> {
        loop {
            let accept = tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = events.closed() => break,
                result = self.listener.accept() => result,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };
            info!("new client {peer}");

            let client = ClientTask {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                peer,
                config: self.config.clone(),
                clients: Arc::clone(&self.clients),
                cancel: self.cancel.child_token(),
                events: events.clone(),
            };
            tokio::spawn(client.run(stream));
        }

        self.cancel.cancel();
        info!("camera server stopped");
        Ok(())
    }
}

impl Drop for CameraServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── ClientTask ───────────────────────────────────────────────────

struct ClientTask {
    id: u64,
    peer: SocketAddr,
    config: ServerConfig,
    clients: ClientMap,
    cancel: CancellationToken,
    events: mpsc::Sender<ServerEvent>,
}

impl ClientTask {
    async fn run(self, mut stream: TcpStream) {
        let camera = match self.read_handshake(&mut stream).await {
            Ok(camera) => camera,
            Err(e) => {
                warn!("dropping client {}: {e}", self.peer);
                return;
            }
        };
        info!("camera {camera} (id {}) connected from {}", camera.as_byte(), self.peer);

        self.register(camera);
        let _ = self
            .events
            .send(ServerEvent::CameraConnected {
                camera,
                peer: self.peer,
            })
            .await;

        let codec = FrameCodec::with_max_frame_size(self.config.max_frame_size);
        let mut frames = FramedRead::new(stream, codec);
        let mut count: u64 = 0;

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = frames.next() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    count += 1;
                    let event = ServerEvent::Frame(ReceivedFrame {
                        camera,
                        frame,
                        received_at: Instant::now(),
                    });
                    if self.events.send(event).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!("{camera} receive error: {e}");
                    break;
                }
                None => break,
            }
        }

        // A replacement connection may already own the slot.
        let still_registered = self.unregister(camera);
        info!("{camera} disconnected after {count} frames");
        if still_registered {
            let _ = self
                .events
                .send(ServerEvent::CameraDisconnected { camera })
                .await;
        }
    }

    async fn read_handshake(&self, stream: &mut TcpStream) -> Result<CameraIdentity, CamlinkError> {
        let limit = self.config.handshake_timeout;
        let byte = tokio::select! {
            _ = self.cancel.cancelled() => return Err(CamlinkError::InvalidState("server stopped")),
            read = tokio::time::timeout(limit, stream.read_u8()) => {
                read.map_err(|_| CamlinkError::Timeout(limit))??
            }
        };
        CameraIdentity::try_from(byte)
    }

    fn register(&self, camera: CameraIdentity) {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = ClientEntry {
            id: self.id,
            cancel: self.cancel.clone(),
        };
        if let Some(old) = clients.insert(camera, entry) {
            debug!("{camera} reconnected; closing previous connection");
            old.cancel.cancel();
        }
    }

    /// Remove this task's entry. Returns `false` if another connection
    /// replaced it.
    fn unregister(&self, camera: CameraIdentity) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        match clients.get(&camera) {
            Some(entry) if entry.id == self.id => {
                clients.remove(&camera);
                true
            }
            _ => false,
        }
    }
}
