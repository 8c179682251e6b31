//! Sender service: one session, one frame source.
//!
//! Connects a [`Session`], then runs the frame source on a dedicated
//! capture thread feeding a [`CapturePipeline`]. Session notifications
//! are drained on the async side, which plays the role of the control
//! layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

use camlink_core::{CapturePipeline, PipelineStats, RateLimiter, Session, SessionEvent};

use crate::config::SenderConfig;
use crate::source::TestPatternSource;

// ── SenderService ────────────────────────────────────────────────

/// Streams one camera to the receiver until stopped.
pub struct SenderService {
    config: SenderConfig,
    running: Arc<AtomicBool>,
}

impl SenderService {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Connect and stream until stopped, the session fails, or
    /// `max_frames` frames have been captured.
    ///
    /// 1. Starts the session and waits for the connect outcome.
    /// 2. Spawns a task that logs session notifications.
    /// 3. Runs the frame source on a blocking thread.
    /// 4. Closes the session and returns the pipeline counters.
    pub async fn run(&self, max_frames: Option<u64>) -> Result<PipelineStats, Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        let session_config = self.config.to_session_config();
        let (session, mut events) = Session::new(session_config);
        let session = Arc::new(session);
        session.start()?;

        let outcome = tokio::select! {
            event = events.recv() => event,
            _ = Self::wait_for_stop(&self.running) => {
                info!("stopped while connecting");
                session.close();
                return Ok(PipelineStats::default());
            }
        };
        match outcome {
            Some(SessionEvent::Connected) => {}
            Some(SessionEvent::Error(reason)) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(format!("could not connect: {reason}").into());
            }
            None => {
                self.running.store(false, Ordering::SeqCst);
                return Err("session ended before connecting".into());
            }
        }

        // Control side: report stream errors, stop once the session is dead.
        let monitor = tokio::spawn({
            let session = Arc::clone(&session);
            let running = Arc::clone(&self.running);
            async move {
                while let Some(event) = events.recv().await {
                    match event {
                        SessionEvent::Connected => {}
                        SessionEvent::Error(reason) => {
                            warn!("stream error: {reason}");
                            if session.state().is_terminal() {
                                error!("session failed; stopping capture");
                                running.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                }
            }
        });

        let camera = &self.config.camera;
        let (width, height, source_fps) = (camera.width, camera.height, camera.source_fps);
        let report_every = u64::from(source_fps.max(1)) * 5;
        let mut pipeline =
            CapturePipeline::new(Arc::clone(&session), RateLimiter::new(camera.target_fps));
        let running = Arc::clone(&self.running);

        info!(
            "capturing {width}x{height} at {source_fps} fps, forwarding {} fps",
            camera.target_fps
        );

        let capture = tokio::task::spawn_blocking(move || {
            let mut source = TestPatternSource::new(width, height, source_fps);
            source.run(&running, max_frames, |frame, captured_at| {
                pipeline.on_frame(frame, captured_at);
                let stats = pipeline.stats();
                if stats.frames_seen % report_every == 0 {
                    info!(
                        seen = stats.frames_seen,
                        sent = stats.submitted,
                        throttled = stats.throttled,
                        queue_full = stats.queue_full,
                        "capture stats"
                    );
                }
            });
            pipeline.stats().clone()
        });

        let stats = capture.await?;
        session.close();
        monitor.abort();
        self.running.store(false, Ordering::SeqCst);

        info!(
            "sender stopped: {} frames captured, {} sent, {} dropped by the writer lane",
            stats.frames_seen,
            stats.submitted,
            session.frames_dropped()
        );
        Ok(stats)
    }

    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn service_creates_with_defaults() {
        let svc = SenderService::new(SenderConfig::default());
        assert!(!svc.is_running());
    }

    #[test]
    fn stop_handle_works() {
        let svc = SenderService::new(SenderConfig::default());
        let handle = svc.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(svc.is_running());
        svc.stop();
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn connect_failure_is_returned() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = SenderConfig::default();
        config.network.server_ip = "127.0.0.1".into();
        config.network.server_port = port;

        let svc = SenderService::new(config);
        assert!(svc.run(Some(1)).await.is_err());
        assert!(!svc.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn streams_handshake_and_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut config = SenderConfig::default();
        config.network.server_ip = "127.0.0.1".into();
        config.network.server_port = port;
        config.camera.identity = camlink_core::CameraIdentity::LeftWrist;
        config.camera.width = 32;
        config.camera.height = 24;
        config.camera.source_fps = 120;

        let reader = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes).await.unwrap();
            bytes
        });

        let svc = SenderService::new(config);
        let stats = svc.run(Some(12)).await.unwrap();
        assert_eq!(stats.frames_seen, 12);
        assert!(stats.throttled > 0);

        let bytes = reader.await.unwrap();
        assert_eq!(bytes[0], 0x01);
        let first_len = u32::from_be_bytes(bytes[1..5].try_into().unwrap()) as usize;
        assert_eq!(&bytes[5..7], &[0xFF, 0xD8]);
        assert!(bytes.len() >= 5 + first_len);
    }

    #[tokio::test]
    async fn stop_while_connecting_returns_promptly() {
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let addr = listener.local_addr().unwrap();

        // Fill the accept queue so the next connect hangs.
        let mut backlog = Vec::new();
        while let Ok(Ok(stream)) = tokio::time::timeout(
            Duration::from_millis(200),
            tokio::net::TcpStream::connect(addr),
        )
        .await
        {
            backlog.push(stream);
            assert!(backlog.len() < 64, "accept queue never filled");
        }

        let mut config = SenderConfig::default();
        config.network.server_ip = "127.0.0.1".into();
        config.network.server_port = addr.port();
        config.network.connect_timeout_ms = 0;

        let svc = SenderService::new(config);
        let stop = svc.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stop.store(false, Ordering::SeqCst);
        });

        let stats = tokio::time::timeout(Duration::from_secs(5), svc.run(None))
            .await
            .expect("run ignored the stop request")
            .unwrap();
        assert_eq!(stats.frames_seen, 0);
        assert!(!svc.is_running());
    }
}
