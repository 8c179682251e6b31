//! Receiver service: accepts camera streams, validates frames and
//! optionally records them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::ImageFormat;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use camlink_core::{CameraIdentity, CameraServer, CamlinkError, ReceivedFrame, ServerEvent};

use crate::config::ReceiverConfig;
use crate::recorder::Recorder;

const EVENT_QUEUE_DEPTH: usize = 64;

// ── Stats ────────────────────────────────────────────────────────

/// Per-camera counters.
#[derive(Debug, Clone, Default)]
pub struct CameraStats {
    /// Connections accepted for this camera.
    pub connections: u64,
    /// Frames that decoded as JPEG.
    pub frames: u64,
    /// Payload bytes of decoded frames.
    pub bytes: u64,
    /// Frames that failed to decode and were skipped.
    pub decode_failures: u64,
    /// Frames written to the recording.
    pub recorded: u64,
    /// Dimensions of the last decoded frame.
    pub width: u32,
    pub height: u32,
    window_frames: u64,
    window_start: Option<Instant>,
}

impl CameraStats {
    /// Frames per second since the last call, restarting the window.
    fn take_fps(&mut self, now: Instant) -> f64 {
        let fps = match self.window_start {
            Some(start) => {
                let secs = now.saturating_duration_since(start).as_secs_f64();
                if secs > 0.0 { self.window_frames as f64 / secs } else { 0.0 }
            }
            None => 0.0,
        };
        self.window_frames = 0;
        self.window_start = Some(now);
        fps
    }
}

/// Everything the receiver saw during one run.
#[derive(Debug, Clone, Default)]
pub struct ReceiverStats {
    pub cameras: HashMap<CameraIdentity, CameraStats>,
}

impl ReceiverStats {
    /// Counters for `camera`, if it ever connected or sent a frame.
    pub fn camera(&self, camera: CameraIdentity) -> Option<&CameraStats> {
        self.cameras.get(&camera)
    }
}

// ── ReceiverService ──────────────────────────────────────────────

/// Runs a [`CameraServer`] and consumes its events.
pub struct ReceiverService {
    config: ReceiverConfig,
    server: Arc<CameraServer>,
}

impl ReceiverService {
    /// Bind the listener. Frames are not accepted until [`run`](Self::run).
    pub async fn bind(config: ReceiverConfig) -> Result<Self, CamlinkError> {
        let server = CameraServer::bind(config.to_server_config()).await?;
        Ok(Self {
            config,
            server: Arc::new(server),
        })
    }

    /// The bound listener address.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, CamlinkError> {
        self.server.local_addr()
    }

    /// A token that stops the service when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.server.stop_handle()
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.server.stop();
    }

    /// Serve until stopped.
    ///
    /// 1. Opens a recording if enabled.
    /// 2. Spawns the accept loop.
    /// 3. Validates and records every frame, logging per-camera rates.
    /// 4. Finalizes the recording and returns the counters.
    pub async fn run(&self) -> Result<ReceiverStats, Box<dyn std::error::Error>> {
        let recorder = if self.config.recording.enabled {
            let rec = Recorder::create(
                &self.config.recording.output_dir,
                self.config.recording.task_description.clone(),
                self.config.recording.task_type.clone(),
            )?;
            info!("recording to {}", rec.dir().display());
            Some(rec)
        } else {
            None
        };
        // Decoding and disk writes stay off the async side.
        let (sink_tx, sink_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let worker = tokio::task::spawn_blocking(move || FrameSink::new(recorder).run(sink_rx));

        let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let accept = tokio::spawn({
            let server = Arc::clone(&self.server);
            async move { server.run(tx).await }
        });

        let stop = self.server.stop_handle();
        let stats_every = match self.config.logging.stats_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let mut ticker = tokio::time::interval(stats_every.unwrap_or(Duration::from_secs(3600)));
        ticker.tick().await;

        loop {
            let input = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => SinkInput::Event(event),
                    None => break,
                },
                _ = ticker.tick(), if stats_every.is_some() => SinkInput::Report(Instant::now()),
            };
            if sink_tx.send(input).await.is_err() {
                error!("frame sink stopped unexpectedly");
                break;
            }
        }

        self.server.stop();
        // Forward what the connections already queued.
        while let Ok(event) = rx.try_recv() {
            if sink_tx.send(SinkInput::Event(event)).await.is_err() {
                break;
            }
        }
        drop(rx);
        drop(sink_tx);
        if let Err(e) = accept.await? {
            warn!("accept loop ended with error: {e}");
        }

        let stats = worker.await??;
        for (camera, cam) in &stats.cameras {
            info!(
                "{camera}: {} frames, {} bytes, {} undecodable, {} recorded",
                cam.frames, cam.bytes, cam.decode_failures, cam.recorded
            );
        }
        info!("receiver stopped");
        Ok(stats)
    }
}

// ── FrameSink ────────────────────────────────────────────────────

enum SinkInput {
    Event(ServerEvent),
    /// Log per-camera rates measured up to this instant.
    Report(Instant),
}

/// Owns the stats and the recorder on a blocking thread.
struct FrameSink {
    stats: ReceiverStats,
    recorder: Option<Recorder>,
}

impl FrameSink {
    fn new(recorder: Option<Recorder>) -> Self {
        Self {
            stats: ReceiverStats::default(),
            recorder,
        }
    }

    /// Consume inputs until every sender is gone, then finalize.
    fn run(mut self, mut inputs: mpsc::Receiver<SinkInput>) -> std::io::Result<ReceiverStats> {
        while let Some(input) = inputs.blocking_recv() {
            match input {
                SinkInput::Event(event) => self.handle(event),
                SinkInput::Report(now) => self.log_rates(now),
            }
        }
        self.finish()
    }

    fn handle(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::CameraConnected { camera, peer } => {
                info!("{camera} streaming from {peer}");
                self.stats.cameras.entry(camera).or_default().connections += 1;
            }
            ServerEvent::CameraDisconnected { camera } => {
                info!("{camera} stream ended");
            }
            ServerEvent::Frame(received) => self.on_frame(received),
        }
    }

    fn on_frame(&mut self, received: ReceivedFrame) {
        let ReceivedFrame { camera, frame, .. } = received;
        let cam = self.stats.cameras.entry(camera).or_default();

        let image = match image::load_from_memory_with_format(frame.as_bytes(), ImageFormat::Jpeg) {
            Ok(image) => image,
            Err(e) => {
                debug!("{camera}: dropping undecodable frame ({} bytes): {e}", frame.len());
                cam.decode_failures += 1;
                return;
            }
        };

        cam.frames += 1;
        cam.window_frames += 1;
        cam.bytes += frame.len() as u64;
        cam.width = image.width();
        cam.height = image.height();

        if let Some(recorder) = self.recorder.as_mut() {
            match recorder.record(camera, &frame) {
                Ok(_) => cam.recorded += 1,
                Err(e) => error!("{camera}: failed to record frame: {e}"),
            }
        }
    }

    fn log_rates(&mut self, now: Instant) {
        for (camera, cam) in self.stats.cameras.iter_mut() {
            let fps = cam.take_fps(now);
            info!(
                "{camera}: {fps:.1} fps, {}x{}, {} frames total",
                cam.width, cam.height, cam.frames
            );
        }
    }

    fn finish(self) -> std::io::Result<ReceiverStats> {
        if let Some(recorder) = self.recorder {
            let dir = recorder.dir().to_path_buf();
            recorder.finish()?;
            info!("recording saved to {}", dir.display());
        }
        Ok(self.stats)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use camlink_core::{EncodedFrame, FrameEncoder, RawFrame};

    fn received(camera: CameraIdentity, frame: EncodedFrame) -> ServerEvent {
        ServerEvent::Frame(ReceivedFrame {
            camera,
            frame,
            received_at: Instant::now(),
        })
    }

    fn real_jpeg(width: u32, height: u32) -> EncodedFrame {
        let pixels = vec![0x80; (width * height * 4) as usize];
        FrameEncoder::new(80)
            .encode(&RawFrame::new(width, height, &pixels))
            .unwrap()
    }

    #[test]
    fn valid_frames_are_counted() {
        let mut sink = FrameSink::new(None);
        sink.handle(received(CameraIdentity::High, real_jpeg(16, 8)));
        sink.handle(received(CameraIdentity::High, real_jpeg(16, 8)));

        let stats = sink.finish().unwrap();
        let cam = stats.camera(CameraIdentity::High).unwrap();
        assert_eq!(cam.frames, 2);
        assert_eq!((cam.width, cam.height), (16, 8));
        assert_eq!(cam.decode_failures, 0);
    }

    #[test]
    fn undecodable_frames_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        let recorder = Recorder::create(root.path(), "", "").unwrap();
        let dir = recorder.dir().to_path_buf();
        let mut sink = FrameSink::new(Some(recorder));

        sink.handle(received(CameraIdentity::LeftWrist, EncodedFrame::from(vec![1, 2, 3])));
        sink.handle(received(CameraIdentity::LeftWrist, real_jpeg(8, 8)));

        let stats = sink.finish().unwrap();
        let cam = stats.camera(CameraIdentity::LeftWrist).unwrap();
        assert_eq!(cam.decode_failures, 1);
        assert_eq!(cam.frames, 1);
        assert_eq!(cam.recorded, 1);
        assert!(dir.join("cam_left_wrist/frame_000000.jpg").exists());
        assert!(!dir.join("cam_left_wrist/frame_000001.jpg").exists());
    }

    #[test]
    fn rate_window_restarts() {
        let mut cam = CameraStats::default();
        let start = Instant::now();
        assert_eq!(cam.take_fps(start), 0.0);
        cam.window_frames = 30;
        let fps = cam.take_fps(start + Duration::from_secs(1));
        assert!((fps - 30.0).abs() < 1e-9);
        assert_eq!(cam.window_frames, 0);
    }

    #[test]
    fn connections_are_counted() {
        let mut sink = FrameSink::new(None);
        let peer = "127.0.0.1:5000".parse().unwrap();
        sink.handle(ServerEvent::CameraConnected {
            camera: CameraIdentity::High,
            peer,
        });
        sink.handle(ServerEvent::CameraDisconnected {
            camera: CameraIdentity::High,
        });
        sink.handle(ServerEvent::CameraConnected {
            camera: CameraIdentity::High,
            peer,
        });
        let stats = sink.finish().unwrap();
        assert_eq!(stats.camera(CameraIdentity::High).unwrap().connections, 2);
    }

    #[tokio::test]
    async fn sink_runs_on_a_blocking_thread_until_closed() {
        let (tx, rx) = mpsc::channel(4);
        let worker = tokio::task::spawn_blocking(move || FrameSink::new(None).run(rx));

        tx.send(SinkInput::Event(received(CameraIdentity::High, real_jpeg(8, 8))))
            .await
            .unwrap();
        tx.send(SinkInput::Report(Instant::now())).await.unwrap();
        tx.send(SinkInput::Event(received(CameraIdentity::High, EncodedFrame::from(vec![0]))))
            .await
            .unwrap();
        drop(tx);

        let stats = worker.await.unwrap().unwrap();
        let cam = stats.camera(CameraIdentity::High).unwrap();
        assert_eq!(cam.frames, 1);
        assert_eq!(cam.decode_failures, 1);
    }
}
