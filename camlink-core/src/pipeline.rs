//! Frame source glue: rate limit, encode, submit.
//!
//! [`CapturePipeline::on_frame`] is what a frame source calls from its
//! per-frame callback. It runs synchronously on the capture thread and
//! returns before the borrowed buffer is released.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::frame::RawFrame;
use crate::limiter::RateLimiter;
use crate::network::session::{Session, Submit};

// ── FrameOutcome ─────────────────────────────────────────────────

/// What the pipeline did with one captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Arrived too soon after the previous accepted frame.
    Throttled,
    /// Encoded and queued for the writer lane.
    Submitted,
    /// Session not connected.
    Inactive,
    /// Writer lane backed up.
    QueueFull,
    /// Encoding failed.
    Dropped,
}

/// Running counters, one per [`FrameOutcome`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_seen: u64,
    pub throttled: u64,
    pub submitted: u64,
    pub inactive: u64,
    pub queue_full: u64,
    pub encode_failures: u64,
}

// ── CapturePipeline ──────────────────────────────────────────────

/// Rate limiter plus session, driven by the capture callback.
pub struct CapturePipeline {
    limiter: RateLimiter,
    session: Arc<Session>,
    stats: PipelineStats,
}

impl CapturePipeline {
    pub fn new(session: Arc<Session>, limiter: RateLimiter) -> Self {
        Self {
            limiter,
            session,
            stats: PipelineStats::default(),
        }
    }

    /// Handle one captured frame that arrived at `now`.
    pub fn on_frame(&mut self, frame: &RawFrame<'_>, now: Instant) -> FrameOutcome {
        self.stats.frames_seen += 1;

        if !self.limiter.accept(now) {
            self.stats.throttled += 1;
            return FrameOutcome::Throttled;
        }

        match self.session.submit(frame) {
            Ok(Submit::Queued) => {
                self.stats.submitted += 1;
                FrameOutcome::Submitted
            }
            Ok(Submit::Inactive) => {
                self.stats.inactive += 1;
                FrameOutcome::Inactive
            }
            Ok(Submit::QueueFull) => {
                self.stats.queue_full += 1;
                FrameOutcome::QueueFull
            }
            Err(e) => {
                debug!("frame dropped: {e}");
                self.stats.encode_failures += 1;
                FrameOutcome::Dropped
            }
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

// ── Tests ────────────────────────────────────────────────────────
