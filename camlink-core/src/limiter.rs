//! Frame cadence throttle.
//!
//! A plain last-accepted-timestamp gate, not a leaky bucket: a burst
//! faster than the interval yields exactly one frame per interval and
//! everything else is discarded by the caller.

use std::time::{Duration, Instant};

/// Default target cadence in frames per second.
pub const DEFAULT_TARGET_FPS: u32 = 30;

// ── RateLimiter ──────────────────────────────────────────────────

/// Drops frames so accepted frames are at least `interval` apart.
///
/// One instance per camera. The timestamp is plain instance state
/// mutated only from the capture context; sharing a limiter across
/// threads needs external locking.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_accepted: Option<Instant>,
    accepted: u64,
    rejected: u64,
}

impl RateLimiter {
    /// Limiter targeting `target_fps` (clamped to at least 1).
    ///
    /// The interval is `1000 ms / target_fps` in whole milliseconds,
    /// so 30 fps gives 33 ms.
    pub fn new(target_fps: u32) -> Self {
        let fps = target_fps.max(1) as u64;
        Self::with_interval(Duration::from_millis(1000 / fps))
    }

    /// Limiter with an explicit minimum spacing between frames.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Decide whether a frame arriving at `now` is forwarded.
    ///
    /// Returns `true` and records `now` iff at least `interval` has
    /// elapsed since the last accepted frame. The first frame is always
    /// accepted. A rejected call leaves the timestamp untouched.
    pub fn accept(&mut self, now: Instant) -> bool {
        let due = match self.last_accepted {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };

        if due {
            self.last_accepted = Some(now);
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
        due
    }

    /// Minimum spacing between accepted frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Timestamp of the most recently accepted frame.
    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }

    /// Forget the last accepted timestamp; the next frame passes.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_FPS)
    }
}

// ── Tests ────────────────────────────────────────────────────────
