//! Synthetic frame source.
//!
//! Stands in for the camera device: renders a moving colour-bar pattern
//! into one reused RGBA buffer at the native capture cadence and lends
//! each frame to a callback. The borrow ends when the callback returns,
//! after which the buffer is overwritten by the next frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use camlink_core::RawFrame;

const BARS: [[u8; 3]; 8] = [
    [0xFF, 0xFF, 0xFF],
    [0xFF, 0xFF, 0x00],
    [0x00, 0xFF, 0xFF],
    [0x00, 0xFF, 0x00],
    [0xFF, 0x00, 0xFF],
    [0xFF, 0x00, 0x00],
    [0x00, 0x00, 0xFF],
    [0x10, 0x10, 0x10],
];

// ── TestPatternSource ────────────────────────────────────────────

/// Colour bars scrolling one column per frame.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    interval: Duration,
    buffer: Vec<u8>,
    frame_number: u64,
}

impl TestPatternSource {
    /// Source producing `width`×`height` frames at `fps` (at least 1).
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            interval: Duration::from_secs(1) / fps.max(1),
            buffer: vec![0; width as usize * height as usize * 4],
            frame_number: 0,
        }
    }

    /// Render the next frame and lend it out.
    pub fn next_frame(&mut self) -> RawFrame<'_> {
        self.render();
        self.frame_number += 1;
        RawFrame::new(self.width, self.height, &self.buffer)
    }

    /// Frames produced so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Produce frames at the native cadence until `running` is cleared
    /// or `max_frames` have been delivered. Blocks the calling thread.
    pub fn run<F>(&mut self, running: &Arc<AtomicBool>, max_frames: Option<u64>, mut on_frame: F)
    where
        F: FnMut(&RawFrame<'_>, Instant),
    {
        let mut next_deadline = Instant::now();
        while running.load(Ordering::SeqCst) {
            if max_frames.is_some_and(|max| self.frame_number >= max) {
                break;
            }

            let captured_at = Instant::now();
            let frame = self.next_frame();
            on_frame(&frame, captured_at);

            next_deadline += self.interval;
            let now = Instant::now();
            if next_deadline > now {
                std::thread::sleep(next_deadline - now);
            } else {
                // Fell behind; don't try to catch up with a burst.
                next_deadline = now;
            }
        }
    }

    fn render(&mut self) {
        let width = self.width as usize;
        if width == 0 {
            return;
        }
        let bar_width = (width / BARS.len()).max(1);
        let shift = self.frame_number as usize % width;

        for (i, px) in self.buffer.chunks_exact_mut(4).enumerate() {
            let x = (i % width + shift) % width;
            let [r, g, b] = BARS[(x / bar_width).min(BARS.len() - 1)];
            px.copy_from_slice(&[r, g, b, 0xFF]);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_have_full_rgba_buffer() {
        let mut src = TestPatternSource::new(16, 8, 30);
        let frame = src.next_frame();
        assert_eq!(frame.width, 16);
        assert_eq!(frame.height, 8);
        assert_eq!(frame.data.len(), 16 * 8 * 4);
        assert_eq!(&frame.data[..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn pattern_scrolls() {
        let mut src = TestPatternSource::new(16, 1, 30);
        let first = src.next_frame().data.to_vec();
        let second = src.next_frame().data.to_vec();
        assert_ne!(first, second);
        assert_eq!(src.frame_number(), 2);
    }

    #[test]
    fn run_stops_after_max_frames() {
        let mut src = TestPatternSource::new(4, 4, 1000);
        let running = Arc::new(AtomicBool::new(true));
        let mut seen = 0;
        src.run(&running, Some(5), |frame, _| {
            assert_eq!(frame.data.len(), 64);
            seen += 1;
        });
        assert_eq!(seen, 5);
    }

    #[test]
    fn run_respects_stop_flag() {
        let mut src = TestPatternSource::new(4, 4, 1000);
        let running = Arc::new(AtomicBool::new(false));
        let mut seen = 0;
        src.run(&running, None, |_, _| seen += 1);
        assert_eq!(seen, 0);
    }
}
