//! Frame timing utilities.
//!
//! Every frame position in a clip maps to a timestamp through the stream's
//! frame rate. Sampling one frame per second uses the integer step
//! `floor(fps)`, so a 29.97 fps stream samples every 29th frame.

use std::time::Duration;

/// Timing for a constant-frame-rate stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    /// Create a clock for the given frame rate.
    ///
    /// Non-finite or non-positive rates are treated as 1 fps.
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 1.0 };
        Self { fps }
    }

    /// Frames per second.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Timestamp of the frame at `position` (0-based).
    pub fn timestamp(&self, position: u64) -> Duration {
        Duration::from_secs_f64(position as f64 / self.fps)
    }

    /// Frames between sampled frames. Never zero.
    pub fn sample_step(&self) -> u64 {
        (self.fps.floor() as u64).max(1)
    }

    /// Whether `position` sits on a whole-second sampling boundary.
    pub fn is_sample_position(&self, position: u64) -> bool {
        position % self.sample_step() == 0
    }

    /// Number of sampled frames a clip of `frame_count` frames yields.
    pub fn expected_samples(&self, frame_count: u64) -> u64 {
        frame_count / self.sample_step()
    }
}

/// Parse an ffprobe-style rational rate such as `30000/1001` or `25`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
