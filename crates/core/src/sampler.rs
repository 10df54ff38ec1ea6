//! One-per-second frame sampling.
//!
//! The sampler counts frames as they arrive (0-based, independent of any
//! index the frame carries) and picks every position that is a multiple of
//! `floor(fps)`. Picked frames get consecutive 1-based sequence numbers and
//! their output file names.

use reelstab_common::FrameClock;
use reelstab_model::{frame_file_name, Frame, SampledFrame};

/// Counts reported once the stream has ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerSummary {
    pub frames_seen: u64,
    pub sampled: u64,
    /// Selected frames dropped because the expected count was already reached.
    pub discarded: u64,
}

#[derive(Debug, Clone)]
pub struct FrameSampler {
    clock: FrameClock,
    prefix: String,
    expected: Option<u64>,
    position: u64,
    sampled: u64,
    discarded: u64,
}

impl FrameSampler {
    pub fn new(clock: FrameClock, prefix: impl Into<String>) -> Self {
        Self {
            clock,
            prefix: prefix.into(),
            expected: None,
            position: 0,
            sampled: 0,
            discarded: 0,
        }
    }

    /// Cap output at `floor(frame_count / step)` samples.
    ///
    /// Selection alone yields one frame per started second; the cap drops
    /// the trailing partial second and anything a re-decode over-produces.
    pub fn with_frame_count(mut self, frame_count: u64) -> Self {
        self.expected = Some(self.clock.expected_samples(frame_count));
        self
    }

    pub fn expected(&self) -> Option<u64> {
        self.expected
    }

    pub fn sampled_count(&self) -> u64 {
        self.sampled
    }

    /// Consume the next frame of the stream, returning it if selected.
    pub fn offer(&mut self, frame: Frame) -> Option<SampledFrame> {
        let position = self.position;
        self.position += 1;

        if !self.clock.is_sample_position(position) {
            return None;
        }
        if self.expected.is_some_and(|n| self.sampled >= n) {
            self.discarded += 1;
            tracing::debug!(position, expected = self.expected, "Discarding surplus sample");
            return None;
        }

        self.sampled += 1;
        let sequence = self.sampled;
        Some(SampledFrame {
            sequence,
            source_index: frame.index(),
            timestamp: frame.timestamp(),
            file_name: frame_file_name(&self.prefix, sequence),
            image: frame.into_image(),
        })
    }

    pub fn finish(self) -> SamplerSummary {
        tracing::debug!(
            frames = self.position,
            sampled = self.sampled,
            discarded = self.discarded,
            "Sampling finished"
        );
        SamplerSummary {
            frames_seen: self.position,
            sampled: self.sampled,
            discarded: self.discarded,
        }
    }
}

/// Run a whole in-memory stream through `sampler`.
pub fn sample_stream(
    mut sampler: FrameSampler,
    frames: impl IntoIterator<Item = Frame>,
) -> (Vec<SampledFrame>, SamplerSummary) {
    let picked = frames.into_iter().filter_map(|f| sampler.offer(f)).collect();
    (picked, sampler.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use proptest::prelude::*;

    fn stream(count: u64, clock: FrameClock) -> impl Iterator<Item = Frame> {
        (0..count).map(move |i| Frame::new(i, clock.timestamp(i), RgbImage::new(1, 1)))
    }

    #[test]
    fn test_one_per_second_at_thirty_fps() {
        let clock = FrameClock::new(30.0);
        let (picked, summary) = sample_stream(FrameSampler::new(clock, "clip"), stream(95, clock));
        let sources: Vec<u64> = picked.iter().map(|s| s.source_index).collect();
        assert_eq!(sources, vec![0, 30, 60, 90]);
        assert_eq!(summary.sampled, 4);
        assert_eq!(summary.frames_seen, 95);
        assert_eq!(picked[3].timestamp.as_secs(), 3);
    }

    #[test]
    fn test_fractional_rate_uses_floor() {
        let clock = FrameClock::new(29.97);
        let (picked, _) = sample_stream(FrameSampler::new(clock, "clip"), stream(60, clock));
        let sources: Vec<u64> = picked.iter().map(|s| s.source_index).collect();
        assert_eq!(sources, vec![0, 29, 58]);
    }

    #[test]
    fn test_names_follow_sequence() {
        let clock = FrameClock::new(1.0);
        let (picked, _) = sample_stream(FrameSampler::new(clock, "reel"), stream(11, clock));
        assert_eq!(picked[0].file_name, "reel_frame01.jpg");
        assert_eq!(picked[8].file_name, "reel_frame09.jpg");
        assert_eq!(picked[9].file_name, "reel_frame10.jpg");
        assert_eq!(picked[10].sequence, 11);
    }

    #[test]
    fn test_surplus_frames_are_discarded() {
        let clock = FrameClock::new(10.0);
        let sampler = FrameSampler::new(clock, "clip").with_frame_count(100);
        assert_eq!(sampler.expected(), Some(10));
        let (picked, summary) = sample_stream(sampler, stream(125, clock));
        assert_eq!(picked.len(), 10);
        assert_eq!(summary.discarded, 3);
        assert_eq!(picked.last().map(|s| s.sequence), Some(10));
    }

    #[test]
    fn test_trailing_partial_second_is_dropped() {
        let clock = FrameClock::new(30.0);
        let sampler = FrameSampler::new(clock, "clip").with_frame_count(95);
        let (picked, summary) = sample_stream(sampler, stream(95, clock));
        assert_eq!(picked.len(), 3);
        assert_eq!(summary.discarded, 1);
    }

    #[test]
    fn test_position_ignores_frame_index() {
        let clock = FrameClock::new(2.0);
        let mut sampler = FrameSampler::new(clock, "clip");
        let odd = |i| Frame::new(i, clock.timestamp(i), RgbImage::new(1, 1));
        assert!(sampler.offer(odd(7)).is_some());
        assert!(sampler.offer(odd(8)).is_none());
        assert_eq!(sampler.offer(odd(3)).map(|s| s.source_index), Some(3));
    }

    #[test]
    fn test_empty_stream() {
        let clock = FrameClock::new(24.0);
        let (picked, summary) = sample_stream(FrameSampler::new(clock, "clip"), stream(0, clock));
        assert!(picked.is_empty());
        assert_eq!(summary, SamplerSummary::default());
    }

    proptest! {
        #[test]
        fn prop_sample_count_is_floor_of_frames_over_step(frames in 0u64..400, fps in 1.0f64..75.0) {
            let clock = FrameClock::new(fps);
            let step = fps.floor() as u64;
            let sampler = FrameSampler::new(clock, "p").with_frame_count(frames);
            let (picked, summary) = sample_stream(sampler, stream(frames, clock));
            prop_assert_eq!(picked.len() as u64, frames / step);
            prop_assert_eq!(summary.discarded, u64::from(frames % step != 0));
            let sequences: Vec<u64> = picked.iter().map(|s| s.sequence).collect();
            let expected: Vec<u64> = (1..=frames / step).collect();
            prop_assert_eq!(sequences, expected);
        }
    }
}
