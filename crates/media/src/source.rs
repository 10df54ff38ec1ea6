//! Frame sources.
//!
//! Stabilization reads the input twice, so inputs hand out fresh
//! [`FrameSource`]s on demand instead of being streams themselves.

use image::RgbImage;
use reelstab_common::{FrameClock, StabError, StabResult};
use reelstab_model::{Frame, VideoInfo};

/// A sequential stream of decoded frames.
pub trait FrameSource {
    /// The next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> StabResult<Option<Frame>>;
}

/// A video that can be probed and decoded from the start any number of times.
pub trait VideoInput {
    /// Human-readable origin, used in logs and the run manifest.
    fn describe(&self) -> String;

    fn info(&self) -> StabResult<VideoInfo>;

    /// Start a new decode from the first frame.
    fn open(&self) -> StabResult<Box<dyn FrameSource + '_>>;
}

/// Frames held in memory, for synthetic input and tests.
#[derive(Debug, Clone)]
pub struct InMemoryClip {
    frames: Vec<RgbImage>,
    fps: f64,
}

impl InMemoryClip {
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        Self { frames, fps }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl VideoInput for InMemoryClip {
    fn describe(&self) -> String {
        format!("<memory: {} frames @ {} fps>", self.frames.len(), self.fps)
    }

    fn info(&self) -> StabResult<VideoInfo> {
        let first = self
            .frames
            .first()
            .ok_or_else(|| StabError::input_unavailable(self.describe(), "clip has no frames"))?;
        Ok(VideoInfo {
            width: first.width(),
            height: first.height(),
            fps: self.fps,
            frame_count: Some(self.frames.len() as u64),
        })
    }

    fn open(&self) -> StabResult<Box<dyn FrameSource + '_>> {
        Ok(Box::new(MemorySource {
            frames: &self.frames,
            clock: FrameClock::new(self.fps),
            position: 0,
        }))
    }
}

struct MemorySource<'a> {
    frames: &'a [RgbImage],
    clock: FrameClock,
    position: usize,
}

impl FrameSource for MemorySource<'_> {
    fn next_frame(&mut self) -> StabResult<Option<Frame>> {
        let Some(image) = self.frames.get(self.position) else {
            return Ok(None);
        };
        let index = self.position as u64;
        self.position += 1;
        Ok(Some(Frame::new(index, self.clock.timestamp(index), image.clone())))
    }
}
