//! Decoded video frames.

use std::time::Duration;

use image::{GrayImage, RgbImage};

/// One picture from the input stream.
///
/// Immutable once created; pipeline stages borrow it and produce new frames
/// rather than editing pixels in place.
#[derive(Debug, Clone)]
pub struct Frame {
    index: u64,
    timestamp: Duration,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, timestamp: Duration, image: RgbImage) -> Self {
        Self {
            index,
            timestamp,
            image,
        }
    }

    /// 0-based position in the input stream.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Presentation time derived from the stream's frame rate.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Luma plane used for motion estimation.
    pub fn to_gray(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }

    /// Same position and timestamp, new pixels.
    pub fn with_image(&self, image: RgbImage) -> Frame {
        Frame {
            index: self.index,
            timestamp: self.timestamp,
            image,
        }
    }
}

/// Width, height, and rate of a video stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second; may be fractional (e.g. 29.97).
    pub fps: f64,
    /// Frame count reported by the container, when known.
    pub frame_count: Option<u64>,
}
