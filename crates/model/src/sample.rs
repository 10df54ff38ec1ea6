//! Sampled frames and their file naming.

use std::time::Duration;

use image::RgbImage;

/// Extension of sampled frame files.
pub const FRAME_EXTENSION: &str = "jpg";

/// File name for the sampled frame with 1-based `sequence`.
///
/// Indices below 10 are zero-padded to two digits; 10 and above are written
/// as-is, so `frame100` follows `frame99`. Viewers relying on the `##`
/// pattern depend on this exact scheme.
pub fn frame_file_name(prefix: &str, sequence: u64) -> String {
    format!("{prefix}_frame{sequence:02}.{FRAME_EXTENSION}")
}

/// A stabilized frame chosen at a one-second boundary.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// 1-based position in the output sequence.
    pub sequence: u64,
    /// 0-based position of the frame in the input stream.
    pub source_index: u64,
    /// Timestamp of the source frame.
    pub timestamp: Duration,
    /// File name inside the output directory.
    pub file_name: String,
    /// Stabilized pixels.
    pub image: RgbImage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_switches_at_ten() {
        assert_eq!(frame_file_name("clip", 1), "clip_frame01.jpg");
        assert_eq!(frame_file_name("clip", 9), "clip_frame09.jpg");
        assert_eq!(frame_file_name("clip", 10), "clip_frame10.jpg");
        assert_eq!(frame_file_name("clip", 123), "clip_frame123.jpg");
    }
}
