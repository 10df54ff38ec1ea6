//! Viewer descriptor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sample::{frame_file_name, FRAME_EXTENSION};

/// Everything the viewer page needs to reference the sampled frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerDescriptor {
    /// Final number of sampled frames.
    pub count: u64,
    /// Directory holding the frames, as referenced from the page.
    pub base_dir: PathBuf,
    /// Frame file prefix.
    pub prefix: String,
}

impl ViewerDescriptor {
    pub fn new(count: u64, base_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            count,
            base_dir: base_dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Reel image pattern, with `##` standing for the frame index.
    pub fn pattern(&self) -> String {
        format!(
            "{}/{}_frame##.{FRAME_EXTENSION}",
            self.base_dir_str(),
            self.prefix
        )
    }

    /// Path of frame 1, shown as the static preview. `None` when nothing was sampled.
    pub fn preview_path(&self) -> Option<String> {
        (self.count >= 1)
            .then(|| format!("{}/{}", self.base_dir_str(), frame_file_name(&self.prefix, 1)))
    }

    /// Range covering frames 2 through `count` for sequential display.
    ///
    /// Together with the preview this covers `1..=count`. `None` below two frames.
    pub fn range(&self) -> Option<String> {
        (self.count >= 2).then(|| format!("02..{}", self.count))
    }

    /// `pattern|range`, the value of the reel's `data-images` attribute.
    pub fn images_attribute(&self) -> Option<String> {
        self.range().map(|range| format!("{}|{range}", self.pattern()))
    }

    fn base_dir_str(&self) -> String {
        self.base_dir
            .to_string_lossy()
            .replace('\\', "/")
            .trim_end_matches('/')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_covers_second_through_last() {
        let desc = ViewerDescriptor::new(10, "/data/reel_images", "rep_stable_video");
        assert_eq!(desc.range().as_deref(), Some("02..10"));
        assert_eq!(
            desc.preview_path().as_deref(),
            Some("/data/reel_images/rep_stable_video_frame01.jpg")
        );
        assert_eq!(
            desc.images_attribute().as_deref(),
            Some("/data/reel_images/rep_stable_video_frame##.jpg|02..10")
        );
    }

    #[test]
    fn test_single_frame_has_preview_only() {
        let desc = ViewerDescriptor::new(1, "reel_images/", "clip");
        assert_eq!(desc.range(), None);
        assert_eq!(
            desc.preview_path().as_deref(),
            Some("reel_images/clip_frame01.jpg")
        );
    }

    #[test]
    fn test_empty_descriptor() {
        let desc = ViewerDescriptor::new(0, "reel_images", "clip");
        assert_eq!(desc.preview_path(), None);
        assert_eq!(desc.images_attribute(), None);
    }

    #[test]
    fn test_windows_separators_normalized() {
        let desc = ViewerDescriptor::new(3, r"C:\work\reel_images", "clip");
        assert_eq!(desc.pattern(), "C:/work/reel_images/clip_frame##.jpg");
    }
}
