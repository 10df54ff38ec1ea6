//! Run manifest written next to the sampled frames.

use std::path::{Path, PathBuf};

use reelstab_common::{BorderPolicy, StabResult};
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Summary of one stabilization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub input: String,
    pub created_at: String,
    pub width: u32,
    pub height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub fps: f64,
    pub frame_count: u64,
    pub sampled: u64,
    pub frames: Vec<String>,
    pub border: BorderPolicy,
    pub smoothing_radius: usize,
    pub degenerate_pairs: Vec<u64>,
    pub singular_frames: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_page: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stabilized_video: Option<PathBuf>,
}

impl RunManifest {
    /// Timestamp for `created_at`.
    pub fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    pub fn save(&self, dir: &Path) -> StabResult<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "Wrote run manifest");
        Ok(path)
    }

    pub fn load(dir: &Path) -> StabResult<Self> {
        let content = std::fs::read_to_string(dir.join(MANIFEST_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }
}
