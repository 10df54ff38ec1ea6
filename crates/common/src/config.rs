//! Application configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{StabError, StabResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Motion estimation, smoothing, and warping parameters.
    pub stabilization: StabilizationConfig,

    /// Where and how sampled frames and the viewer page are written.
    pub output: OutputConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Rule for filling pixels revealed by a corrective warp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderPolicy {
    /// Extend edge pixels into the revealed region.
    #[default]
    Replicate,
    /// Mirror edge content.
    Reflect,
    /// Fill with black.
    Black,
    /// Shrink the output canvas to the region valid for every frame.
    Crop,
}

impl BorderPolicy {
    pub const ALL: [BorderPolicy; 4] = [Self::Replicate, Self::Reflect, Self::Black, Self::Crop];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replicate => "replicate",
            Self::Reflect => "reflect",
            Self::Black => "black",
            Self::Crop => "crop",
        }
    }
}

impl fmt::Display for BorderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BorderPolicy {
    type Err = StabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                StabError::config(format!(
                    "Unknown border policy: {s}. Use: replicate, reflect, black, crop"
                ))
            })
    }
}

/// Stabilization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationConfig {
    /// Border fill policy for warped frames.
    pub border: BorderPolicy,

    /// Moving-average radius (frames on each side) for trajectory smoothing.
    pub smoothing_radius: usize,

    /// Fewer surviving correspondences than this yields the identity estimate.
    pub min_correspondences: usize,

    /// Corner detection tuning.
    pub features: FeatureConfig,

    /// Pyramidal Lucas-Kanade tuning.
    pub flow: FlowConfig,
}

/// Good-features-to-track parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Upper bound on detected corners per frame.
    pub max_corners: usize,

    /// Minimum corner response relative to the strongest corner.
    pub quality_level: f64,

    /// Minimum spacing between accepted corners, in pixels.
    pub min_distance: f64,
}

/// Optical flow parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Side length of the square integration window (odd).
    pub window_size: usize,

    /// Number of pyramid levels, including full resolution.
    pub pyramid_levels: usize,

    /// Iteration cap per pyramid level.
    pub max_iterations: usize,

    /// Stop iterating once the update is smaller than this (pixels).
    pub epsilon: f32,

    /// Tracks whose mean absolute window residual exceeds this are dropped.
    pub max_residual: f32,

    /// Minimum normalized eigenvalue of the window's structure tensor.
    pub min_eigen_threshold: f32,
}

/// Output artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving sampled frames.
    pub dir: PathBuf,

    /// Frame file prefix; files are named `<prefix>_frame<NN>.jpg`.
    pub frame_prefix: String,

    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,

    /// Viewer page path. `None` skips the page.
    pub viewer_page: Option<PathBuf>,

    /// Display width of the viewer image.
    pub viewer_width: u32,

    /// Display height of the viewer image.
    pub viewer_height: u32,

    /// Also encode the full stabilized clip here when set.
    pub stabilized_video: Option<PathBuf>,

    /// Stale frame indices past the final count that are removed after a run.
    pub cleanup_lookahead: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelstab_core=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            border: BorderPolicy::Replicate,
            smoothing_radius: 30,
            min_correspondences: 10,
            features: FeatureConfig::default(),
            flow: FlowConfig::default(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_corners: 200,
            quality_level: 0.01,
            min_distance: 30.0,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window_size: 21,
            pyramid_levels: 3,
            max_iterations: 30,
            epsilon: 0.01,
            max_residual: 20.0,
            min_eigen_threshold: 1e-4,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("reel_images"),
            frame_prefix: "rep_stable_video".to_string(),
            jpeg_quality: 90,
            viewer_page: Some(PathBuf::from("index.html")),
            viewer_width: 960,
            viewer_height: 540,
            stabilized_video: None,
            cleanup_lookahead: 99,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// `debug` when verbose, `info` otherwise.
    pub fn for_verbosity(verbose: bool) -> Self {
        Self {
            level: if verbose { "debug" } else { "info" }.to_string(),
            ..Self::default()
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %config_path.display(), error = %e, "Ignoring unusable config");
                }
            }
        }
        Self::default()
    }

    /// Load and validate an explicit config file.
    pub fn load_from(path: &Path) -> StabResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StabError::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> StabResult<()> {
        let stab = &self.stabilization;
        if stab.smoothing_radius == 0 {
            return Err(StabError::config("smoothing_radius must be a positive integer"));
        }
        if stab.min_correspondences == 0 {
            return Err(StabError::config("min_correspondences must be at least 1"));
        }
        if stab.flow.window_size < 3 || stab.flow.window_size % 2 == 0 {
            return Err(StabError::config("flow.window_size must be odd and at least 3"));
        }
        if stab.flow.pyramid_levels == 0 {
            return Err(StabError::config("flow.pyramid_levels must be at least 1"));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(StabError::config("jpeg_quality must be within 1..=100"));
        }
        if self.output.frame_prefix.is_empty() {
            return Err(StabError::config("frame_prefix must not be empty"));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelstab").join("config.json")
}
