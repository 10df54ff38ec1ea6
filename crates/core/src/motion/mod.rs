//! Inter-frame motion estimation.
//!
//! For each adjacent frame pair: detect corners in the previous frame,
//! follow them into the current frame with pyramidal Lucas-Kanade, drop
//! unreliable tracks and displacement outliers, then fit the dominant
//! similarity transform. Too few surviving correspondences is reported as
//! [`StabError::DegenerateMotionEstimate`]; [`MotionTracker`] turns that into
//! the identity transform and keeps going.

pub mod features;
pub mod fit;
pub mod flow;

use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use reelstab_common::{StabError, StabResult, StabilizationConfig};
use reelstab_model::Transform;

use self::features::good_features_to_track;
use self::fit::{fit_similarity_robust, reject_outliers};
use self::flow::{LucasKanade, Pyramid};

/// Noise prefilter applied before corner detection and tracking.
const PREFILTER_SIGMA: f32 = 1.0;

/// Fitted inter-frame scale changes beyond this factor are implausible.
const MAX_SCALE_CHANGE: f64 = 2.0;

/// A grayscale frame with its blurred pyramid, reusable as either side of a pair.
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    base: GrayImage,
    pyramid: Pyramid,
}

impl PreparedFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        self.base.dimensions()
    }
}

/// Estimates the camera motion between two consecutive frames.
#[derive(Debug, Clone)]
pub struct MotionEstimator {
    config: StabilizationConfig,
}

impl MotionEstimator {
    pub fn new(config: StabilizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StabilizationConfig {
        &self.config
    }

    /// Blur and build the pyramid once per frame.
    pub fn prepare(&self, gray: &GrayImage) -> PreparedFrame {
        let base = gaussian_blur_f32(gray, PREFILTER_SIGMA);
        let pyramid = Pyramid::build(&base, self.config.flow.pyramid_levels);
        PreparedFrame { base, pyramid }
    }

    /// Motion from `prev` to `curr`; `frame_index` is the position of `curr`.
    pub fn estimate(
        &self,
        prev: &PreparedFrame,
        curr: &PreparedFrame,
        frame_index: u64,
    ) -> StabResult<Transform> {
        if prev.dimensions() != curr.dimensions() {
            return Err(StabError::decode(
                "motion",
                frame_index,
                format!(
                    "frame size changed from {:?} to {:?}",
                    prev.dimensions(),
                    curr.dimensions()
                ),
            ));
        }

        let required = self.config.min_correspondences;
        let degenerate = |tracked: usize| StabError::DegenerateMotionEstimate {
            frame_index,
            tracked,
            required,
        };

        let corners = good_features_to_track(&prev.base, &self.config.features);
        if corners.len() < required {
            return Err(degenerate(corners.len()));
        }

        let points: Vec<(f32, f32)> = corners.iter().map(|c| (c.x, c.y)).collect();
        let tracks = LucasKanade::new(&self.config.flow).track(&prev.pyramid, &curr.pyramid, &points);
        let inliers = reject_outliers(&tracks);
        tracing::trace!(
            frame = frame_index,
            corners = corners.len(),
            tracked = tracks.len(),
            inliers = inliers.len(),
            "Motion correspondences"
        );
        if inliers.len() < required {
            return Err(degenerate(inliers.len()));
        }

        let pairs: Vec<_> = inliers
            .iter()
            .map(|t| {
                (
                    (t.from.0 as f64, t.from.1 as f64),
                    (t.to.0 as f64, t.to.1 as f64),
                )
            })
            .collect();

        match fit_similarity_robust(&pairs, required) {
            Some((transform, used))
                if used >= required
                    && (1.0 / MAX_SCALE_CHANGE..=MAX_SCALE_CHANGE).contains(&transform.scale) =>
            {
                Ok(transform)
            }
            Some((_, used)) => Err(degenerate(used)),
            None => Err(degenerate(0)),
        }
    }

    /// Convenience for two raw grayscale frames.
    pub fn estimate_pair(
        &self,
        prev: &GrayImage,
        curr: &GrayImage,
        frame_index: u64,
    ) -> StabResult<Transform> {
        self.estimate(&self.prepare(prev), &self.prepare(curr), frame_index)
    }
}

/// Streams frames through a [`MotionEstimator`], one estimate per frame.
///
/// Frame 0 always gets the identity. Degenerate pairs are logged and
/// replaced by the identity; other errors propagate.
#[derive(Debug)]
pub struct MotionTracker {
    estimator: MotionEstimator,
    previous: Option<PreparedFrame>,
    position: u64,
    degenerate: Vec<u64>,
}

impl MotionTracker {
    pub fn new(estimator: MotionEstimator) -> Self {
        Self {
            estimator,
            previous: None,
            position: 0,
            degenerate: Vec::new(),
        }
    }

    /// Motion estimate for the next frame in stream order.
    pub fn push(&mut self, gray: &GrayImage) -> StabResult<Transform> {
        let index = self.position;
        let current = self.estimator.prepare(gray);

        let estimate = match self.previous.take() {
            None => Transform::IDENTITY,
            Some(prev) => match self.estimator.estimate(&prev, &current, index) {
                Ok(t) => t,
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(frame = index, error = %err, "Using identity motion");
                    self.degenerate.push(index);
                    Transform::IDENTITY
                }
                Err(err) => return Err(err),
            },
        };

        self.previous = Some(current);
        self.position += 1;
        Ok(estimate)
    }

    /// Frames pushed so far.
    pub fn frames_seen(&self) -> u64 {
        self.position
    }

    /// Positions whose estimate fell back to the identity.
    pub fn degenerate_frames(&self) -> &[u64] {
        &self.degenerate
    }
}

/// Motion estimates for a whole in-memory clip.
pub fn estimate_clip(estimator: MotionEstimator, frames: &[GrayImage]) -> StabResult<Vec<Transform>> {
    let mut tracker = MotionTracker::new(estimator);
    frames.iter().map(|f| tracker.push(f)).collect()
}
