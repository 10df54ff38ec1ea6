//! Trajectory accumulation and smoothing.
//!
//! The raw trajectory composes per-frame motion estimates in order. The
//! smoothed trajectory is a symmetric moving average of each component
//! (dx, dy, angle, scale) taken independently; near either end the window
//! shrinks to what is available on both sides.

use reelstab_model::{Trajectory, Transform};

/// Smooths camera trajectories with a moving average of fixed radius.
#[derive(Debug, Clone, Copy)]
pub struct TrajectorySmoother {
    radius: usize,
}

impl TrajectorySmoother {
    /// `radius` frames on each side. Zero disables smoothing.
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Cumulative trajectory: `T[0] = M[0]`, `T[i] = T[i-1].then(M[i])`.
    ///
    /// `M[0]` is the identity for any estimator output, so `T[0]` is too.
    pub fn accumulate(&self, estimates: &[Transform]) -> Trajectory {
        let mut current = Transform::IDENTITY;
        estimates
            .iter()
            .map(|m| {
                current = current.then(m);
                current
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// Moving average of each component over `[i - w, i + w]`, where
    /// `w = min(radius, i, n - 1 - i)`.
    pub fn smooth(&self, trajectory: &Trajectory) -> Trajectory {
        let n = trajectory.len();
        if n == 0 || self.radius == 0 {
            return trajectory.clone();
        }

        let channels: [Vec<f64>; 4] = std::array::from_fn(|c| trajectory.channel(c));

        (0..n)
            .map(|i| {
                let w = self.radius.min(i).min(n - 1 - i);
                let window = (i - w)..(i + w + 1);
                Transform::from_components(std::array::from_fn(|c| {
                    centered_mean(&channels[c][window.clone()], channels[c][i])
                }))
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// Raw trajectory, smoothed trajectory, and the per-frame correction.
    pub fn process(&self, estimates: &[Transform]) -> SmoothedPath {
        let raw = self.accumulate(estimates);
        let smoothed = self.smooth(&raw);
        let corrective = corrective_transforms(&raw, &smoothed);
        SmoothedPath {
            raw,
            smoothed,
            corrective,
        }
    }
}

/// Output of [`TrajectorySmoother::process`].
#[derive(Debug, Clone)]
pub struct SmoothedPath {
    pub raw: Trajectory,
    pub smoothed: Trajectory,
    pub corrective: Vec<Transform>,
}

/// Transform taking raw frame `i` to its smoothed position:
/// undo the raw trajectory, then apply the smoothed one.
///
/// A non-invertible raw transform yields a singular result, which the
/// warper replaces with the identity.
pub fn corrective(raw: &Transform, smoothed: &Transform) -> Transform {
    match raw.inverse() {
        Some(inv) => inv.then(smoothed),
        None => Transform::new(0.0, 0.0, 0.0, 0.0),
    }
}

pub fn corrective_transforms(raw: &Trajectory, smoothed: &Trajectory) -> Vec<Transform> {
    raw.iter()
        .zip(smoothed.iter())
        .map(|(r, s)| corrective(r, s))
        .collect()
}

/// Mean of `values` computed as offsets from `center`, so a window of
/// equal values returns `center` exactly.
fn centered_mean(values: &[f64], center: f64) -> f64 {
    let offset: f64 = values.iter().map(|v| v - center).sum();
    center + offset / values.len() as f64
}
