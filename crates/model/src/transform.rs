//! Similarity transforms.
//!
//! A [`Transform`] maps a point `p` to `scale * R(angle) * p + (dx, dy)`.
//! Between two adjacent frames it is the motion estimate: where content
//! at `p` in frame `i - 1` appears in frame `i`.

use nalgebra::{Matrix3, Rotation2, Vector2};
use serde::{Deserialize, Serialize};

/// Scales at or below this are treated as singular.
pub const MIN_SCALE: f64 = 1e-6;

/// Translation, rotation (radians), and uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Horizontal translation in pixels.
    pub dx: f64,
    /// Vertical translation in pixels.
    pub dy: f64,
    /// Counter-clockwise rotation in radians (clockwise on screen, y down).
    ///
    /// Kept unwrapped so cumulative trajectories stay continuous.
    pub angle: f64,
    /// Uniform scale factor.
    pub scale: f64,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Transform = Transform {
        dx: 0.0,
        dy: 0.0,
        angle: 0.0,
        scale: 1.0,
    };

    pub fn new(dx: f64, dy: f64, angle: f64, scale: f64) -> Self {
        Self {
            dx,
            dy,
            angle,
            scale,
        }
    }

    /// Pure translation.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            ..Self::IDENTITY
        }
    }

    /// Whether every component is within `eps` of the identity.
    pub fn is_identity(&self, eps: f64) -> bool {
        self.dx.abs() <= eps
            && self.dy.abs() <= eps
            && self.angle.abs() <= eps
            && (self.scale - 1.0).abs() <= eps
    }

    /// A transform that cannot be inverted (non-finite or vanishing scale).
    pub fn is_singular(&self) -> bool {
        !(self.dx.is_finite()
            && self.dy.is_finite()
            && self.angle.is_finite()
            && self.scale.is_finite())
            || self.scale.abs() <= MIN_SCALE
    }

    /// Map a point through this transform.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.linear() * Vector2::new(x, y);
        (p.x + self.dx, p.y + self.dy)
    }

    /// Apply `self` first, then `next`.
    ///
    /// Angles add without wrapping, so a trajectory built with `then`
    /// accumulates rotation continuously.
    pub fn then(&self, next: &Transform) -> Transform {
        let t = next.linear() * Vector2::new(self.dx, self.dy);
        Transform {
            dx: t.x + next.dx,
            dy: t.y + next.dy,
            angle: self.angle + next.angle,
            scale: self.scale * next.scale,
        }
    }

    /// The inverse transform, or `None` when singular.
    pub fn inverse(&self) -> Option<Transform> {
        if self.is_singular() {
            return None;
        }
        let inv_scale = 1.0 / self.scale;
        let t = Rotation2::new(-self.angle) * Vector2::new(self.dx, self.dy) * inv_scale;
        Some(Transform {
            dx: -t.x,
            dy: -t.y,
            angle: -self.angle,
            scale: inv_scale,
        })
    }

    /// Homogeneous 3x3 matrix.
    pub fn matrix(&self) -> Matrix3<f64> {
        let l = self.linear();
        Matrix3::new(
            l[(0, 0)],
            l[(0, 1)],
            self.dx,
            l[(1, 0)],
            l[(1, 1)],
            self.dy,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Components as independent scalar channels: `[dx, dy, angle, scale]`.
    pub fn to_components(&self) -> [f64; 4] {
        [self.dx, self.dy, self.angle, self.scale]
    }

    pub fn from_components(c: [f64; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    fn linear(&self) -> nalgebra::Matrix2<f64> {
        Rotation2::new(self.angle).into_inner() * self.scale
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identity_apply() {
        let (x, y) = Transform::IDENTITY.apply(12.5, -3.0);
        assert_eq!((x, y), (12.5, -3.0));
        assert!(Transform::IDENTITY.is_identity(0.0));
    }

    #[test]
    fn test_then_applies_in_order() {
        let rotate = Transform::new(0.0, 0.0, std::f64::consts::FRAC_PI_2, 1.0);
        let shift = Transform::translation(10.0, 0.0);

        // Rotate (1, 0) to (0, 1), then shift to (10, 1).
        let (x, y) = rotate.then(&shift).apply(1.0, 0.0);
        assert!(approx(x, 10.0) && approx(y, 1.0), "({x}, {y})");

        // Shift (1, 0) to (11, 0), then rotate to (0, 11).
        let (x, y) = shift.then(&rotate).apply(1.0, 0.0);
        assert!(approx(x, 0.0) && approx(y, 11.0), "({x}, {y})");
    }

    #[test]
    fn test_matrix_matches_apply() {
        let t = Transform::new(3.0, -2.0, 0.3, 1.1);
        let m = t.matrix();
        let p = m * nalgebra::Vector3::new(4.0, 5.0, 1.0);
        let (x, y) = t.apply(4.0, 5.0);
        assert!(approx(p.x, x) && approx(p.y, y));
    }

    #[test]
    fn test_singular_has_no_inverse() {
        assert!(Transform::new(0.0, 0.0, 0.0, 0.0).inverse().is_none());
        assert!(Transform::new(f64::NAN, 0.0, 0.0, 1.0).inverse().is_none());
        assert!(Transform::new(1.0, 2.0, 0.1, 0.9).inverse().is_some());
    }

    #[test]
    fn test_angles_accumulate_unwrapped() {
        let quarter = Transform::new(0.0, 0.0, std::f64::consts::FRAC_PI_2, 1.0);
        let mut acc = Transform::IDENTITY;
        for _ in 0..5 {
            acc = acc.then(&quarter);
        }
        assert!(approx(acc.angle, 5.0 * std::f64::consts::FRAC_PI_2));
    }

    proptest! {
        #[test]
        fn prop_inverse_round_trips_points(
            dx in -50.0f64..50.0,
            dy in -50.0f64..50.0,
            angle in -0.5f64..0.5,
            scale in 0.5f64..2.0,
            px in -100.0f64..100.0,
            py in -100.0f64..100.0,
        ) {
            let t = Transform::new(dx, dy, angle, scale);
            let inv = t.inverse().unwrap();
            let (x, y) = t.apply(px, py);
            let (bx, by) = inv.apply(x, y);
            prop_assert!((bx - px).abs() < 1e-6 && (by - py).abs() < 1e-6);

            let composed = t.then(&inv);
            prop_assert!(composed.is_identity(1e-9));
        }
    }
}
