//! Outlier rejection and similarity fitting for point correspondences.

use reelstab_model::Transform;

use super::flow::Track;

/// Deviations within this many pixels of the median are always kept.
const MIN_INLIER_RADIUS: f64 = 2.0;

/// Scales the median absolute deviation to a standard deviation.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Inliers lie within this many sigmas of the median.
const INLIER_SIGMAS: f64 = 3.0;

/// Keep tracks whose displacement is close to the median displacement.
pub fn reject_outliers(tracks: &[Track]) -> Vec<Track> {
    if tracks.len() < 3 {
        return tracks.to_vec();
    }

    let disp: Vec<(f64, f64)> = tracks
        .iter()
        .map(|t| {
            let (dx, dy) = t.displacement();
            (dx as f64, dy as f64)
        })
        .collect();

    let mdx = median(disp.iter().map(|d| d.0).collect());
    let mdy = median(disp.iter().map(|d| d.1).collect());
    let deviation: Vec<f64> = disp
        .iter()
        .map(|(dx, dy)| ((dx - mdx).powi(2) + (dy - mdy).powi(2)).sqrt())
        .collect();

    let limit = (median(deviation.clone()) * MAD_TO_SIGMA * INLIER_SIGMAS).max(MIN_INLIER_RADIUS);

    tracks
        .iter()
        .zip(&deviation)
        .filter(|(_, &d)| d <= limit)
        .map(|(t, _)| *t)
        .collect()
}

/// Least-squares similarity transform mapping `from` onto `to`.
///
/// Returns `None` for fewer than two pairs or when all source points coincide.
pub fn fit_similarity(pairs: &[((f64, f64), (f64, f64))]) -> Option<Transform> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let (mut sx, mut sy, mut tx, mut ty) = (0.0, 0.0, 0.0, 0.0);
    for ((fx, fy), (gx, gy)) in pairs {
        sx += fx;
        sy += fy;
        tx += gx;
        ty += gy;
    }
    let (sx, sy, tx, ty) = (sx / n, sy / n, tx / n, ty / n);

    // Centered closed form: to = [a -b; b a] from + t.
    let (mut num_a, mut num_b, mut denom) = (0.0, 0.0, 0.0);
    for ((fx, fy), (gx, gy)) in pairs {
        let (px, py) = (fx - sx, fy - sy);
        let (qx, qy) = (gx - tx, gy - ty);
        num_a += px * qx + py * qy;
        num_b += px * qy - py * qx;
        denom += px * px + py * py;
    }
    if denom <= f64::EPSILON {
        return None;
    }

    let a = num_a / denom;
    let b = num_b / denom;
    let scale = (a * a + b * b).sqrt();
    let angle = b.atan2(a);
    let dx = tx - (a * sx - b * sy);
    let dy = ty - (b * sx + a * sy);

    let fitted = Transform::new(dx, dy, angle, scale);
    (!fitted.is_singular()).then_some(fitted)
}

/// Fit, drop pairs with large reprojection error, and fit again.
pub fn fit_similarity_robust(
    pairs: &[((f64, f64), (f64, f64))],
    min_pairs: usize,
) -> Option<(Transform, usize)> {
    let first = fit_similarity(pairs)?;

    let errors: Vec<f64> = pairs
        .iter()
        .map(|&((fx, fy), (gx, gy))| {
            let (px, py) = first.apply(fx, fy);
            ((px - gx).powi(2) + (py - gy).powi(2)).sqrt()
        })
        .collect();
    let limit = (median(errors.clone()) * INLIER_SIGMAS).max(MIN_INLIER_RADIUS / 2.0);

    let inliers: Vec<_> = pairs
        .iter()
        .zip(&errors)
        .filter(|(_, &e)| e <= limit)
        .map(|(p, _)| *p)
        .collect();

    if inliers.len() < min_pairs.max(2) || inliers.len() == pairs.len() {
        return Some((first, pairs.len()));
    }
    let refined = fit_similarity(&inliers)?;
    Some((refined, inliers.len()))
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) * 0.5
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_points() -> Vec<(f64, f64)> {
        (0..5)
            .flat_map(|i| (0..4).map(move |j| (20.0 + i as f64 * 30.0, 15.0 + j as f64 * 25.0)))
            .collect()
    }

    fn track(from: (f64, f64), to: (f64, f64)) -> Track {
        Track {
            from: (from.0 as f32, from.1 as f32),
            to: (to.0 as f32, to.1 as f32),
            residual: 0.0,
        }
    }

    #[test]
    fn test_recovers_exact_similarity() {
        let truth = Transform::new(4.0, -1.5, 0.05, 1.02);
        let pairs: Vec<_> = grid_points()
            .into_iter()
            .map(|p| (p, truth.apply(p.0, p.1)))
            .collect();

        let fitted = fit_similarity(&pairs).unwrap();
        assert!((fitted.dx - truth.dx).abs() < 1e-9);
        assert!((fitted.dy - truth.dy).abs() < 1e-9);
        assert!((fitted.angle - truth.angle).abs() < 1e-12);
        assert!((fitted.scale - truth.scale).abs() < 1e-12);
    }

    #[test]
    fn test_coincident_points_do_not_fit() {
        let pairs = vec![((5.0, 5.0), (6.0, 6.0)), ((5.0, 5.0), (7.0, 7.0))];
        assert!(fit_similarity(&pairs).is_none());
        assert!(fit_similarity(&pairs[..1]).is_none());
    }

    #[test]
    fn test_median_outlier_is_rejected() {
        let mut tracks: Vec<Track> = grid_points()
            .into_iter()
            .map(|p| track(p, (p.0 + 2.0, p.1 + 1.0)))
            .collect();
        tracks.push(track((50.0, 50.0), (90.0, 10.0)));

        let kept = reject_outliers(&tracks);
        assert_eq!(kept.len(), tracks.len() - 1);
        assert!(kept.iter().all(|t| (t.displacement().0 - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_robust_fit_ignores_bad_pair() {
        let truth = Transform::translation(3.0, 2.0);
        let mut pairs: Vec<_> = grid_points()
            .into_iter()
            .map(|p| (p, truth.apply(p.0, p.1)))
            .collect();
        pairs.push(((60.0, 60.0), (75.0, 40.0)));

        let (fitted, used) = fit_similarity_robust(&pairs, 4).unwrap();
        assert_eq!(used, pairs.len() - 1);
        assert!((fitted.dx - 3.0).abs() < 1e-9 && (fitted.dy - 2.0).abs() < 1e-9);
        assert!(fitted.angle.abs() < 1e-12);
    }
}
