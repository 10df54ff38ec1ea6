//! Shi-Tomasi corner detection ("good features to track").

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use reelstab_common::FeatureConfig;

/// Pixels this close to the border are never reported as corners.
const BORDER_MARGIN: u32 = 3;

/// A trackable point and its corner response (minimum structure-tensor eigenvalue).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub x: f32,
    pub y: f32,
    pub response: f32,
}

/// Detect up to `config.max_corners` corners, strongest first.
///
/// A candidate must be a 3x3 local maximum, reach `quality_level` times the
/// strongest response, and lie at least `min_distance` from every stronger
/// accepted corner. A flat image yields no corners.
pub fn good_features_to_track(image: &GrayImage, config: &FeatureConfig) -> Vec<Corner> {
    let (width, height) = image.dimensions();
    if width <= 2 * BORDER_MARGIN || height <= 2 * BORDER_MARGIN || config.max_corners == 0 {
        return Vec::new();
    }

    let response = min_eigen_response(image);
    let w = width as usize;
    let at = |x: u32, y: u32| response[y as usize * w + x as usize];

    let max_response = response.iter().copied().fold(0.0f32, f32::max);
    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = (max_response as f64 * config.quality_level) as f32;

    let mut candidates = Vec::new();
    for y in BORDER_MARGIN..height - BORDER_MARGIN {
        for x in BORDER_MARGIN..width - BORDER_MARGIN {
            let r = at(x, y);
            if r <= 0.0 || r < threshold {
                continue;
            }
            let is_peak = (y - 1..=y + 1)
                .all(|ny| (x - 1..=x + 1).all(|nx| at(nx, ny) <= r));
            if is_peak {
                candidates.push(Corner {
                    x: x as f32,
                    y: y as f32,
                    response: r,
                });
            }
        }
    }

    candidates.sort_by(|a, b| b.response.total_cmp(&a.response));
    enforce_min_distance(candidates, config, width, height)
}

/// Per-pixel minimum eigenvalue of the 3x3 summed structure tensor.
fn min_eigen_response(image: &GrayImage) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);

    let mut ixx = vec![0.0f32; w * h];
    let mut iyy = vec![0.0f32; w * h];
    let mut ixy = vec![0.0f32; w * h];
    for (i, (dx, dy)) in gx.as_raw().iter().zip(gy.as_raw()).enumerate() {
        let (dx, dy) = (*dx as f32, *dy as f32);
        ixx[i] = dx * dx;
        iyy[i] = dy * dy;
        ixy[i] = dx * dy;
    }

    let mut response = vec![0.0f32; w * h];
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
            for ny in y - 1..=y + 1 {
                let row = ny * w;
                for nx in x - 1..=x + 1 {
                    a += ixx[row + nx];
                    b += ixy[row + nx];
                    c += iyy[row + nx];
                }
            }
            let half_trace = (a + c) * 0.5;
            let root = (((a - c) * 0.5).powi(2) + b * b).sqrt();
            response[y * w + x] = half_trace - root;
        }
    }
    response
}

/// Greedy spacing filter over strongest-first candidates, bucketed on a grid.
fn enforce_min_distance(
    candidates: Vec<Corner>,
    config: &FeatureConfig,
    width: u32,
    height: u32,
) -> Vec<Corner> {
    let min_distance = config.min_distance.max(0.0) as f32;
    if min_distance < 1.0 {
        return candidates.into_iter().take(config.max_corners).collect();
    }

    let cell = min_distance;
    let grid_w = (width as f32 / cell).ceil() as usize + 1;
    let grid_h = (height as f32 / cell).ceil() as usize + 1;
    let mut grid: Vec<Vec<Corner>> = vec![Vec::new(); grid_w * grid_h];
    let min_dist_sq = min_distance * min_distance;

    let mut accepted = Vec::new();
    for corner in candidates {
        if accepted.len() >= config.max_corners {
            break;
        }
        let cx = (corner.x / cell) as usize;
        let cy = (corner.y / cell) as usize;

        let too_close = (cy.saturating_sub(1)..=(cy + 1).min(grid_h - 1)).any(|gy| {
            (cx.saturating_sub(1)..=(cx + 1).min(grid_w - 1)).any(|gx| {
                grid[gy * grid_w + gx].iter().any(|other| {
                    let dx = corner.x - other.x;
                    let dy = corner.y - other.y;
                    dx * dx + dy * dy < min_dist_sq
                })
            })
        });

        if !too_close {
            grid[cy * grid_w + cx].push(corner);
            accepted.push(corner);
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn quadrant_image() -> GrayImage {
        GrayImage::from_fn(40, 40, |x, y| {
            let bright = (x < 20) == (y < 20);
            Luma([if bright { 220 } else { 30 }])
        })
    }

    fn config(max_corners: usize, quality_level: f64, min_distance: f64) -> FeatureConfig {
        FeatureConfig {
            max_corners,
            quality_level,
            min_distance,
        }
    }

    #[test]
    fn test_flat_image_has_no_corners() {
        let img = GrayImage::from_pixel(40, 40, Luma([128]));
        assert!(good_features_to_track(&img, &FeatureConfig::default()).is_empty());
    }

    #[test]
    fn test_checker_center_is_detected() {
        let corners = good_features_to_track(&quadrant_image(), &config(10, 0.1, 5.0));
        assert!(!corners.is_empty());
        let best = corners[0];
        assert!((best.x - 20.0).abs() <= 2.0 && (best.y - 20.0).abs() <= 2.0, "{best:?}");
    }

    #[test]
    fn test_max_corners_respected() {
        let img = GrayImage::from_fn(64, 64, |x, y| {
            Luma([if (x / 8 + y / 8) % 2 == 0 { 200 } else { 40 }])
        });
        let corners = good_features_to_track(&img, &config(3, 0.01, 2.0));
        assert!(corners.len() <= 3);
    }

    #[test]
    fn test_min_distance_respected() {
        let img = GrayImage::from_fn(64, 64, |x, y| {
            Luma([if (x / 8 + y / 8) % 2 == 0 { 200 } else { 40 }])
        });
        let corners = good_features_to_track(&img, &config(100, 0.01, 10.0));
        assert!(corners.len() > 1);
        for (i, a) in corners.iter().enumerate() {
            for b in &corners[i + 1..] {
                let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
                assert!(d >= 10.0, "{a:?} {b:?}");
            }
        }
    }

    #[test]
    fn test_sorted_strongest_first() {
        let img = GrayImage::from_fn(64, 64, |x, y| {
            Luma([if (x / 8 + y / 8) % 2 == 0 { 200 } else { 40 }])
        });
        let corners = good_features_to_track(&img, &config(50, 0.01, 4.0));
        assert!(corners.windows(2).all(|w| w[0].response >= w[1].response));
    }
}
