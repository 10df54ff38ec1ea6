//! Pyramidal Lucas-Kanade sparse optical flow.

use image::imageops::{self, FilterType};
use image::GrayImage;
use nalgebra::{Matrix2, Vector2};
use reelstab_common::FlowConfig;

/// Coarsest level is never smaller than this on either side.
const MIN_LEVEL_SIZE: u32 = 16;

/// Single-channel float plane with bilinear lookup and clamped borders.
#[derive(Debug, Clone)]
struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    fn from_gray(img: &GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    fn at(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.data[y * self.width + x]
    }

    fn bilinear(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as isize, y0 as isize);

        let top = self.at(x0, y0) * (1.0 - fx) + self.at(x0 + 1, y0) * fx;
        let bottom = self.at(x0, y0 + 1) * (1.0 - fx) + self.at(x0 + 1, y0 + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Central-difference gradients.
    fn gradients(&self) -> (Plane, Plane) {
        let mut gx = vec![0.0f32; self.data.len()];
        let mut gy = vec![0.0f32; self.data.len()];
        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                let i = y as usize * self.width + x as usize;
                gx[i] = (self.at(x + 1, y) - self.at(x - 1, y)) * 0.5;
                gy[i] = (self.at(x, y + 1) - self.at(x, y - 1)) * 0.5;
            }
        }
        let plane = |data| Plane {
            width: self.width,
            height: self.height,
            data,
        };
        (plane(gx), plane(gy))
    }

    fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x <= (self.width - 1) as f32 && y <= (self.height - 1) as f32
    }
}

/// One pyramid level with precomputed gradients.
#[derive(Debug, Clone)]
struct Level {
    image: Plane,
    grad_x: Plane,
    grad_y: Plane,
}

/// Image pyramid, finest level first.
#[derive(Debug, Clone)]
pub struct Pyramid {
    levels: Vec<Level>,
}

impl Pyramid {
    /// Build up to `levels` levels by repeated 2x downsampling.
    pub fn build(image: &GrayImage, levels: usize) -> Self {
        let mut built = Vec::with_capacity(levels.max(1));
        let mut current = image.clone();
        loop {
            let plane = Plane::from_gray(&current);
            let (grad_x, grad_y) = plane.gradients();
            built.push(Level {
                image: plane,
                grad_x,
                grad_y,
            });

            let (w, h) = (current.width() / 2, current.height() / 2);
            if built.len() >= levels || w < MIN_LEVEL_SIZE || h < MIN_LEVEL_SIZE {
                break;
            }
            current = imageops::resize(&current, w, h, FilterType::Triangle);
        }
        Self { levels: built }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        let base = &self.levels[0].image;
        (base.width, base.height)
    }
}

/// A feature followed from the previous frame into the current one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Track {
    pub from: (f32, f32),
    pub to: (f32, f32),
    /// Mean absolute intensity difference over the window at full resolution.
    pub residual: f32,
}

impl Track {
    pub fn displacement(&self) -> (f32, f32) {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// Pyramidal Lucas-Kanade tracker.
pub struct LucasKanade<'a> {
    config: &'a FlowConfig,
}

impl<'a> LucasKanade<'a> {
    pub fn new(config: &'a FlowConfig) -> Self {
        Self { config }
    }

    /// Follow `points` from `prev` into `next`.
    ///
    /// Points that leave the frame, sit in a window without enough texture,
    /// or end with a residual above `max_residual` are dropped.
    pub fn track(&self, prev: &Pyramid, next: &Pyramid, points: &[(f32, f32)]) -> Vec<Track> {
        points
            .iter()
            .filter_map(|&p| self.track_point(prev, next, p))
            .filter(|t| t.residual <= self.config.max_residual)
            .collect()
    }

    fn track_point(&self, prev: &Pyramid, next: &Pyramid, point: (f32, f32)) -> Option<Track> {
        let depth = prev.depth().min(next.depth());
        let half = (self.config.window_size / 2) as isize;
        let area = ((2 * half + 1) * (2 * half + 1)) as f32;

        let mut guess = Vector2::<f32>::zeros();
        let mut flow = Vector2::<f32>::zeros();

        for level in (0..depth).rev() {
            let scale = (1u32 << level) as f32;
            let p = Vector2::new(point.0 / scale, point.1 / scale);
            let pl = &prev.levels[level];
            let nl = &next.levels[level];

            // Window samples of the previous frame are fixed across iterations.
            let mut window = Vec::with_capacity(area as usize);
            let mut g = Matrix2::<f32>::zeros();
            for dy in -half..=half {
                for dx in -half..=half {
                    let (sx, sy) = (p.x + dx as f32, p.y + dy as f32);
                    let ix = pl.grad_x.bilinear(sx, sy);
                    let iy = pl.grad_y.bilinear(sx, sy);
                    g[(0, 0)] += ix * ix;
                    g[(0, 1)] += ix * iy;
                    g[(1, 1)] += iy * iy;
                    window.push((sx, sy, pl.image.bilinear(sx, sy), ix, iy));
                }
            }
            g[(1, 0)] = g[(0, 1)];

            let half_trace = (g[(0, 0)] + g[(1, 1)]) * 0.5;
            let root = (((g[(0, 0)] - g[(1, 1)]) * 0.5).powi(2) + g[(0, 1)].powi(2)).sqrt();
            if (half_trace - root) / area < self.config.min_eigen_threshold {
                return None;
            }
            let g_inv = g.try_inverse()?;

            let mut v = Vector2::<f32>::zeros();
            for _ in 0..self.config.max_iterations {
                let mut b = Vector2::<f32>::zeros();
                for &(sx, sy, i, ix, iy) in &window {
                    let j = nl.image.bilinear(sx + guess.x + v.x, sy + guess.y + v.y);
                    let diff = i - j;
                    b.x += diff * ix;
                    b.y += diff * iy;
                }
                let eta = g_inv * b;
                v += eta;
                if !v.x.is_finite() || !v.y.is_finite() {
                    return None;
                }
                if eta.norm() < self.config.epsilon {
                    break;
                }
            }

            if level > 0 {
                guess = (guess + v) * 2.0;
            } else {
                flow = guess + v;
            }
        }

        let to = (point.0 + flow.x, point.1 + flow.y);
        let base = &next.levels[0].image;
        if !base.contains(to.0, to.1) {
            return None;
        }

        let residual = self.residual(prev, next, point, to);
        Some(Track {
            from: point,
            to,
            residual,
        })
    }

    fn residual(&self, prev: &Pyramid, next: &Pyramid, from: (f32, f32), to: (f32, f32)) -> f32 {
        let half = (self.config.window_size / 2) as isize;
        let (pi, ni) = (&prev.levels[0].image, &next.levels[0].image);
        let mut total = 0.0f32;
        let mut count = 0usize;
        for dy in -half..=half {
            for dx in -half..=half {
                let (ox, oy) = (dx as f32, dy as f32);
                total += (pi.bilinear(from.0 + ox, from.1 + oy) - ni.bilinear(to.0 + ox, to.1 + oy))
                    .abs();
                count += 1;
            }
        }
        total / count as f32
    }
}
