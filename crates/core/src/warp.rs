//! Frame warping.
//!
//! Each output pixel `q` samples the source frame at `corrective⁻¹(q)` with
//! bilinear interpolation. Samples that land outside the frame are filled
//! according to the [`BorderPolicy`].

use image::{ImageBuffer, Pixel, Rgb, RgbImage};
use reelstab_common::{BorderPolicy, StabError};
use reelstab_model::Transform;

/// Output rectangle, in source-frame coordinates, used by the crop policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A warped frame.
#[derive(Debug, Clone)]
pub struct Warped<P: Pixel<Subpixel = u8>> {
    pub image: ImageBuffer<P, Vec<u8>>,
    /// The corrective transform was singular and the identity was used instead.
    pub singular: bool,
}

/// How out-of-frame coordinates are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Replicate,
    Reflect,
    Constant,
}

/// Applies corrective transforms to the frames of one clip.
#[derive(Debug, Clone)]
pub struct FrameWarper {
    policy: BorderPolicy,
    width: u32,
    height: u32,
    crop: Option<CropWindow>,
}

impl FrameWarper {
    /// A warper for `width x height` frames without a crop window.
    ///
    /// Under [`BorderPolicy::Crop`] this produces full-size frames with
    /// replicated borders; use [`FrameWarper::for_clip`] to get the window.
    pub fn new(policy: BorderPolicy, width: u32, height: u32) -> Self {
        Self {
            policy,
            width,
            height,
            crop: None,
        }
    }

    /// A warper for a whole clip. Under the crop policy, the output canvas is
    /// the largest centered rectangle that stays inside the source frame
    /// under every corrective transform.
    pub fn for_clip(policy: BorderPolicy, width: u32, height: u32, correctives: &[Transform]) -> Self {
        let mut warper = Self::new(policy, width, height);
        if policy == BorderPolicy::Crop {
            warper.crop = crop_window(width, height, correctives);
            match warper.crop {
                Some(w) => tracing::debug!(
                    x = w.x,
                    y = w.y,
                    width = w.width,
                    height = w.height,
                    "Crop window"
                ),
                None => tracing::warn!("No crop window fits every frame; replicating borders"),
            }
        }
        warper
    }

    pub fn policy(&self) -> BorderPolicy {
        self.policy
    }

    pub fn crop_window(&self) -> Option<CropWindow> {
        self.crop
    }

    /// Dimensions of every frame this warper produces.
    pub fn output_dimensions(&self) -> (u32, u32) {
        match self.crop {
            Some(w) => (w.width, w.height),
            None => (self.width, self.height),
        }
    }

    /// Warp one RGB frame.
    pub fn warp(&self, frame: &RgbImage, corrective: &Transform, frame_index: u64) -> Warped<Rgb<u8>> {
        self.warp_image(frame, corrective, frame_index)
    }

    /// Warp any 8-bit image. A singular corrective is replaced by the identity.
    pub fn warp_image<P: Pixel<Subpixel = u8>>(
        &self,
        frame: &ImageBuffer<P, Vec<u8>>,
        corrective: &Transform,
        frame_index: u64,
    ) -> Warped<P> {
        let (inverse, singular) = match corrective.inverse() {
            Some(inv) => (inv, false),
            None => {
                let err = StabError::SingularTransform { frame_index };
                tracing::warn!(frame = frame_index, error = %err, "Using identity correction");
                (Transform::IDENTITY, true)
            }
        };

        let (origin, (out_w, out_h)) = match self.crop {
            Some(w) => ((w.x, w.y), (w.width, w.height)),
            None => ((0, 0), frame.dimensions()),
        };

        let image = if origin == (0, 0) && inverse == Transform::IDENTITY {
            frame.clone()
        } else {
            remap(frame, &inverse, origin, out_w, out_h, self.edge())
        };

        Warped { image, singular }
    }

    fn edge(&self) -> Edge {
        match self.policy {
            BorderPolicy::Replicate | BorderPolicy::Crop => Edge::Replicate,
            BorderPolicy::Reflect => Edge::Reflect,
            BorderPolicy::Black => Edge::Constant,
        }
    }
}

/// Inverse-map every output pixel into `src`.
fn remap<P: Pixel<Subpixel = u8>>(
    src: &ImageBuffer<P, Vec<u8>>,
    inverse: &Transform,
    origin: (u32, u32),
    out_w: u32,
    out_h: u32,
    edge: Edge,
) -> ImageBuffer<P, Vec<u8>> {
    let channels = P::CHANNEL_COUNT as usize;
    let (src_w, src_h) = (src.width() as usize, src.height() as usize);
    let raw = src.as_raw();

    let m = inverse.matrix();
    let (a, b, tx) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
    let (c, d, ty) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);

    let mut dst: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(out_w, out_h);
    if out_w == 0 || out_h == 0 {
        return dst;
    }
    let mut samples = [0usize; 4];
    let mut present = [false; 4];

    for (oy, row) in dst.chunks_mut(out_w as usize * channels).enumerate() {
        let y = (oy as u32 + origin.1) as f64;
        for (ox, out) in row.chunks_mut(channels).enumerate() {
            let x = (ox as u32 + origin.0) as f64;
            let sx = a * x + b * y + tx;
            let sy = c * x + d * y + ty;

            let x0 = sx.floor();
            let y0 = sy.floor();
            let fx = (sx - x0) as f32;
            let fy = (sy - y0) as f32;
            let (x0, y0) = (x0 as isize, y0 as isize);

            let corners = [(x0, y0), (x0 + 1, y0), (x0, y0 + 1), (x0 + 1, y0 + 1)];
            for (k, &(cx, cy)) in corners.iter().enumerate() {
                match (map_coord(cx, src_w, edge), map_coord(cy, src_h, edge)) {
                    (Some(ix), Some(iy)) => {
                        samples[k] = (iy * src_w + ix) * channels;
                        present[k] = true;
                    }
                    _ => present[k] = false,
                }
            }

            for (ch, value) in out.iter_mut().enumerate() {
                let v = |k: usize| {
                    if present[k] {
                        raw[samples[k] + ch] as f32
                    } else {
                        0.0
                    }
                };
                let top = v(0) * (1.0 - fx) + v(1) * fx;
                let bottom = v(2) * (1.0 - fx) + v(3) * fx;
                let blended = top * (1.0 - fy) + bottom * fy;
                *value = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    dst
}

fn map_coord(coord: isize, len: usize, edge: Edge) -> Option<usize> {
    let n = len as isize;
    if n <= 0 {
        return None;
    }
    match edge {
        Edge::Constant => (0..n).contains(&coord).then_some(coord as usize),
        Edge::Replicate => Some(coord.clamp(0, n - 1) as usize),
        Edge::Reflect => {
            if n == 1 {
                return Some(0);
            }
            let period = 2 * n;
            let mut c = coord.rem_euclid(period);
            if c >= n {
                c = period - c - 1;
            }
            Some(c as usize)
        }
    }
}

/// Largest centered window, keeping the frame's aspect ratio, whose corners
/// stay inside the source under every corrective transform.
fn crop_window(width: u32, height: u32, correctives: &[Transform]) -> Option<CropWindow> {
    if width < 2 || height < 2 {
        return None;
    }

    let inverses: Vec<Transform> = correctives
        .iter()
        .map(|t| t.inverse().unwrap_or(Transform::IDENTITY))
        .collect();
    let (max_x, max_y) = ((width - 1) as f64, (height - 1) as f64);
    let inside = |(x, y): (f64, f64)| {
        const SLACK: f64 = 1e-9;
        x >= -SLACK && y >= -SLACK && x <= max_x + SLACK && y <= max_y + SLACK
    };

    for mx in 0..width / 2 {
        let my = ((mx as u64 * height as u64) / width as u64) as u32;
        if 2 * my >= height {
            break;
        }
        let (x0, y0) = (mx as f64, my as f64);
        let (x1, y1) = (max_x - mx as f64, max_y - my as f64);
        let corners = [(x0, y0), (x1, y0), (x0, y1), (x1, y1)];
        let fits = inverses
            .iter()
            .all(|inv| corners.iter().all(|&(x, y)| inside(inv.apply(x, y))));
        if fits {
            return Some(CropWindow {
                x: mx,
                y: my,
                width: width - 2 * mx,
                height: height - 2 * my,
            });
        }
    }
    None
}
