use image::{GrayImage, Luma, Rgb, RgbImage};
use reelstab_common::{BorderPolicy, FeatureConfig, FrameClock, StabilizationConfig};
use reelstab_core::{
    sample_stream, FrameSampler, FrameWarper, MotionEstimator, MotionTracker, TrajectorySmoother,
};
use reelstab_model::{Frame, Transform};

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;
const FPS: f64 = 10.0;
const FRAMES: usize = 100;

/// Static scene evaluated at continuous coordinates, so sub-pixel camera
/// offsets need no resampling.
fn scene(x: f64, y: f64) -> f64 {
    128.0
        + 45.0 * (x / 5.0).sin() * (y / 7.0).cos()
        + 35.0 * ((x + 2.0 * y) / 13.0).sin()
        + 25.0 * (x / 17.0 - y / 11.0).cos()
}

fn camera_frame(offset: (f64, f64)) -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let v = scene(x as f64 + offset.0, y as f64 + offset.1).clamp(0.0, 255.0) as u8;
        Rgb([v, v, v])
    })
}

fn gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| Luma([image.get_pixel(x, y)[0]]))
}

fn variance(values: &[f64]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

fn step_variance(channel: &[f64]) -> f64 {
    let steps: Vec<f64> = channel.windows(2).map(|w| w[1] - w[0]).collect();
    variance(&steps)
}

fn config() -> StabilizationConfig {
    StabilizationConfig {
        smoothing_radius: 10,
        features: FeatureConfig {
            min_distance: 12.0,
            ..FeatureConfig::default()
        },
        ..StabilizationConfig::default()
    }
}

#[test]
fn jittered_static_clip_stabilizes_and_samples_ten_frames() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let offsets: Vec<(f64, f64)> = (0..FRAMES)
        .map(|_| (rng.f64() * 6.0 - 3.0, rng.f64() * 6.0 - 3.0))
        .collect();
    let frames: Vec<RgbImage> = offsets.iter().map(|&o| camera_frame(o)).collect();

    // Pass 1: motion.
    let config = config();
    let mut tracker = MotionTracker::new(MotionEstimator::new(config.clone()));
    let estimates: Vec<Transform> = frames
        .iter()
        .map(|f| tracker.push(&gray(f)))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(estimates[0], Transform::IDENTITY);
    assert!(
        tracker.degenerate_frames().len() < 5,
        "too many degenerate pairs: {:?}",
        tracker.degenerate_frames()
    );

    // Estimated inter-frame motion follows the injected jitter.
    for i in 1..FRAMES {
        let expected_dx = offsets[i - 1].0 - offsets[i].0;
        if !tracker.degenerate_frames().contains(&(i as u64)) {
            assert!((estimates[i].dx - expected_dx).abs() < 0.75, "frame {i}: {:?}", estimates[i]);
        }
    }

    let path = TrajectorySmoother::new(config.smoothing_radius).process(&estimates);
    assert_eq!(path.smoothed.len(), FRAMES);

    for channel in [0, 1] {
        let raw = step_variance(&path.raw.channel(channel));
        let smoothed = step_variance(&path.smoothed.channel(channel));
        assert!(smoothed < 0.5, "channel {channel}: smoothed step variance {smoothed}");
        assert!(smoothed * 8.0 < raw, "channel {channel}: {smoothed} vs raw {raw}");
    }

    // Pass 2: warp and sample.
    let warper = FrameWarper::for_clip(BorderPolicy::Replicate, WIDTH, HEIGHT, &path.corrective);
    let clock = FrameClock::new(FPS);
    let stabilized = frames.iter().zip(&path.corrective).enumerate().map(|(i, (f, c))| {
        let warped = warper.warp(f, c, i as u64);
        assert!(!warped.singular);
        Frame::new(i as u64, clock.timestamp(i as u64), warped.image)
    });
    let sampler = FrameSampler::new(clock, "rep_stable_video").with_frame_count(FRAMES as u64);
    let (sampled, summary) = sample_stream(sampler, stabilized);

    assert_eq!(summary.sampled, 10);
    let names: Vec<&str> = sampled.iter().map(|s| s.file_name.as_str()).collect();
    assert_eq!(names[0], "rep_stable_video_frame01.jpg");
    assert_eq!(names[8], "rep_stable_video_frame09.jpg");
    assert_eq!(names[9], "rep_stable_video_frame10.jpg");
    let sources: Vec<u64> = sampled.iter().map(|s| s.source_index).collect();
    assert_eq!(sources, (0..10).map(|k| k * 10).collect::<Vec<_>>());
    assert!(sampled.iter().all(|s| s.image.dimensions() == (WIDTH, HEIGHT)));
}

#[test]
fn featureless_clip_falls_back_to_identity() {
    let flat = GrayImage::from_pixel(64, 48, Luma([90]));
    let mut tracker = MotionTracker::new(MotionEstimator::new(config()));
    for _ in 0..4 {
        assert_eq!(tracker.push(&flat).unwrap(), Transform::IDENTITY);
    }
    assert_eq!(tracker.degenerate_frames(), &[1, 2, 3]);
}
