//! Two-pass stabilization pipeline.
//!
//! Pass 1 decodes every frame and estimates motion. Smoothing needs the
//! whole trajectory, so warping and sampling happen in pass 2 over a fresh
//! decode of the same input.

use std::path::PathBuf;
use std::time::Instant;

use reelstab_common::{
    AppConfig, FrameClock, OutputConfig, StabError, StabResult, StabilizationConfig,
};
use reelstab_core::{
    CropWindow, FrameSampler, FrameWarper, MotionEstimator, MotionTracker, TrajectorySmoother,
};
use reelstab_model::{Trajectory, VideoInfo, ViewerDescriptor};

use crate::ffmpeg::FfmpegEncoder;
use crate::manifest::RunManifest;
use crate::source::VideoInput;
use crate::viewer::{render_viewer_page, write_viewer_page};
use crate::writer::{cleanup_stale_frames, ensure_output_dir, FrameWriter};

/// Upper bound on the pass 1 preallocation taken from the container's frame count.
const PREALLOCATED_FRAMES: u64 = 1 << 14;

/// Settings for one run.
#[derive(Debug, Clone, Default)]
pub struct StabilizeJob {
    pub stabilization: StabilizationConfig,
    pub output: OutputConfig,
}

impl From<&AppConfig> for StabilizeJob {
    fn from(config: &AppConfig) -> Self {
        Self {
            stabilization: config.stabilization.clone(),
            output: config.output.clone(),
        }
    }
}

/// Progress callback for a stabilization run.
pub type ProgressCallback = Box<dyn Fn(PipelineProgress) + Send>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineProgress {
    pub stage: PipelineStage,
    /// Frames processed in the current stage.
    pub frames_done: u64,
    /// Frames expected in the current stage; 0 when unknown.
    pub total_frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    EstimatingMotion,
    Smoothing,
    Rendering,
    Finalizing,
    Complete,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct StabilizationReport {
    pub info: VideoInfo,
    /// Frames decoded in pass 1.
    pub frame_count: u64,
    /// Written frame files, in sequence order.
    pub sampled: Vec<PathBuf>,
    /// Frame positions whose motion estimate fell back to the identity.
    pub degenerate_pairs: Vec<u64>,
    /// Frame positions whose corrective transform was singular.
    pub singular_frames: Vec<u64>,
    pub trajectory: Trajectory,
    pub smoothed: Trajectory,
    pub output_dimensions: (u32, u32),
    pub crop: Option<CropWindow>,
    pub viewer: ViewerDescriptor,
    pub viewer_page: Option<PathBuf>,
    pub stabilized_video: Option<PathBuf>,
    pub manifest: PathBuf,
    pub stale_removed: usize,
}

impl StabilizationReport {
    pub fn sampled_count(&self) -> u64 {
        self.sampled.len() as u64
    }
}

/// Stabilize `input`, writing sampled frames, the viewer page, the manifest,
/// and optionally the stabilized video.
pub fn stabilize(
    input: &dyn VideoInput,
    job: &StabilizeJob,
    progress: Option<ProgressCallback>,
) -> StabResult<StabilizationReport> {
    let started = Instant::now();
    let output = &job.output;
    let report = |stage, frames_done, total_frames| {
        if let Some(cb) = &progress {
            cb(PipelineProgress {
                stage,
                frames_done,
                total_frames,
            });
        }
    };

    let info = input.info()?;
    tracing::info!(
        input = %input.describe(),
        width = info.width,
        height = info.height,
        fps = info.fps,
        frames = ?info.frame_count,
        "Starting stabilization"
    );
    ensure_output_dir(&output.dir)?;

    // Pass 1: motion.
    let mut tracker = MotionTracker::new(MotionEstimator::new(job.stabilization.clone()));
    let mut estimates =
        Vec::with_capacity(info.frame_count.unwrap_or(0).min(PREALLOCATED_FRAMES) as usize);
    let mut source = input.open()?;
    while let Some(frame) = source.next_frame()? {
        check_dimensions(&info, frame.width(), frame.height(), frame.index())?;
        estimates.push(tracker.push(&frame.to_gray())?);
        report(
            PipelineStage::EstimatingMotion,
            estimates.len() as u64,
            info.frame_count.unwrap_or(0),
        );
    }
    drop(source);

    let frame_count = estimates.len() as u64;
    if frame_count == 0 {
        tracing::warn!(input = %input.describe(), "Input has no frames");
    }
    tracing::info!(
        frames = frame_count,
        degenerate = tracker.degenerate_frames().len(),
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Motion estimation finished"
    );

    report(PipelineStage::Smoothing, 0, frame_count);
    let path = TrajectorySmoother::new(job.stabilization.smoothing_radius).process(&estimates);
    let warper = FrameWarper::for_clip(
        job.stabilization.border,
        info.width,
        info.height,
        &path.corrective,
    );
    let (out_w, out_h) = warper.output_dimensions();

    // Pass 2: warp, encode, sample.
    let clock = FrameClock::new(info.fps);
    let mut sampler =
        FrameSampler::new(clock, output.frame_prefix.clone()).with_frame_count(frame_count);
    let writer = FrameWriter::new(&output.dir, output.jpeg_quality);
    let mut encoder = match &output.stabilized_video {
        Some(video) => Some(FfmpegEncoder::spawn(video, out_w, out_h, info.fps)?),
        None => None,
    };

    let mut sampled = Vec::new();
    let mut singular_frames = Vec::new();
    let mut rendered = 0u64;
    let mut source = input.open()?;
    while let Some(frame) = source.next_frame()? {
        let Some(corrective) = path.corrective.get(rendered as usize) else {
            tracing::warn!(
                expected = frame_count,
                "Second decode produced more frames than the first; ignoring the rest"
            );
            break;
        };
        check_dimensions(&info, frame.width(), frame.height(), rendered)?;

        let warped = warper.warp(frame.image(), corrective, rendered);
        if warped.singular {
            singular_frames.push(rendered);
        }
        if let Some(encoder) = encoder.as_mut() {
            encoder.write_frame(&warped.image, rendered)?;
        }
        if let Some(picked) = sampler.offer(frame.with_image(warped.image)) {
            match writer.write(&picked) {
                Ok(written) => sampled.push(written),
                Err(err) => {
                    // Frames past the last good one belong to an earlier run.
                    cleanup_stale_frames(
                        &output.dir,
                        &output.frame_prefix,
                        sampled.len() as u64,
                        output.cleanup_lookahead,
                    )?;
                    return Err(err);
                }
            }
        }

        rendered += 1;
        report(PipelineStage::Rendering, rendered, frame_count);
    }
    drop(source);

    if rendered < frame_count {
        tracing::warn!(
            rendered,
            expected = frame_count,
            "Second decode ended early"
        );
    }
    let summary = sampler.finish();

    report(PipelineStage::Finalizing, rendered, frame_count);
    let stabilized_video = encoder.map(FfmpegEncoder::finish).transpose()?;
    let stale_removed = cleanup_stale_frames(
        &output.dir,
        &output.frame_prefix,
        summary.sampled,
        output.cleanup_lookahead,
    )?;

    let viewer = ViewerDescriptor::new(summary.sampled, &output.dir, output.frame_prefix.clone());
    let viewer_page = match &output.viewer_page {
        Some(page) => {
            let html = render_viewer_page(&viewer, output.viewer_width, output.viewer_height);
            write_viewer_page(page, &html)?;
            Some(page.clone())
        }
        None => None,
    };

    let manifest = RunManifest {
        input: input.describe(),
        created_at: RunManifest::now(),
        width: info.width,
        height: info.height,
        output_width: out_w,
        output_height: out_h,
        fps: info.fps,
        frame_count,
        sampled: summary.sampled,
        frames: sampled
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect(),
        border: job.stabilization.border,
        smoothing_radius: job.stabilization.smoothing_radius,
        degenerate_pairs: tracker.degenerate_frames().to_vec(),
        singular_frames: singular_frames.clone(),
        viewer_page: viewer_page.clone(),
        stabilized_video: stabilized_video.clone(),
    }
    .save(&output.dir)?;

    tracing::info!(
        frames = frame_count,
        sampled = summary.sampled,
        degenerate = tracker.degenerate_frames().len(),
        singular = singular_frames.len(),
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Stabilization finished"
    );
    report(PipelineStage::Complete, rendered, frame_count);

    Ok(StabilizationReport {
        info,
        frame_count,
        sampled,
        degenerate_pairs: tracker.degenerate_frames().to_vec(),
        singular_frames,
        trajectory: path.raw,
        smoothed: path.smoothed,
        output_dimensions: (out_w, out_h),
        crop: warper.crop_window(),
        viewer,
        viewer_page,
        stabilized_video,
        manifest,
        stale_removed,
    })
}

fn check_dimensions(info: &VideoInfo, width: u32, height: u32, frame_index: u64) -> StabResult<()> {
    if (width, height) != (info.width, info.height) {
        return Err(StabError::decode(
            "decode",
            frame_index,
            format!(
                "frame is {width}x{height}, stream is {}x{}",
                info.width, info.height
            ),
        ));
    }
    Ok(())
}
