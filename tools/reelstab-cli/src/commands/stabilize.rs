//! Stabilize a video into a reel.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use reelstab_common::BorderPolicy;
use reelstab_media::{stabilize, FfmpegInput, PipelineProgress, PipelineStage, StabilizeJob};

use super::{absolutize, load_config};

#[derive(Args)]
pub struct StabilizeArgs {
    /// Input video file
    pub input: PathBuf,

    /// Config file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory receiving the sampled frames
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Border policy: replicate|reflect|black|crop
    #[arg(long)]
    pub border: Option<BorderPolicy>,

    /// Smoothing radius in frames
    #[arg(long)]
    pub radius: Option<usize>,

    /// Minimum reliable correspondences per frame pair
    #[arg(long)]
    pub min_correspondences: Option<usize>,

    /// Frame file prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Viewer page path
    #[arg(long)]
    pub viewer: Option<PathBuf>,

    /// Skip writing the viewer page
    #[arg(long, conflicts_with = "viewer")]
    pub no_viewer: bool,

    /// Also write the full stabilized video here
    #[arg(long)]
    pub stabilized_video: Option<PathBuf>,
}

pub fn run(args: StabilizeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    let stab = &mut config.stabilization;
    if let Some(border) = args.border {
        stab.border = border;
    }
    if let Some(radius) = args.radius {
        stab.smoothing_radius = radius;
    }
    if let Some(min) = args.min_correspondences {
        stab.min_correspondences = min;
    }

    let out = &mut config.output;
    if let Some(dir) = args.output_dir {
        out.dir = dir;
    }
    if let Some(prefix) = args.prefix {
        out.frame_prefix = prefix;
    }
    if let Some(viewer) = args.viewer {
        out.viewer_page = Some(viewer);
    }
    if args.no_viewer {
        out.viewer_page = None;
    }
    if let Some(video) = args.stabilized_video {
        out.stabilized_video = Some(video);
    }

    out.dir = absolutize(&out.dir)?;
    out.viewer_page = out.viewer_page.as_deref().map(absolutize).transpose()?;
    out.stabilized_video = out.stabilized_video.as_deref().map(absolutize).transpose()?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    println!("Stabilizing: {}", args.input.display());
    println!("  Output: {}", config.output.dir.display());
    println!(
        "  Border: {}, radius: {}",
        config.stabilization.border, config.stabilization.smoothing_radius
    );

    let input = FfmpegInput::new(&args.input)?;
    let job = StabilizeJob::from(&config);

    let progress_cb: Box<dyn Fn(PipelineProgress) + Send> = Box::new(|p| {
        let label = match p.stage {
            PipelineStage::EstimatingMotion => "Estimating motion",
            PipelineStage::Rendering => "Rendering",
            _ => return,
        };
        if p.frames_done % 25 != 0 && p.frames_done != p.total_frames {
            return;
        }
        if p.total_frames > 0 {
            print!("\r  {label}: {}/{} frames  ", p.frames_done, p.total_frames);
        } else {
            print!("\r  {label}: {} frames  ", p.frames_done);
        }
        let _ = std::io::stdout().flush();
    });

    let report = match stabilize(&input, &job, Some(progress_cb)) {
        Ok(report) => report,
        Err(e) => {
            println!();
            return Err(anyhow::anyhow!("Stabilization failed: {e}"));
        }
    };

    println!();
    println!(
        "Done: {} frames, {} sampled ({}x{})",
        report.frame_count,
        report.sampled_count(),
        report.output_dimensions.0,
        report.output_dimensions.1
    );
    if !report.degenerate_pairs.is_empty() {
        println!(
            "  {} frame pairs had too few features; identity motion used",
            report.degenerate_pairs.len()
        );
    }
    if !report.singular_frames.is_empty() {
        println!(
            "  {} frames had singular corrections; left unwarped",
            report.singular_frames.len()
        );
    }
    if let Some(page) = &report.viewer_page {
        println!("  Viewer: {}", page.display());
    }
    if let Some(video) = &report.stabilized_video {
        println!("  Stabilized video: {}", video.display());
    }
    println!("  Manifest: {}", report.manifest.display());

    Ok(())
}
