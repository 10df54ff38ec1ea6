//! Show stream information.

use std::path::PathBuf;

use reelstab_common::FrameClock;
use reelstab_media::probe_video;

pub fn run(input: PathBuf) -> anyhow::Result<()> {
    let info = probe_video(&input)?;
    let clock = FrameClock::new(info.fps);

    println!("Video: {}", input.display());
    println!("  Resolution: {}x{}", info.width, info.height);
    println!("  Frame rate: {:.3} fps", info.fps);
    match info.frame_count {
        Some(frames) => {
            println!("  Frames: {frames}");
            println!(
                "  Duration: {:.2}s",
                clock.timestamp(frames).as_secs_f64()
            );
            println!(
                "  Reel frames: {} (every {} frames)",
                clock.expected_samples(frames),
                clock.sample_step()
            );
        }
        None => {
            println!("  Frames: unknown");
            println!("  Sampling: every {} frames", clock.sample_step());
        }
    }

    Ok(())
}
