//! Check for required external tools.

use reelstab_common::config_file_path;
use reelstab_media::command_exists;

pub fn run() -> anyhow::Result<()> {
    println!("reelstab System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;
    for tool in ["ffmpeg", "ffprobe"] {
        if command_exists(tool) {
            println!("[OK] {tool} found");
        } else {
            println!("[MISSING] {tool} not found on PATH");
            all_ok = false;
        }
    }

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] No config at {}; using defaults", config_path.display());
    }

    println!();
    if all_ok {
        println!("All required tools are available. reelstab is ready.");
    } else {
        println!("Install ffmpeg (which provides ffprobe) to decode and encode video.");
    }

    Ok(())
}
