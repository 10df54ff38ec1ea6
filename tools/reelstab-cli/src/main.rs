//! reelstab CLI: stabilize a handheld clip into a reel of one frame per second.
//!
//! Usage:
//!   reelstab stabilize <INPUT>   Stabilize a video and write the reel
//!   reelstab info <INPUT>        Show stream information
//!   reelstab config              Show or write the effective configuration
//!   reelstab check               Check for ffmpeg/ffprobe

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "reelstab",
    about = "Stabilize shaky video into a frame-sequence object movie",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stabilize a video and extract one frame per second
    Stabilize(commands::stabilize::StabilizeArgs),

    /// Show stream information for a video
    Info {
        /// Path to the video file
        input: PathBuf,
    },

    /// Show the effective configuration
    Config {
        /// Config file to read instead of the standard location
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Save it to the standard location
        #[arg(long)]
        write: bool,
    },

    /// Check for required external tools
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = reelstab_common::LoggingConfig::for_verbosity(cli.verbose);
    logging.json = cli.log_json;
    reelstab_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Stabilize(args) => commands::stabilize::run(args),
        Commands::Info { input } => commands::info::run(input),
        Commands::Config { config, write } => commands::config::run(config, write),
        Commands::Check => commands::check::run(),
    }
}
