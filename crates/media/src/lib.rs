//! reelstab media layer
//!
//! Everything around the pure stabilization core that touches the outside
//! world:
//!
//! ```text
//! input.mp4 ── ffprobe/ffmpeg decode ──┐
//!                                      ├── pass 1: motion estimates
//!                                      │         │
//!                                      │   trajectory smoothing
//!                                      │         │
//!              ffmpeg decode (again) ──┴── pass 2: warp ──┬── stabilized video (optional)
//!                                                         │
//!                                                   one frame per second
//!                                                         │
//!                                          reel_images/<prefix>_frameNN.jpg
//!                                                         │
//!                                              index.html + manifest.json
//! ```

pub mod ffmpeg;
pub mod manifest;
pub mod pipeline;
pub mod source;
pub mod viewer;
pub mod writer;

pub use ffmpeg::{command_exists, probe_video, FfmpegEncoder, FfmpegInput};
pub use manifest::RunManifest;
pub use pipeline::{
    stabilize, PipelineProgress, PipelineStage, ProgressCallback, StabilizationReport, StabilizeJob,
};
pub use source::{FrameSource, InMemoryClip, VideoInput};
pub use viewer::{render_viewer_page, write_viewer_page};
pub use writer::{cleanup_stale_frames, ensure_output_dir, FrameWriter};
