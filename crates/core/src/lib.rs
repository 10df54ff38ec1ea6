//! reelstab stabilization core
//!
//! Turns a shaky frame sequence into stabilized frames:
//! - **Motion Estimator:** corner tracking and a robust similarity fit per
//!   adjacent frame pair
//! - **Trajectory Smoother:** cumulative camera path and its moving average
//! - **Frame Warper:** applies per-frame corrective transforms with a
//!   configurable border policy
//! - **Frame Sampler:** picks one frame per second of footage
//!
//! This crate is pure computation: no I/O, no process spawning.
//! All inputs are data; all outputs are data.

pub mod motion;
pub mod sampler;
pub mod trajectory;
pub mod warp;

pub use motion::{estimate_clip, MotionEstimator, MotionTracker, PreparedFrame};
pub use sampler::{sample_stream, FrameSampler, SamplerSummary};
pub use trajectory::{corrective, corrective_transforms, SmoothedPath, TrajectorySmoother};
pub use warp::{CropWindow, FrameWarper, Warped};
