//! reelstab data model
//!
//! Defines the data contracts passed between pipeline stages:
//! - **Frame:** a decoded picture with its stream position and timestamp
//! - **Transform:** a similarity transform (translation, rotation, uniform
//!   scale); one per adjacent frame pair is a motion estimate
//! - **Trajectory:** cumulative transforms relative to frame 0
//! - **SampledFrame:** a stabilized frame picked at a one-second boundary
//! - **ViewerDescriptor:** what the viewer page needs to reference the frames
//!
//! Pixel coordinates have their origin at the top-left corner, x to the
//! right and y down.

pub mod frame;
pub mod sample;
pub mod trajectory;
pub mod transform;
pub mod viewer;

pub use frame::*;
pub use sample::*;
pub use trajectory::*;
pub use transform::*;
pub use viewer::*;
