//! reelstab common utilities
//!
//! Shared infrastructure for all reelstab crates:
//! - Error taxonomy and result alias
//! - Frame clock (timestamps and one-per-second sampling arithmetic)
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
