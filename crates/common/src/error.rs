//! Error types shared across reelstab crates.

use std::path::PathBuf;

/// Top-level error type for stabilization runs.
///
/// `DegenerateMotionEstimate` and `SingularTransform` are recoverable: the
/// pipeline substitutes the identity transform for the affected frame and
/// logs the error as a warning. Everything else aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum StabError {
    #[error("Input unavailable: {path}: {reason}")]
    InputUnavailable { path: PathBuf, reason: String },

    #[error("Degenerate motion estimate at frame {frame_index}: {tracked} reliable correspondences, {required} required")]
    DegenerateMotionEstimate {
        frame_index: u64,
        tracked: usize,
        required: usize,
    },

    #[error("Singular corrective transform at frame {frame_index}")]
    SingularTransform { frame_index: u64 },

    #[error("Failed to write frame {frame_index} to {path}: {source}")]
    OutputWriteFailure {
        frame_index: u64,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot prepare output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decode error in {stage} at frame {frame_index}: {message}")]
    Decode {
        stage: &'static str,
        frame_index: u64,
        message: String,
    },

    #[error("Encode error at frame {frame_index}: {message}")]
    Encode { frame_index: u64, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using StabError.
pub type StabResult<T> = Result<T, StabError>;

impl StabError {
    pub fn input_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InputUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(stage: &'static str, frame_index: u64, msg: impl Into<String>) -> Self {
        Self::Decode {
            stage,
            frame_index,
            message: msg.into(),
        }
    }

    pub fn encode(frame_index: u64, msg: impl Into<String>) -> Self {
        Self::Encode {
            frame_index,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the pipeline recovers from this error locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DegenerateMotionEstimate { .. } | Self::SingularTransform { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let degenerate = StabError::DegenerateMotionEstimate {
            frame_index: 4,
            tracked: 2,
            required: 10,
        };
        assert!(degenerate.is_recoverable());
        assert!(StabError::SingularTransform { frame_index: 1 }.is_recoverable());
        assert!(!StabError::input_unavailable("clip.mp4", "missing").is_recoverable());
    }

    #[test]
    fn test_write_failure_mentions_frame_index() {
        let err = StabError::OutputWriteFailure {
            frame_index: 7,
            path: PathBuf::from("reel_images/x_frame07.jpg"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("frame 7"), "{msg}");
        assert!(msg.contains("x_frame07.jpg"), "{msg}");
    }
}
