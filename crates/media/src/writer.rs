//! Sampled frame output.

use std::fs;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use reelstab_common::{StabError, StabResult};
use reelstab_model::{frame_file_name, SampledFrame};

/// Create the output directory (and parents) if missing.
pub fn ensure_output_dir(dir: &Path) -> StabResult<()> {
    fs::create_dir_all(dir).map_err(|source| StabError::OutputDirectory {
        path: dir.to_path_buf(),
        source,
    })?;
    if !dir.is_dir() {
        return Err(StabError::OutputDirectory {
            path: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, "not a directory"),
        });
    }
    Ok(())
}

/// Writes sampled frames as JPEG files.
///
/// Each file is written under a temporary name and renamed into place, so
/// an interrupted write never leaves a truncated numbered frame behind.
#[derive(Debug, Clone)]
pub struct FrameWriter {
    dir: PathBuf,
    quality: u8,
}

impl FrameWriter {
    pub fn new(dir: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            dir: dir.into(),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one frame, returning its final path.
    pub fn write(&self, frame: &SampledFrame) -> StabResult<PathBuf> {
        let path = self.dir.join(&frame.file_name);
        let partial = path.with_extension("jpg.partial");
        let failure = |source: io::Error| StabError::OutputWriteFailure {
            frame_index: frame.source_index,
            path: path.clone(),
            source,
        };

        if let Err(err) = self.encode(frame, &partial) {
            let _ = fs::remove_file(&partial);
            return Err(failure(err));
        }
        if let Err(err) = fs::rename(&partial, &path) {
            let _ = fs::remove_file(&partial);
            return Err(failure(err));
        }

        tracing::debug!(
            sequence = frame.sequence,
            frame = frame.source_index,
            path = %path.display(),
            "Wrote sampled frame"
        );
        Ok(path)
    }

    fn encode(&self, frame: &SampledFrame, path: &Path) -> io::Result<()> {
        let file = fs::File::create(path)?;
        let mut out = BufWriter::new(file);
        let image = &frame.image;
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)
            .map_err(io::Error::other)?;
        io::Write::flush(&mut out)
    }
}

/// Remove frames numbered `last + 1 ..= last + lookahead` left by an earlier run.
///
/// Missing files are skipped. Returns how many files were removed.
pub fn cleanup_stale_frames(dir: &Path, prefix: &str, last: u64, lookahead: u64) -> StabResult<usize> {
    let mut removed = 0;
    for sequence in (last + 1)..=(last + lookahead) {
        let path = dir.join(frame_file_name(prefix, sequence));
        match fs::remove_file(&path) {
            Ok(()) => {
                removed += 1;
                tracing::debug!(path = %path.display(), "Removed stale frame");
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to remove stale frame");
            }
        }
    }
    if removed > 0 {
        tracing::info!(removed, dir = %dir.display(), "Removed stale frames from a previous run");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::time::Duration;

    fn sampled(sequence: u64) -> SampledFrame {
        SampledFrame {
            sequence,
            source_index: sequence * 10,
            timestamp: Duration::from_secs(sequence),
            file_name: frame_file_name("clip", sequence),
            image: RgbImage::from_pixel(16, 8, Rgb([90, 120, 200])),
        }
    }

    #[test]
    fn test_write_produces_decodable_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FrameWriter::new(dir.path(), 90);
        let path = writer.write(&sampled(3)).unwrap();

        assert_eq!(path, dir.path().join("clip_frame03.jpg"));
        assert!(!dir.path().join("clip_frame03.jpg.partial").exists());
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_write_failure_carries_frame_index() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FrameWriter::new(dir.path().join("missing"), 90);
        let err = writer.write(&sampled(2)).unwrap_err();
        assert!(matches!(
            err,
            StabError::OutputWriteFailure { frame_index: 20, .. }
        ));
    }

    #[test]
    fn test_cleanup_skips_gaps() {
        let dir = tempfile::tempdir().unwrap();
        for sequence in [4, 5, 9, 30] {
            fs::write(dir.path().join(frame_file_name("clip", sequence)), b"stale").unwrap();
        }
        fs::write(dir.path().join(frame_file_name("clip", 3)), b"keep").unwrap();

        let removed = cleanup_stale_frames(dir.path(), "clip", 3, 99).unwrap();
        assert_eq!(removed, 4);
        assert!(dir.path().join("clip_frame03.jpg").exists());
        assert!(!dir.path().join("clip_frame30.jpg").exists());
    }

    #[test]
    fn test_cleanup_respects_lookahead() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(frame_file_name("clip", 8)), b"stale").unwrap();
        assert_eq!(cleanup_stale_frames(dir.path(), "clip", 2, 5).unwrap(), 0);
        assert_eq!(cleanup_stale_frames(dir.path(), "clip", 2, 6).unwrap(), 1);
    }

    #[test]
    fn test_ensure_output_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_output_dir(&nested).unwrap();
        ensure_output_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_ensure_output_dir_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            ensure_output_dir(&file),
            Err(StabError::OutputDirectory { .. })
        ));
    }
}
