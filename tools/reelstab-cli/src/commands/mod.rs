pub mod check;
pub mod config;
pub mod info;
pub mod stabilize;

use std::path::{Path, PathBuf};

use reelstab_common::AppConfig;

/// Explicit config file, or the standard location with defaults as fallback.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display())),
        None => Ok(AppConfig::load()),
    }
}

/// Anchor a relative path at the current directory.
pub fn absolutize(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
