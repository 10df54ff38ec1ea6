//! Show or save the effective configuration.

use std::path::PathBuf;

use reelstab_common::config_file_path;

use super::load_config;

pub fn run(config: Option<PathBuf>, write: bool) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    if write {
        config.save()?;
        println!("Saved to {}", config_file_path().display());
    }
    Ok(())
}
