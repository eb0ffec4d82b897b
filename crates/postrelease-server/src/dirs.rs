use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;

/// Platform data directory (e.g. `~/.local/share/postrelease`), created on demand.
pub fn data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "postrelease", "postrelease")
        .context("cannot determine a home directory for the data dir")?;
    let dir = dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}
