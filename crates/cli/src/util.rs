//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolve a user-supplied directory against the current directory
///
/// The directory must exist; the returned path is absolute but not
/// canonicalized, so it is stored the way the user wrote it.
pub fn resolve_dir(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(path)
    };

    if !absolute.is_dir() {
        anyhow::bail!("Not a directory: {}", absolute.display());
    }

    Ok(absolute)
}

/// Resolve the config file path from `--config` or the platform default
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => crate::system_config::config_file_path()
            .context("Could not determine config file path"),
    }
}

/// Format a duration compactly ("850ms", "12.4s", "3m 05s", "2h 14m")
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}
