//! Persisted source/backup configuration
//!
//! Stored as TOML at `<config dir>/backmirror/config.toml`:
//! ```toml
//! [folders]
//! source = "/home/user/documents"
//! backup = "/mnt/backup/documents"
//!
//! [monitor]
//! initial_sync = false
//! ```

use anyhow::{Context, Result};
use mirror_core::MirrorPair;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Full configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub folders: FolderConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// The directory pair to mirror
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    /// Directory being watched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Directory receiving the mirror
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
}

/// Monitoring defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Run a full presence-based sync before monitoring (default: false)
    #[serde(default)]
    pub initial_sync: bool,
}

impl SystemConfig {
    /// Build a validated pair from the configured folders
    pub fn validate(&self) -> Result<MirrorPair> {
        let source = self
            .folders
            .source
            .as_ref()
            .context("Source folder is not configured (use 'bm config set-source <dir>')")?;
        let backup = self
            .folders
            .backup
            .as_ref()
            .context("Backup folder is not configured (use 'bm config set-backup <dir>')")?;

        MirrorPair::new(source, backup).context("Invalid folder configuration")
    }
}

/// Default location of the config file
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("backmirror").join("config.toml"))
}

/// Directory holding the config file, used for lock files as well
pub fn config_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load configuration; a missing file yields defaults
pub fn load(path: &Path) -> Result<SystemConfig> {
    if !path.exists() {
        return Ok(SystemConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Write configuration, creating parent directories
pub fn save(path: &Path, config: &SystemConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, contents)
        .with_context(|| format!("Failed to write config file {}", path.display()))
}

/// Create the config file with defaults if it does not exist
pub fn init_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save(path, &SystemConfig::default())?;
    Ok(true)
}

/// Annotated example configuration
pub fn example_config() -> &'static str {
    r#"# backmirror configuration

[folders]
# Directory to watch (absolute path)
source = "/home/user/documents"
# Directory that receives the mirror (absolute path, not inside source)
backup = "/mnt/backup/documents"

[monitor]
# Copy every entry missing from the backup before monitoring starts
initial_sync = false
"#
}
