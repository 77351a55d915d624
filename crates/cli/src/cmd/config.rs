//! Configuration management command
//!
//! View the configured folder pair and point it at new directories.

use cli_lib::system_config::{self, SystemConfig};
use cli_lib::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

/// Show the current configuration
pub async fn run_show(config_path: &Path) -> Result<()> {
    let config = system_config::load(config_path)?;

    println!("{}", "Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("{}", "[folders]".yellow());
    print_folder("source", config.folders.source.as_deref());
    print_folder("backup", config.folders.backup.as_deref());

    println!("\n{}", "[monitor]".yellow());
    println!("  {} = {}", "initial_sync".cyan(), config.monitor.initial_sync);

    if config.folders.source.is_some() && config.folders.backup.is_some() {
        match config.validate() {
            Ok(_) => println!("\n{} Folder pair is valid", "✓".green()),
            Err(e) => println!("\n{} {:#}", "✗".red(), e),
        }
    }

    Ok(())
}

fn print_folder(key: &str, value: Option<&Path>) {
    match value {
        Some(path) => println!("  {} = {}", key.cyan(), path.display()),
        None => println!("  {} = {}", key.cyan(), "(not set)".dimmed()),
    }
}

/// Set the folder to watch
pub async fn run_set_source(config_path: &Path, dir: &Path) -> Result<()> {
    let dir = util::resolve_dir(dir)?;
    update(config_path, |config| config.folders.source = Some(dir.clone()))?;

    println!("{} Source folder set to: {}", "✓".green(), dir.display());
    Ok(())
}

/// Set the folder that receives the mirror
pub async fn run_set_backup(config_path: &Path, dir: &Path) -> Result<()> {
    let dir = util::resolve_dir(dir)?;
    update(config_path, |config| config.folders.backup = Some(dir.clone()))?;

    println!("{} Backup folder set to: {}", "✓".green(), dir.display());
    Ok(())
}

/// Apply `change`, reject pairs that cannot be mirrored, then save
fn update(config_path: &Path, change: impl FnOnce(&mut SystemConfig)) -> Result<()> {
    let mut config = system_config::load(config_path)?;
    change(&mut config);

    // Only a complete pair can be checked
    if config.folders.source.is_some() && config.folders.backup.is_some() {
        config.validate().context("Refusing to save configuration")?;
    }

    system_config::save(config_path, &config)
}

/// Show the config file path and optionally create it
pub async fn run_path(config_path: &Path, create: bool) -> Result<()> {
    if create && system_config::init_if_missing(config_path)? {
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else {
        println!("{}", config_path.display());
        if !config_path.exists() {
            println!("{}", "File does not exist. Use --create to create it.".yellow());
        }
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", system_config::example_config());
    Ok(())
}
