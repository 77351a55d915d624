//! One-shot presence-based sync

use cli_lib::console::ConsoleSink;
use cli_lib::locks::MonitorLock;
use cli_lib::system_config;
use cli_lib::util;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use mirror_core::initial_sync;
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = system_config::load(config_path)?;
    let pair = config.validate()?;
    let _lock = MonitorLock::acquire(&system_config::config_dir(config_path), pair.backup_root())?;

    let sink = Arc::new(ConsoleSink::new());
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {pos} copied {msg}")?);
    spinner.set_message(pair.source_root().display().to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    sink.attach_progress(spinner);

    let report = tokio::task::spawn_blocking({
        let sink = sink.clone();
        move || initial_sync(&pair, sink.as_ref())
    })
    .await
    .context("Sync task panicked")?;

    if let Some(spinner) = sink.detach_progress() {
        spinner.finish_and_clear();
    }
    let report = report?;

    println!(
        "{} {} already present, {} copy operations in {}",
        "Summary:".bold(),
        report.present,
        report.copy_operations(),
        util::format_duration(report.elapsed)
    );

    if report.failed > 0 {
        anyhow::bail!("{} entries could not be copied", report.failed);
    }

    Ok(())
}
