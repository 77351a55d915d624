//! Run a foreground monitoring session

use cli_lib::console::ConsoleSink;
use cli_lib::locks::MonitorLock;
use cli_lib::system_config;
use anyhow::{Context, Result};
use mirror_watcher::MirrorController;
use owo_colors::OwoColorize;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Interval at which the session is checked for a fatal stop
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Console commands accepted while monitoring
enum Command {
    Pause,
    Resume,
    Stop,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "pause" | "hide" => Some(Command::Pause),
        "resume" | "show" => Some(Command::Resume),
        "stop" | "exit" | "quit" => Some(Command::Stop),
        _ => None,
    }
}

/// Read console lines on a plain thread
///
/// A blocking stdin read cannot be cancelled, so it must not live on the
/// runtime or shutdown would wait for the next line.
fn spawn_console_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("backmirror-console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Stopped reading console commands: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn console reader")?;

    Ok(rx)
}

pub async fn run(config_path: &Path, initial_sync: bool) -> Result<()> {
    let config = system_config::load(config_path)?;
    let pair = config.validate()?;
    let run_sync = initial_sync || config.monitor.initial_sync;

    let _lock = MonitorLock::acquire(&system_config::config_dir(config_path), pair.backup_root())?;

    println!(
        "{} {} {} {}",
        "Mirroring".bold(),
        pair.source_root().display(),
        "→".dimmed(),
        pair.backup_root().display()
    );
    println!(
        "{}",
        "Type 'pause', 'resume' or 'stop' and press enter (ctrl-c also stops)".dimmed()
    );

    // Initial sync and watcher setup block, keep them off the runtime
    let controller = tokio::task::spawn_blocking(move || {
        let mut controller = MirrorController::new(Arc::new(ConsoleSink::new()));
        controller.start(pair, run_sync).map(|_| controller)
    })
    .await
    .context("Startup task panicked")?
    .context("Failed to start monitoring")?;

    let mut commands = spawn_console_reader()?;
    let mut stdin_open = true;
    let mut poll = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = commands.recv(), if stdin_open => match line {
                Some(line) => match parse_command(&line) {
                    Some(Command::Pause) => {
                        controller.pause_output();
                        println!("{}", "Output paused; type 'resume' to show it again".dimmed());
                    }
                    Some(Command::Resume) => controller.resume_output(),
                    Some(Command::Stop) => break,
                    None if line.trim().is_empty() => {}
                    None => println!(
                        "{} {} (pause, resume, stop)",
                        "Unknown command:".yellow(),
                        line.trim()
                    ),
                },
                // Detached stdin: keep monitoring until ctrl-c
                None => stdin_open = false,
            },
            _ = poll.tick() => {
                if controller.session_ended() {
                    break;
                }
            }
        }
    }

    let stats = tokio::task::spawn_blocking(move || {
        let mut controller = controller;
        controller.stop()
    })
    .await
    .context("Shutdown task panicked")?
    .context("Monitoring ended with an error")?;

    println!(
        "{} {} events mirrored, {} failed, {} ignored",
        "Summary:".bold(),
        stats.handled,
        stats.failed,
        stats.ignored
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert!(matches!(parse_command("pause"), Some(Command::Pause)));
        assert!(matches!(parse_command("  Resume \n"), Some(Command::Resume)));
        assert!(matches!(parse_command("EXIT"), Some(Command::Stop)));
        assert!(parse_command("status").is_none());
    }
}
