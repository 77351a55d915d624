//! backmirror CLI - bm command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

mod cmd;

/// backmirror - Live one-way mirror of a folder into a backup folder
#[derive(Parser)]
#[command(name = "bm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the source folder and mirror changes into the backup
    ///
    /// Type `pause`, `resume` or `stop` (or `exit`) on stdin while running.
    Start {
        /// Copy everything missing from the backup before monitoring
        #[arg(long)]
        initial_sync: bool,
    },
    /// Copy everything missing from the backup, then exit
    Sync,
    /// View and edit the source/backup configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Print the config file location
    Path {
        /// Create the file with defaults if it does not exist
        #[arg(long)]
        create: bool,
    },
    /// Print an annotated example configuration
    Example,
    /// Set the folder to watch
    SetSource {
        /// Existing directory
        path: PathBuf,
    },
    /// Set the folder that receives the mirror
    SetBackup {
        /// Existing directory
        path: PathBuf,
    },
}

/// Install the global subscriber
///
/// Console output stays at `warn` unless `RUST_LOG` says otherwise, since
/// mirror actions are already printed as status lines. The log file, when
/// requested, records `info` and above.
fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "backmirror.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(LevelFilter::INFO);

            tracing_subscriber::registry().with(console).with(file).init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(console).init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Held until exit so buffered log lines are flushed
    let _guard = init_tracing(cli.log_dir.as_deref())?;

    let config_path = cli_lib::util::resolve_config_path(cli.config.as_deref())?;

    match cli.command {
        Commands::Start { initial_sync } => cmd::start::run(&config_path, initial_sync).await,
        Commands::Sync => cmd::sync::run(&config_path).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => cmd::config::run_show(&config_path).await,
            ConfigCommands::Path { create } => cmd::config::run_path(&config_path, create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
            ConfigCommands::SetSource { path } => {
                cmd::config::run_set_source(&config_path, &path).await
            }
            ConfigCommands::SetBackup { path } => {
                cmd::config::run_set_backup(&config_path, &path).await
            }
        },
    }
}
