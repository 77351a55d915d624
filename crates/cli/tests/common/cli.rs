//! CLI command execution helpers with automatic timing
//!
//! Wraps the `bm` binary with a private config file so tests never touch
//! the user's real configuration.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// CLI command builder with timing
pub struct BmCommand {
    config_path: PathBuf,
    args: Vec<String>,
    stdin_data: Option<String>,
}

impl BmCommand {
    /// Create a new command using the config file at `config_path`
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            args: Vec::new(),
            stdin_data: None,
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Provide stdin data
    pub fn stdin(&mut self, data: &str) -> &mut Self {
        self.stdin_data = Some(data.to_string());
        self
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();

        let mut command = Command::new(env!("CARGO_BIN_EXE_bm"));
        command
            .arg("--config")
            .arg(&self.config_path)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().context("Failed to spawn command")?;

        // Dropping the handle closes stdin
        if let Some(mut stdin) = child.stdin.take() {
            use std::io::Write;
            if let Some(data) = &self.stdin_data {
                stdin.write_all(data.as_bytes())?;
            }
        }

        let output = child
            .wait_with_output()
            .context("Failed to wait for command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    #[allow(dead_code)]
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if stdout contains text
    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    /// Check if stderr contains text
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// Macro for convenient command construction
///
/// Usage:
/// ```ignore
/// bm!(config, "sync").assert_success()?;
/// bm!(config, "start").stdin("stop\n").assert_success()?;
/// ```
#[macro_export]
macro_rules! bm {
    ($config:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::BmCommand::new($config);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
