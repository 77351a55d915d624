//! Console rendering of mirror status lines

use indicatif::ProgressBar;
use mirror_core::{MirrorStatus, StatusSink};
use owo_colors::OwoColorize;
use parking_lot::Mutex;

/// Prints status lines to stdout, colored by kind
///
/// While a progress spinner is attached, lines go through it so they do not
/// tear the spinner.
#[derive(Default)]
pub struct ConsoleSink {
    progress: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route output through `bar` until `detach_progress` is called
    pub fn attach_progress(&self, bar: ProgressBar) {
        *self.progress.lock() = Some(bar);
    }

    pub fn detach_progress(&self) -> Option<ProgressBar> {
        self.progress.lock().take()
    }
}

impl StatusSink for ConsoleSink {
    fn emit(&self, status: MirrorStatus) {
        let line = render(&status);
        let progress = self.progress.lock().clone();
        if let Some(bar) = progress {
            if let MirrorStatus::SyncFileCopied { .. } | MirrorStatus::SyncDirCopied { .. } = status
            {
                bar.inc(1);
            }
            // A hidden bar (no terminal) swallows println
            if !bar.is_hidden() {
                bar.println(line);
                return;
            }
        }
        println!("{}", line);
    }
}

/// Render a status with color
pub fn render(status: &MirrorStatus) -> String {
    let text = status.to_string();
    match status {
        MirrorStatus::BackedUp { .. }
        | MirrorStatus::SyncFileCopied { .. }
        | MirrorStatus::SyncDirCopied { .. } => text.green().to_string(),
        MirrorStatus::FileDeleted { .. } | MirrorStatus::DirDeleted { .. } => {
            text.red().to_string()
        }
        MirrorStatus::FileRenamed { .. } | MirrorStatus::DirRenamed { .. } => {
            text.cyan().to_string()
        }
        MirrorStatus::OperationFailed { .. } => text.red().bold().to_string(),
        MirrorStatus::Monitoring { .. }
        | MirrorStatus::SyncStarted { .. }
        | MirrorStatus::SyncFinished { .. } => text.bold().to_string(),
        MirrorStatus::Stopped => text.dimmed().to_string(),
        _ if status.is_anomaly() => text.yellow().to_string(),
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_keeps_status_text() {
        let status = MirrorStatus::FileNotFound { backup: PathBuf::from("/bak/b.txt") };
        let line = render(&status);
        assert!(line.contains("File not found in backup: /bak/b.txt"));
    }

    #[test]
    fn test_progress_attach_detach() {
        let sink = ConsoleSink::new();
        sink.attach_progress(ProgressBar::hidden());
        sink.emit(MirrorStatus::SyncFileCopied {
            source: "/src/a".into(),
            backup: "/bak/a".into(),
        });

        let bar = sink.detach_progress().unwrap();
        assert_eq!(bar.position(), 1);
        assert!(sink.detach_progress().is_none());
    }
}
