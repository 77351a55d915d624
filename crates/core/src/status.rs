//! Human-readable status lines for every mirror action and anomaly

use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// One reportable outcome of the mirroring engine
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorStatus {
    /// Live monitoring began
    Monitoring { source: PathBuf },
    /// A file was copied into the backup
    BackedUp { source: PathBuf, backup: PathBuf },
    FileDeleted { backup: PathBuf },
    /// A delete event arrived for a file the backup no longer has
    FileNotFound { backup: PathBuf },
    DirDeleted { backup: PathBuf },
    DirNotFound { backup: PathBuf },
    FileRenamed { from: PathBuf, to: PathBuf },
    /// A rename event arrived for a file the backup never had
    FileRenameMissing { from: PathBuf },
    DirRenamed { from: PathBuf, to: PathBuf },
    DirRenameMissing { from: PathBuf },
    /// Initial sync began
    SyncStarted { source: PathBuf },
    SyncDirCopied { source: PathBuf, backup: PathBuf },
    SyncFileCopied { source: PathBuf, backup: PathBuf },
    /// Initial sync completed
    SyncFinished {
        elapsed: Duration,
        files: usize,
        dirs: usize,
    },
    /// A single operation failed; monitoring continues
    OperationFailed { path: PathBuf, error: String },
    /// Monitoring ended
    Stopped,
}

impl MirrorStatus {
    /// True for lines that describe something going wrong or missing
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            MirrorStatus::FileNotFound { .. }
                | MirrorStatus::DirNotFound { .. }
                | MirrorStatus::FileRenameMissing { .. }
                | MirrorStatus::DirRenameMissing { .. }
                | MirrorStatus::OperationFailed { .. }
        )
    }
}

impl fmt::Display for MirrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorStatus::Monitoring { source } => {
                write!(f, "Monitoring changes in: {}", source.display())
            }
            MirrorStatus::BackedUp { source, backup } => {
                write!(f, "Backed up: {} -> {}", source.display(), backup.display())
            }
            MirrorStatus::FileDeleted { backup } => {
                write!(f, "File deleted from backup: {}", backup.display())
            }
            MirrorStatus::FileNotFound { backup } => {
                write!(f, "File not found in backup: {}", backup.display())
            }
            MirrorStatus::DirDeleted { backup } => {
                write!(f, "Directory deleted from backup: {}", backup.display())
            }
            MirrorStatus::DirNotFound { backup } => {
                write!(f, "Directory not found in backup: {}", backup.display())
            }
            MirrorStatus::FileRenamed { from, to } => {
                write!(f, "File renamed in backup: {} -> {}", from.display(), to.display())
            }
            MirrorStatus::FileRenameMissing { from } => {
                write!(f, "File not found in backup to rename: {}", from.display())
            }
            MirrorStatus::DirRenamed { from, to } => {
                write!(f, "Directory renamed in backup: {} -> {}", from.display(), to.display())
            }
            MirrorStatus::DirRenameMissing { from } => {
                write!(f, "Directory not found in backup to rename: {}", from.display())
            }
            MirrorStatus::SyncStarted { source } => write!(
                f,
                "Starting full backup of {}, this may take a while...",
                source.display()
            ),
            MirrorStatus::SyncDirCopied { source, backup } => write!(
                f,
                "Folder synchronized (initial): {} -> {}",
                source.display(),
                backup.display()
            ),
            MirrorStatus::SyncFileCopied { source, backup } => write!(
                f,
                "File synchronized (initial): {} -> {}",
                source.display(),
                backup.display()
            ),
            MirrorStatus::SyncFinished { elapsed, files, dirs } => write!(
                f,
                "Full backup finished in {:.2} seconds ({} files, {} folders copied)",
                elapsed.as_secs_f64(),
                files,
                dirs
            ),
            MirrorStatus::OperationFailed { path, error } => {
                write!(f, "Backup failed for {}: {}", path.display(), error)
            }
            MirrorStatus::Stopped => write!(f, "Stopping backup monitoring..."),
        }
    }
}

/// Destination for status lines
///
/// Implementations must be cheap; the dispatcher calls `emit` inline between
/// mirror operations.
pub trait StatusSink: Send + Sync {
    fn emit(&self, status: MirrorStatus);
}

/// Sink that keeps every status in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    statuses: Mutex<Vec<MirrorStatus>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn statuses(&self) -> Vec<MirrorStatus> {
        self.statuses.lock().clone()
    }

    /// Rendered lines of everything emitted so far
    pub fn lines(&self) -> Vec<String> {
        self.statuses.lock().iter().map(|s| s.to_string()).collect()
    }

    pub fn clear(&self) {
        self.statuses.lock().clear();
    }
}

impl StatusSink for MemorySink {
    fn emit(&self, status: MirrorStatus) {
        self.statuses.lock().push(status);
    }
}

/// Log a status and hand it to the sink
pub(crate) fn report(sink: &dyn StatusSink, status: MirrorStatus) {
    if status.is_anomaly() {
        warn!("{}", status);
    } else {
        info!("{}", status);
    }
    sink.emit(status);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_targets_have_distinct_lines() {
        let backup = PathBuf::from("/backup/b.txt");
        let deleted = MirrorStatus::FileDeleted { backup: backup.clone() }.to_string();
        let missing = MirrorStatus::FileNotFound { backup }.to_string();

        assert_ne!(deleted, missing);
        assert!(missing.contains("not found"));
    }

    #[test]
    fn test_anomaly_classification() {
        assert!(MirrorStatus::DirRenameMissing { from: "/b/x".into() }.is_anomaly());
        assert!(!MirrorStatus::DirRenamed { from: "/b/x".into(), to: "/b/y".into() }.is_anomaly());
        assert!(!MirrorStatus::Stopped.is_anomaly());
    }

    #[test]
    fn test_sync_finished_reports_elapsed() {
        let line = MirrorStatus::SyncFinished {
            elapsed: Duration::from_millis(1500),
            files: 3,
            dirs: 1,
        }
        .to_string();
        assert!(line.contains("1.50 seconds"));
        assert!(line.contains("3 files"));
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        report(&sink, MirrorStatus::Monitoring { source: "/src".into() });
        report(&sink, MirrorStatus::Stopped);

        assert_eq!(sink.statuses().len(), 2);
        assert_eq!(sink.lines()[1], "Stopping backup monitoring...");

        sink.clear();
        assert!(sink.statuses().is_empty());
    }
}
