//! Presence-based initial sync
//!
//! Walks the source tree once and copies every entry whose backup
//! counterpart is missing. Entries already present in the backup are left
//! alone, even when their content differs from the source.

use crate::error::MirrorError;
use crate::ops::{self, OpOutcome};
use crate::pair::MirrorPair;
use crate::status::{report, MirrorStatus, StatusSink};
use crate::Result;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Summary of one initial sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Files copied individually
    pub copied_files: usize,
    /// Directories copied as whole subtrees
    pub copied_dirs: usize,
    /// Files written as part of copied subtrees
    pub tree_files: usize,
    /// Entries whose backup counterpart already existed
    pub present: usize,
    /// Entries that could not be read or copied
    pub failed: usize,
    /// Wall-clock duration of the pass
    pub elapsed: Duration,
}

impl SyncReport {
    /// Number of copy operations performed (files plus subtrees)
    pub fn copy_operations(&self) -> usize {
        self.copied_files + self.copied_dirs
    }
}

/// Run one presence-based sync of `pair.source_root()` into `pair.backup_root()`
///
/// Per-entry failures are reported and counted; only a vanished source root
/// aborts the pass.
pub fn initial_sync(pair: &MirrorPair, sink: &dyn StatusSink) -> Result<SyncReport> {
    let source_root = pair.source_root();
    if !source_root.is_dir() {
        return Err(MirrorError::SourceRootGone(source_root.to_path_buf()));
    }

    let started = Instant::now();
    let mut summary = SyncReport::default();

    report(sink, MirrorStatus::SyncStarted { source: source_root.to_path_buf() });

    let mut walker = WalkDir::new(source_root)
        .min_depth(1)
        .follow_links(false)
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(source_root).to_path_buf();
                summary.failed += 1;
                report(sink, MirrorStatus::OperationFailed { path, error: e.to_string() });
                continue;
            }
        };

        let source = entry.path();
        let backup = pair.to_backup_path(source)?;

        if exists(&backup) {
            summary.present += 1;
            continue;
        }

        if entry.file_type().is_dir() {
            // The subtree copy covers every descendant
            walker.skip_current_dir();

            match ops::copy_tree(source, &backup) {
                Ok(outcome) => {
                    summary.copied_dirs += 1;
                    if let OpOutcome::TreeCopied { files } = outcome {
                        summary.tree_files += files;
                    }
                    report(
                        sink,
                        MirrorStatus::SyncDirCopied {
                            source: source.to_path_buf(),
                            backup,
                        },
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    report(sink, failure(source, &e));
                }
            }
        } else {
            match ops::copy_file(source, &backup) {
                Ok(_) => {
                    summary.copied_files += 1;
                    report(
                        sink,
                        MirrorStatus::SyncFileCopied {
                            source: source.to_path_buf(),
                            backup,
                        },
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    report(sink, failure(source, &e));
                }
            }
        }
    }

    summary.elapsed = started.elapsed();
    report(
        sink,
        MirrorStatus::SyncFinished {
            elapsed: summary.elapsed,
            files: summary.copied_files + summary.tree_files,
            dirs: summary.copied_dirs,
        },
    );

    Ok(summary)
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn failure(path: &Path, error: &MirrorError) -> MirrorStatus {
    MirrorStatus::OperationFailed {
        path: path.to_path_buf(),
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::MemorySink;
    use tempfile::TempDir;

    fn setup() -> (TempDir, MirrorPair) {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let backup = temp.path().join("backup");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&backup).unwrap();
        let pair = MirrorPair::new(&source, &backup).unwrap();
        (temp, pair)
    }

    #[test]
    fn test_sync_copies_into_empty_backup() {
        let (_temp, pair) = setup();
        fs::write(pair.source_root().join("a.txt"), b"x").unwrap();

        let sink = MemorySink::new();
        let summary = initial_sync(&pair, &sink).unwrap();

        assert_eq!(fs::read(pair.backup_root().join("a.txt")).unwrap(), b"x");
        assert_eq!(summary.copied_files, 1);
        assert_eq!(summary.failed, 0);
        assert!(matches!(
            sink.statuses().last(),
            Some(MirrorStatus::SyncFinished { files: 1, .. })
        ));
    }

    #[test]
    fn test_sync_copies_missing_directory_as_one_subtree() {
        let (_temp, pair) = setup();
        let src = pair.source_root();
        fs::create_dir_all(src.join("docs/2024/q1")).unwrap();
        fs::write(src.join("docs/readme.md"), b"r").unwrap();
        fs::write(src.join("docs/2024/q1/report.txt"), b"q1").unwrap();

        let sink = MemorySink::new();
        let summary = initial_sync(&pair, &sink).unwrap();

        // One subtree copy, no descent into it
        assert_eq!(summary.copied_dirs, 1);
        assert_eq!(summary.copied_files, 0);
        assert_eq!(summary.tree_files, 2);
        assert_eq!(
            fs::read(pair.backup_root().join("docs/2024/q1/report.txt")).unwrap(),
            b"q1"
        );
    }

    #[test]
    fn test_sync_descends_into_existing_directories() {
        let (_temp, pair) = setup();
        let src = pair.source_root();
        fs::create_dir_all(src.join("shared")).unwrap();
        fs::write(src.join("shared/new.txt"), b"new").unwrap();
        fs::create_dir_all(pair.backup_root().join("shared")).unwrap();

        let summary = initial_sync(&pair, &MemorySink::new()).unwrap();

        assert_eq!(summary.present, 1);
        assert_eq!(summary.copied_files, 1);
        assert!(pair.backup_root().join("shared/new.txt").exists());
    }

    #[test]
    fn test_sync_leaves_existing_entries_untouched() {
        let (_temp, pair) = setup();
        fs::write(pair.source_root().join("stale.txt"), b"fresh content").unwrap();
        fs::write(pair.backup_root().join("stale.txt"), b"old").unwrap();

        let summary = initial_sync(&pair, &MemorySink::new()).unwrap();

        assert_eq!(summary.copy_operations(), 0);
        assert_eq!(fs::read(pair.backup_root().join("stale.txt")).unwrap(), b"old");
    }

    #[test]
    fn test_second_sync_performs_no_copies() {
        let (_temp, pair) = setup();
        let src = pair.source_root();
        fs::create_dir_all(src.join("dir/sub")).unwrap();
        fs::write(src.join("a.txt"), b"a").unwrap();
        fs::write(src.join("dir/sub/b.txt"), b"b").unwrap();

        let first = initial_sync(&pair, &MemorySink::new()).unwrap();
        assert_eq!(first.copy_operations(), 2);

        let sink = MemorySink::new();
        let second = initial_sync(&pair, &sink).unwrap();

        assert_eq!(second.copy_operations(), 0);
        assert_eq!(second.present, 4);
        assert!(!sink
            .statuses()
            .iter()
            .any(|s| matches!(s, MirrorStatus::SyncFileCopied { .. } | MirrorStatus::SyncDirCopied { .. })));
    }

    #[test]
    fn test_sync_fails_when_source_root_vanished() {
        let (_temp, pair) = setup();
        fs::remove_dir(pair.source_root()).unwrap();

        assert!(matches!(
            initial_sync(&pair, &MemorySink::new()),
            Err(MirrorError::SourceRootGone(_))
        ));
    }
}
