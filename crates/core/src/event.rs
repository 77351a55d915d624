//! Filesystem change events consumed by the dispatcher

use std::path::{Path, PathBuf};

/// Type of filesystem change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Entry created
    Created,
    /// Entry content or metadata changed
    Modified,
    /// Entry removed
    Deleted,
    /// Entry renamed or moved to `dest`
    Moved { dest: PathBuf },
}

/// A single change reported by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    /// Type of change
    pub kind: EventKind,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Path that changed (the old path for moves)
    pub path: PathBuf,
}

impl FsEvent {
    pub fn created(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind: EventKind::Created,
            is_directory,
            path: path.into(),
        }
    }

    pub fn modified(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind: EventKind::Modified,
            is_directory,
            path: path.into(),
        }
    }

    pub fn deleted(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind: EventKind::Deleted,
            is_directory,
            path: path.into(),
        }
    }

    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind: EventKind::Moved { dest: to.into() },
            is_directory,
            path: from.into(),
        }
    }

    /// Destination of a move, if this is one
    pub fn dest_path(&self) -> Option<&Path> {
        match &self.kind {
            EventKind::Moved { dest } => Some(dest),
            _ => None,
        }
    }
}
