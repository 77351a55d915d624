//! Error taxonomy for the mirroring engine

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Which side of a `MirrorPair` a configuration error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootRole {
    Source,
    Backup,
}

impl fmt::Display for RootRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootRole::Source => write!(f, "source"),
            RootRole::Backup => write!(f, "backup"),
        }
    }
}

/// Errors produced by the mirroring engine
#[derive(Debug, Error)]
pub enum MirrorError {
    /// A root failed validation before monitoring could start
    #[error("invalid {role} root {}: {reason}", path.display())]
    InvalidRoot {
        role: RootRole,
        path: PathBuf,
        reason: String,
    },

    /// Source and backup resolve to the same directory
    #[error("source and backup roots are the same directory: {}", .0.display())]
    SameRoots(PathBuf),

    /// One root lies inside the other
    #[error("{} is nested inside {}", inner.display(), outer.display())]
    NestedRoots { outer: PathBuf, inner: PathBuf },

    /// An event path does not lie under the source root (watcher misconfiguration)
    #[error("path {} lies outside source root {}", path.display(), root.display())]
    OutsideSource { path: PathBuf, root: PathBuf },

    /// A filesystem operation against the backup tree failed
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source root was removed or moved away while being watched
    #[error("source root {} is no longer reachable", .0.display())]
    SourceRootGone(PathBuf),

    /// The upstream event source reported a failure
    #[error("watcher failure: {0}")]
    Watcher(String),
}

impl MirrorError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        MirrorError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// True for errors that end a monitoring session rather than a single operation
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MirrorError::Io { .. })
    }
}
