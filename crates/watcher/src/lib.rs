//! File system watching and session lifecycle for backmirror
//!
//! This crate provides:
//! - A `notify`-backed watcher over the source root
//! - Normalization of raw notify events into `FsEvent`s (rename pairing)
//! - The `MirrorController` that starts and stops monitoring sessions

pub mod normalize;
pub mod session;
pub mod watch;

use mirror_core::MirrorError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use normalize::EventNormalizer;
pub use session::{MirrorController, OutputGate, SessionState};
pub use watch::SourceWatcher;

/// Errors raised while setting up or tearing down a watcher
#[derive(Debug, Error)]
pub enum WatchError {
    /// The platform watcher could not be created
    #[error("failed to create file watcher: {0}")]
    Init(#[source] notify::Error),

    /// The source root could not be registered with the watcher
    #[error("failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// A worker thread could not be spawned
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Errors returned by `MirrorController` commands
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("a monitoring session is already running")]
    AlreadyRunning,

    #[error("no monitoring session is running")]
    NotRunning,

    /// Stopped is terminal; a controller is not restarted
    #[error("monitoring session has already been stopped")]
    Terminated,

    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Initial sync failed or the session ended with a fatal error
    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error("dispatcher thread panicked")]
    DispatcherPanicked,
}
