//! Sequential event dispatcher
//!
//! Maps each `FsEvent` to one mirror operation and applies it before
//! accepting the next event. Events are never batched, coalesced, or
//! reordered.

use crate::error::MirrorError;
use crate::event::{EventKind, FsEvent};
use crate::ops::{self, OpOutcome};
use crate::pair::MirrorPair;
use crate::status::{report, MirrorStatus, StatusSink};
use crate::Result;
use crossbeam_channel::{select, Receiver, Sender, TryRecvError};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Sending half of a cancellation signal
///
/// Triggering (or dropping) the handle tells the dispatcher loop to exit at
/// its next event boundary.
#[derive(Debug)]
pub struct ShutdownHandle {
    _tx: Sender<()>,
}

impl ShutdownHandle {
    /// Signal shutdown
    pub fn trigger(self) {}
}

/// Receiving half of a cancellation signal
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: Receiver<()>,
}

impl Shutdown {
    /// Create a linked handle/signal pair
    pub fn channel() -> (ShutdownHandle, Shutdown) {
        // Nothing is ever sent; disconnection is the signal
        let (tx, rx) = crossbeam_channel::bounded(0);
        (ShutdownHandle { _tx: tx }, Shutdown { rx })
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Counters for one dispatcher run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events that resulted in a mirror operation
    pub handled: usize,
    /// Events whose operation failed with an I/O error
    pub failed: usize,
    /// Directory create/modify events, which need no action
    pub ignored: usize,
}

/// Applies filesystem events to the backup tree
pub struct Dispatcher {
    pair: MirrorPair,
    sink: Arc<dyn StatusSink>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(pair: MirrorPair, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            pair,
            sink,
            stats: DispatchStats::default(),
        }
    }

    pub fn pair(&self) -> &MirrorPair {
        &self.pair
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Consume events until shutdown, end of stream, or a fatal error
    ///
    /// Upstream failures arrive as `Err` items and end the run. I/O failures
    /// of single operations are reported and do not.
    pub fn run(
        mut self,
        events: &Receiver<Result<FsEvent>>,
        shutdown: &Shutdown,
    ) -> Result<DispatchStats> {
        loop {
            if shutdown.is_triggered() {
                debug!("Dispatcher received shutdown");
                break;
            }

            select! {
                recv(events) -> msg => match msg {
                    Ok(Ok(event)) => self.handle(&event)?,
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        debug!("Event source closed");
                        break;
                    }
                },
                recv(shutdown.rx) -> _ => {
                    debug!("Dispatcher received shutdown");
                    break;
                }
            }
        }

        Ok(self.stats)
    }

    /// Apply a single event
    ///
    /// Returns `Err` only for errors fatal to the session: a path outside the
    /// source root, or the source root itself disappearing.
    pub fn handle(&mut self, event: &FsEvent) -> Result<()> {
        match &event.kind {
            EventKind::Created | EventKind::Modified => {
                if event.is_directory {
                    // Directories appear on the backup side with their first file
                    debug!("Ignoring directory event for {}", event.path.display());
                    self.stats.ignored += 1;
                    return Ok(());
                }

                let backup = self.pair.to_backup_path(&event.path)?;
                let result = ops::copy_file(&event.path, &backup).map(|_| MirrorStatus::BackedUp {
                    source: event.path.clone(),
                    backup,
                });
                self.finish(&event.path, result);
            }
            EventKind::Deleted => {
                self.check_source_root(&event.path)?;
                let backup = self.pair.to_backup_path(&event.path)?;

                let result = if event.is_directory {
                    ops::delete_tree(&backup).map(|outcome| match outcome {
                        OpOutcome::AlreadyAbsent => MirrorStatus::DirNotFound { backup },
                        _ => MirrorStatus::DirDeleted { backup },
                    })
                } else {
                    ops::delete_file(&backup).map(|outcome| match outcome {
                        OpOutcome::AlreadyAbsent => MirrorStatus::FileNotFound { backup },
                        _ => MirrorStatus::FileDeleted { backup },
                    })
                };
                self.finish(&event.path, result);
            }
            EventKind::Moved { dest } => {
                self.check_source_root(&event.path)?;
                let from = self.pair.to_backup_path(&event.path)?;
                let to = self.pair.to_backup_path(dest)?;
                let is_dir = event.is_directory;

                let result = ops::rename_entry(&from, &to).map(|outcome| {
                    match (outcome, is_dir) {
                        (OpOutcome::SourceMissing, false) => MirrorStatus::FileRenameMissing { from },
                        (OpOutcome::SourceMissing, true) => MirrorStatus::DirRenameMissing { from },
                        (_, false) => MirrorStatus::FileRenamed { from, to },
                        (_, true) => MirrorStatus::DirRenamed { from, to },
                    }
                });
                self.finish(&event.path, result);
            }
        }

        Ok(())
    }

    fn check_source_root(&self, path: &Path) -> Result<()> {
        if self.pair.is_source_root(path) {
            return Err(MirrorError::SourceRootGone(path.to_path_buf()));
        }
        Ok(())
    }

    fn finish(&mut self, path: &Path, result: Result<MirrorStatus>) {
        match result {
            Ok(status) => {
                self.stats.handled += 1;
                report(self.sink.as_ref(), status);
            }
            Err(e) => {
                self.stats.failed += 1;
                report(
                    self.sink.as_ref(),
                    MirrorStatus::OperationFailed {
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    },
                );
            }
        }
    }
}
