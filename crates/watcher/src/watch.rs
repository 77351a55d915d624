//! notify-backed watcher over a source root
//!
//! Raw notify events arrive on the platform watcher's own thread and are
//! forwarded into a channel. A pump thread runs them through the
//! `EventNormalizer` and hands `FsEvent`s to the dispatcher.

use crate::normalize::{EventNormalizer, RENAME_WINDOW};
use crate::WatchError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use mirror_core::{FsEvent, MirrorError, MirrorPair};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Item type of the normalized event stream
pub type EventResult = mirror_core::Result<FsEvent>;

/// Recursive watcher over `MirrorPair::source_root`
pub struct SourceWatcher {
    watcher: Option<RecommendedWatcher>,
    pump: Option<JoinHandle<()>>,
}

impl SourceWatcher {
    /// Start watching and return the normalized event stream
    ///
    /// The stream is unbounded: a slow dispatcher builds a backlog here.
    pub fn start(pair: &MirrorPair) -> Result<(Self, Receiver<EventResult>), WatchError> {
        let (raw_tx, raw_rx) = crossbeam_channel::unbounded::<notify::Result<Event>>();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the session is shutting down
            let _ = raw_tx.send(res);
        })
        .map_err(WatchError::Init)?;

        watcher
            .watch(pair.source_root(), RecursiveMode::Recursive)
            .map_err(|source| WatchError::Watch {
                path: pair.source_root().to_path_buf(),
                source,
            })?;

        let normalizer = EventNormalizer::new(pair.clone());
        let pump = thread::Builder::new()
            .name("backmirror-pump".to_string())
            .spawn(move || pump(raw_rx, events_tx, normalizer))
            .map_err(|source| WatchError::Spawn {
                name: "event pump",
                source,
            })?;

        info!("Watching {}", pair.source_root().display());

        Ok((
            Self {
                watcher: Some(watcher),
                pump: Some(pump),
            },
            events_rx,
        ))
    }

    /// Stop watching and wait for the pump to drain
    pub fn stop(&mut self) {
        // Dropping the watcher drops its sender, which ends the pump
        if self.watcher.take().is_some() {
            debug!("File watcher dropped");
        }
        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                warn!("Event pump thread panicked");
            }
        }
    }
}

impl Drop for SourceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pump(
    raw_rx: Receiver<notify::Result<Event>>,
    events_tx: Sender<EventResult>,
    mut normalizer: EventNormalizer,
) {
    let forward = |event: FsEvent| events_tx.send(Ok(event)).is_ok();

    loop {
        let msg = if normalizer.has_pending() {
            raw_rx.recv_timeout(RENAME_WINDOW)
        } else {
            raw_rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        };

        match msg {
            Ok(Ok(event)) => {
                for fs_event in normalizer.push(event) {
                    if !forward(fs_event) {
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                warn!("File watcher error: {}", e);
                if events_tx.send(Err(MirrorError::Watcher(e.to_string()))).is_err() {
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(fs_event) = normalizer.flush_expired(Instant::now()) {
                    if !forward(fs_event) {
                        return;
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(fs_event) = normalizer.flush() {
                    forward(fs_event);
                }
                debug!("Event pump exiting");
                return;
            }
        }
    }
}
