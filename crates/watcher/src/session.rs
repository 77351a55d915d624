//! Monitoring session lifecycle
//!
//! A `MirrorController` drives one session through `Idle → Running →
//! Stopped`. Stopped is terminal; a new session needs a new controller.

use crate::watch::SourceWatcher;
use crate::ControlError;
use mirror_core::{
    initial_sync, DispatchStats, Dispatcher, MirrorPair, MirrorStatus, Shutdown, ShutdownHandle,
    StatusSink, SyncReport,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Statuses held while output is paused; older lines are dropped first
const BACKLOG_LIMIT: usize = 1000;

/// Lifecycle state of a monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

#[derive(Default)]
struct GateState {
    paused: bool,
    backlog: VecDeque<MirrorStatus>,
    dropped: usize,
}

/// Status sink that can hold output back while the console is hidden
///
/// Statuses emitted while paused are kept (up to a limit) and replayed on
/// resume. The engine still logs every status through `tracing`.
pub struct OutputGate {
    inner: Arc<dyn StatusSink>,
    state: Mutex<GateState>,
}

impl OutputGate {
    pub fn new(inner: Arc<dyn StatusSink>) -> Self {
        Self {
            inner,
            state: Mutex::new(GateState::default()),
        }
    }

    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    /// Resume output, replaying held statuses in order
    pub fn resume(&self) {
        let (backlog, dropped) = {
            let mut state = self.state.lock();
            state.paused = false;
            (std::mem::take(&mut state.backlog), std::mem::take(&mut state.dropped))
        };

        if dropped > 0 {
            warn!("{} status lines were dropped while output was paused", dropped);
        }
        for status in backlog {
            self.inner.emit(status);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }
}

impl StatusSink for OutputGate {
    fn emit(&self, status: MirrorStatus) {
        {
            let mut state = self.state.lock();
            if state.paused {
                if state.backlog.len() == BACKLOG_LIMIT {
                    state.backlog.pop_front();
                    state.dropped += 1;
                }
                state.backlog.push_back(status);
                return;
            }
        }
        self.inner.emit(status);
    }
}

struct ActiveSession {
    watcher: SourceWatcher,
    shutdown: ShutdownHandle,
    dispatcher: JoinHandle<mirror_core::Result<DispatchStats>>,
}

/// Control surface for the CLI: start, stop, pause and resume output
pub struct MirrorController {
    state: SessionState,
    output: Arc<OutputGate>,
    session: Option<ActiveSession>,
    last_sync: Option<SyncReport>,
}

impl MirrorController {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            state: SessionState::Idle,
            output: Arc::new(OutputGate::new(sink)),
            session: None,
            last_sync: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Report of the initial sync run by `start`, if one was requested
    pub fn last_sync(&self) -> Option<&SyncReport> {
        self.last_sync.as_ref()
    }

    /// Begin monitoring `pair`, optionally running an initial sync first
    ///
    /// The watcher is registered before the sync so changes made during the
    /// sync are queued and replayed afterwards.
    pub fn start(&mut self, pair: MirrorPair, run_initial_sync: bool) -> Result<(), ControlError> {
        match self.state {
            SessionState::Running => return Err(ControlError::AlreadyRunning),
            SessionState::Stopped => return Err(ControlError::Terminated),
            SessionState::Idle => {}
        }

        let (watcher, events) = SourceWatcher::start(&pair)?;

        if run_initial_sync {
            self.last_sync = Some(initial_sync(&pair, self.output.as_ref())?);
        }

        self.output.emit(MirrorStatus::Monitoring {
            source: pair.source_root().to_path_buf(),
        });

        let (shutdown, signal) = Shutdown::channel();
        let sink: Arc<dyn StatusSink> = self.output.clone();
        let dispatcher = Dispatcher::new(pair, sink);

        let handle = thread::Builder::new()
            .name("backmirror-dispatch".to_string())
            .spawn(move || dispatcher.run(&events, &signal))
            .map_err(|source| crate::WatchError::Spawn {
                name: "dispatcher",
                source,
            })?;

        self.session = Some(ActiveSession {
            watcher,
            shutdown,
            dispatcher: handle,
        });
        self.state = SessionState::Running;
        info!("Monitoring session started");

        Ok(())
    }

    /// True when the dispatcher loop has exited on its own (fatal error)
    pub fn session_ended(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |s| s.dispatcher.is_finished())
    }

    /// Stop the watcher and the dispatcher loop
    ///
    /// An in-flight mirror operation completes first. If the session had
    /// already ended with a fatal error, that error is returned.
    pub fn stop(&mut self) -> Result<DispatchStats, ControlError> {
        let session = match self.state {
            SessionState::Idle => return Err(ControlError::NotRunning),
            SessionState::Stopped => return Err(ControlError::Terminated),
            SessionState::Running => self.session.take().ok_or(ControlError::NotRunning)?,
        };
        self.state = SessionState::Stopped;

        let ActiveSession {
            mut watcher,
            shutdown,
            dispatcher,
        } = session;

        shutdown.trigger();
        watcher.stop();

        let result = dispatcher.join().map_err(|_| ControlError::DispatcherPanicked)?;

        // Flush anything held back so the final lines are not lost
        self.output.resume();
        self.output.emit(MirrorStatus::Stopped);
        info!("Monitoring session stopped");

        Ok(result?)
    }

    pub fn pause_output(&self) {
        self.output.pause();
    }

    pub fn resume_output(&self) {
        self.output.resume();
    }

    pub fn is_output_paused(&self) -> bool {
        self.output.is_paused()
    }
}

impl Drop for MirrorController {
    fn drop(&mut self) {
        if self.state == SessionState::Running {
            if let Err(e) = self.stop() {
                warn!("Monitoring session ended with error: {}", e);
            }
        }
    }
}
