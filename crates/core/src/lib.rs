//! Mirroring engine for backmirror
//!
//! This crate provides:
//! - `MirrorPair` and source → backup path translation
//! - Idempotent mirror operations (copy, delete, rename)
//! - Presence-based initial sync
//! - The sequential event dispatcher
//! - Typed status lines and the `StatusSink` seam

pub mod dispatch;
pub mod error;
pub mod event;
pub mod ops;
pub mod pair;
pub mod status;
pub mod sync;

// Re-exports
pub use dispatch::{DispatchStats, Dispatcher, Shutdown, ShutdownHandle};
pub use error::{MirrorError, RootRole};
pub use event::{EventKind, FsEvent};
pub use ops::OpOutcome;
pub use pair::MirrorPair;
pub use status::{MemorySink, MirrorStatus, StatusSink};
pub use sync::{initial_sync, SyncReport};

/// Result type for mirroring operations
pub type Result<T> = std::result::Result<T, MirrorError>;
