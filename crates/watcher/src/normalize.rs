//! Raw notify event → `FsEvent` normalization
//!
//! Backends report renames differently: inotify sends a `From` half, a `To`
//! half, then a combined `Both` event sharing one tracker; Windows sends the
//! two halves only; FSEvents sends an unpaired `Any` per path. The normalizer
//! pairs halves into a single `Moved` event and degrades unpaired halves into
//! deletes (moved out of the tree) or creates (moved in).

use mirror_core::{FsEvent, MirrorPair};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;
use walkdir::WalkDir;

/// How long a `From` half waits for its `To` half before it is treated as a
/// move out of the watched tree
pub const RENAME_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct PendingRename {
    path: PathBuf,
    tracker: Option<usize>,
    is_directory: bool,
    since: Instant,
}

/// Stateful converter from notify events to mirror events
pub struct EventNormalizer {
    pair: MirrorPair,
    pending: Option<PendingRename>,
    /// Last rename emitted from paired halves, so the trailing `Both` is skipped
    last_pair: Option<(PathBuf, PathBuf)>,
}

impl EventNormalizer {
    pub fn new(pair: MirrorPair) -> Self {
        Self {
            pair,
            pending: None,
            last_pair: None,
        }
    }

    /// True while a rename half is waiting for its partner
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Convert one raw event into zero or more mirror events
    pub fn push(&mut self, event: Event) -> Vec<FsEvent> {
        let mut out = Vec::new();

        if let EventKind::Modify(ModifyKind::Name(mode)) = event.kind {
            self.push_rename(mode, &event, &mut out);
            return out;
        }

        // Any other event closes the rename window
        out.extend(self.flush());
        self.last_pair = None;

        match event.kind {
            EventKind::Create(kind) => {
                for path in &event.paths {
                    if !exists(path) {
                        debug!("Created entry already gone: {}", path.display());
                        continue;
                    }
                    let is_directory = match kind {
                        CreateKind::Folder => true,
                        CreateKind::File => false,
                        _ => path.is_dir(),
                    };
                    if is_directory {
                        // Entries written before the new directory was watched raise no events
                        self.appeared(path, &mut out);
                    } else {
                        out.push(FsEvent::created(path.clone(), false));
                    }
                }
            }
            EventKind::Modify(_) => {
                for path in &event.paths {
                    if !exists(path) {
                        // The matching remove event handles it
                        debug!("Modified entry already gone: {}", path.display());
                        continue;
                    }
                    out.push(FsEvent::modified(path.clone(), path.is_dir()));
                }
            }
            EventKind::Remove(kind) => {
                for path in &event.paths {
                    let is_directory = match kind {
                        RemoveKind::Folder => true,
                        RemoveKind::File => false,
                        _ => self.backup_is_dir(path),
                    };
                    out.push(FsEvent::deleted(path.clone(), is_directory));
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {
                debug!("Ignoring {:?} for {:?}", event.kind, event.paths);
            }
        }

        out
    }

    /// Emit a pending rename half as a delete once its window has passed
    pub fn flush_expired(&mut self, now: Instant) -> Option<FsEvent> {
        let expired = self
            .pending
            .as_ref()
            .map_or(false, |p| now.duration_since(p.since) >= RENAME_WINDOW);

        if expired {
            self.flush()
        } else {
            None
        }
    }

    /// Emit any pending rename half as a delete
    pub fn flush(&mut self) -> Option<FsEvent> {
        self.pending
            .take()
            .map(|p| FsEvent::deleted(p.path, p.is_directory))
    }

    fn push_rename(&mut self, mode: RenameMode, event: &Event, out: &mut Vec<FsEvent>) {
        let tracker = event.tracker();

        match mode {
            RenameMode::Both if event.paths.len() >= 2 => {
                let from = event.paths[0].clone();
                let to = event.paths[1].clone();

                if self.last_pair.take().as_ref() == Some(&(from.clone(), to.clone())) {
                    // Already emitted when the halves were paired
                    return;
                }

                match self.pending.take() {
                    Some(p) if p.path == from => {}
                    Some(p) => out.push(FsEvent::deleted(p.path, p.is_directory)),
                    None => {}
                }
                let is_directory = to.is_dir();
                out.push(FsEvent::moved(from, to, is_directory));
            }
            RenameMode::From => {
                for path in &event.paths {
                    // Only the latest half waits for a partner
                    out.extend(self.flush());
                    self.pending = Some(PendingRename {
                        path: path.clone(),
                        tracker,
                        is_directory: self.backup_is_dir(path),
                        since: Instant::now(),
                    });
                }
            }
            RenameMode::To => {
                for path in &event.paths {
                    match self.pending.take() {
                        Some(p) if p.tracker == tracker => {
                            let is_directory = path.is_dir() || p.is_directory;
                            self.last_pair = Some((p.path.clone(), path.clone()));
                            out.push(FsEvent::moved(p.path, path.clone(), is_directory));
                        }
                        other => {
                            if let Some(p) = other {
                                out.push(FsEvent::deleted(p.path, p.is_directory));
                            }
                            self.appeared(path, out);
                        }
                    }
                }
            }
            _ => {
                // Unpaired rename: decide by what is on disk now
                out.extend(self.flush());
                for path in &event.paths {
                    if exists(path) {
                        self.appeared(path, out);
                    } else {
                        out.push(FsEvent::deleted(path.clone(), self.backup_is_dir(path)));
                    }
                }
            }
        }
    }

    /// An entry appeared under the source root: created, or moved in from
    /// outside
    ///
    /// A new directory can already hold files by the time it is watched, and
    /// those raise no events of their own, so each contained file is reported
    /// as created.
    fn appeared(&self, path: &Path, out: &mut Vec<FsEvent>) {
        if !path.is_dir() {
            if exists(path) {
                out.push(FsEvent::created(path.to_path_buf(), false));
            }
            return;
        }

        out.push(FsEvent::created(path.to_path_buf(), true));
        for entry in WalkDir::new(path).min_depth(1).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_dir() {
                out.push(FsEvent::created(entry.path().to_path_buf(), false));
            }
        }
    }

    /// Whether the backup counterpart of a vanished source path is a directory
    fn backup_is_dir(&self, path: &Path) -> bool {
        self.pair
            .to_backup_path(path)
            .map(|backup| backup.is_dir())
            .unwrap_or(false)
    }
}

fn exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::EventKind as MirrorKind;
    use notify::event::{DataChange, ModifyKind};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        pair: MirrorPair,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::create_dir_all(temp.path().join("source")).unwrap();
            fs::create_dir_all(temp.path().join("backup")).unwrap();
            let pair =
                MirrorPair::new(temp.path().join("source"), temp.path().join("backup")).unwrap();
            Self { _temp: temp, pair }
        }

        fn src(&self, rel: &str) -> PathBuf {
            self.pair.source_root().join(rel)
        }

        fn normalizer(&self) -> EventNormalizer {
            EventNormalizer::new(self.pair.clone())
        }
    }

    fn rename(mode: RenameMode, paths: &[&Path], tracker: Option<usize>) -> Event {
        let mut event = Event::new(EventKind::Modify(ModifyKind::Name(mode)));
        for path in paths {
            event = event.add_path(path.to_path_buf());
        }
        match tracker {
            Some(t) => event.set_tracker(t),
            None => event,
        }
    }

    #[test]
    fn test_create_and_modify_map_directly() {
        let fx = Fixture::new();
        fs::write(fx.src("a.txt"), b"a").unwrap();
        fs::create_dir(fx.src("dir")).unwrap();
        let mut n = fx.normalizer();

        let created = n.push(Event::new(EventKind::Create(CreateKind::File)).add_path(fx.src("a.txt")));
        assert_eq!(created, vec![FsEvent::created(fx.src("a.txt"), false)]);

        let dir = n.push(Event::new(EventKind::Create(CreateKind::Any)).add_path(fx.src("dir")));
        assert_eq!(dir, vec![FsEvent::created(fx.src("dir"), true)]);

        let modified = n.push(
            Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
                .add_path(fx.src("a.txt")),
        );
        assert_eq!(modified, vec![FsEvent::modified(fx.src("a.txt"), false)]);
    }

    #[test]
    fn test_created_directory_reports_files_already_inside() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.src("fresh/a/b")).unwrap();
        fs::write(fx.src("fresh/a/b/f.txt"), b"f").unwrap();
        let mut n = fx.normalizer();

        let out = n.push(Event::new(EventKind::Create(CreateKind::Folder)).add_path(fx.src("fresh")));

        assert_eq!(out[0], FsEvent::created(fx.src("fresh"), true));
        assert!(out.contains(&FsEvent::created(fx.src("fresh/a/b/f.txt"), false)));
        assert_eq!(out.iter().filter(|e| !e.is_directory).count(), 1);
    }

    #[test]
    fn test_events_for_vanished_entries_are_skipped() {
        let fx = Fixture::new();
        let mut n = fx.normalizer();

        let out = n.push(
            Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)))
                .add_path(fx.src("temp.swp")),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_remove_any_uses_backup_side_kind() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.pair.backup_root().join("olddir")).unwrap();
        let mut n = fx.normalizer();

        let out = n.push(Event::new(EventKind::Remove(RemoveKind::Any)).add_path(fx.src("olddir")));
        assert_eq!(out, vec![FsEvent::deleted(fx.src("olddir"), true)]);

        let out = n.push(Event::new(EventKind::Remove(RemoveKind::Any)).add_path(fx.src("f.txt")));
        assert_eq!(out, vec![FsEvent::deleted(fx.src("f.txt"), false)]);
    }

    #[test]
    fn test_inotify_rename_sequence_yields_one_move() {
        let fx = Fixture::new();
        fs::write(fx.src("new.txt"), b"n").unwrap();
        let (old, new) = (fx.src("old.txt"), fx.src("new.txt"));
        let mut n = fx.normalizer();

        assert!(n.push(rename(RenameMode::From, &[&old], Some(7))).is_empty());
        assert!(n.has_pending());

        let moved = n.push(rename(RenameMode::To, &[&new], Some(7)));
        assert_eq!(moved, vec![FsEvent::moved(&old, &new, false)]);

        // Trailing combined event is a duplicate
        assert!(n.push(rename(RenameMode::Both, &[&old, &new], Some(7))).is_empty());
        assert!(!n.has_pending());
    }

    #[test]
    fn test_both_without_halves_is_a_move() {
        let fx = Fixture::new();
        fs::create_dir(fx.src("dir2")).unwrap();
        let mut n = fx.normalizer();

        let out = n.push(rename(RenameMode::Both, &[&fx.src("dir"), &fx.src("dir2")], None));
        assert_eq!(out.len(), 1);
        assert!(out[0].is_directory);
        assert_eq!(out[0].dest_path(), Some(fx.src("dir2").as_path()));
    }

    #[test]
    fn test_unpaired_from_becomes_delete() {
        let fx = Fixture::new();
        let gone = fx.src("moved-away.txt");
        let mut n = fx.normalizer();

        n.push(rename(RenameMode::From, &[&gone], Some(1)));
        assert!(n.flush_expired(Instant::now() - RENAME_WINDOW).is_none());

        let flushed = n.flush_expired(Instant::now() + RENAME_WINDOW).unwrap();
        assert_eq!(flushed, FsEvent::deleted(&gone, false));
        assert!(!n.has_pending());
    }

    #[test]
    fn test_other_event_closes_rename_window() {
        let fx = Fixture::new();
        fs::write(fx.src("b.txt"), b"b").unwrap();
        let mut n = fx.normalizer();

        n.push(rename(RenameMode::From, &[&fx.src("a.txt")], Some(3)));
        let out = n.push(Event::new(EventKind::Create(CreateKind::File)).add_path(fx.src("b.txt")));

        assert_eq!(out.len(), 2);
        assert!(matches!(out[0].kind, MirrorKind::Deleted));
        assert!(matches!(out[1].kind, MirrorKind::Created));
    }

    #[test]
    fn test_directory_moved_in_reports_its_files() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.src("incoming/sub")).unwrap();
        fs::write(fx.src("incoming/a.txt"), b"a").unwrap();
        fs::write(fx.src("incoming/sub/b.txt"), b"b").unwrap();
        let mut n = fx.normalizer();

        let out = n.push(rename(RenameMode::To, &[&fx.src("incoming")], Some(9)));

        let files: Vec<_> = out.iter().filter(|e| !e.is_directory).map(|e| e.path.clone()).collect();
        assert_eq!(files.len(), 2);
        assert!(files.contains(&fx.src("incoming/a.txt")));
        assert!(files.contains(&fx.src("incoming/sub/b.txt")));
    }

    #[test]
    fn test_unpaired_any_rename_checks_disk() {
        let fx = Fixture::new();
        fs::write(fx.src("here.txt"), b"h").unwrap();
        let mut n = fx.normalizer();

        let out = n.push(rename(RenameMode::Any, &[&fx.src("here.txt"), &fx.src("gone.txt")], None));

        assert_eq!(
            out,
            vec![
                FsEvent::created(fx.src("here.txt"), false),
                FsEvent::deleted(fx.src("gone.txt"), false),
            ]
        );
    }
}
