//! Idempotent mirror operations against the backup tree
//!
//! Every operation can be re-applied after a crash or a duplicate event
//! without failing: absent targets are reported through `OpOutcome`, never
//! as errors.

use crate::error::MirrorError;
use crate::Result;
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// What a mirror operation actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    /// File content and metadata copied
    Copied,
    /// Directory tree copied; carries the number of files written
    TreeCopied { files: usize },
    /// Target removed
    Removed,
    /// Target was already gone; nothing to do
    AlreadyAbsent,
    /// Entry renamed
    Renamed,
    /// Rename source missing on the backup side; nothing to do
    SourceMissing,
}

/// Create all missing ancestors of `path`
pub fn ensure_parent_directory(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| MirrorError::io("create parent directory of", path, e))?;
        }
    }
    Ok(())
}

/// Copy `src` to `dst`, overwriting, keeping permissions and timestamps
///
/// The copy is a snapshot of `src` at call time; a file being written
/// concurrently may be mirrored partially.
pub fn copy_file(src: &Path, dst: &Path) -> Result<OpOutcome> {
    ensure_parent_directory(dst)?;

    // fs::copy carries permission bits over
    fs::copy(src, dst).map_err(|e| MirrorError::io("copy", src, e))?;

    let meta = fs::metadata(src).map_err(|e| MirrorError::io("read metadata of", src, e))?;
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_times(dst, atime, mtime)
        .map_err(|e| MirrorError::io("set timestamps on", dst, e))?;

    Ok(OpOutcome::Copied)
}

/// Copy a directory and all its descendants from `src` to `dst`
///
/// Existing entries under `dst` are overwritten. Directory permissions are
/// applied once the whole tree is written, so read-only source directories
/// still receive their contents.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<OpOutcome> {
    let mut files = 0;
    let mut dirs = Vec::new();

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            MirrorError::io("walk", path, io::Error::from(e))
        })?;

        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| MirrorError::io("create directory", &target, e))?;
            dirs.push((entry.path().to_path_buf(), target));
        } else {
            copy_file(entry.path(), &target)?;
            files += 1;
        }
    }

    // Deepest first
    for (source_dir, target) in dirs.iter().rev() {
        copy_permissions(source_dir, target)?;
    }

    Ok(OpOutcome::TreeCopied { files })
}

/// Remove the file at `dst`; a missing file is a no-op
pub fn delete_file(dst: &Path) -> Result<OpOutcome> {
    if fs::symlink_metadata(dst).is_err() {
        return Ok(OpOutcome::AlreadyAbsent);
    }

    match fs::remove_file(dst) {
        Ok(()) => Ok(OpOutcome::Removed),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(OpOutcome::AlreadyAbsent),
        Err(e) => Err(MirrorError::io("delete", dst, e)),
    }
}

/// Recursively remove the directory at `dst`; a missing directory is a no-op
pub fn delete_tree(dst: &Path) -> Result<OpOutcome> {
    let meta = match fs::symlink_metadata(dst) {
        Ok(meta) => meta,
        Err(_) => return Ok(OpOutcome::AlreadyAbsent),
    };

    // A symlink or a file where a directory was expected is removed as-is
    let removed = if meta.is_dir() {
        fs::remove_dir_all(dst)
    } else {
        debug!("Expected directory at {}, removing file", dst.display());
        fs::remove_file(dst)
    };

    match removed {
        Ok(()) => Ok(OpOutcome::Removed),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(OpOutcome::AlreadyAbsent),
        Err(e) => Err(MirrorError::io("delete directory", dst, e)),
    }
}

/// Rename `old_dst` to `new_dst` inside the backup tree
///
/// A missing `old_dst` is reported as `SourceMissing`: the entry may have
/// been mirrored under its new name already, or never existed on the backup
/// side.
pub fn rename_entry(old_dst: &Path, new_dst: &Path) -> Result<OpOutcome> {
    if fs::symlink_metadata(old_dst).is_err() {
        return Ok(OpOutcome::SourceMissing);
    }

    ensure_parent_directory(new_dst)?;
    fs::rename(old_dst, new_dst).map_err(|e| MirrorError::io("rename", old_dst, e))?;

    Ok(OpOutcome::Renamed)
}

fn copy_permissions(src: &Path, dst: &Path) -> Result<()> {
    let perms = fs::metadata(src)
        .map_err(|e| MirrorError::io("read metadata of", src, e))?
        .permissions();
    fs::set_permissions(dst, perms).map_err(|e| MirrorError::io("set permissions on", dst, e))
}
