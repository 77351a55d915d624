//! Source/backup root pair and path translation

use crate::error::{MirrorError, RootRole};
use crate::Result;
use std::path::{Component, Path, PathBuf};

/// The two directory trees of a monitoring session
///
/// Both roots are canonical, existing, distinct directories and neither
/// contains the other. A pair is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorPair {
    source_root: PathBuf,
    backup_root: PathBuf,
}

impl MirrorPair {
    /// Validate and canonicalize a source/backup pair
    pub fn new(source_root: impl AsRef<Path>, backup_root: impl AsRef<Path>) -> Result<Self> {
        let source_root = validate_root(source_root.as_ref(), RootRole::Source)?;
        let backup_root = validate_root(backup_root.as_ref(), RootRole::Backup)?;

        if source_root == backup_root {
            return Err(MirrorError::SameRoots(source_root));
        }
        if backup_root.starts_with(&source_root) {
            return Err(MirrorError::NestedRoots {
                outer: source_root,
                inner: backup_root,
            });
        }
        if source_root.starts_with(&backup_root) {
            return Err(MirrorError::NestedRoots {
                outer: backup_root,
                inner: source_root,
            });
        }

        Ok(Self {
            source_root,
            backup_root,
        })
    }

    /// Root of the tree being watched
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Root of the mirror tree
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Path of `entry` relative to the source root
    ///
    /// Fails when `entry` is not under the source root or climbs out of it
    /// through `..` components.
    pub fn relative<'a>(&self, entry: &'a Path) -> Result<&'a Path> {
        let outside = || MirrorError::OutsideSource {
            path: entry.to_path_buf(),
            root: self.source_root.clone(),
        };

        let rel = entry.strip_prefix(&self.source_root).map_err(|_| outside())?;
        if rel.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(outside());
        }
        Ok(rel)
    }

    /// Map a path under the source root to its counterpart under the backup root
    pub fn to_backup_path(&self, entry: &Path) -> Result<PathBuf> {
        let rel = self.relative(entry)?;
        Ok(self.backup_root.join(rel))
    }

    /// True when `entry` is the source root itself
    pub fn is_source_root(&self, entry: &Path) -> bool {
        entry == self.source_root
    }
}

fn validate_root(path: &Path, role: RootRole) -> Result<PathBuf> {
    let invalid = |reason: String| MirrorError::InvalidRoot {
        role,
        path: path.to_path_buf(),
        reason,
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty".to_string()));
    }
    if !path.is_absolute() {
        return Err(invalid("path is not absolute".to_string()));
    }

    let canonical = path
        .canonicalize()
        .map_err(|e| invalid(format!("cannot resolve path ({})", e)))?;

    if !canonical.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn pair_in(temp: &TempDir) -> MirrorPair {
        let source = temp.path().join("source");
        let backup = temp.path().join("backup");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&backup).unwrap();
        MirrorPair::new(&source, &backup).unwrap()
    }

    #[test]
    fn test_translate_preserves_structure() {
        let temp = TempDir::new().unwrap();
        let pair = pair_in(&temp);

        let entry = pair.source_root().join("a/b/c.txt");
        let mapped = pair.to_backup_path(&entry).unwrap();

        assert_eq!(mapped, pair.backup_root().join("a/b/c.txt"));
        assert!(mapped.starts_with(pair.backup_root()));
    }

    #[test]
    fn test_translate_root_maps_to_backup_root() {
        let temp = TempDir::new().unwrap();
        let pair = pair_in(&temp);

        let mapped = pair.to_backup_path(pair.source_root()).unwrap();
        assert_eq!(mapped, pair.backup_root());
        assert!(pair.is_source_root(pair.source_root()));
    }

    #[test]
    fn test_translate_rejects_outside_paths() {
        let temp = TempDir::new().unwrap();
        let pair = pair_in(&temp);

        let outside = temp.path().join("elsewhere/file.txt");
        assert!(matches!(
            pair.to_backup_path(&outside),
            Err(MirrorError::OutsideSource { .. })
        ));

        // Sibling with a shared string prefix is still outside
        let sibling = temp.path().join("source-old/file.txt");
        assert!(pair.to_backup_path(&sibling).is_err());

        // Climbing out through `..` is rejected
        let escaping = pair.source_root().join("../backup/file.txt");
        assert!(pair.to_backup_path(&escaping).is_err());
    }

    #[test]
    fn test_new_rejects_invalid_roots() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        fs::create_dir_all(&source).unwrap();

        // Missing backup
        let missing = temp.path().join("missing");
        assert!(matches!(
            MirrorPair::new(&source, &missing),
            Err(MirrorError::InvalidRoot { role: RootRole::Backup, .. })
        ));

        // Relative source
        assert!(matches!(
            MirrorPair::new("relative/dir", &source),
            Err(MirrorError::InvalidRoot { role: RootRole::Source, .. })
        ));

        // File instead of directory
        let file = temp.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        assert!(MirrorPair::new(&source, &file).is_err());

        // Same directory
        assert!(matches!(
            MirrorPair::new(&source, &source),
            Err(MirrorError::SameRoots(_))
        ));
    }

    #[test]
    fn test_new_rejects_nested_roots() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let nested = source.join("backup");
        fs::create_dir_all(&nested).unwrap();

        assert!(matches!(
            MirrorPair::new(&source, &nested),
            Err(MirrorError::NestedRoots { .. })
        ));
        assert!(matches!(
            MirrorPair::new(&nested, &source),
            Err(MirrorError::NestedRoots { .. })
        ));
    }
}
