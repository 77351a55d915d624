//! Lock file keeping one monitor per configuration
//!
//! The mirroring engine assumes it is the only writer to the backup tree;
//! this lock stops a second `bm start` or `bm sync` from racing it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Re-reads of a held lock whose content is not written yet
const HOLDER_READ_ATTEMPTS: usize = 5;
const HOLDER_READ_DELAY: Duration = Duration::from_millis(50);

/// Held for the lifetime of a monitoring or sync run
pub struct MonitorLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Debug, Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    started_at: u64,
    backup: PathBuf,
}

impl MonitorLock {
    /// Acquire the lock under `config_dir/locks/`
    ///
    /// Fails if another live process holds it. A lock left behind by a dead
    /// process is removed and retaken.
    pub fn acquire(config_dir: &Path, backup_root: &Path) -> Result<Self> {
        let lock_path = config_dir.join("locks/monitor.lock");

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create locks directory")?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)
            .context("Failed to open lock file")?;

        if !try_flock_exclusive(&file)? {
            match Self::read_holder(&mut file) {
                Some(holder) if !is_process_alive(holder.pid) => {
                    tracing::warn!("Removing stale monitor lock (pid {})", holder.pid);
                    drop(file);
                    std::fs::remove_file(&lock_path)?;
                    return Self::acquire(config_dir, backup_root);
                }
                Some(holder) => anyhow::bail!(
                    "Another backmirror process (pid {}) is already mirroring into {}",
                    holder.pid,
                    holder.backup.display()
                ),
                None => anyhow::bail!(
                    "Another backmirror process is already mirroring (lock file {} is held)",
                    lock_path.display()
                ),
            }
        }

        Self::write_lock_content(&mut file, backup_root)?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }

    fn write_lock_content(file: &mut File, backup_root: &Path) -> Result<()> {
        let content = LockContent {
            pid: std::process::id(),
            started_at: current_timestamp_ms(),
            backup: backup_root.to_path_buf(),
        };
        let serialized =
            serde_json::to_string(&content).context("Failed to serialize lock content")?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Content of a lock held by someone else
    ///
    /// The holder writes its content just after locking, so an empty or
    /// partial file is re-read a few times before giving up.
    fn read_holder(file: &mut File) -> Option<LockContent> {
        for attempt in 0..HOLDER_READ_ATTEMPTS {
            if let Ok(content) = Self::read_lock_content(file) {
                return Some(content);
            }
            if attempt + 1 < HOLDER_READ_ATTEMPTS {
                std::thread::sleep(HOLDER_READ_DELAY);
            }
        }
        None
    }

    fn read_lock_content(file: &mut File) -> Result<LockContent> {
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        serde_json::from_str(&contents).context("Failed to deserialize lock content")
    }
}

impl Drop for MonitorLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> Result<bool> {
    // No advisory locking; rely on the pid check alone
    Ok(true)
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true, // EPERM: exists but not ours
    }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
