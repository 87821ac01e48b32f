//! Cross-process advisory file locks.
//!
//! Locks live in a sibling `<path>.lock` file so the protected file can be
//! replaced by atomic rename while a lock is held. Shared locks admit
//! concurrent readers; exclusive locks admit a single writer. Acquisition
//! polls with a timeout and the guard releases on drop, including during
//! unwinding. Lock files are intentionally left in place on release.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Default acquisition timeout.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Sibling lock-file path for a protected file.
#[must_use]
pub fn lock_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".lock");
    PathBuf::from(os)
}

/// A held advisory lock; released when dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    exclusive: bool,
    target: PathBuf,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(
                path = %self.target.display(),
                "failed to release file lock: {e}"
            );
        }
    }
}

impl FileLock {
    /// Whether this guard holds the exclusive variant.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    let lock_file = lock_path(path);
    if let Some(parent) = lock_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_file)?)
}

/// Acquire an advisory lock on `path`'s sibling lock file.
///
/// `exclusive = false` takes a shared lock (many readers);
/// `exclusive = true` takes an exclusive lock (one writer). Blocks by
/// polling until `timeout` elapses, then fails with
/// [`Error::LockAcquisition`] naming the protected path.
pub fn file_lock(path: &Path, exclusive: bool, timeout: Duration) -> Result<FileLock> {
    let file = open_lock_file(path)?;
    let started = Instant::now();
    loop {
        let acquired = if exclusive {
            FileExt::try_lock_exclusive(&file)
        } else {
            FileExt::try_lock_shared(&file)
        };
        match acquired {
            Ok(()) => {
                debug!(
                    path = %path.display(),
                    exclusive,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "acquired file lock"
                );
                return Ok(FileLock {
                    file,
                    exclusive,
                    target: path.to_path_buf(),
                });
            }
            Err(_) if started.elapsed() < timeout => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(_) => {
                return Err(Error::LockAcquisition {
                    path: path.to_path_buf(),
                    timeout_secs: timeout.as_secs_f64(),
                });
            }
        }
    }
}

/// Non-blocking probe: is someone currently holding a lock on `path`?
#[must_use]
pub fn is_locked(path: &Path) -> bool {
    if !lock_path(path).exists() {
        return false;
    }
    let Ok(file) = open_lock_file(path) else {
        return true;
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            false
        }
        Err(_) => true,
    }
}

/// Remove a lock file older than `max_age`. Diagnostics only: a healthy
/// process never needs this.
///
/// Returns whether a stale lock file was removed.
pub fn remove_stale_lock(path: &Path, max_age: Duration) -> Result<bool> {
    let lock_file = lock_path(path);
    let Ok(metadata) = std::fs::metadata(&lock_file) else {
        return Ok(false);
    };
    let age = metadata
        .modified()
        .ok()
        .and_then(|m| m.elapsed().ok())
        .unwrap_or_default();
    if age <= max_age {
        return Ok(false);
    }
    if is_locked(path) {
        warn!(
            path = %path.display(),
            "lock file is old but still held; not removing"
        );
        return Ok(false);
    }
    std::fs::remove_file(&lock_file)?;
    warn!(
        path = %path.display(),
        age_secs = age.as_secs(),
        "removed stale lock file"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use tempfile::TempDir;

    fn target(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{}").expect("write target");
        path
    }

    #[test]
    fn test_acquire_release_leaves_lock_file() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        {
            let guard = file_lock(&path, true, DEFAULT_LOCK_TIMEOUT).unwrap();
            assert!(guard.is_exclusive());
        }
        assert!(lock_path(&path).exists());
        assert!(!is_locked(&path));
    }

    #[test]
    fn test_shared_locks_are_concurrent() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let first = file_lock(&path, false, Duration::from_secs(1)).unwrap();
        let second = file_lock(&path, false, Duration::from_secs(1)).unwrap();
        drop(first);
        drop(second);
    }

    #[test]
    fn test_exclusive_lock_blocks_until_released() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let guard = file_lock(&path, true, Duration::from_secs(1)).unwrap();

        let (tx, rx) = mpsc::channel();
        let path_clone = path.clone();
        let handle = thread::spawn(move || {
            let result = file_lock(&path_clone, true, Duration::from_secs(5));
            tx.send(()).unwrap();
            result.map(drop)
        });

        // The second acquirer must still be waiting while we hold the lock.
        assert!(rx.try_recv().is_err());
        drop(guard);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_timeout_produces_lock_error() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let _guard = file_lock(&path, true, Duration::from_secs(1)).unwrap();

        let path_clone = path.clone();
        let handle = thread::spawn(move || {
            file_lock(&path_clone, true, Duration::from_millis(50))
        });
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.category(), "lock");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("cache.json"));
    }

    #[test]
    fn test_is_locked_probe() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        assert!(!is_locked(&path));
        let guard = file_lock(&path, true, Duration::from_secs(1)).unwrap();
        assert!(is_locked(&path));
        drop(guard);
        assert!(!is_locked(&path));
    }

    #[test]
    fn test_remove_stale_lock_respects_age_and_holders() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        drop(file_lock(&path, true, Duration::from_secs(1)).unwrap());

        // Fresh lock files are not stale.
        assert!(!remove_stale_lock(&path, Duration::from_secs(3600)).unwrap());
        // With a zero threshold the unheld lock file goes away.
        assert!(remove_stale_lock(&path, Duration::ZERO).unwrap());
        assert!(!lock_path(&path).exists());
    }
}
