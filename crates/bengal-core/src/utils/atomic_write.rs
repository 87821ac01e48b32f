//! Atomic file replacement via temp-file-and-rename.
//!
//! Writes land in a temp file in the destination directory, get fsynced,
//! and move into place with an atomic rename on [`AtomicFile::commit`].
//! Dropping without committing removes the temp file and leaves any
//! existing destination untouched, so readers never observe a torn write.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

/// Scoped atomic writer.
#[derive(Debug)]
pub struct AtomicFile {
    temp: NamedTempFile,
    path: PathBuf,
}

impl AtomicFile {
    /// Open a writer targeting `path`, creating parent directories.
    ///
    /// The temp file is created in the same directory as the target so the
    /// final rename stays on one filesystem.
    pub fn new(path: &Path) -> Result<Self> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let temp = NamedTempFile::new_in(parent)?;
        Ok(Self {
            temp,
            path: path.to_path_buf(),
        })
    }

    /// Target path this writer will replace on commit.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush, fsync, and atomically rename into place.
    pub fn commit(mut self) -> Result<()> {
        self.temp.flush()?;
        self.temp.as_file().sync_all()?;
        self.temp.persist(&self.path).map_err(|e| {
            // The temp file is cleaned up by the error's Drop.
            Error::Cache(format!(
                "failed to persist {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        #[cfg(unix)]
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        debug!(path = %self.path.display(), "atomic write committed");
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.temp.flush()
    }
}

/// Write the full contents of `data` to `path` atomically.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = AtomicFile::new(path)?;
    file.write_all(data)?;
    file.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_commit_replaces_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_drop_without_commit_preserves_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "old").unwrap();

        {
            let mut file = AtomicFile::new(&path).unwrap();
            file.write_all(b"partial").unwrap();
            // Dropped without commit.
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old");
        // No temp files left behind.
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/data.json");
        write_atomic(&path, b"x").unwrap();
        assert!(path.exists());
    }
}
