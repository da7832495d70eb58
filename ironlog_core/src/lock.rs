//! Advisory single-writer lock.
//!
//! A `<database>.lock` file beside the database is held with an exclusive
//! `fs2` lock for as long as the ledger is open. A second writer fails fast
//! with [`Error::Locked`] instead of blocking.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Held lock; released on drop
#[derive(Debug)]
pub struct WriterLock {
    file: File,
    path: PathBuf,
}

impl WriterLock {
    /// Lock file path for a database file
    pub fn path_for(database: &Path) -> PathBuf {
        let mut name = database
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        database.with_file_name(name)
    }

    /// Take the lock for `database` without waiting
    pub fn acquire(database: &Path) -> Result<Self> {
        let path = Self::path_for(database);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            tracing::debug!(path = %path.display(), error = %e, "writer lock is taken");
            return Err(Error::Locked(path.display().to_string()));
        }

        // Owner pid, for humans inspecting a stuck lock
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        tracing::debug!(path = %path.display(), "acquired writer lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release writer lock");
        }
    }
}
