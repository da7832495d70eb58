//! Database connection management.
//!
//! The [`Store`] owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. Repositories borrow the
//! connection from it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;
use super::{
    ProgressCacheRepository, RecordRepository, TemplateRepository, UserWorkoutRepository,
    WorkoutRepository,
};
use crate::Result;

/// Owner of the single store connection
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), "opening database");
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Adopt an already-open connection: apply settings and migrations.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Give the connection back to the caller.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    pub fn workouts(&self) -> WorkoutRepository<'_> {
        WorkoutRepository::new(&self.conn)
    }

    pub fn templates(&self) -> TemplateRepository<'_> {
        TemplateRepository::new(&self.conn)
    }

    pub fn user_workouts(&self) -> UserWorkoutRepository<'_> {
        UserWorkoutRepository::new(&self.conn)
    }

    pub fn records(&self) -> RecordRepository<'_> {
        RecordRepository::new(&self.conn)
    }

    pub fn progress_cache(&self) -> ProgressCacheRepository<'_> {
        ProgressCacheRepository::new(&self.conn)
    }
}
