//! Database migration runner.
//!
//! Migrations run in order every time a [`Store`](super::Store) is opened.
//! Each one is guarded by the `user_version` pragma so it runs exactly once,
//! and is applied inside a transaction together with the version bump.

pub mod v001_initial;
pub mod v002_progress_cache;

use rusqlite::Connection;

use crate::{Error, Result};

/// Current schema version. Bump this and add a migration module whenever the
/// schema changes.
pub const CURRENT_VERSION: u32 = 2;

type Migration = fn(&Connection) -> rusqlite::Result<()>;

const MIGRATIONS: [(u32, &str, Migration); 2] = [
    (1, "v001_initial", v001_initial::up),
    (2, "v002_progress_cache", v002_progress_cache::up),
];

/// Run all pending migrations against the open connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::debug!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );

    if current > CURRENT_VERSION {
        return Err(Error::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    for (version, name, up) in MIGRATIONS {
        if current >= version {
            continue;
        }
        tracing::info!(migration = name, "applying migration");
        let tx = conn.unchecked_transaction()?;
        up(&tx).map_err(|e| Error::Migration(format!("{}: {}", name, e)))?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }

    Ok(())
}
