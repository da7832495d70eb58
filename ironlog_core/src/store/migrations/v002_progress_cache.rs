//! v002 -- Progress snapshot cache.
//!
//! One row per owner holding the serialized snapshot and the engine version
//! that produced it.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS progress_cache (
    owner_id    TEXT PRIMARY KEY NOT NULL,
    version     INTEGER NOT NULL,
    computed_at TEXT NOT NULL,
    payload     TEXT NOT NULL                           -- JSON ProgressSnapshot
);
"#;

/// Apply the v002 migration.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
