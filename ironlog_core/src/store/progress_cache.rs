//! Versioned cache of the derived progress snapshot.
//!
//! The cache is never authoritative: a missing, stale or unreadable row means
//! "recompute from history".

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::ts_to_sql;
use crate::progression::{ProgressSnapshot, SNAPSHOT_VERSION};
use crate::Result;

pub struct ProgressCacheRepository<'c> {
    conn: &'c Connection,
}

impl<'c> ProgressCacheRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Cached snapshot for `owner_id`, if one exists at the current version
    pub fn load(&self, owner_id: &str) -> Result<Option<ProgressSnapshot>> {
        let row: Option<(u32, String)> = self
            .conn
            .query_row(
                "SELECT version, payload FROM progress_cache WHERE owner_id = ?1",
                params![owner_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let Some((version, payload)) = row else {
            return Ok(None);
        };
        if version != SNAPSHOT_VERSION {
            tracing::debug!(owner_id, version, "progress cache is from another version");
            return Ok(None);
        }
        match serde_json::from_str::<ProgressSnapshot>(&payload) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "discarding unreadable progress cache");
                Ok(None)
            }
        }
    }

    pub fn store(
        &self,
        owner_id: &str,
        snapshot: &ProgressSnapshot,
        computed_at: DateTime<Utc>,
    ) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;
        self.conn.execute(
            "INSERT INTO progress_cache (owner_id, version, computed_at, payload)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(owner_id) DO UPDATE SET
                version = excluded.version,
                computed_at = excluded.computed_at,
                payload = excluded.payload",
            params![owner_id, snapshot.version, ts_to_sql(&computed_at), payload],
        )?;
        tracing::debug!(owner_id, "stored progress cache");
        Ok(())
    }

    /// Drop the cached snapshot so the next read recomputes
    pub fn invalidate(&self, owner_id: &str) -> Result<()> {
        let removed = self.conn.execute(
            "DELETE FROM progress_cache WHERE owner_id = ?1",
            params![owner_id],
        )?;
        if removed > 0 {
            tracing::debug!(owner_id, "invalidated progress cache");
        }
        Ok(())
    }
}
