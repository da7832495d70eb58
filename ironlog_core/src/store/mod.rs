//! SQLite persistence for the training ledger.
//!
//! The [`Store`] owns the connection and runs migrations; each aggregate root
//! has a repository that borrows the connection and never closes it:
//!
//! - [`WorkoutRepository`]: workouts with their exercises and sets
//! - [`TemplateRepository`]: templates with their exercises
//! - [`UserWorkoutRepository`]: personal workouts, exercises and customization trail
//! - [`RecordRepository`]: personal records
//! - [`ProgressCacheRepository`]: versioned cache of the derived progress snapshot
//!
//! ## Write policy
//!
//! Every write of an aggregate is atomic across the root and all of its
//! children. Updates do not diff children: the persisted children of the root
//! are deleted and the current set is re-inserted. Aggregates are small, and
//! the full replace cannot drift from the in-memory value.

pub mod database;
pub mod migrations;
pub mod progress_cache;
pub mod records;
pub mod templates;
pub mod user_workouts;
pub mod workouts;

pub use database::Store;
pub use progress_cache::ProgressCacheRepository;
pub use records::{RecordFilter, RecordRepository};
pub use templates::{TemplateFilter, TemplateRepository, TemplateSort};
pub use user_workouts::{UserWorkoutFilter, UserWorkoutRepository};
pub use workouts::{WorkoutFilter, WorkoutRepository};

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::str::FromStr;

/// CRUD contract shared by the aggregate repositories
pub trait Repository {
    type Aggregate;
    type Filter;

    /// Insert a new aggregate (root and children) and return its id
    fn save(&self, aggregate: &Self::Aggregate) -> Result<String>;

    /// Full aggregate with ordered children; `None` when the id is unknown
    fn get(&self, id: &str) -> Result<Option<Self::Aggregate>>;

    fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Aggregate>>;

    /// Replace the stored aggregate; children are rewritten in full
    fn update(&self, aggregate: &Self::Aggregate) -> Result<()>;

    /// Remove the root and its children; `false` when nothing was stored
    fn delete(&self, id: &str) -> Result<bool>;
}

const SAVEPOINT: &str = "ironlog_write";

/// All-or-nothing scope over a borrowed connection.
///
/// Backed by a named savepoint, so scopes nest: a repository write inside a
/// ledger operation only becomes durable when the outermost scope commits.
/// Dropping an uncommitted scope rolls it back.
pub(crate) struct Atomic<'c> {
    conn: &'c Connection,
    finished: bool,
}

impl<'c> Atomic<'c> {
    pub(crate) fn begin(conn: &'c Connection) -> Result<Self> {
        conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT}"))?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    pub(crate) fn conn(&self) -> &'c Connection {
        self.conn
    }

    pub(crate) fn commit(mut self) -> Result<()> {
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {SAVEPOINT}"))?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for Atomic<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let rollback =
            format!("ROLLBACK TO SAVEPOINT {SAVEPOINT}; RELEASE SAVEPOINT {SAVEPOINT}");
        if let Err(e) = self.conn.execute_batch(&rollback) {
            tracing::error!(error = %e, "failed to roll back write scope");
        } else {
            tracing::debug!("rolled back write scope");
        }
    }
}

/// Reject an aggregate whose `validate()` pass reported problems
pub(crate) fn ensure_valid(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(errors))
    }
}

// ---------------------------------------------------------------------------
// Column codecs
// ---------------------------------------------------------------------------

/// Timestamps are stored as fixed-width RFC 3339 text so they sort lexically.
pub(crate) fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_failure<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_failure(idx, e))
    })
    .transpose()
}

/// Read a text column into one of the model's string-backed enums
pub(crate) fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn get_u32(row: &Row<'_>, idx: usize) -> rusqlite::Result<u32> {
    let raw: i64 = row.get(idx)?;
    u32::try_from(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

pub(crate) fn get_opt_u32(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u32>> {
    let raw: Option<i64> = row.get(idx)?;
    raw.map(|v| {
        u32::try_from(v)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
    })
    .transpose()
}

/// Body areas and similar small string lists live in one delimited column
pub(crate) fn join_list(items: &[String]) -> String {
    items.join(",")
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `%term%` pattern for a LIKE with `ESCAPE '\'`
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
