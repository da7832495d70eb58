//! Personal record repository.
//!
//! At most one record per (owner, exercise, kind) is current; a partial
//! unique index enforces it. [`RecordRepository::record`] supersedes the
//! current record according to the configured [`RecordHistory`].

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{get_parsed, get_ts, ts_to_sql, Atomic, Repository};
use crate::config::RecordHistory;
use crate::types::{PersonalRecord, RecordKind};
use crate::{Error, Result};

const RECORD_COLUMNS: &str = "id, owner_id, exercise_id, exercise_name, kind, value, \
     secondary_value, achieved_at, workout_id, is_current";

/// Selection criteria for record listings
#[derive(Clone, Debug, Default)]
pub struct RecordFilter {
    pub owner_id: Option<String>,
    pub exercise_id: Option<String>,
    pub kind: Option<RecordKind>,
    /// Include superseded records kept under the retain policy
    pub include_history: bool,
}

impl RecordFilter {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Self::default()
        }
    }
}

/// Repository over `personal_records`
pub struct RecordRepository<'c> {
    conn: &'c Connection,
}

impl<'c> RecordRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// The current record of one kind, if any
    pub fn current(
        &self,
        owner_id: &str,
        exercise_id: &str,
        kind: RecordKind,
    ) -> Result<Option<PersonalRecord>> {
        let sql = format!(
            "SELECT {} FROM personal_records
             WHERE owner_id = ?1 AND exercise_id = ?2 AND kind = ?3 AND is_current = 1",
            RECORD_COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![owner_id, exercise_id, kind.as_str()], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// All current records for one exercise
    pub fn current_for_exercise(
        &self,
        owner_id: &str,
        exercise_id: &str,
    ) -> Result<Vec<PersonalRecord>> {
        self.list(&RecordFilter {
            owner_id: Some(owner_id.to_string()),
            exercise_id: Some(exercise_id.to_string()),
            ..RecordFilter::default()
        })
    }

    /// Store a new current record, superseding the previous one of its key
    pub fn record(&self, record: &PersonalRecord, history: RecordHistory) -> Result<()> {
        check_record(record)?;

        let scope = Atomic::begin(self.conn)?;
        let superseded = match history {
            RecordHistory::Discard => scope.conn().execute(
                "DELETE FROM personal_records
                 WHERE owner_id = ?1 AND exercise_id = ?2 AND kind = ?3 AND is_current = 1",
                params![record.owner_id, record.exercise_id, record.kind.as_str()],
            )?,
            RecordHistory::Retain => scope.conn().execute(
                "UPDATE personal_records SET is_current = 0
                 WHERE owner_id = ?1 AND exercise_id = ?2 AND kind = ?3 AND is_current = 1",
                params![record.owner_id, record.exercise_id, record.kind.as_str()],
            )?,
        };
        insert_record(scope.conn(), &PersonalRecord {
            is_current: true,
            ..record.clone()
        })?;
        scope.commit()?;

        tracing::debug!(
            exercise_id = %record.exercise_id,
            kind = %record.kind,
            value = record.value,
            superseded,
            "stored personal record"
        );
        Ok(())
    }

    /// Swap every record of one exercise for a rebuilt set
    pub fn replace_for_exercise(
        &self,
        owner_id: &str,
        exercise_id: &str,
        records: &[PersonalRecord],
    ) -> Result<()> {
        for record in records {
            check_record(record)?;
        }

        let scope = Atomic::begin(self.conn)?;
        scope.conn().execute(
            "DELETE FROM personal_records WHERE owner_id = ?1 AND exercise_id = ?2",
            params![owner_id, exercise_id],
        )?;
        for record in records {
            insert_record(scope.conn(), record)?;
        }
        scope.commit()
    }
}

fn check_record(record: &PersonalRecord) -> Result<()> {
    let mut errors = Vec::new();
    if record.owner_id.trim().is_empty() {
        errors.push("record has empty owner id".to_string());
    }
    if record.exercise_id.trim().is_empty() {
        errors.push("record has empty exercise id".to_string());
    }
    if !record.value.is_finite() || record.value <= 0.0 {
        errors.push(format!("record value must be positive, got {}", record.value));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(errors))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<PersonalRecord> {
    Ok(PersonalRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        exercise_id: row.get(2)?,
        exercise_name: row.get(3)?,
        kind: get_parsed(row, 4)?,
        value: row.get(5)?,
        secondary_value: row.get(6)?,
        achieved_at: get_ts(row, 7)?,
        workout_id: row.get(8)?,
        is_current: row.get(9)?,
    })
}

fn insert_record(conn: &Connection, record: &PersonalRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO personal_records (id, owner_id, exercise_id, exercise_name, kind, value,
                                       secondary_value, achieved_at, workout_id, is_current)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            record.id,
            record.owner_id,
            record.exercise_id,
            record.exercise_name,
            record.kind.as_str(),
            record.value,
            record.secondary_value,
            ts_to_sql(&record.achieved_at),
            record.workout_id,
            record.is_current,
        ],
    )?;
    Ok(())
}

impl Repository for RecordRepository<'_> {
    type Aggregate = PersonalRecord;
    type Filter = RecordFilter;

    fn save(&self, record: &PersonalRecord) -> Result<String> {
        check_record(record)?;
        insert_record(self.conn, record)?;
        Ok(record.id.clone())
    }

    fn get(&self, id: &str) -> Result<Option<PersonalRecord>> {
        let sql = format!("SELECT {} FROM personal_records WHERE id = ?1", RECORD_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![id], row_to_record)
            .optional()?;
        Ok(record)
    }

    fn list(&self, filter: &RecordFilter) -> Result<Vec<PersonalRecord>> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(owner) = &filter.owner_id {
            values.push(Value::Text(owner.clone()));
            clauses.push(format!("owner_id = ?{}", values.len()));
        }
        if let Some(exercise) = &filter.exercise_id {
            values.push(Value::Text(exercise.clone()));
            clauses.push(format!("exercise_id = ?{}", values.len()));
        }
        if let Some(kind) = filter.kind {
            values.push(Value::Text(kind.as_str().to_string()));
            clauses.push(format!("kind = ?{}", values.len()));
        }
        if !filter.include_history {
            clauses.push("is_current = 1".to_string());
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM personal_records {} ORDER BY exercise_name, kind, achieved_at DESC",
            RECORD_COLUMNS, where_sql
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_record)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn update(&self, record: &PersonalRecord) -> Result<()> {
        check_record(record)?;
        let changed = self.conn.execute(
            "UPDATE personal_records SET exercise_name = ?2, value = ?3, secondary_value = ?4,
                    achieved_at = ?5, workout_id = ?6, is_current = ?7
             WHERE id = ?1",
            params![
                record.id,
                record.exercise_name,
                record.value,
                record.secondary_value,
                ts_to_sql(&record.achieved_at),
                record.workout_id,
                record.is_current,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("personal record {}", record.id)));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM personal_records WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::types::new_id;
    use chrono::{TimeZone, Utc};

    fn record(kind: RecordKind, value: f64, day: u32) -> PersonalRecord {
        PersonalRecord {
            id: new_id(),
            owner_id: "u1".into(),
            exercise_id: "bench_press".into(),
            exercise_name: "Bench Press".into(),
            kind,
            value,
            secondary_value: None,
            achieved_at: Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap(),
            workout_id: Some("w1".into()),
            is_current: true,
        }
    }

    #[test]
    fn test_discard_policy_keeps_only_current() {
        let store = Store::open_in_memory().unwrap();
        let repo = store.records();

        repo.record(&record(RecordKind::MaxWeight, 60.0, 1), RecordHistory::Discard)
            .unwrap();
        repo.record(&record(RecordKind::MaxWeight, 65.0, 2), RecordHistory::Discard)
            .unwrap();

        let current = repo
            .current("u1", "bench_press", RecordKind::MaxWeight)
            .unwrap()
            .unwrap();
        assert_eq!(current.value, 65.0);

        let all = repo
            .list(&RecordFilter {
                include_history: true,
                ..RecordFilter::for_owner("u1")
            })
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_retain_policy_keeps_history() {
        let store = Store::open_in_memory().unwrap();
        let repo = store.records();

        repo.record(&record(RecordKind::MaxWeight, 60.0, 1), RecordHistory::Retain)
            .unwrap();
        repo.record(&record(RecordKind::MaxWeight, 65.0, 2), RecordHistory::Retain)
            .unwrap();
        repo.record(&record(RecordKind::MaxVolume, 600.0, 2), RecordHistory::Retain)
            .unwrap();

        let history = repo
            .list(&RecordFilter {
                include_history: true,
                kind: Some(RecordKind::MaxWeight),
                ..RecordFilter::for_owner("u1")
            })
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().filter(|r| r.is_current).count(), 1);

        let current = repo.current_for_exercise("u1", "bench_press").unwrap();
        assert_eq!(current.len(), 2);
    }

    #[test]
    fn test_second_current_record_violates_index() {
        let store = Store::open_in_memory().unwrap();
        let repo = store.records();
        repo.save(&record(RecordKind::MaxReps, 10.0, 1)).unwrap();
        let result = repo.save(&record(RecordKind::MaxReps, 12.0, 2));
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[test]
    fn test_zero_value_rejected() {
        let store = Store::open_in_memory().unwrap();
        let result = store
            .records()
            .record(&record(RecordKind::MaxWeight, 0.0, 1), RecordHistory::Discard);
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
