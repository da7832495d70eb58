//! Workout repository: workouts, their exercises and sets.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{
    ensure_valid, get_opt_ts, get_opt_u32, get_parsed, get_ts, get_u32, join_list, split_list,
    ts_to_sql, Atomic, Repository,
};
use crate::types::{Workout, WorkoutExercise, WorkoutSet, WorkoutStatus, WorkoutSummary};
use crate::{Error, Result};

const WORKOUT_COLUMNS: &str = "w.id, w.owner_id, w.name, w.body_areas, w.planned_duration_minutes, \
     w.created_at, w.started_at, w.completed_at, w.status, w.notes, \
     w.source_template_id, w.source_user_workout_id";

/// SQL for the instant a workout counts for: completion, else start, else creation
pub(crate) fn session_time_sql(alias: &str) -> String {
    format!(
        "COALESCE({a}.completed_at, {a}.started_at, {a}.created_at)",
        a = alias
    )
}

/// Selection criteria for workout listings
#[derive(Clone, Debug, Default)]
pub struct WorkoutFilter {
    pub owner_id: Option<String>,
    pub status: Option<WorkoutStatus>,
    /// Inclusive lower bound on the session time
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the session time
    pub until: Option<DateTime<Utc>>,
    /// Oldest session first instead of newest first
    pub oldest_first: bool,
    pub limit: Option<u32>,
}

impl WorkoutFilter {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: WorkoutStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn between(mut self, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    pub fn chronological(mut self) -> Self {
        self.oldest_first = true;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `WHERE` clause (possibly empty) against the workouts table aliased `alias`
    pub(crate) fn where_clause(&self, alias: &str) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        let session = session_time_sql(alias);

        if let Some(owner) = &self.owner_id {
            values.push(Value::Text(owner.clone()));
            clauses.push(format!("{}.owner_id = ?{}", alias, values.len()));
        }
        if let Some(status) = self.status {
            values.push(Value::Text(status.as_str().to_string()));
            clauses.push(format!("{}.status = ?{}", alias, values.len()));
        }
        if let Some(since) = &self.since {
            values.push(Value::Text(ts_to_sql(since)));
            clauses.push(format!("{} >= ?{}", session, values.len()));
        }
        if let Some(until) = &self.until {
            values.push(Value::Text(ts_to_sql(until)));
            clauses.push(format!("{} < ?{}", session, values.len()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }

    fn order_and_limit(&self, alias: &str) -> String {
        let direction = if self.oldest_first { "ASC" } else { "DESC" };
        let mut tail = format!(
            "ORDER BY {} {dir}, {a}.id {dir}",
            session_time_sql(alias),
            dir = direction,
            a = alias
        );
        if let Some(limit) = self.limit {
            tail.push_str(&format!(" LIMIT {}", limit));
        }
        tail
    }
}

/// Repository over the `workouts` aggregate
pub struct WorkoutRepository<'c> {
    conn: &'c Connection,
}

impl<'c> WorkoutRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM workouts WHERE id = ?1", params![id], |r| r.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// List-view projection computed by a single join
    pub fn summaries(&self, filter: &WorkoutFilter) -> Result<Vec<WorkoutSummary>> {
        let (where_sql, values) = filter.where_clause("w");
        let sql = format!(
            "SELECT w.id, w.owner_id, w.name, w.status, {session},
                    COUNT(DISTINCT e.id),
                    COUNT(s.id),
                    COALESCE(SUM(s.completed), 0),
                    COALESCE(SUM(CASE WHEN s.completed = 1 THEN s.weight * s.reps ELSE 0.0 END), 0.0)
             FROM workouts w
             LEFT JOIN workout_exercises e ON e.workout_id = w.id
             LEFT JOIN workout_sets s ON s.workout_exercise_id = e.id
             {where_sql}
             GROUP BY w.id
             {tail}",
            session = session_time_sql("w"),
            where_sql = where_sql,
            tail = filter.order_and_limit("w"),
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(WorkoutSummary {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                name: row.get(2)?,
                status: get_parsed(row, 3)?,
                session_time: get_ts(row, 4)?,
                exercise_count: get_u32(row, 5)?,
                set_count: get_u32(row, 6)?,
                completed_set_count: get_u32(row, 7)?,
                total_volume: row.get(8)?,
            })
        })?;

        let summaries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
    }

    fn load_children(&self, workout: &mut Workout) -> Result<()> {
        let mut sets_by_exercise: HashMap<String, Vec<WorkoutSet>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare_cached(
                "SELECT s.workout_exercise_id, s.id, s.set_number, s.weight, s.reps,
                        s.completed, s.completed_at, s.rest_seconds
                 FROM workout_sets s
                 JOIN workout_exercises e ON e.id = s.workout_exercise_id
                 WHERE e.workout_id = ?1
                 ORDER BY s.set_number",
            )?;
            let rows = stmt.query_map(params![workout.id], |row| {
                let exercise_id: String = row.get(0)?;
                let set = WorkoutSet {
                    id: row.get(1)?,
                    set_number: get_u32(row, 2)?,
                    weight: row.get(3)?,
                    reps: get_u32(row, 4)?,
                    completed: row.get(5)?,
                    completed_at: get_opt_ts(row, 6)?,
                    rest_seconds: get_opt_u32(row, 7)?,
                };
                Ok((exercise_id, set))
            })?;
            for row in rows {
                let (exercise_id, set) = row?;
                sets_by_exercise.entry(exercise_id).or_default().push(set);
            }
        }

        let mut stmt = self.conn.prepare_cached(
            "SELECT id, exercise_id, exercise_name, body_areas, position, notes
             FROM workout_exercises
             WHERE workout_id = ?1
             ORDER BY position",
        )?;
        let rows = stmt.query_map(params![workout.id], |row| {
            let body_areas: String = row.get(3)?;
            Ok(WorkoutExercise {
                id: row.get(0)?,
                exercise_id: row.get(1)?,
                exercise_name: row.get(2)?,
                body_areas: split_list(&body_areas),
                position: get_u32(row, 4)?,
                sets: Vec::new(),
                notes: row.get(5)?,
            })
        })?;

        workout.exercises = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        for exercise in &mut workout.exercises {
            exercise.sets = sets_by_exercise.remove(&exercise.id).unwrap_or_default();
        }
        Ok(())
    }
}

fn row_to_workout(row: &Row<'_>) -> rusqlite::Result<Workout> {
    let body_areas: String = row.get(3)?;
    Ok(Workout {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        body_areas: split_list(&body_areas),
        planned_duration_minutes: get_opt_u32(row, 4)?,
        created_at: get_ts(row, 5)?,
        started_at: get_opt_ts(row, 6)?,
        completed_at: get_opt_ts(row, 7)?,
        status: get_parsed(row, 8)?,
        notes: row.get(9)?,
        source_template_id: row.get(10)?,
        source_user_workout_id: row.get(11)?,
        exercises: Vec::new(),
    })
}

fn insert_children(conn: &Connection, workout: &Workout) -> Result<()> {
    let mut insert_exercise = conn.prepare_cached(
        "INSERT INTO workout_exercises (id, workout_id, exercise_id, exercise_name, body_areas, position, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut insert_set = conn.prepare_cached(
        "INSERT INTO workout_sets (id, workout_exercise_id, set_number, weight, reps, completed, completed_at, rest_seconds)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    for exercise in &workout.exercises {
        insert_exercise.execute(params![
            exercise.id,
            workout.id,
            exercise.exercise_id,
            exercise.exercise_name,
            join_list(&exercise.body_areas),
            exercise.position,
            exercise.notes,
        ])?;
        for set in &exercise.sets {
            insert_set.execute(params![
                set.id,
                exercise.id,
                set.set_number,
                set.weight,
                set.reps,
                set.completed,
                set.completed_at.as_ref().map(ts_to_sql),
                set.rest_seconds,
            ])?;
        }
    }
    Ok(())
}

fn delete_children(conn: &Connection, workout_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM workout_sets WHERE workout_exercise_id IN
             (SELECT id FROM workout_exercises WHERE workout_id = ?1)",
        params![workout_id],
    )?;
    conn.execute(
        "DELETE FROM workout_exercises WHERE workout_id = ?1",
        params![workout_id],
    )?;
    Ok(())
}

impl Repository for WorkoutRepository<'_> {
    type Aggregate = Workout;
    type Filter = WorkoutFilter;

    fn save(&self, workout: &Workout) -> Result<String> {
        ensure_valid(workout.validate())?;
        if self.exists(&workout.id)? {
            return Err(Error::Consistency(format!(
                "workout {} already exists",
                workout.id
            )));
        }

        let scope = Atomic::begin(self.conn)?;
        scope.conn().execute(
            "INSERT INTO workouts (id, owner_id, name, body_areas, planned_duration_minutes,
                                   created_at, started_at, completed_at, status, notes,
                                   source_template_id, source_user_workout_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                workout.id,
                workout.owner_id,
                workout.name,
                join_list(&workout.body_areas),
                workout.planned_duration_minutes,
                ts_to_sql(&workout.created_at),
                workout.started_at.as_ref().map(ts_to_sql),
                workout.completed_at.as_ref().map(ts_to_sql),
                workout.status.as_str(),
                workout.notes,
                workout.source_template_id,
                workout.source_user_workout_id,
            ],
        )?;
        insert_children(scope.conn(), workout)?;
        scope.commit()?;

        tracing::debug!(
            workout_id = %workout.id,
            exercises = workout.exercises.len(),
            sets = workout.total_sets(),
            "saved workout"
        );
        Ok(workout.id.clone())
    }

    fn get(&self, id: &str) -> Result<Option<Workout>> {
        let sql = format!("SELECT {} FROM workouts w WHERE w.id = ?1", WORKOUT_COLUMNS);
        let workout = self
            .conn
            .query_row(&sql, params![id], row_to_workout)
            .optional()?;

        match workout {
            Some(mut workout) => {
                self.load_children(&mut workout)?;
                Ok(Some(workout))
            }
            None => Ok(None),
        }
    }

    fn list(&self, filter: &WorkoutFilter) -> Result<Vec<Workout>> {
        let (where_sql, values) = filter.where_clause("w");
        let sql = format!(
            "SELECT {} FROM workouts w {} {}",
            WORKOUT_COLUMNS,
            where_sql,
            filter.order_and_limit("w")
        );

        let mut workouts = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), row_to_workout)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        for workout in &mut workouts {
            self.load_children(workout)?;
        }
        Ok(workouts)
    }

    fn update(&self, workout: &Workout) -> Result<()> {
        ensure_valid(workout.validate())?;

        let scope = Atomic::begin(self.conn)?;
        let changed = scope.conn().execute(
            "UPDATE workouts SET owner_id = ?2, name = ?3, body_areas = ?4,
                    planned_duration_minutes = ?5, created_at = ?6, started_at = ?7,
                    completed_at = ?8, status = ?9, notes = ?10,
                    source_template_id = ?11, source_user_workout_id = ?12
             WHERE id = ?1",
            params![
                workout.id,
                workout.owner_id,
                workout.name,
                join_list(&workout.body_areas),
                workout.planned_duration_minutes,
                ts_to_sql(&workout.created_at),
                workout.started_at.as_ref().map(ts_to_sql),
                workout.completed_at.as_ref().map(ts_to_sql),
                workout.status.as_str(),
                workout.notes,
                workout.source_template_id,
                workout.source_user_workout_id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("workout {}", workout.id)));
        }

        delete_children(scope.conn(), &workout.id)?;
        insert_children(scope.conn(), workout)?;
        scope.commit()?;

        tracing::debug!(workout_id = %workout.id, "replaced workout");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let scope = Atomic::begin(self.conn)?;
        delete_children(scope.conn(), id)?;
        let removed = scope
            .conn()
            .execute("DELETE FROM workouts WHERE id = ?1", params![id])?;
        scope.commit()?;

        if removed > 0 {
            tracing::debug!(workout_id = %id, "deleted workout");
        }
        Ok(removed > 0)
    }
}
