//! Personal workout repository.
//!
//! The baseline exercise list is stored relationally; the customization
//! trail is stored one row per event with the event serialized as JSON, in
//! trail order.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{
    ensure_valid, get_parsed, get_ts, get_u32, join_list, split_list, ts_to_sql, Atomic,
    Repository,
};
use crate::customization;
use crate::types::{CustomizationEvent, UserExercise, UserWorkout, WorkoutCustomizations};
use crate::{Error, Result};

const USER_WORKOUT_COLUMNS: &str =
    "id, owner_id, name, description, source_template_id, source, created_at, updated_at";

/// Selection criteria for personal workout listings
#[derive(Clone, Debug, Default)]
pub struct UserWorkoutFilter {
    pub owner_id: Option<String>,
    pub source_template_id: Option<String>,
}

impl UserWorkoutFilter {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Self::default()
        }
    }
}

/// Repository over the `user_workouts` aggregate
pub struct UserWorkoutRepository<'c> {
    conn: &'c Connection,
}

impl<'c> UserWorkoutRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM user_workouts WHERE id = ?1", params![id], |r| r.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn load_children(&self, workout: &mut UserWorkout) -> Result<()> {
        {
            let mut stmt = self.conn.prepare_cached(
                "SELECT id, exercise_id, exercise_name, body_areas, position, sets, rep_min,
                        rep_max, weight, rest_seconds, notes, is_from_template, template_exercise_id
                 FROM user_exercises
                 WHERE user_workout_id = ?1
                 ORDER BY position",
            )?;
            let rows = stmt.query_map(params![workout.id], row_to_exercise)?;
            workout.exercises = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        }

        let mut stmt = self.conn.prepare_cached(
            "SELECT payload FROM user_workout_customizations
             WHERE user_workout_id = ?1
             ORDER BY seq",
        )?;
        let payloads = stmt
            .query_map(params![workout.id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut events = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let event: CustomizationEvent = serde_json::from_str(&payload)?;
            events.push(event);
        }
        workout.customizations = WorkoutCustomizations { events };
        Ok(())
    }
}

fn row_to_user_workout(row: &Row<'_>) -> rusqlite::Result<UserWorkout> {
    Ok(UserWorkout {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        source_template_id: row.get(4)?,
        source: get_parsed(row, 5)?,
        exercises: Vec::new(),
        customizations: WorkoutCustomizations::default(),
        created_at: get_ts(row, 6)?,
        updated_at: get_ts(row, 7)?,
    })
}

fn row_to_exercise(row: &Row<'_>) -> rusqlite::Result<UserExercise> {
    let body_areas: String = row.get(3)?;
    Ok(UserExercise {
        id: row.get(0)?,
        exercise_id: row.get(1)?,
        exercise_name: row.get(2)?,
        body_areas: split_list(&body_areas),
        position: get_u32(row, 4)?,
        sets: get_u32(row, 5)?,
        rep_min: get_u32(row, 6)?,
        rep_max: get_u32(row, 7)?,
        weight: row.get(8)?,
        rest_seconds: get_u32(row, 9)?,
        notes: row.get(10)?,
        is_from_template: row.get(11)?,
        template_exercise_id: row.get(12)?,
    })
}

fn insert_children(conn: &Connection, workout: &UserWorkout) -> Result<()> {
    let mut insert_exercise = conn.prepare_cached(
        "INSERT INTO user_exercises (id, user_workout_id, exercise_id, exercise_name, body_areas,
                                     position, sets, rep_min, rep_max, weight, rest_seconds,
                                     notes, is_from_template, template_exercise_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
    )?;
    for exercise in &workout.exercises {
        insert_exercise.execute(params![
            exercise.id,
            workout.id,
            exercise.exercise_id,
            exercise.exercise_name,
            join_list(&exercise.body_areas),
            exercise.position,
            exercise.sets,
            exercise.rep_min,
            exercise.rep_max,
            exercise.weight,
            exercise.rest_seconds,
            exercise.notes,
            exercise.is_from_template,
            exercise.template_exercise_id,
        ])?;
    }

    let mut insert_event = conn.prepare_cached(
        "INSERT INTO user_workout_customizations (user_workout_id, seq, kind, exercise_id, payload, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (seq, event) in workout.customizations.events.iter().enumerate() {
        let payload = serde_json::to_string(event)?;
        insert_event.execute(params![
            workout.id,
            seq as i64,
            event.kind(),
            event.exercise_id(),
            payload,
            ts_to_sql(&event.at()),
        ])?;
    }
    Ok(())
}

fn delete_children(conn: &Connection, workout_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM user_workout_customizations WHERE user_workout_id = ?1",
        params![workout_id],
    )?;
    conn.execute(
        "DELETE FROM user_exercises WHERE user_workout_id = ?1",
        params![workout_id],
    )?;
    Ok(())
}

impl Repository for UserWorkoutRepository<'_> {
    type Aggregate = UserWorkout;
    type Filter = UserWorkoutFilter;

    fn save(&self, workout: &UserWorkout) -> Result<String> {
        ensure_valid(workout.validate())?;
        if self.exists(&workout.id)? {
            return Err(Error::Consistency(format!(
                "user workout {} already exists",
                workout.id
            )));
        }

        let scope = Atomic::begin(self.conn)?;
        scope.conn().execute(
            "INSERT INTO user_workouts (id, owner_id, name, description, source_template_id,
                                        source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                workout.id,
                workout.owner_id,
                workout.name,
                workout.description,
                workout.source_template_id,
                workout.source.as_str(),
                ts_to_sql(&workout.created_at),
                ts_to_sql(&workout.updated_at),
            ],
        )?;
        insert_children(scope.conn(), workout)?;
        scope.commit()?;

        tracing::debug!(user_workout_id = %workout.id, "saved user workout");
        Ok(workout.id.clone())
    }

    fn get(&self, id: &str) -> Result<Option<UserWorkout>> {
        let sql = format!("SELECT {} FROM user_workouts WHERE id = ?1", USER_WORKOUT_COLUMNS);
        let workout = self
            .conn
            .query_row(&sql, params![id], row_to_user_workout)
            .optional()?;

        match workout {
            Some(mut workout) => {
                self.load_children(&mut workout)?;
                Ok(Some(workout))
            }
            None => Ok(None),
        }
    }

    fn list(&self, filter: &UserWorkoutFilter) -> Result<Vec<UserWorkout>> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(owner) = &filter.owner_id {
            values.push(Value::Text(owner.clone()));
            clauses.push(format!("owner_id = ?{}", values.len()));
        }
        if let Some(template_id) = &filter.source_template_id {
            values.push(Value::Text(template_id.clone()));
            clauses.push(format!("source_template_id = ?{}", values.len()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM user_workouts {} ORDER BY updated_at DESC, rowid ASC",
            USER_WORKOUT_COLUMNS, where_sql
        );
        let mut workouts = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), row_to_user_workout)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        for workout in &mut workouts {
            self.load_children(workout)?;
        }
        Ok(workouts)
    }

    /// Rewrite the metadata and append to the trail. The baseline exercises
    /// are fixed at creation and the stored trail may only grow or have a
    /// modification superseded; anything else is a consistency error.
    fn update(&self, workout: &UserWorkout) -> Result<()> {
        ensure_valid(workout.validate())?;

        let stored = self
            .get(&workout.id)?
            .ok_or_else(|| Error::NotFound(format!("user workout {}", workout.id)))?;
        let mut baseline = workout.exercises.clone();
        baseline.sort_by_key(|e| e.position);
        if baseline != stored.exercises {
            return Err(Error::Consistency(format!(
                "baseline exercises of user workout {} cannot change",
                workout.id
            )));
        }
        customization::check_trail_successor(&stored.customizations, &workout.customizations)?;

        let scope = Atomic::begin(self.conn)?;
        let changed = scope.conn().execute(
            "UPDATE user_workouts SET owner_id = ?2, name = ?3, description = ?4,
                    source_template_id = ?5, source = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                workout.id,
                workout.owner_id,
                workout.name,
                workout.description,
                workout.source_template_id,
                workout.source.as_str(),
                ts_to_sql(&workout.updated_at),
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("user workout {}", workout.id)));
        }

        delete_children(scope.conn(), &workout.id)?;
        insert_children(scope.conn(), workout)?;
        scope.commit()?;

        tracing::debug!(
            user_workout_id = %workout.id,
            events = workout.customizations.events.len(),
            "replaced user workout"
        );
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let scope = Atomic::begin(self.conn)?;
        delete_children(scope.conn(), id)?;
        let removed = scope
            .conn()
            .execute("DELETE FROM user_workouts WHERE id = ?1", params![id])?;
        scope.commit()?;
        Ok(removed > 0)
    }
}
