//! Training statistics over a user's workouts.
//!
//! Two implementations that must agree:
//! - [`aggregate_query`] pushes the counting and summing into SQL
//! - [`compute_from_sessions`] folds already-loaded workouts
//!
//! A workout belongs to the window when its session time (completion, else
//! start, else creation) is in `[since, until)`. Every status counts toward
//! the workout and set totals; volume only ever comes from completed sets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::store::{get_opt_ts, get_opt_u32, split_list, WorkoutFilter};
use crate::types::{Workout, WorkoutStatus};
use crate::Result;

/// Aggregate statistics for one user and window
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkoutStats {
    pub total_workouts: u32,
    pub completed_workouts: u32,
    /// completed / total, 0 when there are no workouts
    pub completion_rate: f64,
    pub total_volume: f64,
    pub total_sets: u32,
    pub completed_sets: u32,
    /// Mean over completed workouts with a known duration
    pub average_duration_seconds: Option<f64>,
    pub volume_by_body_area: BTreeMap<String, f64>,
    /// Volume that could not be attributed to any body area
    pub unattributed_volume: f64,
}

/// Which workouts the statistics cover
#[derive(Clone, Debug, PartialEq)]
pub struct StatsQuery {
    pub owner_id: String,
    /// Inclusive
    pub since: Option<DateTime<Utc>>,
    /// Exclusive
    pub until: Option<DateTime<Utc>>,
}

impl StatsQuery {
    pub fn all_time(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            since: None,
            until: None,
        }
    }

    pub fn window(
        owner_id: impl Into<String>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            since,
            until,
        }
    }

    /// Whether a workout falls in this query's owner and window
    pub fn matches(&self, workout: &Workout) -> bool {
        let at = workout.session_time();
        workout.owner_id == self.owner_id
            && self.since.map_or(true, |since| at >= since)
            && self.until.map_or(true, |until| at < until)
    }

    fn filter(&self) -> WorkoutFilter {
        WorkoutFilter::for_owner(self.owner_id.clone()).between(self.since, self.until)
    }
}

fn split_into(
    areas: &[String],
    volume: f64,
    by_area: &mut BTreeMap<String, f64>,
    unattributed: &mut f64,
) {
    if areas.is_empty() {
        *unattributed += volume;
        return;
    }
    let share = volume / areas.len() as f64;
    for area in areas {
        *by_area.entry(area.clone()).or_insert(0.0) += share;
    }
}

fn finish(stats: &mut WorkoutStats, duration_sum: f64, duration_count: u32) {
    stats.completion_rate = if stats.total_workouts == 0 {
        0.0
    } else {
        f64::from(stats.completed_workouts) / f64::from(stats.total_workouts)
    };
    stats.average_duration_seconds = if duration_count == 0 {
        None
    } else {
        Some(duration_sum / f64::from(duration_count))
    };
}

/// Fold statistics from loaded workouts
pub fn compute_from_sessions(sessions: &[Workout], query: &StatsQuery) -> WorkoutStats {
    let mut stats = WorkoutStats::default();
    let mut duration_sum = 0.0;
    let mut duration_count = 0u32;

    for workout in sessions.iter().filter(|w| query.matches(w)) {
        stats.total_workouts += 1;
        if workout.status == WorkoutStatus::Completed {
            stats.completed_workouts += 1;
            if let Some(seconds) = workout.effective_duration_seconds() {
                duration_sum += seconds;
                duration_count += 1;
            }
        }

        for exercise in &workout.exercises {
            let areas = workout.attributed_areas(exercise);
            for set in &exercise.sets {
                stats.total_sets += 1;
                if !set.completed {
                    continue;
                }
                stats.completed_sets += 1;
                stats.total_volume += set.volume();
                split_into(
                    areas,
                    set.volume(),
                    &mut stats.volume_by_body_area,
                    &mut stats.unattributed_volume,
                );
            }
        }
    }

    finish(&mut stats, duration_sum, duration_count);
    stats
}

fn and_where(where_sql: &str, extra: &str) -> String {
    if where_sql.is_empty() {
        format!("WHERE {}", extra)
    } else {
        format!("{} AND {}", where_sql, extra)
    }
}

/// Compute statistics with SQL aggregation
pub fn aggregate_query(conn: &Connection, query: &StatsQuery) -> Result<WorkoutStats> {
    let mut stats = WorkoutStats::default();
    let (where_sql, values) = query.filter().where_clause("w");

    let (total, completed): (i64, i64) = conn.query_row(
        &format!(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN w.status = 'completed' THEN 1 ELSE 0 END), 0)
             FROM workouts w {}",
            where_sql
        ),
        params_from_iter(values.iter()),
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    stats.total_workouts = total as u32;
    stats.completed_workouts = completed as u32;

    let (set_count, completed_sets, volume): (i64, i64, f64) = conn.query_row(
        &format!(
            "SELECT COUNT(s.id),
                    COALESCE(SUM(s.completed), 0),
                    COALESCE(SUM(CASE WHEN s.completed = 1 THEN s.weight * s.reps ELSE 0.0 END), 0.0)
             FROM workouts w
             JOIN workout_exercises e ON e.workout_id = w.id
             JOIN workout_sets s ON s.workout_exercise_id = e.id
             {}",
            where_sql
        ),
        params_from_iter(values.iter()),
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    stats.total_sets = set_count as u32;
    stats.completed_sets = completed_sets as u32;
    stats.total_volume = volume;

    // Durations need timestamp arithmetic; fetch the inputs and finish in Rust
    let mut duration_sum = 0.0;
    let mut duration_count = 0u32;
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT w.started_at, w.completed_at, w.planned_duration_minutes FROM workouts w {}",
            and_where(&where_sql, "w.status = 'completed'")
        ))?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((get_opt_ts(row, 0)?, get_opt_ts(row, 1)?, get_opt_u32(row, 2)?))
        })?;
        for row in rows {
            let (started, completed, planned) = row?;
            let seconds = match (started, completed) {
                (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
                _ => planned.map(|m| f64::from(m) * 60.0),
            };
            if let Some(seconds) = seconds {
                duration_sum += seconds;
                duration_count += 1;
            }
        }
    }

    {
        let mut stmt = conn.prepare(&format!(
            "SELECT e.body_areas, w.body_areas, SUM(s.weight * s.reps)
             FROM workouts w
             JOIN workout_exercises e ON e.workout_id = w.id
             JOIN workout_sets s ON s.workout_exercise_id = e.id
             {}
             GROUP BY e.body_areas, w.body_areas",
            and_where(&where_sql, "s.completed = 1")
        ))?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;
        for row in rows {
            let (exercise_areas, workout_areas, volume) = row?;
            let mut areas = split_list(&exercise_areas);
            if areas.is_empty() {
                areas = split_list(&workout_areas);
            }
            split_into(
                &areas,
                volume,
                &mut stats.volume_by_body_area,
                &mut stats.unattributed_volume,
            );
        }
    }

    finish(&mut stats, duration_sum, duration_count);
    tracing::debug!(
        owner_id = %query.owner_id,
        workouts = stats.total_workouts,
        volume = stats.total_volume,
        "aggregated statistics"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Repository, Store};
    use crate::types::{WorkoutExercise, WorkoutSet};
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    fn history() -> Vec<Workout> {
        let bench = |day| {
            WorkoutExercise::new("bench_press", "Bench Press", &["chest", "triceps"], 0).with_sets(vec![
                WorkoutSet::new(1, 60.0, 10).completed_at(at(day, 9)),
                WorkoutSet::new(2, 65.0, 8).completed_at(at(day, 9)),
                WorkoutSet::new(3, 70.0, 5),
            ])
        };
        let plank = WorkoutExercise::new("plank", "Plank", &[] as &[&str], 1)
            .with_sets(vec![WorkoutSet::new(1, 10.0, 3).completed_at(at(2, 9))]);
        let mystery = WorkoutExercise::new("mystery", "Mystery", &[] as &[&str], 2)
            .with_sets(vec![WorkoutSet::new(1, 7.0, 3).completed_at(at(2, 9))]);

        let first = Workout::new("u1", "Push", at(1, 8))
            .with_exercises(vec![bench(1)])
            .start(at(1, 8))
            .unwrap()
            .complete(at(1, 9))
            .unwrap();
        let mut second = Workout::new("u1", "Mixed", at(2, 8))
            .with_body_areas(&["core"])
            .with_planned_duration(45)
            .with_exercises(vec![bench(2), plank]);
        second.exercises.push(mystery);
        let second = second.start(at(2, 8)).unwrap();
        let mut third = second.clone();
        third.id = crate::types::new_id();
        third.body_areas.clear();
        for exercise in &mut third.exercises {
            exercise.id = crate::types::new_id();
            for set in &mut exercise.sets {
                set.id = crate::types::new_id();
            }
        }
        let third = third.complete(at(2, 8) + Duration::minutes(30)).unwrap();
        let planned_only = Workout::new("u1", "Planned", at(3, 8)).with_planned_duration(60);
        let other_user = Workout::new("u2", "Theirs", at(1, 8)).with_exercises(vec![bench(1)]);

        vec![first, second, third, planned_only, other_user]
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
    }

    fn assert_same(sql: &WorkoutStats, fold: &WorkoutStats) {
        assert_eq!(sql.total_workouts, fold.total_workouts);
        assert_eq!(sql.completed_workouts, fold.completed_workouts);
        assert_eq!(sql.total_sets, fold.total_sets);
        assert_eq!(sql.completed_sets, fold.completed_sets);
        assert_close(sql.completion_rate, fold.completion_rate);
        assert_close(sql.total_volume, fold.total_volume);
        assert_close(sql.unattributed_volume, fold.unattributed_volume);
        assert_eq!(
            sql.average_duration_seconds.is_some(),
            fold.average_duration_seconds.is_some()
        );
        if let (Some(a), Some(b)) = (sql.average_duration_seconds, fold.average_duration_seconds) {
            assert_close(a, b);
        }
        assert_eq!(
            sql.volume_by_body_area.keys().collect::<Vec<_>>(),
            fold.volume_by_body_area.keys().collect::<Vec<_>>()
        );
        for (area, volume) in &sql.volume_by_body_area {
            assert_close(*volume, fold.volume_by_body_area[area]);
        }
    }

    #[test]
    fn test_fold_statistics() {
        let stats = compute_from_sessions(&history(), &StatsQuery::all_time("u1"));

        assert_eq!(stats.total_workouts, 4);
        assert_eq!(stats.completed_workouts, 2);
        assert_close(stats.completion_rate, 0.5);
        // 3 bench sessions × 1120, plus plank 30 and mystery 21 twice
        assert_close(stats.total_volume, 3.0 * 1120.0 + 2.0 * 51.0);
        assert_eq!(stats.total_sets, 3 * 3 + 2 * 2);
        assert_eq!(stats.completed_sets, 3 * 2 + 2 * 2);
        // first: 1h actual, third: 30 min actual
        assert_close(stats.average_duration_seconds.unwrap(), (3600.0 + 1800.0) / 2.0);
        assert_close(stats.volume_by_body_area["chest"], 3.0 * 560.0);
        // the in-progress session's plank and mystery fall back to its "core" target
        assert_close(stats.volume_by_body_area["core"], 51.0);
        // the completed copy has no workout areas either
        assert_close(stats.unattributed_volume, 51.0);
    }

    #[test]
    fn test_sql_and_fold_agree() {
        let store = Store::open_in_memory().unwrap();
        let sessions = history();
        for workout in &sessions {
            store.workouts().save(workout).unwrap();
        }

        for query in [
            StatsQuery::all_time("u1"),
            StatsQuery::window("u1", Some(at(2, 0)), None),
            StatsQuery::window("u1", None, Some(at(2, 8))),
            StatsQuery::all_time("nobody"),
        ] {
            let sql = aggregate_query(store.conn(), &query).unwrap();
            let fold = compute_from_sessions(&sessions, &query);
            assert_same(&sql, &fold);
        }
    }

    #[test]
    fn test_window_bounds() {
        let sessions = history();
        // first session completes at 1st 09:00
        let exclusive = compute_from_sessions(&sessions, &StatsQuery::window("u1", None, Some(at(1, 9))));
        assert_eq!(exclusive.total_workouts, 0);
        let inclusive = compute_from_sessions(&sessions, &StatsQuery::window("u1", Some(at(1, 9)), Some(at(1, 10))));
        assert_eq!(inclusive.total_workouts, 1);
    }

    #[test]
    fn test_empty_history() {
        let stats = compute_from_sessions(&[], &StatsQuery::all_time("u1"));
        assert_eq!(stats, WorkoutStats::default());
    }
}
