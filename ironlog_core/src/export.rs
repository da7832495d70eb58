//! CSV export of the completed set history.
//!
//! One row per completed set of a completed workout, in session order then
//! exercise position then set number.

use crate::types::{Workout, WorkoutStatus};
use crate::Result;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, Serialize)]
struct SetRow<'a> {
    workout_id: &'a str,
    workout_name: &'a str,
    session_date: String,
    exercise_id: &'a str,
    exercise_name: &'a str,
    body_areas: String,
    set_number: u32,
    weight: f64,
    reps: u32,
    volume: f64,
    completed_at: Option<String>,
}

fn ordered_completed(workouts: &[Workout]) -> Vec<&Workout> {
    let mut ordered: Vec<&Workout> = workouts
        .iter()
        .filter(|w| w.status == WorkoutStatus::Completed)
        .collect();
    ordered.sort_by(|a, b| {
        a.session_time()
            .cmp(&b.session_time())
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered
}

/// Write the completed sets of `workouts` as CSV. Returns the row count.
pub fn write_sets<W: Write>(workouts: &[Workout], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for workout in ordered_completed(workouts) {
        let session_date = workout.session_date().to_string();
        for exercise in workout.ordered_exercises() {
            let body_areas = workout.attributed_areas(exercise).join(";");
            let mut sets: Vec<_> = exercise.sets.iter().filter(|s| s.completed).collect();
            sets.sort_by_key(|s| s.set_number);
            for set in sets {
                csv_writer.serialize(SetRow {
                    workout_id: &workout.id,
                    workout_name: &workout.name,
                    session_date: session_date.clone(),
                    exercise_id: &exercise.exercise_id,
                    exercise_name: &exercise.exercise_name,
                    body_areas: body_areas.clone(),
                    set_number: set.set_number,
                    weight: set.weight,
                    reps: set.reps,
                    volume: set.volume(),
                    completed_at: set.completed_at.map(|t| t.to_rfc3339()),
                })?;
                rows += 1;
            }
        }
    }

    csv_writer.flush()?;
    Ok(rows)
}

/// Export to a file, replacing it only once the new content is on disk
pub fn export_to_path(workouts: &[Workout], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)?;
    let rows = write_sets(workouts, &file)?;
    file.sync_all()?;
    std::fs::rename(&tmp_path, path)?;

    tracing::info!(rows, path = %path.display(), "exported set history");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{WorkoutExercise, WorkoutSet};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    fn workout(day: u32, name: &str) -> Workout {
        let bench = WorkoutExercise::new("bench_press", "Bench Press", &["chest", "triceps"], 0)
            .with_sets(vec![
                WorkoutSet::new(2, 65.0, 8).completed_at(at(day, 9)),
                WorkoutSet::new(1, 60.0, 10).completed_at(at(day, 9)),
                WorkoutSet::new(3, 70.0, 6),
            ]);
        Workout::new("u1", name, at(day, 8))
            .with_exercises(vec![bench])
            .start(at(day, 8))
            .unwrap()
            .complete(at(day, 10))
            .unwrap()
    }

    #[test]
    fn test_only_completed_sets_of_completed_workouts() {
        let pending = Workout::new("u1", "Later", at(7, 8)).with_exercises(vec![
            WorkoutExercise::new("squat", "Squat", &["quadriceps"], 0)
                .with_sets(vec![WorkoutSet::new(1, 100.0, 5).completed_at(at(7, 9))]),
        ]);
        let workouts = vec![workout(6, "Second"), pending, workout(5, "First")];

        let mut buf = Vec::new();
        let rows = write_sets(&workouts, &mut buf).unwrap();
        assert_eq!(rows, 4);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("workout_id,workout_name,session_date"));
        assert!(lines[1].contains("First") && lines[1].contains(",1,60.0,10,600.0,"));
        assert!(lines[2].contains(",2,65.0,8,520.0,"));
        assert!(lines[3].contains("Second"));
        assert!(lines[1].contains("chest;triceps"));
        assert!(!text.contains("Later"));
    }

    #[test]
    fn test_export_to_path_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("sets.csv");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale").unwrap();

        let rows = export_to_path(&[workout(5, "Only")], &path).unwrap();
        assert_eq!(rows, 2);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("stale"));
        assert!(!path.with_extension("csv.tmp").exists());
    }
}
