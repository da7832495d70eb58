//! Exercise catalog lookup.
//!
//! The remote catalog client lives outside the core; the core only needs
//! `exercise(id)` to denormalize names and body areas onto workouts and
//! templates at write time, plus a ranked pool for seeding. A built-in
//! [`StaticCatalog`] covers offline use and tests.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::types::check_body_areas;

/// Catalog entry for one exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseInfo {
    pub id: String,
    pub name: String,
    pub body_areas: Vec<String>,
    pub equipment: Vec<String>,
    /// Popularity rank, 1 is the most common choice
    pub rank: u32,
}

/// Read-only exercise lookup supplied by a collaborator
pub trait ExerciseCatalog: Send + Sync {
    fn exercise(&self, id: &str) -> Option<ExerciseInfo>;

    /// Every exercise, best-ranked first
    fn ranked_pool(&self) -> Vec<ExerciseInfo>;
}

/// In-memory catalog
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    exercises: HashMap<String, ExerciseInfo>,
}

impl StaticCatalog {
    pub fn new(exercises: impl IntoIterator<Item = ExerciseInfo>) -> Self {
        Self {
            exercises: exercises.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Validate the catalog for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut ranks = HashSet::new();

        for (id, exercise) in &self.exercises {
            if id.is_empty() || exercise.id.is_empty() {
                errors.push("Exercise has empty ID".to_string());
            }
            if id != &exercise.id {
                errors.push(format!(
                    "Exercise key '{}' doesn't match exercise.id '{}'",
                    id, exercise.id
                ));
            }
            if exercise.name.is_empty() {
                errors.push(format!("Exercise '{}' has empty name", id));
            }
            if exercise.body_areas.is_empty() {
                errors.push(format!("Exercise '{}' targets no body area", id));
            }
            check_body_areas(&mut errors, &format!("Exercise '{}'", id), &exercise.body_areas);
            if !ranks.insert(exercise.rank) {
                errors.push(format!("Exercise '{}' shares rank {}", id, exercise.rank));
            }
        }

        errors
    }
}

impl ExerciseCatalog for StaticCatalog {
    fn exercise(&self, id: &str) -> Option<ExerciseInfo> {
        self.exercises.get(id).cloned()
    }

    fn ranked_pool(&self) -> Vec<ExerciseInfo> {
        let mut pool: Vec<_> = self.exercises.values().cloned().collect();
        pool.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));
        pool
    }
}

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<StaticCatalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn default_catalog() -> &'static StaticCatalog {
    &DEFAULT_CATALOG
}

fn entry(id: &str, name: &str, areas: &[&str], equipment: &[&str], rank: u32) -> ExerciseInfo {
    ExerciseInfo {
        id: id.into(),
        name: name.into(),
        body_areas: areas.iter().map(|a| a.to_string()).collect(),
        equipment: equipment.iter().map(|e| e.to_string()).collect(),
        rank,
    }
}

/// Builds the default catalog of common gym exercises
pub fn build_default_catalog() -> StaticCatalog {
    StaticCatalog::new(vec![
        // Chest / push
        entry("bench_press", "Barbell Bench Press", &["chest", "triceps"], &["barbell", "bench"], 1),
        entry("push_up", "Push-up", &["chest", "triceps"], &["bodyweight"], 6),
        entry("incline_db_press", "Incline Dumbbell Press", &["chest", "shoulders"], &["dumbbell", "bench"], 12),
        entry("dips", "Parallel Bar Dips", &["chest", "triceps"], &["dip_bars"], 19),
        entry("cable_fly", "Cable Fly", &["chest"], &["cable"], 27),
        // Shoulders
        entry("overhead_press", "Overhead Press", &["shoulders", "triceps"], &["barbell"], 4),
        entry("lateral_raise", "Dumbbell Lateral Raise", &["shoulders"], &["dumbbell"], 14),
        entry("face_pull", "Face Pull", &["shoulders", "back"], &["cable"], 22),
        // Back / pull
        entry("deadlift", "Conventional Deadlift", &["back", "hamstrings", "glutes"], &["barbell"], 3),
        entry("pull_up", "Pull-up", &["back", "biceps"], &["pullup_bar"], 5),
        entry("barbell_row", "Barbell Row", &["back", "biceps"], &["barbell"], 8),
        entry("lat_pulldown", "Lat Pulldown", &["back", "biceps"], &["cable"], 11),
        entry("seated_cable_row", "Seated Cable Row", &["back"], &["cable"], 17),
        // Arms
        entry("barbell_curl", "Barbell Curl", &["biceps"], &["barbell"], 13),
        entry("hammer_curl", "Hammer Curl", &["biceps", "forearms"], &["dumbbell"], 20),
        entry("triceps_pushdown", "Triceps Pushdown", &["triceps"], &["cable"], 15),
        entry("skull_crusher", "Skull Crusher", &["triceps"], &["barbell", "bench"], 24),
        // Legs
        entry("back_squat", "Barbell Back Squat", &["quadriceps", "glutes"], &["barbell", "rack"], 2),
        entry("romanian_deadlift", "Romanian Deadlift", &["hamstrings", "glutes"], &["barbell"], 9),
        entry("leg_press", "Leg Press", &["quadriceps", "glutes"], &["machine"], 10),
        entry("walking_lunge", "Walking Lunge", &["quadriceps", "glutes"], &["dumbbell"], 16),
        entry("leg_curl", "Lying Leg Curl", &["hamstrings"], &["machine"], 18),
        entry("calf_raise", "Standing Calf Raise", &["calves"], &["machine"], 21),
        entry("hip_thrust", "Barbell Hip Thrust", &["glutes", "hamstrings"], &["barbell", "bench"], 23),
        // Core
        entry("plank", "Plank", &["core"], &["bodyweight"], 7),
        entry("hanging_leg_raise", "Hanging Leg Raise", &["core"], &["pullup_bar"], 25),
        entry("cable_crunch", "Cable Crunch", &["core"], &["cable"], 28),
        // Conditioning
        entry("kettlebell_swing", "Kettlebell Swing", &["cardio", "glutes", "hamstrings"], &["kettlebell"], 26),
        entry("rowing_machine", "Rowing Machine", &["cardio", "back"], &["rower"], 29),
        entry("burpee", "Burpee", &["cardio", "chest", "quadriceps"], &["bodyweight"], 30),
        entry("jump_rope", "Jump Rope", &["cardio", "calves"], &["rope"], 31),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_validates() {
        let catalog = build_default_catalog();
        let errors = catalog.validate();
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = default_catalog();
        let bench = catalog.exercise("bench_press").unwrap();
        assert_eq!(bench.name, "Barbell Bench Press");
        assert!(bench.body_areas.contains(&"chest".to_string()));
        assert!(catalog.exercise("nope").is_none());
    }

    #[test]
    fn test_ranked_pool_is_sorted() {
        let pool = default_catalog().ranked_pool();
        assert_eq!(pool.len(), default_catalog().len());
        assert_eq!(pool[0].id, "bench_press");
        assert!(pool.windows(2).all(|w| w[0].rank <= w[1].rank));
    }

    #[test]
    fn test_duplicate_rank_reported() {
        let catalog = StaticCatalog::new(vec![
            entry("a", "A", &["chest"], &[], 1),
            entry("b", "B", &["back"], &[], 1),
        ]);
        assert!(catalog.validate().iter().any(|e| e.contains("shares rank")));
    }

    #[test]
    fn test_delimiter_in_body_area_reported() {
        let catalog = StaticCatalog::new(vec![entry("a", "A", &["upper,back"], &[], 1)]);
        assert!(catalog.validate().iter().any(|e| e.contains("comma")));
    }
}
