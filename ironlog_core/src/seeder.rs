//! One-time population of the system templates.
//!
//! Each seeded template is described by a [`SeedSpec`]: a category, the body
//! areas (and optionally equipment) it draws from, and a prescription. The
//! exercises are the best-ranked catalog entries that match, so the seeded
//! set follows whatever catalog the ledger is given.

use chrono::{DateTime, Utc};

use crate::catalog::{ExerciseCatalog, ExerciseInfo};
use crate::store::{Atomic, Repository, Store, TemplateRepository};
use crate::types::{
    new_id, normalize_body_areas, Difficulty, TemplateCategory, TemplateExercise, WorkoutTemplate,
    SYSTEM_OWNER,
};
use crate::Result;

/// Blueprint of one system template
#[derive(Clone, Debug)]
pub struct SeedSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub category: TemplateCategory,
    pub difficulty: Difficulty,
    /// Exercises must target one of these areas; empty accepts any
    pub areas: &'static [&'static str],
    pub equipment: Option<&'static str>,
    pub exercise_count: usize,
    pub sets: u32,
    pub rep_min: u32,
    pub rep_max: u32,
    pub rest_seconds: u32,
}

/// Seconds of work assumed per set when estimating a template's length
const SECONDS_PER_SET: u32 = 40;

pub const SEED_SPECS: &[SeedSpec] = &[
    SeedSpec {
        name: "Push Basics",
        description: "Chest, shoulders and triceps with the staple presses.",
        category: TemplateCategory::Push,
        difficulty: Difficulty::Beginner,
        areas: &["chest", "shoulders", "triceps"],
        equipment: None,
        exercise_count: 4,
        sets: 3,
        rep_min: 8,
        rep_max: 12,
        rest_seconds: 90,
    },
    SeedSpec {
        name: "Pull Basics",
        description: "Back and biceps built around the hinge and the pull-up.",
        category: TemplateCategory::Pull,
        difficulty: Difficulty::Beginner,
        areas: &["back", "biceps"],
        equipment: None,
        exercise_count: 4,
        sets: 3,
        rep_min: 8,
        rep_max: 12,
        rest_seconds: 90,
    },
    SeedSpec {
        name: "Leg Day",
        description: "Squat-led lower body session.",
        category: TemplateCategory::Legs,
        difficulty: Difficulty::Intermediate,
        areas: &["quadriceps", "hamstrings", "glutes", "calves"],
        equipment: None,
        exercise_count: 5,
        sets: 4,
        rep_min: 6,
        rep_max: 10,
        rest_seconds: 120,
    },
    SeedSpec {
        name: "Upper Body Builder",
        description: "Balanced upper body volume.",
        category: TemplateCategory::UpperBody,
        difficulty: Difficulty::Intermediate,
        areas: &["chest", "back", "shoulders", "biceps", "triceps"],
        equipment: None,
        exercise_count: 5,
        sets: 3,
        rep_min: 8,
        rep_max: 12,
        rest_seconds: 90,
    },
    SeedSpec {
        name: "Lower Body Machines",
        description: "Machine-based lower body work, easy on the lower back.",
        category: TemplateCategory::LowerBody,
        difficulty: Difficulty::Beginner,
        areas: &["quadriceps", "hamstrings", "glutes", "calves"],
        equipment: Some("machine"),
        exercise_count: 4,
        sets: 3,
        rep_min: 10,
        rep_max: 15,
        rest_seconds: 75,
    },
    SeedSpec {
        name: "Full Body Starter",
        description: "The most common lift for every major area.",
        category: TemplateCategory::FullBody,
        difficulty: Difficulty::Beginner,
        areas: &["chest", "back", "quadriceps", "shoulders", "core"],
        equipment: None,
        exercise_count: 5,
        sets: 3,
        rep_min: 8,
        rep_max: 10,
        rest_seconds: 90,
    },
    SeedSpec {
        name: "Strength Foundations",
        description: "Heavy barbell triples and fives.",
        category: TemplateCategory::Strength,
        difficulty: Difficulty::Advanced,
        areas: &[],
        equipment: Some("barbell"),
        exercise_count: 4,
        sets: 5,
        rep_min: 3,
        rep_max: 5,
        rest_seconds: 180,
    },
    SeedSpec {
        name: "Conditioning Circuit",
        description: "Short rests, high reps.",
        category: TemplateCategory::Cardio,
        difficulty: Difficulty::Beginner,
        areas: &["cardio"],
        equipment: None,
        exercise_count: 4,
        sets: 3,
        rep_min: 12,
        rep_max: 20,
        rest_seconds: 45,
    },
];

impl SeedSpec {
    fn accepts(&self, exercise: &ExerciseInfo) -> bool {
        let area_ok = self.areas.is_empty()
            || exercise
                .body_areas
                .iter()
                .any(|a| self.areas.contains(&a.as_str()));
        let equipment_ok = self
            .equipment
            .map_or(true, |e| exercise.equipment.iter().any(|x| x == e));
        area_ok && equipment_ok
    }

    /// Build the template from the best-ranked matching exercises, or `None`
    /// when the catalog has nothing that fits.
    pub fn build(&self, pool: &[ExerciseInfo], now: DateTime<Utc>) -> Option<WorkoutTemplate> {
        let picked: Vec<&ExerciseInfo> = pool
            .iter()
            .filter(|e| self.accepts(e))
            .take(self.exercise_count)
            .collect();
        if picked.is_empty() {
            return None;
        }

        let exercises: Vec<TemplateExercise> = picked
            .iter()
            .enumerate()
            .map(|(position, info)| TemplateExercise {
                id: new_id(),
                exercise_id: info.id.clone(),
                exercise_name: info.name.clone(),
                body_areas: normalize_body_areas(&info.body_areas),
                position: position as u32,
                suggested_sets: self.sets,
                rep_min: self.rep_min,
                rep_max: self.rep_max,
                suggested_weight: None,
                rest_seconds: self.rest_seconds,
                notes: None,
            })
            .collect();

        let all_areas: Vec<&String> = exercises.iter().flat_map(|e| &e.body_areas).collect();
        let total_sets = self.sets * exercises.len() as u32;
        let seconds = total_sets * (self.rest_seconds + SECONDS_PER_SET);

        let mut template =
            WorkoutTemplate::new(SYSTEM_OWNER, self.name, self.category, self.difficulty, now);
        template.description = Some(self.description.to_string());
        template.body_areas = normalize_body_areas(&all_areas);
        template.estimated_duration_minutes = (seconds + 59) / 60;
        template.exercises = exercises;
        Some(template)
    }
}

/// Seed the system templates unless some already exist. Returns how many were
/// written; all of them are written or none are.
pub fn seed_system_templates(
    store: &Store,
    catalog: &dyn ExerciseCatalog,
    now: DateTime<Utc>,
) -> Result<usize> {
    let existing = store.templates().count_system()?;
    if existing > 0 {
        tracing::debug!(existing, "system templates already seeded");
        return Ok(0);
    }

    let pool = catalog.ranked_pool();
    let scope = Atomic::begin(store.conn())?;
    let repo = TemplateRepository::new(scope.conn());
    let mut seeded = 0;
    for spec in SEED_SPECS {
        match spec.build(&pool, now) {
            Some(template) => {
                repo.save(&template)?;
                seeded += 1;
            }
            None => tracing::warn!(template = spec.name, "no catalog exercise fits, skipping"),
        }
    }
    scope.commit()?;

    tracing::info!(seeded, "seeded system templates");
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{default_catalog, StaticCatalog};
    use crate::store::TemplateFilter;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_specs_pick_best_ranked_exercises() {
        let pool = default_catalog().ranked_pool();
        let push = SEED_SPECS[0].build(&pool, now()).unwrap();
        let ids: Vec<_> = push.exercises.iter().map(|e| e.exercise_id.as_str()).collect();
        assert_eq!(ids, vec!["bench_press", "overhead_press", "push_up", "incline_db_press"]);
        assert!(push.is_system());
        assert!(push.validate().is_empty());

        let strength = SEED_SPECS
            .iter()
            .find(|s| s.category == TemplateCategory::Strength)
            .unwrap()
            .build(&pool, now())
            .unwrap();
        assert_eq!(strength.exercises[0].exercise_id, "bench_press");
        assert_eq!(strength.exercises[1].exercise_id, "back_squat");
        // 4 exercises × 5 sets × (180 + 40) s
        assert_eq!(strength.estimated_duration_minutes, 74);
    }

    #[test]
    fn test_seeding_runs_once() {
        let store = Store::open_in_memory().unwrap();
        let first = seed_system_templates(&store, default_catalog(), now()).unwrap();
        assert_eq!(first, SEED_SPECS.len());

        let second = seed_system_templates(&store, default_catalog(), now()).unwrap();
        assert_eq!(second, 0);
        assert_eq!(store.templates().count_system().unwrap() as usize, SEED_SPECS.len());

        let listed = store.templates().list(&TemplateFilter::system()).unwrap();
        assert_eq!(listed[0].name, "Push Basics");
        assert!(listed.iter().all(|t| !t.exercises.is_empty()));
    }

    #[test]
    fn test_empty_catalog_seeds_nothing() {
        let store = Store::open_in_memory().unwrap();
        let seeded = seed_system_templates(&store, &StaticCatalog::default(), now()).unwrap();
        assert_eq!(seeded, 0);
        assert_eq!(store.templates().count_system().unwrap(), 0);
    }
}
