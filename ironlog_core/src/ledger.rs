//! The training ledger: the one component that owns the store, the clock,
//! the exercise catalog and the configuration.
//!
//! Every mutation that touches more than one repository runs inside a single
//! savepoint scope, so it either lands completely or not at all. Derived
//! views (statistics, progress, records, recommendations) are computed from
//! the stored history; the progress snapshot is cached and invalidated by
//! corrective writes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Datelike, Utc};

use crate::catalog::{default_catalog, ExerciseCatalog, ExerciseInfo};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::customization;
use crate::export;
use crate::lock::WriterLock;
use crate::progression::{LevelCurve, ProgressSnapshot, SessionOutcome};
use crate::recommendation::{self, TodaysRecommendation};
use crate::records::{self, SetPerformance};
use crate::seeder;
use crate::stats::{self, StatsQuery, WorkoutStats};
use crate::store::{
    Atomic, RecordFilter, Repository, Store, TemplateFilter, UserWorkoutFilter, WorkoutFilter,
};
use crate::types::{
    new_id, normalize_body_areas, Achievement, BodyAreaProgress, ExerciseChange, Milestone,
    PersonalRecord, RecordKind, StreakData, UserExercise, UserWorkout, Workout, WorkoutExercise,
    WorkoutSet, WorkoutStatus, WorkoutSummary, WorkoutTemplate,
};
use crate::{Error, Result};

/// One exercise of a workout plan: `sets` identical sets, not yet performed
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedExercise {
    pub exercise_id: String,
    pub sets: u32,
    pub weight: f64,
    pub reps: u32,
}

/// Input for [`Ledger::plan_workout`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkoutPlan {
    pub name: String,
    pub body_areas: Vec<String>,
    pub planned_duration_minutes: Option<u32>,
    pub notes: Option<String>,
    pub exercises: Vec<PlannedExercise>,
}

impl WorkoutPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn exercise(mut self, exercise_id: impl Into<String>, sets: u32, weight: f64, reps: u32) -> Self {
        self.exercises.push(PlannedExercise {
            exercise_id: exercise_id.into(),
            sets,
            weight,
            reps,
        });
        self
    }

    pub fn with_body_areas(mut self, areas: &[impl AsRef<str>]) -> Self {
        self.body_areas = normalize_body_areas(areas);
        self
    }

    pub fn with_planned_duration(mut self, minutes: u32) -> Self {
        self.planned_duration_minutes = Some(minutes);
        self
    }
}

/// Input for [`Ledger::add_user_exercise`]
#[derive(Clone, Debug, PartialEq)]
pub struct NewUserExercise {
    pub exercise_id: String,
    pub sets: u32,
    pub rep_min: u32,
    pub rep_max: u32,
    pub weight: Option<f64>,
    pub rest_seconds: u32,
}

impl NewUserExercise {
    pub fn new(exercise_id: impl Into<String>, sets: u32, rep_min: u32, rep_max: u32) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            sets,
            rep_min,
            rep_max,
            weight: None,
            rest_seconds: 90,
        }
    }
}

/// A set after it was written, with the personal records it holds
#[derive(Clone, Debug, PartialEq)]
pub struct LoggedSet {
    pub workout_id: String,
    pub workout_exercise_id: String,
    pub set: WorkoutSet,
    pub records: Vec<PersonalRecord>,
}

/// A completed workout and what completing it changed
#[derive(Clone, Debug, PartialEq)]
pub struct CompletedWorkout {
    pub workout: Workout,
    pub outcome: SessionOutcome,
}

pub struct Ledger {
    store: Store,
    clock: Box<dyn Clock>,
    catalog: Box<dyn ExerciseCatalog>,
    config: Config,
    curve: LevelCurve,
    // Declared last: released after the store is closed
    _lock: Option<WriterLock>,
}

/// Whether `record` describes `set` (used to report the records a set holds)
fn held_by(record: &PersonalRecord, set: &WorkoutSet) -> bool {
    match record.kind {
        RecordKind::MaxWeight => record.value == set.weight,
        RecordKind::MaxVolume => record.value == set.volume(),
        RecordKind::MaxReps => {
            record.value == f64::from(set.reps) && record.secondary_value == Some(set.weight)
        }
    }
}

impl Ledger {
    /// Open the on-disk ledger described by `config`, taking the writer lock
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let path = config.data.database_path();
        let lock = WriterLock::acquire(&path)?;
        let store = Store::open_at(&path)?;
        Self::with_parts(
            store,
            config,
            Box::new(SystemClock),
            Box::new(default_catalog().clone()),
            Some(lock),
        )
    }

    /// A throwaway in-memory ledger
    pub fn open_in_memory(config: Config) -> Result<Self> {
        Self::with_parts(
            Store::open_in_memory()?,
            config,
            Box::new(SystemClock),
            Box::new(default_catalog().clone()),
            None,
        )
    }

    /// Assemble a ledger from its collaborators. Seeds the system templates
    /// when the configuration asks for it.
    pub fn with_parts(
        store: Store,
        config: Config,
        clock: Box<dyn Clock>,
        catalog: Box<dyn ExerciseCatalog>,
        lock: Option<WriterLock>,
    ) -> Result<Self> {
        config.validate()?;
        let curve = LevelCurve::from_config(&config.progression);
        let ledger = Self {
            store,
            clock,
            catalog,
            config,
            curve,
            _lock: lock,
        };
        if ledger.config.seeding.seed_system_templates {
            ledger.seed_system_templates()?;
        }
        Ok(ledger)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn resolve_exercise(&self, exercise_id: &str) -> Result<ExerciseInfo> {
        self.catalog
            .exercise(exercise_id)
            .ok_or_else(|| Error::Validation(format!("unknown exercise id '{}'", exercise_id)))
    }

    // ------------------------------------------------------------------
    // Workouts
    // ------------------------------------------------------------------

    fn load_workout(&self, id: &str) -> Result<Workout> {
        self.store
            .workouts()
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("workout {}", id)))
    }

    fn ensure_open(workout: &Workout) -> Result<()> {
        if workout.status.is_terminal() {
            return Err(Error::Consistency(format!(
                "workout {} is {}; only corrective edits are allowed",
                workout.id, workout.status
            )));
        }
        Ok(())
    }

    /// Create a planned workout from catalog exercises
    pub fn plan_workout(&self, owner_id: &str, plan: &WorkoutPlan) -> Result<Workout> {
        let mut exercises = Vec::with_capacity(plan.exercises.len());
        for (position, planned) in plan.exercises.iter().enumerate() {
            let info = self.resolve_exercise(&planned.exercise_id)?;
            let sets = (1..=planned.sets)
                .map(|n| WorkoutSet::new(n, planned.weight, planned.reps))
                .collect();
            exercises.push(
                WorkoutExercise::new(info.id, info.name, &info.body_areas, position as u32)
                    .with_sets(sets),
            );
        }

        let mut workout = Workout::new(owner_id, plan.name.clone(), self.now())
            .with_body_areas(&plan.body_areas)
            .with_exercises(exercises);
        workout.planned_duration_minutes = plan.planned_duration_minutes;
        workout.notes = plan.notes.clone();

        self.store.workouts().save(&workout)?;
        tracing::info!(workout_id = %workout.id, name = %workout.name, "planned workout");
        Ok(workout)
    }

    /// Store a fully built workout aggregate
    pub fn create_workout(&self, workout: &Workout) -> Result<String> {
        for exercise in &workout.exercises {
            self.resolve_exercise(&exercise.exercise_id)?;
        }
        self.store.workouts().save(workout)
    }

    /// Append a catalog exercise to an open workout
    pub fn add_workout_exercise(&self, workout_id: &str, exercise_id: &str) -> Result<WorkoutExercise> {
        let mut workout = self.load_workout(workout_id)?;
        Self::ensure_open(&workout)?;
        let info = self.resolve_exercise(exercise_id)?;

        let position = workout
            .exercises
            .iter()
            .map(|e| e.position + 1)
            .max()
            .unwrap_or(0);
        let exercise = WorkoutExercise::new(info.id, info.name, &info.body_areas, position);
        workout.exercises.push(exercise.clone());
        self.store.workouts().update(&workout)?;
        Ok(exercise)
    }

    pub fn start_workout(&self, id: &str) -> Result<Workout> {
        let workout = self.load_workout(id)?.start(self.now())?;
        self.store.workouts().update(&workout)?;
        tracing::info!(workout_id = %id, "workout started");
        Ok(workout)
    }

    /// Complete an in-progress workout and fold it into the progress snapshot
    pub fn complete_workout(&self, id: &str) -> Result<CompletedWorkout> {
        let now = self.now();
        let workout = self.load_workout(id)?.complete(now)?;
        let mut snapshot = self.progress(&workout.owner_id)?;

        let scope = Atomic::begin(self.store.conn())?;
        self.store.workouts().update(&workout)?;
        let outcome = if snapshot.can_fold(&workout) {
            snapshot.apply_session(&workout)
        } else {
            // Session time falls before the fold mark (clock moved back)
            tracing::warn!(workout_id = %id, "completed session predates progress; refolding history");
            let refolded = self.recompute_progress(&workout.owner_id)?;
            let outcome = SessionOutcome::between(&workout, &snapshot, &refolded);
            snapshot = refolded;
            outcome
        };
        self.store
            .progress_cache()
            .store(&workout.owner_id, &snapshot, now)?;
        scope.commit()?;

        tracing::info!(
            workout_id = %id,
            volume = outcome.volume,
            level_ups = outcome.level_ups.len(),
            achievements = outcome.new_achievements.len(),
            "workout completed"
        );
        for level_up in &outcome.level_ups {
            tracing::info!(body_area = %level_up.body_area, level = level_up.level, "level up");
        }
        Ok(CompletedWorkout { workout, outcome })
    }

    pub fn cancel_workout(&self, id: &str) -> Result<Workout> {
        let workout = self.load_workout(id)?.cancel()?;
        self.store.workouts().update(&workout)?;
        tracing::info!(workout_id = %id, "workout cancelled");
        Ok(workout)
    }

    /// Delete a workout; records and progress that depended on it are rebuilt
    pub fn delete_workout(&self, id: &str) -> Result<bool> {
        let Some(workout) = self.store.workouts().get(id)? else {
            return Ok(false);
        };

        let scope = Atomic::begin(self.store.conn())?;
        self.store.workouts().delete(id)?;
        if workout.status == WorkoutStatus::Completed {
            self.store.progress_cache().invalidate(&workout.owner_id)?;
        }
        let touched: BTreeSet<&str> = workout
            .exercises
            .iter()
            .filter(|e| e.completed_sets() > 0)
            .map(|e| e.exercise_id.as_str())
            .collect();
        for exercise_id in touched {
            self.rebuild_records(&workout.owner_id, exercise_id)?;
        }
        scope.commit()?;

        tracing::info!(workout_id = %id, "workout deleted");
        Ok(true)
    }

    /// Append a set to an exercise of an open workout
    pub fn log_set(
        &self,
        workout_id: &str,
        workout_exercise_id: &str,
        weight: f64,
        reps: u32,
        completed: bool,
    ) -> Result<LoggedSet> {
        let now = self.now();
        let mut workout = self.load_workout(workout_id)?;
        Self::ensure_open(&workout)?;

        let exercise = workout.exercise_mut(workout_exercise_id).ok_or_else(|| {
            Error::NotFound(format!("exercise {} in workout {}", workout_exercise_id, workout_id))
        })?;
        let mut set = WorkoutSet::new(exercise.next_set_number(), weight, reps);
        if completed {
            set = set.completed_at(now);
        }
        exercise.sets.push(set.clone());
        let exercise_id = exercise.exercise_id.clone();
        let exercise_name = exercise.exercise_name.clone();

        let scope = Atomic::begin(self.store.conn())?;
        self.store.workouts().update(&workout)?;
        let records = if completed {
            self.detect_records(&workout, &exercise_id, &exercise_name, &set, now)?
        } else {
            Vec::new()
        };
        scope.commit()?;

        Ok(LoggedSet {
            workout_id: workout_id.to_string(),
            workout_exercise_id: workout_exercise_id.to_string(),
            set,
            records,
        })
    }

    fn find_set<'w>(workout: &'w mut Workout, set_id: &str) -> Result<(&'w mut WorkoutExercise, usize)> {
        let workout_id = workout.id.clone();
        for exercise in workout.exercises.iter_mut() {
            if let Some(index) = exercise.sets.iter().position(|s| s.id == set_id) {
                return Ok((exercise, index));
            }
        }
        Err(Error::NotFound(format!("set {} in workout {}", set_id, workout_id)))
    }

    /// Change the weight and reps of a set in an open workout
    pub fn update_set(&self, workout_id: &str, set_id: &str, weight: f64, reps: u32) -> Result<LoggedSet> {
        let mut workout = self.load_workout(workout_id)?;
        Self::ensure_open(&workout)?;

        let (exercise, index) = Self::find_set(&mut workout, set_id)?;
        exercise.sets[index].weight = weight;
        exercise.sets[index].reps = reps;
        let set = exercise.sets[index].clone();
        let workout_exercise_id = exercise.id.clone();
        let exercise_id = exercise.exercise_id.clone();

        let scope = Atomic::begin(self.store.conn())?;
        self.store.workouts().update(&workout)?;
        // A completed set may have held a record it no longer deserves
        let records = if set.completed {
            self.rebuild_records(&workout.owner_id, &exercise_id)?
                .into_iter()
                .filter(|r| {
                    r.is_current
                        && r.workout_id.as_deref() == Some(workout_id)
                        && Some(r.achieved_at) == set.completed_at
                        && held_by(r, &set)
                })
                .collect()
        } else {
            Vec::new()
        };
        scope.commit()?;

        Ok(LoggedSet {
            workout_id: workout_id.to_string(),
            workout_exercise_id,
            set,
            records,
        })
    }

    /// Mark a set of an open workout as performed now. Completing an already
    /// completed set changes nothing.
    pub fn complete_set(&self, workout_id: &str, set_id: &str) -> Result<LoggedSet> {
        let now = self.now();
        let mut workout = self.load_workout(workout_id)?;
        Self::ensure_open(&workout)?;

        let (exercise, index) = Self::find_set(&mut workout, set_id)?;
        let workout_exercise_id = exercise.id.clone();
        if exercise.sets[index].completed {
            return Ok(LoggedSet {
                workout_id: workout_id.to_string(),
                workout_exercise_id,
                set: exercise.sets[index].clone(),
                records: Vec::new(),
            });
        }
        exercise.sets[index].completed = true;
        exercise.sets[index].completed_at = Some(now);
        let set = exercise.sets[index].clone();
        let exercise_id = exercise.exercise_id.clone();
        let exercise_name = exercise.exercise_name.clone();

        let scope = Atomic::begin(self.store.conn())?;
        self.store.workouts().update(&workout)?;
        let records = self.detect_records(&workout, &exercise_id, &exercise_name, &set, now)?;
        scope.commit()?;

        Ok(LoggedSet {
            workout_id: workout_id.to_string(),
            workout_exercise_id,
            set,
            records,
        })
    }

    fn detect_records(
        &self,
        workout: &Workout,
        exercise_id: &str,
        exercise_name: &str,
        set: &WorkoutSet,
        now: DateTime<Utc>,
    ) -> Result<Vec<PersonalRecord>> {
        let performance = SetPerformance {
            owner_id: &workout.owner_id,
            exercise_id,
            exercise_name,
            workout_id: Some(&workout.id),
            weight: set.weight,
            reps: set.reps,
            achieved_at: set.completed_at.unwrap_or(now),
        };
        records::detect_and_store(&self.store.records(), &performance, self.config.records.history)
    }

    /// Full-replace edit of any workout, terminal ones included. Status and
    /// owner cannot change here; records and cached progress are rebuilt.
    pub fn correct_workout(&self, workout: &Workout) -> Result<()> {
        let stored = self.load_workout(&workout.id)?;
        if stored.status != workout.status || stored.owner_id != workout.owner_id {
            return Err(Error::Consistency(format!(
                "corrective update of workout {} cannot change its status or owner",
                workout.id
            )));
        }
        let known: BTreeSet<&str> = stored.exercises.iter().map(|e| e.exercise_id.as_str()).collect();
        for exercise in &workout.exercises {
            if !known.contains(exercise.exercise_id.as_str()) {
                self.resolve_exercise(&exercise.exercise_id)?;
            }
        }

        let scope = Atomic::begin(self.store.conn())?;
        self.store.workouts().update(workout)?;
        self.store.progress_cache().invalidate(&workout.owner_id)?;
        let affected: BTreeSet<&str> = stored
            .exercises
            .iter()
            .chain(workout.exercises.iter())
            .map(|e| e.exercise_id.as_str())
            .collect();
        for exercise_id in affected {
            self.rebuild_records(&workout.owner_id, exercise_id)?;
        }
        scope.commit()?;

        tracing::info!(workout_id = %workout.id, "workout corrected");
        Ok(())
    }

    pub fn get_workout(&self, id: &str) -> Result<Option<Workout>> {
        self.store.workouts().get(id)
    }

    pub fn list_workouts(&self, filter: &WorkoutFilter) -> Result<Vec<Workout>> {
        self.store.workouts().list(filter)
    }

    pub fn workout_summaries(&self, filter: &WorkoutFilter) -> Result<Vec<WorkoutSummary>> {
        self.store.workouts().summaries(filter)
    }

    /// Start a session from a template the owner can see
    pub fn start_from_template(&self, owner_id: &str, template_id: &str) -> Result<Workout> {
        let now = self.now();
        let template = self.visible_template(owner_id, template_id)?;
        let exercises = template
            .ordered_exercises()
            .into_iter()
            .map(|e| customization::plan_exercise(&UserExercise::from_template(e)))
            .collect();

        let mut workout = Workout::new(owner_id, template.name.clone(), now)
            .with_body_areas(&template.body_areas)
            .with_exercises(exercises);
        if template.estimated_duration_minutes > 0 {
            workout.planned_duration_minutes = Some(template.estimated_duration_minutes);
        }
        workout.source_template_id = Some(template.id.clone());
        let workout = workout.start(now)?;

        let scope = Atomic::begin(self.store.conn())?;
        self.store.workouts().save(&workout)?;
        self.store.templates().record_usage(&template.id, now)?;
        scope.commit()?;

        tracing::info!(workout_id = %workout.id, template_id, "workout started from template");
        Ok(workout)
    }

    /// Start a session from the replayed exercise list of a personal workout
    pub fn start_from_user_workout(&self, user_workout_id: &str) -> Result<Workout> {
        let now = self.now();
        let user_workout = self.load_user_workout(user_workout_id)?;
        let effective = customization::effective_exercises(&user_workout);

        let areas: Vec<&String> = effective.iter().flat_map(|e| &e.body_areas).collect();
        let mut workout = Workout::new(&user_workout.owner_id, user_workout.name.clone(), now)
            .with_body_areas(&areas)
            .with_exercises(effective.iter().map(customization::plan_exercise).collect());
        workout.source_user_workout_id = Some(user_workout.id.clone());
        workout.source_template_id = user_workout.source_template_id.clone();
        let workout = workout.start(now)?;

        self.store.workouts().save(&workout)?;
        tracing::info!(workout_id = %workout.id, user_workout_id, "workout started from user workout");
        Ok(workout)
    }

    /// Rebuild the records of one exercise from the owner's completed sets
    pub fn rebuild_records(&self, owner_id: &str, exercise_id: &str) -> Result<Vec<PersonalRecord>> {
        let history = self
            .store
            .workouts()
            .list(&WorkoutFilter::for_owner(owner_id).chronological())?;

        let mut performances: Vec<SetPerformance<'_>> = Vec::new();
        for workout in &history {
            for exercise in workout.ordered_exercises() {
                if exercise.exercise_id != exercise_id {
                    continue;
                }
                let mut sets: Vec<&WorkoutSet> = exercise.sets.iter().filter(|s| s.completed).collect();
                sets.sort_by_key(|s| s.set_number);
                for set in sets {
                    performances.push(SetPerformance {
                        owner_id,
                        exercise_id,
                        exercise_name: &exercise.exercise_name,
                        workout_id: Some(&workout.id),
                        weight: set.weight,
                        reps: set.reps,
                        achieved_at: set.completed_at.unwrap_or_else(|| workout.session_time()),
                    });
                }
            }
        }
        // Stable: ties keep session then set order
        performances.sort_by_key(|p| p.achieved_at);

        records::rebuild_exercise(
            &self.store.records(),
            owner_id,
            exercise_id,
            &performances,
            self.config.records.history,
        )
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    fn visible_template(&self, owner_id: &str, template_id: &str) -> Result<WorkoutTemplate> {
        self.store
            .templates()
            .get(template_id)?
            .filter(|t| t.is_system() || t.owner_id == owner_id)
            .ok_or_else(|| Error::NotFound(format!("template {}", template_id)))
    }

    fn check_template_exercises(&self, template: &WorkoutTemplate) -> Result<()> {
        for exercise in &template.exercises {
            self.resolve_exercise(&exercise.exercise_id)?;
        }
        Ok(())
    }

    /// Store a user template; system templates only come from seeding
    pub fn create_template(&self, template: &WorkoutTemplate) -> Result<String> {
        if template.is_system() {
            return Err(Error::Consistency(
                "system templates are seeded, not created".to_string(),
            ));
        }
        self.check_template_exercises(template)?;
        let id = self.store.templates().save(template)?;
        tracing::info!(template_id = %id, name = %template.name, "template created");
        Ok(id)
    }

    pub fn update_template(&self, template: &WorkoutTemplate) -> Result<()> {
        self.check_template_exercises(template)?;
        let updated = WorkoutTemplate {
            updated_at: self.now(),
            ..template.clone()
        };
        self.store.templates().update(&updated)
    }

    /// Delete one of the caller's templates; templates the caller cannot
    /// see are reported as absent
    pub fn delete_template(&self, owner_id: &str, id: &str) -> Result<bool> {
        match self.visible_template(owner_id, id) {
            Ok(_) => self.store.templates().delete(id),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn set_template_favorite(&self, owner_id: &str, id: &str, favorite: bool) -> Result<()> {
        self.visible_template(owner_id, id)?;
        self.store.templates().set_favorite(id, favorite)
    }

    /// Count one use of a template
    pub fn use_template(&self, owner_id: &str, id: &str) -> Result<()> {
        self.visible_template(owner_id, id)?;
        self.store.templates().record_usage(id, self.now())
    }

    pub fn get_template(&self, id: &str) -> Result<Option<WorkoutTemplate>> {
        self.store.templates().get(id)
    }

    pub fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<WorkoutTemplate>> {
        self.store.templates().list(filter)
    }

    pub fn seed_system_templates(&self) -> Result<usize> {
        seeder::seed_system_templates(&self.store, self.catalog.as_ref(), self.now())
    }

    // ------------------------------------------------------------------
    // Personal workouts
    // ------------------------------------------------------------------

    fn load_user_workout(&self, id: &str) -> Result<UserWorkout> {
        self.store
            .user_workouts()
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("user workout {}", id)))
    }

    /// Clone a template into a personal workout and count the use
    pub fn create_user_workout_from_template(
        &self,
        owner_id: &str,
        template_id: &str,
        name: Option<&str>,
    ) -> Result<UserWorkout> {
        let now = self.now();
        let template = self.visible_template(owner_id, template_id)?;
        let user_workout = customization::create_from_template(&template, owner_id, name, now)?;

        let scope = Atomic::begin(self.store.conn())?;
        self.store.user_workouts().save(&user_workout)?;
        self.store.templates().record_usage(template_id, now)?;
        scope.commit()?;

        tracing::info!(user_workout_id = %user_workout.id, template_id, "user workout created from template");
        Ok(user_workout)
    }

    pub fn create_custom_user_workout(&self, owner_id: &str, name: &str) -> Result<UserWorkout> {
        let user_workout = UserWorkout::custom(owner_id, name, self.now());
        self.store.user_workouts().save(&user_workout)?;
        Ok(user_workout)
    }

    /// Add a catalog exercise at the end of a personal workout
    pub fn add_user_exercise(&self, user_workout_id: &str, exercise: &NewUserExercise) -> Result<UserWorkout> {
        let now = self.now();
        let mut user_workout = self.load_user_workout(user_workout_id)?;
        let info = self.resolve_exercise(&exercise.exercise_id)?;
        if exercise.sets == 0 {
            return Err(Error::Validation("sets must be at least 1".to_string()));
        }

        let entry = UserExercise {
            id: new_id(),
            exercise_id: info.id,
            exercise_name: info.name,
            body_areas: normalize_body_areas(&info.body_areas),
            position: customization::next_position(&user_workout),
            sets: exercise.sets,
            rep_min: exercise.rep_min,
            rep_max: exercise.rep_max,
            weight: exercise.weight,
            rest_seconds: exercise.rest_seconds,
            notes: None,
            is_from_template: false,
            template_exercise_id: None,
        };
        customization::add_exercise(&mut user_workout, entry, now)?;
        self.store.user_workouts().update(&user_workout)?;
        Ok(user_workout)
    }

    pub fn remove_user_exercise(&self, user_workout_id: &str, user_exercise_id: &str) -> Result<UserWorkout> {
        let mut user_workout = self.load_user_workout(user_workout_id)?;
        customization::remove_exercise(&mut user_workout, user_exercise_id, self.now())?;
        self.store.user_workouts().update(&user_workout)?;
        Ok(user_workout)
    }

    pub fn modify_user_exercise(
        &self,
        user_workout_id: &str,
        user_exercise_id: &str,
        change: ExerciseChange,
    ) -> Result<UserWorkout> {
        let mut user_workout = self.load_user_workout(user_workout_id)?;
        customization::modify_exercise(&mut user_workout, user_exercise_id, change, self.now())?;
        self.store.user_workouts().update(&user_workout)?;
        Ok(user_workout)
    }

    /// Rename or re-describe a personal workout; exercises change only
    /// through the add/remove/modify operations
    pub fn update_user_workout(
        &self,
        user_workout_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<UserWorkout> {
        let mut user_workout = self.load_user_workout(user_workout_id)?;
        user_workout.name = name.to_string();
        user_workout.description = description.map(str::to_string);
        user_workout.updated_at = self.now();
        self.store.user_workouts().update(&user_workout)?;
        Ok(user_workout)
    }

    pub fn delete_user_workout(&self, id: &str) -> Result<bool> {
        self.store.user_workouts().delete(id)
    }

    pub fn get_user_workout(&self, id: &str) -> Result<Option<UserWorkout>> {
        self.store.user_workouts().get(id)
    }

    pub fn list_user_workouts(&self, filter: &UserWorkoutFilter) -> Result<Vec<UserWorkout>> {
        self.store.user_workouts().list(filter)
    }

    /// The exercises a personal workout currently resolves to
    pub fn effective_exercises(&self, user_workout_id: &str) -> Result<Vec<UserExercise>> {
        let user_workout = self.load_user_workout(user_workout_id)?;
        Ok(customization::effective_exercises(&user_workout))
    }

    // ------------------------------------------------------------------
    // Read views
    // ------------------------------------------------------------------

    pub fn stats(&self, query: &StatsQuery) -> Result<WorkoutStats> {
        stats::aggregate_query(self.store.conn(), query)
    }

    /// Progress snapshot for an owner: the cached one when it is still
    /// valid, otherwise a recomputation that replaces the cache.
    pub fn progress(&self, owner_id: &str) -> Result<ProgressSnapshot> {
        if let Some(snapshot) = self.store.progress_cache().load(owner_id)? {
            if snapshot.is_compatible(&self.curve) {
                return Ok(snapshot);
            }
            tracing::debug!(owner_id, "cached progress uses another level curve");
        }

        let snapshot = self.recompute_progress(owner_id)?;
        self.store
            .progress_cache()
            .store(owner_id, &snapshot, self.now())?;
        Ok(snapshot)
    }

    fn recompute_progress(&self, owner_id: &str) -> Result<ProgressSnapshot> {
        let history = self
            .store
            .workouts()
            .list(&WorkoutFilter::for_owner(owner_id).with_status(WorkoutStatus::Completed))?;
        tracing::debug!(owner_id, workouts = history.len(), "recomputed progress");
        Ok(ProgressSnapshot::recompute(&history, self.curve))
    }

    pub fn body_area_progress(&self, owner_id: &str) -> Result<BTreeMap<String, BodyAreaProgress>> {
        Ok(self.progress(owner_id)?.body_areas)
    }

    /// Heat of each trained body area as of today
    pub fn heat_map(&self, owner_id: &str) -> Result<BTreeMap<String, f64>> {
        let snapshot = self.progress(owner_id)?;
        Ok(snapshot.heat_map(self.clock.today(), self.config.progression.heat_decay_days))
    }

    pub fn streak(&self, owner_id: &str) -> Result<StreakData> {
        Ok(self.progress(owner_id)?.streak)
    }

    pub fn achievements(&self, owner_id: &str) -> Result<Vec<Achievement>> {
        Ok(self.progress(owner_id)?.achievements)
    }

    pub fn milestones(&self, owner_id: &str) -> Result<Vec<Milestone>> {
        Ok(self.progress(owner_id)?.milestones)
    }

    pub fn personal_records(&self, owner_id: &str, include_history: bool) -> Result<Vec<PersonalRecord>> {
        self.store.records().list(&RecordFilter {
            include_history,
            ..RecordFilter::for_owner(owner_id)
        })
    }

    pub fn exercise_records(&self, owner_id: &str, exercise_id: &str) -> Result<Vec<PersonalRecord>> {
        self.store.records().current_for_exercise(owner_id, exercise_id)
    }

    pub fn todays_recommendation(&self, owner_id: &str) -> Result<Option<TodaysRecommendation>> {
        let available = self.list_templates(&TemplateFilter::visible_to(owner_id))?;
        let system = self.list_templates(&TemplateFilter::system())?;
        Ok(recommendation::recommend_today(
            self.clock.today().weekday(),
            &available,
            &system,
        ))
    }

    /// Up to `count` templates across categories; the configured count when `None`
    pub fn diverse_recommendations(&self, owner_id: &str, count: Option<usize>) -> Result<Vec<WorkoutTemplate>> {
        let available = self.list_templates(&TemplateFilter::visible_to(owner_id))?;
        let count = count.unwrap_or(self.config.recommendation.diverse_count);
        Ok(recommendation::recommend_diverse(&available, count))
    }

    /// Write the owner's completed set history to a CSV file
    pub fn export_sets(&self, owner_id: &str, path: &Path) -> Result<usize> {
        let workouts = self
            .store
            .workouts()
            .list(&WorkoutFilter::for_owner(owner_id).with_status(WorkoutStatus::Completed))?;
        export::export_to_path(&workouts, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::clock::FixedClock;
    use crate::config::RecordHistory;
    use crate::recommendation::RecommendationReason;
    use crate::types::{TemplateCategory, TemplateExercise};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    const USER: &str = "u1";

    /// Monday 2024-05-06 08:00 UTC
    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap()
    }

    fn ledger_with(config: Config) -> (Ledger, Arc<FixedClock>) {
        crate::logging::init_test();
        let clock = Arc::new(FixedClock::new(start_time()));
        let ledger = Ledger::with_parts(
            Store::open_in_memory().unwrap(),
            config,
            Box::new(Arc::clone(&clock)),
            Box::new(default_catalog().clone()),
            None,
        )
        .unwrap();
        (ledger, clock)
    }

    fn ledger() -> (Ledger, Arc<FixedClock>) {
        ledger_with(Config::default())
    }

    /// Bench press session with 60×10 and 65×8, completed
    fn bench_session(ledger: &Ledger, clock: &FixedClock) -> (CompletedWorkout, Vec<LoggedSet>) {
        let plan = WorkoutPlan::new("Push day").exercise("bench_press", 0, 0.0, 0);
        let workout = ledger.plan_workout(USER, &plan).unwrap();
        ledger.start_workout(&workout.id).unwrap();
        let exercise_id = workout.exercises[0].id.clone();

        clock.advance(Duration::minutes(5));
        let first = ledger.log_set(&workout.id, &exercise_id, 60.0, 10, true).unwrap();
        clock.advance(Duration::minutes(3));
        let second = ledger.log_set(&workout.id, &exercise_id, 65.0, 8, true).unwrap();
        clock.advance(Duration::minutes(30));
        let completed = ledger.complete_workout(&workout.id).unwrap();
        (completed, vec![first, second])
    }

    fn kinds(records: &[PersonalRecord]) -> Vec<RecordKind> {
        records.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn test_end_to_end_volume_records_and_experience() {
        let (ledger, clock) = ledger();
        let (completed, logged) = bench_session(&ledger, &clock);

        assert_eq!(completed.workout.total_volume(), 1120.0);
        assert_eq!(completed.outcome.volume, 1120.0);
        assert_eq!(logged[0].records.len(), 3);
        assert_eq!(kinds(&logged[1].records), vec![RecordKind::MaxWeight]);

        let records = ledger.exercise_records(USER, "bench_press").unwrap();
        let value = |kind: RecordKind| records.iter().find(|r| r.kind == kind).unwrap().value;
        assert_eq!(value(RecordKind::MaxWeight), 65.0);
        assert_eq!(value(RecordKind::MaxVolume), 600.0);
        assert_eq!(value(RecordKind::MaxReps), 10.0);

        // Bench press targets chest and triceps: 560 each
        let areas = ledger.body_area_progress(USER).unwrap();
        assert_eq!(areas["chest"].experience, 560.0);
        assert_eq!(areas["triceps"].experience, 560.0);
        assert_eq!(areas["chest"].level, 1);

        let stats = ledger.stats(&StatsQuery::all_time(USER)).unwrap();
        assert_eq!(stats.total_volume, 1120.0);
        assert_eq!(stats.completed_sets, 2);
        assert_eq!(stats.completion_rate, 1.0);
        assert_eq!(stats.average_duration_seconds, Some(38.0 * 60.0));

        let achievements = ledger.achievements(USER).unwrap();
        assert_eq!(achievements[0].id, "first_workout");
        assert_eq!(ledger.streak(USER).unwrap().current, 1);
        assert_eq!(ledger.heat_map(USER).unwrap()["chest"], 1.0);
    }

    #[test]
    fn test_terminal_workouts_reject_logging() {
        let (ledger, clock) = ledger();
        let (completed, logged) = bench_session(&ledger, &clock);
        let workout = &completed.workout;
        let exercise_id = &workout.exercises[0].id;

        assert!(matches!(
            ledger.log_set(&workout.id, exercise_id, 70.0, 5, true),
            Err(Error::Consistency(_))
        ));
        assert!(matches!(
            ledger.update_set(&workout.id, &logged[0].set.id, 70.0, 5),
            Err(Error::Consistency(_))
        ));
        assert!(matches!(ledger.cancel_workout(&workout.id), Err(Error::Consistency(_))));
        assert!(matches!(
            ledger.log_set("missing", exercise_id, 70.0, 5, true),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_exercise_and_bad_weight_rejected_before_write() {
        let (ledger, _) = ledger();
        let plan = WorkoutPlan::new("Mystery").exercise("levitation", 3, 10.0, 5);
        assert!(matches!(ledger.plan_workout(USER, &plan), Err(Error::Validation(_))));

        let plan = WorkoutPlan::new("Bad").exercise("bench_press", 1, -5.0, 5);
        assert!(matches!(ledger.plan_workout(USER, &plan), Err(Error::Validation(_))));
        assert!(ledger.list_workouts(&WorkoutFilter::for_owner(USER)).unwrap().is_empty());
    }

    #[test]
    fn test_delimited_body_area_rejected() {
        let (ledger, _) = ledger();
        let plan = WorkoutPlan::new("Back")
            .exercise("bench_press", 1, 20.0, 5)
            .with_body_areas(&["upper,back"]);
        assert!(matches!(ledger.plan_workout(USER, &plan), Err(Error::Validation(_))));
        assert!(ledger.list_workouts(&WorkoutFilter::for_owner(USER)).unwrap().is_empty());

        let plan = WorkoutPlan::new("Back")
            .exercise("bench_press", 1, 20.0, 5)
            .with_body_areas(&["Upper Back"]);
        let planned = ledger.plan_workout(USER, &plan).unwrap();
        let stored = ledger.get_workout(&planned.id).unwrap().unwrap();
        assert_eq!(stored.body_areas, vec!["upper back".to_string()]);
    }

    #[test]
    fn test_complete_planned_set_detects_records_once() {
        let (ledger, _) = ledger();
        let plan = WorkoutPlan::new("Squats").exercise("back_squat", 2, 100.0, 5);
        let workout = ledger.plan_workout(USER, &plan).unwrap();
        ledger.start_workout(&workout.id).unwrap();
        let set_id = workout.exercises[0].sets[0].id.clone();

        let done = ledger.complete_set(&workout.id, &set_id).unwrap();
        assert!(done.set.completed);
        assert_eq!(done.records.len(), 3);

        let again = ledger.complete_set(&workout.id, &set_id).unwrap();
        assert!(again.records.is_empty());
        assert_eq!(ledger.personal_records(USER, true).unwrap().len(), 3);
    }

    #[test]
    fn test_update_set_rebuilds_records() {
        let (ledger, _) = ledger();
        let plan = WorkoutPlan::new("Rows").exercise("barbell_row", 0, 0.0, 0);
        let workout = ledger.plan_workout(USER, &plan).unwrap();
        ledger.start_workout(&workout.id).unwrap();
        let exercise_id = workout.exercises[0].id.clone();

        let typo = ledger.log_set(&workout.id, &exercise_id, 800.0, 8, true).unwrap();
        let fixed = ledger.update_set(&workout.id, &typo.set.id, 80.0, 8).unwrap();
        assert_eq!(fixed.records.len(), 3);

        let weight = ledger
            .store()
            .records()
            .current(USER, "barbell_row", RecordKind::MaxWeight)
            .unwrap()
            .unwrap();
        assert_eq!(weight.value, 80.0);
    }

    #[test]
    fn test_corrective_update_rebuilds_records_and_progress() {
        let (ledger, clock) = ledger();
        let (completed, _) = bench_session(&ledger, &clock);
        assert_eq!(ledger.progress(USER).unwrap().total_volume, 1120.0);

        let mut corrected = completed.workout.clone();
        corrected.exercises[0].sets[1].weight = 50.0;
        ledger.correct_workout(&corrected).unwrap();

        let weight = ledger
            .store()
            .records()
            .current(USER, "bench_press", RecordKind::MaxWeight)
            .unwrap()
            .unwrap();
        assert_eq!(weight.value, 60.0);
        assert_eq!(ledger.progress(USER).unwrap().total_volume, 600.0 + 400.0);

        let mut reopened = corrected.clone();
        reopened.status = WorkoutStatus::InProgress;
        reopened.completed_at = None;
        assert!(matches!(ledger.correct_workout(&reopened), Err(Error::Consistency(_))));
    }

    #[test]
    fn test_delete_workout_drops_its_records() {
        let (ledger, clock) = ledger();
        let (completed, _) = bench_session(&ledger, &clock);

        assert!(ledger.delete_workout(&completed.workout.id).unwrap());
        assert!(!ledger.delete_workout(&completed.workout.id).unwrap());
        assert!(ledger.exercise_records(USER, "bench_press").unwrap().is_empty());
        assert_eq!(ledger.progress(USER).unwrap().completed_workouts, 0);
    }

    #[test]
    fn test_cached_progress_equals_recompute() {
        let (ledger, clock) = ledger();
        bench_session(&ledger, &clock);
        clock.advance(Duration::days(1));
        bench_session(&ledger, &clock);

        let cached = ledger.progress(USER).unwrap();
        let history = ledger
            .list_workouts(&WorkoutFilter::for_owner(USER).with_status(WorkoutStatus::Completed))
            .unwrap();
        let recomputed = ProgressSnapshot::recompute(&history, LevelCurve::default());
        assert_eq!(cached, recomputed);
        assert_eq!(cached.streak.current, 2);
    }

    #[test]
    fn test_completion_behind_fold_mark_refolds() {
        let (ledger, clock) = ledger();
        let plan = WorkoutPlan::new("Rows").exercise("barbell_row", 0, 0.0, 0);
        let early = ledger.plan_workout(USER, &plan).unwrap();
        let late = ledger.plan_workout(USER, &plan).unwrap();
        for workout in [&early, &late] {
            ledger.start_workout(&workout.id).unwrap();
            ledger
                .log_set(&workout.id, &workout.exercises[0].id, 50.0, 10, true)
                .unwrap();
        }

        clock.set(start_time() + Duration::hours(2));
        ledger.complete_workout(&late.id).unwrap();
        clock.set(start_time() + Duration::hours(1));
        let completed = ledger.complete_workout(&early.id).unwrap();
        assert_eq!(completed.outcome.volume, 500.0);

        let cached = ledger.progress(USER).unwrap();
        let history = ledger
            .list_workouts(&WorkoutFilter::for_owner(USER).with_status(WorkoutStatus::Completed))
            .unwrap();
        assert_eq!(cached, ProgressSnapshot::recompute(&history, LevelCurve::default()));
        assert_eq!(cached.completed_workouts, 2);
        assert_eq!(cached.total_volume, 1000.0);
    }

    #[test]
    fn test_template_preserved_through_customization() {
        let (ledger, _) = ledger();
        let push = ledger
            .list_templates(&TemplateFilter::system().with_category(TemplateCategory::Push))
            .unwrap()
            .remove(0);

        let mut mine = ledger
            .create_user_workout_from_template(USER, &push.id, Some("My Push"))
            .unwrap();
        let dropped = mine.exercises[3].id.clone();
        mine = ledger.remove_user_exercise(&mine.id, &dropped).unwrap();
        let first = mine.exercises[0].id.clone();
        ledger
            .modify_user_exercise(&mine.id, &first, ExerciseChange::Sets(5))
            .unwrap();
        ledger
            .add_user_exercise(&mine.id, &NewUserExercise::new("triceps_pushdown", 3, 10, 15))
            .unwrap();

        let after = ledger.get_template(&push.id).unwrap().unwrap();
        assert_eq!(after.exercises, push.exercises);
        assert_eq!(after.name, push.name);
        assert_eq!(after.usage_count, push.usage_count + 1);

        let workout = ledger.start_from_user_workout(&mine.id).unwrap();
        let ids: Vec<_> = workout.exercises.iter().map(|e| e.exercise_id.as_str()).collect();
        assert_eq!(ids, vec!["bench_press", "overhead_press", "push_up", "triceps_pushdown"]);
        assert_eq!(workout.exercises[0].sets.len(), 5);
        assert_eq!(workout.status, WorkoutStatus::InProgress);
        assert_eq!(workout.source_user_workout_id.as_deref(), Some(mine.id.as_str()));
    }

    #[test]
    fn test_customization_history_survives_updates() {
        let (ledger, _) = ledger();
        let push = ledger
            .list_templates(&TemplateFilter::system().with_category(TemplateCategory::Push))
            .unwrap()
            .remove(0);
        let mine = ledger
            .create_user_workout_from_template(USER, &push.id, None)
            .unwrap();
        assert_eq!(ledger.effective_exercises(&mine.id).unwrap().len(), 4);

        let dropped = mine.exercises[1].id.clone();
        ledger.remove_user_exercise(&mine.id, &dropped).unwrap();

        let renamed = ledger
            .update_user_workout(&mine.id, "Push, lighter", Some("no overhead work"))
            .unwrap();
        assert_eq!(renamed.customizations.events.len(), 1);

        let stored = ledger.get_user_workout(&mine.id).unwrap().unwrap();
        assert_eq!(stored.name, "Push, lighter");
        assert_eq!(stored.description.as_deref(), Some("no overhead work"));
        assert_eq!(stored.customizations.events.len(), 1);
        let effective = ledger.effective_exercises(&mine.id).unwrap();
        assert_eq!(effective.len(), 3);
        assert!(effective.iter().all(|e| e.id != dropped));

        // Writing a stale copy straight to the store cannot erase the removal
        let mut stale = stored.clone();
        stale.customizations.events.clear();
        assert!(matches!(
            ledger.store().user_workouts().update(&stale),
            Err(Error::Consistency(_))
        ));
        assert_eq!(ledger.effective_exercises(&mine.id).unwrap().len(), 3);
    }

    #[test]
    fn test_system_templates_are_read_only() {
        let (ledger, _) = ledger();
        let system = ledger.list_templates(&TemplateFilter::system()).unwrap();
        let mut edited = system[0].clone();
        edited.name = "Mine now".into();

        assert!(matches!(ledger.update_template(&edited), Err(Error::Consistency(_))));
        assert!(matches!(
            ledger.delete_template(USER, &system[0].id),
            Err(Error::Consistency(_))
        ));
        assert!(matches!(ledger.create_template(&edited), Err(Error::Consistency(_))));

        ledger.set_template_favorite(USER, &system[0].id, true).unwrap();
        assert!(ledger.get_template(&system[0].id).unwrap().unwrap().is_favorite);
    }

    #[test]
    fn test_private_templates_are_hidden_from_other_owners() {
        let (ledger, _) = ledger();
        let legs = ledger
            .list_templates(&TemplateFilter::system().with_category(TemplateCategory::Legs))
            .unwrap()
            .remove(0);
        let mut private = WorkoutTemplate::new(
            USER,
            "My legs",
            TemplateCategory::Legs,
            legs.difficulty,
            start_time(),
        );
        private.exercises = legs
            .exercises
            .iter()
            .map(|e| TemplateExercise { id: new_id(), ..e.clone() })
            .collect();
        let id = ledger.create_template(&private).unwrap();

        let stranger = "someone-else";
        assert!(matches!(
            ledger.set_template_favorite(stranger, &id, true),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(ledger.use_template(stranger, &id), Err(Error::NotFound(_))));
        assert!(!ledger.delete_template(stranger, &id).unwrap());

        let stored = ledger.get_template(&id).unwrap().unwrap();
        assert!(!stored.is_favorite);
        assert_eq!(stored.usage_count, 0);

        ledger.use_template(USER, &id).unwrap();
        assert_eq!(ledger.get_template(&id).unwrap().unwrap().usage_count, 1);
        assert!(ledger.delete_template(USER, &id).unwrap());
        assert!(ledger.get_template(&id).unwrap().is_none());
    }

    #[test]
    fn test_start_from_template_counts_usage() {
        let (ledger, _) = ledger();
        let legs = ledger
            .list_templates(&TemplateFilter::system().with_category(TemplateCategory::Legs))
            .unwrap()
            .remove(0);

        let workout = ledger.start_from_template(USER, &legs.id).unwrap();
        assert_eq!(workout.exercises.len(), legs.exercises.len());
        assert_eq!(workout.source_template_id.as_deref(), Some(legs.id.as_str()));
        assert_eq!(ledger.get_template(&legs.id).unwrap().unwrap().usage_count, 1);

        let mut private = WorkoutTemplate::new(
            "someone-else",
            "Secret",
            TemplateCategory::Custom,
            legs.difficulty,
            start_time(),
        );
        private.exercises = legs
            .exercises
            .iter()
            .map(|e| TemplateExercise {
                id: new_id(),
                ..e.clone()
            })
            .collect();
        ledger.create_template(&private).unwrap();
        assert!(matches!(
            ledger.start_from_template(USER, &private.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_monday_recommends_push() {
        let (ledger, _) = ledger();
        let pick = ledger.todays_recommendation(USER).unwrap().unwrap();
        assert_eq!(pick.template.category, TemplateCategory::Push);
        assert_eq!(
            pick.reason,
            RecommendationReason::Preferred {
                category: TemplateCategory::Push
            }
        );

        let diverse = ledger.diverse_recommendations(USER, None).unwrap();
        assert_eq!(diverse.len(), ledger.config().recommendation.diverse_count);
        let categories: BTreeSet<_> = diverse.iter().map(|t| t.category).collect();
        assert_eq!(categories.len(), diverse.len());
    }

    #[test]
    fn test_retain_policy_keeps_superseded_records() {
        let mut config = Config::default();
        config.records.history = RecordHistory::Retain;
        let (ledger, clock) = ledger_with(config);
        bench_session(&ledger, &clock);

        let all = ledger.personal_records(USER, true).unwrap();
        // weight 60 then 65; volume 600; reps 10
        assert_eq!(all.len(), 4);
        assert_eq!(ledger.personal_records(USER, false).unwrap().len(), 3);
    }

    #[test]
    fn test_no_seeding_when_disabled() {
        let mut config = Config::default();
        config.seeding.seed_system_templates = false;
        let (ledger, _) = ledger_with(config);
        assert!(ledger.list_templates(&TemplateFilter::system()).unwrap().is_empty());
        assert!(ledger.todays_recommendation(USER).unwrap().is_none());
    }

    #[test]
    fn test_export_writes_completed_sets() {
        let (ledger, clock) = ledger();
        bench_session(&ledger, &clock);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sets.csv");
        assert_eq!(ledger.export_sets(USER, &path).unwrap(), 2);
    }

    #[test]
    fn test_open_takes_writer_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data.data_dir = dir.path().to_path_buf();

        let first = Ledger::open(config.clone()).unwrap();
        assert!(matches!(Ledger::open(config.clone()), Err(Error::Locked(_))));
        drop(first);

        let reopened = Ledger::open(config).unwrap();
        assert!(!reopened.list_templates(&TemplateFilter::system()).unwrap().is_empty());
    }

    #[test]
    fn test_custom_catalog_is_used() {
        let catalog = StaticCatalog::new(vec![ExerciseInfo {
            id: "sled_push".into(),
            name: "Sled Push".into(),
            body_areas: vec!["quadriceps".into()],
            equipment: vec!["sled".into()],
            rank: 1,
        }]);
        let mut config = Config::default();
        config.seeding.seed_system_templates = false;
        let ledger = Ledger::with_parts(
            Store::open_in_memory().unwrap(),
            config,
            Box::new(FixedClock::new(start_time())),
            Box::new(catalog),
            None,
        )
        .unwrap();

        let plan = WorkoutPlan::new("Sled").exercise("sled_push", 1, 40.0, 20);
        assert!(ledger.plan_workout(USER, &plan).is_ok());
        let plan = WorkoutPlan::new("Bench").exercise("bench_press", 1, 40.0, 20);
        assert!(matches!(ledger.plan_workout(USER, &plan), Err(Error::Validation(_))));
    }
}
