//! Core domain types for the ironlog training ledger.
//!
//! This module defines the value records used throughout the system:
//! - Workouts, their exercises and sets
//! - Read-only templates and their exercises
//! - Personal (user) workouts derived from templates, with their customization trail
//! - Personal records
//! - Progress aggregates (body-area levels, streaks, achievements, milestones)
//!
//! Records carry derived read-only properties and copy-with-update constructors.
//! Persistence lives in [`crate::store`], progression maths in [`crate::progression`].

use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Owner identifier reserved for seeded templates
pub const SYSTEM_OWNER: &str = "system";

/// Fresh random identifier for any stored record
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Canonical spelling of a body area name (trimmed, lowercase)
pub fn normalize_body_area(area: &str) -> String {
    area.trim().to_lowercase()
}

/// Normalize a list of body areas, dropping blanks and duplicates but keeping order
pub fn normalize_body_areas<S: AsRef<str>>(areas: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    areas
        .iter()
        .map(|a| normalize_body_area(a.as_ref()))
        .filter(|a| !a.is_empty() && seen.insert(a.clone()))
        .collect()
}

/// Body areas are persisted in one comma-delimited column; a name must come
/// back from the store unchanged, so it is non-empty, trimmed and comma-free.
pub(crate) fn check_body_areas(errors: &mut Vec<String>, context: &str, areas: &[String]) {
    for area in areas {
        if area.trim().is_empty() {
            errors.push(format!("{}: blank body area", context));
        } else if area.contains(',') {
            errors.push(format!("{}: body area '{}' must not contain a comma", context, area));
        } else if area.trim() != area {
            errors.push(format!("{}: body area '{}' has surrounding whitespace", context, area));
        }
    }
}

fn check_weight(errors: &mut Vec<String>, context: &str, weight: f64) {
    if !weight.is_finite() || weight < 0.0 {
        errors.push(format!("{}: weight must be a non-negative number, got {}", context, weight));
    }
}

// ============================================================================
// Workout Types
// ============================================================================

/// Lifecycle state of a workout session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutStatus::Planned => "planned",
            WorkoutStatus::InProgress => "in_progress",
            WorkoutStatus::Completed => "completed",
            WorkoutStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled workouts accept only corrective edits
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkoutStatus::Completed | WorkoutStatus::Cancelled)
    }

    /// Transitions are monotonic: planned → in progress → completed,
    /// or → cancelled from either non-terminal state.
    pub fn can_transition_to(&self, next: WorkoutStatus) -> bool {
        matches!(
            (self, next),
            (WorkoutStatus::Planned, WorkoutStatus::InProgress)
                | (WorkoutStatus::InProgress, WorkoutStatus::Completed)
                | (WorkoutStatus::Planned, WorkoutStatus::Cancelled)
                | (WorkoutStatus::InProgress, WorkoutStatus::Cancelled)
        )
    }
}

impl fmt::Display for WorkoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkoutStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "planned" => Ok(WorkoutStatus::Planned),
            "in_progress" => Ok(WorkoutStatus::InProgress),
            "completed" => Ok(WorkoutStatus::Completed),
            "cancelled" | "canceled" => Ok(WorkoutStatus::Cancelled),
            other => Err(Error::Validation(format!("unknown workout status '{}'", other))),
        }
    }
}

/// One set of an exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSet {
    pub id: String,
    /// 1-based, unique within the exercise
    pub set_number: u32,
    pub weight: f64,
    pub reps: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub rest_seconds: Option<u32>,
}

impl WorkoutSet {
    pub fn new(set_number: u32, weight: f64, reps: u32) -> Self {
        Self {
            id: new_id(),
            set_number,
            weight,
            reps,
            completed: false,
            completed_at: None,
            rest_seconds: None,
        }
    }

    /// weight × reps, regardless of completion
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }

    /// Volume that counts toward totals: zero unless the set is completed
    pub fn completed_volume(&self) -> f64 {
        if self.completed {
            self.volume()
        } else {
            0.0
        }
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed = true;
        self.completed_at = Some(at);
        self
    }

    pub fn with_rest(mut self, seconds: u32) -> Self {
        self.rest_seconds = Some(seconds);
        self
    }
}

/// An exercise performed inside a workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutExercise {
    pub id: String,
    pub exercise_id: String,
    pub exercise_name: String,
    pub body_areas: Vec<String>,
    /// Unique within the workout; defines presentation and processing order
    pub position: u32,
    pub sets: Vec<WorkoutSet>,
    pub notes: Option<String>,
}

impl WorkoutExercise {
    pub fn new(
        exercise_id: impl Into<String>,
        exercise_name: impl Into<String>,
        body_areas: &[impl AsRef<str>],
        position: u32,
    ) -> Self {
        Self {
            id: new_id(),
            exercise_id: exercise_id.into(),
            exercise_name: exercise_name.into(),
            body_areas: normalize_body_areas(body_areas),
            position,
            sets: Vec::new(),
            notes: None,
        }
    }

    pub fn with_sets(mut self, sets: Vec<WorkoutSet>) -> Self {
        self.sets = sets;
        self
    }

    pub fn total_volume(&self) -> f64 {
        self.sets.iter().map(WorkoutSet::completed_volume).sum()
    }

    pub fn completed_sets(&self) -> usize {
        self.sets.iter().filter(|s| s.completed).count()
    }

    /// Set number the next appended set should receive
    pub fn next_set_number(&self) -> u32 {
        self.sets.iter().map(|s| s.set_number).max().unwrap_or(0) + 1
    }

    pub fn set(&self, set_number: u32) -> Option<&WorkoutSet> {
        self.sets.iter().find(|s| s.set_number == set_number)
    }

    fn validate_into(&self, errors: &mut Vec<String>) {
        if self.exercise_id.trim().is_empty() {
            errors.push(format!("exercise at position {} has empty exercise id", self.position));
        }
        check_body_areas(errors, &format!("exercise '{}'", self.exercise_name), &self.body_areas);
        let mut numbers = HashSet::new();
        for set in &self.sets {
            let context = format!("{} set {}", self.exercise_name, set.set_number);
            if set.set_number == 0 {
                errors.push(format!("{}: set numbers are 1-based", context));
            }
            if !numbers.insert(set.set_number) {
                errors.push(format!("{}: duplicate set number", context));
            }
            check_weight(errors, &context, set.weight);
            if set.completed_at.is_some() && !set.completed {
                errors.push(format!("{}: completion time on an incomplete set", context));
            }
        }
    }
}

/// A planned or performed training session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Workout {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub body_areas: Vec<String>,
    pub planned_duration_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: WorkoutStatus,
    pub notes: Option<String>,
    pub source_template_id: Option<String>,
    pub source_user_workout_id: Option<String>,
    pub exercises: Vec<WorkoutExercise>,
}

impl Workout {
    /// A new planned workout with no exercises
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            owner_id: owner_id.into(),
            name: name.into(),
            body_areas: Vec::new(),
            planned_duration_minutes: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            status: WorkoutStatus::Planned,
            notes: None,
            source_template_id: None,
            source_user_workout_id: None,
            exercises: Vec::new(),
        }
    }

    pub fn with_exercises(mut self, exercises: Vec<WorkoutExercise>) -> Self {
        self.exercises = exercises;
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

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    fn transition(mut self, next: WorkoutStatus) -> Result<Self> {
        if !self.status.can_transition_to(next) {
            return Err(Error::Consistency(format!(
                "workout {} cannot go from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(self)
    }

    /// planned → in progress
    pub fn start(self, at: DateTime<Utc>) -> Result<Self> {
        let mut workout = self.transition(WorkoutStatus::InProgress)?;
        workout.started_at = Some(at);
        Ok(workout)
    }

    /// in progress → completed; the only place `completed_at` is set
    pub fn complete(self, at: DateTime<Utc>) -> Result<Self> {
        let mut workout = self.transition(WorkoutStatus::Completed)?;
        workout.completed_at = Some(at);
        Ok(workout)
    }

    /// planned / in progress → cancelled
    pub fn cancel(self) -> Result<Self> {
        self.transition(WorkoutStatus::Cancelled)
    }

    pub fn exercise(&self, workout_exercise_id: &str) -> Option<&WorkoutExercise> {
        self.exercises.iter().find(|e| e.id == workout_exercise_id)
    }

    pub fn exercise_mut(&mut self, workout_exercise_id: &str) -> Option<&mut WorkoutExercise> {
        self.exercises.iter_mut().find(|e| e.id == workout_exercise_id)
    }

    /// Exercises sorted by position
    pub fn ordered_exercises(&self) -> Vec<&WorkoutExercise> {
        let mut exercises: Vec<_> = self.exercises.iter().collect();
        exercises.sort_by_key(|e| e.position);
        exercises
    }

    /// Σ weight × reps over completed sets
    pub fn total_volume(&self) -> f64 {
        self.exercises.iter().map(WorkoutExercise::total_volume).sum()
    }

    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    pub fn completed_sets(&self) -> usize {
        self.exercises.iter().map(WorkoutExercise::completed_sets).sum()
    }

    /// The day the session counts for: completion, else start, else creation
    pub fn session_time(&self) -> DateTime<Utc> {
        self.completed_at
            .or(self.started_at)
            .unwrap_or(self.created_at)
    }

    pub fn session_date(&self) -> NaiveDate {
        self.session_time().date_naive()
    }

    /// Actual duration when both start and completion are known
    pub fn actual_duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Duration in seconds used for averages: actual, else planned
    pub fn effective_duration_seconds(&self) -> Option<f64> {
        self.actual_duration()
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
            .or_else(|| self.planned_duration_minutes.map(|m| f64::from(m) * 60.0))
    }

    /// Body areas an exercise's volume is attributed to
    pub fn attributed_areas<'a>(&'a self, exercise: &'a WorkoutExercise) -> &'a [String] {
        if exercise.body_areas.is_empty() {
            &self.body_areas
        } else {
            &exercise.body_areas
        }
    }

    /// Check the aggregate before it is written; empty means valid
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push("workout has empty id".to_string());
        }
        if self.owner_id.trim().is_empty() {
            errors.push("workout has empty owner id".to_string());
        }
        if self.name.trim().is_empty() {
            errors.push("workout name must not be empty".to_string());
        }
        check_body_areas(&mut errors, "workout", &self.body_areas);
        if self.completed_at.is_some() && self.status != WorkoutStatus::Completed {
            errors.push(format!(
                "completion time set on a workout that is {}",
                self.status
            ));
        }
        if self.status == WorkoutStatus::Completed && self.completed_at.is_none() {
            errors.push("completed workout has no completion time".to_string());
        }

        let mut positions = HashSet::new();
        let mut ids = HashSet::new();
        for exercise in &self.exercises {
            if !positions.insert(exercise.position) {
                errors.push(format!("duplicate exercise position {}", exercise.position));
            }
            if !ids.insert(exercise.id.as_str()) {
                errors.push(format!("duplicate workout exercise id {}", exercise.id));
            }
            exercise.validate_into(&mut errors);
        }

        errors
    }
}

/// Lightweight list-view projection of a workout, computed by a join
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSummary {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub status: WorkoutStatus,
    pub session_time: DateTime<Utc>,
    pub exercise_count: u32,
    pub set_count: u32,
    pub completed_set_count: u32,
    pub total_volume: f64,
}

// ============================================================================
// Template Types
// ============================================================================

/// Template category
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Custom,
    Strength,
    Cardio,
    FullBody,
    UpperBody,
    LowerBody,
    Push,
    Pull,
    Legs,
}

impl TemplateCategory {
    pub const ALL: [TemplateCategory; 9] = [
        TemplateCategory::Custom,
        TemplateCategory::Strength,
        TemplateCategory::Cardio,
        TemplateCategory::FullBody,
        TemplateCategory::UpperBody,
        TemplateCategory::LowerBody,
        TemplateCategory::Push,
        TemplateCategory::Pull,
        TemplateCategory::Legs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::Custom => "custom",
            TemplateCategory::Strength => "strength",
            TemplateCategory::Cardio => "cardio",
            TemplateCategory::FullBody => "full_body",
            TemplateCategory::UpperBody => "upper_body",
            TemplateCategory::LowerBody => "lower_body",
            TemplateCategory::Push => "push",
            TemplateCategory::Pull => "pull",
            TemplateCategory::Legs => "legs",
        }
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        TemplateCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| Error::Validation(format!("unknown template category '{}'", s)))
    }
}

/// Difficulty tier of a template
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(Error::Validation(format!("unknown difficulty '{}'", other))),
        }
    }
}

/// Suggested prescription for one exercise of a template
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TemplateExercise {
    pub id: String,
    pub exercise_id: String,
    pub exercise_name: String,
    pub body_areas: Vec<String>,
    pub position: u32,
    pub suggested_sets: u32,
    pub rep_min: u32,
    pub rep_max: u32,
    pub suggested_weight: Option<f64>,
    pub rest_seconds: u32,
    pub notes: Option<String>,
}

/// A reusable, read-only workout blueprint
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutTemplate {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: TemplateCategory,
    pub difficulty: Difficulty,
    pub body_areas: Vec<String>,
    pub estimated_duration_minutes: u32,
    pub is_favorite: bool,
    pub usage_count: u32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub exercises: Vec<TemplateExercise>,
}

impl WorkoutTemplate {
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        category: TemplateCategory,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            owner_id: owner_id.into(),
            name: name.into(),
            description: None,
            category,
            difficulty,
            body_areas: Vec::new(),
            estimated_duration_minutes: 0,
            is_favorite: false,
            usage_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
            exercises: Vec::new(),
        }
    }

    /// Seeded templates are immutable by user action
    pub fn is_system(&self) -> bool {
        self.owner_id == SYSTEM_OWNER
    }

    pub fn total_sets(&self) -> u32 {
        self.exercises.iter().map(|e| e.suggested_sets).sum()
    }

    pub fn ordered_exercises(&self) -> Vec<&TemplateExercise> {
        let mut exercises: Vec<_> = self.exercises.iter().collect();
        exercises.sort_by_key(|e| e.position);
        exercises
    }

    /// Copy with the usage counter bumped
    pub fn with_usage(mut self, at: DateTime<Utc>) -> Self {
        self.usage_count += 1;
        self.last_used_at = Some(at);
        self
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push("template has empty id".to_string());
        }
        if self.owner_id.trim().is_empty() {
            errors.push("template has empty owner id".to_string());
        }
        if self.name.trim().is_empty() {
            errors.push("template name must not be empty".to_string());
        }
        check_body_areas(&mut errors, "template", &self.body_areas);

        let mut positions = HashSet::new();
        for exercise in &self.exercises {
            let context = format!("template exercise '{}'", exercise.exercise_name);
            if !positions.insert(exercise.position) {
                errors.push(format!("duplicate template exercise position {}", exercise.position));
            }
            if exercise.exercise_id.trim().is_empty() {
                errors.push(format!("{}: empty exercise id", context));
            }
            check_body_areas(&mut errors, &context, &exercise.body_areas);
            if exercise.suggested_sets == 0 {
                errors.push(format!("{}: suggested sets must be at least 1", context));
            }
            if exercise.rep_min > exercise.rep_max {
                errors.push(format!(
                    "{}: rep range {}-{} is inverted",
                    context, exercise.rep_min, exercise.rep_max
                ));
            }
            if let Some(weight) = exercise.suggested_weight {
                check_weight(&mut errors, &context, weight);
            }
        }

        errors
    }
}

// ============================================================================
// User Workout Types
// ============================================================================

/// Where a personal workout came from
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutSource {
    Template,
    Custom,
    Imported,
}

impl WorkoutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutSource::Template => "template",
            WorkoutSource::Custom => "custom",
            WorkoutSource::Imported => "imported",
        }
    }
}

impl FromStr for WorkoutSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "template" => Ok(WorkoutSource::Template),
            "custom" => Ok(WorkoutSource::Custom),
            "imported" => Ok(WorkoutSource::Imported),
            other => Err(Error::Validation(format!("unknown workout source '{}'", other))),
        }
    }
}

/// Exercise entry of a personal workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserExercise {
    pub id: String,
    pub exercise_id: String,
    pub exercise_name: String,
    pub body_areas: Vec<String>,
    pub position: u32,
    pub sets: u32,
    pub rep_min: u32,
    pub rep_max: u32,
    pub weight: Option<f64>,
    pub rest_seconds: u32,
    pub notes: Option<String>,
    pub is_from_template: bool,
    pub template_exercise_id: Option<String>,
}

impl UserExercise {
    /// Clone of a template exercise, stamped with its origin
    pub fn from_template(exercise: &TemplateExercise) -> Self {
        Self {
            id: new_id(),
            exercise_id: exercise.exercise_id.clone(),
            exercise_name: exercise.exercise_name.clone(),
            body_areas: exercise.body_areas.clone(),
            position: exercise.position,
            sets: exercise.suggested_sets,
            rep_min: exercise.rep_min,
            rep_max: exercise.rep_max,
            weight: exercise.suggested_weight,
            rest_seconds: exercise.rest_seconds,
            notes: exercise.notes.clone(),
            is_from_template: true,
            template_exercise_id: Some(exercise.id.clone()),
        }
    }

    fn validate_into(&self, errors: &mut Vec<String>) {
        let context = format!("user exercise '{}'", self.exercise_name);
        if self.exercise_id.trim().is_empty() {
            errors.push(format!("{}: empty exercise id", context));
        }
        check_body_areas(errors, &context, &self.body_areas);
        if self.rep_min > self.rep_max {
            errors.push(format!(
                "{}: rep range {}-{} is inverted",
                context, self.rep_min, self.rep_max
            ));
        }
        if let Some(weight) = self.weight {
            check_weight(errors, &context, weight);
        }
    }
}

/// A single edit to one exercise of a personal workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ExerciseChange {
    Sets(u32),
    RepRange { min: u32, max: u32 },
    Weight(Option<f64>),
    Rest(u32),
    Notes(Option<String>),
}

impl ExerciseChange {
    /// Modification type; a newer change of the same type supersedes an older one
    pub fn field(&self) -> &'static str {
        match self {
            ExerciseChange::Sets(_) => "sets",
            ExerciseChange::RepRange { .. } => "rep_range",
            ExerciseChange::Weight(_) => "weight",
            ExerciseChange::Rest(_) => "rest",
            ExerciseChange::Notes(_) => "notes",
        }
    }
}

/// One entry of the customization audit trail
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomizationEvent {
    Removed {
        exercise_id: String,
        at: DateTime<Utc>,
    },
    Added {
        exercise: UserExercise,
        at: DateTime<Utc>,
    },
    Modified {
        exercise_id: String,
        change: ExerciseChange,
        at: DateTime<Utc>,
    },
}

impl CustomizationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            CustomizationEvent::Removed { .. } => "removed",
            CustomizationEvent::Added { .. } => "added",
            CustomizationEvent::Modified { .. } => "modified",
        }
    }

    /// The user-exercise id the event targets
    pub fn exercise_id(&self) -> &str {
        match self {
            CustomizationEvent::Removed { exercise_id, .. }
            | CustomizationEvent::Modified { exercise_id, .. } => exercise_id,
            CustomizationEvent::Added { exercise, .. } => &exercise.id,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            CustomizationEvent::Removed { at, .. }
            | CustomizationEvent::Added { at, .. }
            | CustomizationEvent::Modified { at, .. } => *at,
        }
    }
}

/// Ordered audit trail of customizations (see [`crate::customization`])
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct WorkoutCustomizations {
    pub events: Vec<CustomizationEvent>,
}

/// A personal, freely editable workout, optionally derived from a template
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserWorkout {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub source_template_id: Option<String>,
    pub source: WorkoutSource,
    /// Baseline exercise list as cloned or authored; edits live in `customizations`
    pub exercises: Vec<UserExercise>,
    pub customizations: WorkoutCustomizations,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserWorkout {
    /// An empty custom workout
    pub fn custom(owner_id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            owner_id: owner_id.into(),
            name: name.into(),
            description: None,
            source_template_id: None,
            source: WorkoutSource::Custom,
            exercises: Vec::new(),
            customizations: WorkoutCustomizations::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.owner_id.trim().is_empty() {
            errors.push("user workout has empty owner id".to_string());
        }
        if self.owner_id == SYSTEM_OWNER {
            errors.push("user workouts cannot be owned by the system".to_string());
        }
        if self.name.trim().is_empty() {
            errors.push("user workout name must not be empty".to_string());
        }
        if self.source == WorkoutSource::Template && self.source_template_id.is_none() {
            errors.push("template-derived workout has no source template".to_string());
        }

        let mut positions = HashSet::new();
        for exercise in &self.exercises {
            if !positions.insert(exercise.position) {
                errors.push(format!("duplicate user exercise position {}", exercise.position));
            }
            exercise.validate_into(&mut errors);
        }
        for event in &self.customizations.events {
            if let CustomizationEvent::Added { exercise, .. } = event {
                exercise.validate_into(&mut errors);
            }
        }

        errors
    }
}

// ============================================================================
// Personal Records
// ============================================================================

/// Kind of personal record
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Heaviest single-set weight
    MaxWeight,
    /// Best single-set weight × reps
    MaxVolume,
    /// Most reps at or below a paired weight
    MaxReps,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::MaxWeight, RecordKind::MaxVolume, RecordKind::MaxReps];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::MaxWeight => "max_weight",
            RecordKind::MaxVolume => "max_volume",
            RecordKind::MaxReps => "max_reps",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "max_weight" => Ok(RecordKind::MaxWeight),
            "max_volume" => Ok(RecordKind::MaxVolume),
            "max_reps" => Ok(RecordKind::MaxReps),
            other => Err(Error::Validation(format!("unknown record kind '{}'", other))),
        }
    }
}

/// Best observed value for an exercise and record kind
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PersonalRecord {
    pub id: String,
    pub owner_id: String,
    pub exercise_id: String,
    pub exercise_name: String,
    pub kind: RecordKind,
    pub value: f64,
    /// Paired weight for a reps record
    pub secondary_value: Option<f64>,
    pub achieved_at: DateTime<Utc>,
    pub workout_id: Option<String>,
    pub is_current: bool,
}

// ============================================================================
// Progress Aggregates
// ============================================================================

/// Experience and level of one body area
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BodyAreaProgress {
    pub body_area: String,
    pub total_volume: f64,
    pub level: u32,
    /// Experience accumulated inside the current level
    pub experience: f64,
    /// Requirement to leave the current level
    pub experience_to_next_level: f64,
    pub last_worked: Option<NaiveDate>,
}

/// Consecutive-day training streak
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StreakData {
    pub current: u32,
    pub longest: u32,
    pub last_workout_date: Option<NaiveDate>,
}

/// An earned achievement
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub earned_at: DateTime<Utc>,
    pub experience_reward: u32,
}

/// Unit of a milestone's target
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneValueType {
    WorkoutCount,
    TotalVolume,
    StreakDays,
}

/// Long-running goal tracked against the history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Milestone {
    pub id: String,
    pub title: String,
    pub target_value: f64,
    pub current_value: f64,
    pub value_type: MilestoneValueType,
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, hour, 0, 0).unwrap()
    }

    fn sample_workout() -> Workout {
        let bench = WorkoutExercise::new("bench_press", "Bench Press", &["chest", "triceps"], 0)
            .with_sets(vec![
                WorkoutSet::new(1, 60.0, 10).completed_at(at(9)),
                WorkoutSet::new(2, 65.0, 8).completed_at(at(9)),
                WorkoutSet::new(3, 70.0, 6),
            ]);
        Workout::new("user-1", "Push day", at(8)).with_exercises(vec![bench])
    }

    #[test]
    fn test_volume_counts_completed_sets_only() {
        let workout = sample_workout();
        assert_eq!(workout.total_volume(), 60.0 * 10.0 + 65.0 * 8.0);
        assert_eq!(workout.total_sets(), 3);
        assert_eq!(workout.completed_sets(), 2);
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        let workout = sample_workout();
        assert!(workout.clone().complete(at(10)).is_err());

        let started = workout.start(at(9)).unwrap();
        assert_eq!(started.status, WorkoutStatus::InProgress);
        assert!(started.completed_at.is_none());

        let done = started.complete(at(10)).unwrap();
        assert_eq!(done.completed_at, Some(at(10)));
        assert!(matches!(done.clone().cancel(), Err(Error::Consistency(_))));
        assert!(matches!(done.start(at(11)), Err(Error::Consistency(_))));
    }

    #[test]
    fn test_cancel_from_planned() {
        let cancelled = sample_workout().cancel().unwrap();
        assert_eq!(cancelled.status, WorkoutStatus::Cancelled);
        assert!(cancelled.completed_at.is_none());
    }

    #[test]
    fn test_validate_catches_duplicates_and_negative_weight() {
        let mut workout = sample_workout();
        workout.exercises[0].sets[1].set_number = 1;
        workout.exercises[0].sets[2].weight = -5.0;
        let mut second = workout.exercises[0].clone();
        second.id = new_id();
        workout.exercises.push(second);

        let errors = workout.validate();
        assert!(errors.iter().any(|e| e.contains("duplicate set number")));
        assert!(errors.iter().any(|e| e.contains("non-negative")));
        assert!(errors.iter().any(|e| e.contains("duplicate exercise position")));
    }

    #[test]
    fn test_effective_duration_prefers_actual() {
        let mut workout = sample_workout().with_planned_duration(45);
        assert_eq!(workout.effective_duration_seconds(), Some(2700.0));

        workout = workout.start(at(9)).unwrap().complete(at(10)).unwrap();
        assert_eq!(workout.effective_duration_seconds(), Some(3600.0));
    }

    #[test]
    fn test_category_parsing_accepts_hyphens() {
        assert_eq!("full-body".parse::<TemplateCategory>().unwrap(), TemplateCategory::FullBody);
        assert_eq!("Upper Body".parse::<TemplateCategory>().unwrap(), TemplateCategory::UpperBody);
        assert!("yoga".parse::<TemplateCategory>().is_err());
    }

    #[test]
    fn test_normalize_body_areas() {
        let areas = normalize_body_areas(&[" Chest", "chest", "", "Upper Legs"]);
        assert_eq!(areas, vec!["chest".to_string(), "upper legs".to_string()]);
    }

    #[test]
    fn test_customization_event_serializes_tagged() {
        let event = CustomizationEvent::Modified {
            exercise_id: "ex-1".into(),
            change: ExerciseChange::RepRange { min: 6, max: 8 },
            at: at(7),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "modified");
        assert_eq!(json["change"]["field"], "rep_range");
    }
}
