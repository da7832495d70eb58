#![forbid(unsafe_code)]

//! Core domain model and business logic for the ironlog training ledger.
//!
//! This crate provides:
//! - Domain types (workouts, templates, personal workouts, records, progress)
//! - A transactional SQLite store with one repository per aggregate
//! - Statistics, progression, personal-record detection
//! - Template seeding, customization and recommendations
//! - The [`Ledger`] facade tying them together

pub mod types;
pub mod error;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod logging;
pub mod store;
pub mod stats;
pub mod progression;
pub mod records;
pub mod recommendation;
pub mod customization;
pub mod seeder;
pub mod export;
pub mod lock;
pub mod ledger;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, default_catalog, ExerciseCatalog, ExerciseInfo, StaticCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, RecordHistory};
pub use store::{
    RecordFilter, Repository, Store, TemplateFilter, TemplateSort, UserWorkoutFilter, WorkoutFilter,
};
pub use stats::{StatsQuery, WorkoutStats};
pub use progression::{LevelCurve, ProgressSnapshot, SessionOutcome};
pub use recommendation::{RecommendationReason, TodaysRecommendation};
pub use ledger::{CompletedWorkout, Ledger, LoggedSet, NewUserExercise, WorkoutPlan};
