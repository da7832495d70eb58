//! Template-preserving customization of personal workouts.
//!
//! A template is cloned into a [`UserWorkout`] once; from then on the
//! template is never written (except its usage metadata, by the ledger). Edits
//! to the personal copy are appended to its audit trail and the exercise list
//! the user sees is always `replay(baseline, trail)`.
//!
//! The trail is append/replace only: a newer modification of one field of an
//! exercise replaces the older modification of that field, and nothing else
//! is ever removed from it.

use chrono::{DateTime, Utc};

use crate::types::{
    new_id, CustomizationEvent, ExerciseChange, UserExercise, UserWorkout, WorkoutCustomizations,
    WorkoutExercise, WorkoutSet, WorkoutSource, WorkoutTemplate,
};
use crate::{Error, Result};

/// Clone a template into a personal workout owned by `owner_id`
pub fn create_from_template(
    template: &WorkoutTemplate,
    owner_id: &str,
    name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<UserWorkout> {
    let workout = UserWorkout {
        id: new_id(),
        owner_id: owner_id.to_string(),
        name: name.unwrap_or(template.name.as_str()).to_string(),
        description: template.description.clone(),
        source_template_id: Some(template.id.clone()),
        source: WorkoutSource::Template,
        exercises: template
            .ordered_exercises()
            .into_iter()
            .map(UserExercise::from_template)
            .collect(),
        customizations: WorkoutCustomizations::default(),
        created_at: now,
        updated_at: now,
    };

    let errors = workout.validate();
    if !errors.is_empty() {
        return Err(Error::validation(errors));
    }
    tracing::debug!(
        template_id = %template.id,
        exercises = workout.exercises.len(),
        "cloned template into user workout"
    );
    Ok(workout)
}

fn apply_change(exercise: &mut UserExercise, change: &ExerciseChange) {
    match change {
        ExerciseChange::Sets(sets) => exercise.sets = *sets,
        ExerciseChange::RepRange { min, max } => {
            exercise.rep_min = *min;
            exercise.rep_max = *max;
        }
        ExerciseChange::Weight(weight) => exercise.weight = *weight,
        ExerciseChange::Rest(seconds) => exercise.rest_seconds = *seconds,
        ExerciseChange::Notes(notes) => exercise.notes = notes.clone(),
    }
}

/// Effective exercise list: the baseline with every trail event applied in
/// order, sorted by position. Events addressing unknown exercises are skipped.
pub fn replay(baseline: &[UserExercise], trail: &WorkoutCustomizations) -> Vec<UserExercise> {
    let mut exercises: Vec<UserExercise> = baseline.to_vec();

    for event in &trail.events {
        match event {
            CustomizationEvent::Removed { exercise_id, .. } => {
                exercises.retain(|e| &e.id != exercise_id);
            }
            CustomizationEvent::Added { exercise, .. } => {
                if !exercises.iter().any(|e| e.id == exercise.id) {
                    exercises.push(exercise.clone());
                }
            }
            CustomizationEvent::Modified {
                exercise_id,
                change,
                ..
            } => {
                if let Some(exercise) = exercises.iter_mut().find(|e| &e.id == exercise_id) {
                    apply_change(exercise, change);
                }
            }
        }
    }

    exercises.sort_by_key(|e| e.position);
    exercises
}

/// Exercises of a personal workout as the user currently sees them
pub fn effective_exercises(workout: &UserWorkout) -> Vec<UserExercise> {
    replay(&workout.exercises, &workout.customizations)
}

/// Position after the last effective exercise
pub fn next_position(workout: &UserWorkout) -> u32 {
    effective_exercises(workout)
        .iter()
        .map(|e| e.position + 1)
        .max()
        .unwrap_or(0)
}

fn require_exercise(workout: &UserWorkout, exercise_id: &str) -> Result<()> {
    if effective_exercises(workout).iter().any(|e| e.id == exercise_id) {
        Ok(())
    } else {
        Err(Error::NotFound(format!(
            "exercise {} in user workout {}",
            exercise_id, workout.id
        )))
    }
}

/// Record the removal of an exercise
pub fn remove_exercise(workout: &mut UserWorkout, exercise_id: &str, at: DateTime<Utc>) -> Result<()> {
    require_exercise(workout, exercise_id)?;
    workout.customizations.events.push(CustomizationEvent::Removed {
        exercise_id: exercise_id.to_string(),
        at,
    });
    workout.updated_at = at;
    Ok(())
}

/// Record the addition of an exercise
pub fn add_exercise(workout: &mut UserWorkout, exercise: UserExercise, at: DateTime<Utc>) -> Result<()> {
    let effective = effective_exercises(workout);
    let mut errors = Vec::new();
    if effective.iter().any(|e| e.id == exercise.id) {
        errors.push(format!("exercise {} is already in the workout", exercise.id));
    }
    if effective.iter().any(|e| e.position == exercise.position) {
        errors.push(format!("position {} is already taken", exercise.position));
    }
    if exercise.rep_min > exercise.rep_max {
        errors.push(format!(
            "rep range {}-{} is inverted",
            exercise.rep_min, exercise.rep_max
        ));
    }
    if exercise.weight.map_or(false, |w| !w.is_finite() || w < 0.0) {
        errors.push("weight must be a non-negative number".to_string());
    }
    if !errors.is_empty() {
        return Err(Error::validation(errors));
    }

    workout
        .customizations
        .events
        .push(CustomizationEvent::Added { exercise, at });
    workout.updated_at = at;
    Ok(())
}

fn check_change(change: &ExerciseChange) -> Result<()> {
    match change {
        ExerciseChange::Sets(0) => Err(Error::Validation("sets must be at least 1".into())),
        ExerciseChange::RepRange { min, max } if min > max => Err(Error::Validation(format!(
            "rep range {}-{} is inverted",
            min, max
        ))),
        ExerciseChange::Weight(Some(w)) if !w.is_finite() || *w < 0.0 => Err(Error::Validation(
            format!("weight must be a non-negative number, got {}", w),
        )),
        _ => Ok(()),
    }
}

/// Record a modification, replacing any earlier one of the same field
pub fn modify_exercise(
    workout: &mut UserWorkout,
    exercise_id: &str,
    change: ExerciseChange,
    at: DateTime<Utc>,
) -> Result<()> {
    check_change(&change)?;
    require_exercise(workout, exercise_id)?;

    let field = change.field();
    workout.customizations.events.retain(|event| match event {
        CustomizationEvent::Modified {
            exercise_id: id,
            change: old,
            ..
        } => !(id == exercise_id && old.field() == field),
        _ => true,
    });
    workout.customizations.events.push(CustomizationEvent::Modified {
        exercise_id: exercise_id.to_string(),
        change,
        at,
    });
    workout.updated_at = at;
    Ok(())
}

fn supersedes(newer: &CustomizationEvent, older: &CustomizationEvent) -> bool {
    match (newer, older) {
        (
            CustomizationEvent::Modified {
                exercise_id: new_id,
                change: new_change,
                at: new_at,
            },
            CustomizationEvent::Modified {
                exercise_id: old_id,
                change: old_change,
                at: old_at,
            },
        ) => new_id == old_id && new_change.field() == old_change.field() && new_at >= old_at,
        _ => false,
    }
}

/// Check that `next` is a legal successor of the `stored` trail.
///
/// Stored events must survive in their original order. The only stored
/// events allowed to disappear are modifications replaced by a newer
/// modification of the same field, which sits among the events after the
/// survivors.
pub fn check_trail_successor(stored: &WorkoutCustomizations, next: &WorkoutCustomizations) -> Result<()> {
    let mut kept = 0;
    for event in &stored.events {
        if next.events.get(kept) == Some(event) {
            kept += 1;
            continue;
        }
        let replaced = next.events[kept..]
            .iter()
            .any(|candidate| candidate != event && supersedes(candidate, event));
        if !replaced {
            return Err(Error::Consistency(format!(
                "customization trail would lose a {} event for exercise {}",
                event.kind(),
                event.exercise_id()
            )));
        }
    }
    Ok(())
}

/// Plan a workout exercise from a personal exercise: `sets` empty sets at the
/// lower end of the rep range and the suggested weight.
pub fn plan_exercise(exercise: &UserExercise) -> WorkoutExercise {
    let sets = (1..=exercise.sets)
        .map(|n| {
            WorkoutSet::new(n, exercise.weight.unwrap_or(0.0), exercise.rep_min)
                .with_rest(exercise.rest_seconds)
        })
        .collect();
    WorkoutExercise {
        id: new_id(),
        exercise_id: exercise.exercise_id.clone(),
        exercise_name: exercise.exercise_name.clone(),
        body_areas: exercise.body_areas.clone(),
        position: exercise.position,
        sets,
        notes: exercise.notes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Difficulty, TemplateCategory, TemplateExercise, SYSTEM_OWNER};
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, hour, 0, 0).unwrap()
    }

    fn template() -> WorkoutTemplate {
        let mut t = WorkoutTemplate::new(
            SYSTEM_OWNER,
            "Push Basics",
            TemplateCategory::Push,
            Difficulty::Beginner,
            at(1),
        );
        t.exercises = ["bench_press", "overhead_press", "dips"]
            .iter()
            .enumerate()
            .map(|(i, id)| TemplateExercise {
                id: new_id(),
                exercise_id: id.to_string(),
                exercise_name: id.to_string(),
                body_areas: vec!["chest".into()],
                position: i as u32,
                suggested_sets: 3,
                rep_min: 8,
                rep_max: 12,
                suggested_weight: Some(40.0),
                rest_seconds: 90,
                notes: None,
            })
            .collect();
        t
    }

    fn added(exercise_id: &str, position: u32) -> UserExercise {
        UserExercise {
            id: new_id(),
            exercise_id: exercise_id.into(),
            exercise_name: exercise_id.into(),
            body_areas: vec!["triceps".into()],
            position,
            sets: 2,
            rep_min: 10,
            rep_max: 15,
            weight: None,
            rest_seconds: 60,
            notes: None,
            is_from_template: false,
            template_exercise_id: None,
        }
    }

    #[test]
    fn test_clone_marks_template_origin() {
        let t = template();
        let uw = create_from_template(&t, "u1", None, at(2)).unwrap();
        assert_eq!(uw.source, WorkoutSource::Template);
        assert_eq!(uw.source_template_id.as_deref(), Some(t.id.as_str()));
        assert_eq!(uw.name, "Push Basics");
        assert_eq!(uw.exercises.len(), 3);
        for (user, original) in uw.exercises.iter().zip(&t.exercises) {
            assert!(user.is_from_template);
            assert_eq!(user.template_exercise_id.as_ref(), Some(&original.id));
            assert_ne!(user.id, original.id);
        }
    }

    #[test]
    fn test_system_owner_cannot_own_copy() {
        let result = create_from_template(&template(), SYSTEM_OWNER, None, at(2));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_customizations_replay_and_template_untouched() {
        let t = template();
        let before = t.clone();
        let mut uw = create_from_template(&t, "u1", Some("My Push"), at(2)).unwrap();
        let dips = uw.exercises[2].id.clone();
        let bench = uw.exercises[0].id.clone();

        remove_exercise(&mut uw, &dips, at(3)).unwrap();
        add_exercise(&mut uw, added("triceps_pushdown", 2), at(4)).unwrap();
        modify_exercise(&mut uw, &bench, ExerciseChange::Sets(5), at(5)).unwrap();
        modify_exercise(&mut uw, &bench, ExerciseChange::Weight(Some(60.0)), at(6)).unwrap();

        let effective = effective_exercises(&uw);
        let ids: Vec<_> = effective.iter().map(|e| e.exercise_id.as_str()).collect();
        assert_eq!(ids, vec!["bench_press", "overhead_press", "triceps_pushdown"]);
        assert_eq!(effective[0].sets, 5);
        assert_eq!(effective[0].weight, Some(60.0));

        // The baseline and the template are untouched
        assert_eq!(uw.exercises.len(), 3);
        assert_eq!(uw.exercises[0].sets, 3);
        assert_eq!(t, before);
        assert_eq!(uw.updated_at, at(6));
    }

    #[test]
    fn test_newer_modification_supersedes_same_field_only() {
        let mut uw = create_from_template(&template(), "u1", None, at(2)).unwrap();
        let bench = uw.exercises[0].id.clone();
        let ohp = uw.exercises[1].id.clone();

        modify_exercise(&mut uw, &bench, ExerciseChange::Sets(4), at(3)).unwrap();
        modify_exercise(&mut uw, &ohp, ExerciseChange::Sets(2), at(4)).unwrap();
        modify_exercise(&mut uw, &bench, ExerciseChange::Rest(120), at(5)).unwrap();
        modify_exercise(&mut uw, &bench, ExerciseChange::Sets(6), at(6)).unwrap();

        assert_eq!(uw.customizations.events.len(), 3);
        let effective = effective_exercises(&uw);
        assert_eq!(effective[0].sets, 6);
        assert_eq!(effective[0].rest_seconds, 120);
        assert_eq!(effective[1].sets, 2);
    }

    #[test]
    fn test_trail_successor_rules() {
        let mut uw = create_from_template(&template(), "u1", None, at(2)).unwrap();
        let bench = uw.exercises[0].id.clone();
        let dips = uw.exercises[2].id.clone();
        modify_exercise(&mut uw, &bench, ExerciseChange::Sets(4), at(3)).unwrap();
        remove_exercise(&mut uw, &dips, at(4)).unwrap();
        let stored = uw.customizations.clone();

        // Appending and superseding are both fine
        modify_exercise(&mut uw, &bench, ExerciseChange::Sets(5), at(5)).unwrap();
        modify_exercise(&mut uw, &bench, ExerciseChange::Rest(60), at(6)).unwrap();
        assert!(check_trail_successor(&stored, &uw.customizations).is_ok());
        assert!(check_trail_successor(&stored, &stored).is_ok());

        let mut dropped = stored.clone();
        dropped.events.remove(1);
        assert!(matches!(
            check_trail_successor(&stored, &dropped),
            Err(Error::Consistency(_))
        ));

        let mut reordered = stored.clone();
        reordered.events.reverse();
        assert!(check_trail_successor(&stored, &reordered).is_err());

        // A different field does not replace the sets change
        let mut other_field = stored.clone();
        other_field.events.remove(0);
        other_field.events.push(CustomizationEvent::Modified {
            exercise_id: bench.clone(),
            change: ExerciseChange::Rest(30),
            at: at(7),
        });
        assert!(check_trail_successor(&stored, &other_field).is_err());

        assert!(check_trail_successor(&stored, &WorkoutCustomizations::default()).is_err());
    }

    #[test]
    fn test_replay_is_deterministic() {
        let mut uw = create_from_template(&template(), "u1", None, at(2)).unwrap();
        let bench = uw.exercises[0].id.clone();
        modify_exercise(&mut uw, &bench, ExerciseChange::RepRange { min: 5, max: 5 }, at(3)).unwrap();
        add_exercise(&mut uw, added("cable_fly", 7), at(4)).unwrap();

        let first = effective_exercises(&uw);
        let second = replay(&uw.exercises, &uw.customizations);
        assert_eq!(first, second);
        assert_eq!(next_position(&uw), 8);
    }

    #[test]
    fn test_invalid_edits_rejected() {
        let mut uw = create_from_template(&template(), "u1", None, at(2)).unwrap();
        let bench = uw.exercises[0].id.clone();

        assert!(matches!(
            modify_exercise(&mut uw, &bench, ExerciseChange::RepRange { min: 9, max: 3 }, at(3)),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            modify_exercise(&mut uw, "nope", ExerciseChange::Sets(3), at(3)),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            add_exercise(&mut uw, added("cable_fly", 0), at(3)),
            Err(Error::Validation(_))
        ));

        remove_exercise(&mut uw, &bench, at(4)).unwrap();
        assert!(matches!(
            remove_exercise(&mut uw, &bench, at(5)),
            Err(Error::NotFound(_))
        ));
        assert_eq!(uw.customizations.events.len(), 1);
    }

    #[test]
    fn test_plan_exercise_creates_empty_sets() {
        let uw = create_from_template(&template(), "u1", None, at(2)).unwrap();
        let planned = plan_exercise(&uw.exercises[0]);
        assert_eq!(planned.sets.len(), 3);
        assert!(planned.sets.iter().all(|s| !s.completed && s.weight == 40.0 && s.reps == 8));
        assert_eq!(planned.sets[2].set_number, 3);
        assert_eq!(planned.total_volume(), 0.0);
    }
}
