//! Personal record detection.
//!
//! Every completed set is checked against the current records of its
//! exercise, one kind at a time:
//! - weight: the set's weight beats the current weight record
//! - volume: weight × reps beats the current volume record
//! - reps: reps beat the best current reps record whose paired weight is at
//!   most this set's weight
//!
//! Several kinds may fire for one set. A kind whose value would be zero
//! never fires, so empty sets produce nothing and re-checking a set that
//! already holds a record is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RecordHistory;
use crate::store::{RecordFilter, RecordRepository, Repository};
use crate::types::{new_id, PersonalRecord, RecordKind};
use crate::{Error, Result};

/// A record kind a set qualifies for
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordCandidate {
    pub kind: RecordKind,
    pub value: f64,
    /// Paired weight of a reps record
    pub secondary_value: Option<f64>,
}

/// One completed set as the detector sees it
#[derive(Clone, Debug, PartialEq)]
pub struct SetPerformance<'a> {
    pub owner_id: &'a str,
    pub exercise_id: &'a str,
    pub exercise_name: &'a str,
    pub workout_id: Option<&'a str>,
    pub weight: f64,
    pub reps: u32,
    pub achieved_at: DateTime<Utc>,
}

impl SetPerformance<'_> {
    fn to_record(&self, candidate: &RecordCandidate) -> PersonalRecord {
        PersonalRecord {
            id: new_id(),
            owner_id: self.owner_id.to_string(),
            exercise_id: self.exercise_id.to_string(),
            exercise_name: self.exercise_name.to_string(),
            kind: candidate.kind,
            value: candidate.value,
            secondary_value: candidate.secondary_value,
            achieved_at: self.achieved_at,
            workout_id: self.workout_id.map(String::from),
            is_current: true,
        }
    }
}

fn best_current(current: &[PersonalRecord], kind: RecordKind) -> f64 {
    current
        .iter()
        .filter(|r| r.is_current && r.kind == kind)
        .map(|r| r.value)
        .fold(0.0, f64::max)
}

/// Kinds a set of `weight` × `reps` would set against `current`
pub fn evaluate_set(weight: f64, reps: u32, current: &[PersonalRecord]) -> Vec<RecordCandidate> {
    let mut candidates = Vec::new();
    if !weight.is_finite() || weight < 0.0 {
        return candidates;
    }

    if weight > 0.0 && weight > best_current(current, RecordKind::MaxWeight) {
        candidates.push(RecordCandidate {
            kind: RecordKind::MaxWeight,
            value: weight,
            secondary_value: None,
        });
    }

    let volume = weight * f64::from(reps);
    if volume > 0.0 && volume > best_current(current, RecordKind::MaxVolume) {
        candidates.push(RecordCandidate {
            kind: RecordKind::MaxVolume,
            value: volume,
            secondary_value: None,
        });
    }

    let best_reps = current
        .iter()
        .filter(|r| r.is_current && r.kind == RecordKind::MaxReps)
        .filter(|r| r.secondary_value.unwrap_or(0.0) <= weight)
        .map(|r| r.value)
        .fold(0.0, f64::max);
    if reps > 0 && f64::from(reps) > best_reps {
        candidates.push(RecordCandidate {
            kind: RecordKind::MaxReps,
            value: f64::from(reps),
            secondary_value: Some(weight),
        });
    }

    candidates
}

/// Check one completed set against the stored records and persist whatever it beats
pub fn detect_and_store(
    repo: &RecordRepository<'_>,
    set: &SetPerformance<'_>,
    history: RecordHistory,
) -> Result<Vec<PersonalRecord>> {
    let current = repo.current_for_exercise(set.owner_id, set.exercise_id)?;
    let mut stored = Vec::new();

    for candidate in evaluate_set(set.weight, set.reps, &current) {
        let record = set.to_record(&candidate);
        repo.record(&record, history)?;
        tracing::info!(
            exercise_id = %record.exercise_id,
            kind = %record.kind,
            value = record.value,
            "new personal record"
        );
        stored.push(record);
    }
    Ok(stored)
}

/// Replay a chronological list of completed sets of one exercise from an
/// empty record book. Returns every record the history produces, with
/// superseded ones kept (not current) or dropped according to `history`.
pub fn replay(sets: &[SetPerformance<'_>], history: RecordHistory) -> Vec<PersonalRecord> {
    let mut book: Vec<PersonalRecord> = Vec::new();

    for set in sets {
        for candidate in evaluate_set(set.weight, set.reps, &book) {
            for previous in book
                .iter_mut()
                .filter(|r| r.is_current && r.kind == candidate.kind)
            {
                previous.is_current = false;
            }
            if history == RecordHistory::Discard {
                book.retain(|r| r.is_current);
            }
            book.push(set.to_record(&candidate));
        }
    }
    book
}

/// Rebuild the stored records of one exercise from its completed history
pub fn rebuild_exercise(
    repo: &RecordRepository<'_>,
    owner_id: &str,
    exercise_id: &str,
    sets: &[SetPerformance<'_>],
    history: RecordHistory,
) -> Result<Vec<PersonalRecord>> {
    if sets
        .iter()
        .any(|s| s.owner_id != owner_id || s.exercise_id != exercise_id)
    {
        return Err(Error::Consistency(format!(
            "record rebuild for {} received sets of another exercise or owner",
            exercise_id
        )));
    }

    let rebuilt = replay(sets, history);
    repo.replace_for_exercise(owner_id, exercise_id, &rebuilt)?;
    tracing::debug!(
        exercise_id,
        records = rebuilt.len(),
        "rebuilt personal records"
    );
    Ok(rebuilt)
}

/// The current record of each kind for an exercise, in [`RecordKind::ALL`] order
pub fn current_by_kind(records: &[PersonalRecord]) -> Vec<&PersonalRecord> {
    RecordKind::ALL
        .iter()
        .filter_map(|kind| records.iter().find(|r| r.is_current && r.kind == *kind))
        .collect()
}

/// Read every stored record for an owner, current and superseded
pub fn all_records(repo: &RecordRepository<'_>, owner_id: &str) -> Result<Vec<PersonalRecord>> {
    repo.list(&RecordFilter {
        include_history: true,
        ..RecordFilter::for_owner(owner_id)
    })
}
