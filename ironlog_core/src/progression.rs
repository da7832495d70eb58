//! Progression engine: turns completed sessions into levels, streaks,
//! achievements and milestones.
//!
//! Rules:
//! - Every body area starts at level 1 with `base_experience` required to level up
//! - Completed set volume is experience; a set's volume is split evenly across
//!   the areas it is attributed to
//! - Each level-up multiplies the requirement by `level_growth`
//! - Streaks count consecutive UTC calendar days with a completed session
//!
//! [`ProgressSnapshot::recompute`] is the source of truth. The ledger keeps a
//! cached snapshot and folds new sessions into it with
//! [`ProgressSnapshot::apply_session`]; both paths give the same result.

use crate::config::ProgressionConfig;
use crate::types::{
    Achievement, BodyAreaProgress, Milestone, MilestoneValueType, StreakData, Workout,
    WorkoutStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bumped whenever the folding rules change; older cached snapshots are recomputed
pub const SNAPSHOT_VERSION: u32 = 2;

/// Highest reachable level; experience past it keeps accumulating
pub const MAX_LEVEL: u32 = 1000;

/// Experience curve shared by every body area
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct LevelCurve {
    pub base_experience: f64,
    pub growth: f64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::from_config(&ProgressionConfig::default())
    }
}

impl LevelCurve {
    pub fn from_config(config: &ProgressionConfig) -> Self {
        Self {
            base_experience: config.base_experience,
            growth: config.level_growth,
        }
    }
}

impl BodyAreaProgress {
    /// Level 1, no experience
    pub fn new(body_area: impl Into<String>, curve: &LevelCurve) -> Self {
        Self {
            body_area: body_area.into(),
            total_volume: 0.0,
            level: 1,
            experience: 0.0,
            experience_to_next_level: curve.base_experience,
            last_worked: None,
        }
    }

    /// Add experience, carrying the remainder across as many level-ups as it
    /// pays for. Returns the number of levels gained.
    pub fn add_experience(&mut self, amount: f64, curve: &LevelCurve) -> u32 {
        if !(amount > 0.0) {
            return 0;
        }
        self.experience += amount;

        let mut gained = 0;
        while self.level < MAX_LEVEL
            && self.experience_to_next_level > 0.0
            && self.experience >= self.experience_to_next_level
        {
            self.experience -= self.experience_to_next_level;
            self.level += 1;
            self.experience_to_next_level *= curve.growth;
            gained += 1;
        }
        gained
    }

    /// Record volume worked on `date`; returns levels gained
    pub fn add_volume(&mut self, volume: f64, date: NaiveDate, curve: &LevelCurve) -> u32 {
        self.total_volume += volume;
        if self.last_worked.map_or(true, |last| date > last) {
            self.last_worked = Some(date);
        }
        self.add_experience(volume, curve)
    }

    /// Fraction of the current level completed, in [0, 1]
    pub fn progress_to_next_level(&self) -> f64 {
        if self.experience_to_next_level <= 0.0 {
            return 1.0;
        }
        (self.experience / self.experience_to_next_level).clamp(0.0, 1.0)
    }
}

impl StreakData {
    /// Fold one session day into the streak
    ///
    /// - first session ever → 1
    /// - same day as the last → unchanged
    /// - the day after the last → +1
    /// - a later gap → back to 1
    /// - a day before the last → unchanged
    pub fn record(&mut self, date: NaiveDate) {
        match self.last_workout_date {
            None => {
                self.current = 1;
                self.last_workout_date = Some(date);
            }
            Some(last) if date == last => {}
            Some(last) if date < last => {
                tracing::debug!(%date, %last, "session day precedes streak, ignoring");
            }
            Some(last) => {
                if (date - last).num_days() == 1 {
                    self.current += 1;
                } else {
                    self.current = 1;
                }
                self.last_workout_date = Some(date);
            }
        }
        self.longest = self.longest.max(self.current);
    }

    /// The streak is alive if the last session was today or yesterday
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.last_workout_date
            .map_or(false, |last| (today - last).num_days() <= 1)
    }
}

/// How recently an area was worked: 1.0 today, fading linearly to 0.0 at `decay_days`
pub fn heat_intensity(last_worked: Option<NaiveDate>, today: NaiveDate, decay_days: u32) -> f64 {
    let Some(last) = last_worked else {
        return 0.0;
    };
    let days = (today - last).num_days();
    let decay = i64::from(decay_days.max(1));
    if days <= 0 {
        1.0
    } else if days >= decay {
        0.0
    } else {
        1.0 - days as f64 / decay as f64
    }
}

/// Heat of every tracked body area
pub fn heat_map(
    areas: &BTreeMap<String, BodyAreaProgress>,
    today: NaiveDate,
    decay_days: u32,
) -> BTreeMap<String, f64> {
    areas
        .iter()
        .map(|(area, progress)| {
            (
                area.clone(),
                heat_intensity(progress.last_worked, today, decay_days),
            )
        })
        .collect()
}

// ============================================================================
// Achievements and milestones
// ============================================================================

const WORKOUT_COUNT_ACHIEVEMENTS: [(u32, &str, &str, &str, u32); 3] = [
    (1, "first_workout", "First Steps", "flag", 50),
    (10, "ten_workouts", "Getting Serious", "dumbbell", 100),
    (50, "fifty_workouts", "Iron Regular", "trophy", 250),
];

const STREAK_ACHIEVEMENTS: [(u32, &str, &str, &str, u32); 2] = [
    (7, "streak_7", "Week Warrior", "flame", 150),
    (30, "streak_30", "Unstoppable", "fire", 500),
];

const LEVEL_ACHIEVEMENTS: [(u32, &str, u32); 2] = [(5, "star", 200), (10, "crown", 500)];

fn milestone_definitions() -> Vec<Milestone> {
    let defs: [(&str, &str, f64, MilestoneValueType); 8] = [
        ("workouts_25", "25 workouts", 25.0, MilestoneValueType::WorkoutCount),
        ("workouts_100", "100 workouts", 100.0, MilestoneValueType::WorkoutCount),
        ("workouts_250", "250 workouts", 250.0, MilestoneValueType::WorkoutCount),
        ("volume_10k", "10 000 kg lifted", 10_000.0, MilestoneValueType::TotalVolume),
        ("volume_100k", "100 000 kg lifted", 100_000.0, MilestoneValueType::TotalVolume),
        ("volume_1m", "1 000 000 kg lifted", 1_000_000.0, MilestoneValueType::TotalVolume),
        ("streak_14", "Two-week streak", 14.0, MilestoneValueType::StreakDays),
        ("streak_60", "Two-month streak", 60.0, MilestoneValueType::StreakDays),
    ];
    defs.iter()
        .map(|(id, title, target, value_type)| Milestone {
            id: id.to_string(),
            title: title.to_string(),
            target_value: *target,
            current_value: 0.0,
            value_type: *value_type,
            completed: false,
        })
        .collect()
}

fn title_case(area: &str) -> String {
    area.split(|c: char| c == ' ' || c == '_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A body area crossing into a new level during one session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelUp {
    pub body_area: String,
    pub level: u32,
}

/// What folding one session changed
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub workout_id: String,
    pub volume: f64,
    pub level_ups: Vec<LevelUp>,
    pub new_achievements: Vec<Achievement>,
}

impl SessionOutcome {
    pub fn is_empty(&self) -> bool {
        self.level_ups.is_empty() && self.new_achievements.is_empty() && self.volume == 0.0
    }

    /// What folding `workout` changed, read off two snapshots; used when a
    /// session had to be merged by refolding the whole history
    pub fn between(workout: &Workout, before: &ProgressSnapshot, after: &ProgressSnapshot) -> Self {
        let level_ups = after
            .body_areas
            .iter()
            .filter(|(area, progress)| {
                before.body_areas.get(*area).map_or(1, |b| b.level) < progress.level
            })
            .map(|(area, progress)| LevelUp {
                body_area: area.clone(),
                level: progress.level,
            })
            .collect();
        let new_achievements = after
            .achievements
            .iter()
            .filter(|a| !before.achievements.iter().any(|b| b.id == a.id))
            .cloned()
            .collect();
        Self {
            workout_id: workout.id.clone(),
            volume: workout.total_volume(),
            level_ups,
            new_achievements,
        }
    }
}

/// Latest folded position in (session time, id) order: the newest session
/// time folded so far and the workouts folded at exactly that time
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FoldMark {
    pub at: DateTime<Utc>,
    pub workout_ids: BTreeSet<String>,
}

/// Everything derived from one owner's completed history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressSnapshot {
    pub version: u32,
    pub curve: LevelCurve,
    pub body_areas: BTreeMap<String, BodyAreaProgress>,
    pub streak: StreakData,
    pub achievements: Vec<Achievement>,
    pub milestones: Vec<Milestone>,
    pub completed_workouts: u32,
    pub total_volume: f64,
    /// Volume from exercises with no body area on the exercise or the workout
    pub unattributed_volume: f64,
    /// Sum of achievement rewards
    pub bonus_experience: u64,
    /// Sessions up to this mark are folded in
    pub folded_through: Option<FoldMark>,
}

impl ProgressSnapshot {
    pub fn new(curve: LevelCurve) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            curve,
            body_areas: BTreeMap::new(),
            streak: StreakData::default(),
            achievements: Vec::new(),
            milestones: milestone_definitions(),
            completed_workouts: 0,
            total_volume: 0.0,
            unattributed_volume: 0.0,
            bonus_experience: 0,
            folded_through: None,
        }
    }

    /// Fold the whole history from scratch, in session order
    pub fn recompute(sessions: &[Workout], curve: LevelCurve) -> Self {
        let mut ordered: Vec<&Workout> = sessions
            .iter()
            .filter(|w| w.status == WorkoutStatus::Completed)
            .collect();
        ordered.sort_by(|a, b| {
            a.session_time()
                .cmp(&b.session_time())
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut snapshot = Self::new(curve);
        for workout in ordered {
            snapshot.apply_session(workout);
        }
        snapshot
    }

    /// Whether this snapshot can stand in for a recomputation under `curve`
    pub fn is_compatible(&self, curve: &LevelCurve) -> bool {
        self.version == SNAPSHOT_VERSION && self.curve == *curve
    }

    /// Whether `workout` is at or before the fold mark. Sessions strictly
    /// before the mark count as folded, so history must be folded in order.
    pub fn has_processed(&self, workout: &Workout) -> bool {
        let Some(mark) = &self.folded_through else {
            return false;
        };
        let at = workout.session_time();
        at < mark.at || (at == mark.at && mark.workout_ids.contains(&workout.id))
    }

    /// Whether `workout` can be folded in incrementally: completed, not yet
    /// folded and not older than the fold mark
    pub fn can_fold(&self, workout: &Workout) -> bool {
        workout.status == WorkoutStatus::Completed && !self.has_processed(workout)
    }

    fn advance_mark(&mut self, workout: &Workout) {
        let at = workout.session_time();
        if let Some(mark) = self.folded_through.as_mut() {
            if mark.at == at {
                mark.workout_ids.insert(workout.id.clone());
                return;
            }
            if mark.at > at {
                return;
            }
        }
        self.folded_through = Some(FoldMark {
            at,
            workout_ids: BTreeSet::from([workout.id.clone()]),
        });
    }

    /// Fold one completed session in. Sessions that are not completed, or
    /// that were already folded, change nothing.
    pub fn apply_session(&mut self, workout: &Workout) -> SessionOutcome {
        let mut outcome = SessionOutcome {
            workout_id: workout.id.clone(),
            ..SessionOutcome::default()
        };
        if !self.can_fold(workout) {
            return outcome;
        }

        let date = workout.session_date();
        let curve = self.curve;
        let mut levels_before: BTreeMap<String, u32> = BTreeMap::new();

        for exercise in workout.ordered_exercises() {
            let areas = workout.attributed_areas(exercise);
            for set in exercise.sets.iter().filter(|s| s.completed) {
                let volume = set.volume();
                if areas.is_empty() {
                    self.unattributed_volume += volume;
                    continue;
                }
                let share = volume / areas.len() as f64;
                for area in areas {
                    let progress = self
                        .body_areas
                        .entry(area.clone())
                        .or_insert_with(|| BodyAreaProgress::new(area.clone(), &curve));
                    levels_before
                        .entry(area.clone())
                        .or_insert(progress.level);
                    progress.add_volume(share, date, &curve);
                }
            }
        }

        for (area, before) in levels_before {
            if let Some(progress) = self.body_areas.get(&area) {
                if progress.level > before {
                    tracing::info!(body_area = %area, level = progress.level, "level up");
                    outcome.level_ups.push(LevelUp {
                        body_area: area,
                        level: progress.level,
                    });
                }
            }
        }

        outcome.volume = workout.total_volume();
        self.total_volume += outcome.volume;
        self.completed_workouts += 1;
        self.streak.record(date);
        self.advance_mark(workout);

        outcome.new_achievements = self.award_achievements(workout.session_time());
        self.refresh_milestones();

        tracing::debug!(
            workout_id = %workout.id,
            volume = outcome.volume,
            streak = self.streak.current,
            "folded session into progress"
        );
        outcome
    }

    fn award(&mut self, earned: &mut Vec<Achievement>, candidate: Achievement) {
        if self.achievements.iter().any(|a| a.id == candidate.id) {
            return;
        }
        tracing::info!(achievement = %candidate.id, "achievement earned");
        self.bonus_experience += u64::from(candidate.experience_reward);
        self.achievements.push(candidate.clone());
        earned.push(candidate);
    }

    fn award_achievements(&mut self, at: DateTime<Utc>) -> Vec<Achievement> {
        let mut earned = Vec::new();

        for (threshold, id, title, icon, reward) in WORKOUT_COUNT_ACHIEVEMENTS {
            if self.completed_workouts >= threshold {
                let description = if threshold == 1 {
                    "Complete your first workout".to_string()
                } else {
                    format!("Complete {} workouts", threshold)
                };
                self.award(
                    &mut earned,
                    Achievement {
                        id: id.to_string(),
                        title: title.to_string(),
                        description,
                        icon: icon.to_string(),
                        earned_at: at,
                        experience_reward: reward,
                    },
                );
            }
        }

        for (threshold, id, title, icon, reward) in STREAK_ACHIEVEMENTS {
            if self.streak.current >= threshold {
                self.award(
                    &mut earned,
                    Achievement {
                        id: id.to_string(),
                        title: title.to_string(),
                        description: format!("Train {} days in a row", threshold),
                        icon: icon.to_string(),
                        earned_at: at,
                        experience_reward: reward,
                    },
                );
            }
        }

        let levels: Vec<(String, u32)> = self
            .body_areas
            .iter()
            .map(|(area, p)| (area.clone(), p.level))
            .collect();
        for (area, level) in levels {
            for (threshold, icon, reward) in LEVEL_ACHIEVEMENTS {
                if level >= threshold {
                    self.award(
                        &mut earned,
                        Achievement {
                            id: format!("level_{}_{}", threshold, area.replace(' ', "_")),
                            title: format!("{} Level {}", title_case(&area), threshold),
                            description: format!("Reach level {} in {}", threshold, area),
                            icon: icon.to_string(),
                            earned_at: at,
                            experience_reward: reward,
                        },
                    );
                }
            }
        }

        earned
    }

    fn refresh_milestones(&mut self) {
        for milestone in &mut self.milestones {
            milestone.current_value = match milestone.value_type {
                MilestoneValueType::WorkoutCount => f64::from(self.completed_workouts),
                MilestoneValueType::TotalVolume => self.total_volume,
                MilestoneValueType::StreakDays => f64::from(self.streak.longest),
            };
            milestone.completed = milestone.current_value >= milestone.target_value;
        }
    }

    /// Heat of every tracked area on `today`
    pub fn heat_map(&self, today: NaiveDate, decay_days: u32) -> BTreeMap<String, f64> {
        heat_map(&self.body_areas, today, decay_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{WorkoutExercise, WorkoutSet};
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn completed_workout(d: u32, sets: &[(f64, u32)], areas: &[&str]) -> Workout {
        let start = Utc.with_ymd_and_hms(2024, 5, d, 9, 0, 0).unwrap();
        let sets = sets
            .iter()
            .enumerate()
            .map(|(i, (w, r))| WorkoutSet::new(i as u32 + 1, *w, *r).completed_at(start))
            .collect();
        let exercise = WorkoutExercise::new("bench_press", "Bench Press", areas, 0).with_sets(sets);
        Workout::new("u1", "Session", start)
            .with_exercises(vec![exercise])
            .start(start)
            .unwrap()
            .complete(start + Duration::hours(1))
            .unwrap()
    }

    #[test]
    fn test_leveling_sequence() {
        let curve = LevelCurve::default();
        let mut area = BodyAreaProgress::new("chest", &curve);
        let mut observed = Vec::new();
        for amount in [1000.0, 500.0, 500.0] {
            area.add_experience(amount, &curve);
            observed.push((area.level, area.experience));
        }
        assert_eq!(observed, vec![(2, 0.0), (2, 500.0), (2, 1000.0)]);
        assert_eq!(area.experience_to_next_level, 1500.0);

        assert_eq!(area.add_experience(500.0, &curve), 1);
        assert_eq!(area.level, 3);
        assert_eq!(area.experience, 0.0);
        assert_eq!(area.experience_to_next_level, 2250.0);
    }

    #[test]
    fn test_large_gain_crosses_several_levels() {
        let curve = LevelCurve::default();
        let mut area = BodyAreaProgress::new("back", &curve);
        // 1000 + 1500 + 2250 = 4750
        assert_eq!(area.add_experience(5000.0, &curve), 3);
        assert_eq!(area.level, 4);
        assert_eq!(area.experience, 250.0);
        assert!((area.progress_to_next_level() - 250.0 / 3375.0).abs() < 1e-12);
    }

    #[test]
    fn test_level_is_capped_on_a_flat_curve() {
        let curve = LevelCurve {
            base_experience: 0.001,
            growth: 1.0,
        };
        let mut area = BodyAreaProgress::new("back", &curve);
        assert_eq!(area.add_experience(1.0e12, &curve), MAX_LEVEL - 1);
        assert_eq!(area.level, MAX_LEVEL);
        assert_eq!(area.add_experience(5.0, &curve), 0);
        assert_eq!(area.progress_to_next_level(), 1.0);
    }

    #[test]
    fn test_streak_continuity() {
        let mut streak = StreakData::default();
        for d in [1, 2, 3] {
            streak.record(day(d));
        }
        assert_eq!(streak.current, 3);

        let mut gap = StreakData::default();
        gap.record(day(1));
        gap.record(day(3));
        assert_eq!(gap.current, 1);
        assert_eq!(gap.longest, 1);

        let mut repeat = StreakData::default();
        repeat.record(day(1));
        repeat.record(day(2));
        repeat.record(day(2));
        assert_eq!(repeat.current, 2);

        // Earlier day leaves everything as it was
        repeat.record(day(1));
        assert_eq!(repeat.current, 2);
        assert_eq!(repeat.last_workout_date, Some(day(2)));

        repeat.record(day(10));
        assert_eq!(repeat.current, 1);
        assert_eq!(repeat.longest, 2);
        assert!(repeat.is_active(day(11)));
        assert!(!repeat.is_active(day(12)));
    }

    #[test]
    fn test_heat_decay() {
        assert_eq!(heat_intensity(Some(day(10)), day(10), 7), 1.0);
        assert_eq!(heat_intensity(Some(day(3)), day(10), 7), 0.0);
        assert_eq!(heat_intensity(Some(day(1)), day(10), 7), 0.0);
        assert!((heat_intensity(Some(day(7)), day(10), 7) - (1.0 - 3.0 / 7.0)).abs() < 1e-12);
        assert_eq!(heat_intensity(None, day(10), 7), 0.0);
    }

    #[test]
    fn test_session_splits_volume_across_areas() {
        let mut snapshot = ProgressSnapshot::new(LevelCurve::default());
        let workout = completed_workout(6, &[(60.0, 10), (65.0, 8)], &["chest", "triceps"]);

        let outcome = snapshot.apply_session(&workout);
        assert_eq!(outcome.volume, 1120.0);
        assert_eq!(snapshot.total_volume, 1120.0);

        let chest = &snapshot.body_areas["chest"];
        let triceps = &snapshot.body_areas["triceps"];
        assert_eq!(chest.total_volume, 560.0);
        assert_eq!(triceps.total_volume, 560.0);
        assert_eq!(chest.last_worked, Some(day(6)));
        assert_eq!(
            outcome.new_achievements.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec!["first_workout"]
        );
    }

    #[test]
    fn test_session_is_folded_once() {
        let mut snapshot = ProgressSnapshot::new(LevelCurve::default());
        let workout = completed_workout(6, &[(100.0, 10)], &["back"]);

        snapshot.apply_session(&workout);
        let again = snapshot.apply_session(&workout);
        assert!(again.is_empty());
        assert_eq!(snapshot.completed_workouts, 1);
        assert_eq!(snapshot.achievements.len(), 1);
        assert_eq!(snapshot.body_areas["back"].level, 2);
    }

    #[test]
    fn test_fold_mark_stays_small() {
        let mut snapshot = ProgressSnapshot::new(LevelCurve::default());
        let monday = completed_workout(6, &[(50.0, 10)], &["back"]);
        let tuesday = completed_workout(7, &[(50.0, 10)], &["back"]);
        let mut tuesday_again = completed_workout(7, &[(40.0, 10)], &["back"]);
        tuesday_again.id = format!("{}-b", tuesday.id);

        snapshot.apply_session(&monday);
        snapshot.apply_session(&tuesday);
        snapshot.apply_session(&tuesday_again);

        let mark = snapshot.folded_through.clone().unwrap();
        assert_eq!(mark.at, tuesday.session_time());
        assert_eq!(mark.workout_ids.len(), 2);
        assert!(snapshot.has_processed(&monday));
        assert_eq!(snapshot.completed_workouts, 3);

        // Anything older than the mark is treated as already folded
        let sunday = completed_workout(5, &[(50.0, 10)], &["back"]);
        assert!(!snapshot.can_fold(&sunday));
        assert!(snapshot.apply_session(&sunday).is_empty());
        assert_eq!(snapshot.completed_workouts, 3);
    }

    #[test]
    fn test_unattributed_volume() {
        let mut snapshot = ProgressSnapshot::new(LevelCurve::default());
        let workout = completed_workout(6, &[(20.0, 10)], &[]);
        snapshot.apply_session(&workout);
        assert!(snapshot.body_areas.is_empty());
        assert_eq!(snapshot.unattributed_volume, 200.0);
    }

    #[test]
    fn test_workout_areas_used_as_fallback() {
        let mut snapshot = ProgressSnapshot::new(LevelCurve::default());
        let workout = completed_workout(6, &[(20.0, 10)], &[]).with_body_areas(&["core"]);
        snapshot.apply_session(&workout);
        assert_eq!(snapshot.body_areas["core"].total_volume, 200.0);
    }

    #[test]
    fn test_streak_and_level_achievements() {
        let sessions: Vec<Workout> = (1..=7)
            .map(|d| completed_workout(d, &[(200.0, 10)], &["quadriceps"]))
            .collect();
        let snapshot = ProgressSnapshot::recompute(&sessions, LevelCurve::default());

        assert_eq!(snapshot.streak.current, 7);
        let ids: Vec<_> = snapshot.achievements.iter().map(|a| a.id.as_str()).collect();
        assert!(ids.contains(&"first_workout"));
        assert!(ids.contains(&"streak_7"));
        // 14 000 experience: 1000 + 1500 + 2250 + 3375 = 8125 reaches level 5
        assert!(ids.contains(&"level_5_quadriceps"));
        assert!(!ids.contains(&"ten_workouts"));

        let volume = snapshot
            .milestones
            .iter()
            .find(|m| m.id == "volume_10k")
            .unwrap();
        assert!(volume.completed);
        assert_eq!(volume.current_value, 14_000.0);
    }

    #[test]
    fn test_incremental_matches_recompute() {
        let sessions: Vec<Workout> = [1, 2, 4, 5]
            .iter()
            .map(|d| completed_workout(*d, &[(50.0, 10), (55.0, 8)], &["chest", "shoulders"]))
            .collect();

        let mut incremental = ProgressSnapshot::new(LevelCurve::default());
        for session in &sessions {
            incremental.apply_session(session);
        }
        let recomputed = ProgressSnapshot::recompute(&sessions, LevelCurve::default());
        assert_eq!(incremental, recomputed);
        assert_eq!(recomputed.streak.current, 2);
        assert_eq!(recomputed.streak.longest, 2);
    }

    #[test]
    fn test_incomplete_sessions_ignored() {
        let planned = Workout::new("u1", "Later", Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        let snapshot = ProgressSnapshot::recompute(&[planned], LevelCurve::default());
        assert_eq!(snapshot.completed_workouts, 0);
        assert!(snapshot.achievements.is_empty());
    }
}
