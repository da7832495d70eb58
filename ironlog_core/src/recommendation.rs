//! "What should I do today" template selection.
//!
//! Selection is fully deterministic:
//! 1. **Weekday preference**: each weekday has an ordered list of preferred
//!    categories; the first category with a candidate wins
//! 2. **Any available**: otherwise the least-used available template
//! 3. **Safe fallback**: otherwise a full-body, then push, system template
//!
//! Within a candidate set the lowest usage count wins and ties keep listing
//! order.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::types::{TemplateCategory, WorkoutTemplate};

/// Categories tried when nothing else is available
pub const SAFE_CATEGORIES: [TemplateCategory; 2] =
    [TemplateCategory::FullBody, TemplateCategory::Push];

/// Preferred categories for a weekday, best first
pub fn preferred_categories(weekday: Weekday) -> &'static [TemplateCategory] {
    use TemplateCategory::*;
    match weekday {
        Weekday::Mon => &[Push, UpperBody],
        Weekday::Tue => &[Legs, LowerBody],
        Weekday::Wed => &[Pull, UpperBody],
        Weekday::Thu => &[Cardio, FullBody],
        Weekday::Fri => &[FullBody, Strength],
        Weekday::Sat => &[Strength, FullBody],
        Weekday::Sun => &[Cardio, Custom],
    }
}

/// Why a template was picked
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RecommendationReason {
    /// Matched one of the weekday's preferred categories
    Preferred { category: TemplateCategory },
    /// No preferred category matched; least-used template overall
    AnyAvailable,
    /// Nothing available; a system template from a safe category
    SafeFallback { category: TemplateCategory },
}

/// Today's pick
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodaysRecommendation {
    pub weekday: Weekday,
    pub template: WorkoutTemplate,
    pub reason: RecommendationReason,
}

/// Lowest usage count; the earliest listed template wins a tie
fn least_used<'a>(candidates: impl IntoIterator<Item = &'a WorkoutTemplate>) -> Option<&'a WorkoutTemplate> {
    let mut best: Option<&WorkoutTemplate> = None;
    for template in candidates {
        match best {
            Some(current) if current.usage_count <= template.usage_count => {}
            _ => best = Some(template),
        }
    }
    best
}

/// Pick today's template.
///
/// `available` are the templates visible to the user in listing order;
/// `system` are the seeded templates, consulted only when nothing is available.
pub fn recommend_today(
    weekday: Weekday,
    available: &[WorkoutTemplate],
    system: &[WorkoutTemplate],
) -> Option<TodaysRecommendation> {
    for category in preferred_categories(weekday) {
        if let Some(template) = least_used(available.iter().filter(|t| t.category == *category)) {
            tracing::debug!(?weekday, %category, template = %template.name, "preferred category match");
            return Some(TodaysRecommendation {
                weekday,
                template: template.clone(),
                reason: RecommendationReason::Preferred {
                    category: *category,
                },
            });
        }
    }

    if let Some(template) = least_used(available) {
        tracing::debug!(?weekday, template = %template.name, "no preferred category, using least used");
        return Some(TodaysRecommendation {
            weekday,
            template: template.clone(),
            reason: RecommendationReason::AnyAvailable,
        });
    }

    for category in SAFE_CATEGORIES {
        let candidates = system
            .iter()
            .filter(|t| t.is_system() && t.category == category);
        if let Some(template) = least_used(candidates) {
            tracing::debug!(?weekday, %category, "falling back to system template");
            return Some(TodaysRecommendation {
                weekday,
                template: template.clone(),
                reason: RecommendationReason::SafeFallback { category },
            });
        }
    }

    tracing::debug!(?weekday, "no template to recommend");
    None
}

/// Up to `count` templates spanning categories: the least-used template of
/// each distinct category (in order of first appearance), then the remaining
/// slots from the overall least-used pool.
pub fn recommend_diverse(available: &[WorkoutTemplate], count: usize) -> Vec<WorkoutTemplate> {
    let mut categories: Vec<TemplateCategory> = Vec::new();
    for template in available {
        if !categories.contains(&template.category) {
            categories.push(template.category);
        }
    }

    let mut picked: Vec<&WorkoutTemplate> = Vec::new();
    for category in categories {
        if picked.len() >= count {
            break;
        }
        if let Some(template) = least_used(available.iter().filter(|t| t.category == category)) {
            picked.push(template);
        }
    }

    // Stable sort keeps listing order among equal usage counts
    let mut pool: Vec<&WorkoutTemplate> = available.iter().collect();
    pool.sort_by_key(|t| t.usage_count);
    for template in pool {
        if picked.len() >= count {
            break;
        }
        if !picked.iter().any(|p| p.id == template.id) {
            picked.push(template);
        }
    }

    picked.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Difficulty, SYSTEM_OWNER};
    use chrono::{TimeZone, Utc};

    fn template(name: &str, category: TemplateCategory, usage: u32) -> WorkoutTemplate {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut t = WorkoutTemplate::new(SYSTEM_OWNER, name, category, Difficulty::Beginner, now);
        t.usage_count = usage;
        t
    }

    fn names(templates: &[WorkoutTemplate]) -> Vec<&str> {
        templates.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_weekday_table_covers_every_day() {
        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            assert!(!preferred_categories(day).is_empty());
        }
    }

    #[test]
    fn test_preferred_category_lowest_usage() {
        let templates = vec![
            template("Push A", TemplateCategory::Push, 3),
            template("Push B", TemplateCategory::Push, 1),
            template("Push C", TemplateCategory::Push, 1),
            template("Legs", TemplateCategory::Legs, 0),
        ];
        let pick = recommend_today(Weekday::Mon, &templates, &[]).unwrap();
        assert_eq!(pick.template.name, "Push B");
        assert_eq!(
            pick.reason,
            RecommendationReason::Preferred {
                category: TemplateCategory::Push
            }
        );
    }

    #[test]
    fn test_second_preference_used() {
        let templates = vec![
            template("Legs", TemplateCategory::Legs, 0),
            template("Upper", TemplateCategory::UpperBody, 5),
        ];
        let pick = recommend_today(Weekday::Mon, &templates, &[]).unwrap();
        assert_eq!(pick.template.name, "Upper");
    }

    #[test]
    fn test_any_available_then_safe_fallback() {
        let templates = vec![
            template("Cardio", TemplateCategory::Cardio, 4),
            template("Custom", TemplateCategory::Custom, 2),
        ];
        let pick = recommend_today(Weekday::Tue, &templates, &[]).unwrap();
        assert_eq!(pick.template.name, "Custom");
        assert_eq!(pick.reason, RecommendationReason::AnyAvailable);

        let system = vec![
            template("Push", TemplateCategory::Push, 0),
            template("Full", TemplateCategory::FullBody, 9),
        ];
        let pick = recommend_today(Weekday::Tue, &[], &system).unwrap();
        assert_eq!(pick.template.name, "Full");

        let push_only = vec![template("Push", TemplateCategory::Push, 0)];
        let pick = recommend_today(Weekday::Tue, &[], &push_only).unwrap();
        assert_eq!(
            pick.reason,
            RecommendationReason::SafeFallback {
                category: TemplateCategory::Push
            }
        );

        assert!(recommend_today(Weekday::Tue, &[], &[]).is_none());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let templates = vec![
            template("A", TemplateCategory::FullBody, 2),
            template("B", TemplateCategory::FullBody, 2),
        ];
        for _ in 0..5 {
            let pick = recommend_today(Weekday::Fri, &templates, &[]).unwrap();
            assert_eq!(pick.template.name, "A");
        }
    }

    #[test]
    fn test_diverse_spans_categories_then_fills() {
        let templates = vec![
            template("Push A", TemplateCategory::Push, 5),
            template("Push B", TemplateCategory::Push, 0),
            template("Legs A", TemplateCategory::Legs, 2),
            template("Cardio", TemplateCategory::Cardio, 9),
            template("Legs B", TemplateCategory::Legs, 1),
        ];

        let three = recommend_diverse(&templates, 3);
        assert_eq!(names(&three), vec!["Push B", "Legs B", "Cardio"]);

        let five = recommend_diverse(&templates, 5);
        assert_eq!(names(&five), vec!["Push B", "Legs B", "Cardio", "Legs A", "Push A"]);

        let two = recommend_diverse(&templates, 2);
        assert_eq!(names(&two), vec!["Push B", "Legs B"]);

        assert!(recommend_diverse(&templates, 0).is_empty());
        assert_eq!(recommend_diverse(&templates, 10).len(), 5);
    }
}
