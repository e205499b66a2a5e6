//! Score aggregation for a learner's class record.
//!
//! A class counts as complete only when both conditions hold:
//! at least 80% of its categories are marked complete, and the summed
//! category scores reach 80% of the class maximum. Deep mastery of a few
//! categories or shallow coverage of all of them is not enough on its own.

use crate::model::{Category, CategoryCompletion, CategoryScores, ClassDefinition};

/// Points awarded per question.
pub const POINTS_PER_QUESTION: u32 = 10;

/// Minimum share of completed categories, in percent.
pub const COMPLETION_THRESHOLD_PERCENT: f64 = 80.0;

/// Minimum share of the maximum score.
pub const SCORE_THRESHOLD_RATIO: f64 = 0.8;

/// Totals derived from a record's category maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionSnapshot {
    pub total_score: u32,
    pub completion_percentage: f64,
}

/// Maximum score of a class: `question_count * 10` summed over its categories.
#[must_use]
pub fn compute_max_score(class: &ClassDefinition) -> u32 {
    class
        .available_categories()
        .iter()
        .filter_map(|category| category_max_score(class, *category))
        .fold(0_u32, u32::saturating_add)
}

/// Maximum score for one category, or `None` if the class does not offer it.
#[must_use]
pub fn category_max_score(class: &ClassDefinition, category: Category) -> Option<u32> {
    if !class.offers(category) {
        return None;
    }
    class
        .question_count(category)
        .map(|count| count.saturating_mul(POINTS_PER_QUESTION))
}

/// Sum the category scores and compute the share of completed categories.
///
/// The category count is the size of `completion`; an empty map yields 0%.
#[must_use]
pub fn compute_completion(
    scores: &CategoryScores,
    completion: &CategoryCompletion,
) -> CompletionSnapshot {
    let total_score = scores.values().copied().fold(0_u32, u32::saturating_add);

    let categories = completion.len();
    let completion_percentage = if categories == 0 {
        0.0
    } else {
        let done = completion.values().filter(|done| **done).count();
        // Category counts are tiny; the casts are exact.
        #[allow(clippy::cast_precision_loss)]
        let pct = 100.0 * done as f64 / categories as f64;
        pct
    };

    CompletionSnapshot {
        total_score,
        completion_percentage,
    }
}

/// `true` iff coverage is at least 80% and the score is at least 80% of `max_score`.
#[must_use]
pub fn is_class_complete(completion_percentage: f64, total_score: u32, max_score: u32) -> bool {
    completion_percentage >= COMPLETION_THRESHOLD_PERCENT
        && f64::from(total_score) >= SCORE_THRESHOLD_RATIO * f64::from(max_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassDefinitionDraft, ClassId, Difficulty, GradeLevel};
    use std::collections::BTreeMap;

    fn class(counts: &[(Category, u32)]) -> ClassDefinition {
        ClassDefinitionDraft {
            id: ClassId::new("c").unwrap(),
            level: GradeLevel::Grade4,
            name: "C".into(),
            min_age: 9,
            max_age: 10,
            available_categories: counts.iter().map(|(c, _)| *c).collect(),
            question_counts: counts.iter().copied().collect(),
            difficulty_levels: counts.iter().map(|(c, _)| (*c, Difficulty::Medium)).collect(),
            prerequisite_class: None,
            required_score: 0,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn max_score_sums_question_counts() {
        let c = class(&[(Category::Arithmetic, 20), (Category::Geometry, 5)]);
        assert_eq!(compute_max_score(&c), 250);
        assert_eq!(category_max_score(&c, Category::Geometry), Some(50));
        assert_eq!(category_max_score(&c, Category::Algebra), None);
    }

    #[test]
    fn completion_of_empty_maps_is_zero() {
        let snap = compute_completion(&BTreeMap::new(), &BTreeMap::new());
        assert_eq!(snap.total_score, 0);
        assert!(snap.completion_percentage.abs() < f64::EPSILON);
    }

    #[test]
    fn single_category_at_threshold_completes() {
        let scores = BTreeMap::from([(Category::Arithmetic, 160)]);
        let done = BTreeMap::from([(Category::Arithmetic, true)]);
        let snap = compute_completion(&scores, &done);
        assert_eq!(snap.total_score, 160);
        assert!((snap.completion_percentage - 100.0).abs() < f64::EPSILON);
        assert!(is_class_complete(snap.completion_percentage, 160, 200));
        assert!(!is_class_complete(snap.completion_percentage, 159, 200));
    }

    #[test]
    fn coverage_and_score_are_both_required() {
        // Deep mastery of half the categories.
        assert!(!is_class_complete(50.0, 200, 200));
        // Every category touched, low score.
        assert!(!is_class_complete(100.0, 40, 200));
        assert!(is_class_complete(80.0, 160, 200));
    }
}
