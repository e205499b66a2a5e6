use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::category::Category;
use crate::model::class_def::ClassDefinition;
use crate::model::ids::{ClassId, UserId};
use crate::scoring;

pub type CategoryScores = BTreeMap<Category, u32>;
pub type CategoryCompletion = BTreeMap<Category, bool>;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessError {
    #[error("class {class_id} does not offer category {category}")]
    CategoryNotOffered { class_id: ClassId, category: Category },

    #[error("score {score} for {category} exceeds the category maximum of {max}")]
    ScoreAboveMaximum { category: Category, score: u32, max: u32 },

    #[error("category totals of {total} exceed the class maximum of {max}")]
    TotalAboveMaximum { total: u32, max: u32 },

    #[error("class {0} is locked")]
    ClassLocked(ClassId),

    #[error("record for {record} cannot be updated with definition of {definition}")]
    ClassMismatch { record: ClassId, definition: ClassId },

    #[error("invalid persisted access state: {0}")]
    InvalidPersistedState(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Where a class sits in a learner's progression.
///
/// `Completed` is terminal: no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    Locked,
    Unlocked,
    Active,
    Completed,
}

impl AccessStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AccessStatus::Locked => "locked",
            AccessStatus::Unlocked => "unlocked",
            AccessStatus::Active => "active",
            AccessStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── PROGRESS CHANGE ───────────────────────────────────────────────────────────
//

/// What a single category update did to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressChange {
    /// Scores were updated; status did not change.
    Updated,
    /// This update pushed the class over the completion threshold.
    Completed,
}

//
// ─── USER CLASS ACCESS ─────────────────────────────────────────────────────────
//

/// A learner's access and progress for one class.
#[derive(Debug, Clone, PartialEq)]
pub struct UserClassAccess {
    user_id: UserId,
    class_id: ClassId,
    status: AccessStatus,
    current_score: u32,
    max_score: u32,
    completion_percentage: f64,
    category_scores: CategoryScores,
    category_completion: CategoryCompletion,
    unlocked_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    achievements: Vec<String>,
    is_active: bool,
}

impl UserClassAccess {
    /// Fresh record created at registration time.
    ///
    /// Category maps are seeded with every category the class offers (score 0,
    /// not completed). `Unlocked` and `Active` records get `unlocked_at = now`.
    #[must_use]
    pub fn for_registration(
        user_id: UserId,
        class: &ClassDefinition,
        status: AccessStatus,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let category_scores = class
            .available_categories()
            .iter()
            .map(|c| (*c, 0))
            .collect();
        let category_completion = class
            .available_categories()
            .iter()
            .map(|c| (*c, false))
            .collect();
        let unlocked_at = match status {
            AccessStatus::Locked => None,
            _ => Some(now),
        };

        Self {
            user_id,
            class_id: class.id().clone(),
            status,
            current_score: 0,
            max_score: scoring::compute_max_score(class),
            completion_percentage: 0.0,
            category_scores,
            category_completion,
            unlocked_at,
            completed_at: None,
            achievements: Vec::new(),
            is_active,
        }
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidPersistedState` if the stored values
    /// contradict each other (score above maximum, percentage out of range,
    /// mismatched category maps, or a completed record without a timestamp).
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        class_id: ClassId,
        status: AccessStatus,
        current_score: u32,
        max_score: u32,
        completion_percentage: f64,
        category_scores: CategoryScores,
        category_completion: CategoryCompletion,
        unlocked_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        achievements: Vec<String>,
        is_active: bool,
    ) -> Result<Self, AccessError> {
        if current_score > max_score {
            return Err(AccessError::InvalidPersistedState(format!(
                "current score {current_score} exceeds max score {max_score}"
            )));
        }
        if !completion_percentage.is_finite() || !(0.0..=100.0).contains(&completion_percentage)
        {
            return Err(AccessError::InvalidPersistedState(format!(
                "completion percentage {completion_percentage} out of range"
            )));
        }
        if !category_scores.keys().eq(category_completion.keys()) {
            return Err(AccessError::InvalidPersistedState(
                "category score and completion maps cover different categories".into(),
            ));
        }
        if status == AccessStatus::Completed && completed_at.is_none() {
            return Err(AccessError::InvalidPersistedState(
                "completed record has no completion timestamp".into(),
            ));
        }

        Ok(Self {
            user_id,
            class_id,
            status,
            current_score,
            max_score,
            completion_percentage,
            category_scores,
            category_completion,
            unlocked_at,
            completed_at,
            achievements,
            is_active,
        })
    }

    /// Overwrite one category's result and recompute totals and status.
    ///
    /// Last write wins per category. Status only ever moves forward into
    /// `Completed`; a lower score on an already completed class leaves it
    /// completed.
    ///
    /// # Errors
    ///
    /// Returns `AccessError` if the record is locked, the definition belongs to
    /// another class, the class does not offer `category`, `score` is above
    /// the category maximum, or the stored categories would add up to more
    /// than the class maximum. A rejected update leaves the record unchanged.
    pub fn apply_category_result(
        &mut self,
        class: &ClassDefinition,
        category: Category,
        score: u32,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<ProgressChange, AccessError> {
        if class.id() != &self.class_id {
            return Err(AccessError::ClassMismatch {
                record: self.class_id.clone(),
                definition: class.id().clone(),
            });
        }
        if self.status == AccessStatus::Locked {
            return Err(AccessError::ClassLocked(self.class_id.clone()));
        }
        let max = scoring::category_max_score(class, category).ok_or_else(|| {
            AccessError::CategoryNotOffered {
                class_id: self.class_id.clone(),
                category,
            }
        })?;
        if score > max {
            return Err(AccessError::ScoreAboveMaximum {
                category,
                score,
                max,
            });
        }

        // The definition may have changed since registration: re-derive the
        // maximum and seed newly offered categories before aggregating.
        let max_score = scoring::compute_max_score(class);
        let mut category_scores = self.category_scores.clone();
        let mut category_completion = self.category_completion.clone();
        for offered in class.available_categories() {
            category_scores.entry(*offered).or_insert(0);
            category_completion.entry(*offered).or_insert(false);
        }
        category_scores.insert(category, score);
        category_completion.insert(category, completed);

        let snapshot = scoring::compute_completion(&category_scores, &category_completion);
        if snapshot.total_score > max_score {
            return Err(AccessError::TotalAboveMaximum {
                total: snapshot.total_score,
                max: max_score,
            });
        }

        self.category_scores = category_scores;
        self.category_completion = category_completion;
        self.max_score = max_score;
        self.current_score = snapshot.total_score;
        self.completion_percentage = snapshot.completion_percentage;

        if self.status != AccessStatus::Completed
            && scoring::is_class_complete(
                self.completion_percentage,
                self.current_score,
                self.max_score,
            )
        {
            self.status = AccessStatus::Completed;
            self.completed_at = Some(now);
            self.award(format!("{}:completed", self.class_id));
            if self.current_score == self.max_score {
                self.award(format!("{}:perfect", self.class_id));
            }
            return Ok(ProgressChange::Completed);
        }

        Ok(ProgressChange::Updated)
    }

    /// Make this the learner's active class.
    ///
    /// A completed class stays `Completed`; anything else becomes `Active`.
    pub fn activate(&mut self, now: DateTime<Utc>) {
        if self.status != AccessStatus::Completed {
            self.status = AccessStatus::Active;
        }
        if self.unlocked_at.is_none() {
            self.unlocked_at = Some(now);
        }
        self.is_active = true;
    }

    /// Step down from active. Progress is kept; a completed class stays completed.
    pub fn demote(&mut self) {
        if self.status != AccessStatus::Completed {
            self.status = AccessStatus::Unlocked;
        }
        self.is_active = false;
    }

    fn award(&mut self, achievement: String) {
        if !self.achievements.contains(&achievement) {
            self.achievements.push(achievement);
        }
    }

    // Accessors
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    #[must_use]
    pub fn status(&self) -> AccessStatus {
        self.status
    }

    #[must_use]
    pub fn current_score(&self) -> u32 {
        self.current_score
    }

    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    #[must_use]
    pub fn completion_percentage(&self) -> f64 {
        self.completion_percentage
    }

    #[must_use]
    pub fn category_scores(&self) -> &CategoryScores {
        &self.category_scores
    }

    #[must_use]
    pub fn category_completion(&self) -> &CategoryCompletion {
        &self.category_completion
    }

    #[must_use]
    pub fn unlocked_at(&self) -> Option<DateTime<Utc>> {
        self.unlocked_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn achievements(&self) -> &[String] {
        &self.achievements
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.status == AccessStatus::Locked
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::category::Difficulty;
    use crate::model::class_def::ClassDefinitionDraft;
    use crate::model::grade::GradeLevel;
    use crate::scoring::{COMPLETION_THRESHOLD_PERCENT, SCORE_THRESHOLD_RATIO};
    use crate::time::fixed_now;
    use proptest::prelude::*;

    fn two_category_class() -> ClassDefinition {
        ClassDefinitionDraft {
            id: ClassId::new("grade3_math").unwrap(),
            level: GradeLevel::Grade3,
            name: "Grade 3 Mathematics".into(),
            min_age: 8,
            max_age: 9,
            available_categories: vec![Category::Arithmetic, Category::Fractions],
            question_counts: BTreeMap::from([(Category::Arithmetic, 10), (Category::Fractions, 10)]),
            difficulty_levels: BTreeMap::from([
                (Category::Arithmetic, Difficulty::Medium),
                (Category::Fractions, Difficulty::Easy),
            ]),
            prerequisite_class: None,
            required_score: 0,
        }
        .validate()
        .unwrap()
    }

    fn active_record(class: &ClassDefinition) -> UserClassAccess {
        UserClassAccess::for_registration(
            UserId::new("u1").unwrap(),
            class,
            AccessStatus::Active,
            true,
            fixed_now(),
        )
    }

    #[test]
    fn registration_seeds_zeroed_maps() {
        let class = two_category_class();
        let record = active_record(&class);
        assert_eq!(record.max_score(), 200);
        assert_eq!(record.category_scores().len(), 2);
        assert!(record.category_completion().values().all(|done| !done));
        assert_eq!(record.unlocked_at(), Some(fixed_now()));

        let locked = UserClassAccess::for_registration(
            UserId::new("u1").unwrap(),
            &class,
            AccessStatus::Locked,
            false,
            fixed_now(),
        );
        assert_eq!(locked.unlocked_at(), None);
    }

    #[test]
    fn half_coverage_does_not_complete() {
        let class = two_category_class();
        let mut record = active_record(&class);
        let change = record
            .apply_category_result(&class, Category::Arithmetic, 100, true, fixed_now())
            .unwrap();
        assert_eq!(change, ProgressChange::Updated);
        assert!((record.completion_percentage() - 50.0).abs() < f64::EPSILON);
        assert_eq!(record.status(), AccessStatus::Active);
    }

    #[test]
    fn full_marks_complete_with_achievements() {
        let class = two_category_class();
        let mut record = active_record(&class);
        record
            .apply_category_result(&class, Category::Arithmetic, 100, true, fixed_now())
            .unwrap();
        let change = record
            .apply_category_result(&class, Category::Fractions, 100, true, fixed_now())
            .unwrap();
        assert_eq!(change, ProgressChange::Completed);
        assert_eq!(record.status(), AccessStatus::Completed);
        assert_eq!(record.completed_at(), Some(fixed_now()));
        assert_eq!(
            record.achievements(),
            ["grade3_math:completed", "grade3_math:perfect"]
        );
    }

    #[test]
    fn completed_is_terminal() {
        let class = two_category_class();
        let mut record = active_record(&class);
        record
            .apply_category_result(&class, Category::Arithmetic, 90, true, fixed_now())
            .unwrap();
        record
            .apply_category_result(&class, Category::Fractions, 80, true, fixed_now())
            .unwrap();
        assert_eq!(record.status(), AccessStatus::Completed);

        let change = record
            .apply_category_result(&class, Category::Fractions, 0, false, fixed_now())
            .unwrap();
        assert_eq!(change, ProgressChange::Updated);
        assert_eq!(record.status(), AccessStatus::Completed);
        assert_eq!(record.current_score(), 90);

        record.demote();
        assert_eq!(record.status(), AccessStatus::Completed);
        assert!(!record.is_active());
    }

    #[test]
    fn rejects_unoffered_category_and_excess_score() {
        let class = two_category_class();
        let mut record = active_record(&class);
        let err = record
            .apply_category_result(&class, Category::Calculus, 10, true, fixed_now())
            .unwrap_err();
        assert!(matches!(err, AccessError::CategoryNotOffered { .. }));

        let err = record
            .apply_category_result(&class, Category::Arithmetic, 101, true, fixed_now())
            .unwrap_err();
        assert_eq!(
            err,
            AccessError::ScoreAboveMaximum {
                category: Category::Arithmetic,
                score: 101,
                max: 100
            }
        );
    }

    fn arithmetic_class(questions: u32) -> ClassDefinition {
        ClassDefinitionDraft {
            id: ClassId::new("grade3_math").unwrap(),
            level: GradeLevel::Grade3,
            name: "Grade 3 Mathematics".into(),
            min_age: 8,
            max_age: 9,
            available_categories: vec![Category::Arithmetic],
            question_counts: BTreeMap::from([(Category::Arithmetic, questions)]),
            difficulty_levels: BTreeMap::from([(Category::Arithmetic, Difficulty::Medium)]),
            prerequisite_class: None,
            required_score: 0,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn max_score_follows_current_definition() {
        let mut record = active_record(&arithmetic_class(20));
        assert_eq!(record.max_score(), 200);

        let grown = arithmetic_class(30);
        record
            .apply_category_result(&grown, Category::Arithmetic, 250, true, fixed_now())
            .unwrap();
        assert_eq!(record.max_score(), 300);
        assert_eq!(record.current_score(), 250);
        assert_eq!(
            record.current_score(),
            record.category_scores().values().sum::<u32>()
        );
        assert_eq!(record.status(), AccessStatus::Completed);
    }

    #[test]
    fn newly_offered_category_counts_toward_coverage() {
        let mut record = active_record(&arithmetic_class(10));
        let widened = two_category_class();
        let change = record
            .apply_category_result(&widened, Category::Arithmetic, 100, true, fixed_now())
            .unwrap();
        assert_eq!(change, ProgressChange::Updated);
        assert!(!record.category_completion()[&Category::Fractions]);
        assert!((record.completion_percentage() - 50.0).abs() < f64::EPSILON);
        assert_eq!(record.max_score(), 200);
    }

    #[test]
    fn totals_above_shrunken_maximum_are_rejected() {
        let wide = two_category_class();
        let mut record = active_record(&wide);
        record
            .apply_category_result(&wide, Category::Fractions, 100, false, fixed_now())
            .unwrap();
        let before = record.clone();

        let narrowed = arithmetic_class(10);
        let err = record
            .apply_category_result(&narrowed, Category::Arithmetic, 100, true, fixed_now())
            .unwrap_err();
        assert_eq!(err, AccessError::TotalAboveMaximum { total: 200, max: 100 });
        assert_eq!(record, before);
    }

    #[test]
    fn locked_record_rejects_progress() {
        let class = two_category_class();
        let mut record = UserClassAccess::for_registration(
            UserId::new("u1").unwrap(),
            &class,
            AccessStatus::Locked,
            false,
            fixed_now(),
        );
        let err = record
            .apply_category_result(&class, Category::Arithmetic, 10, true, fixed_now())
            .unwrap_err();
        assert!(matches!(err, AccessError::ClassLocked(_)));
    }

    #[test]
    fn activate_and_demote() {
        let class = two_category_class();
        let mut record = UserClassAccess::for_registration(
            UserId::new("u1").unwrap(),
            &class,
            AccessStatus::Locked,
            false,
            fixed_now(),
        );
        record.activate(fixed_now());
        assert_eq!(record.status(), AccessStatus::Active);
        assert!(record.is_active());
        assert_eq!(record.unlocked_at(), Some(fixed_now()));

        record.demote();
        assert_eq!(record.status(), AccessStatus::Unlocked);
        assert!(!record.is_active());
    }

    #[test]
    fn from_persisted_rejects_inconsistent_state() {
        let err = UserClassAccess::from_persisted(
            UserId::new("u1").unwrap(),
            ClassId::new("c").unwrap(),
            AccessStatus::Active,
            300,
            200,
            0.0,
            CategoryScores::new(),
            CategoryCompletion::new(),
            None,
            None,
            Vec::new(),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, AccessError::InvalidPersistedState(_)));

        let err = UserClassAccess::from_persisted(
            UserId::new("u1").unwrap(),
            ClassId::new("c").unwrap(),
            AccessStatus::Completed,
            200,
            200,
            100.0,
            CategoryScores::new(),
            CategoryCompletion::new(),
            None,
            None,
            Vec::new(),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, AccessError::InvalidPersistedState(_)));
    }

    proptest! {
        #[test]
        fn completes_only_past_both_thresholds_and_stays_completed(
            steps in proptest::collection::vec(
                (
                    proptest::sample::select(vec![Category::Arithmetic, Category::Fractions]),
                    0_u32..=100,
                    any::<bool>(),
                ),
                1..40,
            ),
        ) {
            let class = two_category_class();
            let mut record = active_record(&class);
            let mut completions = 0;

            for (category, score, completed) in steps {
                let change = record
                    .apply_category_result(&class, category, score, completed, fixed_now())
                    .unwrap();
                if change == ProgressChange::Completed {
                    completions += 1;
                    prop_assert!(record.completion_percentage() >= COMPLETION_THRESHOLD_PERCENT);
                    prop_assert!(
                        f64::from(record.current_score())
                            >= SCORE_THRESHOLD_RATIO * f64::from(record.max_score())
                    );
                }
                prop_assert!(completions <= 1);
                prop_assert_eq!(record.status() == AccessStatus::Completed, completions == 1);
                prop_assert_eq!(
                    record.current_score(),
                    record.category_scores().values().sum::<u32>()
                );
            }
        }
    }
}
