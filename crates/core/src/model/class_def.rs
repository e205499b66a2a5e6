use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::category::{Category, Difficulty};
use crate::model::grade::GradeLevel;
use crate::model::ids::ClassId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClassDefinitionError {
    #[error("class name cannot be empty")]
    EmptyName,

    #[error("minimum age {min} is greater than maximum age {max}")]
    InvalidAgeRange { min: u8, max: u8 },

    #[error("class must offer at least one category")]
    NoCategories,

    #[error("category {0} is listed more than once")]
    DuplicateCategory(Category),

    #[error("category {0} needs a question count of at least 1")]
    MissingQuestionCount(Category),

    #[error("category {0} has no difficulty level")]
    MissingDifficulty(Category),

    #[error("category {0} is configured but not offered by the class")]
    UnofferedCategory(Category),

    #[error("class {0} cannot be its own prerequisite")]
    SelfPrerequisite(ClassId),
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated class definition, as written in catalog files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinitionDraft {
    pub id: ClassId,
    pub level: GradeLevel,
    pub name: String,
    pub min_age: u8,
    pub max_age: u8,
    pub available_categories: Vec<Category>,
    pub question_counts: BTreeMap<Category, u32>,
    pub difficulty_levels: BTreeMap<Category, Difficulty>,
    #[serde(default)]
    pub prerequisite_class: Option<ClassId>,
    #[serde(default)]
    pub required_score: u32,
}

impl ClassDefinitionDraft {
    /// Validate the draft into an immutable `ClassDefinition`.
    ///
    /// # Errors
    ///
    /// Returns `ClassDefinitionError` when the name is blank, the age range is
    /// inverted, or the category configuration is incomplete or inconsistent.
    pub fn validate(self) -> Result<ClassDefinition, ClassDefinitionError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(ClassDefinitionError::EmptyName);
        }
        if self.min_age > self.max_age {
            return Err(ClassDefinitionError::InvalidAgeRange {
                min: self.min_age,
                max: self.max_age,
            });
        }
        if self.available_categories.is_empty() {
            return Err(ClassDefinitionError::NoCategories);
        }

        let mut seen = Vec::with_capacity(self.available_categories.len());
        for category in &self.available_categories {
            if seen.contains(category) {
                return Err(ClassDefinitionError::DuplicateCategory(*category));
            }
            seen.push(*category);

            match self.question_counts.get(category) {
                Some(count) if *count >= 1 => {}
                _ => return Err(ClassDefinitionError::MissingQuestionCount(*category)),
            }
            if !self.difficulty_levels.contains_key(category) {
                return Err(ClassDefinitionError::MissingDifficulty(*category));
            }
        }

        let stray = self
            .question_counts
            .keys()
            .chain(self.difficulty_levels.keys())
            .find(|category| !seen.contains(category));
        if let Some(category) = stray {
            return Err(ClassDefinitionError::UnofferedCategory(*category));
        }

        if self.prerequisite_class.as_ref() == Some(&self.id) {
            return Err(ClassDefinitionError::SelfPrerequisite(self.id));
        }

        Ok(ClassDefinition {
            id: self.id,
            level: self.level,
            name,
            min_age: self.min_age,
            max_age: self.max_age,
            available_categories: self.available_categories,
            question_counts: self.question_counts,
            difficulty_levels: self.difficulty_levels,
            prerequisite_class: self.prerequisite_class,
            required_score: self.required_score,
        })
    }
}

//
// ─── CLASS DEFINITION ──────────────────────────────────────────────────────────
//

/// Immutable definition of a grade-level class supplied by the catalog.
///
/// `required_score` is the minimum raw `current_score` the prerequisite class
/// must hold before this class can be unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ClassDefinitionDraft", into = "ClassDefinitionDraft")]
pub struct ClassDefinition {
    id: ClassId,
    level: GradeLevel,
    name: String,
    min_age: u8,
    max_age: u8,
    available_categories: Vec<Category>,
    question_counts: BTreeMap<Category, u32>,
    difficulty_levels: BTreeMap<Category, Difficulty>,
    prerequisite_class: Option<ClassId>,
    required_score: u32,
}

impl ClassDefinition {
    #[must_use]
    pub fn id(&self) -> &ClassId {
        &self.id
    }

    #[must_use]
    pub fn level(&self) -> GradeLevel {
        self.level
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn min_age(&self) -> u8 {
        self.min_age
    }

    #[must_use]
    pub fn max_age(&self) -> u8 {
        self.max_age
    }

    /// Categories in the order the catalog lists them.
    #[must_use]
    pub fn available_categories(&self) -> &[Category] {
        &self.available_categories
    }

    #[must_use]
    pub fn offers(&self, category: Category) -> bool {
        self.available_categories.contains(&category)
    }

    #[must_use]
    pub fn question_count(&self, category: Category) -> Option<u32> {
        self.question_counts.get(&category).copied()
    }

    #[must_use]
    pub fn difficulty(&self, category: Category) -> Option<Difficulty> {
        self.difficulty_levels.get(&category).copied()
    }

    #[must_use]
    pub fn prerequisite_class(&self) -> Option<&ClassId> {
        self.prerequisite_class.as_ref()
    }

    #[must_use]
    pub fn required_score(&self) -> u32 {
        self.required_score
    }

    #[must_use]
    pub fn suits_age(&self, age: u8) -> bool {
        (self.min_age..=self.max_age).contains(&age)
    }
}

impl TryFrom<ClassDefinitionDraft> for ClassDefinition {
    type Error = ClassDefinitionError;

    fn try_from(draft: ClassDefinitionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<ClassDefinition> for ClassDefinitionDraft {
    fn from(def: ClassDefinition) -> Self {
        Self {
            id: def.id,
            level: def.level,
            name: def.name,
            min_age: def.min_age,
            max_age: def.max_age,
            available_categories: def.available_categories,
            question_counts: def.question_counts,
            difficulty_levels: def.difficulty_levels,
            prerequisite_class: def.prerequisite_class,
            required_score: def.required_score,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
