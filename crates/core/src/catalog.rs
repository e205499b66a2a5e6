use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::model::{
    Category, ClassDefinition, ClassDefinitionDraft, ClassDefinitionError, ClassId, Difficulty,
    GradeLevel, IdError,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("class not found: {0}")]
    NotFound(ClassId),

    #[error("catalog has no classes")]
    Empty,

    #[error("class id {0} is defined more than once")]
    DuplicateId(ClassId),

    #[error("class {class} requires unknown prerequisite {prerequisite}")]
    MissingPrerequisite { class: ClassId, prerequisite: ClassId },

    #[error("prerequisite cycle through class {0}")]
    Cycle(ClassId),

    #[error(transparent)]
    Definition(#[from] ClassDefinitionError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error("invalid catalog document: {0}")]
    Parse(String),
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Read-only, validated set of class definitions.
///
/// Guarantees unique ids, resolvable prerequisites, and an acyclic
/// prerequisite relation. Treated as configuration: build once and share.
#[derive(Debug, Clone)]
pub struct ClassCatalog {
    classes: Vec<ClassDefinition>,
    index: HashMap<ClassId, usize>,
}

impl ClassCatalog {
    /// Build a catalog, preserving the given order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the list is empty, an id repeats, a
    /// prerequisite is unknown, or prerequisites form a cycle.
    pub fn new(classes: Vec<ClassDefinition>) -> Result<Self, CatalogError> {
        if classes.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut index = HashMap::with_capacity(classes.len());
        for (pos, class) in classes.iter().enumerate() {
            if index.insert(class.id().clone(), pos).is_some() {
                return Err(CatalogError::DuplicateId(class.id().clone()));
            }
        }

        for class in &classes {
            if let Some(prerequisite) = class.prerequisite_class() {
                if !index.contains_key(prerequisite) {
                    return Err(CatalogError::MissingPrerequisite {
                        class: class.id().clone(),
                        prerequisite: prerequisite.clone(),
                    });
                }
            }
        }

        check_acyclic(&classes, &index)?;

        Ok(Self { classes, index })
    }

    /// Parse a JSON array of class definitions.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed JSON or invalid definitions,
    /// and the structural errors of [`ClassCatalog::new`].
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let classes: Vec<ClassDefinition> =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(classes)
    }

    /// Every class in catalog order.
    #[must_use]
    pub fn available_classes(&self) -> &[ClassDefinition] {
        &self.classes
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no class has this id.
    pub fn get_class(&self, id: &ClassId) -> Result<&ClassDefinition, CatalogError> {
        self.index
            .get(id)
            .map(|pos| &self.classes[*pos])
            .ok_or_else(|| CatalogError::NotFound(id.clone()))
    }

    pub fn classes_at_level(&self, level: GradeLevel) -> impl Iterator<Item = &ClassDefinition> {
        self.classes.iter().filter(move |class| class.level() == level)
    }

    #[must_use]
    pub fn contains(&self, id: &ClassId) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Built-in mathematics track: one class per grade, each requiring the
    /// grade below.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the built-in table fails the same validation
    /// as any other catalog.
    pub fn standard() -> Result<Self, CatalogError> {
        let classes = STANDARD_TRACK
            .iter()
            .map(|class| Ok(class.draft()?.validate()?))
            .collect::<Result<Vec<_>, CatalogError>>()?;
        Self::new(classes)
    }
}

fn check_acyclic(
    classes: &[ClassDefinition],
    index: &HashMap<ClassId, usize>,
) -> Result<(), CatalogError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; classes.len()];
    for start in 0..classes.len() {
        let mut path = Vec::new();
        let mut current = Some(start);
        while let Some(pos) = current {
            match marks[pos] {
                Mark::Done => break,
                Mark::InProgress => return Err(CatalogError::Cycle(classes[pos].id().clone())),
                Mark::Unvisited => {
                    marks[pos] = Mark::InProgress;
                    path.push(pos);
                    current = classes[pos]
                        .prerequisite_class()
                        .and_then(|id| index.get(id).copied());
                }
            }
        }
        for pos in path {
            marks[pos] = Mark::Done;
        }
    }
    Ok(())
}

//
// ─── BUILT-IN DATA ─────────────────────────────────────────────────────────────
//

struct StandardClass {
    id: &'static str,
    level: GradeLevel,
    name: &'static str,
    ages: (u8, u8),
    categories: &'static [(Category, u32, Difficulty)],
    prerequisite: Option<&'static str>,
    required_score: u32,
}

impl StandardClass {
    fn draft(&self) -> Result<ClassDefinitionDraft, IdError> {
        Ok(ClassDefinitionDraft {
            id: ClassId::new(self.id)?,
            level: self.level,
            name: self.name.to_owned(),
            min_age: self.ages.0,
            max_age: self.ages.1,
            available_categories: self.categories.iter().map(|(c, _, _)| *c).collect(),
            question_counts: self
                .categories
                .iter()
                .map(|(c, n, _)| (*c, *n))
                .collect::<BTreeMap<_, _>>(),
            difficulty_levels: self
                .categories
                .iter()
                .map(|(c, _, d)| (*c, *d))
                .collect::<BTreeMap<_, _>>(),
            prerequisite_class: self.prerequisite.map(ClassId::new).transpose()?,
            required_score: self.required_score,
        })
    }
}

use Category::{
    Algebra, Arithmetic, Calculus, Counting, DataAnalysis, Decimals, Fractions, Geometry,
    Measurement, Probability, Statistics, Trigonometry, WordProblems,
};
use Difficulty::{Advanced, Beginner, Easy, Hard, Medium};

const STANDARD_TRACK: &[StandardClass] = &[
    StandardClass {
        id: "pre_k_math",
        level: GradeLevel::PreK,
        name: "Pre-K Mathematics",
        ages: (3, 4),
        categories: &[(Counting, 10, Beginner), (Geometry, 5, Beginner)],
        prerequisite: None,
        required_score: 0,
    },
    StandardClass {
        id: "kindergarten_math",
        level: GradeLevel::Kindergarten,
        name: "Kindergarten Mathematics",
        ages: (5, 6),
        categories: &[
            (Counting, 10, Beginner),
            (Arithmetic, 5, Beginner),
            (Geometry, 5, Beginner),
        ],
        prerequisite: Some("pre_k_math"),
        required_score: 125,
    },
    StandardClass {
        id: "grade1_math",
        level: GradeLevel::Grade1,
        name: "Grade 1 Mathematics",
        ages: (6, 7),
        categories: &[(Arithmetic, 20, Easy)],
        prerequisite: Some("kindergarten_math"),
        required_score: 170,
    },
    StandardClass {
        id: "grade2_math",
        level: GradeLevel::Grade2,
        name: "Grade 2 Mathematics",
        ages: (7, 8),
        categories: &[
            (Arithmetic, 15, Easy),
            (Geometry, 5, Easy),
            (WordProblems, 5, Easy),
        ],
        prerequisite: Some("grade1_math"),
        required_score: 170,
    },
    StandardClass {
        id: "grade3_math",
        level: GradeLevel::Grade3,
        name: "Grade 3 Mathematics",
        ages: (8, 9),
        categories: &[
            (Arithmetic, 15, Medium),
            (Fractions, 10, Easy),
            (Measurement, 5, Easy),
            (WordProblems, 10, Medium),
        ],
        prerequisite: Some("grade2_math"),
        required_score: 210,
    },
    StandardClass {
        id: "grade4_math",
        level: GradeLevel::Grade4,
        name: "Grade 4 Mathematics",
        ages: (9, 10),
        categories: &[
            (Arithmetic, 10, Medium),
            (Fractions, 10, Medium),
            (Decimals, 10, Easy),
            (Geometry, 10, Medium),
            (WordProblems, 10, Medium),
        ],
        prerequisite: Some("grade3_math"),
        required_score: 340,
    },
    StandardClass {
        id: "grade5_math",
        level: GradeLevel::Grade5,
        name: "Grade 5 Mathematics",
        ages: (10, 11),
        categories: &[
            (Fractions, 10, Hard),
            (Decimals, 10, Medium),
            (Geometry, 10, Medium),
            (Measurement, 10, Medium),
            (DataAnalysis, 10, Easy),
        ],
        prerequisite: Some("grade4_math"),
        required_score: 425,
    },
    StandardClass {
        id: "grade6_math",
        level: GradeLevel::Grade6,
        name: "Grade 6 Mathematics",
        ages: (11, 12),
        categories: &[
            (Fractions, 10, Hard),
            (Algebra, 10, Easy),
            (Geometry, 10, Medium),
            (DataAnalysis, 10, Medium),
            (WordProblems, 10, Hard),
        ],
        prerequisite: Some("grade5_math"),
        required_score: 425,
    },
    StandardClass {
        id: "grade7_math",
        level: GradeLevel::Grade7,
        name: "Grade 7 Mathematics",
        ages: (12, 13),
        categories: &[
            (Algebra, 15, Medium),
            (Geometry, 10, Medium),
            (Probability, 10, Easy),
            (Statistics, 10, Easy),
            (WordProblems, 5, Hard),
        ],
        prerequisite: Some("grade6_math"),
        required_score: 425,
    },
    StandardClass {
        id: "grade8_math",
        level: GradeLevel::Grade8,
        name: "Grade 8 Mathematics",
        ages: (13, 14),
        categories: &[
            (Algebra, 20, Medium),
            (Geometry, 15, Hard),
            (Statistics, 10, Medium),
            (Probability, 5, Medium),
        ],
        prerequisite: Some("grade7_math"),
        required_score: 425,
    },
    StandardClass {
        id: "grade9_math",
        level: GradeLevel::Grade9,
        name: "Grade 9 Mathematics",
        ages: (14, 15),
        categories: &[
            (Algebra, 20, Hard),
            (Geometry, 10, Medium),
            (Statistics, 10, Medium),
            (DataAnalysis, 10, Medium),
        ],
        prerequisite: Some("grade8_math"),
        required_score: 425,
    },
    StandardClass {
        id: "grade10_math",
        level: GradeLevel::Grade10,
        name: "Grade 10 Mathematics",
        ages: (15, 16),
        categories: &[
            (Geometry, 20, Hard),
            (Algebra, 10, Hard),
            (Trigonometry, 10, Easy),
            (Probability, 10, Medium),
        ],
        prerequisite: Some("grade9_math"),
        required_score: 425,
    },
    StandardClass {
        id: "grade11_math",
        level: GradeLevel::Grade11,
        name: "Grade 11 Mathematics",
        ages: (16, 17),
        categories: &[
            (Algebra, 15, Advanced),
            (Trigonometry, 15, Hard),
            (Statistics, 10, Hard),
            (Probability, 10, Hard),
        ],
        prerequisite: Some("grade10_math"),
        required_score: 425,
    },
    StandardClass {
        id: "grade12_math",
        level: GradeLevel::Grade12,
        name: "Grade 12 Mathematics",
        ages: (17, 18),
        categories: &[
            (Calculus, 20, Hard),
            (Trigonometry, 10, Advanced),
            (Statistics, 10, Advanced),
            (Algebra, 10, Advanced),
        ],
        prerequisite: Some("grade11_math"),
        required_score: 425,
    },
];

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::compute_max_score;

    fn def(id: &str, prerequisite: Option<&str>) -> ClassDefinition {
        ClassDefinitionDraft {
            id: ClassId::new(id).unwrap(),
            level: GradeLevel::Grade1,
            name: id.to_uppercase(),
            min_age: 6,
            max_age: 7,
            available_categories: vec![Arithmetic],
            question_counts: BTreeMap::from([(Arithmetic, 20)]),
            difficulty_levels: BTreeMap::from([(Arithmetic, Easy)]),
            prerequisite_class: prerequisite.map(|p| ClassId::new(p).unwrap()),
            required_score: 0,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn standard_catalog_covers_every_grade() {
        let catalog = ClassCatalog::standard().unwrap();
        assert_eq!(catalog.len(), GradeLevel::ALL.len());
        for level in GradeLevel::ALL {
            assert_eq!(catalog.classes_at_level(level).count(), 1, "{level}");
        }
        let first = &catalog.available_classes()[0];
        assert_eq!(first.level(), GradeLevel::PreK);
        assert_eq!(first.prerequisite_class(), None);
    }

    #[test]
    fn standard_catalog_chains_previous_grade() {
        let catalog = ClassCatalog::standard().unwrap();
        for class in catalog.available_classes() {
            let Some(prerequisite) = class.prerequisite_class() else {
                continue;
            };
            let prerequisite = catalog.get_class(prerequisite).unwrap();
            assert_eq!(Some(prerequisite.level()), class.level().previous());
            assert!(class.required_score() <= compute_max_score(prerequisite));
        }
    }

    #[test]
    fn standard_grade1_matches_documented_shape() {
        let catalog = ClassCatalog::standard().unwrap();
        let grade1 = catalog.get_class(&ClassId::new("grade1_math").unwrap()).unwrap();
        assert_eq!(grade1.available_categories(), [Arithmetic]);
        assert_eq!(compute_max_score(grade1), 200);

        let grade2 = catalog.get_class(&ClassId::new("grade2_math").unwrap()).unwrap();
        assert_eq!(grade2.prerequisite_class(), Some(grade1.id()));
        assert_eq!(grade2.required_score(), 170);
    }

    #[test]
    fn get_class_reports_not_found() {
        let catalog = ClassCatalog::standard().unwrap();
        let missing = ClassId::new("grade13_math").unwrap();
        assert_eq!(
            catalog.get_class(&missing).unwrap_err(),
            CatalogError::NotFound(missing)
        );
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert_eq!(ClassCatalog::new(vec![]).unwrap_err(), CatalogError::Empty);
        let err = ClassCatalog::new(vec![def("a", None), def("a", None)]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(_)));
    }

    #[test]
    fn rejects_unknown_prerequisite() {
        let err = ClassCatalog::new(vec![def("b", Some("a"))]).unwrap_err();
        assert!(matches!(err, CatalogError::MissingPrerequisite { .. }));
    }

    #[test]
    fn rejects_prerequisite_cycle() {
        let err = ClassCatalog::new(vec![
            def("root", None),
            def("a", Some("c")),
            def("b", Some("a")),
            def("c", Some("b")),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::Cycle(_)));
    }

    #[test]
    fn accepts_shared_prerequisite() {
        let catalog = ClassCatalog::new(vec![
            def("a", None),
            def("b", Some("a")),
            def("c", Some("a")),
        ])
        .unwrap();
        assert!(catalog.contains(&ClassId::new("c").unwrap()));
    }

    #[test]
    fn loads_from_json() {
        let json = r#"[
            {
                "id": "a",
                "level": "grade1",
                "name": "A",
                "minAge": 6,
                "maxAge": 7,
                "availableCategories": ["arithmetic"],
                "questionCounts": {"arithmetic": 20},
                "difficultyLevels": {"arithmetic": "easy"}
            },
            {
                "id": "b",
                "level": "grade2",
                "name": "B",
                "minAge": 7,
                "maxAge": 8,
                "availableCategories": ["geometry"],
                "questionCounts": {"geometry": 10},
                "difficultyLevels": {"geometry": "medium"},
                "prerequisiteClass": "a",
                "requiredScore": 150
            }
        ]"#;
        let catalog = ClassCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);
        let b = catalog.get_class(&ClassId::new("b").unwrap()).unwrap();
        assert_eq!(b.required_score(), 150);

        let err = ClassCatalog::from_json("[{\"id\": \"x\"}]").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn definitions_survive_json_round_trip() {
        let catalog = ClassCatalog::standard().unwrap();
        let json = serde_json::to_string(catalog.available_classes()).unwrap();
        let reloaded = ClassCatalog::from_json(&json).unwrap();
        assert_eq!(reloaded.available_classes(), catalog.available_classes());
    }
}
